//! Classified file I/O: reads that surface as [`StoreError::Access`] and the
//! atomic whole-file write.
//!
//! The rename-over approach is close to atomic on most platforms. On NTFS
//! (Windows) it's reliable; on FAT32 or network shares there are no hard
//! guarantees. If that matters to you, keep backups or use a real database.

use crate::error::{Result, StoreError};
use std::path::Path;

/// Read the whole backing file. Any failure — including a missing file — is
/// an [`StoreError::Access`] carrying the underlying kind, OS error code,
/// and the operation that failed; the store decides how to recover.
pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    // separate reachability check so a missing target classifies as the
    // "access" step, matching what consumers of the error channel key on
    std::fs::metadata(path).map_err(|e| StoreError::access(path, "access", &e))?;
    std::fs::read(path).map_err(|e| StoreError::access(path, "read", &e))
}

/// Write `bytes` to `<path>.tmp` and then rename over `path`, replacing the
/// prior contents in one step. Avoids leaving a half-written file if the
/// process dies mid-write. Failures classify as [`StoreError::Write`].
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
    let tmp = path.with_extension(format!("{ext}.tmp"));
    std::fs::write(&tmp, bytes).map_err(|e| StoreError::write(&tmp, "write", &e))?;
    std::fs::rename(&tmp, path).map_err(|e| StoreError::write(path, "rename", &e))?;
    Ok(())
}
