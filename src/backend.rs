//! Storage backends: where the map's contents durably live (or don't).
//!
//! Implement [`StorageBackend`] to bring your own backing medium. The two
//! shipped backends are [`Memory`] (nothing durable, for tests and callers
//! who only want the dirty-tracking API) and [`File`] (a single JSON file,
//! rewritten whole on every flush).

use crate::error::{Result, StoreError};
use crate::persist::{atomic_write, read_file};
use crate::serializer::{JsonCodec, WireCodec};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Persistence seam between the store and its backing medium.
pub trait StorageBackend: Send + Sync {
    /// Human-readable description, used by the default error sink.
    fn describe(&self) -> String;

    /// Produce the full replacement contents for the store.
    ///
    /// A successful load replaces the in-memory map entirely
    /// (clear-then-populate, never a merge). Errors are classified so the
    /// store can pick the right recovery: [`StoreError::Access`] leaves the
    /// store empty, [`StoreError::Format`] leaves it untouched.
    fn load(&self) -> Result<Map<String, Value>>;

    /// Write a full snapshot, replacing whatever was persisted before.
    fn persist(&self, snapshot: &Map<String, Value>) -> Result<()>;

    /// Path to the backing file, when there is one.
    fn path(&self) -> Option<&Path> {
        None
    }
}

// ---- memory -------------------------------------------------------------------

/// Backend with nothing durable behind it.
///
/// `load` yields an empty replacement (a defensive reset — there is no
/// external source to load from) and `persist` succeeds without doing
/// anything.
#[derive(Debug, Default)]
pub struct Memory;

impl StorageBackend for Memory {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    fn load(&self) -> Result<Map<String, Value>> {
        Ok(Map::new())
    }

    fn persist(&self, _snapshot: &Map<String, Value>) -> Result<()> {
        tracing::debug!(target: "json_backed", "memory backend: nothing durable to persist");
        Ok(())
    }
}

// ---- file ---------------------------------------------------------------------

/// Backend keeping the whole store in one JSON file.
///
/// `load` reads and parses the full file; `persist` serializes the full
/// snapshot and atomically replaces the file. There is no append or patch
/// path — the file always holds exactly the last flushed state.
pub struct File {
    path: PathBuf,
    codec: Box<dyn WireCodec>,
}

impl File {
    /// File backend at `path` with the default pretty JSON codec.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_codec(path, JsonCodec::new())
    }

    /// File backend with a specific codec.
    #[must_use]
    pub fn with_codec(path: impl Into<PathBuf>, codec: impl WireCodec + 'static) -> Self {
        Self {
            path: path.into(),
            codec: Box::new(codec),
        }
    }
}

impl StorageBackend for File {
    fn describe(&self) -> String {
        format!("file: {}", self.path.display())
    }

    fn load(&self) -> Result<Map<String, Value>> {
        let bytes = read_file(&self.path)?;
        self.codec
            .decode(&bytes)
            .map_err(|e| StoreError::format(&self.path, &e))
    }

    fn persist(&self, snapshot: &Map<String, Value>) -> Result<()> {
        let bytes = self
            .codec
            .encode(snapshot)
            .map_err(|e| StoreError::format(&self.path, &e))?;
        atomic_write(&self.path, &bytes)
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

impl std::fmt::Debug for File {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("File")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
