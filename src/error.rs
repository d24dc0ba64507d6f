//! Error taxonomy and the per-store error sink.
//!
//! Backend failures (unreadable target, corrupt content, failed write) are
//! operational events, not control flow: they are funneled through the
//! store's single sink callback instead of being raised from `save`/`load`.
//! Only [`StoreError::InvalidArgument`] surfaces at the call site.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Things that can go wrong when using the store.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A key or value that cannot be represented in the store's JSON object
    /// model (e.g. a value containing a map with non-string keys). Fails the
    /// call synchronously; nothing is stored.
    InvalidArgument(String),
    /// The backing target could not be reached for reading.
    Access {
        /// Target that was being read.
        path: PathBuf,
        /// Underlying I/O failure kind.
        kind: io::ErrorKind,
        /// Raw OS error code, when one exists.
        code: Option<i32>,
        /// Operation that failed (`"access"`, `"read"`).
        op: &'static str,
    },
    /// Persisted content is not a well-formed JSON object.
    Format {
        /// Target the content came from.
        path: PathBuf,
        /// Parser diagnostic.
        detail: String,
    },
    /// The backing target could not be written.
    Write {
        /// Target that was being written.
        path: PathBuf,
        /// Underlying I/O failure kind.
        kind: io::ErrorKind,
        /// Raw OS error code, when one exists.
        code: Option<i32>,
        /// Operation that failed (`"write"`, `"rename"`).
        op: &'static str,
    },
}

impl StoreError {
    pub(crate) fn access(path: &Path, op: &'static str, err: &io::Error) -> Self {
        StoreError::Access {
            path: path.to_path_buf(),
            kind: err.kind(),
            code: err.raw_os_error(),
            op,
        }
    }

    pub(crate) fn write(path: &Path, op: &'static str, err: &io::Error) -> Self {
        StoreError::Write {
            path: path.to_path_buf(),
            kind: err.kind(),
            code: err.raw_os_error(),
            op,
        }
    }

    pub(crate) fn format(path: &Path, err: &serde_json::Error) -> Self {
        StoreError::Format {
            path: path.to_path_buf(),
            detail: err.to_string(),
        }
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            StoreError::Access {
                path, kind, code, op,
            }
            | StoreError::Write {
                path, kind, code, op,
            } => {
                write!(f, "cannot {op} {}: {kind}", path.display())?;
                if let Some(code) = code {
                    write!(f, " (os error {code})")?;
                }
                Ok(())
            }
            StoreError::Format { path, detail } => {
                write!(f, "malformed content in {}: {detail}", path.display())
            }
        }
    }
}

impl std::error::Error for StoreError {}

/// Result alias using our [`StoreError`] type.
pub type Result<T> = std::result::Result<T, StoreError>;

/// The store's error callback. One sink is active per store; registering a
/// new one replaces the old.
pub type ErrorSink = Arc<dyn Fn(&StoreError) + Send + Sync>;

/// Sink installed at construction: logs and never panics, so a storage
/// failure cannot take the host process down.
pub(crate) fn default_sink(backend: String) -> ErrorSink {
    Arc::new(move |err| {
        tracing::error!(target: "json_backed", backend = %backend, error = %err, "storage error");
    })
}
