use std::path::PathBuf;

use thiserror::Error;

/// Failures of the persisted reservation document.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The document could not be read or written.
    #[error("reservation document {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document exists but cannot be parsed. Fatal: user data must never
    /// be silently discarded.
    #[error("reservation document {} is corrupt: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
