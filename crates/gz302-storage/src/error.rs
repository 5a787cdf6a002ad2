use thiserror::Error;

/// Storage-specific error types for the sleep hook's state store.
///
/// Only the writer side surfaces these to callers. The reader folds
/// malformed content into empty categories and logs it.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation on the store failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Cycle metadata could not be serialized
    #[error("Cannot encode cycle metadata: {0}")]
    Encode(#[from] toml::ser::Error),

    /// A stored line could not be decoded
    #[error("Invalid record in {file}: {line:?}")]
    InvalidRecord { file: String, line: String },
}

impl StorageError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Specialized result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
