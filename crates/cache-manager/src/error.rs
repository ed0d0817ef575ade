use std::path::PathBuf;
use thiserror::Error;

/// Durable-tier failures. These never escape [`crate::CacheManager`]; they are
/// logged and turned into a miss (reads) or a no-op (writes).
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt cache record at {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Foreign cache record at {path}")]
    ForeignRecord { path: PathBuf },
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type CacheResult<T> = Result<T, CacheError>;
