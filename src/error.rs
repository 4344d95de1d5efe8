use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading data, configuring models or running an evaluation.
#[derive(Debug, Error)]
pub enum SadError {
    /// The stream was advanced again after it signalled exhaustion.
    #[error("stream is out of data; call reset() before reading again")]
    OutOfData,

    /// Feature/label shapes or values do not line up.
    #[error("malformed record at row {row}: {reason}")]
    MalformedRecord { row: usize, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl SadError {
    pub(crate) fn malformed(row: usize, reason: impl Into<String>) -> Self {
        SadError::MalformedRecord {
            row,
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SadError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, SadError>;
