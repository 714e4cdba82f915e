use thiserror::Error;
use std::path::PathBuf;

/// The main result type for bookrec-core operations.
pub type RecResult<T> = Result<T, RecError>;

/// Enum representing possible errors within the bookrec-core library.
///
/// Absent models, unknown item ids and empty read histories are deliberately
/// *not* represented here: they are ordinary outcomes, not failures.
#[derive(Error, Debug)]
pub enum RecError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid corpus: {0}")]
    InvalidCorpus(String),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Corrupt model file {path:?}: {reason}")]
    CorruptModel { path: PathBuf, reason: String },

    #[error("I/O error accessing path {path:?}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RecError {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        RecError::CorruptModel { path: path.into(), reason: reason.into() }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RecError::IoError { path: path.into(), source }
    }
}

impl From<bincode::Error> for RecError {
    fn from(err: bincode::Error) -> Self {
        // Box<bincode::ErrorKind> doesn't provide much detail in its Display impl
        RecError::Serialization(format!("Bincode error: {}", err))
    }
}
