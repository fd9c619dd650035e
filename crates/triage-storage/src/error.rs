//! Error types for triage-storage

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid prompt document: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Prompt not found: {0}")]
    NotFound(String),

    #[error("Invalid filename '{0}': must end with .json")]
    InvalidFilename(String),
}
