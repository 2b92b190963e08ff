//! Error types for IRM

use thiserror::Error;

/// Result type alias for IRM operations
pub type Result<T> = std::result::Result<T, IrmError>;

/// Main error type for IRM
#[derive(Error, Debug)]
pub enum IrmError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Value is not JSON-safe: {0}")]
    JsonSafe(#[from] crate::jsonsafe::JsonSafeError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}
