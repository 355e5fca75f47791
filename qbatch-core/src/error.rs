//! Error types for the core data model

use thiserror::Error;

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors produced while decoding or validating job data
#[derive(Error, Debug, Clone)]
pub enum CoreError {
    /// Job document could not be decoded
    #[error("{0}")]
    Parse(String),

    /// Decoded data violates a structural constraint
    #[error("{0}")]
    Validation(String),

    /// A configuration value is out of range or has the wrong type
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Parse(err.to_string())
    }
}
