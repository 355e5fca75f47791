//! Error types for backend execution

use qbatch_core::CoreError;
use thiserror::Error;

/// Result type for backend operations
pub type Result<T> = std::result::Result<T, BackendError>;

/// Errors raised while executing shots on a backend
#[derive(Error, Debug, Clone)]
pub enum BackendError {
    /// A shot could not be executed
    #[error("{0}")]
    Execution(String),

    /// The circuit or noise model is invalid for this backend
    #[error("{0}")]
    Validation(String),
}

impl From<CoreError> for BackendError {
    fn from(err: CoreError) -> Self {
        BackendError::Validation(err.to_string())
    }
}
