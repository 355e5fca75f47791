//! Error types for batch control

use qbatch_backend::BackendError;
use qbatch_core::CoreError;
use thiserror::Error;

/// Result type for controller operations
pub type Result<T> = std::result::Result<T, ControllerError>;

/// Errors raised while scheduling or executing a batch
#[derive(Error, Debug, Clone)]
pub enum ControllerError {
    /// Job document could not be decoded
    #[error("Failed to load job: {0}")]
    Parse(String),

    /// A circuit or noise model failed op-set or memory validation
    #[error("{0}")]
    Validation(String),

    /// The planner could not fit a single experiment into the memory budget
    #[error("a circuit requires more memory than max_memory_mb.")]
    OutOfMemory,

    /// A backend execution failed
    #[error("{0}")]
    Backend(String),

    /// A configuration value is out of range or has the wrong type
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<CoreError> for ControllerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Parse(msg) => ControllerError::Parse(msg),
            CoreError::Validation(msg) => ControllerError::Validation(msg),
            CoreError::InvalidConfig(msg) => ControllerError::InvalidConfig(msg),
        }
    }
}

impl From<BackendError> for ControllerError {
    fn from(err: BackendError) -> Self {
        ControllerError::Backend(err.to_string())
    }
}
