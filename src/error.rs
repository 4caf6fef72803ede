use thiserror::Error;

/// Activity tracker error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackerError {
    #[error("Session already running")]
    AlreadyRunning,

    #[error("Session not running")]
    NotRunning,

    #[error("Invalid session state: {0}")]
    InvalidState(String),

    #[error("Sensor failed: {0}")]
    SensorFailed(String),

    #[error("Insufficient buffer capacity: need {needed} values, have {available}")]
    InsufficientCapacity { needed: usize, available: usize },

    #[error("Model produced {actual} values, expected {expected}")]
    ModelOutput { expected: usize, actual: usize },

    #[error("Inference failed: {0}")]
    InferenceFailed(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for TrackerError {
    fn from(err: std::io::Error) -> Self {
        TrackerError::StorageError(err.to_string())
    }
}

/// Result type for tracker operations
pub type TrackerResult<T> = Result<T, TrackerError>;

/// Map a poisoned lock into an internal error naming the lock.
pub(crate) fn lock_error<E>(what: &str) -> impl FnOnce(E) -> TrackerError + '_ {
    move |_| TrackerError::Internal(format!("Failed to acquire {} lock", what))
}
