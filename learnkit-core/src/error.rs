use thiserror::Error;

/// Custom error type for the learnkit training stack.
///
/// Every fallible operation in the workspace reports one of these variants.
/// The type is `Clone` so that the training loop can hand a reference of the
/// failure to `on_train_end` and still return the original value to the caller.
#[derive(Error, Debug, PartialEq, Clone)]
pub enum LearnError {
    #[error("Precondition violated: {0}")]
    PreconditionViolation(String),

    #[error("Layer group index {index} out of bounds for {len} layer groups")]
    LayerGroupIndexOutOfBounds { index: isize, len: usize },

    #[error("Invalid layer partition: {0}")]
    LayerPartition(String),

    #[error("Hyper-parameter '{name}' expects {expected} values (one per layer group), got {actual}")]
    HyperParameterMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("History name collision: '{0}' is used both as a loss component and as a metric")]
    HistoryNameCollision(String),

    #[error("Missing field '{field}' in batch targets")]
    MissingField { field: String },

    #[error("Tensor engine error: {0}")]
    Engine(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("Callback '{name}' failed: {reason}")]
    Callback { name: String, reason: String },

    #[error("Failed to acquire {lock_type} lock: {reason}")]
    LockError { lock_type: String, reason: String },

    #[error("I/O error on '{path}': {reason}")]
    Io { path: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl LearnError {
    /// Shorthand used by lock helpers across the workspace.
    pub fn lock(lock_type: &str, reason: impl std::fmt::Display) -> Self {
        LearnError::LockError {
            lock_type: lock_type.to_string(),
            reason: reason.to_string(),
        }
    }
}
