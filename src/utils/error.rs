//! Error Handling
//!
//! Unified error types for the engine.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(String),

    /// SQLite errors (auto-converted from rusqlite::Error)
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors (missing entity, or entity not owned by the caller)
    #[error("Not found: {0}")]
    NotFound(String),

    /// State-machine violations (e.g. continuing a completed analysis)
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Optimistic-concurrency conflicts on the analysis aggregate
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Model returned no usable content
    #[error("Empty response: {0}")]
    EmptyResponse(String),

    /// Model output could not be parsed into the expected shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Generation provider errors
    #[error("Generation error: {0}")]
    Generation(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Create a conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error originated in model output rather than in the
    /// engine itself. Model-output errors are folded into a failed stage
    /// execution instead of bubbling to the caller.
    pub fn is_model_output_error(&self) -> bool {
        matches!(
            self,
            AppError::EmptyResponse(_) | AppError::MalformedResponse(_) | AppError::Generation(_)
        )
    }
}

/// Convert AppError to a string suitable for serialized trigger responses
impl From<AppError> for String {
    fn from(err: AppError) -> String {
        err.to_string()
    }
}
