//! Error types for the s3gate core.

/// Core error type for s3gate infrastructure.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A configuration value could not be interpreted.
    #[error("configuration error: {0}")]
    Config(String),

    /// The per-request deadline elapsed before the operation completed.
    #[error("deadline exceeded while {0}")]
    DeadlineExceeded(&'static str),
}

/// Convenience result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
