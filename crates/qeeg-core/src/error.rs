//! Error types for the qEEG workspace

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum QeegError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Channel count mismatch: expected {expected}, got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },

    #[error("Structural mismatch: {0}")]
    Structural(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Numerical failure: {0}")]
    Numerical(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type QeegResult<T> = Result<T, QeegError>;
