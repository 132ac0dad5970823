//! Protocol error types

use thiserror::Error;

/// Errors that can occur during protocol operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Line exceeds maximum size
    #[error("Line too large: {size} bytes exceeds maximum of {max} bytes")]
    LineTooLarge { size: usize, max: usize },

    /// Frame is not valid UTF-8
    #[error("Frame is not valid UTF-8")]
    InvalidUtf8,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
