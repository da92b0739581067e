//! Error types for the Skyboard message bus.

use thiserror::Error;

/// Errors that can occur when moving frames across the bus.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The other end of the channel is gone
    #[error("channel closed")]
    Closed,

    /// Non-blocking send found the channel at capacity
    #[error("channel full")]
    Full,

    /// A frame shorter or longer than the message size
    #[error("partial frame: expected {expected} bytes, got {got}")]
    PartialFrame { expected: usize, got: usize },

    /// Frame had the right size but an invalid field
    #[error("malformed frame: {0}")]
    Malformed(String),
}

impl BusError {
    /// Creates a malformed-frame error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }
}
