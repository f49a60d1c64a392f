//! Event bus error types.

use thiserror::Error;

/// Errors raised by subscribers or the public mirror.
#[derive(Debug, Error)]
pub enum BusError {
    /// A subscriber callback failed.
    #[error("{0}")]
    Failed(String),

    /// The public mirror could not dispatch an event.
    #[error("mirror dispatch of '{event}' failed: {message}")]
    Mirror {
        /// Public event name.
        event: String,
        /// Failure message.
        message: String,
    },
}

impl BusError {
    /// Shorthand for a subscriber failure.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}
