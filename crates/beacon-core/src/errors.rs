//! Error hierarchy for the beacon agent.
//!
//! None of these ever reach the host page. They are logged, counted in the
//! [`ErrorTally`](crate::tally::ErrorTally), and surface at most as the next
//! beacon's `errors` field.

use thiserror::Error;

/// Top-level error type shared by the beacon crates.
#[derive(Debug, Error)]
pub enum BeaconError {
    /// A producer (completion check or event subscriber) failed.
    #[error("producer '{name}' failed: {message}")]
    Producer {
        /// Producer or subscriber name.
        name: String,
        /// Failure message.
        message: String,
    },

    /// No transport tier could construct or send the beacon.
    #[error("transport failed: {0}")]
    Transport(String),

    /// Invalid destination or payload detected at flush time.
    #[error("configuration error: {0}")]
    Config(String),

    /// Value could not be serialized for the wire.
    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Generic internal error.
    #[error("{0}")]
    Internal(String),
}

impl BeaconError {
    /// Create a producer error.
    #[must_use]
    pub fn producer(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Producer {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Result type for beacon operations.
pub type Result<T> = std::result::Result<T, BeaconError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
