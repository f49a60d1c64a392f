//! Transport error types.

use thiserror::Error;

/// Errors raised while handing a beacon to a delivery mechanism.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No async runtime is available to carry the request.
    #[error("no runtime available to send beacon")]
    NoRuntime,

    /// The request could not be constructed.
    #[error("failed to build request: {0}")]
    Build(String),

    /// The image mechanism could not be constructed.
    #[error("image beacon unavailable: {0}")]
    Image(String),

    /// Both request contexts failed.
    #[error("POST beacon failed in both contexts: {0}")]
    Exhausted(String),
}

/// Result alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
