//! Result of probing an embedding frame's document.

/// Outcome of accessing a frame's document.
///
/// Cross-origin denial is expected in embedded deployments and is not an
/// internal error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameAccess {
    /// The document was readable.
    Ok,
    /// Access was denied by the same-origin policy.
    DeniedCrossOrigin,
    /// Access failed for another reason.
    OtherError(String),
}

impl FrameAccess {
    /// Whether the probe succeeded.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Message to record in the error tally, if any.
    pub fn tally_message(&self) -> Option<&str> {
        match self {
            Self::OtherError(message) => Some(message),
            Self::Ok | Self::DeniedCrossOrigin => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
