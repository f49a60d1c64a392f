//! Plugin error types.

use thiserror::Error;

/// Errors raised by producer plugins.
#[derive(Debug, Error)]
pub enum PluginError {
    /// A completion check failed to evaluate.
    #[error("completion check failed in '{name}': {message}")]
    Check {
        /// Plugin name.
        name: String,
        /// Failure message.
        message: String,
    },

    /// Plugin initialization failed.
    #[error("init failed in '{name}': {message}")]
    Init {
        /// Plugin name.
        name: String,
        /// Failure message.
        message: String,
    },

    /// Generic internal error.
    #[error("{0}")]
    Internal(String),
}

impl PluginError {
    /// Shorthand for a failed completion check.
    #[must_use]
    pub fn check(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Check {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a failed init.
    #[must_use]
    pub fn init(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Init {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Result alias for plugin operations.
pub type Result<T> = std::result::Result<T, PluginError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
