//! Producer plugin trait.
//!
//! A [`Plugin`] is an instrumentation unit that contributes beacon variables
//! and reports whether it has finished collecting data for the in-flight
//! beacon. Every capability beyond [`name`](Plugin::name) is optional and has
//! a default.

use beacon_settings::BeaconSettings;

use crate::errors::Result;

/// An instrumentation producer.
///
/// # Completion
///
/// [`is_complete`](Plugin::is_complete) must be cheap and free of side
/// effects; the gate may call it many times per flush attempt. Plugins
/// without a completion check keep the default, which is always ready.
///
/// # Enablement
///
/// Plugins start enabled unless
/// [`enabled_by_default`](Plugin::enabled_by_default) says otherwise.
/// Disabled plugins are skipped by the readiness gate.
pub trait Plugin: Send + Sync {
    /// Unique name for this plugin.
    fn name(&self) -> &str;

    /// Optional human-readable description.
    fn description(&self) -> Option<&str> {
        None
    }

    /// Whether the plugin starts enabled. Default: true.
    fn enabled_by_default(&self) -> bool {
        true
    }

    /// Apply configuration. Called once per settings change.
    fn init(&self, _settings: &BeaconSettings) -> Result<()> {
        Ok(())
    }

    /// Called when the registry enables the plugin.
    fn on_enable(&self) {}

    /// Called when the registry disables the plugin.
    fn on_disable(&self) {}

    /// Whether this plugin has finished collecting data. Default: ready.
    fn is_complete(&self) -> Result<bool> {
        Ok(true)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
