//! Plugin registry and readiness gate.
//!
//! Maintains the ordered collection of [`Plugin`] instances with their
//! enabled flag. [`PluginRegistry::ready_to_send`] is the readiness gate
//! the coordinator consults before every flush.

use std::sync::Arc;

use beacon_settings::BeaconSettings;
use tracing::{debug, trace, warn};

use crate::errors::{PluginError, Result};
use crate::plugin::Plugin;

struct Entry {
    plugin: Arc<dyn Plugin>,
    enabled: bool,
}

/// Summary of a registered plugin.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PluginInfo {
    /// Plugin name.
    pub name: String,
    /// Whether the readiness gate consults it.
    pub enabled: bool,
    /// Optional description.
    pub description: Option<String>,
}

/// Registry of producer plugins, in registration order.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Entry>,
}

impl PluginRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin.
    ///
    /// A plugin with the same name is replaced in place, keeping its
    /// position.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        let enabled = plugin.enabled_by_default();
        debug!(name = %plugin.name(), enabled, "registering plugin");
        let entry = Entry { plugin, enabled };
        match self.position(entry.plugin.name()) {
            Some(idx) => self.plugins[idx] = entry,
            None => self.plugins.push(entry),
        }
    }

    /// Remove a plugin by name. Returns `true` if it was registered.
    pub fn unregister(&mut self, name: &str) -> bool {
        let before = self.plugins.len();
        self.plugins.retain(|e| e.plugin.name() != name);
        let found = self.plugins.len() < before;
        if found {
            debug!(name = %name, "unregistered plugin");
        }
        found
    }

    /// Enable a plugin. Returns `false` if it is unknown.
    pub fn enable(&mut self, name: &str) -> bool {
        self.set_enabled(name, true)
    }

    /// Disable a plugin. Returns `false` if it is unknown.
    pub fn disable(&mut self, name: &str) -> bool {
        self.set_enabled(name, false)
    }

    fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        let Some(idx) = self.position(name) else {
            return false;
        };
        let entry = &mut self.plugins[idx];
        if entry.enabled != enabled {
            entry.enabled = enabled;
            if enabled {
                entry.plugin.on_enable();
            } else {
                entry.plugin.on_disable();
            }
            debug!(name = %name, enabled, "plugin toggled");
        }
        true
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.plugins.iter().position(|e| e.plugin.name() == name)
    }

    /// Whether the named plugin is registered and enabled.
    #[must_use]
    pub fn is_enabled(&self, name: &str) -> bool {
        self.position(name).is_some_and(|idx| self.plugins[idx].enabled)
    }

    /// Get a plugin by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.position(name).map(|idx| Arc::clone(&self.plugins[idx].plugin))
    }

    /// List registered plugins in registration order.
    #[must_use]
    pub fn list(&self) -> Vec<PluginInfo> {
        self.plugins
            .iter()
            .map(|e| PluginInfo {
                name: e.plugin.name().to_string(),
                enabled: e.enabled,
                description: e.plugin.description().map(ToString::to_string),
            })
            .collect()
    }

    /// Total number of registered plugins.
    #[must_use]
    pub fn count(&self) -> usize {
        self.plugins.len()
    }

    /// Initialize every plugin with `settings`.
    ///
    /// Failures are logged and returned; remaining plugins still run.
    pub fn init_all(&self, settings: &BeaconSettings) -> Vec<PluginError> {
        let mut failures = Vec::new();
        for entry in &self.plugins {
            if let Err(err) = entry.plugin.init(settings) {
                warn!(name = %entry.plugin.name(), error = %err, "plugin init failed");
                failures.push(err);
            }
        }
        failures
    }

    /// Readiness gate.
    ///
    /// Returns `Ok(false)` as soon as an enabled plugin reports incomplete.
    /// A failing completion check is returned to the caller unchanged.
    pub fn ready_to_send(&self) -> Result<bool> {
        for entry in self.plugins.iter().filter(|e| e.enabled) {
            if !entry.plugin.is_complete()? {
                trace!(name = %entry.plugin.name(), "plugin not complete");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Clear all registered plugins.
    pub fn clear(&mut self) {
        self.plugins.clear();
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugin_count", &self.count())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
