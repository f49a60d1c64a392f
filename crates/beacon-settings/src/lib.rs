//! # beacon-settings
//!
//! Configuration for the beacon agent, loaded in three layers (in priority order):
//! 1. **Compiled defaults**: [`BeaconSettings::default()`]
//! 2. **Settings file**: `$BEACON_CONFIG` or `~/.beacon/settings.json` (deep-merged)
//! 3. **Environment variables**: `BEACON_*` overrides (highest priority)
//!
//! Settings are plain values handed to each page context at construction;
//! there is no process-wide settings singleton, so independent pages (and
//! tests) can run side by side with different configuration.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::{BeaconSettings, BeaconType, TickStrategy};

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
