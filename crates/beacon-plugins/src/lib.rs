//! # beacon-plugins
//!
//! Producer plugin contract and the readiness gate.
//!
//! Instrumentation producers implement [`Plugin`](plugin::Plugin) and are
//! registered in a [`PluginRegistry`](registry::PluginRegistry). Before each
//! flush the coordinator asks the registry whether every enabled plugin has
//! finished collecting data.
//!
//! ## Gate Semantics
//!
//! - Pure AND over enabled plugins; the first incomplete plugin wins.
//! - Plugins without a completion check count as ready.
//! - A failing check is returned to the caller, which records it.

#![deny(unsafe_code)]

pub mod errors;
pub mod plugin;
pub mod registry;

pub use errors::{PluginError, Result};
pub use plugin::Plugin;
pub use registry::{PluginInfo, PluginRegistry};
