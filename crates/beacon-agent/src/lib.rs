//! # beacon-agent
//!
//! The `beacon` command-line tool: loads settings, initializes logging, and
//! runs one simulated page load through the coordinator.

#![deny(unsafe_code)]

pub mod cli;
pub mod run;

pub use cli::{Cli, Command, SendArgs};
pub use run::{BeaconReport, render_config, send};
