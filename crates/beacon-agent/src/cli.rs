//! Command-line surface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Send telemetry beacons for one simulated page load.
#[derive(Parser, Debug)]
#[command(name = "beacon", version, about = "Browser telemetry beacon agent")]
pub struct Cli {
    /// Settings file (defaults to `$BEACON_CONFIG` or `~/.beacon/settings.json`).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// What to do.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one page load and send its beacons.
    Send(SendArgs),
    /// Print the effective settings as JSON.
    Config,
}

/// Arguments of `beacon send`.
#[derive(Args, Debug, Clone, Default)]
pub struct SendArgs {
    /// Collector URL (overrides `beacon_url`).
    #[arg(long)]
    pub url: Option<String>,

    /// Extra beacon variable, repeatable.
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_var)]
    pub vars: Vec<(String, String)>,

    /// URL of the simulated page.
    #[arg(long, default_value = "")]
    pub page_url: String,

    /// Referrer of the simulated page.
    #[arg(long)]
    pub referrer: Option<String>,

    /// Also tear the page down, sending the unload beacon.
    #[arg(long)]
    pub unload: bool,

    /// Record beacons instead of sending them.
    #[arg(long)]
    pub dry_run: bool,
}

/// Parse a `name=value` pair.
pub fn parse_var(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    if name.is_empty() {
        return Err(format!("empty variable name in '{raw}'"));
    }
    Ok((name.to_string(), value.to_string()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
