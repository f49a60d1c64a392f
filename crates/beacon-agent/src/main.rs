//! `beacon` binary entry point.

#![deny(unsafe_code)]

use anyhow::{Context, Result};
use beacon_agent::{Cli, Command, render_config, send};
use beacon_settings::loader;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let path = cli.config.clone().unwrap_or_else(loader::settings_path);
    let settings = loader::load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;

    if cli.json_logs {
        beacon_core::logging::init_json_subscriber(&settings.log_level);
    } else {
        beacon_core::logging::init_subscriber(&settings.log_level);
    }
    tracing::debug!(path = %path.display(), "settings loaded");

    match cli.command {
        Command::Send(args) => {
            let reports = send(settings, &args).await?;
            for report in &reports {
                println!("{}", serde_json::to_string(report)?);
            }
            if reports.is_empty() {
                tracing::warn!("no beacon was sent");
            }
        }
        Command::Config => println!("{}", render_config(&settings)?),
    }
    Ok(())
}
