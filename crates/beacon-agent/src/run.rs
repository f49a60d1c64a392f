//! One simulated page load.

use std::sync::Arc;

use anyhow::{Context, Result};
use beacon_core::constants::fields;
use beacon_events::{EventData, callback, names};
use beacon_runtime::{NativeEvent, Page, PageOptions};
use beacon_settings::BeaconSettings;
use beacon_transport::{Recorder, ReqwestSender, Transport};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::cli::SendArgs;

/// One beacon as handed to the transport.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BeaconReport {
    /// Sequence number (`n`).
    pub n: Option<u64>,
    /// Encoded parameter string.
    pub query: String,
}

enum Sender {
    Http(ReqwestSender),
    Dry(Recorder),
}

impl Sender {
    fn transport(&self) -> Transport {
        match self {
            Self::Http(sender) => sender.transport(),
            Self::Dry(recorder) => recorder.transport(),
        }
    }

    async fn finish(&self) {
        match self {
            Self::Http(sender) => {
                let awaited = sender.drain().await;
                debug!(awaited, "in-flight sends finished");
            }
            Self::Dry(recorder) => debug!(recorded = recorder.count(), "dry run finished"),
        }
    }
}

/// Run one page load with `settings` and return the beacons it produced.
///
/// Dispatches `Load`, drives the task queue until idle, optionally tears
/// the page down, then waits for in-flight HTTP sends.
pub async fn send(mut settings: BeaconSettings, args: &SendArgs) -> Result<Vec<BeaconReport>> {
    if let Some(url) = &args.url {
        settings.beacon_url.clone_from(url);
    }
    let autorun = settings.autorun;
    let sender = if args.dry_run {
        Sender::Dry(Recorder::new())
    } else {
        Sender::Http(ReqwestSender::new())
    };

    let options = PageOptions {
        url: args.page_url.clone(),
        referrer: args.referrer.clone(),
        ..PageOptions::default()
    };
    let mut page = Page::new(settings, sender.transport(), options).context("Failed to create page")?;
    info!(page_id = %page.id(), dry_run = args.dry_run, "page started");

    let reports = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reports);
    let _ = page.on(
        names::BEACON,
        callback(move |_: &mut Page, data: &EventData, _| {
            if let Some(snapshot) = data.as_vars() {
                sink.lock().push(BeaconReport {
                    n: snapshot.get(fields::SEQUENCE).and_then(Value::as_u64),
                    query: snapshot.query_string(),
                });
            }
            Ok(())
        }),
    );

    for (name, value) in &args.vars {
        page.vars_mut().add_var(name.clone(), value.clone(), false);
    }
    page.dispatch_native(NativeEvent::Load);
    if !autorun {
        page.send_beacon(None);
    }
    page.run().await;

    if args.unload {
        page.dispatch_native(NativeEvent::PageHide);
    }
    sender.finish().await;

    let sent = reports.lock().clone();
    info!(beacons = sent.len(), "page finished");
    Ok(sent)
}

/// Effective settings as pretty JSON, with the auth token redacted.
pub fn render_config(settings: &BeaconSettings) -> Result<String> {
    let mut public = settings.clone();
    if public.beacon_auth_token.is_some() {
        public.beacon_auth_token = Some("<redacted>".to_string());
    }
    serde_json::to_string_pretty(&public).context("Failed to serialize settings")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
