//! Named timers and the built-in round-trip producer.
//!
//! The round-trip producer measures navigation start to `page_ready` for
//! the page-load beacon and request duration for dynamic-request beacons.
//! It reports complete once the page is ready or is being unloaded.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use beacon_core::constants::fields;
use beacon_events::{BusError, EventData, callback, names};
use beacon_plugins::Plugin;
use tracing::debug;

use crate::page::Page;

/// Plugin name of the round-trip producer.
pub const ROUND_TRIP: &str = "rt";

/// Set on the beacon sent during teardown.
pub const QUIT_FIELD: &str = "rt.quit";

/// Default initiator for dynamic requests.
const XHR_INITIATOR: &str = "xhr";

/// Default initiator for in-page navigations.
const SPA_INITIATOR: &str = "spa";

/// Start/end bookkeeping for named timers.
#[derive(Clone, Debug, Default)]
pub struct NamedTimers {
    running: HashMap<String, u64>,
    done: Vec<(String, u64)>,
}

impl NamedTimers {
    /// Start (or restart) `name` at `at_ms`.
    pub fn start(&mut self, name: &str, at_ms: u64) {
        let _ = self.running.insert(name.to_string(), at_ms);
    }

    /// Stop `name` at `at_ms`, recording and returning its duration.
    pub fn end(&mut self, name: &str, at_ms: u64) -> Option<u64> {
        let start = self.running.remove(name)?;
        let elapsed = at_ms.saturating_sub(start);
        self.done.retain(|(n, _)| n != name);
        self.done.push((name.to_string(), elapsed));
        Some(elapsed)
    }

    /// Whether `name` is running.
    pub fn is_running(&self, name: &str) -> bool {
        self.running.contains_key(name)
    }

    /// Take every finished timer except `t_done`, as `name|ms,name|ms`.
    pub fn take_other(&mut self) -> Option<String> {
        let mut done = std::mem::take(&mut self.done);
        done.retain(|(name, _)| name != fields::T_DONE);
        if done.is_empty() {
            return None;
        }
        Some(
            done.iter()
                .map(|(name, ms)| format!("{name}|{ms}"))
                .collect::<Vec<_>>()
                .join(","),
        )
    }
}

/// Round-trip producer.
#[derive(Debug, Default)]
pub struct RoundTrip {
    complete: AtomicBool,
}

impl Plugin for RoundTrip {
    fn name(&self) -> &str {
        ROUND_TRIP
    }

    fn description(&self) -> Option<&str> {
        Some("page-ready and request round-trip timing")
    }

    fn is_complete(&self) -> beacon_plugins::Result<bool> {
        Ok(self.complete.load(Ordering::SeqCst))
    }
}

/// Register the round-trip producer and its subscriptions on `page`.
pub fn install(page: &mut Page) -> Arc<RoundTrip> {
    let rt = Arc::new(RoundTrip::default());
    page.register_plugin(rt.clone());
    let scope = Some(ROUND_TRIP.to_string());

    let ready = Arc::clone(&rt);
    let _ = page.subscribe(
        names::PAGE_READY,
        callback(move |page: &mut Page, _, _| {
            ready.complete.store(true, Ordering::SeqCst);
            on_page_ready(page);
            Ok(())
        }),
        None,
        scope.clone(),
        false,
    );
    let _ = page.subscribe(
        names::XHR_LOAD,
        callback(|page: &mut Page, data, _| on_xhr_load(page, data)),
        None,
        scope.clone(),
        false,
    );
    let _ = page.subscribe(
        names::SPA_NAVIGATION,
        callback(|page: &mut Page, data, _| {
            on_spa_navigation(page, data);
            Ok(())
        }),
        None,
        scope.clone(),
        false,
    );
    let unload = Arc::clone(&rt);
    let _ = page.subscribe(
        names::PAGE_UNLOAD,
        callback(move |page: &mut Page, _, _| {
            unload.complete.store(true, Ordering::SeqCst);
            on_unload(page);
            Ok(())
        }),
        None,
        scope,
        false,
    );
    rt
}

fn on_page_ready(page: &mut Page) {
    let now = page.now_ms();
    if !page.vars().has_var(fields::T_DONE) {
        page.vars_mut().add_var(fields::T_DONE, now, false);
    }
    add_other_timers(page);
    debug!(t_done = now, "page ready");
    if page.settings().autorun {
        page.send_beacon(None);
    }
}

fn on_xhr_load(page: &mut Page, data: &EventData) -> Result<(), BusError> {
    let Some(request) = data.as_request() else {
        return Err(BusError::failed("xhr_load fired without request data"));
    };
    let initiator = request
        .initiator
        .clone()
        .unwrap_or_else(|| XHR_INITIATOR.to_string());
    let end = request.end_ms.unwrap_or_else(|| page.now_ms());
    let duration = page
        .timers_mut()
        .end(fields::T_DONE, end)
        .unwrap_or_else(|| end.saturating_sub(request.start_ms));

    let vars = page.vars_mut();
    vars.add_var(fields::INITIATOR, initiator, false);
    if !request.url.is_empty() {
        vars.add_var(fields::URL, request.url.clone(), false);
    }
    vars.add_var(fields::T_DONE, duration, false);
    add_other_timers(page);
    page.send_beacon(None);
    Ok(())
}

fn on_spa_navigation(page: &mut Page, data: &EventData) {
    let initiator = data
        .as_request()
        .and_then(|r| r.initiator.clone())
        .unwrap_or_else(|| SPA_INITIATOR.to_string());
    page.vars_mut().add_var(fields::INITIATOR, initiator, false);
}

fn on_unload(page: &mut Page) {
    page.vars_mut().add_var(QUIT_FIELD, "", true);
    page.send_beacon(None);
}

fn add_other_timers(page: &mut Page) {
    if let Some(other) = page.timers_mut().take_other() {
        page.vars_mut().add_var(fields::T_OTHER, other, false);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
