//! Beacon Coordinator.
//!
//! ```text
//!   send_beacon ──► QUEUED ──(tick)──► FLUSHING ──► IDLE
//!        ▲              │                  │
//!        └── no-op ◄────┘                  ├─ gate not ready / dead page
//!                                          ├─ rate limited
//!                                          ├─ empty payload / no url / disallowed
//!                                          └─ handoff to transport
//! ```
//!
//! `queued` is the only coordination flag: it coalesces every request made
//! before the scheduled flush runs, and guarantees at most one flush is
//! pending. Transmission order is the order flushes reach the handoff.

use std::time::Duration;

use beacon_core::constants::{self, TRANSIENT_FIELDS, fields};
use beacon_events::{EventData, RequestInfo, callback, names};
use beacon_settings::TickStrategy;
use beacon_transport::Delivery;
use serde_json::Value;
use tracing::field::Empty;
use tracing::{Span, debug, info, instrument, trace, warn};

use crate::page::Page;
use crate::scheduler::{Task, TaskId};
use crate::url::cleanup_url;

/// Flush bookkeeping for one page.
#[derive(Clone, Debug, Default)]
pub(crate) struct FlushControl {
    pub(crate) queued: bool,
    pub(crate) flushing: bool,
    url_override: Option<String>,
    pending: Option<TaskId>,
    pub(crate) beacons_sent: u64,
    page_load_sent: bool,
    pub(crate) rate_limited: bool,
}

/// Coordinator state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlushState {
    /// Nothing queued.
    Idle,
    /// A flush is scheduled.
    Queued,
    /// A flush is running.
    Flushing,
}

/// How a flush attempt ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlushOutcome {
    /// No beacon was queued.
    NotQueued,
    /// A producer is not complete. The producer re-requests later.
    NotReady,
    /// The page was torn down.
    Dead,
    /// Bookkeeping ran but the page is rate limited.
    RateLimited,
    /// Nothing to send.
    EmptyPayload,
    /// No destination configured.
    NoUrl,
    /// The destination failed the allow-list.
    Disallowed,
    /// Handed to the transport.
    Sent(Delivery),
    /// Every transport mechanism failed.
    TransportFailed,
}

impl FlushOutcome {
    /// Whether the beacon reached a transport mechanism.
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent(_))
    }
}

impl Page {
    /// Current coordinator state.
    pub fn flush_state(&self) -> FlushState {
        if self.flush.flushing {
            FlushState::Flushing
        } else if self.flush.queued {
            FlushState::Queued
        } else {
            FlushState::Idle
        }
    }

    /// Number of beacons handed to the transport.
    pub fn beacons_sent(&self) -> u64 {
        self.flush.beacons_sent
    }

    /// Whether the page-load beacon has been flushed.
    pub fn has_sent_page_load_beacon(&self) -> bool {
        self.flush.page_load_sent
    }

    /// Request a flush on the next free tick.
    ///
    /// Calls made while a flush is already queued are coalesced into it.
    /// `url_override` replaces `beacon_url` for that flush only.
    pub fn send_beacon(&mut self, url_override: Option<String>) {
        if self.flush.queued {
            trace!("beacon already queued");
            return;
        }
        if !self.alive {
            trace!("send_beacon after teardown ignored");
            return;
        }
        self.flush.queued = true;
        self.flush.url_override = url_override;

        let task: Task<Page> = Box::new(|page: &mut Page| {
            page.flush.pending = None;
            let _ = page.real_send_beacon();
        });
        let id = match self.settings().tick_strategy {
            TickStrategy::Idle => {
                let timeout = Duration::from_millis(self.settings().idle_timeout_ms);
                self.scheduler.post_idle(Some(timeout), task)
            }
            TickStrategy::Immediate => self.scheduler.post(task),
            TickStrategy::Timer => self.scheduler.post_timer(Duration::ZERO, task),
        };
        self.flush.pending = Some(id);
        debug!(strategy = ?self.settings().tick_strategy, "beacon queued");
    }

    /// Run the queued flush now.
    #[instrument(name = "beacon.flush", skip(self), fields(page_id = %self.id(), n = Empty))]
    pub fn real_send_beacon(&mut self) -> FlushOutcome {
        if !self.flush.queued || self.flush.flushing {
            return FlushOutcome::NotQueued;
        }
        if let Some(id) = self.flush.pending.take() {
            let _ = self.scheduler.cancel(id);
        }
        self.flush.queued = false;
        self.flush.flushing = true;
        let url_override = self.flush.url_override.take();

        let outcome = self.flush_queued(url_override);

        self.flush.flushing = false;
        match outcome {
            FlushOutcome::Sent(delivery) => info!(delivery = delivery.as_str(), "beacon sent"),
            FlushOutcome::TransportFailed => {}
            other => debug!(outcome = ?other, "flush aborted"),
        }
        outcome
    }

    fn flush_queued(&mut self, url_override: Option<String>) -> FlushOutcome {
        if !self.gate_ready() {
            return FlushOutcome::NotReady;
        }
        if !self.alive {
            return FlushOutcome::Dead;
        }

        let n = self.flush.beacons_sent + 1;
        let _ = Span::current().record("n", n);
        self.apply_url_fields();
        self.apply_derived_fields(n);

        let detail = EventData::Vars(self.vars().snapshot());
        let _ = self.fire_event(names::BEFORE_BEACON, &detail);

        let snapshot = self.vars().snapshot();
        let vars = self.vars_mut();
        vars.remove_vars(TRANSIENT_FIELDS.iter().copied());
        vars.clear_single_beacon();

        if constants::is_page_load_initiator(snapshot.get_str(fields::INITIATOR)) && !self.flush.page_load_sent {
            self.flush.page_load_sent = true;
            let _ = self.post_task(|page: &mut Page| {
                let _ = page.fire_event(names::PAGE_LOAD_BEACON, &EventData::None);
            });
            debug!("page-load beacon latched");
        }

        if self.flush.rate_limited {
            return FlushOutcome::RateLimited;
        }
        if snapshot.is_empty() {
            return FlushOutcome::EmptyPayload;
        }
        let url = url_override.unwrap_or_else(|| self.settings().beacon_url.clone());
        if url.is_empty() {
            return FlushOutcome::NoUrl;
        }
        if !self.allowed.is_empty() && !self.allowed.iter().any(|re| re.is_match(&url)) {
            debug!(url = %url, "destination not in beacon_urls_allowed");
            return FlushOutcome::Disallowed;
        }

        self.flush.beacons_sent = n;
        let _ = self.fire_event(names::BEACON, &EventData::Vars(snapshot.clone()));

        match self.transport.send(&url, &snapshot, self.settings()) {
            Ok(delivery) => FlushOutcome::Sent(delivery),
            Err(err) => {
                warn!(url = %url, error = %err, "beacon dropped");
                self.tally.record(err.to_string());
                FlushOutcome::TransportFailed
            }
        }
    }

    /// Readiness Gate. A failing completion check counts as not ready.
    fn gate_ready(&mut self) -> bool {
        match self.plugins().ready_to_send() {
            Ok(ready) => ready,
            Err(err) => {
                warn!(error = %err, "completion check failed");
                self.tally.record(err.to_string());
                false
            }
        }
    }

    fn apply_url_fields(&mut self) {
        let strip = self.settings().strip_query;
        let limit = self.settings().url_limit;
        let page_url = cleanup_url(&self.env.url, strip, limit);
        let referrer = self
            .env
            .referrer
            .as_deref()
            .filter(|r| !r.is_empty())
            .map(|r| cleanup_url(r, strip, limit));

        let vars = self.vars_mut();
        let url = match vars.get_str(fields::URL) {
            Some(u) => cleanup_url(&u, strip, limit),
            None => page_url.clone(),
        };
        if !url.is_empty() {
            vars.add_var(fields::URL, url.clone(), false);
        }
        if page_url.is_empty() || page_url == url {
            vars.remove_var(fields::PAGE_URL);
        } else {
            vars.add_var(fields::PAGE_URL, page_url, false);
        }
        if let Some(referrer) = referrer {
            vars.add_var(fields::REFERRER, referrer, false);
        }
    }

    fn apply_derived_fields(&mut self, n: u64) {
        let now = self.now_ms();
        let page_id = self.id().to_string();
        let session = self.session_fields();
        let visibility = self.visibility.state();
        let last_visible = self.visibility.since_visible(now);
        let last_hidden = self.visibility.since_hidden(now);
        let platform = self.env.platform.clone();
        let vendor = self.env.vendor.clone();
        let in_loader_frame = self.env.in_loader_frame;
        let errors = self.tally.drain();

        let vars = self.vars_mut();
        vars.add_var(fields::VERSION, constants::VERSION, false);
        vars.add_var(fields::PAGE_ID, page_id, false);
        vars.add_var(fields::SEQUENCE, n, false);
        for (name, value) in session.into_iter().flatten() {
            vars.add_var(name, value, false);
        }
        vars.add_var(fields::VIS_STATE, visibility.as_str(), false);
        if let Some(ms) = last_visible {
            vars.add_var(fields::VIS_LAST_VISIBLE, ms, false);
        }
        if let Some(ms) = last_hidden {
            vars.add_var(fields::VIS_LAST_HIDDEN, ms, false);
        }
        if let Some(platform) = platform {
            vars.add_var(fields::PLATFORM, platform, false);
        }
        if let Some(vendor) = vendor {
            vars.add_var(fields::VENDOR, vendor, false);
        }
        if let Some(errors) = errors {
            vars.add_var(fields::ERRORS, errors, false);
        }
        if in_loader_frame {
            vars.add_var(fields::IFRAME, "", false);
        }
    }

    /// Completion of a dynamic (non page-load) transaction.
    ///
    /// Polls the Readiness Gate every `response_end_retry_ms` until it
    /// passes, and holds non-SPA transactions until the page-load beacon
    /// has been flushed. Then flushes any queued beacon so this
    /// transaction gets its own, and fires `xhr_load`.
    pub fn response_end(&mut self, request: RequestInfo) {
        if !self.gate_ready() {
            let retry_ms = self.settings().response_end_retry_ms;
            debug!(url = %request.url, retry_ms, "producers not ready, retrying response_end");
            let _ = self.post_timer(Duration::from_millis(retry_ms), move |page: &mut Page| {
                page.response_end(request);
            });
            return;
        }

        if !self.flush.page_load_sent && !constants::is_spa_initiator(request.initiator.as_deref()) {
            debug!(url = %request.url, "holding dynamic request until the page-load beacon");
            let _ = self.subscribe(
                names::PAGE_LOAD_BEACON,
                callback(move |page: &mut Page, _, _| {
                    page.response_end(request.clone());
                    Ok(())
                }),
                None,
                None,
                true,
            );
            return;
        }

        if self.flush.queued {
            let _ = self.real_send_beacon();
        }
        let group = request.name.clone().unwrap_or_else(|| request.url.clone());
        if !group.is_empty() {
            self.vars_mut().add_var(fields::XHR_PAGE_GROUP, group, true);
        }
        self.timers_mut().start(fields::T_DONE, request.start_ms);
        let _ = self.fire_event(names::XHR_LOAD, &EventData::Request(request));
    }

    /// [`response_end`](Self::response_end) for a named timed transaction.
    pub fn response_end_named(&mut self, name: &str, start_ms: u64, data: Option<Value>, end_ms: Option<u64>) {
        let request = RequestInfo {
            name: Some(name.to_string()),
            start_ms,
            end_ms,
            data,
            ..RequestInfo::default()
        };
        self.response_end(request);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::PageOptions;
    use assert_matches::assert_matches;
    use beacon_settings::BeaconSettings;
    use beacon_transport::Recorder;

    fn page_with(settings: BeaconSettings) -> (Page, Recorder) {
        let recorder = Recorder::new();
        let options = PageOptions {
            url: "https://site.example/home?q=1#frag".into(),
            referrer: Some("https://ref.example/".into()),
            round_trip: false,
            ..PageOptions::default()
        };
        let page = Page::new(settings, recorder.transport(), options).unwrap();
        (page, recorder)
    }

    fn settings() -> BeaconSettings {
        BeaconSettings {
            beacon_url: "https://collector.example/beacon".into(),
            beacon_disable_sendbeacon: true,
            tick_strategy: TickStrategy::Immediate,
            ..BeaconSettings::default()
        }
    }

    #[test]
    fn state_transitions() {
        let (mut page, _) = page_with(settings());
        assert_eq!(page.flush_state(), FlushState::Idle);
        page.send_beacon(None);
        assert_eq!(page.flush_state(), FlushState::Queued);
        let _ = page.run_until_idle();
        assert_eq!(page.flush_state(), FlushState::Idle);
        assert_eq!(page.beacons_sent(), 1);
    }

    #[test]
    fn flush_without_queue_is_noop() {
        let (mut page, recorder) = page_with(settings());
        assert_eq!(page.real_send_beacon(), FlushOutcome::NotQueued);
        assert_eq!(recorder.count(), 0);
    }

    #[test]
    fn derived_fields_present() {
        let (mut page, recorder) = page_with(settings());
        page.send_beacon(None);
        let _ = page.run_until_idle();
        let sent = recorder.sent();
        let beacon = &sent[0];
        assert_eq!(beacon.param("v").as_deref(), Some(constants::VERSION));
        assert_eq!(beacon.param("u").as_deref(), Some("https://site.example/home?q=1"));
        assert_eq!(beacon.param("r").as_deref(), Some("https://ref.example/"));
        assert_eq!(beacon.param("n").as_deref(), Some("1"));
        assert_eq!(beacon.param("pid").as_deref(), Some(page.id().as_str()));
        assert_eq!(beacon.param("vis.st").as_deref(), Some("visible"));
        assert!(beacon.param("pgu").is_none());
        assert!(beacon.param("if").is_none());
    }

    #[test]
    fn transient_fields_cleared_after_flush() {
        let (mut page, _) = page_with(settings());
        page.vars_mut().add_var("keep", 1, false);
        page.send_beacon(None);
        let _ = page.run_until_idle();
        assert!(page.vars().has_var("keep"));
        for name in TRANSIENT_FIELDS {
            assert!(!page.vars().has_var(name), "{name} survived the flush");
        }
    }

    #[test]
    fn sequence_counts_only_transmitted_beacons() {
        let (mut page, recorder) = page_with(settings());
        page.send_beacon(None);
        let _ = page.run_until_idle();
        page.send_beacon(Some(String::new()));
        assert_eq!(page.real_send_beacon(), FlushOutcome::NoUrl);
        page.send_beacon(None);
        assert_eq!(page.real_send_beacon(), FlushOutcome::Sent(Delivery::Image));
        let sent = recorder.sent();
        assert_eq!(sent[1].param("n").as_deref(), Some("2"));
        assert_eq!(page.beacons_sent(), 2);
    }

    #[test]
    fn url_override_applies_once() {
        let (mut page, recorder) = page_with(settings());
        page.send_beacon(Some("https://other.example/b".into()));
        let _ = page.run_until_idle();
        page.send_beacon(None);
        let _ = page.run_until_idle();
        let sent = recorder.sent();
        assert!(sent[0].url.starts_with("https://other.example/b?"));
        assert!(sent[1].url.starts_with("https://collector.example/beacon?"));
    }

    #[test]
    fn strip_query_and_pgu() {
        let (mut page, recorder) = page_with(BeaconSettings {
            strip_query: true,
            ..settings()
        });
        page.vars_mut().add_var("u", "https://api.example/data?id=7", false);
        page.send_beacon(None);
        let _ = page.run_until_idle();
        let beacon = &recorder.sent()[0];
        assert_eq!(beacon.param("u").as_deref(), Some("https://api.example/data?qs-redacted"));
        assert_eq!(beacon.param("pgu").as_deref(), Some("https://site.example/home?qs-redacted"));
    }

    #[test]
    fn missing_url_aborts() {
        let (mut page, recorder) = page_with(BeaconSettings {
            beacon_url: String::new(),
            ..settings()
        });
        page.send_beacon(None);
        assert_eq!(page.real_send_beacon(), FlushOutcome::NoUrl);
        assert_eq!(recorder.count(), 0);
        assert_eq!(page.beacons_sent(), 0);
    }

    #[test]
    fn rate_limited_skips_transport_but_latches() {
        let (mut page, recorder) = page_with(settings());
        page.set_rate_limited(true);
        page.send_beacon(None);
        assert_eq!(page.real_send_beacon(), FlushOutcome::RateLimited);
        assert_eq!(recorder.count(), 0);
        assert!(page.has_sent_page_load_beacon());
    }

    #[test]
    fn dead_page_does_not_flush() {
        let (mut page, recorder) = page_with(settings());
        page.send_beacon(None);
        page.alive = false;
        assert_eq!(page.real_send_beacon(), FlushOutcome::Dead);
        assert_eq!(recorder.count(), 0);
    }

    #[test]
    fn transport_failure_is_tallied() {
        let (mut page, recorder) = page_with(settings());
        recorder.fail_image(true);
        page.send_beacon(None);
        assert_matches!(page.real_send_beacon(), FlushOutcome::TransportFailed);
        assert_eq!(page.tally().len(), 1);

        recorder.fail_image(false);
        page.send_beacon(None);
        let _ = page.run_until_idle();
        let errors = recorder.sent()[0].param("errors");
        assert!(errors.is_some_and(|e| e.contains("image beacon unavailable")));
    }

    #[test]
    fn loader_frame_and_user_agent_fields() {
        let recorder = Recorder::new();
        let options = PageOptions {
            url: "https://site.example/".into(),
            platform: Some("Linux x86_64".into()),
            vendor: Some("Example Inc.".into()),
            in_loader_frame: true,
            round_trip: false,
            ..PageOptions::default()
        };
        let mut page = Page::new(settings(), recorder.transport(), options).unwrap();
        page.send_beacon(None);
        let _ = page.run_until_idle();
        let beacon = &recorder.sent()[0];
        assert_eq!(beacon.param("if").as_deref(), Some(""));
        assert_eq!(beacon.param("ua.plt").as_deref(), Some("Linux x86_64"));
        assert_eq!(beacon.param("ua.vnd").as_deref(), Some("Example Inc."));
    }

    #[test]
    fn flush_before_notify() {
        let (mut page, recorder) = page_with(settings());
        page.register_event("custom");
        page.send_beacon(None);
        let _ = page.fire_event("custom", &EventData::None);
        assert_eq!(recorder.count(), 1);
        assert_eq!(page.flush_state(), FlushState::Idle);
        let _ = page.run_until_idle();
        assert_eq!(recorder.count(), 1);
    }

    #[test]
    fn abort_reason_logged() {
        let (logs, _guard) = beacon_core::logging::capture_logs();
        let (mut page, _) = page_with(BeaconSettings {
            beacon_url: String::new(),
            ..settings()
        });
        page.send_beacon(None);
        let _ = page.real_send_beacon();
        let aborted = logs.find("flush aborted").unwrap();
        assert_eq!(aborted.level, tracing::Level::DEBUG);
        assert_eq!(aborted.field("outcome"), Some("NoUrl"));
    }

    #[test]
    fn post_fallback_logged_at_warn() {
        let (logs, _guard) = beacon_core::logging::capture_logs();
        let (mut page, recorder) = page_with(BeaconSettings {
            beacon_type: beacon_settings::BeaconType::Post,
            ..settings()
        });
        recorder.fail_primary(true);
        page.send_beacon(None);
        assert_eq!(page.real_send_beacon(), FlushOutcome::Sent(Delivery::PostSecondary));
        assert!(logs.has_event(tracing::Level::WARN, "secondary context"));
    }
}
