//! The per-page context.
//!
//! A [`Page`] owns everything one page load needs: settings, the variable
//! store, the event bus, the plugin registry, the transport, and the task
//! queue. Producers and subscribers receive `&mut Page`; there is no
//! ambient global state, so independent pages can coexist in one process.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use beacon_core::constants::fields;
use beacon_core::{BeaconError, ErrorTally, PageId, Result, SessionId};
use beacon_events::{
    BusHost, Callback, EventBus, EventData, EventMirror, FireReport, SubscriptionId,
    VisibilityState, names,
};
use beacon_plugins::{Plugin, PluginRegistry};
use beacon_settings::BeaconSettings;
use beacon_transport::Transport;
use beacon_vars::VarStore;
use regex::Regex;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::coordinator::FlushControl;
use crate::frame::FrameAccess;
use crate::lifecycle::{LifecycleTracker, NativeEvent, VisibilityTracker};
use crate::scheduler::{Scheduler, TaskId};
use crate::session::{MemorySessionStore, SessionState, SessionStore, begin_page};
use crate::timing::{self, NamedTimers};

/// Facts about the hosting document.
#[derive(Clone)]
pub struct PageOptions {
    /// Document URL (`u`, `pgu`).
    pub url: String,
    /// Document referrer (`r`).
    pub referrer: Option<String>,
    /// Platform string (`ua.plt`).
    pub platform: Option<String>,
    /// Vendor string (`ua.vnd`).
    pub vendor: Option<String>,
    /// Running in a loader frame distinct from the top window (`if`).
    pub in_loader_frame: bool,
    /// Visibility when the page starts.
    pub visibility: VisibilityState,
    /// Session persistence. Defaults to an in-memory store.
    pub session_store: Option<Arc<dyn SessionStore>>,
    /// Install the built-in round-trip producer.
    pub round_trip: bool,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            url: String::new(),
            referrer: None,
            platform: None,
            vendor: None,
            in_loader_frame: false,
            visibility: VisibilityState::Visible,
            session_store: None,
            round_trip: true,
        }
    }
}

impl fmt::Debug for PageOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageOptions")
            .field("url", &self.url)
            .field("visibility", &self.visibility)
            .field("round_trip", &self.round_trip)
            .finish_non_exhaustive()
    }
}

/// Document facts carried into derived fields.
#[derive(Clone, Debug)]
pub(crate) struct PageEnv {
    pub(crate) url: String,
    pub(crate) referrer: Option<String>,
    pub(crate) platform: Option<String>,
    pub(crate) vendor: Option<String>,
    pub(crate) in_loader_frame: bool,
}

/// One page load.
pub struct Page {
    id: PageId,
    settings: BeaconSettings,
    pub(crate) allowed: Vec<Regex>,
    vars: VarStore,
    bus: EventBus<Page>,
    plugins: PluginRegistry,
    pub(crate) transport: Transport,
    pub(crate) scheduler: Scheduler<Page>,
    pub(crate) tally: ErrorTally,
    pub(crate) flush: FlushControl,
    session: Option<SessionState>,
    session_store: Arc<dyn SessionStore>,
    lifecycle: LifecycleTracker,
    pub(crate) visibility: VisibilityTracker,
    timers: NamedTimers,
    pub(crate) env: PageEnv,
    nav_start: Instant,
    epoch_start_ms: i64,
    pub(crate) alive: bool,
}

impl Page {
    /// Create a page. Fails if an allow-list pattern does not compile.
    pub fn new(settings: BeaconSettings, transport: Transport, options: PageOptions) -> Result<Self> {
        let allowed = compile_allow_list(&settings.beacon_urls_allowed)?;
        let session_store = options
            .session_store
            .unwrap_or_else(|| Arc::new(MemorySessionStore::new()));

        let mut page = Self {
            id: PageId::generate(),
            settings,
            allowed,
            vars: VarStore::new(),
            bus: EventBus::new(),
            plugins: PluginRegistry::new(),
            transport,
            scheduler: Scheduler::new(),
            tally: ErrorTally::new(),
            flush: FlushControl::default(),
            session: None,
            session_store,
            lifecycle: LifecycleTracker::default(),
            visibility: VisibilityTracker::new(options.visibility),
            timers: NamedTimers::default(),
            env: PageEnv {
                url: options.url,
                referrer: options.referrer,
                platform: options.platform,
                vendor: options.vendor,
                in_loader_frame: options.in_loader_frame,
            },
            nav_start: Instant::now(),
            epoch_start_ms: chrono::Utc::now().timestamp_millis(),
            alive: true,
        };

        for name in names::ALL {
            page.bus.register_event(name);
        }
        page.begin_session();
        if options.round_trip {
            let _ = timing::install(&mut page);
        }
        info!(page_id = %page.id, url = %page.env.url, "page created");
        Ok(page)
    }

    fn begin_session(&mut self) {
        if !self.settings.sessions_enabled() {
            self.session = None;
            return;
        }
        let state = begin_page(
            self.session_store.as_ref(),
            &self.settings.site_domain,
            self.epoch_ms(),
            self.settings.session_expiry_ms,
        );
        debug!(session = %state.id, length = state.length, "session resumed");
        self.session = Some(state);
    }

    // ── Accessors ────────────────────────────────────────────────────

    /// Page id (`pid`).
    pub fn id(&self) -> &PageId {
        &self.id
    }

    /// Active settings.
    pub fn settings(&self) -> &BeaconSettings {
        &self.settings
    }

    /// Variable store.
    pub fn vars(&self) -> &VarStore {
        &self.vars
    }

    /// Mutable variable store.
    pub fn vars_mut(&mut self) -> &mut VarStore {
        &mut self.vars
    }

    /// Plugin registry.
    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    /// Mutable plugin registry.
    pub fn plugins_mut(&mut self) -> &mut PluginRegistry {
        &mut self.plugins
    }

    /// Internal error tally.
    pub fn tally(&self) -> &ErrorTally {
        &self.tally
    }

    /// Named timers.
    pub fn timers_mut(&mut self) -> &mut NamedTimers {
        &mut self.timers
    }

    /// Current session, when sessions are enabled.
    pub fn session(&self) -> Option<&SessionState> {
        self.session.as_ref()
    }

    /// Current visibility.
    pub fn visibility(&self) -> VisibilityState {
        self.visibility.state()
    }

    /// Whether the page has not been torn down.
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Whether `page_ready` has fired.
    pub fn is_ready(&self) -> bool {
        self.lifecycle.is_ready()
    }

    /// Milliseconds since navigation start.
    pub fn now_ms(&self) -> u64 {
        u64::try_from(self.nav_start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Wall-clock epoch milliseconds.
    pub fn epoch_ms(&self) -> i64 {
        let elapsed = i64::try_from(self.nav_start.elapsed().as_millis()).unwrap_or(i64::MAX);
        self.epoch_start_ms.saturating_add(elapsed)
    }

    // ── Configuration ────────────────────────────────────────────────

    /// Replace the settings, re-initialize plugins, and fire `config`.
    pub fn configure(&mut self, settings: BeaconSettings) -> Result<()> {
        self.allowed = compile_allow_list(&settings.beacon_urls_allowed)?;
        let session_scope_changed = settings.site_domain != self.settings.site_domain;
        self.settings = settings;
        if session_scope_changed {
            self.begin_session();
        }
        for err in self.plugins.init_all(&self.settings) {
            self.tally.record(err.to_string());
        }

        let mut public = self.settings.clone();
        public.beacon_auth_token = None;
        let detail = serde_json::to_value(&public)?;
        let _ = self.fire_event(names::CONFIG, &EventData::Value(detail));
        Ok(())
    }

    /// Register and initialize a producer plugin.
    pub fn register_plugin(&mut self, plugin: Arc<dyn Plugin>) {
        if let Err(err) = plugin.init(&self.settings) {
            warn!(name = %plugin.name(), error = %err, "plugin init failed");
            self.tally.record(err.to_string());
        }
        self.plugins.register(plugin);
    }

    /// Producer-set rate limiting. A rate-limited page completes flush
    /// bookkeeping but transmits nothing.
    pub fn set_rate_limited(&mut self, limited: bool) {
        self.flush.rate_limited = limited;
    }

    /// Adopt a server-assigned session id.
    pub fn set_session_id(&mut self, id: SessionId) {
        if let Some(state) = self.session.as_mut() {
            state.id = id;
            self.session_store.save(&self.settings.site_domain, state);
        }
    }

    /// Record an internal error for the next beacon's `errors` field.
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.tally.record(message);
    }

    /// Start a named timer now.
    pub fn start_timer(&mut self, name: &str) {
        let now = self.now_ms();
        self.timers.start(name, now);
    }

    /// End a named timer now, returning its duration.
    pub fn end_timer(&mut self, name: &str) -> Option<u64> {
        let now = self.now_ms();
        self.timers.end(name, now)
    }

    // ── Events ───────────────────────────────────────────────────────

    /// Register an event name.
    pub fn register_event(&mut self, name: &str) {
        self.bus.register_event(name);
    }

    /// Subscribe to an event.
    ///
    /// The first subscription to a lifecycle event attaches the native
    /// listener that feeds it.
    pub fn subscribe(
        &mut self,
        name: &str,
        callback: Callback<Page>,
        data: Option<Value>,
        scope: Option<String>,
        once: bool,
    ) -> SubscriptionId {
        let canonical = names::canonicalize(name);
        if self.lifecycle.attach_for(&canonical) {
            debug!(event = %canonical, "attached native listener");
        }
        self.bus.subscribe(&canonical, callback, data, scope, once)
    }

    /// Subscribe without data or scope.
    pub fn on(&mut self, name: &str, callback: Callback<Page>) -> SubscriptionId {
        self.subscribe(name, callback, None, None, false)
    }

    /// One-shot subscription without data or scope.
    pub fn once(&mut self, name: &str, callback: Callback<Page>) -> SubscriptionId {
        self.subscribe(name, callback, None, None, true)
    }

    /// Remove a subscription.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Install the public event mirror.
    pub fn set_mirror(&mut self, mirror: Arc<dyn EventMirror>) {
        self.bus.set_mirror(mirror);
    }

    /// Fire an event.
    ///
    /// Any event other than `before_beacon`/`beacon` first runs a queued
    /// flush synchronously. Subscriber failures go to the error tally.
    pub fn fire_event(&mut self, name: &str, data: &EventData) -> FireReport {
        let canonical = names::canonicalize(name);
        if !self.bus.is_registered(&canonical) {
            trace!(event = %canonical, "fire on unregistered event");
            return FireReport {
                event: canonical,
                ..FireReport::default()
            };
        }
        if !names::is_beacon_lifecycle(&canonical) && self.flush.queued && !self.flush.flushing {
            debug!(event = %canonical, "flushing queued beacon before notify");
            let _ = self.real_send_beacon();
        }

        let report = beacon_events::fire(self, &canonical, data);
        for failure in &report.failures {
            self.tally.record(format!("{}: {failure}", report.event));
        }
        report
    }

    /// Declare the page ready. Fires `page_ready` once.
    pub fn page_ready(&mut self) {
        if self.lifecycle.latch_ready() {
            let _ = self.fire_event(names::PAGE_READY, &EventData::None);
        }
    }

    /// Feed a native lifecycle signal.
    pub fn dispatch_native(&mut self, event: NativeEvent) {
        if !self.alive {
            trace!(?event, "native event after teardown ignored");
            return;
        }
        let attached = self.lifecycle.is_attached(event);
        match event {
            NativeEvent::Load => {
                if attached {
                    self.page_ready();
                }
            }
            NativeEvent::DomContentLoaded => {
                if attached && self.lifecycle.latch_dom() {
                    let _ = self.fire_event(names::DOM_LOADED, &EventData::None);
                }
            }
            NativeEvent::VisibilityChange(state) => {
                let now = self.now_ms();
                let transition = self.visibility.transition(state, now);
                if transition.changed && attached {
                    let _ = self.fire_event(names::VISIBILITY_CHANGED, &EventData::Visibility(state));
                }
                if transition.prerender_to_visible {
                    let _ = self.fire_event(names::PRERENDER_TO_VISIBLE, &EventData::None);
                }
            }
            NativeEvent::BeforeUnload => {
                if attached {
                    let _ = self.fire_event(names::BEFORE_UNLOAD, &EventData::None);
                }
            }
            NativeEvent::PageHide | NativeEvent::Unload => self.teardown(attached),
        }
    }

    fn teardown(&mut self, attached: bool) {
        if !self.lifecycle.latch_teardown() {
            trace!("redundant teardown signal ignored");
            return;
        }
        if attached {
            let _ = self.fire_event(names::PAGE_UNLOAD, &EventData::None);
        }
        if self.flush.queued {
            let outcome = self.real_send_beacon();
            debug!(?outcome, "final flush on teardown");
        }
        self.alive = false;
        self.scheduler.clear();
        info!(page_id = %self.id, beacons = self.flush.beacons_sent, "page torn down");
    }

    /// Record the result of probing an embedding frame.
    ///
    /// Returns `true` when the frame was accessible.
    pub fn probe_frame(&mut self, access: FrameAccess) -> bool {
        if let Some(message) = access.tally_message() {
            warn!(error = %message, "frame probe failed");
            self.tally.record(message);
        } else if access == FrameAccess::DeniedCrossOrigin {
            trace!("frame probe denied cross-origin");
        }
        access.is_ok()
    }

    // ── Task queue ───────────────────────────────────────────────────

    /// Run `task` on the next turn.
    pub fn post_task(&mut self, task: impl FnOnce(&mut Page) + Send + 'static) -> TaskId {
        self.scheduler.post(Box::new(task))
    }

    /// Run `task` after `delay`.
    pub fn post_timer(
        &mut self,
        delay: Duration,
        task: impl FnOnce(&mut Page) + Send + 'static,
    ) -> TaskId {
        self.scheduler.post_timer(delay, Box::new(task))
    }

    /// Number of pending tasks.
    pub fn pending_tasks(&self) -> usize {
        self.scheduler.len()
    }

    /// Run every task runnable now. Returns how many ran.
    pub fn run_until_idle(&mut self) -> usize {
        let mut ran = 0;
        while self.alive {
            let Some(task) = self.scheduler.pop_runnable(Instant::now()) else {
                break;
            };
            task(self);
            ran += 1;
        }
        ran
    }

    /// Drive the task queue against the clock until no work remains or the
    /// page is torn down.
    pub async fn run(&mut self) {
        loop {
            let _ = self.run_until_idle();
            if !self.alive {
                break;
            }
            let Some(deadline) = self.scheduler.next_deadline() else {
                break;
            };
            tokio::time::sleep_until(deadline).await;
        }
    }

    /// Session fields for the next beacon.
    pub(crate) fn session_fields(&self) -> Option<[(&'static str, Value); 3]> {
        self.session.as_ref().map(|s| {
            [
                (fields::SESSION_ID, Value::from(s.id.as_str())),
                (fields::SESSION_START, Value::from(s.start_ms)),
                (fields::SESSION_LENGTH, Value::from(s.length)),
            ]
        })
    }
}

impl BusHost for Page {
    fn bus(&self) -> &EventBus<Self> {
        &self.bus
    }

    fn bus_mut(&mut self) -> &mut EventBus<Self> {
        &mut self.bus
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("id", &self.id)
            .field("alive", &self.alive)
            .field("vars", &self.vars.len())
            .field("beacons_sent", &self.flush.beacons_sent)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

fn compile_allow_list(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|e| BeaconError::Config(format!("invalid beacon_urls_allowed entry '{p}': {e}")))
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
