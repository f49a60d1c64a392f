//! Event bus.
//!
//! Keeps an ordered subscriber list per canonical event name. The bus lives
//! inside the context its callbacks mutate, so firing is a free function over
//! any [`BusHost`]: the subscriber list is cloned first, then each callback
//! receives `&mut C`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::errors::BusError;
use crate::names;
use crate::payload::EventData;

/// Subscriber callback: context, event payload, subscription data.
pub type Callback<C> =
    Arc<dyn Fn(&mut C, &EventData, Option<&Value>) -> Result<(), BusError> + Send + Sync>;

/// Wrap a closure as a [`Callback`].
pub fn callback<C, F>(f: F) -> Callback<C>
where
    F: Fn(&mut C, &EventData, Option<&Value>) -> Result<(), BusError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Receives mirrored public events (`onBeacon`, `onBeforeBeacon`, ...).
pub trait EventMirror: Send + Sync {
    /// Dispatch a public event with its JSON detail.
    fn dispatch(&self, public_name: &str, detail: &Value) -> Result<(), BusError>;
}

/// A context that owns an [`EventBus`] over itself.
pub trait BusHost: Sized {
    /// Shared access to the bus.
    fn bus(&self) -> &EventBus<Self>;

    /// Mutable access to the bus.
    fn bus_mut(&mut self) -> &mut EventBus<Self>;
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

struct Subscriber<C> {
    id: SubscriptionId,
    callback: Callback<C>,
    data: Option<Value>,
    scope: Option<String>,
    once: bool,
}

impl<C> Clone for Subscriber<C> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            callback: Arc::clone(&self.callback),
            data: self.data.clone(),
            scope: self.scope.clone(),
            once: self.once,
        }
    }
}

impl<C> Subscriber<C> {
    fn same_as(&self, callback: &Callback<C>, data: Option<&Value>, scope: Option<&str>) -> bool {
        Arc::ptr_eq(&self.callback, callback)
            && self.data.as_ref() == data
            && self.scope.as_deref() == scope
    }
}

/// Outcome of one [`fire`] pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FireReport {
    /// Canonical event name.
    pub event: String,
    /// Whether the event was registered at fire time.
    pub registered: bool,
    /// Number of callbacks invoked.
    pub invoked: usize,
    /// Messages of callbacks that returned an error.
    pub failures: Vec<String>,
}

impl FireReport {
    /// Whether every invoked callback succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Named-event registry.
pub struct EventBus<C> {
    events: HashMap<String, Vec<Subscriber<C>>>,
    next_id: u64,
    mirror: Option<Arc<dyn EventMirror>>,
}

impl<C> Default for EventBus<C> {
    fn default() -> Self {
        Self {
            events: HashMap::new(),
            next_id: 0,
            mirror: None,
        }
    }
}

impl<C> EventBus<C> {
    /// Empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty subscriber list for `name` if it is unknown.
    pub fn register_event(&mut self, name: &str) {
        let _ = self.events.entry(names::canonicalize(name)).or_default();
    }

    /// Whether `name` has been registered.
    pub fn is_registered(&self, name: &str) -> bool {
        self.events.contains_key(&names::canonicalize(name))
    }

    /// Number of subscribers currently attached to `name`.
    pub fn subscriber_count(&self, name: &str) -> usize {
        self.events
            .get(&names::canonicalize(name))
            .map_or(0, Vec::len)
    }

    /// Subscribe to `name`, registering it if needed.
    ///
    /// Subscribing the same callback with the same data and scope again
    /// returns the existing subscription.
    pub fn subscribe(
        &mut self,
        name: &str,
        callback: Callback<C>,
        data: Option<Value>,
        scope: Option<String>,
        once: bool,
    ) -> SubscriptionId {
        let event = names::canonicalize(name);
        let subscribers = self.events.entry(event.clone()).or_default();

        if let Some(existing) = subscribers
            .iter()
            .find(|s| s.same_as(&callback, data.as_ref(), scope.as_deref()))
        {
            trace!(event = %event, id = %existing.id, "duplicate subscription ignored");
            return existing.id;
        }

        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        subscribers.push(Subscriber {
            id,
            callback,
            data,
            scope,
            once,
        });
        debug!(event = %event, id = %id, once, "subscribed");
        id
    }

    /// Remove a subscription. Returns `true` if it existed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        for subscribers in self.events.values_mut() {
            let before = subscribers.len();
            subscribers.retain(|s| s.id != id);
            if subscribers.len() < before {
                return true;
            }
        }
        false
    }

    /// Install the public event mirror.
    pub fn set_mirror(&mut self, mirror: Arc<dyn EventMirror>) {
        self.mirror = Some(mirror);
    }

    /// Drop every event and subscriber.
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl<C> fmt::Debug for EventBus<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("events", &self.events.len())
            .field("subscribers", &self.events.values().map(Vec::len).sum::<usize>())
            .field("mirror", &self.mirror.is_some())
            .finish()
    }
}

/// Fire `name` on the bus owned by `ctx`.
///
/// No-op for unregistered events. Subscribers added by a callback during
/// this pass run on the next fire. Callback errors are logged and collected
/// in the report; they never stop the pass.
pub fn fire<C: BusHost>(ctx: &mut C, name: &str, data: &EventData) -> FireReport {
    let event = names::canonicalize(name);
    let Some(subscribers) = ctx.bus().events.get(&event).cloned() else {
        trace!(event = %event, "fire on unregistered event");
        return FireReport {
            event,
            ..FireReport::default()
        };
    };

    if let (Some(mirror), Some(public)) = (ctx.bus().mirror.clone(), names::public_name(&event)) {
        if let Err(err) = mirror.dispatch(public, &data.to_json()) {
            warn!(event = %event, public, error = %err, "public event dispatch failed");
        }
    }

    let mut report = FireReport {
        event,
        registered: true,
        ..FireReport::default()
    };

    for subscriber in &subscribers {
        report.invoked += 1;
        if let Err(err) = (subscriber.callback)(ctx, data, subscriber.data.as_ref()) {
            warn!(
                event = %report.event,
                id = %subscriber.id,
                scope = subscriber.scope.as_deref().unwrap_or(""),
                error = %err,
                "subscriber failed"
            );
            report.failures.push(err.to_string());
        }
    }

    let fired_once: Vec<SubscriptionId> = subscribers
        .iter()
        .filter(|s| s.once)
        .map(|s| s.id)
        .collect();
    if !fired_once.is_empty() {
        if let Some(list) = ctx.bus_mut().events.get_mut(&report.event) {
            list.retain(|s| !fired_once.contains(&s.id));
        }
    }

    report
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
