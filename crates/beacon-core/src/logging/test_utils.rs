//! In-memory log sink for tests.
//!
//! Swallowed failures surface only through logs and the error tally, so
//! tests install a [`LogSink`] on the current thread and read it back.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

/// One recorded event.
#[derive(Clone, Debug)]
pub struct LogRecord {
    /// Event level.
    pub level: Level,
    /// The `message` field.
    pub message: String,
    /// Every other field, rendered, in emission order.
    pub fields: IndexMap<String, String>,
}

impl LogRecord {
    /// Rendered value of field `key`.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

/// Shared buffer of [`LogRecord`]s.
#[derive(Clone, Default)]
pub struct LogSink(Arc<Mutex<Vec<LogRecord>>>);

impl LogSink {
    /// Copy of everything recorded so far.
    pub fn records(&self) -> Vec<LogRecord> {
        self.0.lock().clone()
    }

    /// First record whose message contains `needle`.
    pub fn find(&self, needle: &str) -> Option<LogRecord> {
        self.0.lock().iter().find(|r| r.message.contains(needle)).cloned()
    }

    /// Whether a record at `level` mentions `needle`.
    pub fn has_event(&self, level: Level, needle: &str) -> bool {
        self.0
            .lock()
            .iter()
            .any(|r| r.level == level && r.message.contains(needle))
    }
}

impl<S: Subscriber> Layer<S> for LogSink {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut record = LogRecord {
            level: *event.metadata().level(),
            message: String::new(),
            fields: IndexMap::new(),
        };
        event.record(&mut record);
        self.0.lock().push(record);
    }
}

impl Visit for LogRecord {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value.to_owned());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, format!("{value:?}"));
    }
}

impl LogRecord {
    fn put(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = value;
        } else {
            let _ = self.fields.insert(field.name().to_owned(), value);
        }
    }
}

/// Record every event emitted on this thread until the guard drops.
pub fn capture_logs() -> (LogSink, DefaultGuard) {
    let sink = LogSink::default();
    let guard = tracing_subscriber::registry().with(sink.clone()).set_default();
    (sink, guard)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
