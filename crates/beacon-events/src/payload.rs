//! Event payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use beacon_vars::Snapshot;

/// Data carried by a fired event.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum EventData {
    /// No payload.
    #[default]
    None,
    /// Beacon variables (`before_beacon`, `beacon`).
    Vars(Snapshot),
    /// A completed dynamic request or navigation (`xhr_load`, `spa_navigation`).
    Request(RequestInfo),
    /// New visibility state (`visibility_changed`).
    Visibility(VisibilityState),
    /// Free-form payload from producers.
    Value(Value),
}

impl EventData {
    /// The snapshot, if this payload carries variables.
    pub fn as_vars(&self) -> Option<&Snapshot> {
        match self {
            Self::Vars(s) => Some(s),
            _ => None,
        }
    }

    /// The request, if this payload carries one.
    pub fn as_request(&self) -> Option<&RequestInfo> {
        match self {
            Self::Request(r) => Some(r),
            _ => None,
        }
    }

    /// JSON form handed to the public mirror.
    pub fn to_json(&self) -> Value {
        match self {
            Self::None => Value::Null,
            Self::Vars(s) => Value::Object(s.vars().iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
            Self::Request(r) => serde_json::to_value(r).unwrap_or(Value::Null),
            Self::Visibility(v) => Value::String(v.as_str().to_string()),
            Self::Value(v) => v.clone(),
        }
    }
}

/// Timing and identity of a dynamic request or in-page navigation.
///
/// Times are milliseconds relative to navigation start.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestInfo {
    /// Transaction name (`xhr_<name>` for named timers).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Request URL. Empty for named transactions.
    pub url: String,
    /// Beacon initiator (`xhr`, `spa`, `spa_hard`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initiator: Option<String>,
    /// Start time.
    pub start_ms: u64,
    /// End time (`loadEventEnd` of the transaction).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_ms: Option<u64>,
    /// Extra producer data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RequestInfo {
    /// A request for `url` started at `start_ms`.
    #[must_use]
    pub fn new(url: impl Into<String>, start_ms: u64) -> Self {
        Self {
            url: url.into(),
            start_ms,
            ..Self::default()
        }
    }

    /// Set the initiator.
    #[must_use]
    pub fn with_initiator(mut self, initiator: impl Into<String>) -> Self {
        self.initiator = Some(initiator.into());
        self
    }

    /// Set the end time.
    #[must_use]
    pub fn with_end(mut self, end_ms: u64) -> Self {
        self.end_ms = Some(end_ms);
        self
    }

    /// Duration, when both ends are known.
    pub fn duration_ms(&self) -> Option<u64> {
        self.end_ms.map(|end| end.saturating_sub(self.start_ms))
    }
}

/// Document visibility.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisibilityState {
    /// Page is shown.
    #[default]
    Visible,
    /// Page is in a background tab or minimized.
    Hidden,
    /// Page is being prerendered.
    Prerender,
}

impl VisibilityState {
    /// Wire value for `vis.st`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Visible => "visible",
            Self::Hidden => "hidden",
            Self::Prerender => "prerender",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
