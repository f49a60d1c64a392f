//! Browser session tracking.
//!
//! A session spans page loads within one site domain. Persistence sits
//! behind [`SessionStore`]; cookie I/O is the host's concern.

use std::collections::HashMap;

use beacon_core::SessionId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Persisted session state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// Session id (client generated, server may override).
    pub id: SessionId,
    /// Session start, epoch milliseconds.
    pub start_ms: i64,
    /// Number of pages in this session.
    pub length: u32,
    /// Last activity, epoch milliseconds.
    pub last_active_ms: i64,
}

impl SessionState {
    /// A new session starting at `now_ms`.
    #[must_use]
    pub fn start(now_ms: i64) -> Self {
        Self {
            id: SessionId::generate(),
            start_ms: now_ms,
            length: 0,
            last_active_ms: now_ms,
        }
    }

    /// Whether the session was idle longer than `expiry_ms` at `now_ms`.
    pub fn is_expired(&self, now_ms: i64, expiry_ms: u64) -> bool {
        let expiry = i64::try_from(expiry_ms).unwrap_or(i64::MAX);
        now_ms.saturating_sub(self.last_active_ms) > expiry
    }
}

/// Load/save of session state per site domain.
pub trait SessionStore: Send + Sync {
    /// Stored session for `domain`.
    fn load(&self, domain: &str) -> Option<SessionState>;

    /// Persist the session for `domain`.
    fn save(&self, domain: &str, state: &SessionState);
}

/// In-process session store.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, SessionState>>,
}

impl MemorySessionStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, domain: &str) -> Option<SessionState> {
        self.sessions.lock().get(domain).cloned()
    }

    fn save(&self, domain: &str, state: &SessionState) {
        let _ = self
            .sessions
            .lock()
            .insert(domain.to_string(), state.clone());
    }
}

/// Resume or start the session for a new page at `now_ms`.
///
/// Counts this page toward the session length and persists the result.
pub fn begin_page(store: &dyn SessionStore, domain: &str, now_ms: i64, expiry_ms: u64) -> SessionState {
    let mut state = match store.load(domain) {
        Some(existing) if !existing.is_expired(now_ms, expiry_ms) => existing,
        Some(expired) => {
            debug!(domain, session = %expired.id, "session expired, starting new one");
            SessionState::start(now_ms)
        }
        None => SessionState::start(now_ms),
    };
    state.length += 1;
    state.last_active_ms = now_ms;
    store.save(domain, &state);
    state
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
