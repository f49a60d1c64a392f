//! Internal error tally.
//!
//! Producer and transport failures are swallowed at their call sites and
//! recorded here instead. The coordinator drains the tally into the `errors`
//! field of the next beacon.

use indexmap::IndexMap;

/// De-duplicated error accumulator (message → occurrence count).
///
/// Messages keep first-seen order so the summary is deterministic.
#[derive(Clone, Debug, Default)]
pub struct ErrorTally {
    counts: IndexMap<String, usize>,
}

impl ErrorTally {
    /// Create an empty tally.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one occurrence of `message`.
    pub fn record(&mut self, message: impl Into<String>) {
        *self.counts.entry(message.into()).or_insert(0) += 1;
    }

    /// Number of distinct messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether nothing has been recorded since the last drain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Occurrences of a message.
    #[must_use]
    pub fn count(&self, message: &str) -> usize {
        self.counts.get(message).copied().unwrap_or(0)
    }

    /// Render the summary without clearing.
    ///
    /// One line per message, suffixed with ` (*N)` when it occurred more
    /// than once, joined by `\n`.
    #[must_use]
    pub fn summary(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        let lines: Vec<String> = self
            .counts
            .iter()
            .map(|(message, &count)| {
                if count > 1 {
                    format!("{message} (*{count})")
                } else {
                    message.to_string()
                }
            })
            .collect();
        Some(lines.join("\n"))
    }

    /// Render the summary and reset the tally for the next cycle.
    pub fn drain(&mut self) -> Option<String> {
        let summary = self.summary();
        self.counts.clear();
        summary
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
