//! Variable store.
//!
//! Insertion order is the "natural" order used for the middle section of
//! the query string. Overwriting a name keeps its original position.

use indexmap::{IndexMap, IndexSet};
use serde_json::Value;
use tracing::trace;

use crate::snapshot::Snapshot;

/// Beacon variables in natural (insertion) order.
pub type VarMap = IndexMap<String, Value>;

/// Position of a variable in the serialized payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Priority {
    /// Emitted before all other variables (`-1`).
    First,
    /// Emitted after all other variables (`1`).
    Last,
}

impl Priority {
    /// Map the numeric priority; anything but `-1`/`1` is `None`.
    pub fn from_i32(pri: i32) -> Option<Self> {
        match pri {
            -1 => Some(Self::First),
            1 => Some(Self::Last),
            _ => None,
        }
    }
}

/// Mutable store shared by producers, subscribers and the coordinator.
#[derive(Clone, Debug, Default)]
pub struct VarStore {
    vars: VarMap,
    single_beacon: IndexSet<String>,
    first: IndexSet<String>,
    last: IndexSet<String>,
}

impl VarStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name` to `value`, silently overwriting.
    ///
    /// With `single_beacon`, the name is removed after the next flush.
    pub fn add_var(&mut self, name: impl Into<String>, value: impl Into<Value>, single_beacon: bool) {
        let name = name.into();
        if single_beacon {
            let _ = self.single_beacon.insert(name.clone());
        }
        let _ = self.vars.insert(name, value.into());
    }

    /// Merge every pair of `vars` into the store.
    pub fn add_vars<K, V>(&mut self, vars: impl IntoIterator<Item = (K, V)>, single_beacon: bool)
    where
        K: Into<String>,
        V: Into<Value>,
    {
        for (name, value) in vars {
            self.add_var(name, value, single_beacon);
        }
    }

    /// Append to a comma-separated value, creating it if absent.
    pub fn append_var(&mut self, name: &str, value: &str) {
        let mut current = self.get_var(name).map(value_to_plain).unwrap_or_default();
        if !current.is_empty() {
            current.push(',');
        }
        current.push_str(value);
        self.add_var(name, current, false);
    }

    /// Remove one variable. Absent names are ignored.
    pub fn remove_var(&mut self, name: &str) {
        let _ = self.vars.shift_remove(name);
    }

    /// Remove several variables. Absent names are ignored.
    pub fn remove_vars<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            self.remove_var(name.as_ref());
        }
    }

    /// Whether `name` is set.
    pub fn has_var(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Current value of `name`.
    pub fn get_var(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Current value of `name` rendered as plain text.
    pub fn get_str(&self, name: &str) -> Option<String> {
        self.vars.get(name).map(value_to_plain)
    }

    /// Place `name` first (`-1`) or last (`1`) in the payload.
    ///
    /// Any other value is a no-op. Moving a name clears its other bucket.
    pub fn set_var_priority(&mut self, name: &str, pri: i32) {
        let Some(priority) = Priority::from_i32(pri) else {
            trace!(name, pri, "ignoring unsupported var priority");
            return;
        };
        let (target, other) = match priority {
            Priority::First => (&mut self.first, &mut self.last),
            Priority::Last => (&mut self.last, &mut self.first),
        };
        let _ = other.shift_remove(name);
        let _ = target.insert(name.to_string());
    }

    /// Priority bucket of `name`, if any.
    pub fn priority_of(&self, name: &str) -> Option<Priority> {
        if self.first.contains(name) {
            Some(Priority::First)
        } else if self.last.contains(name) {
            Some(Priority::Last)
        } else {
            None
        }
    }

    /// Whether `name` is marked single-use.
    pub fn is_single_beacon(&self, name: &str) -> bool {
        self.single_beacon.contains(name)
    }

    /// Live variables in natural order.
    pub fn vars(&self) -> &VarMap {
        &self.vars
    }

    /// Number of variables.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Owned copy of the variables plus the ordering buckets.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(
            self.vars.clone(),
            self.first.iter().cloned().collect(),
            self.last.iter().cloned().collect(),
        )
    }

    /// Remove every single-use variable and clear the markers.
    pub fn clear_single_beacon(&mut self) {
        let names = std::mem::take(&mut self.single_beacon);
        for name in &names {
            self.remove_var(name);
        }
    }

    /// Drop everything (page teardown).
    pub fn clear(&mut self) {
        self.vars.clear();
        self.single_beacon.clear();
        self.first.clear();
        self.last.clear();
    }
}

/// Plain-text rendering used for comma appends and string reads.
fn value_to_plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn add_overwrites_in_place() {
        let mut store = VarStore::new();
        store.add_var("a", 1, false);
        store.add_var("b", 2, false);
        store.add_var("a", 3, false);
        let names: Vec<&String> = store.vars().keys().collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(store.get_var("a"), Some(&json!(3)));
    }

    #[test]
    fn add_vars_bulk_merge() {
        let mut store = VarStore::new();
        store.add_var("keep", "x", false);
        store.add_vars([("a", json!(1)), ("b", json!("two"))], true);
        assert_eq!(store.len(), 3);
        assert!(store.is_single_beacon("a"));
        assert!(store.is_single_beacon("b"));
        assert!(!store.is_single_beacon("keep"));
    }

    #[test]
    fn append_adds_comma_separator() {
        let mut store = VarStore::new();
        store.append_var("t_other", "a|1");
        assert_eq!(store.get_str("t_other").as_deref(), Some("a|1"));
        store.append_var("t_other", "b|2");
        assert_eq!(store.get_str("t_other").as_deref(), Some("a|1,b|2"));
    }

    #[test]
    fn append_to_empty_string_has_no_leading_comma() {
        let mut store = VarStore::new();
        store.add_var("x", "", false);
        store.append_var("x", "v");
        assert_eq!(store.get_str("x").as_deref(), Some("v"));
    }

    #[test]
    fn remove_ignores_absent_names() {
        let mut store = VarStore::new();
        store.add_var("a", 1, false);
        store.add_var("b", 2, false);
        store.remove_vars(["a", "missing"]);
        assert!(!store.has_var("a"));
        assert!(store.has_var("b"));
        store.remove_var("missing");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn priority_only_accepts_plus_minus_one() {
        let mut store = VarStore::new();
        store.set_var_priority("a", 0);
        store.set_var_priority("b", 2);
        assert_eq!(store.priority_of("a"), None);
        assert_eq!(store.priority_of("b"), None);
        store.set_var_priority("a", -1);
        assert_eq!(store.priority_of("a"), Some(Priority::First));
    }

    #[test]
    fn priority_moves_between_buckets() {
        let mut store = VarStore::new();
        store.set_var_priority("a", -1);
        store.set_var_priority("a", 1);
        assert_eq!(store.priority_of("a"), Some(Priority::Last));
        let snap = store.snapshot();
        assert!(snap.first().is_empty());
        assert_eq!(snap.last(), ["a".to_string()]);
    }

    #[test]
    fn clear_single_beacon_removes_marked_vars() {
        let mut store = VarStore::new();
        store.add_var("once", 1, true);
        store.add_var("stay", 2, false);
        store.clear_single_beacon();
        assert!(!store.has_var("once"));
        assert!(store.has_var("stay"));
        assert!(!store.is_single_beacon("once"));
    }

    #[test]
    fn snapshot_is_detached_from_store() {
        let mut store = VarStore::new();
        store.add_var("a", 1, false);
        let snap = store.snapshot();
        store.add_var("a", 2, false);
        assert_eq!(snap.get("a"), Some(&json!(1)));
    }

    #[test]
    fn stale_priority_for_removed_var_is_harmless() {
        let mut store = VarStore::new();
        store.add_var("a", 1, false);
        store.set_var_priority("a", -1);
        store.remove_var("a");
        store.add_var("b", 2, false);
        assert_eq!(store.snapshot().query_string(), "b=2");
    }
}
