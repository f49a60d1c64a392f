//! Flush-time snapshot of the variable store.

use indexmap::IndexSet;
use serde_json::Value;

use crate::encode::{ValueEncoding, encode_pair};
use crate::store::VarMap;

/// Owned copy of the variables taken at flush time.
///
/// Mutating the live store after the snapshot never changes what this
/// beacon transmits.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    vars: VarMap,
    first: Vec<String>,
    last: Vec<String>,
}

impl Snapshot {
    /// Build a snapshot from variables and priority buckets.
    pub fn new(vars: VarMap, first: Vec<String>, last: Vec<String>) -> Self {
        Self { vars, first, last }
    }

    /// Snapshot without priorities.
    pub fn from_vars(vars: VarMap) -> Self {
        Self::new(vars, Vec::new(), Vec::new())
    }

    /// Value of a variable.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Value of a variable as a string slice, if it is a string.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.vars.get(name).and_then(Value::as_str)
    }

    /// Whether a variable is present.
    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Variables in natural order.
    pub fn vars(&self) -> &VarMap {
        &self.vars
    }

    /// Names emitted first, in bucket order.
    pub fn first(&self) -> &[String] {
        &self.first
    }

    /// Names emitted last, in bucket order.
    pub fn last(&self) -> &[String] {
        &self.last
    }

    /// Number of variables.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether there is nothing to send.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Encoded `name=value` pairs in wire order.
    ///
    /// Priority `-1` names (bucket order), then every remaining name in
    /// natural order, then priority `1` names. Names consumed by a bucket
    /// are not repeated; bucket names without a value are skipped.
    pub fn params(&self, encoding: ValueEncoding) -> Vec<String> {
        let mut consumed: IndexSet<&str> = IndexSet::new();
        let mut out = Vec::with_capacity(self.vars.len());

        for name in &self.first {
            if let Some(value) = self.vars.get(name) {
                if consumed.insert(name.as_str()) {
                    out.push(encode_pair(name, value, encoding));
                }
            }
        }

        let last: IndexSet<&str> = self.last.iter().map(String::as_str).collect();
        for (name, value) in &self.vars {
            if consumed.contains(name.as_str()) || last.contains(name.as_str()) {
                continue;
            }
            out.push(encode_pair(name, value, encoding));
        }

        for name in &self.last {
            if let Some(value) = self.vars.get(name) {
                if consumed.insert(name.as_str()) {
                    out.push(encode_pair(name, value, encoding));
                }
            }
        }

        out
    }

    /// Full query string with the compact value encoding.
    pub fn query_string(&self) -> String {
        self.params(ValueEncoding::Compact).join("&")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
