//! # beacon-vars
//!
//! The Variable Store: every producer writes beacon fields here, and the
//! coordinator snapshots it at flush time.
//!
//! - [`VarStore`]: name → value mapping with single-use markers and
//!   first/last priority buckets
//! - [`Snapshot`]: an owned copy of the store taken at flush time; the
//!   transport serializes this, never the live store
//! - [`encode`]: compact URL-safe encoding for structured values and
//!   `encodeURIComponent`-compatible query assembly

#![deny(unsafe_code)]

pub mod encode;
pub mod snapshot;
pub mod store;

pub use encode::ValueEncoding;
pub use snapshot::Snapshot;
pub use store::{Priority, VarMap, VarStore};
