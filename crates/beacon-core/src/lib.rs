//! # beacon-core
//!
//! Foundation types, errors, branded IDs, and wire constants for the beacon agent.
//!
//! This crate provides the shared vocabulary that all other beacon crates depend on:
//!
//! - **Branded IDs**: `PageId`, `SessionId` as newtypes for type safety
//! - **Wire constants**: reserved beacon field names and transport limits
//! - **Errors**: `BeaconError` hierarchy via `thiserror`
//! - **Error tally**: de-duplicated internal error accumulator behind the `errors` field
//! - **Logging**: `tracing` subscriber setup and capture helpers for tests

#![deny(unsafe_code)]

pub mod constants;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod tally;

pub use errors::{BeaconError, Result};
pub use ids::{PageId, SessionId};
pub use tally::ErrorTally;
