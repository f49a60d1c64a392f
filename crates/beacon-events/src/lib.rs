//! # beacon-events
//!
//! Named-event publish/subscribe bus.
//!
//! Producers and the coordinator communicate through events such as
//! [`PAGE_READY`](names::PAGE_READY), [`BEFORE_BEACON`](names::BEFORE_BEACON)
//! and [`BEACON`](names::BEACON). The bus is generic over the context type
//! `C` its callbacks mutate, so subscribers receive `&mut C` (the page) while
//! the bus itself lives inside that context.
//!
//! ## Firing Model
//!
//! - Names are lower-cased and legacy aliases translated before lookup.
//! - Firing runs only the subscribers registered before the fire began;
//!   subscribers added by a callback run on the next fire.
//! - Once-subscribers are pruned after the whole pass.
//! - A failing subscriber is logged and reported, never aborts the pass.

#![deny(unsafe_code)]

pub mod bus;
pub mod errors;
pub mod names;
pub mod payload;

pub use bus::{BusHost, Callback, EventBus, EventMirror, FireReport, SubscriptionId, callback, fire};
pub use errors::BusError;
pub use payload::{EventData, RequestInfo, VisibilityState};
