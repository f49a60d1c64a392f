//! # beacon-transport
//!
//! Hands a flushed beacon to exactly one delivery mechanism.
//!
//! Three mechanisms mirror what a browser offers: a native fire-and-forget
//! beacon primitive, a GET issued by loading an image, and a form-encoded
//! POST through a request object. [`Transport`] picks one per flush and
//! applies the documented single fallback hop. Delivery is at-most-once;
//! nothing waits for an acknowledgment.
//!
//! ## Providers
//!
//! - [`ReqwestSender`](providers::ReqwestSender): real HTTP via `reqwest`,
//!   spawned on the current `tokio` runtime.
//! - [`Recorder`](providers::Recorder): in-memory, for tests and dry runs.

#![deny(unsafe_code)]

pub mod errors;
pub mod providers;
pub mod traits;
pub mod transport;

pub use errors::{Result, TransportError};
pub use providers::{Recorder, ReqwestSender, SentBeacon};
pub use traits::{BeaconPrimitive, FORM_CONTENT_TYPE, ImageLoader, PostRequest, RequestContext};
pub use transport::{Delivery, Transport, force_https, join_query};
