//! # beacon-runtime
//!
//! The per-page beacon coordinator.
//!
//! A [`Page`] is the single owned context for one page load. Producers add
//! variables and request flushes; the coordinator coalesces those requests
//! onto the page's cooperative task queue, assembles each beacon, and hands
//! it to the transport.
//!
//! ## Execution Model
//!
//! - Single logical thread: every task and subscriber receives `&mut Page`.
//! - [`Page::run_until_idle`] drains what is runnable now;
//!   [`Page::run`] also waits on the `tokio` clock for timers.
//! - At most one flush is queued and at most one is running.
//!
//! ## Modules
//!
//! - [`coordinator`]: `send_beacon`, the flush state machine, `response_end`
//! - [`scheduler`]: ready, timer, and idle task lanes
//! - [`lifecycle`]: native lifecycle translation and visibility tracking
//! - [`session`]: session state and persistence seam
//! - [`timing`]: named timers and the round-trip producer

#![deny(unsafe_code)]

pub mod coordinator;
pub mod frame;
pub mod lifecycle;
pub mod page;
pub mod scheduler;
pub mod session;
pub mod timing;
pub mod url;

pub use coordinator::{FlushOutcome, FlushState};
pub use frame::FrameAccess;
pub use lifecycle::{NativeEvent, VisibilityTracker};
pub use page::{Page, PageOptions};
pub use scheduler::{Scheduler, TaskId};
pub use session::{MemorySessionStore, SessionState, SessionStore};
pub use timing::{NamedTimers, RoundTrip};
