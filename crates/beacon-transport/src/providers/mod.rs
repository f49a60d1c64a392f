//! Concrete delivery mechanisms.

pub mod http;
pub mod recording;

pub use http::ReqwestSender;
pub use recording::{Recorder, SentBeacon};
