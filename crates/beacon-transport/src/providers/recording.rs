//! In-memory transport that records every handoff.
//!
//! Used by tests and by the CLI's `--dry-run`. Each mechanism can be told
//! to refuse or fail so fallback paths can be exercised.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use percent_encoding::percent_decode_str;

use crate::errors::{Result, TransportError};
use crate::traits::{BeaconPrimitive, ImageLoader, PostRequest, RequestContext};
use crate::transport::{Delivery, Transport};

/// A beacon accepted by one of the recording mechanisms.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentBeacon {
    /// Mechanism that accepted it.
    pub delivery: Delivery,
    /// Destination (with query string for image beacons).
    pub url: String,
    /// Request body for native and POST beacons.
    pub body: Option<String>,
    /// Request headers (POST only).
    pub headers: Vec<(String, String)>,
    /// Credentials flag (POST only).
    pub with_credentials: bool,
}

impl SentBeacon {
    /// The encoded parameter string, from the body or the URL query.
    pub fn payload(&self) -> &str {
        match &self.body {
            Some(body) => body,
            None => self.url.split_once('?').map_or("", |(_, q)| q),
        }
    }

    /// Decoded parameters in wire order.
    pub fn params(&self) -> Vec<(String, String)> {
        self.payload()
            .split('&')
            .filter(|p| !p.is_empty())
            .map(|pair| {
                let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
                (decode(k), decode(v))
            })
            .collect()
    }

    /// Names of the parameters in wire order.
    pub fn param_names(&self) -> Vec<String> {
        self.params().into_iter().map(|(k, _)| k).collect()
    }

    /// Decoded value of one parameter.
    pub fn param(&self, name: &str) -> Option<String> {
        self.params()
            .into_iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// Value of a header, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

fn decode(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

#[derive(Default)]
struct State {
    sent: Mutex<Vec<SentBeacon>>,
    attempts: Mutex<Vec<Delivery>>,
    refuse_beacon: AtomicBool,
    fail_image: AtomicBool,
    fail_primary: AtomicBool,
    fail_secondary: AtomicBool,
}

/// Shared handle over the recorded beacons.
#[derive(Clone, Default)]
pub struct Recorder {
    state: Arc<State>,
}

impl Recorder {
    /// Empty recorder with every mechanism accepting.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A [`Transport`] wired to all four recording mechanisms.
    pub fn transport(&self) -> Transport {
        Transport::new(
            Arc::new(RecordingImage(self.clone())),
            Arc::new(RecordingContext {
                recorder: self.clone(),
                delivery: Delivery::Post,
            }),
        )
        .with_beacon(Arc::new(RecordingBeacon(self.clone())))
        .with_secondary(Arc::new(RecordingContext {
            recorder: self.clone(),
            delivery: Delivery::PostSecondary,
        }))
    }

    /// Make the native primitive refuse.
    pub fn refuse_beacon(&self, refuse: bool) {
        self.state.refuse_beacon.store(refuse, Ordering::SeqCst);
    }

    /// Make image construction fail.
    pub fn fail_image(&self, fail: bool) {
        self.state.fail_image.store(fail, Ordering::SeqCst);
    }

    /// Make the primary request context throw.
    pub fn fail_primary(&self, fail: bool) {
        self.state.fail_primary.store(fail, Ordering::SeqCst);
    }

    /// Make the secondary request context throw.
    pub fn fail_secondary(&self, fail: bool) {
        self.state.fail_secondary.store(fail, Ordering::SeqCst);
    }

    /// Accepted beacons in handoff order.
    pub fn sent(&self) -> Vec<SentBeacon> {
        self.state.sent.lock().clone()
    }

    /// Number of accepted beacons.
    pub fn count(&self) -> usize {
        self.state.sent.lock().len()
    }

    /// Every mechanism tried, including refusals and failures.
    pub fn attempts(&self) -> Vec<Delivery> {
        self.state.attempts.lock().clone()
    }

    /// Forget everything recorded so far.
    pub fn reset(&self) {
        self.state.sent.lock().clear();
        self.state.attempts.lock().clear();
    }

    fn attempt(&self, delivery: Delivery) {
        self.state.attempts.lock().push(delivery);
    }

    fn accept(&self, beacon: SentBeacon) {
        self.state.sent.lock().push(beacon);
    }
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("sent", &self.count())
            .finish_non_exhaustive()
    }
}

struct RecordingBeacon(Recorder);

impl BeaconPrimitive for RecordingBeacon {
    fn send_beacon(&self, url: &str, body: &str) -> bool {
        self.0.attempt(Delivery::Beacon);
        if self.0.state.refuse_beacon.load(Ordering::SeqCst) {
            return false;
        }
        self.0.accept(SentBeacon {
            delivery: Delivery::Beacon,
            url: url.to_string(),
            body: Some(body.to_string()),
            headers: Vec::new(),
            with_credentials: false,
        });
        true
    }
}

struct RecordingImage(Recorder);

impl ImageLoader for RecordingImage {
    fn load(&self, url: &str) -> Result<()> {
        self.0.attempt(Delivery::Image);
        if self.0.state.fail_image.load(Ordering::SeqCst) {
            return Err(TransportError::Image("image construction failed".into()));
        }
        self.0.accept(SentBeacon {
            delivery: Delivery::Image,
            url: url.to_string(),
            body: None,
            headers: Vec::new(),
            with_credentials: false,
        });
        Ok(())
    }
}

struct RecordingContext {
    recorder: Recorder,
    delivery: Delivery,
}

impl RequestContext for RecordingContext {
    fn post(&self, request: &PostRequest) -> Result<()> {
        self.recorder.attempt(self.delivery);
        let failing = match self.delivery {
            Delivery::PostSecondary => &self.recorder.state.fail_secondary,
            _ => &self.recorder.state.fail_primary,
        };
        if failing.load(Ordering::SeqCst) {
            return Err(TransportError::Build(format!("{} context threw", self.delivery.as_str())));
        }
        self.recorder.accept(SentBeacon {
            delivery: self.delivery,
            url: request.url.clone(),
            body: Some(request.body.clone()),
            headers: request.headers.clone(),
            with_credentials: request.with_credentials,
        });
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
