//! Real delivery backed by `reqwest`.
//!
//! Each mechanism builds its request synchronously, so malformed requests
//! fail at handoff, then spawns the send onto the current `tokio` runtime.
//! Responses are only logged.

use std::sync::Arc;
use std::time::Duration;

use beacon_core::constants::{MAX_SENDBEACON_BYTES, NAME, VERSION};
use parking_lot::Mutex;
use reqwest::header::CONTENT_TYPE;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::errors::{Result, TransportError};
use crate::traits::{BeaconPrimitive, FORM_CONTENT_TYPE, ImageLoader, PostRequest, RequestContext};
use crate::transport::Transport;

type Inflight = Arc<Mutex<Vec<JoinHandle<()>>>>;

/// HTTP sender backed by `reqwest`.
#[derive(Clone)]
pub struct ReqwestSender {
    client: reqwest::Client,
    inflight: Inflight,
}

impl ReqwestSender {
    /// Create a sender with default client settings.
    pub fn new() -> Self {
        Self::with_client(default_client())
    }

    /// Create a sender around an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            inflight: Arc::default(),
        }
    }

    /// A sender with its own client that shares this sender's in-flight list.
    #[must_use]
    pub fn isolated(&self) -> Self {
        Self {
            client: default_client(),
            inflight: Arc::clone(&self.inflight),
        }
    }

    /// Transport using this sender for every mechanism and an isolated
    /// sender as the secondary POST context.
    pub fn transport(&self) -> Transport {
        let sender = Arc::new(self.clone());
        Transport::new(sender.clone(), sender.clone())
            .with_beacon(sender)
            .with_secondary(Arc::new(self.isolated()))
    }

    /// Number of sends not yet finished.
    pub fn pending(&self) -> usize {
        self.inflight.lock().iter().filter(|t| !t.is_finished()).count()
    }

    /// Wait for every spawned send. Returns how many were awaited.
    pub async fn drain(&self) -> usize {
        let tasks = std::mem::take(&mut *self.inflight.lock());
        let count = tasks.len();
        for task in tasks {
            let _ = task.await;
        }
        count
    }

    fn spawn(&self, mechanism: &'static str, request: reqwest::Request) -> Result<()> {
        let handle = Handle::try_current().map_err(|_| TransportError::NoRuntime)?;
        let client = self.client.clone();
        let url = request.url().to_string();
        let task = handle.spawn(async move {
            match client.execute(request).await {
                Ok(response) => {
                    debug!(mechanism, url = %url, status = response.status().as_u16(), "beacon delivered");
                }
                Err(err) => warn!(mechanism, url = %url, error = %err, "beacon delivery failed"),
            }
        });
        let mut inflight = self.inflight.lock();
        inflight.retain(|t| !t.is_finished());
        inflight.push(task);
        Ok(())
    }
}

impl Default for ReqwestSender {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ReqwestSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestSender")
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

fn default_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .user_agent(format!("{NAME}/{VERSION}"))
        .build()
        .unwrap_or_default()
}

impl BeaconPrimitive for ReqwestSender {
    fn send_beacon(&self, url: &str, body: &str) -> bool {
        if body.len() > MAX_SENDBEACON_BYTES {
            debug!(size = body.len(), limit = MAX_SENDBEACON_BYTES, "beacon body too large for native primitive");
            return false;
        }
        let request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(body.to_string())
            .build();
        match request {
            Ok(request) => self.spawn("sendbeacon", request).is_ok(),
            Err(err) => {
                debug!(error = %err, "native beacon request rejected");
                false
            }
        }
    }
}

impl ImageLoader for ReqwestSender {
    fn load(&self, url: &str) -> Result<()> {
        let request = self
            .client
            .get(url)
            .build()
            .map_err(|e| TransportError::Image(e.to_string()))?;
        self.spawn("image", request)
    }
}

impl RequestContext for ReqwestSender {
    fn post(&self, request: &PostRequest) -> Result<()> {
        let mut builder = self
            .client
            .post(&request.url)
            .header(CONTENT_TYPE, request.content_type)
            .body(request.body.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if request.with_credentials {
            trace!("credentials flag has no effect outside a browser context");
        }
        let built = builder
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;
        self.spawn("post", built)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
