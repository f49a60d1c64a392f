//! Mechanism selection.
//!
//! One mechanism per flush, tried in this order:
//!
//! 1. Native beacon primitive, unless an auth token is configured, GET is
//!    forced, or the primitive is disabled. A refusal falls through.
//! 2. Image GET, when GET is forced or the full URL fits in
//!    [`MAX_GET_LENGTH`]. A construction failure drops the beacon.
//! 3. POST request, retried once in the secondary context if the primary
//!    throws.

use std::sync::Arc;

use beacon_core::constants::{MAX_GET_LENGTH, fields};
use beacon_settings::{BeaconSettings, BeaconType};
use beacon_vars::Snapshot;
use tracing::{debug, warn};

use crate::errors::{Result, TransportError};
use crate::traits::{BeaconPrimitive, ImageLoader, PostRequest, RequestContext};

/// Which mechanism carried a beacon.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Delivery {
    /// Native beacon primitive.
    Beacon,
    /// Image GET.
    Image,
    /// POST in the primary context.
    Post,
    /// POST in the secondary context after the primary threw.
    PostSecondary,
}

impl Delivery {
    /// Short label for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Beacon => "sendbeacon",
            Self::Image => "image",
            Self::Post => "post",
            Self::PostSecondary => "post_secondary",
        }
    }
}

/// The set of delivery mechanisms available to a page.
#[derive(Clone)]
pub struct Transport {
    beacon: Option<Arc<dyn BeaconPrimitive>>,
    image: Arc<dyn ImageLoader>,
    primary: Arc<dyn RequestContext>,
    secondary: Option<Arc<dyn RequestContext>>,
}

impl Transport {
    /// Transport with image and primary POST mechanisms only.
    pub fn new(image: Arc<dyn ImageLoader>, primary: Arc<dyn RequestContext>) -> Self {
        Self {
            beacon: None,
            image,
            primary,
            secondary: None,
        }
    }

    /// Add the native beacon primitive.
    #[must_use]
    pub fn with_beacon(mut self, beacon: Arc<dyn BeaconPrimitive>) -> Self {
        self.beacon = Some(beacon);
        self
    }

    /// Add the secondary request context.
    #[must_use]
    pub fn with_secondary(mut self, secondary: Arc<dyn RequestContext>) -> Self {
        self.secondary = Some(secondary);
        self
    }

    /// Hand `snapshot` to exactly one mechanism.
    pub fn send(&self, url: &str, snapshot: &Snapshot, settings: &BeaconSettings) -> Result<Delivery> {
        let url = force_https(url, settings.beacon_url_force_https);
        let params = snapshot.query_string();
        let method = settings.beacon_type;

        if let Some(beacon) = &self.beacon {
            if native_beacon_allowed(settings) {
                if beacon.send_beacon(&url, &with_marker(&params)) {
                    debug!(url = %url, "beacon handed to native primitive");
                    return Ok(Delivery::Beacon);
                }
                debug!(url = %url, "native primitive refused beacon, falling back");
            }
        }

        let get_url = join_query(&url, &params);
        let use_image = match method {
            BeaconType::Get => {
                if get_url.len() > MAX_GET_LENGTH {
                    warn!(
                        length = get_url.len(),
                        limit = MAX_GET_LENGTH,
                        "forced GET beacon exceeds safe URL length"
                    );
                }
                true
            }
            BeaconType::Post => false,
            BeaconType::Auto => get_url.len() <= MAX_GET_LENGTH,
        };

        if use_image {
            return match self.image.load(&get_url) {
                Ok(()) => Ok(Delivery::Image),
                Err(err) => {
                    warn!(error = %err, "image beacon failed, dropping");
                    Err(err)
                }
            };
        }

        let request = build_post(url, params, settings);
        match self.primary.post(&request) {
            Ok(()) => Ok(Delivery::Post),
            Err(primary_err) => {
                warn!(error = %primary_err, "POST beacon failed, retrying in secondary context");
                let Some(secondary) = &self.secondary else {
                    return Err(TransportError::Exhausted(primary_err.to_string()));
                };
                secondary
                    .post(&request)
                    .map(|()| Delivery::PostSecondary)
                    .map_err(|err| {
                        warn!(error = %err, "secondary POST beacon failed, dropping");
                        TransportError::Exhausted(err.to_string())
                    })
            }
        }
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("beacon", &self.beacon.is_some())
            .field("secondary", &self.secondary.is_some())
            .finish_non_exhaustive()
    }
}

fn native_beacon_allowed(settings: &BeaconSettings) -> bool {
    !settings.beacon_disable_sendbeacon
        && settings.beacon_type != BeaconType::Get
        && settings.beacon_auth_token.is_none()
}

fn build_post(url: String, body: String, settings: &BeaconSettings) -> PostRequest {
    let mut request = PostRequest::new(url, body);
    if let Some(token) = &settings.beacon_auth_token {
        request
            .headers
            .push((settings.beacon_auth_key.clone(), token.clone()));
    }
    request.with_credentials = settings.beacon_with_credentials;
    request
}

/// Rewrite a protocol-relative URL to `https:` when forced.
///
/// Pure string rewrite; the resulting origin is not checked.
pub fn force_https(url: &str, force: bool) -> String {
    if force && url.starts_with("//") {
        format!("https:{url}")
    } else {
        url.to_string()
    }
}

/// Append `params` to `url` as a query string.
pub fn join_query(url: &str, params: &str) -> String {
    if params.is_empty() {
        return url.to_string();
    }
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{url}{sep}{params}")
}

fn with_marker(params: &str) -> String {
    if params.is_empty() {
        format!("{}=1", fields::SEND_BEACON)
    } else {
        format!("{params}&{}=1", fields::SEND_BEACON)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
