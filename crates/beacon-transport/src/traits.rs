//! Delivery mechanism traits.
//!
//! Each trait is a synchronous handoff: implementations enqueue the beacon
//! and return without awaiting a response. Delivery is at-most-once.

use crate::errors::Result;

/// Content type of POST and native beacon bodies.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Fire-and-forget native beacon primitive.
pub trait BeaconPrimitive: Send + Sync {
    /// Enqueue `body` for `url`. Returns `false` if the primitive refused it.
    fn send_beacon(&self, url: &str, body: &str) -> bool;
}

/// GET-via-image mechanism.
pub trait ImageLoader: Send + Sync {
    /// Start loading `url`. An error means the image could not be created.
    fn load(&self, url: &str) -> Result<()>;
}

/// A context able to open and send a POST request.
pub trait RequestContext: Send + Sync {
    /// Open and send the request. An error means open/send threw.
    fn post(&self, request: &PostRequest) -> Result<()>;
}

/// A form-encoded POST beacon.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostRequest {
    /// Destination.
    pub url: String,
    /// Joined `name=value` parameters.
    pub body: String,
    /// Always [`FORM_CONTENT_TYPE`].
    pub content_type: &'static str,
    /// Extra headers (auth).
    pub headers: Vec<(String, String)>,
    /// Send cookies with the request.
    pub with_credentials: bool,
}

impl PostRequest {
    /// A form POST of `body` to `url`.
    #[must_use]
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: body.into(),
            content_type: FORM_CONTENT_TYPE,
            headers: Vec::new(),
            with_credentials: false,
        }
    }

    /// Value of a header, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
