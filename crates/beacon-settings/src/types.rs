//! Settings type definitions.
//!
//! Field names are snake_case on the wire, matching the configuration keys
//! page owners already use (`beacon_url`, `beacon_type`, ...). Every type
//! implements [`Default`] and is `#[serde(default)]`, so partial JSON works.

use serde::{Deserialize, Serialize};

use beacon_core::constants::{DEFAULT_AUTH_HEADER, MAX_GET_LENGTH};

/// How beacons should be sent when the native beacon primitive is not used.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BeaconType {
    /// Always GET via the image mechanism.
    Get,
    /// Always POST via the request object.
    Post,
    /// GET unless the URL exceeds the safe length.
    #[default]
    Auto,
}

impl BeaconType {
    /// Parse a case-insensitive `GET`/`POST`/`AUTO`.
    pub fn parse(val: &str) -> Option<Self> {
        match val.to_ascii_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            "AUTO" => Some(Self::Auto),
            _ => None,
        }
    }
}

/// Which "next free tick" primitive schedules a queued flush.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickStrategy {
    /// Run when the loop is idle, bounded by `idle_timeout_ms`.
    #[default]
    Idle,
    /// Run on the next turn of the ready queue.
    Immediate,
    /// Run after a short timer (`idle_timeout_ms` is unused).
    Timer,
}

/// Root settings for the beacon agent.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BeaconSettings {
    /// Collector endpoint. Empty disables transmission.
    pub beacon_url: String,
    /// GET/POST/AUTO transport selection.
    pub beacon_type: BeaconType,
    /// Rewrite protocol-relative beacon URLs to `https:`.
    pub beacon_url_force_https: bool,
    /// Header name carrying the auth token.
    pub beacon_auth_key: String,
    /// Auth token. When set, the native beacon primitive is skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beacon_auth_token: Option<String>,
    /// Send credentials with POST beacons.
    pub beacon_with_credentials: bool,
    /// Never use the native beacon primitive.
    pub beacon_disable_sendbeacon: bool,
    /// Regexes the destination URL must match (any one). Empty allows all.
    pub beacon_urls_allowed: Vec<String>,
    /// Send the page-load beacon automatically once the page is ready.
    pub autorun: bool,
    /// Session cookie scope. Empty disables sessions.
    pub site_domain: String,
    /// Replace query strings in `u`, `pgu` and `r` with `?qs-redacted`.
    pub strip_query: bool,
    /// Maximum length of a cleaned URL field.
    pub url_limit: usize,
    /// Readiness polling interval for dynamic-request completion.
    pub response_end_retry_ms: u64,
    /// Tick primitive used to schedule a queued flush.
    pub tick_strategy: TickStrategy,
    /// Upper bound before an idle-scheduled flush runs anyway.
    pub idle_timeout_ms: u64,
    /// A stored session older than this starts over.
    pub session_expiry_ms: u64,
    /// Default log filter.
    pub log_level: String,
}

impl Default for BeaconSettings {
    fn default() -> Self {
        Self {
            beacon_url: String::new(),
            beacon_type: BeaconType::Auto,
            beacon_url_force_https: false,
            beacon_auth_key: DEFAULT_AUTH_HEADER.to_string(),
            beacon_auth_token: None,
            beacon_with_credentials: false,
            beacon_disable_sendbeacon: false,
            beacon_urls_allowed: Vec::new(),
            autorun: true,
            site_domain: String::new(),
            strip_query: false,
            url_limit: MAX_GET_LENGTH,
            response_end_retry_ms: 1000,
            tick_strategy: TickStrategy::Idle,
            idle_timeout_ms: 250,
            session_expiry_ms: 30 * 60 * 1000,
            log_level: "warn".to_string(),
        }
    }
}

impl BeaconSettings {
    /// Whether session tracking is enabled (requires a cookie scope).
    pub fn sessions_enabled(&self) -> bool {
        !self.site_domain.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beacon_type_parse() {
        assert_eq!(BeaconType::parse("get"), Some(BeaconType::Get));
        assert_eq!(BeaconType::parse("POST"), Some(BeaconType::Post));
        assert_eq!(BeaconType::parse("Auto"), Some(BeaconType::Auto));
        assert_eq!(BeaconType::parse("PUT"), None);
    }

    #[test]
    fn beacon_type_serde_uppercase() {
        assert_eq!(serde_json::to_string(&BeaconType::Post).unwrap(), "\"POST\"");
        let back: BeaconType = serde_json::from_str("\"GET\"").unwrap();
        assert_eq!(back, BeaconType::Get);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let settings: BeaconSettings =
            serde_json::from_str(r#"{"beacon_url": "https://c.example/b"}"#).unwrap();
        assert_eq!(settings.beacon_url, "https://c.example/b");
        assert!(settings.autorun);
        assert_eq!(settings.beacon_auth_key, "Authorization");
    }

    #[test]
    fn sessions_require_site_domain() {
        let mut settings = BeaconSettings::default();
        assert!(!settings.sessions_enabled());
        settings.site_domain = "example.com".into();
        assert!(settings.sessions_enabled());
    }

    #[test]
    fn default_settings_snapshot() {
        insta::assert_json_snapshot!(BeaconSettings::default(), @r#"
        {
          "beacon_url": "",
          "beacon_type": "AUTO",
          "beacon_url_force_https": false,
          "beacon_auth_key": "Authorization",
          "beacon_with_credentials": false,
          "beacon_disable_sendbeacon": false,
          "beacon_urls_allowed": [],
          "autorun": true,
          "site_domain": "",
          "strip_query": false,
          "url_limit": 2000,
          "response_end_retry_ms": 1000,
          "tick_strategy": "idle",
          "idle_timeout_ms": 250,
          "session_expiry_ms": 1800000,
          "log_level": "warn"
        }
        "#);
    }
}
