//! Package-level constants and reserved wire field names.

/// Current version of the beacon agent (sourced from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name.
pub const NAME: &str = "beacon";

/// Soft limit for a GET beacon URL. Exceeding it warns or switches to POST.
pub const MAX_GET_LENGTH: usize = 2000;

/// Largest body the native beacon primitive accepts before refusing to enqueue.
pub const MAX_SENDBEACON_BYTES: usize = 64 * 1024;

/// Default auth header name when `beacon_auth_key` is unset.
pub const DEFAULT_AUTH_HEADER: &str = "Authorization";

/// Reserved beacon field names.
pub mod fields {
    /// Protocol version.
    pub const VERSION: &str = "v";
    /// Page URL (or request URL for dynamic beacons).
    pub const URL: &str = "u";
    /// Page URL for non-primary beacons, omitted when identical to `u`.
    pub const PAGE_URL: &str = "pgu";
    /// 8-character page id.
    pub const PAGE_ID: &str = "pid";
    /// Referrer.
    pub const REFERRER: &str = "r";
    /// 1-based beacon sequence number.
    pub const SEQUENCE: &str = "n";
    /// Session id.
    pub const SESSION_ID: &str = "rt.si";
    /// Session start (epoch ms).
    pub const SESSION_START: &str = "rt.ss";
    /// Session length (page count).
    pub const SESSION_LENGTH: &str = "rt.sl";
    /// Visibility state at flush time.
    pub const VIS_STATE: &str = "vis.st";
    /// Milliseconds since the page last became visible.
    pub const VIS_LAST_VISIBLE: &str = "vis.lv";
    /// Milliseconds since the page last became hidden.
    pub const VIS_LAST_HIDDEN: &str = "vis.lh";
    /// Platform string.
    pub const PLATFORM: &str = "ua.plt";
    /// Vendor string.
    pub const VENDOR: &str = "ua.vnd";
    /// Newline-joined internal error summary.
    pub const ERRORS: &str = "errors";
    /// Present (`1`) only when sent through the native beacon primitive.
    pub const SEND_BEACON: &str = "sb";
    /// Beacon initiator. Absent or empty marks a full page-load beacon.
    pub const INITIATOR: &str = "http.initiator";
    /// Page group tag for dynamic requests.
    pub const XHR_PAGE_GROUP: &str = "xhr.pg";
    /// Synthetic marker for a loader frame distinct from the top window.
    pub const IFRAME: &str = "if";
    /// Page-ready duration recorded by the round-trip producer.
    pub const T_DONE: &str = "t_done";
    /// Named timers (`name|ms,name|ms`).
    pub const T_OTHER: &str = "t_other";
}

/// Fields removed from the live store after every flush so the next
/// beacon starts clean.
pub const TRANSIENT_FIELDS: &[&str] = &[
    fields::VERSION,
    fields::URL,
    fields::PAGE_URL,
    fields::PAGE_ID,
    fields::REFERRER,
    fields::SEQUENCE,
    fields::SESSION_ID,
    fields::SESSION_START,
    fields::SESSION_LENGTH,
    fields::VIS_STATE,
    fields::VIS_LAST_VISIBLE,
    fields::VIS_LAST_HIDDEN,
    fields::PLATFORM,
    fields::VENDOR,
    fields::ERRORS,
    fields::INITIATOR,
    fields::IFRAME,
    fields::T_DONE,
    fields::T_OTHER,
];

/// Initiator values that mark a single-page-app navigation beacon.
pub const SPA_INITIATORS: &[&str] = &["spa", "spa_hard"];

/// Whether an initiator marks a single-page-app navigation.
pub fn is_spa_initiator(initiator: Option<&str>) -> bool {
    initiator.is_some_and(|i| SPA_INITIATORS.contains(&i))
}

/// Whether an initiator marks a full page-load beacon (absent or empty).
pub fn is_page_load_initiator(initiator: Option<&str>) -> bool {
    initiator.is_none_or(str::is_empty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_semver() {
        let parts: Vec<&str> = VERSION.split('.').collect();
        assert_eq!(parts.len(), 3, "VERSION must be semver (MAJOR.MINOR.PATCH)");
        for part in parts {
            let _: u32 = part.parse().expect("each semver segment must be a number");
        }
    }

    #[test]
    fn name_is_lowercase() {
        assert_eq!(NAME, NAME.to_lowercase());
    }

    #[test]
    fn spa_initiators() {
        assert!(is_spa_initiator(Some("spa")));
        assert!(is_spa_initiator(Some("spa_hard")));
        assert!(!is_spa_initiator(Some("xhr")));
        assert!(!is_spa_initiator(None));
    }

    #[test]
    fn page_load_initiator_absent_or_empty() {
        assert!(is_page_load_initiator(None));
        assert!(is_page_load_initiator(Some("")));
        assert!(!is_page_load_initiator(Some("xhr")));
        assert!(!is_page_load_initiator(Some("spa")));
    }

    #[test]
    fn transient_fields_exclude_page_group() {
        // xhr.pg is single-use, not transient: it is set before the flush it belongs to
        assert!(!TRANSIENT_FIELDS.contains(&fields::XHR_PAGE_GROUP));
        assert!(TRANSIENT_FIELDS.contains(&fields::SEQUENCE));
    }
}
