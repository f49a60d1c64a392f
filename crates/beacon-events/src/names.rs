//! Canonical event names, legacy aliases, and public mirror names.

/// The page finished loading (or a producer declared it ready).
pub const PAGE_READY: &str = "page_ready";
/// The page is being torn down.
pub const PAGE_UNLOAD: &str = "page_unload";
/// The browser asked whether the page may unload.
pub const BEFORE_UNLOAD: &str = "before_unload";
/// DOM content parsed.
pub const DOM_LOADED: &str = "dom_loaded";
/// Visibility state changed.
pub const VISIBILITY_CHANGED: &str = "visibility_changed";
/// A prerendered page became visible for the first time.
pub const PRERENDER_TO_VISIBLE: &str = "prerender_to_visible";
/// Fired with the live variables right before a flush snapshots them.
pub const BEFORE_BEACON: &str = "before_beacon";
/// Fired with the snapshot after it has been taken.
pub const BEACON: &str = "beacon";
/// The first page-load beacon was sent.
pub const PAGE_LOAD_BEACON: &str = "page_load_beacon";
/// A dynamic request completed.
pub const XHR_LOAD: &str = "xhr_load";
/// Configuration changed.
pub const CONFIG: &str = "config";
/// A single-page-app navigation started.
pub const SPA_NAVIGATION: &str = "spa_navigation";
/// A single-page-app navigation was cancelled.
pub const SPA_CANCEL: &str = "spa_cancel";

/// Every built-in event, registered when a page is created.
pub const ALL: &[&str] = &[
    PAGE_READY,
    PAGE_UNLOAD,
    BEFORE_UNLOAD,
    DOM_LOADED,
    VISIBILITY_CHANGED,
    PRERENDER_TO_VISIBLE,
    BEFORE_BEACON,
    BEACON,
    PAGE_LOAD_BEACON,
    XHR_LOAD,
    CONFIG,
    SPA_NAVIGATION,
    SPA_CANCEL,
];

/// Old names still accepted from producers.
const LEGACY_ALIASES: &[(&str, &str)] = &[
    ("onload", PAGE_READY),
    ("onunload", PAGE_UNLOAD),
    ("onbeforeunload", BEFORE_UNLOAD),
];

/// Events mirrored to the host as public events, with their public names.
const PUBLIC_NAMES: &[(&str, &str)] = &[
    (PAGE_READY, "onBeaconPageReady"),
    (BEFORE_BEACON, "onBeforeBeacon"),
    (BEACON, "onBeacon"),
    (XHR_LOAD, "onBeaconXhrLoad"),
    (CONFIG, "onBeaconConfig"),
];

/// Lower-case a name and translate legacy aliases.
pub fn canonicalize(name: &str) -> String {
    let lower = name.to_lowercase();
    LEGACY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lower)
        .map_or(lower, |(_, canonical)| (*canonical).to_string())
}

/// Public mirror name for a canonical event, if it is mirrored.
pub fn public_name(canonical: &str) -> Option<&'static str> {
    PUBLIC_NAMES
        .iter()
        .find(|(name, _)| *name == canonical)
        .map(|(_, public)| *public)
}

/// Whether firing this event skips the flush-before-notify step.
pub fn is_beacon_lifecycle(canonical: &str) -> bool {
    canonical == BEFORE_BEACON || canonical == BEACON
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_lowercases() {
        assert_eq!(canonicalize("Page_Ready"), PAGE_READY);
        assert_eq!(canonicalize("BEACON"), BEACON);
    }

    #[test]
    fn canonicalize_translates_aliases() {
        assert_eq!(canonicalize("onload"), PAGE_READY);
        assert_eq!(canonicalize("OnBeforeUnload"), BEFORE_UNLOAD);
        assert_eq!(canonicalize("custom_event"), "custom_event");
    }

    #[test]
    fn public_names() {
        assert_eq!(public_name(BEACON), Some("onBeacon"));
        assert_eq!(public_name(PAGE_UNLOAD), None);
    }

    #[test]
    fn all_names_are_canonical() {
        for name in ALL {
            assert_eq!(canonicalize(name), *name);
        }
    }

    #[test]
    fn lifecycle_names() {
        assert!(is_beacon_lifecycle(BEACON));
        assert!(is_beacon_lifecycle(BEFORE_BEACON));
        assert!(!is_beacon_lifecycle(PAGE_LOAD_BEACON));
    }
}
