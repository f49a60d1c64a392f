//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`BeaconSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply `BEACON_*` environment overrides (highest priority)
//! 4. Validate (allow-list patterns must compile)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::{BeaconSettings, BeaconType};

/// Resolve the settings file path.
///
/// `BEACON_CONFIG` wins; otherwise `~/.beacon/settings.json`.
pub fn settings_path() -> PathBuf {
    if let Some(path) = read_env_string("BEACON_CONFIG") {
        return PathBuf::from(path);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".beacon").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<BeaconSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or an allow-list pattern
/// that does not compile is an error.
pub fn load_settings_from_path(path: &Path) -> Result<BeaconSettings> {
    let mut settings = load_file_layer(path)?;
    apply_overrides(&mut settings, |name| std::env::var(name).ok());
    validate(&settings)?;
    Ok(settings)
}

/// Defaults deep-merged with the file at `path`, without env overrides.
pub fn load_file_layer(path: &Path) -> Result<BeaconSettings> {
    let defaults = serde_json::to_value(BeaconSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment overrides read through `lookup`.
///
/// Invalid values are ignored with a warning and the file/default value stays.
pub fn apply_overrides(settings: &mut BeaconSettings, lookup: impl Fn(&str) -> Option<String>) {
    let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(v) = get("BEACON_URL") {
        settings.beacon_url = v;
    }
    if let Some(v) = get("BEACON_TYPE") {
        match BeaconType::parse(&v) {
            Some(t) => settings.beacon_type = t,
            None => tracing::warn!(key = "BEACON_TYPE", value = %v, "invalid beacon type, ignoring"),
        }
    }
    if let Some(v) = get("BEACON_FORCE_HTTPS").and_then(|v| parse_bool_logged("BEACON_FORCE_HTTPS", &v)) {
        settings.beacon_url_force_https = v;
    }
    if let Some(v) = get("BEACON_AUTH_TOKEN") {
        settings.beacon_auth_token = Some(v);
    }
    if let Some(v) = get("BEACON_DISABLE_SENDBEACON")
        .and_then(|v| parse_bool_logged("BEACON_DISABLE_SENDBEACON", &v))
    {
        settings.beacon_disable_sendbeacon = v;
    }
    if let Some(v) = get("BEACON_SITE_DOMAIN") {
        settings.site_domain = v;
    }
    if let Some(v) = get("BEACON_AUTORUN").and_then(|v| parse_bool_logged("BEACON_AUTORUN", &v)) {
        settings.autorun = v;
    }
    if let Some(v) = get("BEACON_RETRY_MS") {
        match parse_u64_range(&v, 10, 600_000) {
            Some(ms) => settings.response_end_retry_ms = ms,
            None => tracing::warn!(key = "BEACON_RETRY_MS", value = %v, "invalid u64 env var, ignoring"),
        }
    }
    if let Some(v) = get("BEACON_LOG_LEVEL") {
        settings.log_level = v;
    }
}

/// Shortest `url_limit` that still fits the truncation marker.
pub const MIN_URL_LIMIT: usize = 3;

/// Check values serde cannot check.
pub fn validate(settings: &BeaconSettings) -> Result<()> {
    for (i, pattern) in settings.beacon_urls_allowed.iter().enumerate() {
        if let Err(e) = regex::Regex::new(pattern) {
            return Err(SettingsError::InvalidValue(format!(
                "beacon_urls_allowed[{i}]: {e}"
            )));
        }
    }
    if settings.url_limit < MIN_URL_LIMIT {
        return Err(SettingsError::InvalidValue(format!(
            "url_limit must be at least {MIN_URL_LIMIT}, got {}",
            settings.url_limit
        )));
    }
    Ok(())
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

fn parse_bool_logged(name: &str, val: &str) -> Option<bool> {
    let result = parse_bool(val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
    }
    result
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_simple_override() {
        let merged = deep_merge(
            serde_json::json!({"a": 1, "b": 2}),
            serde_json::json!({"a": 10}),
        );
        assert_eq!(merged["a"], 10);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_array_replace() {
        let merged = deep_merge(
            serde_json::json!({"items": [1, 2, 3]}),
            serde_json::json!({"items": [4]}),
        );
        assert_eq!(merged["items"], serde_json::json!([4]));
    }

    #[test]
    fn merge_null_preserves_target() {
        let merged = deep_merge(
            serde_json::json!({"a": 1}),
            serde_json::json!({"a": null}),
        );
        assert_eq!(merged["a"], 1);
    }

    // ── load_settings_from_path ─────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let settings = load_file_layer(Path::new("/nonexistent/settings.json")).unwrap();
        assert!(settings.beacon_url.is_empty());
        assert!(settings.autorun);
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"beacon_url": "//c.example/b", "beacon_type": "POST", "autorun": false}"#,
        )
        .unwrap();

        let settings = load_file_layer(&path).unwrap();
        assert_eq!(settings.beacon_url, "//c.example/b");
        assert_eq!(settings.beacon_type, BeaconType::Post);
        assert!(!settings.autorun);
        assert_eq!(settings.response_end_retry_ms, 1000);
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();

        let result = load_file_layer(&path);
        assert!(matches!(result.unwrap_err(), SettingsError::Json(_)));
    }

    #[test]
    fn load_rejects_bad_allow_list_regex() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"beacon_urls_allowed": ["^https://(good"]}"#).unwrap();

        let result = load_settings_from_path(&path);
        assert!(matches!(result.unwrap_err(), SettingsError::InvalidValue(_)));
    }

    #[test]
    fn url_limit_must_fit_truncation_marker() {
        for limit in [0, 1, 2] {
            let settings = BeaconSettings {
                url_limit: limit,
                ..BeaconSettings::default()
            };
            assert!(matches!(validate(&settings), Err(SettingsError::InvalidValue(_))));
        }
        let settings = BeaconSettings {
            url_limit: MIN_URL_LIMIT,
            ..BeaconSettings::default()
        };
        assert!(validate(&settings).is_ok());
    }

    // ── apply_overrides ─────────────────────────────────────────────

    #[test]
    fn overrides_apply_over_file_values() {
        let mut settings = BeaconSettings {
            beacon_url: "https://file.example/b".into(),
            ..BeaconSettings::default()
        };
        apply_overrides(
            &mut settings,
            env(&[
                ("BEACON_URL", "https://env.example/b"),
                ("BEACON_TYPE", "get"),
                ("BEACON_FORCE_HTTPS", "yes"),
                ("BEACON_AUTH_TOKEN", "tok"),
                ("BEACON_SITE_DOMAIN", "example.com"),
                ("BEACON_RETRY_MS", "250"),
            ]),
        );
        assert_eq!(settings.beacon_url, "https://env.example/b");
        assert_eq!(settings.beacon_type, BeaconType::Get);
        assert!(settings.beacon_url_force_https);
        assert_eq!(settings.beacon_auth_token.as_deref(), Some("tok"));
        assert_eq!(settings.site_domain, "example.com");
        assert_eq!(settings.response_end_retry_ms, 250);
    }

    #[test]
    fn invalid_overrides_are_ignored() {
        let mut settings = BeaconSettings::default();
        apply_overrides(
            &mut settings,
            env(&[
                ("BEACON_TYPE", "PUT"),
                ("BEACON_AUTORUN", "maybe"),
                ("BEACON_RETRY_MS", "1"),
                ("BEACON_URL", ""),
            ]),
        );
        assert_eq!(settings.beacon_type, BeaconType::Auto);
        assert!(settings.autorun);
        assert_eq!(settings.response_end_retry_ms, 1000);
        assert!(settings.beacon_url.is_empty());
    }

    // ── parse helpers ───────────────────────────────────────────────

    #[test]
    fn parse_bool_variants() {
        for val in &["true", "1", "yes", "on", "TRUE"] {
            assert_eq!(parse_bool(val), Some(true), "failed for {val}");
        }
        for val in &["false", "0", "no", "off", "Off"] {
            assert_eq!(parse_bool(val), Some(false), "failed for {val}");
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn parse_u64_bounds() {
        assert_eq!(parse_u64_range("1000", 10, 600_000), Some(1000));
        assert_eq!(parse_u64_range("5", 10, 600_000), None);
        assert_eq!(parse_u64_range("abc", 10, 600_000), None);
    }
}
