//! URL cleanup for the `u`, `pgu` and `r` fields.

/// Replacement for a redacted query string.
pub const QS_REDACTED: &str = "?qs-redacted";

const ELLIPSIS: &str = "...";

/// Normalize a URL-shaped field.
///
/// Drops the fragment, optionally redacts the query string, then truncates
/// to `limit` characters (ending in `...` when cut and `limit` leaves room
/// for it). A `limit` of zero disables truncation.
pub fn cleanup_url(url: &str, strip_query: bool, limit: usize) -> String {
    let without_hash = url.split_once('#').map_or(url, |(head, _)| head);
    let mut cleaned = match (strip_query, without_hash.split_once('?')) {
        (true, Some((path, _))) => format!("{path}{QS_REDACTED}"),
        _ => without_hash.to_string(),
    };

    if limit > 0 && cleaned.chars().count() > limit {
        cleaned = if limit > ELLIPSIS.len() {
            cleaned.chars().take(limit - ELLIPSIS.len()).collect::<String>() + ELLIPSIS
        } else {
            cleaned.chars().take(limit).collect()
        };
    }
    cleaned
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
