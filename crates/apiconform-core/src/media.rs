//! Media type and lookup-path normalization
//!
//! Schemas declare bare media types (`application/json`) while servers send
//! parameterized ones (`application/json; charset=utf-8`). Everything keyed
//! by content type strips parameters first.

/// Strip media type parameters: `application/json; charset=utf-8` becomes
/// `application/json`.
#[must_use]
pub fn strip_media_type_params(value: &str) -> &str {
    value.split(';').next().unwrap_or("").trim()
}

/// Normalize a lookup path to exactly one leading slash.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}
