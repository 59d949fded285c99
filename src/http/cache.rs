//! Static file validators
//!
//! Weak `ETag`s are derived from file size and modification time, so a file
//! never has to be hashed to answer a conditional request.

use std::fs::Metadata;
use std::time::UNIX_EPOCH;

/// `W/"<size hex>-<mtime millis hex>"`
pub fn weak_etag(meta: &Metadata) -> String {
    let mtime_ms = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_millis());
    format!("W/\"{:x}-{mtime_ms:x}\"", meta.len())
}

/// Whether `If-None-Match` lets us answer 304.
///
/// Comparison is weak: `W/"a"` matches `"a"`. A list and `*` are accepted.
pub fn is_fresh(if_none_match: Option<&str>, etag: &str) -> bool {
    let Some(header) = if_none_match else {
        return false;
    };
    let ours = strip_weak(etag);
    header
        .split(',')
        .map(str::trim)
        .any(|candidate| candidate == "*" || strip_weak(candidate) == ours)
}

fn strip_weak(tag: &str) -> &str {
    tag.strip_prefix("W/").unwrap_or(tag)
}
