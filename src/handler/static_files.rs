//! Static file serving module
//!
//! Everything under the static root is served verbatim by relative path,
//! including uploaded images. Dotfiles and anything resolving outside the
//! root are treated as missing.

use crate::handler::router::RequestContext;
use crate::http::{self, cache, mime, HttpResponse};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Serve the file `ctx.path` names, or `None` when there is nothing to serve
pub async fn serve(
    ctx: &RequestContext<'_>,
    static_dir: &str,
    index_files: &[String],
) -> Option<HttpResponse> {
    let file_path = resolve_path(static_dir, ctx.path, index_files)?;

    let meta = fs::metadata(&file_path).await.ok()?;
    let etag = cache::weak_etag(&meta);

    if cache::is_fresh(ctx.if_none_match.as_deref(), &etag) {
        return Some(http::build_304_response(&etag));
    }

    let content = match fs::read(&file_path).await {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to read file '{}': {e}", file_path.display());
            return None;
        }
    };

    Some(http::build_file_response(
        content,
        mime::content_type_for(&file_path),
        &etag,
        ctx.is_head,
    ))
}

/// Map a request path onto a regular file inside `static_dir`
fn resolve_path(static_dir: &str, request_path: &str, index_files: &[String]) -> Option<PathBuf> {
    let decoded = percent_decode(request_path)?;
    let relative = decoded.trim_start_matches('/');

    if relative.contains('\0') || relative.contains('\\') {
        return None;
    }
    if relative.split('/').any(|segment| segment.starts_with('.')) {
        if relative.split('/').any(|segment| segment == "..") {
            tracing::warn!("Path traversal attempt blocked: {request_path}");
        }
        return None;
    }

    let root = match Path::new(static_dir).canonicalize() {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!("Static directory not found or inaccessible '{static_dir}': {e}");
            return None;
        }
    };

    let mut file_path = root.join(relative);
    if file_path.is_dir() {
        file_path = index_files
            .iter()
            .map(|index| file_path.join(index))
            .find(|candidate| candidate.is_file())?;
    }

    // File not found is common (404), no need to log
    let canonical = file_path.canonicalize().ok()?;
    if !canonical.starts_with(&root) {
        tracing::warn!(
            "Path traversal attempt blocked: {request_path} -> {}",
            canonical.display()
        );
        return None;
    }

    canonical.is_file().then_some(canonical)
}

/// Decode `%XX` escapes. Malformed escapes or non-UTF-8 results give `None`.
fn percent_decode(path: &str) -> Option<String> {
    let bytes = path.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes.get(i + 1..i + 3)?;
            let hex = std::str::from_utf8(hex).ok()?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }

    String::from_utf8(out).ok()
}
