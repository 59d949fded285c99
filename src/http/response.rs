//! HTTP response building module
//!
//! Builders for every response the service sends. Builder failures fall back
//! to a bare response and get logged.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, ACCESS_CONTROL_ALLOW_ORIGIN, VARY};
use hyper::{Response, StatusCode};
use serde::Serialize;

pub type HttpResponse = Response<Full<Bytes>>;

/// Methods advertised in CORS preflight responses
const CORS_METHODS: &str = "GET,HEAD,PUT,PATCH,POST,DELETE";

/// Build JSON response
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> HttpResponse {
    let json = match serde_json::to_vec(body) {
        Ok(j) => j,
        Err(e) => {
            tracing::error!("Failed to serialize response: {e}");
            return text_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
        }
    };

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json; charset=utf-8")
        .header("Content-Length", json.len())
        .body(Full::new(Bytes::from(json)))
        .unwrap_or_else(|e| {
            log_build_error(status, &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build plain-text response
pub fn text_response(status: StatusCode, message: &str) -> HttpResponse {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain; charset=utf-8")
        .header("Content-Length", message.len())
        .body(Full::new(Bytes::from(message.to_string())))
        .unwrap_or_else(|e| {
            log_build_error(status, &e);
            Response::new(Full::new(Bytes::from(message.to_string())))
        })
}

/// 404 with a `Cannot GET /path` body
pub fn build_404_response(method: &str, path: &str) -> HttpResponse {
    text_response(StatusCode::NOT_FOUND, &format!("Cannot {method} {path}"))
}

pub fn build_413_response() -> HttpResponse {
    text_response(StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large")
}

/// Build 304 Not Modified response
pub fn build_304_response(etag: &str) -> HttpResponse {
    Response::builder()
        .status(StatusCode::NOT_MODIFIED)
        .header("ETag", etag)
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|e| {
            log_build_error(StatusCode::NOT_MODIFIED, &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build static file response
///
/// `Content-Length` always reflects the file, even for HEAD.
pub fn build_file_response(
    data: Vec<u8>,
    content_type: &str,
    etag: &str,
    is_head: bool,
) -> HttpResponse {
    let content_length = data.len();
    let body = if is_head { Bytes::new() } else { Bytes::from(data) };

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", content_type)
        .header("Content-Length", content_length)
        .header("ETag", etag)
        .header("Cache-Control", "public, max-age=0")
        .body(Full::new(body))
        .unwrap_or_else(|e| {
            log_build_error(StatusCode::OK, &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build OPTIONS response (preflight request)
///
/// With CORS on, the requested headers are reflected back as allowed.
pub fn build_options_response(enable_cors: bool, request_headers: Option<&HeaderValue>) -> HttpResponse {
    let mut builder = Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Allow", CORS_METHODS)
        .header("Content-Length", 0);

    if enable_cors {
        builder = builder.header("Access-Control-Allow-Methods", CORS_METHODS);
        if let Some(requested) = request_headers {
            builder = builder
                .header("Access-Control-Allow-Headers", requested)
                .header(VARY, "Access-Control-Request-Headers");
        }
    }

    builder.body(Full::new(Bytes::new())).unwrap_or_else(|e| {
        log_build_error(StatusCode::NO_CONTENT, &e);
        Response::new(Full::new(Bytes::new()))
    })
}

/// Allow any origin on a finished response
pub fn apply_cors(response: &mut HttpResponse) {
    response
        .headers_mut()
        .insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
}

/// Log response build error
fn log_build_error(status: StatusCode, error: &hyper::http::Error) {
    tracing::error!("Failed to build {status} response: {error}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_string(resp: HttpResponse) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_json_response() {
        let resp = json_response(StatusCode::OK, &serde_json::json!({"success": true}));
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()["content-type"],
            "application/json; charset=utf-8"
        );
        assert_eq!(body_string(resp).await, r#"{"success":true}"#);
    }

    #[tokio::test]
    async fn test_text_response() {
        let resp = text_response(StatusCode::INTERNAL_SERVER_ERROR, "Error reading data");
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp.headers()["content-length"], "18");
        assert_eq!(body_string(resp).await, "Error reading data");
    }

    #[tokio::test]
    async fn test_404_message() {
        let resp = build_404_response("PUT", "/api/projects");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_string(resp).await, "Cannot PUT /api/projects");
    }

    #[tokio::test]
    async fn test_head_file_response_has_no_body() {
        let resp = build_file_response(b"hello".to_vec(), "text/plain", "W/\"5-0\"", true);
        assert_eq!(resp.headers()["content-length"], "5");
        assert_eq!(body_string(resp).await, "");
    }

    #[test]
    fn test_options_response_with_cors() {
        let requested = HeaderValue::from_static("content-type");
        let resp = build_options_response(true, Some(&requested));
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_eq!(resp.headers()["access-control-allow-methods"], CORS_METHODS);
        assert_eq!(resp.headers()["access-control-allow-headers"], "content-type");
    }

    #[test]
    fn test_options_response_without_cors() {
        let resp = build_options_response(false, None);
        assert!(resp.headers().get("access-control-allow-methods").is_none());
        assert_eq!(resp.headers()["allow"], CORS_METHODS);
    }

    #[test]
    fn test_apply_cors() {
        let mut resp = text_response(StatusCode::OK, "ok");
        apply_cors(&mut resp);
        assert_eq!(resp.headers()["access-control-allow-origin"], "*");
    }
}
