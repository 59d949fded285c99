//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: CORS preflight, body size check,
//! the three project endpoints, then static files for everything else.

use crate::config::AppState;
use crate::handler::{projects, static_files};
use crate::http::{self, HttpResponse};
use hyper::body::{Body, Bytes};
use hyper::header::{ACCESS_CONTROL_REQUEST_HEADERS, CONTENT_LENGTH, IF_NONE_MATCH};
use hyper::{Method, Request};
use std::convert::Infallible;
use std::sync::Arc;

const PROJECTS_PATH: &str = "/api/projects";

/// Request context for static file serving
pub struct RequestContext<'a> {
    pub path: &'a str,
    pub is_head: bool,
    pub if_none_match: Option<String>,
}

/// Project API routes
#[derive(Debug, PartialEq, Eq)]
enum ApiRoute<'a> {
    /// `/api/projects`
    Collection,
    /// `/api/projects/:id`, raw segment
    Item(&'a str),
}

impl<'a> ApiRoute<'a> {
    /// A trailing slash is tolerated on both routes
    fn resolve(path: &'a str) -> Option<Self> {
        let rest = path.strip_prefix(PROJECTS_PATH)?;
        if rest.is_empty() || rest == "/" {
            return Some(Self::Collection);
        }

        let segment = rest.strip_prefix('/')?;
        let segment = segment.strip_suffix('/').unwrap_or(segment);
        if segment.is_empty() || segment.contains('/') {
            None
        } else {
            Some(Self::Item(segment))
        }
    }
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
) -> Result<HttpResponse, Infallible>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let mut response = route_request(req, &state).await;
    if state.config.http.enable_cors {
        http::apply_cors(&mut response);
    }
    Ok(response)
}

async fn route_request<B>(req: Request<B>, state: &AppState) -> HttpResponse
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    // 1. Preflight
    if method == Method::OPTIONS {
        return http::build_options_response(
            state.config.http.enable_cors,
            req.headers().get(ACCESS_CONTROL_REQUEST_HEADERS),
        );
    }

    // 2. Check body size
    if let Some(resp) = check_body_size(&req, state.config.http.max_body_size) {
        return resp;
    }

    // 3. Project API
    match (ApiRoute::resolve(&path), &method) {
        (Some(ApiRoute::Collection), &Method::GET | &Method::HEAD) => {
            return projects::list(state).await;
        }
        (Some(ApiRoute::Collection), &Method::POST) => {
            return projects::create(req, state).await;
        }
        (Some(ApiRoute::Item(id)), &Method::DELETE) => {
            return projects::delete(id, state).await;
        }
        _ => {}
    }

    // 4. Static files
    if method == Method::GET || method == Method::HEAD {
        let ctx = RequestContext {
            path: &path,
            is_head: method == Method::HEAD,
            if_none_match: req
                .headers()
                .get(IF_NONE_MATCH)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string),
        };
        let storage = &state.config.storage;
        if let Some(resp) =
            static_files::serve(&ctx, &storage.static_dir, &state.config.routes.index_files).await
        {
            return resp;
        }
    }

    http::build_404_response(method.as_str(), &path)
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size<B>(req: &Request<B>, max_body_size: u64) -> Option<HttpResponse> {
    let content_length = req.headers().get(CONTENT_LENGTH)?;
    match content_length.to_str().ok()?.parse::<u64>() {
        Ok(size) if size > max_body_size => {
            tracing::warn!("Request body too large: {size} bytes (max: {max_body_size})");
            Some(http::build_413_response())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::form::multipart_body;
    use crate::store::ImageStore;
    use http_body_util::{BodyExt, Full};
    use hyper::{HeaderMap, StatusCode};
    use serde_json::Value;
    use tempfile::TempDir;

    const BOUNDARY: &str = "XyZfolioTestBoundary";

    struct Reply {
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
    }

    impl Reply {
        fn json(&self) -> Value {
            serde_json::from_slice(&self.body).unwrap()
        }

        fn text(&self) -> &str {
            std::str::from_utf8(&self.body).unwrap()
        }
    }

    fn setup() -> (TempDir, Arc<AppState>) {
        let tmp = TempDir::new().unwrap();
        let state = Arc::new(AppState::rooted_at(tmp.path()));
        (tmp, state)
    }

    async fn send(state: &Arc<AppState>, req: Request<Full<Bytes>>) -> Reply {
        let resp = handle_request(req, Arc::clone(state)).await.unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        Reply {
            status,
            headers,
            body,
        }
    }

    fn request(method: &str, uri: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    fn create_request(
        fields: &[(&str, &str)],
        file: Option<(&str, &str, &[u8])>,
    ) -> Request<Full<Bytes>> {
        Request::builder()
            .method("POST")
            .uri("/api/projects")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Full::new(Bytes::from(multipart_body(BOUNDARY, fields, file))))
            .unwrap()
    }

    fn demo_fields() -> Vec<(&'static str, &'static str)> {
        vec![
            ("title", "Demo"),
            ("description", "x"),
            ("url", "http://e.com"),
            ("iconType", "emoji"),
            ("emojiIcon", "🚀"),
        ]
    }

    fn looks_like_upload_path(icon: &str, original: &str) -> bool {
        icon.strip_prefix("image/")
            .and_then(|rest| rest.strip_suffix(original))
            .and_then(|rest| rest.strip_suffix('-'))
            .is_some_and(|millis| !millis.is_empty() && millis.chars().all(|c| c.is_ascii_digit()))
    }

    #[test]
    fn test_api_route_resolution() {
        assert_eq!(ApiRoute::resolve("/api/projects"), Some(ApiRoute::Collection));
        assert_eq!(ApiRoute::resolve("/api/projects/"), Some(ApiRoute::Collection));
        assert_eq!(ApiRoute::resolve("/api/projects/17"), Some(ApiRoute::Item("17")));
        assert_eq!(ApiRoute::resolve("/api/projects/17/"), Some(ApiRoute::Item("17")));
        assert_eq!(ApiRoute::resolve("/api/projects/1/2"), None);
        assert_eq!(ApiRoute::resolve("/api/projectsX"), None);
        assert_eq!(ApiRoute::resolve("/index.html"), None);
    }

    #[tokio::test]
    async fn test_list_before_any_data_is_empty() {
        let (_tmp, state) = setup();
        let reply = send(&state, request("GET", "/api/projects")).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.json(), serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_create_with_emoji() {
        let (_tmp, state) = setup();
        let reply = send(&state, create_request(&demo_fields(), None)).await;

        assert_eq!(reply.status, StatusCode::OK);
        let created = reply.json();
        assert_eq!(created["isImage"], false);
        assert_eq!(created["icon"], "🚀");
        assert_eq!(created["url"], "http://e.com");
        assert_eq!(created["title"], "Demo");
        assert_eq!(created["description"], "x");
        assert!(created["id"].is_i64());
        assert!(created.get("iconType").is_none());
    }

    #[tokio::test]
    async fn test_create_with_image_upload() {
        let (tmp, state) = setup();
        let reply = send(
            &state,
            create_request(&demo_fields(), Some(("image", "photo.png", b"fake png"))),
        )
        .await;

        assert_eq!(reply.status, StatusCode::OK);
        let created = reply.json();
        assert_eq!(created["isImage"], true);
        let icon = created["icon"].as_str().unwrap();
        assert!(looks_like_upload_path(icon, "photo.png"), "{icon}");
        assert_eq!(std::fs::read(tmp.path().join(icon)).unwrap(), b"fake png");
    }

    #[tokio::test]
    async fn test_created_image_is_served_statically() {
        let (_tmp, state) = setup();
        let created = send(
            &state,
            create_request(&[], Some(("image", "photo.png", b"fake png"))),
        )
        .await
        .json();
        let icon = created["icon"].as_str().unwrap();

        let reply = send(&state, request("GET", &format!("/{icon}"))).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.headers["content-type"], "image/png");
        assert_eq!(&reply.body[..], b"fake png");
    }

    #[tokio::test]
    async fn test_create_without_fields_defaults_url() {
        let (_tmp, state) = setup();
        let reply = send(&state, create_request(&[], None)).await;

        let created = reply.json();
        assert_eq!(created["url"], "#");
        assert_eq!(created["isImage"], false);
        assert!(created.get("title").is_none());
        assert!(created.get("icon").is_none());
    }

    #[tokio::test]
    async fn test_create_accepts_json() {
        let (_tmp, state) = setup();
        let req = Request::builder()
            .method("POST")
            .uri("/api/projects")
            .header("content-type", "application/json")
            .body(Full::new(Bytes::from(
                r#"{"title":"Demo","description":"x","url":"http://e.com","emojiIcon":"🚀"}"#,
            )))
            .unwrap();

        let created = send(&state, req).await.json();
        assert_eq!(created["icon"], "🚀");
        assert_eq!(created["url"], "http://e.com");
    }

    #[tokio::test]
    async fn test_list_after_create_returns_record() {
        let (_tmp, state) = setup();
        let created = send(&state, create_request(&demo_fields(), None)).await.json();

        let reply = send(&state, request("GET", "/api/projects")).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.json(), serde_json::json!([created]));
    }

    #[tokio::test]
    async fn test_every_create_is_persisted() {
        let (_tmp, state) = setup();
        let titles = ["one", "two", "three", "four"];
        for title in titles {
            let reply = send(&state, create_request(&[("title", title)], None)).await;
            assert_eq!(reply.status, StatusCode::OK);
        }

        let listed = send(&state, request("GET", "/api/projects")).await.json();
        let listed_titles: Vec<&str> = listed
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["title"].as_str().unwrap())
            .collect();
        assert_eq!(listed_titles, titles);
    }

    #[tokio::test]
    async fn test_delete_then_list() {
        let (_tmp, state) = setup();
        let created = send(&state, create_request(&demo_fields(), None)).await.json();
        let id = created["id"].as_i64().unwrap();

        let reply = send(&state, request("DELETE", &format!("/api/projects/{id}"))).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.json(), serde_json::json!({ "success": true }));

        let listed = send(&state, request("GET", "/api/projects")).await.json();
        assert!(listed
            .as_array()
            .unwrap()
            .iter()
            .all(|p| p["id"].as_i64() != Some(id)));
    }

    #[tokio::test]
    async fn test_delete_unknown_id_succeeds_and_keeps_data() {
        let (_tmp, state) = setup();
        send(&state, create_request(&demo_fields(), None)).await;
        let before = send(&state, request("GET", "/api/projects")).await.json();

        for uri in ["/api/projects/1", "/api/projects/not-a-number"] {
            let reply = send(&state, request("DELETE", uri)).await;
            assert_eq!(reply.status, StatusCode::OK);
            assert_eq!(reply.json(), serde_json::json!({ "success": true }));
        }

        let after = send(&state, request("GET", "/api/projects")).await.json();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_delete_removes_duplicate_ids() {
        let (_tmp, state) = setup();
        std::fs::write(
            state.projects.path(),
            r#"[{"id":5,"title":"a","isImage":false},{"id":6,"isImage":false},{"id":5,"isImage":false}]"#,
        )
        .unwrap();

        send(&state, request("DELETE", "/api/projects/5")).await;

        let listed = send(&state, request("GET", "/api/projects")).await.json();
        assert_eq!(listed, serde_json::json!([{ "id": 6, "isImage": false }]));
    }

    #[tokio::test]
    async fn test_corrupt_data_file_is_a_server_error() {
        let (_tmp, state) = setup();
        std::fs::write(state.projects.path(), "[{\"id\":").unwrap();

        let reply = send(&state, request("GET", "/api/projects")).await;
        assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(reply.text(), "Error reading data");

        let reply = send(&state, request("DELETE", "/api/projects/1")).await;
        assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(reply.text(), "Error reading data");

        let reply = send(&state, create_request(&demo_fields(), None)).await;
        assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(reply.text(), "Error saving data");

        // The broken file is left for someone to inspect
        assert_eq!(
            std::fs::read_to_string(state.projects.path()).unwrap(),
            "[{\"id\":"
        );
    }

    fn block_data_file_writes(state: &AppState) -> String {
        let seeded = r#"[{"id":7,"title":"kept","isImage":false}]"#;
        let data_file = state.projects.path();
        std::fs::write(data_file, seeded).unwrap();
        // A directory where the temp file goes makes every write fail
        std::fs::create_dir(data_file.with_file_name(".projects.json.tmp")).unwrap();
        seeded.to_string()
    }

    #[tokio::test]
    async fn test_create_write_failure_is_a_server_error() {
        let (_tmp, state) = setup();
        let seeded = block_data_file_writes(&state);

        let reply = send(&state, create_request(&demo_fields(), None)).await;
        assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(reply.text(), "Error saving data");
        assert_eq!(std::fs::read_to_string(state.projects.path()).unwrap(), seeded);
    }

    #[tokio::test]
    async fn test_delete_write_failure_is_a_server_error() {
        let (_tmp, state) = setup();
        let seeded = block_data_file_writes(&state);

        let reply = send(&state, request("DELETE", "/api/projects/7")).await;
        assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(reply.text(), "Error saving data");
        assert_eq!(std::fs::read_to_string(state.projects.path()).unwrap(), seeded);
    }

    #[tokio::test]
    async fn test_image_save_failure_is_a_server_error() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, b"file, not a dir").unwrap();
        let mut app = AppState::rooted_at(tmp.path());
        app.images = ImageStore::new(blocker.join("image"), "image/");
        let state = Arc::new(app);

        let reply = send(
            &state,
            create_request(&demo_fields(), Some(("image", "photo.png", b"png"))),
        )
        .await;
        assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(reply.text(), "Error saving data");
        assert!(!state.projects.path().exists());
    }

    #[tokio::test]
    async fn test_failed_create_leaves_uploaded_image() {
        let (tmp, state) = setup();
        std::fs::write(state.projects.path(), "garbage").unwrap();

        let reply = send(
            &state,
            create_request(&[], Some(("image", "photo.png", b"orphan"))),
        )
        .await;
        assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);

        let uploads: Vec<_> = std::fs::read_dir(tmp.path().join("image")).unwrap().collect();
        assert_eq!(uploads.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_multipart_is_bad_request() {
        let (_tmp, state) = setup();
        let req = Request::builder()
            .method("POST")
            .uri("/api/projects")
            .header("content-type", "multipart/form-data")
            .body(Full::new(Bytes::from("whatever")))
            .unwrap();

        let reply = send(&state, req).await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert!(!state.projects.path().exists());
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let mut app = AppState::rooted_at(tmp.path());
        app.config.http.max_body_size = 64;
        let state = Arc::new(app);

        let big = vec![b'a'; 1024];
        let body = std::str::from_utf8(&big).unwrap();

        // Declared length
        let mut req = create_request(&[("description", body)], None);
        req.headers_mut()
            .insert(CONTENT_LENGTH, hyper::header::HeaderValue::from_static("1200"));
        let reply = send(&state, req).await;
        assert_eq!(reply.status, StatusCode::PAYLOAD_TOO_LARGE);

        // Undeclared length is caught while reading
        let reply = send(&state, create_request(&[("description", body)], None)).await;
        assert_eq!(reply.status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(!state.projects.path().exists());
    }

    #[tokio::test]
    async fn test_preflight_allows_any_origin() {
        let (_tmp, state) = setup();
        let req = Request::builder()
            .method("OPTIONS")
            .uri("/api/projects/123")
            .header("origin", "http://elsewhere.test")
            .header("access-control-request-method", "DELETE")
            .header("access-control-request-headers", "content-type")
            .body(Full::new(Bytes::new()))
            .unwrap();

        let reply = send(&state, req).await;
        assert_eq!(reply.status, StatusCode::NO_CONTENT);
        assert_eq!(reply.headers["access-control-allow-origin"], "*");
        assert!(reply.headers["access-control-allow-methods"]
            .to_str()
            .unwrap()
            .contains("DELETE"));
        assert_eq!(reply.headers["access-control-allow-headers"], "content-type");
    }

    #[tokio::test]
    async fn test_every_response_carries_cors_header() {
        let (_tmp, state) = setup();
        let listed = send(&state, request("GET", "/api/projects")).await;
        assert_eq!(listed.headers["access-control-allow-origin"], "*");

        let missing = send(&state, request("GET", "/missing.html")).await;
        assert_eq!(missing.headers["access-control-allow-origin"], "*");
    }

    #[tokio::test]
    async fn test_cors_can_be_disabled() {
        let tmp = TempDir::new().unwrap();
        let mut app = AppState::rooted_at(tmp.path());
        app.config.http.enable_cors = false;
        let state = Arc::new(app);

        let reply = send(&state, request("GET", "/api/projects")).await;
        assert!(reply.headers.get("access-control-allow-origin").is_none());
    }

    #[tokio::test]
    async fn test_unrouted_methods_are_not_found() {
        let (_tmp, state) = setup();
        let reply = send(&state, request("PUT", "/api/projects")).await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
        assert_eq!(reply.text(), "Cannot PUT /api/projects");

        let reply = send(&state, request("GET", "/api/projects/5")).await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND);

        let reply = send(&state, request("DELETE", "/api/projects")).await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_static_index_is_served() {
        let (tmp, state) = setup();
        std::fs::write(tmp.path().join("index.html"), "<h1>Projects</h1>").unwrap();

        let reply = send(&state, request("GET", "/")).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.text(), "<h1>Projects</h1>");
    }
}
