//! Project API handlers
//!
//! `GET /api/projects`, `POST /api/projects` and `DELETE /api/projects/:id`.
//! Failures are reported as a bare 500 with a fixed plain-text message; the
//! detailed error only goes to the log.

use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::CONTENT_TYPE;
use hyper::{Request, StatusCode};
use std::path::PathBuf;

use super::form::ProjectForm;
use crate::config::AppState;
use crate::http::{self, HttpResponse};
use crate::store::{now_millis, NewProject, Project, ProjectIcon, StoreError};

const READ_ERROR: &str = "Error reading data";
const SAVE_ERROR: &str = "Error saving data";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// List every stored project in insertion order
pub async fn list(state: &AppState) -> HttpResponse {
    match state.projects.read().await {
        Ok(projects) => http::json_response(StatusCode::OK, &projects),
        Err(e) => {
            tracing::error!("Failed to list projects: {e}");
            http::text_response(StatusCode::INTERNAL_SERVER_ERROR, READ_ERROR)
        }
    }
}

/// Create a project from a form, saving the attached image first
pub async fn create<B>(req: Request<B>, state: &AppState) -> HttpResponse
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    let body = match read_body(req.into_body(), state.config.http.max_body_size).await {
        Ok(body) => body,
        Err(resp) => return resp,
    };

    let form = match ProjectForm::parse(content_type.as_deref(), body).await {
        Ok(form) => form,
        Err(e) => {
            tracing::warn!("Rejected project form: {e}");
            return http::text_response(StatusCode::BAD_REQUEST, "Invalid form data");
        }
    };
    tracing::debug!(icon_type = ?form.icon_type, has_image = form.image.is_some(), "Creating project");

    let mut saved_image: Option<PathBuf> = None;
    let icon = match form.image {
        Some(upload) => match state.images.save(&upload.file_name, &upload.data).await {
            Ok(stored) => {
                tracing::debug!("Upload stored as {}", stored.file_name);
                saved_image = Some(stored.path);
                ProjectIcon::Image(stored.public_path)
            }
            Err(e) => return save_failed(&e),
        },
        None => ProjectIcon::Emoji(form.emoji_icon),
    };

    let project = Project::create(
        now_millis(),
        NewProject {
            title: form.title,
            description: form.description,
            url: form.url,
            icon,
        },
    );

    match state.projects.append(project.clone()).await {
        Ok(()) => {
            tracing::info!("Created project {}", project.id);
            http::json_response(StatusCode::OK, &project)
        }
        Err(e) => {
            if let Some(path) = saved_image {
                tracing::warn!("Uploaded image left without a project: {}", path.display());
            }
            save_failed(&e)
        }
    }
}

/// Remove every project whose id matches the path segment
///
/// Succeeds whether or not anything matched.
pub async fn delete(raw_id: &str, state: &AppState) -> HttpResponse {
    let id = parse_id(raw_id);

    match state.projects.remove(id).await {
        Ok(removed) => {
            tracing::info!("Deleted {removed} project(s) with id {raw_id}");
            http::json_response(StatusCode::OK, &serde_json::json!({ "success": true }))
        }
        Err(e) if e.is_read_failure() => {
            tracing::error!("Failed to load projects for delete: {e}");
            http::text_response(StatusCode::INTERNAL_SERVER_ERROR, READ_ERROR)
        }
        Err(e) => save_failed(&e),
    }
}

/// Lenient integer parse: leading whitespace, optional sign, then as many
/// decimal digits as there are. `"12abc"` is 12; no digits at all is `None`.
pub fn parse_id(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let value = rest[..end].parse::<i64>().ok()?;

    Some(if negative { -value } else { value })
}

/// Collect the body, refusing anything over `limit` bytes
async fn read_body<B>(body: B, limit: u64) -> Result<Bytes, HttpResponse>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let limit = usize::try_from(limit).unwrap_or(usize::MAX);

    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            tracing::warn!("Request body over {limit} bytes");
            Err(http::build_413_response())
        }
        Err(e) => {
            tracing::warn!("Failed to read request body: {e}");
            Err(http::text_response(StatusCode::BAD_REQUEST, "Invalid request body"))
        }
    }
}

fn save_failed(error: &StoreError) -> HttpResponse {
    tracing::error!("Failed to save project: {error}");
    http::text_response(StatusCode::INTERNAL_SERVER_ERROR, SAVE_ERROR)
}
