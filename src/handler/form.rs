//! Create-project form parsing
//!
//! The admin page posts `multipart/form-data`; JSON objects are accepted as
//! well. No field is required and nothing is validated. Any other content
//! type yields an empty form.

use futures::stream;
use hyper::body::Bytes;
use serde_json::Value;
use std::convert::Infallible;
use thiserror::Error;

/// Multipart field carrying the optional image upload
pub const IMAGE_FIELD: &str = "image";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProjectForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    /// Sent by the admin page alongside `emojiIcon`; never stored
    pub icon_type: Option<String>,
    pub emoji_icon: Option<String>,
    pub image: Option<UploadedFile>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Name as sent by the client, unsanitized
    pub file_name: String,
    pub data: Bytes,
}

#[derive(Error, Debug)]
pub enum FormError {
    #[error("invalid multipart body: {0}")]
    Multipart(#[from] multer::Error),

    #[error("invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProjectForm {
    pub async fn parse(content_type: Option<&str>, body: Bytes) -> Result<Self, FormError> {
        let Some(content_type) = content_type else {
            return Ok(Self::default());
        };

        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "multipart/form-data" => {
                let boundary = multer::parse_boundary(content_type)?;
                parse_multipart(boundary, body).await
            }
            "application/json" => parse_json(&body),
            _ => Ok(Self::default()),
        }
    }

    /// Store a text field; unknown names are dropped. Last value wins.
    fn set_field(&mut self, name: &str, value: Option<String>) {
        let slot = match name {
            "title" => &mut self.title,
            "description" => &mut self.description,
            "url" => &mut self.url,
            "iconType" => &mut self.icon_type,
            "emojiIcon" => &mut self.emoji_icon,
            _ => return,
        };
        *slot = value;
    }
}

async fn parse_multipart(boundary: String, body: Bytes) -> Result<ProjectForm, FormError> {
    let body_stream = stream::once(async move { Ok::<_, Infallible>(body) });
    let mut multipart = multer::Multipart::new(body_stream, boundary);
    let mut form = ProjectForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        if let Some(file_name) = field.file_name().map(ToString::to_string) {
            let data = field.bytes().await?;
            // An empty file input still arrives as a part with filename=""
            if name == IMAGE_FIELD && !file_name.is_empty() && form.image.is_none() {
                form.image = Some(UploadedFile { file_name, data });
            } else {
                tracing::debug!("Ignoring file part '{name}' ({file_name})");
            }
        } else {
            let value = field.text().await?;
            form.set_field(&name, Some(value));
        }
    }

    Ok(form)
}

fn parse_json(body: &[u8]) -> Result<ProjectForm, FormError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ProjectForm::default());
    }

    let mut form = ProjectForm::default();
    if let Value::Object(map) = serde_json::from_slice::<Value>(body)? {
        for (name, value) in map {
            // `false`, `0` and `""` count as no url, so the record gets the default
            let value = if name == "url" && is_falsy(&value) {
                None
            } else {
                json_text(value)
            };
            form.set_field(&name, value);
        }
    }
    Ok(form)
}

/// Strings pass through, `null` is absent, anything else is stringified
fn json_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => true,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Hand-built `multipart/form-data` body for tests
#[cfg(test)]
pub fn multipart_body(
    boundary: &str,
    fields: &[(&str, &str)],
    file: Option<(&str, &str, &[u8])>,
) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((name, file_name, data)) = file {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}
