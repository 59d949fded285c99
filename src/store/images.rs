//! Uploaded image storage
//!
//! Images land in a single directory under `<upload-millis>-<original name>`.
//! Nothing about the upload is checked: no extension filter, no size limit
//! beyond the request body cap, no content sniffing.

use std::path::PathBuf;
use tokio::fs;

use super::error::StoreError;
use super::now_millis;

/// Result of a successful image save
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    /// File name inside the image directory
    pub file_name: String,
    /// Location on disk
    pub path: PathBuf,
    /// Relative path clients use to fetch the image, e.g. `image/1700000000000-photo.png`
    pub public_path: String,
}

pub struct ImageStore {
    dir: PathBuf,
    url_prefix: String,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>, url_prefix: &str) -> Self {
        Self {
            dir: dir.into(),
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        }
    }

    #[cfg(test)]
    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }

    /// Write `data` to the image directory, creating it if needed.
    pub async fn save(&self, original_name: &str, data: &[u8]) -> Result<StoredImage, StoreError> {
        let file_name = format!("{}-{}", now_millis(), base_name(original_name));
        let path = self.dir.join(&file_name);

        fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| StoreError::ImageSave {
                path: self.dir.clone(),
                source,
            })?;

        fs::write(&path, data)
            .await
            .map_err(|source| StoreError::ImageSave {
                path: path.clone(),
                source,
            })?;

        tracing::debug!("Saved upload {} ({} bytes)", path.display(), data.len());

        let public_path = if self.url_prefix.is_empty() {
            file_name.clone()
        } else {
            format!("{}/{file_name}", self.url_prefix)
        };

        Ok(StoredImage {
            file_name,
            path,
            public_path,
        })
    }
}

/// Last path component of a client-supplied file name.
///
/// Browsers normally send a bare name, but nothing stops a client from
/// sending `../../etc/passwd` or a Windows path.
fn base_name(original: &str) -> &str {
    let name = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    match name {
        "" | "." | ".." => "upload",
        other => other,
    }
}
