//! Project store module
//!
//! The whole collection lives in one pretty-printed JSON array on disk.
//! Every mutation is a read-modify-write of that file; there is no cache
//! between requests.
//!
//! - A missing data file reads as an empty collection, for every caller.
//! - Mutations are serialized on an in-process lock so concurrent requests
//!   cannot lose each other's updates.
//! - Writes go to a sibling temp file that is renamed over the data file, so
//!   readers see either the old or the new document, never a truncated one.

mod error;
mod images;
mod project;

pub use error::StoreError;
pub use images::{ImageStore, StoredImage};
pub use project::{NewProject, Project, ProjectIcon};

use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::Mutex;

/// Milliseconds since the Unix epoch.
///
/// Used for project ids and upload names. Two calls within the same
/// millisecond return the same value.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub struct ProjectStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ProjectStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    #[cfg(test)]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Load the collection in stored order.
    pub async fn read(&self) -> Result<Vec<Project>, StoreError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        serde_json::from_slice(&bytes).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Replace the stored collection with `projects`.
    #[cfg(test)]
    pub async fn write(&self, projects: &[Project]) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.write_unlocked(projects).await
    }

    /// Read, apply `f`, write back, all under the writer lock.
    ///
    /// Nothing is written if the read fails.
    pub async fn mutate<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Vec<Project>) -> T,
    {
        let _guard = self.write_lock.lock().await;
        let mut projects = self.read().await?;
        let out = f(&mut projects);
        self.write_unlocked(&projects).await?;
        Ok(out)
    }

    /// Append one record to the end of the collection.
    pub async fn append(&self, project: Project) -> Result<(), StoreError> {
        self.mutate(|projects| projects.push(project)).await
    }

    /// Drop every record whose id equals `id` and return how many went.
    ///
    /// `None` matches nothing, but the collection is still rewritten.
    pub async fn remove(&self, id: Option<i64>) -> Result<usize, StoreError> {
        self.mutate(|projects| {
            let before = projects.len();
            projects.retain(|p| Some(p.id) != id);
            before - projects.len()
        })
        .await
    }

    async fn write_unlocked(&self, projects: &[Project]) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(projects).map_err(StoreError::Serialize)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|source| StoreError::Write {
                        path: parent.to_path_buf(),
                        source,
                    })?;
            }
        }

        let tmp_path = self.temp_path();
        if let Err(source) = fs::write(&tmp_path, &json).await {
            return Err(StoreError::Write {
                path: tmp_path,
                source,
            });
        }

        if let Err(source) = fs::rename(&tmp_path, &self.path).await {
            // Best effort; the rename error is what gets reported
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Write {
                path: self.path.clone(),
                source,
            });
        }

        tracing::debug!(
            "Wrote {} project(s) to {}",
            projects.len(),
            self.path.display()
        );
        Ok(())
    }

    /// `.projects.json.tmp` next to `projects.json`
    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map_or_else(|| "projects".into(), |n| n.to_string_lossy());
        self.path.with_file_name(format!(".{file_name}.tmp"))
    }
}
