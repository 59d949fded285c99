//! Store error types
//!
//! Every failure of the project file or the image directory ends up here.
//! Handlers only care whether the failure happened while loading the
//! collection or while persisting something, see [`StoreError::is_read_failure`].

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// The data file exists but could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The data file was read but does not hold a JSON array of projects.
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize projects: {0}")]
    Serialize(#[source] serde_json::Error),

    /// Writing the temp file or renaming it over the data file failed.
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to save image {}: {source}", .path.display())]
    ImageSave {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    /// True when the collection could not be loaded (as opposed to saved).
    pub const fn is_read_failure(&self) -> bool {
        matches!(self, Self::Read { .. } | Self::Parse { .. })
    }
}
