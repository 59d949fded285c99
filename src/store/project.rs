//! Project record model

use serde::{Deserialize, Serialize};

/// One persisted project entry.
///
/// Absent text fields are left out of the JSON entirely rather than written
/// as `null`, and `isImage` falls back to `false` for hand-edited records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub is_image: bool,
}

/// Where a project's icon comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectIcon {
    /// Emoji literal submitted with the form (may be missing)
    Emoji(Option<String>),
    /// Public relative path of an uploaded image
    Image(String),
}

/// Fields needed to create a project, before an id is assigned
#[derive(Debug, Clone)]
pub struct NewProject {
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub icon: ProjectIcon,
}

/// Link used when the form leaves `url` empty
pub const DEFAULT_URL: &str = "#";

impl Project {
    /// Build the record stored for `new` under `id`.
    pub fn create(id: i64, new: NewProject) -> Self {
        let url = new
            .url
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_URL.to_string());

        let (icon, is_image) = match new.icon {
            ProjectIcon::Emoji(emoji) => (emoji, false),
            ProjectIcon::Image(path) => (Some(path), true),
        };

        Self {
            id,
            title: new.title,
            description: new.description,
            url: Some(url),
            icon,
            is_image,
        }
    }
}
