// Application state module
// Shared by every connection task

use super::types::Config;
use crate::store::{ImageStore, ProjectStore};

/// Application state
pub struct AppState {
    pub config: Config,
    pub projects: ProjectStore,
    pub images: ImageStore,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let projects = ProjectStore::new(&config.storage.data_file);
        let images = ImageStore::new(
            &config.storage.image_dir,
            &config.storage.image_url_prefix,
        );

        Self {
            config,
            projects,
            images,
        }
    }

    /// Default config with every storage path rooted at `root`
    #[cfg(test)]
    pub fn rooted_at(root: &std::path::Path) -> Self {
        let mut config = Config::defaults().expect("default config");
        let under = |name: &str| root.join(name).to_string_lossy().into_owned();
        config.storage.data_file = under("projects.json");
        config.storage.image_dir = under("image");
        config.storage.static_dir = root.to_string_lossy().into_owned();
        Self::new(config)
    }
}
