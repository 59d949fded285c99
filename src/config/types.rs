// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub http: HttpConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub routes: RoutesConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Default `tracing` filter, overridden by `RUST_LOG`
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "combined".to_string()
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    /// Seconds a connection may wait for the next request's headers; 0 disables keep-alive
    pub keep_alive_timeout: u64,
    /// Seconds to wait for in-flight connections after a shutdown signal
    pub shutdown_timeout: u64,
    pub max_connections: Option<u64>,
}

/// HTTP configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    /// Allow cross-origin requests from any origin
    pub enable_cors: bool,
    pub max_body_size: u64,
}

/// Where projects, uploads and static assets live
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// JSON document holding the project collection
    pub data_file: String,
    /// Directory receiving uploaded images
    pub image_dir: String,
    /// Prefix stored in a project's `icon` for uploaded images
    pub image_url_prefix: String,
    /// Root served verbatim for every non-API path
    pub static_dir: String,
}

/// Routes configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RoutesConfig {
    #[serde(default = "default_index_files")]
    pub index_files: Vec<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_index_files() -> Vec<String> {
    vec!["index.html".to_string()]
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            index_files: default_index_files(),
        }
    }
}
