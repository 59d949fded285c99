//! Logger module
//!
//! Provides logging utilities for the HTTP server including:
//! - `tracing` subscriber setup (`RUST_LOG` overrides `logging.level`)
//! - Server lifecycle logging
//! - Access logging with multiple formats, on the `access` target

mod format;

pub use format::{AccessLogEntry, AccessLogFormat};

use crate::config::{Config, LoggingConfig};
use std::net::SocketAddr;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the global subscriber
///
/// Should be called once at application startup. Later calls are ignored.
pub fn init(config: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true));

    let _ = subscriber.try_init();
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    tracing::info!("Server running at http://{addr}");
    tracing::info!("Log level: {}", config.logging.level);
    if let Some(workers) = config.server.workers {
        tracing::info!("Worker threads: {workers}");
    }
    tracing::info!("Data file: {}", config.storage.data_file);
    tracing::info!("Image directory: {}", config.storage.image_dir);
    tracing::info!("Static root: {}", config.storage.static_dir);
    if config.http.enable_cors {
        tracing::info!("CORS: any origin allowed");
    }
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    tracing::debug!("[Connection] Accepted from: {peer_addr}");
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    tracing::error!("Failed to serve connection: {err:?}");
}

pub fn log_connection_rejected(active: usize, max: u64) {
    tracing::warn!("Max connections reached: {active}/{max}. Connection rejected.");
}

pub fn log_shutdown(active: usize) {
    tracing::info!("Shutting down, {active} connection(s) still in flight");
}

pub fn log_access(entry: &AccessLogEntry, format: &AccessLogFormat) {
    tracing::info!(target: "access", "{}", entry.format(format));
}
