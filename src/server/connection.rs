// Connection handling module
// Accepts a single TCP connection and serves it on its own task

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::{TokioIo, TokioTimer};
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::config::AppState;
use crate::handler;
use crate::logger::{self, AccessLogEntry, AccessLogFormat};

/// Accept a connection, enforcing `performance.max_connections`.
///
/// # Arguments
///
/// * `stream` - The TCP stream to handle
/// * `peer_addr` - The peer's socket address
/// * `state` - Shared application state
/// * `conn_counter` - Active connection counter
/// * `shutdown` - Flips to `true` when the server stops accepting
pub fn accept_connection(
    stream: tokio::net::TcpStream,
    peer_addr: std::net::SocketAddr,
    state: &Arc<AppState>,
    conn_counter: &Arc<AtomicUsize>,
    shutdown: watch::Receiver<bool>,
) {
    // Increment counter first, then check limit (prevents race condition)
    let prev_count = conn_counter.fetch_add(1, Ordering::SeqCst);

    if let Some(max_conn) = state.config.performance.max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            conn_counter.fetch_sub(1, Ordering::SeqCst);
            logger::log_connection_rejected(prev_count, max_conn);
            drop(stream);
            return;
        }
    }

    logger::log_connection_accepted(&peer_addr);

    handle_connection(
        stream,
        peer_addr,
        Arc::clone(state),
        Arc::clone(conn_counter),
        shutdown,
    );
}

/// Serve one connection in a spawned task.
///
/// Only the wait for request headers is timed (`keep_alive_timeout`); a
/// request whose body is still arriving or whose handler is running is never
/// cut off. The connection is asked to finish gracefully once `shutdown`
/// changes. The counter is decremented when the task ends.
fn handle_connection(
    stream: tokio::net::TcpStream,
    peer_addr: std::net::SocketAddr,
    state: Arc<AppState>,
    conn_counter: Arc<AtomicUsize>,
    mut shutdown: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        let io = TokioIo::new(stream);

        let performance = &state.config.performance;
        let mut builder = http1::Builder::new();
        builder
            .timer(TokioTimer::new())
            .keep_alive(performance.keep_alive_timeout > 0);
        if performance.keep_alive_timeout > 0 {
            builder.header_read_timeout(Duration::from_secs(performance.keep_alive_timeout));
        }

        let access_format = state
            .config
            .logging
            .access_log
            .then(|| AccessLogFormat::from(state.config.logging.access_log_format.as_str()));

        let service_state = Arc::clone(&state);
        let service = service_fn(move |req: Request<Incoming>| {
            let state = Arc::clone(&service_state);
            let access_format = access_format.clone();
            async move {
                let Some(format) = access_format else {
                    return handler::handle_request(req, state).await;
                };

                let mut entry = AccessLogEntry::start(&req, peer_addr);
                let resp = handler::handle_request(req, state).await?;
                entry.finish(&resp);
                logger::log_access(&entry, &format);
                Ok::<_, Infallible>(resp)
            }
        });

        let conn = builder.serve_connection(io, service);
        let mut conn = std::pin::pin!(conn);

        let mut draining = false;
        let served = loop {
            tokio::select! {
                res = conn.as_mut() => break res,
                _ = shutdown.changed(), if !draining => {
                    draining = true;
                    conn.as_mut().graceful_shutdown();
                }
            }
        };

        if let Err(err) = served {
            if err.is_timeout() {
                tracing::debug!("Connection from {peer_addr} idle, closing");
            } else {
                logger::log_connection_error(&err);
            }
        }

        conn_counter.fetch_sub(1, Ordering::SeqCst);
    });
}
