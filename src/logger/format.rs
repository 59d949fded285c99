//! Access log format module
//!
//! Supports multiple log formats:
//! - `combined` (Apache/Nginx combined format)
//! - `common` (Common Log Format - CLF)
//! - `json` (one JSON object per line)
//! - Custom patterns with `$variables`

use chrono::{DateTime, Local};
use hyper::body::Body;
use hyper::header::{HeaderName, REFERER, USER_AGENT};
use hyper::{Request, Response};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

const TIME_LOCAL: &str = "%d/%b/%Y:%H:%M:%S %z";

/// Parsed `logging.access_log_format`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessLogFormat {
    Combined,
    Common,
    Json,
    Custom(String),
}

impl From<&str> for AccessLogFormat {
    fn from(value: &str) -> Self {
        match value {
            "combined" => Self::Combined,
            "common" => Self::Common,
            "json" => Self::Json,
            pattern => Self::Custom(pattern.to_string()),
        }
    }
}

/// Everything logged about one request/response pair
#[derive(Debug, Clone)]
pub struct AccessLogEntry {
    pub remote_addr: SocketAddr,
    pub time: DateTime<Local>,
    pub method: String,
    /// Path plus query string, as received
    pub uri: String,
    /// e.g. `HTTP/1.1`
    pub protocol: String,
    pub status: u16,
    pub body_bytes: u64,
    pub referer: Option<String>,
    pub user_agent: Option<String>,
    pub elapsed: Duration,
    started: Instant,
}

impl AccessLogEntry {
    /// Capture the request side before the handler consumes it
    pub fn start<B>(req: &Request<B>, remote_addr: SocketAddr) -> Self {
        let header = |name: HeaderName| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string)
        };

        Self {
            remote_addr,
            time: Local::now(),
            method: req.method().to_string(),
            uri: req
                .uri()
                .path_and_query()
                .map_or_else(|| req.uri().path().to_string(), ToString::to_string),
            protocol: format!("{:?}", req.version()),
            status: 0,
            body_bytes: 0,
            referer: header(REFERER),
            user_agent: header(USER_AGENT),
            elapsed: Duration::ZERO,
            started: Instant::now(),
        }
    }

    /// Fill in the response side
    pub fn finish<B: Body>(&mut self, resp: &Response<B>) {
        self.status = resp.status().as_u16();
        self.body_bytes = resp.body().size_hint().exact().unwrap_or(0);
        self.elapsed = self.started.elapsed();
    }

    pub fn format(&self, format: &AccessLogFormat) -> String {
        match format {
            AccessLogFormat::Combined => format!(
                "{} \"{}\" \"{}\"",
                self.common_line(),
                self.referer.as_deref().unwrap_or("-"),
                self.user_agent.as_deref().unwrap_or("-"),
            ),
            AccessLogFormat::Common => self.common_line(),
            AccessLogFormat::Json => self.json_line(),
            AccessLogFormat::Custom(pattern) => self.custom_line(pattern),
        }
    }

    fn request_line(&self) -> String {
        format!("{} {} {}", self.method, self.uri, self.protocol)
    }

    /// `$remote_addr - - [$time_local] "$request" $status $body_bytes_sent`
    fn common_line(&self) -> String {
        format!(
            "{} - - [{}] \"{}\" {} {}",
            self.remote_addr.ip(),
            self.time.format(TIME_LOCAL),
            self.request_line(),
            self.status,
            self.body_bytes,
        )
    }

    fn json_line(&self) -> String {
        serde_json::json!({
            "remote_addr": self.remote_addr.ip().to_string(),
            "time": self.time.to_rfc3339(),
            "method": self.method,
            "uri": self.uri,
            "protocol": self.protocol,
            "status": self.status,
            "body_bytes": self.body_bytes,
            "referer": self.referer,
            "user_agent": self.user_agent,
            "request_time_us": u64::try_from(self.elapsed.as_micros()).unwrap_or(u64::MAX),
        })
        .to_string()
    }

    /// Supported variables: `$remote_addr`, `$time_local`, `$time_iso8601`,
    /// `$request`, `$request_method`, `$request_uri`, `$request_time`,
    /// `$status`, `$body_bytes_sent`, `$http_referer`, `$http_user_agent`.
    fn custom_line(&self, pattern: &str) -> String {
        // Longest names first so `$request` does not eat `$request_time`
        let variables = [
            ("$http_user_agent", self.user_agent.clone().unwrap_or_else(|| "-".into())),
            ("$body_bytes_sent", self.body_bytes.to_string()),
            ("$request_method", self.method.clone()),
            ("$http_referer", self.referer.clone().unwrap_or_else(|| "-".into())),
            ("$time_iso8601", self.time.to_rfc3339()),
            ("$request_time", format!("{:.3}", self.elapsed.as_secs_f64())),
            ("$remote_addr", self.remote_addr.ip().to_string()),
            ("$request_uri", self.uri.clone()),
            ("$time_local", self.time.format(TIME_LOCAL).to_string()),
            ("$request", self.request_line()),
            ("$status", self.status.to_string()),
        ];

        // One pass over the pattern; substituted values are never rescanned
        let mut line = String::with_capacity(pattern.len());
        let mut rest = pattern;
        while let Some(pos) = rest.find('$') {
            line.push_str(&rest[..pos]);
            rest = &rest[pos..];
            match variables.iter().find(|(name, _)| rest.starts_with(name)) {
                Some((name, value)) => {
                    line.push_str(value);
                    rest = &rest[name.len()..];
                }
                None => {
                    line.push('$');
                    rest = &rest[1..];
                }
            }
        }
        line.push_str(rest);
        line
    }
}
