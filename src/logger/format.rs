//! Access log lines
//!
//! One `AccessLogEntry` per request, rendered as `combined`, `common`,
//! `json`, or a custom pattern of `$variables` (nginx names, plus
//! `$http_range` since most traffic here is range requests).

use chrono::{DateTime, Local};
use hyper::header::{HeaderName, CONTENT_LENGTH, RANGE, REFERER, USER_AGENT};
use hyper::{HeaderMap, Method, Uri, Version};
use std::net::SocketAddr;
use std::time::Duration;

const CLF_TIME: &str = "%d/%b/%Y:%H:%M:%S %z";

/// Configured line layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessLogFormat {
    Combined,
    Common,
    Json,
    /// Pattern with `$variable` placeholders
    Custom(String),
}

impl AccessLogFormat {
    pub fn parse(name: &str) -> Self {
        match name {
            "combined" => Self::Combined,
            "common" => Self::Common,
            "json" => Self::Json,
            pattern => Self::Custom(pattern.to_string()),
        }
    }
}

/// What one request/response exchange looked like
#[derive(Debug, Clone)]
pub struct AccessLogEntry {
    pub client_ip: String,
    pub received_at: DateTime<Local>,
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    /// "1.0", "1.1", "2", ...
    pub http_version: String,
    /// Range header as sent by the client
    pub range: Option<String>,
    pub status: u16,
    /// Announced body size (`Content-Length`), not bytes actually delivered
    pub bytes: u64,
    pub referer: Option<String>,
    pub user_agent: Option<String>,
    /// Time until the response head was ready
    pub elapsed: Duration,
}

impl AccessLogEntry {
    /// Capture the request side; `finish` fills in the response
    pub fn from_request(
        peer_addr: SocketAddr,
        method: &Method,
        uri: &Uri,
        version: Version,
        headers: &HeaderMap,
    ) -> Self {
        let header = |name: HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };

        Self {
            client_ip: peer_addr.ip().to_string(),
            received_at: Local::now(),
            method: method.as_str().to_owned(),
            path: uri.path().to_owned(),
            query: uri.query().map(str::to_owned),
            http_version: version_label(version).to_owned(),
            range: header(RANGE),
            status: 0,
            bytes: 0,
            referer: header(REFERER),
            user_agent: header(USER_AGENT),
            elapsed: Duration::ZERO,
        }
    }

    pub fn finish(&mut self, status: u16, response_headers: &HeaderMap, elapsed: Duration) {
        self.status = status;
        self.bytes = response_headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        self.elapsed = elapsed;
    }

    pub fn render(&self, format: &AccessLogFormat) -> String {
        match format {
            AccessLogFormat::Common => self.common_line(),
            AccessLogFormat::Combined => format!(
                "{} \"{}\" \"{}\"",
                self.common_line(),
                dash(self.referer.as_deref()),
                dash(self.user_agent.as_deref()),
            ),
            AccessLogFormat::Json => self.json_line(),
            AccessLogFormat::Custom(pattern) => self.custom_line(pattern),
        }
    }

    fn target(&self) -> String {
        match &self.query {
            Some(q) => format!("{}?{q}", self.path),
            None => self.path.clone(),
        }
    }

    fn request_line(&self) -> String {
        format!("{} {} HTTP/{}", self.method, self.target(), self.http_version)
    }

    fn common_line(&self) -> String {
        format!(
            "{} - - [{}] \"{}\" {} {}",
            self.client_ip,
            self.received_at.format(CLF_TIME),
            self.request_line(),
            self.status,
            self.bytes,
        )
    }

    fn json_line(&self) -> String {
        serde_json::json!({
            "remote_addr": self.client_ip,
            "time": self.received_at.to_rfc3339(),
            "method": self.method,
            "path": self.path,
            "query": self.query,
            "http_version": self.http_version,
            "range": self.range,
            "status": self.status,
            "body_bytes": self.bytes,
            "referer": self.referer,
            "user_agent": self.user_agent,
            "request_time_us": u64::try_from(self.elapsed.as_micros()).unwrap_or(u64::MAX),
        })
        .to_string()
    }

    /// Expand `$name` placeholders; unknown names are kept as written
    fn custom_line(&self, pattern: &str) -> String {
        let mut out = String::with_capacity(pattern.len() + 64);
        let mut rest = pattern;

        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];
            let name_len = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            let name = &after[..name_len];

            match self.variable(name) {
                Some(value) => out.push_str(&value),
                None => {
                    out.push('$');
                    out.push_str(name);
                }
            }
            rest = &after[name_len..];
        }

        out.push_str(rest);
        out
    }

    fn variable(&self, name: &str) -> Option<String> {
        let value = match name {
            "remote_addr" => self.client_ip.clone(),
            "time_local" => self.received_at.format(CLF_TIME).to_string(),
            "time_iso8601" => self.received_at.to_rfc3339(),
            "request" => self.request_line(),
            "request_method" => self.method.clone(),
            "request_uri" => self.target(),
            "status" => self.status.to_string(),
            "body_bytes_sent" => self.bytes.to_string(),
            "request_time" => format!("{:.3}", self.elapsed.as_secs_f64()),
            "http_range" => dash(self.range.as_deref()).to_owned(),
            "http_referer" => dash(self.referer.as_deref()).to_owned(),
            "http_user_agent" => dash(self.user_agent.as_deref()).to_owned(),
            _ => return None,
        };
        Some(value)
    }
}

fn dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

fn version_label(version: Version) -> &'static str {
    if version == Version::HTTP_10 {
        "1.0"
    } else if version == Version::HTTP_09 {
        "0.9"
    } else if version == Version::HTTP_2 {
        "2"
    } else if version == Version::HTTP_3 {
        "3"
    } else {
        "1.1"
    }
}
