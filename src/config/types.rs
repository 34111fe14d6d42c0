// Configuration types module
// Sections of the layered configuration, one struct per table

use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub http: HttpConfig,
    pub library: LibraryConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Tokio worker threads, CPU count when unset
    #[serde(default)]
    pub workers: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Minimum level: debug, info, warn or error
    pub level: String,
    pub access_log: bool,
    /// `combined`, `common`, `json`, or a `$variable` pattern
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive: bool,
    /// Seconds allowed for a client to send request headers; bodies are never timed out
    pub header_read_timeout: u64,
    #[serde(default)]
    pub max_connections: Option<u64>,
    /// Seconds to wait for in-flight connections on shutdown
    pub shutdown_grace_period: u64,
}

/// HTTP configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub server_name: String,
    pub enable_cors: bool,
    /// Limit for JSON request bodies
    pub max_body_size: u64,
}

/// Video library configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LibraryConfig {
    /// Directory holding uploaded video files
    pub media_dir: String,
    /// Limit for uploaded video bodies
    pub max_upload_size: u64,
    /// Read size per streamed chunk
    pub stream_chunk_size: usize,
}
