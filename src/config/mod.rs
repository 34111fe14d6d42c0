// Configuration module entry point
// Loads layered configuration and holds the per-process application state

mod state;
mod types;

use std::net::SocketAddr;

// Re-export public types
pub use state::AppState;
pub use types::Config;

type Builder = config::ConfigBuilder<config::builder::DefaultState>;

impl Config {
    /// Load configuration from the file named by the first CLI argument,
    /// or `config.toml` in the working directory when none is given
    pub fn load() -> Result<Self, config::ConfigError> {
        let path = std::env::args().nth(1).unwrap_or_else(|| "config".to_string());
        Self::load_from(&path)
    }

    /// Load configuration from specified file path (extension optional)
    ///
    /// Sources in increasing priority: built-in defaults, the file, then
    /// `VIDEOVAULT_<SECTION>__<KEY>` environment variables.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        defaults()?
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("VIDEOVAULT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Parse a TOML document layered over the defaults (no environment)
    #[cfg(test)]
    pub fn from_toml(toml: &str) -> Result<Self, config::ConfigError> {
        defaults()?
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

fn defaults() -> Result<Builder, config::ConfigError> {
    config::Config::builder()
        .set_default("server.host", "127.0.0.1")?
        .set_default("server.port", 8080)?
        .set_default("logging.level", "info")?
        .set_default("logging.access_log", true)?
        .set_default("logging.access_log_format", "combined")?
        .set_default("performance.keep_alive", true)?
        .set_default("performance.header_read_timeout", 30)?
        .set_default("performance.shutdown_grace_period", 10)?
        .set_default("http.server_name", "videovault")?
        .set_default("http.enable_cors", false)?
        .set_default("http.max_body_size", 1_048_576)? // 1MB
        .set_default("library.media_dir", "uploads")?
        .set_default("library.max_upload_size", 524_288_000)? // 500MB
        .set_default("library.stream_chunk_size", 65_536)
}
