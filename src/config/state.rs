// Application state module
// Everything a request needs, created once at startup and dropped at shutdown

use std::sync::Arc;

use super::types::Config;
use crate::library::VideoStore;
use crate::logger::AccessLogFormat;
use crate::media::MediaRoot;

/// Application state
pub struct AppState {
    pub config: Config,
    /// Injected metadata store
    pub store: Arc<dyn VideoStore>,
    pub media: MediaRoot,
    /// `logging.access_log_format`, parsed once
    pub access_log_format: AccessLogFormat,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn VideoStore>) -> Self {
        let media = MediaRoot::new(&config.library.media_dir);
        let access_log_format = AccessLogFormat::parse(&config.logging.access_log_format);
        Self {
            config,
            store,
            media,
            access_log_format,
        }
    }
}
