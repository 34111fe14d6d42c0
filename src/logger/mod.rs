//! Logger module
//!
//! Provides logging utilities for the video server including:
//! - Server lifecycle logging
//! - Access logging with multiple formats
//! - Stream lifecycle, error and warning logging
//! - File-based logging support

mod format;
pub mod writer;

pub use format::{AccessLogEntry, AccessLogFormat};

use crate::config::Config;
use std::net::SocketAddr;
use std::path::Path;
use writer::Level;

/// Initialize the logger with configuration
///
/// Should be called once at application startup.
pub fn init(config: &Config) -> std::io::Result<()> {
    writer::init(
        Level::parse(&config.logging.level),
        config.logging.access_log_file.as_deref(),
        config.logging.error_log_file.as_deref(),
    )
}

/// Write to info/access log
fn write_info(level: Level, message: &str) {
    match writer::get() {
        Some(w) => w.write_info(level, message),
        None if level >= Level::Info => println!("{message}"),
        None => {}
    }
}

/// Write to error log
fn write_error(level: Level, message: &str) {
    match writer::get() {
        Some(w) => w.write_error(level, message),
        None => eprintln!("{message}"),
    }
}

/// Write to access log specifically
fn write_access(message: &str) {
    match writer::get() {
        Some(w) => w.write_access(message),
        None => println!("{message}"),
    }
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    write_info(Level::Info, "======================================");
    write_info(Level::Info, "Video library server started");
    write_info(Level::Info, &format!("Listening on: http://{addr}"));
    write_info(
        Level::Info,
        &format!("Media directory: {}", config.library.media_dir),
    );
    write_info(Level::Info, &format!("Log level: {}", config.logging.level));
    if let Some(workers) = config.server.workers {
        write_info(Level::Info, &format!("Worker threads: {workers}"));
    }
    if let Some(max) = config.performance.max_connections {
        write_info(Level::Info, &format!("Max connections: {max}"));
    }
    if let Some(ref path) = config.logging.access_log_file {
        write_info(Level::Info, &format!("Access log: {path}"));
    }
    if let Some(ref path) = config.logging.error_log_file {
        write_info(Level::Info, &format!("Error log: {path}"));
    }
    write_info(Level::Info, "======================================\n");
}

pub fn log_shutdown_signal(signal: &str) {
    write_info(
        Level::Info,
        &format!("[Signal] {signal} received, shutting down gracefully"),
    );
}

pub fn log_shutdown_started(active: usize) {
    write_info(
        Level::Info,
        &format!("[Shutdown] Listener closed, waiting for {active} active connection(s)"),
    );
}

pub fn log_shutdown_complete(remaining: usize) {
    if remaining == 0 {
        write_info(Level::Info, "[Shutdown] All connections finished");
    } else {
        log_warning(&format!(
            "[Shutdown] Grace period elapsed with {remaining} connection(s) still open"
        ));
    }
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    write_info(
        Level::Debug,
        &format!("[Connection] Accepted from: {peer_addr}"),
    );
}

pub fn log_connection_error(err: &hyper::Error) {
    // A client closing mid-body is routine while scrubbing through a video
    if err.is_incomplete_message() || err.is_canceled() {
        write_info(Level::Debug, &format!("[Connection] Closed early: {err}"));
    } else {
        write_error(
            Level::Error,
            &format!("[ERROR] Failed to serve connection: {err:?}"),
        );
    }
}

pub fn log_error(message: &str) {
    write_error(Level::Error, &format!("[ERROR] {message}"));
}

pub fn log_warning(message: &str) {
    write_error(Level::Warn, &format!("[WARN] {message}"));
}

pub fn log_debug(message: &str) {
    write_info(Level::Debug, &format!("[DEBUG] {message}"));
}

/// Metadata exists but the file is gone: the store and the disk disagree
pub fn log_file_missing(video_id: &str, path: &str) {
    log_warning(&format!(
        "Video {video_id} has metadata but no file on disk ({path})"
    ));
}

pub fn log_stream_started(video_id: &str, path: &Path, status: u16, bytes: u64) {
    log_debug(&format!(
        "[Stream] {video_id} -> {status}, {bytes} bytes from {}",
        path.display()
    ));
}

pub fn log_stream_completed(label: &str, sent: u64) {
    log_debug(&format!("[Stream] {label} completed, {sent} bytes"));
}

/// Body dropped before its end, normally because the client disconnected
pub fn log_stream_aborted(label: &str, sent: u64, expected: u64) {
    write_info(
        Level::Info,
        &format!("[Stream] {label} aborted after {sent}/{expected} bytes"),
    );
}

pub fn log_stream_error(label: &str, sent: u64, expected: u64, err: &std::io::Error) {
    log_error(&format!(
        "[Stream] {label} failed after {sent}/{expected} bytes: {err}"
    ));
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &AccessLogFormat) {
    write_access(&entry.render(format));
}
