//! Request handler module
//!
//! Responsible for request routing dispatch and the video endpoints:
//! metadata CRUD, uploads, and ranged streaming of stored files.

pub mod router;
pub mod stream;
pub mod videos;

// Re-export main entry point
pub use router::handle_request;

/// Error type request bodies are converted into
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
