//! MIME type detection module
//!
//! Returns the Content-Type for a media file based on its extension.
//! Streaming always answers `video/mp4`; downloads use the real type.

use std::path::Path;

/// Get MIME Content-Type based on file extension (case-insensitive)
pub fn get_content_type(extension: Option<&str>) -> &'static str {
    let extension = extension.map(str::to_ascii_lowercase);
    match extension.as_deref() {
        // Video
        Some("mp4" | "m4v") => "video/mp4",
        Some("webm") => "video/webm",
        Some("ogg" | "ogv") => "video/ogg",
        Some("mov") => "video/quicktime",
        Some("avi") => "video/x-msvideo",
        Some("mkv") => "video/x-matroska",
        Some("ts" | "m2ts") => "video/mp2t",
        Some("wmv") => "video/x-ms-wmv",
        Some("flv") => "video/x-flv",

        // Audio tracks sometimes land in the library too
        Some("mp3") => "audio/mpeg",
        Some("m4a") => "audio/mp4",

        // Default
        _ => "application/octet-stream",
    }
}

/// Content-Type of a file name
pub fn content_type_for(filename: &str) -> &'static str {
    get_content_type(Path::new(filename).extension().and_then(|e| e.to_str()))
}
