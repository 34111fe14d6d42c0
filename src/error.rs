//! Request-level error taxonomy
//!
//! Every variant maps to one HTTP status and a minimal body. Errors raised
//! after the headers of a stream are sent are handled by `media::FileStream`.

use hyper::{Response, StatusCode};
use std::io;

use crate::http::{self, ResponseBody};
use crate::media::MediaError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Video not found")]
    RecordNotFound,
    /// Metadata exists but its file is gone from disk
    #[error("Video file not found")]
    FileMissing { path: String },
    #[error("Range not satisfiable")]
    RangeUnsatisfiable { length: u64 },
    #[error("{0}")]
    BadRequest(String),
    #[error("Payload too large")]
    PayloadTooLarge,
    #[error("Only video files are allowed")]
    UnsupportedMediaType,
    /// Disk failure; `context` is the message shown to the client
    #[error("{context}")]
    Storage {
        context: &'static str,
        #[source]
        source: io::Error,
    },
}

impl ApiError {
    pub fn storage(context: &'static str, source: io::Error) -> Self {
        Self::Storage { context, source }
    }

    /// Map a media lookup failure; a missing file is drift, anything else is storage
    pub fn from_media(context: &'static str, err: MediaError) -> Self {
        match err {
            MediaError::Missing(path) => Self::FileMissing {
                path: path.display().to_string(),
            },
            MediaError::InvalidName(name) => Self::FileMissing { path: name },
            MediaError::Io(source) => Self::storage(context, source),
        }
    }

    pub const fn status(&self) -> StatusCode {
        match self {
            Self::RecordNotFound | Self::FileMissing { .. } => StatusCode::NOT_FOUND,
            Self::RangeUnsatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn into_response(self) -> Response<ResponseBody> {
        match self {
            Self::RangeUnsatisfiable { length } => http::build_416_response(length),
            other => http::build_error_response(other.status(), &other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::RecordNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::RangeUnsatisfiable { length: 5 }.status(),
            StatusCode::RANGE_NOT_SATISFIABLE
        );
        assert_eq!(
            ApiError::storage("Failed to stream video", io::Error::other("disk")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_missing_media_is_file_missing() {
        let err = ApiError::from_media(
            "Failed to stream video",
            MediaError::Missing(PathBuf::from("uploads/x.mp4")),
        );
        assert!(matches!(err, ApiError::FileMissing { .. }));
        assert_eq!(err.to_string(), "Video file not found");
    }

    #[test]
    fn test_storage_message_hides_io_detail() {
        let err = ApiError::storage("Failed to upload video", io::Error::other("EIO at sector 9"));
        assert_eq!(err.to_string(), "Failed to upload video");
    }
}
