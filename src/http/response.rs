//! HTTP response building module
//!
//! Provides builders for the status codes the server answers with,
//! decoupled from the handlers that decide which one to send.

use hyper::header::{
    ACCEPT_RANGES, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE, ALLOW, CONTENT_DISPOSITION,
    CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE,
};
use hyper::{Response, StatusCode};
use serde::Serialize;

use super::body::{self, ResponseBody};
use super::range::RangeRequest;
use crate::logger;

/// Content type of every streamed video
pub const VIDEO_CONTENT_TYPE: &str = "video/mp4";

/// Build JSON response
pub fn build_json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<ResponseBody> {
    let json = match serde_json::to_vec(value) {
        Ok(j) => j,
        Err(e) => {
            logger::log_error(&format!("Failed to serialize response: {e}"));
            return build_error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
            );
        }
    };

    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .header(CONTENT_LENGTH, json.len())
        .body(body::full(json))
        .unwrap_or_else(|e| fallback(status, &e))
}

/// Build `{"error": message}` response
pub fn build_error_response(status: StatusCode, message: &str) -> Response<ResponseBody> {
    let json = serde_json::json!({ "error": message }).to_string();
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .header(CONTENT_LENGTH, json.len())
        .body(body::full(json))
        .unwrap_or_else(|e| fallback(status, &e))
}

/// Build 405 Method Not Allowed response
pub fn build_405_response(allow: &str) -> Response<ResponseBody> {
    let mut resp = build_error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed");
    if let Ok(value) = allow.parse() {
        resp.headers_mut().insert(ALLOW, value);
    }
    resp
}

/// Build OPTIONS response (preflight request)
pub fn build_options_response(allow: &str, enable_cors: bool) -> Response<ResponseBody> {
    let mut builder = Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header(ALLOW, allow);

    if enable_cors {
        builder = builder
            .header(ACCESS_CONTROL_ALLOW_ORIGIN, "*")
            .header(ACCESS_CONTROL_ALLOW_METHODS, allow)
            .header(ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type, Range")
            .header(ACCESS_CONTROL_MAX_AGE, "86400");
    }

    builder
        .body(body::empty())
        .unwrap_or_else(|e| fallback(StatusCode::NO_CONTENT, &e))
}

/// Build 416 Range Not Satisfiable response
pub fn build_416_response(file_size: u64) -> Response<ResponseBody> {
    Response::builder()
        .status(StatusCode::RANGE_NOT_SATISFIABLE)
        .header(CONTENT_RANGE, format!("bytes */{file_size}"))
        .header(CONTENT_LENGTH, 0)
        .body(body::empty())
        .unwrap_or_else(|e| fallback(StatusCode::RANGE_NOT_SATISFIABLE, &e))
}

/// Build plain text response
pub fn build_text_response(status: StatusCode, text: &'static str) -> Response<ResponseBody> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(CONTENT_LENGTH, text.len())
        .body(body::full(text))
        .unwrap_or_else(|e| fallback(status, &e))
}

/// Build 200 response carrying the whole video
pub fn build_full_response(body: ResponseBody, total_size: u64) -> Response<ResponseBody> {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, VIDEO_CONTENT_TYPE)
        .header(CONTENT_LENGTH, total_size)
        .header(ACCEPT_RANGES, "bytes")
        .body(body)
        .unwrap_or_else(|e| fallback(StatusCode::OK, &e))
}

/// Build 206 Partial Content response
pub fn build_partial_response(
    body: ResponseBody,
    range: RangeRequest,
    total_size: u64,
) -> Response<ResponseBody> {
    Response::builder()
        .status(StatusCode::PARTIAL_CONTENT)
        .header(CONTENT_TYPE, VIDEO_CONTENT_TYPE)
        .header(CONTENT_LENGTH, range.content_length())
        .header(CONTENT_RANGE, range.content_range(total_size))
        .header(ACCEPT_RANGES, "bytes")
        .body(body)
        .unwrap_or_else(|e| fallback(StatusCode::PARTIAL_CONTENT, &e))
}

/// Build attachment response for file downloads
pub fn build_download_response(
    body: ResponseBody,
    content_type: &str,
    total_size: u64,
    filename: &str,
) -> Response<ResponseBody> {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, content_type)
        .header(CONTENT_LENGTH, total_size)
        .header(
            CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", disposition_filename(filename)),
        )
        .body(body)
        .unwrap_or_else(|e| fallback(StatusCode::OK, &e))
}

/// Keep the quoted filename a valid header value: printable ASCII, no quotes or backslashes
fn disposition_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();
    if cleaned.trim().is_empty() {
        "video".to_string()
    } else {
        cleaned
    }
}

/// Log response build error and fall back to an empty response with the same status
fn fallback(status: StatusCode, error: &hyper::http::Error) -> Response<ResponseBody> {
    logger::log_error(&format!("Failed to build {status} response: {error}"));
    let mut resp = Response::new(body::empty());
    *resp.status_mut() = status;
    resp
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_error_response_body() {
        let resp = build_error_response(StatusCode::NOT_FOUND, "Video not found");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(resp.headers()[CONTENT_TYPE], "application/json");
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], br#"{"error":"Video not found"}"#);
    }

    #[tokio::test]
    async fn test_416_response() {
        let resp = build_416_response(1000);
        assert_eq!(resp.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(resp.headers()[CONTENT_RANGE], "bytes */1000");
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_partial_response_headers() {
        let range = RangeRequest {
            start: 200,
            end: 299,
        };
        let resp = build_partial_response(body::empty(), range, 1000);
        assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(resp.headers()[CONTENT_RANGE], "bytes 200-299/1000");
        assert_eq!(resp.headers()[CONTENT_LENGTH], "100");
        assert_eq!(resp.headers()[ACCEPT_RANGES], "bytes");
        assert_eq!(resp.headers()[CONTENT_TYPE], VIDEO_CONTENT_TYPE);
    }

    #[test]
    fn test_options_response_with_cors() {
        let resp = build_options_response("GET, HEAD, OPTIONS", true);
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_eq!(resp.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(resp.headers()[ALLOW], "GET, HEAD, OPTIONS");

        let resp = build_options_response("GET", false);
        assert!(!resp.headers().contains_key(ACCESS_CONTROL_ALLOW_ORIGIN));
    }

    #[test]
    fn test_disposition_filename() {
        assert_eq!(disposition_filename("my clip.mp4"), "my clip.mp4");
        assert_eq!(disposition_filename("a\"b\\c.mp4"), "a_b_c.mp4");
        assert_eq!(disposition_filename("vidéo.mp4"), "vid_o.mp4");
        assert_eq!(disposition_filename(""), "video");
    }
}
