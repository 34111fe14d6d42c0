//! Video metadata endpoints and uploads

use futures::{future, TryStreamExt};
use http_body_util::{BodyExt, BodyStream, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{HeaderMap, Request, Response, StatusCode};
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::BoxError;
use crate::config::AppState;
use crate::error::ApiError;
use crate::http::{self, query, ResponseBody};
use crate::library::{non_empty, NewVideo, VideoFilter, VideoPatch};
use crate::logger;

/// Multipart part carrying the video file
const FILE_FIELD: &str = "file";

/// Original filename assumed when the client does not send one
const DEFAULT_UPLOAD_NAME: &str = "video.mp4";

fn respond(result: Result<Response<ResponseBody>, ApiError>) -> Response<ResponseBody> {
    result.unwrap_or_else(|e| {
        if let ApiError::Storage { context, source } = &e {
            logger::log_error(&format!("{context}: {source}"));
        }
        e.into_response()
    })
}

/// `GET /videos?search=&category=`
pub fn list_videos(state: &AppState, raw_query: Option<&str>) -> Response<ResponseBody> {
    let mut params = query::parse_query(raw_query);
    let filter = VideoFilter {
        search: params.remove("search"),
        category: params.remove("category"),
    };
    http::build_json_response(StatusCode::OK, &state.store.list(&filter))
}

/// `GET /videos/{id}`
pub fn get_video(state: &AppState, id: &str) -> Response<ResponseBody> {
    respond(
        state
            .store
            .get(id)
            .map(|video| http::build_json_response(StatusCode::OK, &video))
            .ok_or(ApiError::RecordNotFound),
    )
}

/// `PATCH /videos/{id}` with a JSON body of the fields to change
pub async fn update_video<B>(body: B, state: &AppState, id: &str) -> Response<ResponseBody>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    respond(try_update(body, state, id).await)
}

async fn try_update<B>(body: B, state: &AppState, id: &str) -> Result<Response<ResponseBody>, ApiError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    if state.store.get(id).is_none() {
        return Err(ApiError::RecordNotFound);
    }

    let limit = usize::try_from(state.config.http.max_body_size).unwrap_or(usize::MAX);
    let bytes = Limited::new(body, limit)
        .collect()
        .await
        .map_err(|e| {
            if e.downcast_ref::<LengthLimitError>().is_some() {
                ApiError::PayloadTooLarge
            } else {
                ApiError::BadRequest(format!("Failed to read request body: {e}"))
            }
        })?
        .to_bytes();

    let patch: VideoPatch = serde_json::from_slice(&bytes)
        .map_err(|e| ApiError::BadRequest(format!("Invalid video update: {e}")))?;

    let video = state.store.update(id, patch).ok_or(ApiError::RecordNotFound)?;
    Ok(http::build_json_response(StatusCode::OK, &video))
}

/// `DELETE /videos/{id}`: drops the record, then its file
pub async fn delete_video(state: &AppState, id: &str) -> Response<ResponseBody> {
    let Some(video) = state.store.remove(id) else {
        return ApiError::RecordNotFound.into_response();
    };

    match state.media.remove(&video.filename).await {
        Ok(true) => logger::log_debug(&format!("Deleted {} ({})", video.id, video.filename)),
        Ok(false) => logger::log_file_missing(&video.id, &video.filename),
        // The record is already gone; a leftover file is only reported
        Err(e) => logger::log_error(&format!(
            "Failed to remove file for {} ({}): {e}",
            video.id, video.filename
        )),
    }

    http::build_json_response(StatusCode::OK, &json!({ "success": true }))
}

/// `POST /videos`
///
/// Accepts `multipart/form-data` with the video in the `file` part and the
/// metadata as text parts, or a raw `video/*` body with the metadata in the
/// query string.
pub async fn upload_video<B>(req: Request<B>, state: &AppState) -> Response<ResponseBody>
where
    B: Body<Data = Bytes> + Send + Unpin,
    B::Error: Into<BoxError> + Send,
{
    respond(try_upload(req, state).await)
}

/// A video file written to the media directory, plus the fields sent with it
struct Received {
    fields: HashMap<String, String>,
    original_filename: String,
    filename: String,
    file_size: u64,
}

async fn try_upload<B>(req: Request<B>, state: &AppState) -> Result<Response<ResponseBody>, ApiError>
where
    B: Body<Data = Bytes> + Send + Unpin,
    B::Error: Into<BoxError> + Send,
{
    let (parts, body) = req.into_parts();
    let content_type = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .trim();

    let received = if let Ok(boundary) = multer::parse_boundary(content_type) {
        receive_multipart(body, boundary, state).await?
    } else if content_type.to_ascii_lowercase().starts_with("video/") {
        if declared_length(&parts.headers).is_some_and(|len| len > state.config.library.max_upload_size) {
            return Err(ApiError::PayloadTooLarge);
        }
        receive_raw(body, query::parse_query(parts.uri.query()), state).await?
    } else {
        return Err(ApiError::UnsupportedMediaType);
    };

    let Received {
        mut fields,
        original_filename,
        filename,
        file_size,
    } = received;
    let Some(title) = required_title(&fields) else {
        discard_upload(state, &filename).await;
        return Err(ApiError::BadRequest("Title is required".to_string()));
    };

    let video = state.store.insert(NewVideo {
        title,
        description: fields.remove("description").unwrap_or_default(),
        filename,
        original_filename,
        file_size,
        duration: fields.remove("duration").and_then(non_empty),
        category: fields.remove("category").and_then(non_empty),
        thumbnail_url: fields.remove("thumbnailUrl").and_then(non_empty),
    });

    logger::log_debug(&format!(
        "Uploaded {} ({file_size} bytes) as {}",
        video.id, video.filename
    ));
    Ok(http::build_json_response(StatusCode::OK, &video))
}

fn required_title(fields: &HashMap<String, String>) -> Option<String> {
    fields
        .get("title")
        .map(|t| t.trim().to_string())
        .and_then(non_empty)
}

/// Raw body upload; the title is checked before anything touches the disk
async fn receive_raw<B>(
    mut body: B,
    fields: HashMap<String, String>,
    state: &AppState,
) -> Result<Received, ApiError>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: Into<BoxError>,
{
    if required_title(&fields).is_none() {
        return Err(ApiError::BadRequest("Title is required".to_string()));
    }

    let original_filename = fields
        .get("filename")
        .cloned()
        .and_then(non_empty)
        .unwrap_or_else(|| DEFAULT_UPLOAD_NAME.to_string());
    let mut sink = UploadSink::create(state, &original_filename).await?;

    let outcome = async {
        while let Some(frame) = body.frame().await {
            let frame = frame.map_err(|e| {
                let e: BoxError = e.into();
                ApiError::BadRequest(format!("Failed to read upload: {e}"))
            })?;
            if let Ok(data) = frame.into_data() {
                sink.write(&data).await?;
            }
        }
        Ok::<(), ApiError>(())
    }
    .await;

    let (filename, file_size) = sink.finish(outcome).await?;
    Ok(Received {
        fields,
        original_filename,
        filename,
        file_size,
    })
}

/// `multipart/form-data` upload; the stored file is removed if a later part fails
async fn receive_multipart<B>(
    body: B,
    boundary: String,
    state: &AppState,
) -> Result<Received, ApiError>
where
    B: Body<Data = Bytes> + Send,
    B::Error: Into<BoxError> + Send,
{
    // Room for the file plus the text parts and part headers
    let stream_limit = state
        .config
        .library
        .max_upload_size
        .saturating_add(state.config.http.max_body_size);
    let constraints = multer::Constraints::new()
        .size_limit(multer::SizeLimit::new().whole_stream(stream_limit));
    let chunks = BodyStream::new(body).try_filter_map(|frame| future::ready(Ok(frame.into_data().ok())));
    let mut multipart = multer::Multipart::with_constraints(chunks, boundary, constraints);

    let mut fields = HashMap::new();
    let mut stored = None;
    let outcome = read_parts(&mut multipart, &mut fields, &mut stored, state).await;

    match (outcome, stored) {
        (Ok(()), Some((original_filename, filename, file_size))) => Ok(Received {
            fields,
            original_filename,
            filename,
            file_size,
        }),
        (Ok(()), None) => Err(ApiError::BadRequest("No file uploaded".to_string())),
        (Err(e), stored) => {
            if let Some((_, filename, _)) = stored {
                discard_upload(state, &filename).await;
            }
            Err(e)
        }
    }
}

/// Collect text parts into `fields` and write the first `file` part to disk
async fn read_parts(
    multipart: &mut multer::Multipart<'_>,
    fields: &mut HashMap<String, String>,
    stored: &mut Option<(String, String, u64)>,
    state: &AppState,
) -> Result<(), ApiError> {
    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if name != FILE_FIELD {
            let value = field.text().await.map_err(multipart_error)?;
            fields.insert(name, value);
            continue;
        }
        if stored.is_some() {
            continue;
        }

        let is_video = field
            .content_type()
            .is_some_and(|mime| mime.essence_str().starts_with("video/"));
        if !is_video {
            return Err(ApiError::UnsupportedMediaType);
        }

        let original_filename = field
            .file_name()
            .map(str::to_string)
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_UPLOAD_NAME.to_string());
        let mut sink = UploadSink::create(state, &original_filename).await?;

        let outcome = async {
            while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
                sink.write(&chunk).await?;
            }
            Ok::<(), ApiError>(())
        }
        .await;

        let (filename, file_size) = sink.finish(outcome).await?;
        *stored = Some((original_filename, filename, file_size));
    }
    Ok(())
}

fn multipart_error(err: multer::Error) -> ApiError {
    match err {
        multer::Error::StreamSizeExceeded { .. } | multer::Error::FieldSizeExceeded { .. } => {
            ApiError::PayloadTooLarge
        }
        other => ApiError::BadRequest(format!("Invalid multipart body: {other}")),
    }
}

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Random storage name keeping a plain ASCII extension from the client's name
fn storage_name(original_filename: &str) -> String {
    let extension = Path::new(original_filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8)
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default();
    format!("{}{extension}", Uuid::new_v4())
}

/// New media file being filled from an upload, capped at `max_upload_size`
struct UploadSink<'a> {
    state: &'a AppState,
    file: File,
    filename: String,
    written: u64,
}

impl<'a> UploadSink<'a> {
    async fn create(state: &'a AppState, original_filename: &str) -> Result<Self, ApiError> {
        let filename = storage_name(original_filename);
        let (_, file) = state
            .media
            .create(&filename)
            .await
            .map_err(|e| ApiError::from_media("Failed to upload video", e))?;
        Ok(Self {
            state,
            file,
            filename,
            written: 0,
        })
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), ApiError> {
        self.written += data.len() as u64;
        if self.written > self.state.config.library.max_upload_size {
            return Err(ApiError::PayloadTooLarge);
        }
        self.file
            .write_all(data)
            .await
            .map_err(|e| ApiError::storage("Failed to upload video", e))
    }

    /// Storage name and size on success; an empty or failed upload leaves no file behind
    async fn finish(mut self, outcome: Result<(), ApiError>) -> Result<(String, u64), ApiError> {
        let outcome = match outcome {
            Ok(()) if self.written == 0 => Err(ApiError::BadRequest("No file uploaded".to_string())),
            Ok(()) => self
                .file
                .flush()
                .await
                .map_err(|e| ApiError::storage("Failed to upload video", e)),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => Ok((self.filename, self.written)),
            Err(e) => {
                drop(self.file);
                discard_upload(self.state, &self.filename).await;
                Err(e)
            }
        }
    }
}

async fn discard_upload(state: &AppState, filename: &str) {
    if let Err(e) = state.media.remove(filename).await {
        logger::log_warning(&format!("Failed to discard partial upload {filename}: {e}"));
    }
}
