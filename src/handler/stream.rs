//! Video streaming and download
//!
//! Per request: metadata lookup, a single open of the file (which doubles as
//! the existence check), range decision, then either a 416 or a lazily read
//! body. The file handle lives inside the body and is closed with it.

use hyper::Response;

use crate::config::AppState;
use crate::error::ApiError;
use crate::http::{self, body, mime, response, RangeParseResult, ResponseBody};
use crate::logger;

/// Serve `GET|HEAD /videos/{id}/stream`
pub async fn stream_video(
    state: &AppState,
    id: &str,
    range_header: Option<&str>,
    is_head: bool,
) -> Response<ResponseBody> {
    match try_stream(state, id, range_header, is_head).await {
        Ok(resp) => resp,
        Err(e) => {
            report(id, &e);
            e.into_response()
        }
    }
}

async fn try_stream(
    state: &AppState,
    id: &str,
    range_header: Option<&str>,
    is_head: bool,
) -> Result<Response<ResponseBody>, ApiError> {
    let video = state.store.get(id).ok_or(ApiError::RecordNotFound)?;
    let file = state
        .media
        .open(&video.filename)
        .await
        .map_err(|e| ApiError::from_media("Failed to stream video", e))?;

    let total_size = file.size();
    let range = match http::parse_range_header(range_header, total_size) {
        RangeParseResult::Valid(range) => Some(range),
        RangeParseResult::None => None,
        RangeParseResult::NotSatisfiable => {
            return Err(ApiError::RangeUnsatisfiable { length: total_size });
        }
    };

    let (status, length) = match range {
        Some(r) => (206, r.content_length()),
        None => (200, total_size),
    };
    logger::log_stream_started(id, file.path(), status, length);

    let body = if is_head {
        body::empty()
    } else {
        let stream = file
            .into_stream(range, state.config.library.stream_chunk_size, id)
            .await
            .map_err(|e| ApiError::storage("Failed to stream video", e))?;
        body::stream(stream)
    };

    Ok(match range {
        Some(r) => response::build_partial_response(body, r, total_size),
        None => response::build_full_response(body, total_size),
    })
}

/// Serve `GET|HEAD /videos/{id}/download` as an attachment
pub async fn download_video(state: &AppState, id: &str, is_head: bool) -> Response<ResponseBody> {
    match try_download(state, id, is_head).await {
        Ok(resp) => resp,
        Err(e) => {
            report(id, &e);
            e.into_response()
        }
    }
}

async fn try_download(
    state: &AppState,
    id: &str,
    is_head: bool,
) -> Result<Response<ResponseBody>, ApiError> {
    let video = state.store.get(id).ok_or(ApiError::RecordNotFound)?;
    let file = state
        .media
        .open(&video.filename)
        .await
        .map_err(|e| ApiError::from_media("Failed to download video", e))?;

    let total_size = file.size();
    let content_type = match mime::content_type_for(&video.original_filename) {
        "application/octet-stream" => mime::content_type_for(&video.filename),
        known => known,
    };

    let body = if is_head {
        body::empty()
    } else {
        let stream = file
            .into_stream(None, state.config.library.stream_chunk_size, id)
            .await
            .map_err(|e| ApiError::storage("Failed to download video", e))?;
        body::stream(stream)
    };

    Ok(response::build_download_response(
        body,
        content_type,
        total_size,
        &video.original_filename,
    ))
}

/// Log a failed media request at the level its cause deserves
pub(super) fn report(id: &str, err: &ApiError) {
    match err {
        ApiError::FileMissing { path } => logger::log_file_missing(id, path),
        ApiError::Storage { context, source } => {
            logger::log_error(&format!("{context} ({id}): {source}"));
        }
        other => logger::log_debug(&format!("{id}: {other}")),
    }
}
