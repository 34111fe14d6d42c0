//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: route matching, method
//! validation, dispatch, then the cross-cutting response headers and the
//! access log line.

use hyper::body::{Body, Bytes};
use hyper::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS, RANGE, SERVER,
};
use hyper::{Method, Request, Response, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use super::{stream, videos, BoxError};
use crate::config::AppState;
use crate::http::{self, ResponseBody};
use crate::logger::{self, AccessLogEntry};

/// Headers a cross-origin player needs to read to seek
const CORS_EXPOSE_HEADERS: &str = "Content-Range, Content-Length, Accept-Ranges";

/// Routable resources, each path accepted with or without an `/api` prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route<'a> {
    Health,
    Videos,
    Video(&'a str),
    Stream(&'a str),
    Download(&'a str),
    NotFound,
}

impl Route<'_> {
    /// Methods answered on this route, as sent in `Allow`
    const fn allow(self) -> &'static str {
        match self {
            Self::Health | Self::Stream(_) | Self::Download(_) => "GET, HEAD, OPTIONS",
            Self::Videos => "GET, POST, OPTIONS",
            Self::Video(_) => "GET, PATCH, DELETE, OPTIONS",
            Self::NotFound => "",
        }
    }
}

fn match_route(path: &str) -> Route<'_> {
    let path = match path.strip_prefix("/api") {
        Some(rest) if rest.starts_with('/') => rest,
        _ => path,
    };

    if path == "/healthz" {
        return Route::Health;
    }

    let Some(rest) = path.strip_prefix("/videos") else {
        return Route::NotFound;
    };
    if rest.is_empty() || rest == "/" {
        return Route::Videos;
    }
    let Some(rest) = rest.strip_prefix('/') else {
        return Route::NotFound;
    };

    let segments: Vec<&str> = rest.trim_end_matches('/').split('/').collect();
    match segments.as_slice() {
        [id] if !id.is_empty() => Route::Video(id),
        [id, "stream"] if !id.is_empty() => Route::Stream(id),
        [id, "download"] if !id.is_empty() => Route::Download(id),
        _ => Route::NotFound,
    }
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<ResponseBody>, Infallible>
where
    B: Body<Data = Bytes> + Send + Unpin,
    B::Error: Into<BoxError> + Send,
{
    let started = Instant::now();
    let access_entry = state.config.logging.access_log.then(|| {
        AccessLogEntry::from_request(
            peer_addr,
            req.method(),
            req.uri(),
            req.version(),
            req.headers(),
        )
    });

    let mut response = route_request(req, &state).await;
    apply_common_headers(&mut response, &state);

    if let Some(mut entry) = access_entry {
        entry.finish(
            response.status().as_u16(),
            response.headers(),
            started.elapsed(),
        );
        logger::log_access(&entry, &state.access_log_format);
    }

    Ok(response)
}

/// Match the path, validate the method, then dispatch
async fn route_request<B>(req: Request<B>, state: &AppState) -> Response<ResponseBody>
where
    B: Body<Data = Bytes> + Send + Unpin,
    B::Error: Into<BoxError> + Send,
{
    let path = req.uri().path().to_string();
    let route = match_route(&path);
    let method = req.method().clone();

    if route == Route::NotFound {
        return http::build_error_response(StatusCode::NOT_FOUND, "Not found");
    }
    if method == Method::OPTIONS {
        return http::build_options_response(route.allow(), state.config.http.enable_cors);
    }

    let is_head = method == Method::HEAD;
    match (route, method) {
        (Route::Health, Method::GET | Method::HEAD) => {
            let resp = http::build_text_response(StatusCode::OK, "ok");
            if is_head {
                resp.map(|_| http::body::empty())
            } else {
                resp
            }
        }
        (Route::Videos, Method::GET) => videos::list_videos(state, req.uri().query()),
        (Route::Videos, Method::POST) => videos::upload_video(req, state).await,
        (Route::Video(id), Method::GET) => videos::get_video(state, id),
        (Route::Video(id), Method::PATCH) => videos::update_video(req.into_body(), state, id).await,
        (Route::Video(id), Method::DELETE) => videos::delete_video(state, id).await,
        (Route::Stream(id), Method::GET | Method::HEAD) => {
            // Non-ASCII Range values parse as malformed
            let range_header = req.headers().get(RANGE).map(|v| v.to_str().unwrap_or(""));
            stream::stream_video(state, id, range_header, is_head).await
        }
        (Route::Download(id), Method::GET | Method::HEAD) => {
            stream::download_video(state, id, is_head).await
        }
        (route, method) => {
            logger::log_warning(&format!("Method not allowed: {method} {path}"));
            http::build_405_response(route.allow())
        }
    }
}

/// Headers added to every response: server name and, when enabled, CORS
fn apply_common_headers(response: &mut Response<ResponseBody>, state: &AppState) {
    let headers = response.headers_mut();
    if let Ok(name) = HeaderValue::from_str(&state.config.http.server_name) {
        headers.insert(SERVER, name);
    }
    if state.config.http.enable_cors {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        headers.insert(
            ACCESS_CONTROL_EXPOSE_HEADERS,
            HeaderValue::from_static(CORS_EXPOSE_HEADERS),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::library::{MemoryStore, NewVideo, VideoStore};
    use http_body_util::{BodyExt, Full};
    use hyper::header::{ALLOW, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE};

    const PEER: &str = "127.0.0.1:40000";

    struct Fixture {
        _dir: tempfile::TempDir,
        state: Arc<AppState>,
        id: String,
    }

    fn fixture(extra: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let data: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(dir.path().join("clip.mp4"), data).unwrap();

        let config = Config::from_toml(&format!(
            "[logging]\naccess_log = false\n[library]\nmedia_dir = {:?}\n{extra}",
            dir.path().display().to_string()
        ))
        .unwrap();
        let store = Arc::new(MemoryStore::new());
        let video = store.insert(NewVideo {
            title: "Clip".to_string(),
            filename: "clip.mp4".to_string(),
            original_filename: "clip.mp4".to_string(),
            file_size: 1000,
            ..NewVideo::default()
        });

        Fixture {
            state: Arc::new(AppState::new(config, store)),
            id: video.id,
            _dir: dir,
        }
    }

    async fn send(f: &Fixture, req: Request<Full<Bytes>>) -> Response<ResponseBody> {
        handle_request(req, Arc::clone(&f.state), PEER.parse().unwrap())
            .await
            .unwrap()
    }

    fn get(uri: &str) -> Request<Full<Bytes>> {
        Request::get(uri).body(Full::default()).unwrap()
    }

    async fn text(resp: Response<ResponseBody>) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_match_route() {
        assert_eq!(match_route("/videos"), Route::Videos);
        assert_eq!(match_route("/api/videos/"), Route::Videos);
        assert_eq!(match_route("/videos/abc"), Route::Video("abc"));
        assert_eq!(match_route("/api/videos/abc/stream"), Route::Stream("abc"));
        assert_eq!(match_route("/videos/abc/download/"), Route::Download("abc"));
        assert_eq!(match_route("/healthz"), Route::Health);
        assert_eq!(match_route("/videosx"), Route::NotFound);
        assert_eq!(match_route("/apivideos"), Route::NotFound);
        assert_eq!(match_route("/videos//stream"), Route::NotFound);
        assert_eq!(match_route("/videos/abc/other"), Route::NotFound);
        assert_eq!(match_route("/"), Route::NotFound);
    }

    #[tokio::test]
    async fn test_stream_with_range() {
        let f = fixture("");
        let req = Request::get(format!("/api/videos/{}/stream", f.id))
            .header(RANGE, "bytes=200-299")
            .body(Full::default())
            .unwrap();
        let resp = send(&f, req).await;
        assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(resp.headers()[CONTENT_RANGE], "bytes 200-299/1000");
        assert_eq!(resp.headers()[CONTENT_LENGTH], "100");
        assert_eq!(resp.headers()[SERVER], "videovault");
        assert_eq!(text(resp).await.len(), 100);
    }

    #[tokio::test]
    async fn test_stream_unknown_id() {
        let f = fixture("");
        let resp = send(&f, get("/videos/missing/stream")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(text(resp).await, r#"{"error":"Video not found"}"#);
    }

    #[tokio::test]
    async fn test_stream_416_through_router() {
        let f = fixture("");
        let req = Request::get(format!("/videos/{}/stream", f.id))
            .header(RANGE, "bytes=1000-")
            .body(Full::default())
            .unwrap();
        let resp = send(&f, req).await;
        assert_eq!(resp.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(resp.headers()[CONTENT_RANGE], "bytes */1000");
    }

    #[tokio::test]
    async fn test_head_stream() {
        let f = fixture("");
        let req = Request::head(format!("/videos/{}/stream", f.id))
            .body(Full::default())
            .unwrap();
        let resp = send(&f, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[CONTENT_LENGTH], "1000");
        assert!(text(resp).await.is_empty());
    }

    #[tokio::test]
    async fn test_method_not_allowed() {
        let f = fixture("");
        let req = Request::delete(format!("/videos/{}/stream", f.id))
            .body(Full::default())
            .unwrap();
        let resp = send(&f, req).await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(resp.headers()[ALLOW], "GET, HEAD, OPTIONS");
    }

    #[tokio::test]
    async fn test_unknown_path() {
        let f = fixture("");
        let resp = send(&f, get("/nothing/here")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(text(resp).await, r#"{"error":"Not found"}"#);
    }

    #[tokio::test]
    async fn test_options_and_cors() {
        let f = fixture("[http]\nenable_cors = true");
        let req = Request::options("/videos").body(Full::default()).unwrap();
        let resp = send(&f, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_eq!(resp.headers()[ALLOW], "GET, POST, OPTIONS");
        assert_eq!(resp.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");

        let resp = send(&f, get(&format!("/videos/{}/stream", f.id))).await;
        assert_eq!(resp.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(resp.headers()[ACCESS_CONTROL_EXPOSE_HEADERS], CORS_EXPOSE_HEADERS);
    }

    #[tokio::test]
    async fn test_cors_disabled_by_default() {
        let f = fixture("");
        let resp = send(&f, get("/videos")).await;
        assert!(!resp.headers().contains_key(ACCESS_CONTROL_ALLOW_ORIGIN));
    }

    #[tokio::test]
    async fn test_health() {
        let f = fixture("");
        let resp = send(&f, get("/healthz")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(text(resp).await, "ok");
    }

    #[tokio::test]
    async fn test_head_health_matches_get() {
        let f = fixture("");
        let req = Request::head("/api/healthz").body(Full::default()).unwrap();
        let resp = send(&f, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[CONTENT_LENGTH], "2");
        assert_eq!(resp.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
        assert_eq!(text(resp).await, "");
    }

    #[tokio::test]
    async fn test_non_ascii_range_is_416() {
        let f = fixture("");
        let req = Request::get(format!("/videos/{}/stream", f.id))
            .header(RANGE, HeaderValue::from_bytes(b"bytes=\xe9-10").unwrap())
            .body(Full::default())
            .unwrap();
        let resp = send(&f, req).await;
        assert_eq!(resp.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(resp.headers()[CONTENT_RANGE], "bytes */1000");
    }

    #[tokio::test]
    async fn test_upload_then_stream_then_delete() {
        let f = fixture("");
        let req = Request::post("/api/videos?title=New%20one&filename=new.webm")
            .header(CONTENT_TYPE, "video/webm")
            .body(Full::new(Bytes::from_static(b"abcdefghij")))
            .unwrap();
        let resp = send(&f, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let created: serde_json::Value = serde_json::from_str(&text(resp).await).unwrap();
        let id = created["id"].as_str().unwrap().to_string();

        let listed: serde_json::Value =
            serde_json::from_str(&text(send(&f, get("/videos?search=new")).await).await).unwrap();
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let req = Request::get(format!("/videos/{id}/stream"))
            .header(RANGE, "bytes=-3")
            .body(Full::default())
            .unwrap();
        let resp = send(&f, req).await;
        assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(text(resp).await, "hij");

        let req = Request::delete(format!("/videos/{id}"))
            .body(Full::default())
            .unwrap();
        assert_eq!(send(&f, req).await.status(), StatusCode::OK);

        let resp = send(&f, get(&format!("/videos/{id}/stream"))).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_access_log_enabled_does_not_alter_response() {
        let f = fixture("");
        let mut config = f.state.config.clone();
        config.logging.access_log = true;
        config.logging.access_log_format = "json".to_string();
        let state = Arc::new(AppState::new(config, Arc::clone(&f.state.store)));

        let resp = handle_request(get("/healthz"), state, PEER.parse().unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
