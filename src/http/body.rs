//! Response body type shared by every handler
//!
//! Small responses are buffered; media responses are streamed from disk.
//! Both are boxed into one type so a handler can return either.

use futures::TryStreamExt;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full, StreamBody};
use hyper::body::{Bytes, Frame};
use std::io;

use crate::media::FileStream;

/// Body of every response produced by the server
pub type ResponseBody = UnsyncBoxBody<Bytes, io::Error>;

/// Buffered body
pub fn full(data: impl Into<Bytes>) -> ResponseBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Body without content (HEAD, 204, 416)
pub fn empty() -> ResponseBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Body streamed from an open media file
pub fn stream(file_stream: FileStream) -> ResponseBody {
    StreamBody::new(file_stream.map_ok(Frame::data)).boxed_unsync()
}
