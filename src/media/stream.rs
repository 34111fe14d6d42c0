//! Byte stream over an open media file
//!
//! Reads `length` bytes from the current file position in fixed-size chunks.
//! hyper drops the body when the client goes away, which drops this stream
//! and closes the file: no further reads happen after a disconnect.

use futures::Stream;
use hyper::body::Bytes;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, Take};
use tokio_util::io::ReaderStream;

use crate::logger;

/// Chunked file reader that accounts for every byte it hands out
pub struct FileStream {
    inner: ReaderStream<Take<File>>,
    label: String,
    expected: u64,
    sent: u64,
    finished: bool,
}

impl FileStream {
    pub(super) fn new(file: File, length: u64, chunk_size: usize, label: &str) -> Self {
        Self {
            inner: ReaderStream::with_capacity(file.take(length), chunk_size.max(1)),
            label: label.to_string(),
            expected: length,
            sent: 0,
            finished: false,
        }
    }

    /// Bytes handed out so far
    #[cfg(test)]
    pub const fn sent(&self) -> u64 {
        self.sent
    }
}

impl Stream for FileStream {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.sent += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.finished = true;
                logger::log_stream_error(&this.label, this.sent, this.expected, &e);
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.finished = true;
                if this.sent < this.expected {
                    // File shrank after it was opened; Content-Length can no longer be honoured
                    let e = io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "media file ended before the announced length",
                    );
                    logger::log_stream_error(&this.label, this.sent, this.expected, &e);
                    return Poll::Ready(Some(Err(e)));
                }
                logger::log_stream_completed(&this.label, this.sent);
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl Drop for FileStream {
    fn drop(&mut self) {
        if !self.finished {
            logger::log_stream_aborted(&self.label, self.sent, self.expected);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::RangeRequest;
    use crate::media::MediaRoot;
    use futures::StreamExt;

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    async fn collect(mut stream: FileStream) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(out)
    }

    #[tokio::test]
    async fn test_streams_requested_slice() {
        let dir = tempfile::tempdir().unwrap();
        let data = sample(1000);
        std::fs::write(dir.path().join("v.mp4"), &data).unwrap();
        let root = MediaRoot::new(dir.path());

        let file = root.open("v.mp4").await.unwrap();
        let range = RangeRequest {
            start: 200,
            end: 299,
        };
        let stream = file.into_stream(Some(range), 16, "v").await.unwrap();
        assert_eq!(collect(stream).await.unwrap(), &data[200..300]);
    }

    #[tokio::test]
    async fn test_streams_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let data = sample(4096 + 7);
        std::fs::write(dir.path().join("v.mp4"), &data).unwrap();
        let root = MediaRoot::new(dir.path());

        let file = root.open("v.mp4").await.unwrap();
        let stream = file.into_stream(None, 1024, "v").await.unwrap();
        assert_eq!(collect(stream).await.unwrap(), data);
    }

    #[tokio::test]
    async fn test_drop_mid_stream_stops_reading() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("v.mp4"), sample(1000)).unwrap();
        let root = MediaRoot::new(dir.path());

        let file = root.open("v.mp4").await.unwrap();
        let mut stream = file.into_stream(None, 100, "v").await.unwrap();
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.len(), 100);
        assert_eq!(stream.sent(), 100);
        #[cfg(target_os = "linux")]
        assert!(crate::media::open_handles(&dir.path().join("v.mp4")) >= 1);

        // Client went away: the body is dropped with the file still open
        drop(stream);
        #[cfg(target_os = "linux")]
        assert!(crate::media::wait_for_close(&dir.path().join("v.mp4")).await);
    }

    #[tokio::test]
    async fn test_truncated_file_ends_with_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v.mp4");
        std::fs::write(&path, sample(1000)).unwrap();
        let root = MediaRoot::new(dir.path());

        let file = root.open("v.mp4").await.unwrap();
        std::fs::OpenOptions::new()
            .write(true)
            .open(&path)
            .unwrap()
            .set_len(10)
            .unwrap();

        let stream = file.into_stream(None, 64, "v").await.unwrap();
        let err = collect(stream).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn test_repeated_reads_are_identical() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("v.mp4"), sample(500)).unwrap();
        let root = MediaRoot::new(dir.path());
        let range = RangeRequest { start: 10, end: 400 };

        let first = root.open("v.mp4").await.unwrap();
        let first = collect(first.into_stream(Some(range), 32, "v").await.unwrap())
            .await
            .unwrap();
        let second = root.open("v.mp4").await.unwrap();
        let second = collect(second.into_stream(Some(range), 32, "v").await.unwrap())
            .await
            .unwrap();
        assert_eq!(first, second);
    }
}
