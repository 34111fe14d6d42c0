//! Media file storage
//!
//! Resolves storage filenames inside the media directory and opens them for
//! streaming. Existence and size come from one `open` call, so a file that
//! disappears between "check" and "read" is simply reported as missing.

mod stream;

pub use stream::FileStream;

use std::io::{self, SeekFrom};
use std::path::{Component, Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncSeekExt;

use crate::http::RangeRequest;

/// Errors raised while locating a media file
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    /// Nothing (or not a regular file) at the resolved path
    #[error("media file not found: {}", .0.display())]
    Missing(PathBuf),
    /// Storage filename would escape the media directory
    #[error("invalid storage filename: {0:?}")]
    InvalidName(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Root directory holding every uploaded video
#[derive(Debug, Clone)]
pub struct MediaRoot {
    dir: PathBuf,
}

impl MediaRoot {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the media directory if needed
    pub async fn ensure_exists(&self) -> io::Result<()> {
        fs::create_dir_all(&self.dir).await
    }

    /// Path of a storage filename; only a single plain path component is accepted
    pub fn resolve(&self, filename: &str) -> Result<PathBuf, MediaError> {
        let mut components = Path::new(filename).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => Ok(self.dir.join(name)),
            _ => Err(MediaError::InvalidName(filename.to_string())),
        }
    }

    /// Open a media file and read its current size
    pub async fn open(&self, filename: &str) -> Result<MediaFile, MediaError> {
        let path = self.resolve(filename)?;
        let file = match File::open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(MediaError::Missing(path));
            }
            Err(e) => return Err(MediaError::Io(e)),
        };

        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Err(MediaError::Missing(path));
        }

        Ok(MediaFile {
            file,
            len: metadata.len(),
            path,
        })
    }

    /// Create a new, empty file for an upload
    pub async fn create(&self, filename: &str) -> Result<(PathBuf, File), MediaError> {
        let path = self.resolve(filename)?;
        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        Ok((path, file))
    }

    /// Delete a media file; a file that is already gone is not an error
    pub async fn remove(&self, filename: &str) -> Result<bool, MediaError> {
        let path = self.resolve(filename)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(MediaError::Io(e)),
        }
    }
}

/// Open media file with the size it had when opened
#[derive(Debug)]
pub struct MediaFile {
    file: File,
    len: u64,
    path: PathBuf,
}

impl MediaFile {
    /// Total length in bytes
    pub const fn size(&self) -> u64 {
        self.len
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Turn the handle into a byte stream over `range` (whole file when `None`)
    ///
    /// The handle is owned by the stream and closed when the stream is dropped.
    pub async fn into_stream(
        mut self,
        range: Option<RangeRequest>,
        chunk_size: usize,
        label: &str,
    ) -> io::Result<FileStream> {
        let (start, length) = match range {
            Some(r) => (r.start, r.content_length()),
            None => (0, self.len),
        };
        if start > 0 {
            self.file.seek(SeekFrom::Start(start)).await?;
        }
        Ok(FileStream::new(self.file, length, chunk_size, label))
    }
}

/// Descriptors of this process currently pointing at `path`
#[cfg(all(test, target_os = "linux"))]
pub(crate) fn open_handles(path: &Path) -> usize {
    let Ok(target) = std::fs::canonicalize(path) else {
        return 0;
    };
    std::fs::read_dir("/proc/self/fd")
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|entry| std::fs::read_link(entry.path()).is_ok_and(|p| p == target))
                .count()
        })
        .unwrap_or(0)
}

/// Wait for every handle on `path` to close; the last close may land on a blocking thread
#[cfg(all(test, target_os = "linux"))]
pub(crate) async fn wait_for_close(path: &Path) -> bool {
    for _ in 0..50 {
        if open_handles(path) == 0 {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_rejects_traversal() {
        let root = MediaRoot::new("/srv/media");
        assert_eq!(
            root.resolve("clip.mp4").unwrap(),
            PathBuf::from("/srv/media/clip.mp4")
        );
        assert!(matches!(
            root.resolve("../etc/passwd"),
            Err(MediaError::InvalidName(_))
        ));
        assert!(matches!(
            root.resolve("/etc/passwd"),
            Err(MediaError::InvalidName(_))
        ));
        assert!(matches!(
            root.resolve("a/b.mp4"),
            Err(MediaError::InvalidName(_))
        ));
        assert!(matches!(root.resolve(""), Err(MediaError::InvalidName(_))));
    }

    #[tokio::test]
    async fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = MediaRoot::new(dir.path());
        assert!(matches!(
            root.open("nope.mp4").await,
            Err(MediaError::Missing(_))
        ));
    }

    #[tokio::test]
    async fn test_open_directory_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("folder")).unwrap();
        let root = MediaRoot::new(dir.path());
        assert!(matches!(
            root.open("folder").await,
            Err(MediaError::Missing(_))
        ));
    }

    #[tokio::test]
    async fn test_open_reads_fresh_size() {
        let dir = tempfile::tempdir().unwrap();
        let root = MediaRoot::new(dir.path());
        std::fs::write(dir.path().join("a.mp4"), vec![7u8; 10]).unwrap();
        assert_eq!(root.open("a.mp4").await.unwrap().size(), 10);

        std::fs::write(dir.path().join("a.mp4"), vec![7u8; 25]).unwrap();
        assert_eq!(root.open("a.mp4").await.unwrap().size(), 25);
    }

    #[tokio::test]
    async fn test_create_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let root = MediaRoot::new(dir.path());
        let (path, file) = root.create("new.mp4").await.unwrap();
        drop(file);
        assert!(path.exists());
        assert!(root.create("new.mp4").await.is_err());

        assert!(root.remove("new.mp4").await.unwrap());
        assert!(!root.remove("new.mp4").await.unwrap());
    }
}
