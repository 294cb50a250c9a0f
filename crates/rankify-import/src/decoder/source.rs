//! Import sources
//!
//! A source can be read either positionally, one window at a time, or as a
//! single sequential stream. Sources that cannot seek report
//! [`io::ErrorKind::Unsupported`] from [`ImportSource::read_window`] and the
//! decoder switches to [`ImportSource::open`].

use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt};

/// Boxed sequential reader handed out by [`ImportSource::open`]
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Byte source for one import job
#[async_trait]
pub trait ImportSource: Send + Sync {
    /// Human-readable name for logs
    fn name(&self) -> String;

    /// Read up to `len` bytes starting at `offset`.
    ///
    /// Returns an empty buffer at end of input.
    async fn read_window(&self, offset: u64, len: usize) -> io::Result<Bytes>;

    /// Open the whole source as one sequential stream
    async fn open(&self) -> io::Result<BoxedReader>;
}

/// A file on local disk
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ImportSource for FileSource {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    async fn read_window(&self, offset: u64, len: usize) -> io::Result<Bytes> {
        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(io::SeekFrom::Start(offset)).await?;

        let mut buf = Vec::with_capacity(len);
        file.take(len as u64).read_to_end(&mut buf).await?;
        Ok(Bytes::from(buf))
    }

    async fn open(&self) -> io::Result<BoxedReader> {
        let file = tokio::fs::File::open(&self.path).await?;
        Ok(Box::new(file))
    }
}

/// An in-memory buffer
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    data: Bytes,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

#[async_trait]
impl ImportSource for MemorySource {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn read_window(&self, offset: u64, len: usize) -> io::Result<Bytes> {
        let start = usize::try_from(offset)
            .unwrap_or(usize::MAX)
            .min(self.data.len());
        let end = start.saturating_add(len).min(self.data.len());
        Ok(self.data.slice(start..end))
    }

    async fn open(&self) -> io::Result<BoxedReader> {
        Ok(Box::new(io::Cursor::new(self.data.clone())))
    }
}

/// A one-shot reader such as stdin; sequential only
pub struct ReaderSource {
    name: String,
    reader: Mutex<Option<BoxedReader>>,
}

impl ReaderSource {
    pub fn new(name: impl Into<String>, reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self {
            name: name.into(),
            reader: Mutex::new(Some(Box::new(reader))),
        }
    }

    pub fn stdin() -> Self {
        Self::new("<stdin>", tokio::io::stdin())
    }
}

impl std::fmt::Debug for ReaderSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderSource").field("name", &self.name).finish()
    }
}

#[async_trait]
impl ImportSource for ReaderSource {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn read_window(&self, _offset: u64, _len: usize) -> io::Result<Bytes> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "positional reads are not supported for streamed input",
        ))
    }

    async fn open(&self) -> io::Result<BoxedReader> {
        let mut slot = self
            .reader
            .lock()
            .map_err(|_| io::Error::other("reader lock poisoned"))?;
        slot.take()
            .ok_or_else(|| io::Error::other(format!("{} was already consumed", self.name)))
    }
}
