//! Shared seekable source
//!
//! All part workers read from one source. Each read is a seek plus a read
//! performed under the source's lock, returning an owned buffer, so the lock
//! is never held across a network call.

use super::progress::{ProgressReporter, ProgressStream};
use bytes::Bytes;
use md5::{Digest, Md5};
use std::io::{self, SeekFrom};
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt, ReadBuf};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::io::ReaderStream;

const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Random-access byte source
pub trait SeekableSource: AsyncRead + AsyncSeek + Send + Unpin {}

impl<T: AsyncRead + AsyncSeek + Send + Unpin> SeekableSource for T {}

/// Caller-owned stream handle. The caller keeps its own clone; dropping the
/// library's clone never closes the caller's stream.
pub type SharedReader = Arc<Mutex<Box<dyn SeekableSource>>>;

/// Wrap a reader for use as an upload source
pub fn shared_reader<R: SeekableSource + 'static>(reader: R) -> SharedReader {
    Arc::new(Mutex::new(Box::new(reader)))
}

/// Source of known length shared between workers
#[derive(Clone)]
pub struct SharedSource {
    inner: SharedReader,
    len: u64,
}

impl SharedSource {
    /// Open a local file. The file is closed when the last clone is dropped.
    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = tokio::fs::File::open(path.as_ref()).await?;
        let len = file.metadata().await?.len();
        Ok(Self {
            inner: shared_reader(file),
            len,
        })
    }

    /// Use a caller stream; its length is found by seeking to the end.
    pub async fn from_shared(reader: SharedReader) -> io::Result<Self> {
        let len = {
            let mut guard = reader.lock().await;
            let len = guard.seek(SeekFrom::End(0)).await?;
            guard.seek(SeekFrom::Start(0)).await?;
            len
        };
        Ok(Self { inner: reader, len })
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read up to `len` bytes at `offset`. Fewer bytes come back only when
    /// the source ends early.
    pub async fn read_range(&self, offset: u64, len: u64) -> io::Result<Bytes> {
        let capacity = usize::try_from(len)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "range too large"))?;
        let mut buf = vec![0u8; capacity];
        let mut filled = 0;

        {
            let mut guard = self.inner.lock().await;
            guard.seek(SeekFrom::Start(offset)).await?;
            while filled < capacity {
                let n = guard.read(&mut buf[filled..]).await?;
                if n == 0 {
                    break;
                }
                filled += n;
            }
        }

        buf.truncate(filled);
        Ok(Bytes::from(buf))
    }

    /// MD5 of the whole source
    pub async fn md5(&self) -> io::Result<[u8; 16]> {
        let mut hasher = Md5::new();
        let mut buf = vec![0u8; HASH_BUFFER_SIZE];

        let mut guard = self.inner.lock().await;
        guard.seek(SeekFrom::Start(0)).await?;
        loop {
            let n = guard.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }

        let mut digest = [0u8; 16];
        digest.copy_from_slice(&hasher.finalize());
        Ok(digest)
    }

    /// Request body streaming the whole source from offset 0.
    ///
    /// The source stays locked until the body is dropped, and the body can
    /// only be sent once.
    pub async fn stream_body(&self, progress: ProgressReporter) -> io::Result<reqwest::Body> {
        let mut guard = self.inner.clone().lock_owned().await;
        guard.seek(SeekFrom::Start(0)).await?;

        let reader = GuardReader { guard }.take(self.len);
        let stream = ProgressStream::new(ReaderStream::new(reader), progress, self.len);
        Ok(reqwest::Body::wrap_stream(stream))
    }
}

impl std::fmt::Debug for SharedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSource").field("len", &self.len).finish()
    }
}

/// Reads through a held lock guard
struct GuardReader {
    guard: OwnedMutexGuard<Box<dyn SeekableSource>>,
}

impl AsyncRead for GuardReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut **self.guard).poll_read(cx, buf)
    }
}
