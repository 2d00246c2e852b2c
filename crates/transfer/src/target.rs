use std::future::Future;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::TransferError;

/// Future returned by [`UploadTarget::read_range`].
pub type ReadFuture<'a> = Pin<Box<dyn Future<Output = Result<Bytes, TransferError>> + Send + 'a>>;

/// Read-only byte source being uploaded.
///
/// Owned by the caller; the uploader only ever reads from it.
pub trait UploadTarget: Send + Sync {
    /// File name sent to the server (extension drives type validation).
    fn name(&self) -> &str;

    /// Total size in bytes.
    fn size(&self) -> u64;

    /// Reads bytes `[start, end)`.
    fn read_range(&self, start: u64, end: u64) -> ReadFuture<'_>;
}

fn check_bounds(start: u64, end: u64, size: u64) -> Result<(), TransferError> {
    if start > end || end > size {
        return Err(TransferError::RangeOutOfBounds { start, end, size });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// FileTarget
// ---------------------------------------------------------------------------

/// An on-disk file. The handle is reopened for every range so reads never
/// share a cursor.
#[derive(Debug, Clone)]
pub struct FileTarget {
    path: PathBuf,
    name: String,
    size: u64,
}

impl FileTarget {
    /// Stats `path` and captures its size.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, TransferError> {
        let path = path.as_ref().to_path_buf();
        let meta = tokio::fs::metadata(&path).await?;
        if !meta.is_file() {
            return Err(TransferError::InvalidFile(format!(
                "not a regular file: {}",
                path.display()
            )));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        tracing::debug!(path = %path.display(), size = meta.len(), "upload target opened");
        Ok(Self {
            path,
            name,
            size: meta.len(),
        })
    }

    /// Overrides the name reported to the server.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Path on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl UploadTarget for FileTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn read_range(&self, start: u64, end: u64) -> ReadFuture<'_> {
        Box::pin(async move {
            check_bounds(start, end, self.size)?;
            let mut file = tokio::fs::File::open(&self.path).await?;
            file.seek(SeekFrom::Start(start)).await?;
            let mut buf = vec![0u8; (end - start) as usize];
            file.read_exact(&mut buf).await?;
            Ok(Bytes::from(buf))
        })
    }
}

// ---------------------------------------------------------------------------
// MemoryTarget
// ---------------------------------------------------------------------------

/// A buffer already held in memory.
#[derive(Debug, Clone)]
pub struct MemoryTarget {
    name: String,
    data: Bytes,
}

impl MemoryTarget {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

impl UploadTarget for MemoryTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_range(&self, start: u64, end: u64) -> ReadFuture<'_> {
        Box::pin(async move {
            check_bounds(start, end, self.size())?;
            Ok(self.data.slice(start as usize..end as usize))
        })
    }
}
