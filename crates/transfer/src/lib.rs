//! Building blocks for resumable chunked uploads.
//!
//! Nothing in this crate talks to the network: it decides how a file is
//! split, fingerprints each piece, validates the file before anything is
//! sent, computes retry delays and turns byte counters into progress
//! snapshots. The async protocol client lives in `mediaferry-uploader`.

mod checksum;
mod chunked;
mod progress;
mod retry;
mod strategy;
mod target;
mod validation;

pub use checksum::{CHECKSUM_HEX_LEN, checksum_bytes};
pub use chunked::{ChunkDescriptor, chunk_count, chunk_range, plan_chunks, read_chunk};
pub use progress::{ProgressTelemetry, ThroughputWindow};
pub use retry::RetryPolicy;
pub use strategy::{Strategy, select_strategy};
pub use target::{FileTarget, MemoryTarget, ReadFuture, UploadTarget};
pub use validation::{DEFAULT_ALLOWED_EXTENSIONS, validate_upload_file};

/// Default chunk size requested from the server: 5 MiB.
///
/// The server confirms the actual size in its init response.
pub const DEFAULT_CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// Files at or above this size go through the chunked path: 50 MiB.
pub const CHUNKING_THRESHOLD: u64 = 50 * 1024 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid file: {0}")]
    InvalidFile(String),

    #[error("file is empty")]
    EmptyFile,

    #[error("file size {size} exceeds the {max} byte limit")]
    FileTooLarge { size: u64, max: u64 },

    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("byte range {start}..{end} outside a {size} byte target")]
    RangeOutOfBounds { start: u64, end: u64, size: u64 },
}
