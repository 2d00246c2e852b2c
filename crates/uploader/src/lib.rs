//! Resumable chunked upload client.
//!
//! This crate implements the **protocol logic** for moving large media
//! files to an upload server. The HTTP transport sits behind the
//! [`UploadApi`] trait so the whole pipeline can be driven by mocks.
//!
//! # Pipeline
//!
//! 1. **Validate**: name, size and extension checks before any request
//! 2. **Select**: single request below the chunking threshold, chunked above
//! 3. **Init**: negotiate a session (chunk size, chunk count, expiry)
//! 4. **Transfer**: send chunks in order, each with checksum and retry
//! 5. **Release**: on any abort, best-effort release of the server session
//!
//! [`Uploader`] ties the steps together and owns the registry used for
//! cancel-by-id.

pub mod api;
pub mod cancel;
pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod retry;
pub mod session;
pub mod single;
pub mod types;
pub mod uploader;

#[cfg(test)]
pub(crate) mod mock;

// Re-export primary types for convenience.
pub use api::{ApiFuture, BytesSentCallback, ChunkPayload, UploadApi, WholeFilePayload};
pub use cancel::CancelScope;
pub use config::{UploadConfig, UploadConfigOverrides};
pub use engine::{ChunkEngine, ChunkSelection};
pub use error::{ErrorCode, UploadError};
pub use http::HttpUploadApi;
pub use retry::with_retry;
pub use session::{UploadSession, init_session};
pub use single::send_whole;
pub use types::{
    CompletionSummary, ErrorCallback, ProgressCallback, ResumeRequest, StateCallback,
    UploadCallbacks, UploadOutcome, UploadRequest, UploadState,
};
pub use uploader::Uploader;

pub use mediaferry_protocol::{UploadProgress, UploadStatus};
pub use mediaferry_transfer::{FileTarget, MemoryTarget, UploadTarget};
pub use tokio_util::sync::CancellationToken;
