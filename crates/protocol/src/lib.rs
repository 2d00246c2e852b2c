//! Wire types for the resumable chunked upload protocol.
//!
//! Everything here is plain serde data; transport lives in `mediaferry-uploader`.

pub mod constants;
pub mod messages;
pub mod types;

// Re-export primary types for convenience.
pub use messages::{
    ChunkStatus, ChunkUploadResponse, InitUploadRequest, InitUploadResponse,
    SessionState, SessionStatusResponse,
};
pub use types::{UploadProgress, UploadStatus};
