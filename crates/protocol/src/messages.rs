use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::UploadStatus;

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Starts a new chunked upload session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitUploadRequest {
    pub filename: String,
    pub file_size: u64,
    /// Chunk size the client would like; the server has the final word.
    pub chunk_size: u64,
}

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

/// Session negotiated by `POST /upload/init`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitUploadResponse {
    pub upload_session_id: String,
    pub total_chunks: u32,
    pub chunk_size: u64,
    pub expires_at: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub upload_url: String,
}

/// Outcome the server reports for one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStatus {
    Success,
    /// The server wants the chunk again (e.g. checksum mismatch).
    RetryRequired,
}

/// Reply to `POST /upload/chunk/{session_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkUploadResponse {
    pub status: ChunkStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

/// Session state reported by the status endpoint.
///
/// Servers may report states the client has no name for; those are kept
/// verbatim instead of failing the whole reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SessionState {
    Known(UploadStatus),
    Other(String),
}

impl SessionState {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Known(UploadStatus::Completed))
    }
}

impl From<UploadStatus> for SessionState {
    fn from(status: UploadStatus) -> Self {
        Self::Known(status)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(status) => status.fmt(f),
            Self::Other(raw) => f.write_str(raw),
        }
    }
}

/// Reply to `GET /upload/status/{session_id}`.
///
/// Only `status` and `missing_chunks` are guaranteed; the geometry fields let
/// a resuming client recompute byte ranges without guessing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatusResponse {
    pub status: SessionState,
    #[serde(default)]
    pub missing_chunks: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_chunks: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_request_uses_snake_case_fields() {
        let req = InitUploadRequest {
            filename: "clip.mp4".into(),
            file_size: 1024,
            chunk_size: 256,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"filename": "clip.mp4", "file_size": 1024, "chunk_size": 256})
        );
    }

    #[test]
    fn init_response_without_upload_url() {
        let json = r#"{
            "upload_session_id": "s-1",
            "total_chunks": 4,
            "chunk_size": 1048576,
            "expires_at": "2030-01-01T00:00:00Z"
        }"#;
        let resp: InitUploadResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.upload_session_id, "s-1");
        assert_eq!(resp.total_chunks, 4);
        assert!(resp.upload_url.is_empty());
    }

    #[test]
    fn chunk_response_retry_required() {
        let json = r#"{"status": "retry_required", "retry_count": 1, "max_retries": 3}"#;
        let resp: ChunkUploadResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.status, ChunkStatus::RetryRequired);
        assert_eq!(resp.retry_count, Some(1));
        assert_eq!(resp.max_retries, Some(3));
    }

    #[test]
    fn chunk_response_minimal_success() {
        let resp: ChunkUploadResponse = serde_json::from_str(r#"{"status":"success"}"#).unwrap();
        assert_eq!(resp.status, ChunkStatus::Success);
        assert!(resp.retry_count.is_none());
    }

    #[test]
    fn status_response_missing_chunks_defaults_empty() {
        let resp: SessionStatusResponse =
            serde_json::from_str(r#"{"status": "completed"}"#).unwrap();
        assert_eq!(resp.status, SessionState::Known(UploadStatus::Completed));
        assert!(resp.status.is_completed());
        assert!(resp.missing_chunks.is_empty());
        assert!(resp.chunk_size.is_none());
    }

    #[test]
    fn status_response_keeps_unrecognised_state() {
        let json = r#"{"status":"pending","missing_chunks":[0,1]}"#;
        let resp: SessionStatusResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.status, SessionState::Other("pending".into()));
        assert!(!resp.status.is_completed());
        assert_eq!(resp.status.to_string(), "pending");
        assert_eq!(resp.missing_chunks, vec![0, 1]);
    }

    #[test]
    fn known_session_state_serializes_bare() {
        let json = serde_json::to_value(SessionState::from(UploadStatus::Paused)).unwrap();
        assert_eq!(json, serde_json::json!("paused"));
    }

    #[test]
    fn status_response_with_geometry() {
        let json = r#"{"status":"uploading","missing_chunks":[5,6,7],"chunk_size":65536,"total_chunks":10}"#;
        let resp: SessionStatusResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.missing_chunks, vec![5, 6, 7]);
        assert_eq!(resp.chunk_size, Some(65536));
        assert_eq!(resp.total_chunks, Some(10));
    }
}
