//! Upload error taxonomy.
//!
//! Every failure surfaces as a single [`UploadError`] carrying a stable
//! [`ErrorCode`] for UI branching. Whether a failure is worth retrying is
//! decided once, when the error is built.

use std::fmt;

use mediaferry_protocol::ChunkUploadResponse;
use mediaferry_transfer::TransferError;
use serde::{Deserialize, Serialize};

/// Stable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Pre-flight validation, never retried.
    InvalidFile,
    EmptyFile,
    FileTooLarge,
    UnsupportedFileType,

    // Transport.
    NetworkError,
    Timeout,
    HttpError,
    InvalidResponse,

    /// The server asked for a chunk to be resent.
    ChunkRetryRequired,
    Cancelled,
    MaxRetriesExceeded,
    AlreadyCompleted,
    SessionExpired,
    ResumeDisabled,
    /// Reading the local file failed.
    IoError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidFile => "INVALID_FILE",
            Self::EmptyFile => "EMPTY_FILE",
            Self::FileTooLarge => "FILE_TOO_LARGE",
            Self::UnsupportedFileType => "UNSUPPORTED_FILE_TYPE",
            Self::NetworkError => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::HttpError => "HTTP_ERROR",
            Self::InvalidResponse => "INVALID_RESPONSE",
            Self::ChunkRetryRequired => "CHUNK_RETRY_REQUIRED",
            Self::Cancelled => "CANCELLED",
            Self::MaxRetriesExceeded => "MAX_RETRIES_EXCEEDED",
            Self::AlreadyCompleted => "ALREADY_COMPLETED",
            Self::SessionExpired => "SESSION_EXPIRED",
            Self::ResumeDisabled => "RESUME_DISABLED",
            Self::IoError => "IO_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed upload operation.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{code}: {message}")]
pub struct UploadError {
    pub message: String,
    pub code: ErrorCode,
    /// HTTP status, when the server answered.
    pub status_code: Option<u16>,
    pub retryable: bool,
    /// Last underlying failure for `MAX_RETRIES_EXCEEDED`.
    #[source]
    pub last_failure: Option<Box<UploadError>>,
}

impl UploadError {
    fn build(code: ErrorCode, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            message: message.into(),
            code,
            status_code: None,
            retryable,
            last_failure: None,
        }
    }

    /// Builds a non-retryable error with the given code.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::build(code, message, false)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorCode::Cancelled, "upload cancelled")
    }

    /// Connection refused, reset, DNS failure and similar.
    pub fn network(message: impl Into<String>) -> Self {
        Self::build(ErrorCode::NetworkError, message, true)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::build(ErrorCode::Timeout, message, true)
    }

    /// Non-2xx answer. 5xx and 408 are retryable, every other status is not.
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        let message = if body.is_empty() {
            format!("server returned HTTP {status}")
        } else {
            format!("server returned HTTP {status}: {body}")
        };
        let retryable = status >= 500 || status == 408;
        Self {
            status_code: Some(status),
            ..Self::build(ErrorCode::HttpError, message, retryable)
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidResponse, message)
    }

    /// A 2xx chunk reply whose status is `retry_required`.
    pub fn chunk_retry_required(index: u32, resp: &ChunkUploadResponse) -> Self {
        let message = match (resp.retry_count, resp.max_retries) {
            (Some(count), Some(max)) => {
                format!("server requested resend of chunk {index} ({count}/{max})")
            }
            _ => format!("server requested resend of chunk {index}"),
        };
        Self::build(ErrorCode::ChunkRetryRequired, message, true)
    }

    /// Terminal wrapper once the retry budget is spent.
    pub fn max_retries_exceeded(last: UploadError, attempts: u32) -> Self {
        Self {
            status_code: last.status_code,
            last_failure: Some(Box::new(last)),
            ..Self::new(
                ErrorCode::MaxRetriesExceeded,
                format!("giving up after {attempts} attempts"),
            )
        }
    }

    pub fn already_completed(session_id: &str) -> Self {
        Self::new(
            ErrorCode::AlreadyCompleted,
            format!("session {session_id} is already completed"),
        )
    }

    pub fn session_expired(session_id: &str) -> Self {
        Self::new(
            ErrorCode::SessionExpired,
            format!("session {session_id} has expired"),
        )
    }

    pub fn is_cancelled(&self) -> bool {
        self.code == ErrorCode::Cancelled
    }
}

impl From<TransferError> for UploadError {
    fn from(err: TransferError) -> Self {
        let code = match &err {
            TransferError::InvalidFile(_) => ErrorCode::InvalidFile,
            TransferError::EmptyFile => ErrorCode::EmptyFile,
            TransferError::FileTooLarge { .. } => ErrorCode::FileTooLarge,
            TransferError::UnsupportedFileType(_) => ErrorCode::UnsupportedFileType,
            TransferError::Io(_) | TransferError::RangeOutOfBounds { .. } => ErrorCode::IoError,
        };
        Self::new(code, err.to_string())
    }
}
