//! Session negotiation.

use chrono::{DateTime, NaiveDateTime, Utc};
use mediaferry_protocol::{InitUploadRequest, InitUploadResponse};
use mediaferry_transfer::{UploadTarget, chunk_count};
use tracing::{debug, info, warn};

use crate::api::{UploadApi, with_timeout};
use crate::config::UploadConfig;
use crate::error::UploadError;

/// A server-side chunked upload session.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadSession {
    pub session_id: String,
    pub total_chunks: u32,
    /// Chunk size confirmed by the server; may differ from the request.
    pub chunk_size_bytes: u64,
    /// `None` when the server sent no usable timestamp.
    pub expires_at: Option<DateTime<Utc>>,
    pub upload_url: String,
}

impl UploadSession {
    /// Validates an init response against the size of the file it covers.
    pub fn from_init_response(
        resp: InitUploadResponse,
        file_size: u64,
    ) -> Result<Self, UploadError> {
        if resp.upload_session_id.is_empty() {
            return Err(UploadError::invalid_response("empty session id"));
        }
        let session = Self {
            expires_at: parse_expiry(&resp.expires_at),
            session_id: resp.upload_session_id,
            total_chunks: resp.total_chunks,
            chunk_size_bytes: resp.chunk_size,
            upload_url: resp.upload_url,
        };
        session.check_geometry(file_size)?;
        Ok(session)
    }

    /// Rejects a zero chunk size or a chunk count that does not cover
    /// `file_size` exactly.
    pub(crate) fn check_geometry(&self, file_size: u64) -> Result<(), UploadError> {
        if self.chunk_size_bytes == 0 {
            return Err(UploadError::invalid_response("server chose a zero chunk size"));
        }
        let expected = chunk_count(file_size, self.chunk_size_bytes);
        if u64::from(self.total_chunks) != expected {
            return Err(UploadError::invalid_response(format!(
                "server reported {} chunks, {} bytes at {} per chunk needs {}",
                self.total_chunks, file_size, self.chunk_size_bytes, expected
            )));
        }
        Ok(())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Parses a server timestamp: RFC 3339, or ISO 8601 without an offset (UTC).
pub(crate) fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    warn!(expires_at = raw, "unparseable session expiry, treating as none");
    None
}

/// Opens a chunked session for `target`. Not retried.
pub async fn init_session(
    api: &dyn UploadApi,
    target: &dyn UploadTarget,
    config: &UploadConfig,
) -> Result<UploadSession, UploadError> {
    let req = InitUploadRequest {
        filename: target.name().to_string(),
        file_size: target.size(),
        chunk_size: config.chunk_size_bytes,
    };
    let resp = with_timeout(config.timeout(), api.init_session(req)).await?;
    let issued = resp.upload_session_id.clone();
    let session = match UploadSession::from_init_response(resp, target.size()) {
        Ok(session) => session,
        Err(e) => {
            if !issued.is_empty() {
                release_rejected(api, &issued, config).await;
            }
            return Err(e);
        }
    };
    info!(
        session = %session.session_id,
        total_chunks = session.total_chunks,
        chunk_size = session.chunk_size_bytes,
        "upload session opened"
    );
    Ok(session)
}

/// The server opened `session_id` but its init reply was unusable.
async fn release_rejected(api: &dyn UploadApi, session_id: &str, config: &UploadConfig) {
    match with_timeout(config.timeout(), api.release_session(session_id)).await {
        Ok(()) => debug!(session = %session_id, "rejected session released"),
        Err(e) => warn!(session = %session_id, error = %e, "failed to release session"),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::error::ErrorCode;
    use crate::mock::MockApi;
    use mediaferry_transfer::MemoryTarget;

    fn response(total_chunks: u32, chunk_size: u64) -> InitUploadResponse {
        InitUploadResponse {
            upload_session_id: "sess-1".into(),
            total_chunks,
            chunk_size,
            expires_at: "2030-01-01T00:00:00Z".into(),
            upload_url: "/upload/chunk/sess-1".into(),
        }
    }

    #[test]
    fn accepts_consistent_geometry() {
        let s = UploadSession::from_init_response(response(3, 4), 10).unwrap();
        assert_eq!(s.total_chunks, 3);
        assert_eq!(s.chunk_size_bytes, 4);
        assert_eq!(
            s.expires_at,
            Some(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn rejects_zero_chunk_size() {
        let err = UploadSession::from_init_response(response(0, 0), 10).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidResponse);
        assert!(!err.retryable);
    }

    #[test]
    fn rejects_wrong_chunk_count() {
        let err = UploadSession::from_init_response(response(2, 4), 10).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidResponse);
    }

    #[test]
    fn expiry_formats() {
        let want = Utc.with_ymd_and_hms(2030, 6, 1, 12, 30, 0).unwrap();
        assert_eq!(parse_expiry("2030-06-01T12:30:00Z"), Some(want));
        assert_eq!(parse_expiry("2030-06-01T14:30:00+02:00"), Some(want));
        assert_eq!(parse_expiry("2030-06-01T12:30:00"), Some(want));
        assert_eq!(parse_expiry("2030-06-01T12:30:00.000000"), Some(want));
        assert_eq!(parse_expiry(""), None);
        assert_eq!(parse_expiry("tomorrow"), None);
    }

    #[test]
    fn expiry_check() {
        let mut s = UploadSession::from_init_response(response(3, 4), 10).unwrap();
        let at = s.expires_at.unwrap();
        assert!(!s.is_expired_at(at - chrono::Duration::seconds(1)));
        assert!(s.is_expired_at(at));
        s.expires_at = None;
        assert!(!s.is_expired());
    }

    #[tokio::test]
    async fn init_sends_file_geometry() {
        let api = MockApi::new().with_session("sess-9", 4);
        let target = MemoryTarget::new("clip.mp4", vec![1u8; 10]);
        let config = UploadConfig {
            chunk_size_bytes: 4,
            ..UploadConfig::default()
        };

        let session = init_session(&api, &target, &config).await.unwrap();
        assert_eq!(session.session_id, "sess-9");
        assert_eq!(session.total_chunks, 3);

        let sent = api.init_requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].filename, "clip.mp4");
        assert_eq!(sent[0].file_size, 10);
        assert_eq!(sent[0].chunk_size, 4);
    }

    #[tokio::test]
    async fn server_override_of_chunk_size_is_honoured() {
        let api = MockApi::new().with_session("sess-2", 5);
        let target = MemoryTarget::new("clip.mp4", vec![1u8; 10]);
        let config = UploadConfig {
            chunk_size_bytes: 4,
            ..UploadConfig::default()
        };
        let session = init_session(&api, &target, &config).await.unwrap();
        assert_eq!(session.chunk_size_bytes, 5);
        assert_eq!(session.total_chunks, 2);
    }

    #[tokio::test]
    async fn inconsistent_init_reply_releases_issued_session() {
        let api = MockApi::new().with_session("sess-4", 4).with_init_chunk_count(1);
        let target = MemoryTarget::new("clip.mp4", vec![1u8; 10]);
        let err = init_session(&api, &target, &UploadConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidResponse);
        assert_eq!(api.releases(), vec!["sess-4".to_string()]);
    }

    #[tokio::test]
    async fn empty_session_id_releases_nothing() {
        let api = MockApi::new().with_session("", 4);
        let target = MemoryTarget::new("clip.mp4", vec![1u8; 10]);
        let err = init_session(&api, &target, &UploadConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidResponse);
        assert!(api.releases().is_empty());
    }

    #[tokio::test]
    async fn init_rejection_is_not_retried() {
        let api = MockApi::new().fail_init(UploadError::http(503, "busy"));
        let target = MemoryTarget::new("clip.mp4", vec![1u8; 10]);
        let err = init_session(&api, &target, &UploadConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::HttpError);
        assert_eq!(api.init_requests().len(), 1);
    }
}
