//! Transport boundary to the upload server.
//!
//! [`UploadApi`] mirrors the five HTTP endpoints one method each.
//! [`HttpUploadApi`](crate::http::HttpUploadApi) is the production
//! implementation; tests drive the pipeline with scripted mocks.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use mediaferry_protocol::{
    ChunkUploadResponse, InitUploadRequest, InitUploadResponse, SessionStatusResponse,
};

use crate::error::UploadError;

/// Boxed future returned by every [`UploadApi`] method.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, UploadError>> + Send + 'a>>;

/// Receives the size of each piece of body handed to the transport.
pub type BytesSentCallback = Arc<dyn Fn(u64) + Send + Sync>;

/// One chunk on the wire.
#[derive(Debug, Clone)]
pub struct ChunkPayload {
    pub index: u32,
    pub checksum: String,
    pub data: Bytes,
}

/// The whole file on the single-request path.
#[derive(Debug, Clone)]
pub struct WholeFilePayload {
    pub filename: String,
    pub data: Bytes,
    pub project_id: Option<String>,
}

/// Abstract connection to the upload server.
///
/// Implementations classify failures into [`UploadError`]s (see
/// [`UploadError::http`], [`UploadError::network`], [`UploadError::timeout`]);
/// the retry and cancellation machinery only ever looks at that
/// classification. Dropping a returned future must abort the request.
pub trait UploadApi: Send + Sync {
    /// `POST /upload/init`.
    fn init_session(&self, req: InitUploadRequest) -> ApiFuture<'_, InitUploadResponse>;

    /// `POST /upload/chunk/{session_id}`.
    fn upload_chunk<'a>(
        &'a self,
        session_id: &'a str,
        chunk: ChunkPayload,
    ) -> ApiFuture<'a, ChunkUploadResponse>;

    /// `DELETE /upload/{session_id}`. A session the server no longer knows is
    /// already released and must yield `Ok`.
    fn release_session<'a>(&'a self, session_id: &'a str) -> ApiFuture<'a, ()>;

    /// `GET /upload/status/{session_id}`.
    fn session_status<'a>(&'a self, session_id: &'a str) -> ApiFuture<'a, SessionStatusResponse>;

    /// `POST /upload/traditional`, reporting bytes handed to the transport.
    fn upload_whole(
        &self,
        payload: WholeFilePayload,
        on_sent: BytesSentCallback,
    ) -> ApiFuture<'_, serde_json::Value>;
}

/// Bounds one network operation by `limit`; an elapsed limit is a retryable
/// `TIMEOUT`.
pub(crate) async fn with_timeout<T, F>(limit: Option<Duration>, fut: F) -> Result<T, UploadError>
where
    F: Future<Output = Result<T, UploadError>>,
{
    match limit {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(UploadError::timeout(format!(
                "no response within {} ms",
                limit.as_millis()
            ))),
        },
        None => fut.await,
    }
}
