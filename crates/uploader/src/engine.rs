//! Chunk transfer engine.
//!
//! Moves the chunks of one session strictly in ascending order, one request
//! at a time. Each chunk is read, fingerprinted and sent through
//! [`with_retry`]; a terminal failure aborts the whole transfer and releases
//! the server session.

use std::time::Duration;

use mediaferry_protocol::{ChunkStatus, UploadProgress, UploadStatus};
use mediaferry_transfer::{ProgressTelemetry, RetryPolicy, UploadTarget, read_chunk};
use tracing::{debug, error, info, warn};

use crate::api::{ChunkPayload, UploadApi, with_timeout};
use crate::cancel::CancelScope;
use crate::error::UploadError;
use crate::retry::with_retry;
use crate::session::UploadSession;
use crate::types::{CompletionSummary, ProgressCallback};

/// Which chunks of a session to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkSelection {
    /// Every chunk, `0..total_chunks`.
    All,
    /// An explicit set, e.g. the chunks a resumed session is missing.
    Only(Vec<u32>),
}

impl ChunkSelection {
    /// Ascending, de-duplicated indices to send.
    ///
    /// An index outside `0..total_chunks` means the server and client disagree
    /// on the session layout and yields `INVALID_RESPONSE`.
    pub fn resolve(&self, total_chunks: u32) -> Result<Vec<u32>, UploadError> {
        match self {
            Self::All => Ok((0..total_chunks).collect()),
            Self::Only(indices) => {
                let mut indices = indices.clone();
                indices.sort_unstable();
                indices.dedup();
                if let Some(&bad) = indices.iter().find(|&&i| i >= total_chunks) {
                    return Err(UploadError::invalid_response(format!(
                        "chunk index {bad} outside a {total_chunks} chunk session"
                    )));
                }
                Ok(indices)
            }
        }
    }
}

/// Sequential chunk sender for one session.
pub struct ChunkEngine<'a> {
    api: &'a dyn UploadApi,
    policy: RetryPolicy,
    timeout: Option<Duration>,
}

impl<'a> ChunkEngine<'a> {
    /// `timeout` bounds each request, not the whole transfer.
    pub fn new(api: &'a dyn UploadApi, policy: RetryPolicy, timeout: Option<Duration>) -> Self {
        Self {
            api,
            policy,
            timeout,
        }
    }

    /// Sends the selected chunks of `session`.
    ///
    /// `telemetry` carries the starting counters (non-zero on resume). On any
    /// abort the session is released once, best effort, and the error that
    /// caused the abort is returned.
    pub async fn transfer(
        &self,
        target: &dyn UploadTarget,
        session: &UploadSession,
        selection: &ChunkSelection,
        mut telemetry: ProgressTelemetry,
        on_progress: Option<&ProgressCallback>,
        cancel: &CancelScope,
    ) -> Result<CompletionSummary, UploadError> {
        let emit = |p: UploadProgress| {
            if let Some(cb) = on_progress {
                cb(&p);
            }
        };

        match self
            .send_all(target, session, selection, &mut telemetry, &emit, cancel)
            .await
        {
            Ok(()) => {
                emit(telemetry.finish(UploadStatus::Completed));
                let summary = CompletionSummary {
                    session_id: session.session_id.clone(),
                    filename: target.name().to_string(),
                    file_size: target.size(),
                    total_chunks: session.total_chunks,
                    elapsed_seconds: telemetry.elapsed().as_secs_f64(),
                    status: UploadStatus::Completed,
                };
                info!(
                    session = %session.session_id,
                    chunks = session.total_chunks,
                    elapsed_s = summary.elapsed_seconds,
                    "chunked transfer complete"
                );
                Ok(summary)
            }
            Err(err) => {
                if err.is_cancelled() {
                    info!(session = %session.session_id, "chunked transfer cancelled");
                } else {
                    error!(session = %session.session_id, error = %err, "chunked transfer failed");
                    emit(telemetry.finish(UploadStatus::Failed));
                }
                self.release(&session.session_id).await;
                Err(err)
            }
        }
    }

    async fn send_all(
        &self,
        target: &dyn UploadTarget,
        session: &UploadSession,
        selection: &ChunkSelection,
        telemetry: &mut ProgressTelemetry,
        emit: &impl Fn(UploadProgress),
        cancel: &CancelScope,
    ) -> Result<(), UploadError> {
        let indices = selection.resolve(session.total_chunks)?;
        debug!(
            session = %session.session_id,
            count = indices.len(),
            total = session.total_chunks,
            "sending chunks"
        );

        for index in indices {
            cancel.check()?;
            if session.is_expired() {
                return Err(UploadError::session_expired(&session.session_id));
            }

            let (descriptor, data) = read_chunk(target, index, session.chunk_size_bytes).await?;
            let len = descriptor.len();
            self.send_chunk(&session.session_id, index, &descriptor.checksum, data, cancel)
                .await?;

            debug!(
                session = %session.session_id,
                chunk = index,
                bytes = len,
                checksum = %descriptor.checksum,
                "chunk acknowledged"
            );
            emit(telemetry.record_chunk(len));
        }
        Ok(())
    }

    async fn send_chunk(
        &self,
        session_id: &str,
        index: u32,
        checksum: &str,
        data: bytes::Bytes,
        cancel: &CancelScope,
    ) -> Result<(), UploadError> {
        let api = self.api;
        let timeout = self.timeout;
        with_retry(&self.policy, cancel, |attempt| {
            let payload = ChunkPayload {
                index,
                checksum: checksum.to_string(),
                data: data.clone(),
            };
            async move {
                if attempt > 0 {
                    warn!(session = %session_id, chunk = index, attempt, "resending chunk");
                }
                let resp = with_timeout(timeout, api.upload_chunk(session_id, payload)).await?;
                match resp.status {
                    ChunkStatus::Success => Ok(()),
                    ChunkStatus::RetryRequired => {
                        Err(UploadError::chunk_retry_required(index, &resp))
                    }
                }
            }
        })
        .await
    }

    /// Best-effort `DELETE` of the session; failures are only logged.
    async fn release(&self, session_id: &str) {
        match with_timeout(self.timeout, self.api.release_session(session_id)).await {
            Ok(()) => debug!(session = %session_id, "session released"),
            Err(e) => warn!(session = %session_id, error = %e, "failed to release session"),
        }
    }
}
