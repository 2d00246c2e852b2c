//! Upload orchestrator.
//!
//! [`Uploader`] validates a target, picks the transfer strategy, drives the
//! chunked or single-request path and keeps the registry of running uploads
//! used for cancel-by-id.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use mediaferry_protocol::constants::chunk_path;
use mediaferry_protocol::{SessionStatusResponse, UploadStatus};
use mediaferry_transfer::{
    ProgressTelemetry, Strategy, chunk_count, chunk_range, select_strategy, validate_upload_file,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::api::{UploadApi, with_timeout};
use crate::cancel::CancelScope;
use crate::config::UploadConfig;
use crate::engine::{ChunkEngine, ChunkSelection};
use crate::error::{ErrorCode, UploadError};
use crate::session::{UploadSession, init_session, parse_expiry};
use crate::single::send_whole;
use crate::types::{
    ResumeRequest, StateCallback, UploadCallbacks, UploadOutcome, UploadRequest, UploadState,
};

type Registry = Mutex<HashMap<String, CancellationToken>>;

/// Entry point for uploads.
///
/// Cheap to share behind an `Arc`; any number of uploads may run at once,
/// each sending its own chunks sequentially.
pub struct Uploader {
    api: Arc<dyn UploadApi>,
    defaults: UploadConfig,
    active: Registry,
}

impl Uploader {
    pub fn new(api: Arc<dyn UploadApi>) -> Self {
        Self::with_config(api, UploadConfig::default())
    }

    /// Uses `defaults` as the base every request's overrides apply to.
    pub fn with_config(api: Arc<dyn UploadApi>, defaults: UploadConfig) -> Self {
        Self {
            api,
            defaults,
            active: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.defaults
    }

    /// Ids of uploads currently running, sorted.
    pub fn active_uploads(&self) -> Vec<String> {
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<String> = active.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Cancels a running upload. Returns `false` for an unknown id.
    pub fn cancel(&self, upload_id: &str) -> bool {
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        match active.get(upload_id) {
            Some(token) => {
                token.cancel();
                info!(upload = %upload_id, "cancel requested");
                true
            }
            None => false,
        }
    }

    /// Asks the server which chunks of `session_id` are still missing.
    pub async fn status(&self, session_id: &str) -> Result<SessionStatusResponse, UploadError> {
        with_timeout(self.defaults.timeout(), self.api.session_status(session_id)).await
    }

    /// Releases a server session that is no longer wanted.
    pub async fn release(&self, session_id: &str) -> Result<(), UploadError> {
        with_timeout(self.defaults.timeout(), self.api.release_session(session_id)).await?;
        info!(session = %session_id, "session released");
        Ok(())
    }

    /// Uploads `req.target`, chunked or in one request depending on its size.
    pub async fn upload(&self, req: UploadRequest) -> Result<UploadOutcome, UploadError> {
        let config = match &req.config {
            Some(overrides) => self.defaults.merged(overrides),
            None => self.defaults.clone(),
        };
        let registration = Registration::new(&self.active);
        let cancel = CancelScope::new(
            std::iter::once(registration.token.clone()).chain(req.cancel.clone()),
        );
        let mut life = Lifecycle::new(&registration.id, req.callbacks.on_state.as_ref());
        info!(
            upload = %registration.id,
            file = %req.target.name(),
            bytes = req.target.size(),
            "upload started"
        );

        let result = self.run_upload(&req, &config, &mut life, &cancel).await;
        // Stops anything still holding a clone of the scope.
        cancel.cancel();
        finish(&mut life, &req.callbacks, result)
    }

    /// Continues an interrupted chunked upload, sending only what the server
    /// reports missing.
    pub async fn resume(&self, req: ResumeRequest) -> Result<UploadOutcome, UploadError> {
        let config = match &req.config {
            Some(overrides) => self.defaults.merged(overrides),
            None => self.defaults.clone(),
        };
        let registration = Registration::new(&self.active);
        let cancel = CancelScope::new(
            std::iter::once(registration.token.clone()).chain(req.cancel.clone()),
        );
        let mut life = Lifecycle::new(&registration.id, req.callbacks.on_state.as_ref());
        info!(
            upload = %registration.id,
            session = %req.session_id,
            file = %req.target.name(),
            "resume started"
        );

        let result = self.run_resume(&req, &config, &mut life, &cancel).await;
        // Stops anything still holding a clone of the scope.
        cancel.cancel();
        finish(&mut life, &req.callbacks, result)
    }

    async fn run_upload(
        &self,
        req: &UploadRequest,
        config: &UploadConfig,
        life: &mut Lifecycle<'_>,
        cancel: &CancelScope,
    ) -> Result<UploadOutcome, UploadError> {
        let target = req.target.as_ref();
        let on_progress = req.callbacks.on_progress.as_ref();

        life.enter(UploadState::Validating);
        cancel.check()?;
        validate_upload_file(
            target.name(),
            target.size(),
            config.max_file_size,
            &config.allowed_extensions,
        )?;

        match select_strategy(target.size(), config.chunking_enabled, config.chunking_threshold) {
            Strategy::Chunked => {
                life.enter(UploadState::Initializing);
                let session = cancel
                    .race(init_session(self.api.as_ref(), target, config))
                    .await?;

                life.enter(UploadState::Transferring);
                let telemetry = ProgressTelemetry::new(
                    target.size(),
                    session.total_chunks,
                    UploadStatus::Uploading,
                );
                let engine =
                    ChunkEngine::new(self.api.as_ref(), config.retry_policy(), config.timeout());
                let summary = engine
                    .transfer(
                        target,
                        &session,
                        &ChunkSelection::All,
                        telemetry,
                        on_progress,
                        cancel,
                    )
                    .await?;
                Ok(UploadOutcome::Chunked(summary))
            }
            Strategy::Traditional => {
                life.enter(UploadState::Sending);
                let payload = send_whole(
                    self.api.as_ref(),
                    target,
                    req.project_id.clone(),
                    config.timeout(),
                    on_progress,
                    cancel,
                )
                .await?;
                Ok(UploadOutcome::Traditional(payload))
            }
        }
    }

    async fn run_resume(
        &self,
        req: &ResumeRequest,
        config: &UploadConfig,
        life: &mut Lifecycle<'_>,
        cancel: &CancelScope,
    ) -> Result<UploadOutcome, UploadError> {
        if !config.resume_enabled {
            return Err(UploadError::new(
                ErrorCode::ResumeDisabled,
                "resume is disabled by configuration",
            ));
        }
        let target = req.target.as_ref();

        life.enter(UploadState::Initializing);
        let status = cancel
            .race(with_timeout(
                config.timeout(),
                self.api.session_status(&req.session_id),
            ))
            .await?;
        if status.status.is_completed() {
            return Err(UploadError::already_completed(&req.session_id));
        }

        let chunk_size = status.chunk_size.unwrap_or(config.chunk_size_bytes);
        let total_chunks = match status.total_chunks {
            Some(n) => n,
            None => u32::try_from(chunk_count(target.size(), chunk_size)).map_err(|_| {
                UploadError::new(ErrorCode::InvalidFile, "file has too many chunks")
            })?,
        };
        let session = UploadSession {
            session_id: req.session_id.clone(),
            total_chunks,
            chunk_size_bytes: chunk_size,
            expires_at: status.expires_at.as_deref().and_then(parse_expiry),
            upload_url: chunk_path(&req.session_id),
        };
        session.check_geometry(target.size())?;

        let missing = ChunkSelection::Only(status.missing_chunks).resolve(total_chunks)?;
        let missing_bytes: u64 = missing
            .iter()
            .filter_map(|&i| chunk_range(i, chunk_size, target.size()))
            .map(|(start, end)| end - start)
            .sum();
        let present_chunks = total_chunks - missing.len() as u32;
        info!(
            session = %session.session_id,
            missing = missing.len(),
            present = present_chunks,
            "resuming session"
        );

        life.enter(UploadState::Transferring);
        let telemetry =
            ProgressTelemetry::new(target.size(), total_chunks, UploadStatus::Resuming)
                .with_baseline(target.size() - missing_bytes, present_chunks);
        let engine = ChunkEngine::new(self.api.as_ref(), config.retry_policy(), config.timeout());
        let summary = engine
            .transfer(
                target,
                &session,
                &ChunkSelection::Only(missing),
                telemetry,
                req.callbacks.on_progress.as_ref(),
                cancel,
            )
            .await?;
        Ok(UploadOutcome::Chunked(summary))
    }
}

/// Records the terminal state and reports a failure exactly once.
fn finish(
    life: &mut Lifecycle<'_>,
    callbacks: &UploadCallbacks,
    result: Result<UploadOutcome, UploadError>,
) -> Result<UploadOutcome, UploadError> {
    match &result {
        Ok(_) => life.enter(UploadState::Completed),
        Err(err) => {
            if err.is_cancelled() {
                life.enter(UploadState::Cancelled);
            } else {
                error!(upload = %life.id, error = %err, "upload failed");
                life.enter(UploadState::Failed);
            }
            if let Some(cb) = &callbacks.on_error {
                cb(err);
            }
        }
    }
    result
}

/// Registry entry of one running upload, removed on drop.
struct Registration<'a> {
    registry: &'a Registry,
    id: String,
    token: CancellationToken,
}

impl<'a> Registration<'a> {
    fn new(registry: &'a Registry) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        let token = CancellationToken::new();
        registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), token.clone());
        Self {
            registry,
            id,
            token,
        }
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

/// Current [`UploadState`] of one upload plus its observer.
struct Lifecycle<'a> {
    id: &'a str,
    state: UploadState,
    on_state: Option<&'a StateCallback>,
}

impl<'a> Lifecycle<'a> {
    fn new(id: &'a str, on_state: Option<&'a StateCallback>) -> Self {
        Self {
            id,
            state: UploadState::Idle,
            on_state,
        }
    }

    fn enter(&mut self, next: UploadState) {
        if !self.state.can_transition_to(next) {
            warn!(upload = %self.id, from = %self.state, to = %next, "unexpected state change");
        }
        info!(upload = %self.id, from = %self.state, to = %next, "upload state");
        self.state = next;
        if let Some(cb) = self.on_state {
            cb(self.id, next);
        }
    }
}
