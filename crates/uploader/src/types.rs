//! Request, callback and result types for the upload flow.

use std::fmt;
use std::sync::Arc;

use mediaferry_protocol::{UploadProgress, UploadStatus};
use mediaferry_transfer::UploadTarget;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::UploadConfigOverrides;
use crate::error::UploadError;

/// Lifecycle of one upload as seen by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    Idle,
    Validating,
    /// Negotiating a chunked session.
    Initializing,
    /// Sending chunks.
    Transferring,
    /// Single-request upload in flight.
    Sending,
    Completed,
    Failed,
    Cancelled,
}

impl UploadState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether the orchestrator may move from `self` to `next`.
    pub fn can_transition_to(self, next: UploadState) -> bool {
        use UploadState::*;
        match (self, next) {
            (s, Failed | Cancelled) => !s.is_terminal(),
            (Idle, Validating) => true,
            (Validating, Initializing | Sending) => true,
            // Resume skips validation and goes straight to the session.
            (Idle, Initializing) => true,
            (Initializing, Transferring) => true,
            (Transferring | Sending, Completed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Initializing => "initializing",
            Self::Transferring => "transferring",
            Self::Sending => "sending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

pub type ProgressCallback = Arc<dyn Fn(&UploadProgress) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&UploadError) + Send + Sync>;
/// Receives the upload id and the state just entered.
pub type StateCallback = Arc<dyn Fn(&str, UploadState) + Send + Sync>;

/// Observer hooks. All are optional and invoked synchronously.
#[derive(Clone, Default)]
pub struct UploadCallbacks {
    pub on_progress: Option<ProgressCallback>,
    pub on_error: Option<ErrorCallback>,
    pub on_state: Option<StateCallback>,
}

impl fmt::Debug for UploadCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadCallbacks")
            .field("on_progress", &self.on_progress.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_state", &self.on_state.is_some())
            .finish()
    }
}

/// A new upload.
#[derive(Clone)]
pub struct UploadRequest {
    pub target: Arc<dyn UploadTarget>,
    /// Forwarded on the single-request path only.
    pub project_id: Option<String>,
    pub config: Option<UploadConfigOverrides>,
    /// Caller-owned cancellation, merged with cancel-by-id.
    pub cancel: Option<CancellationToken>,
    pub callbacks: UploadCallbacks,
}

impl UploadRequest {
    pub fn new(target: Arc<dyn UploadTarget>) -> Self {
        Self {
            target,
            project_id: None,
            config: None,
            cancel: None,
            callbacks: UploadCallbacks::default(),
        }
    }

    pub fn project_id(mut self, id: impl Into<String>) -> Self {
        self.project_id = Some(id.into());
        self
    }

    pub fn config(mut self, overrides: UploadConfigOverrides) -> Self {
        self.config = Some(overrides);
        self
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn on_progress(mut self, cb: impl Fn(&UploadProgress) + Send + Sync + 'static) -> Self {
        self.callbacks.on_progress = Some(Arc::new(cb));
        self
    }

    pub fn on_error(mut self, cb: impl Fn(&UploadError) + Send + Sync + 'static) -> Self {
        self.callbacks.on_error = Some(Arc::new(cb));
        self
    }

    pub fn on_state(mut self, cb: impl Fn(&str, UploadState) + Send + Sync + 'static) -> Self {
        self.callbacks.on_state = Some(Arc::new(cb));
        self
    }
}

impl fmt::Debug for UploadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadRequest")
            .field("target", &self.target.name())
            .field("size", &self.target.size())
            .field("project_id", &self.project_id)
            .field("config", &self.config)
            .field("callbacks", &self.callbacks)
            .finish()
    }
}

/// Continuation of an interrupted chunked upload.
#[derive(Clone)]
pub struct ResumeRequest {
    pub session_id: String,
    /// The same bytes that were originally being uploaded.
    pub target: Arc<dyn UploadTarget>,
    pub config: Option<UploadConfigOverrides>,
    pub cancel: Option<CancellationToken>,
    pub callbacks: UploadCallbacks,
}

impl ResumeRequest {
    pub fn new(session_id: impl Into<String>, target: Arc<dyn UploadTarget>) -> Self {
        Self {
            session_id: session_id.into(),
            target,
            config: None,
            cancel: None,
            callbacks: UploadCallbacks::default(),
        }
    }

    pub fn config(mut self, overrides: UploadConfigOverrides) -> Self {
        self.config = Some(overrides);
        self
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn on_progress(mut self, cb: impl Fn(&UploadProgress) + Send + Sync + 'static) -> Self {
        self.callbacks.on_progress = Some(Arc::new(cb));
        self
    }

    pub fn on_error(mut self, cb: impl Fn(&UploadError) + Send + Sync + 'static) -> Self {
        self.callbacks.on_error = Some(Arc::new(cb));
        self
    }

    /// Receives the upload id with every state change, as for
    /// [`UploadRequest::on_state`].
    pub fn on_state(mut self, cb: impl Fn(&str, UploadState) + Send + Sync + 'static) -> Self {
        self.callbacks.on_state = Some(Arc::new(cb));
        self
    }
}

impl fmt::Debug for ResumeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResumeRequest")
            .field("session_id", &self.session_id)
            .field("target", &self.target.name())
            .field("config", &self.config)
            .finish()
    }
}

/// Result of a finished chunked upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionSummary {
    pub session_id: String,
    pub filename: String,
    pub file_size: u64,
    pub total_chunks: u32,
    pub elapsed_seconds: f64,
    pub status: UploadStatus,
}

/// What a successful upload produced.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    Chunked(CompletionSummary),
    /// Server payload of the single-request endpoint.
    Traditional(serde_json::Value),
}

impl UploadOutcome {
    pub fn summary(&self) -> Option<&CompletionSummary> {
        match self {
            Self::Chunked(s) => Some(s),
            Self::Traditional(_) => None,
        }
    }
}
