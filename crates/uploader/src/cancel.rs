//! Cancellation coordination.
//!
//! An upload can be stopped by the caller's own token or by cancel-by-id
//! through the [`Uploader`](crate::Uploader) registry. [`CancelScope`] folds
//! those into one effective signal.

use std::future::Future;

use futures_util::future::select_all;
use tokio_util::sync::CancellationToken;

use crate::error::UploadError;

/// Effective cancellation signal for one upload.
///
/// Sources are checked directly rather than forwarded through a task, so a
/// cancel is visible to the very next check and wakes every pending wait.
///
/// The internal token is shared by every clone of the scope and only matters
/// to holders of a clone: [`cancel`](Self::cancel) stops them without firing
/// the caller's or the registry's tokens. The uploader fires it once an
/// upload has returned.
#[derive(Debug, Clone)]
pub struct CancelScope {
    internal: CancellationToken,
    sources: Vec<CancellationToken>,
}

impl Default for CancelScope {
    fn default() -> Self {
        Self::new(std::iter::empty())
    }
}

impl CancelScope {
    /// Merges `sources` with a fresh internal token.
    pub fn new(sources: impl IntoIterator<Item = CancellationToken>) -> Self {
        Self {
            internal: CancellationToken::new(),
            sources: sources.into_iter().collect(),
        }
    }

    /// Fires the internal token.
    pub fn cancel(&self) {
        self.internal.cancel();
    }

    /// `true` once any source has fired.
    pub fn is_cancelled(&self) -> bool {
        self.internal.is_cancelled() || self.sources.iter().any(|t| t.is_cancelled())
    }

    /// `Err(CANCELLED)` once any source has fired.
    pub fn check(&self) -> Result<(), UploadError> {
        if self.is_cancelled() {
            Err(UploadError::cancelled())
        } else {
            Ok(())
        }
    }

    /// Resolves as soon as any source fires.
    pub async fn cancelled(&self) {
        let waits = std::iter::once(&self.internal)
            .chain(&self.sources)
            .map(|t| Box::pin(t.cancelled()));
        select_all(waits).await;
    }

    /// Runs `fut` unless cancellation fires first, in which case `fut` is
    /// dropped (aborting any in-flight request) and `CANCELLED` is returned.
    pub async fn race<T, F>(&self, fut: F) -> Result<T, UploadError>
    where
        F: Future<Output = Result<T, UploadError>>,
    {
        self.check()?;
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(UploadError::cancelled()),
            result = fut => result,
        }
    }
}
