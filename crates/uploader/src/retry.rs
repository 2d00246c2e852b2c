//! Retry controller: bounded exponential backoff around one operation.

use std::future::Future;

use mediaferry_transfer::RetryPolicy;
use tracing::{debug, warn};

use crate::cancel::CancelScope;
use crate::error::UploadError;

/// Runs `op` until it succeeds, fails terminally, or the policy is spent.
///
/// `op` receives the 0-based attempt number. A persistently retryable failure
/// gets exactly `max_retries + 1` attempts and then surfaces as
/// `MAX_RETRIES_EXCEEDED` wrapping the last failure. Non-retryable failures
/// and cancellation return immediately. Each attempt and each backoff sleep
/// is raced against `cancel`.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancelScope,
    mut op: F,
) -> Result<T, UploadError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, UploadError>>,
{
    let mut attempt: u32 = 0;
    loop {
        let err = match cancel.race(op(attempt)).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if err.is_cancelled() || !err.retryable {
            return Err(err);
        }
        if attempt >= policy.max_retries {
            warn!(attempts = attempt + 1, error = %err, "retry budget exhausted");
            return Err(UploadError::max_retries_exceeded(err, attempt + 1));
        }

        let delay = policy.delay_for_attempt(attempt);
        debug!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "retryable failure, backing off"
        );
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(UploadError::cancelled()),
            _ = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::error::ErrorCode;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            backoff_factor: 2.0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_failure_uses_every_attempt() {
        for max_retries in [0u32, 1, 3, 5] {
            let calls = AtomicU32::new(0);
            let err = with_retry(&policy(max_retries), &CancelScope::default(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(UploadError::http(503, "")) }
            })
            .await
            .unwrap_err();
            assert_eq!(calls.load(Ordering::SeqCst), max_retries + 1);
            assert_eq!(err.code, ErrorCode::MaxRetriesExceeded);
            assert_eq!(err.last_failure.unwrap().status_code, Some(503));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sleeps_follow_policy() {
        let stamps = std::sync::Mutex::new(Vec::new());
        let start = Instant::now();
        let _ = with_retry(&policy(4), &CancelScope::default(), |_| {
            stamps.lock().unwrap().push(start.elapsed());
            async { Err::<(), _>(UploadError::network("reset")) }
        })
        .await;

        let stamps = stamps.into_inner().unwrap();
        let gaps: Vec<u128> = stamps.windows(2).map(|w| (w[1] - w[0]).as_millis()).collect();
        // min(100 * 2^i, 350)
        assert_eq!(gaps, vec![100, 200, 350, 350]);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let v = with_retry(&policy(3), &CancelScope::default(), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(UploadError::http(503, "unavailable"))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(v, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_fails_fast() {
        let calls = AtomicU32::new(0);
        let err = with_retry(&policy(3), &CancelScope::default(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(UploadError::http(400, "bad chunk")) }
        })
        .await
        .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err.code, ErrorCode::HttpError);
        assert_eq!(err.status_code, Some(400));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_backoff_yields_cancelled() {
        let token = CancellationToken::new();
        let scope = CancelScope::new([token.clone()]);
        let calls = Arc::new(AtomicU32::new(0));

        let canceller = tokio::spawn({
            let token = token.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(150)).await;
                token.cancel();
            }
        });

        let err = with_retry(&policy(10), &scope, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(UploadError::timeout("slow")) }
        })
        .await
        .unwrap_err();
        canceller.await.unwrap();

        assert!(err.is_cancelled());
        // Attempts at t=0 and t=100ms; the 200ms backoff is interrupted.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn already_cancelled_never_runs_op() {
        let token = CancellationToken::new();
        token.cancel();
        let calls = AtomicU32::new(0);
        let err = with_retry(&policy(3), &CancelScope::new([token]), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, UploadError>(()) }
        })
        .await
        .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
