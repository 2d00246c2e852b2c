//! Single-request transfer path for files below the chunking threshold.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use mediaferry_protocol::UploadStatus;
use mediaferry_transfer::{ProgressTelemetry, UploadTarget};
use tracing::{debug, info};

use crate::api::{BytesSentCallback, UploadApi, WholeFilePayload, with_timeout};
use crate::cancel::CancelScope;
use crate::error::UploadError;
use crate::types::ProgressCallback;

/// Uploads `target` in one multipart request and returns the server's JSON.
///
/// Never retried here: a retryable failure is still surfaced once, and the
/// caller decides whether to try again. Progress ticks follow the bytes the
/// transport has handed off.
pub async fn send_whole(
    api: &dyn UploadApi,
    target: &dyn UploadTarget,
    project_id: Option<String>,
    timeout: Option<Duration>,
    on_progress: Option<&ProgressCallback>,
    cancel: &CancelScope,
) -> Result<serde_json::Value, UploadError> {
    cancel.check()?;
    let size = target.size();
    let data = target.read_range(0, size).await?;

    let telemetry = Arc::new(Mutex::new(ProgressTelemetry::new(
        size,
        1,
        UploadStatus::Uploading,
    )));
    let on_sent: BytesSentCallback = {
        let telemetry = telemetry.clone();
        let on_progress = on_progress.cloned();
        Arc::new(move |bytes: u64| {
            let tick = match telemetry.lock() {
                Ok(mut t) => t.record_bytes(bytes),
                Err(_) => return,
            };
            if let Some(cb) = &on_progress {
                cb(&tick);
            }
        })
    };

    let payload = WholeFilePayload {
        filename: target.name().to_string(),
        data,
        project_id,
    };
    debug!(file = %payload.filename, bytes = size, "sending whole file");

    let result = cancel
        .race(with_timeout(timeout, api.upload_whole(payload, on_sent)))
        .await;

    let status = match &result {
        Ok(_) => Some(UploadStatus::Completed),
        Err(e) if e.is_cancelled() => None,
        Err(_) => Some(UploadStatus::Failed),
    };
    if let Some(status) = status {
        let tick = match telemetry.lock() {
            Ok(mut t) => Some(t.finish(status)),
            Err(_) => None,
        };
        if let (Some(tick), Some(cb)) = (tick, on_progress) {
            cb(&tick);
        }
    }

    if result.is_ok() {
        info!(file = %target.name(), bytes = size, "single-request upload complete");
    }
    result
}

#[cfg(test)]
mod tests {
    use mediaferry_protocol::UploadProgress;
    use mediaferry_transfer::MemoryTarget;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::error::ErrorCode;
    use crate::mock::MockApi;

    fn recorder() -> (ProgressCallback, Arc<Mutex<Vec<UploadProgress>>>) {
        let ticks = Arc::new(Mutex::new(Vec::new()));
        let sink = ticks.clone();
        let cb: ProgressCallback = Arc::new(move |p: &UploadProgress| {
            sink.lock().unwrap().push(p.clone());
        });
        (cb, ticks)
    }

    #[tokio::test]
    async fn returns_server_payload_and_reports_bytes() {
        let api = MockApi::new().with_whole_response(serde_json::json!({"id": "v-1"}));
        let target = MemoryTarget::new("clip.mp4", vec![3u8; 200 * 1024]);
        let (cb, ticks) = recorder();

        let v = send_whole(
            &api,
            &target,
            Some("proj".into()),
            None,
            Some(&cb),
            &CancelScope::default(),
        )
        .await
        .unwrap();
        assert_eq!(v["id"], "v-1");

        let calls = api.whole_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].filename, "clip.mp4");
        assert_eq!(calls[0].project_id.as_deref(), Some("proj"));
        assert_eq!(calls[0].len, 200 * 1024);

        let ticks = ticks.lock().unwrap();
        assert!(ticks.len() > 1);
        assert!(
            ticks
                .windows(2)
                .all(|w| w[1].bytes_uploaded >= w[0].bytes_uploaded)
        );
        let last = ticks.last().unwrap();
        assert_eq!(last.status, UploadStatus::Completed);
        assert_eq!(last.percentage, 100.0);
    }

    #[tokio::test]
    async fn network_drop_is_surfaced_once() {
        let api = MockApi::new().fail_whole(UploadError::network("connection reset"));
        let target = MemoryTarget::new("clip.mp4", vec![0u8; 1024]);
        let (cb, ticks) = recorder();

        let err = send_whole(&api, &target, None, None, Some(&cb), &CancelScope::default())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NetworkError);
        assert!(err.retryable);
        assert_eq!(api.whole_calls().len(), 1);
        assert_eq!(ticks.lock().unwrap().last().unwrap().status, UploadStatus::Failed);
    }

    #[tokio::test]
    async fn cancelled_before_send() {
        let api = MockApi::new();
        let target = MemoryTarget::new("clip.mp4", vec![0u8; 16]);
        let token = CancellationToken::new();
        token.cancel();

        let err = send_whole(&api, &target, None, None, None, &CancelScope::new([token]))
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(api.whole_calls().is_empty());
    }
}
