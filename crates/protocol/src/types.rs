use serde::{Deserialize, Serialize};

/// Lifecycle state reported with each progress tick and by the status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadStatus {
    #[serde(rename = "uploading")]
    Uploading,
    #[serde(rename = "paused")]
    Paused,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "failed")]
    Failed,
    #[serde(rename = "resuming")]
    Resuming,
}

impl UploadStatus {
    /// Returns `true` once no further bytes will move for this upload.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Wire name of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uploading => "uploading",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Resuming => "resuming",
        }
    }
}

impl std::fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of an upload's progress.
///
/// Recomputed on every tick and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadProgress {
    /// 0.0–100.0.
    pub percentage: f64,
    pub bytes_uploaded: u64,
    pub total_bytes: u64,
    pub chunks_completed: u32,
    pub total_chunks: u32,
    #[serde(rename = "throughput_MBps")]
    pub throughput_mbps: f64,
    pub eta_seconds: f64,
    pub status: UploadStatus,
}

impl UploadProgress {
    /// Bytes still to be acknowledged.
    pub fn remaining_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.bytes_uploaded)
    }
}
