//! Per-upload configuration.
//!
//! [`UploadConfig`] is the resolved, immutable configuration of one upload
//! attempt. Callers override individual fields through
//! [`UploadConfigOverrides`], which also forms the `[upload]` table of the CLI
//! config file.

use std::time::Duration;

use mediaferry_transfer::{
    CHUNKING_THRESHOLD, DEFAULT_ALLOWED_EXTENSIONS, DEFAULT_CHUNK_SIZE, RetryPolicy,
};
use serde::{Deserialize, Serialize};

/// Resolved upload configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadConfig {
    /// Largest accepted file, in bytes.
    pub max_file_size: u64,
    /// Chunk size requested from the server.
    pub chunk_size_bytes: u64,
    pub max_retries: u32,
    /// Per network operation, not per upload. 0 disables the client-side limit.
    pub timeout_ms: u64,
    pub chunking_enabled: bool,
    pub resume_enabled: bool,
    /// Files at or above this size are chunked.
    pub chunking_threshold: u64,
    /// Lower-case extensions without the dot; empty accepts anything.
    pub allowed_extensions: Vec<String>,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_factor: f64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: 5 * 1024 * 1024 * 1024,
            chunk_size_bytes: DEFAULT_CHUNK_SIZE,
            max_retries: 3,
            timeout_ms: 30_000,
            chunking_enabled: true,
            resume_enabled: true,
            chunking_threshold: CHUNKING_THRESHOLD,
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            backoff_factor: 2.0,
        }
    }
}

impl UploadConfig {
    /// Returns a copy with every set field of `overrides` applied.
    ///
    /// A zero chunk size falls back to [`DEFAULT_CHUNK_SIZE`].
    pub fn merged(&self, overrides: &UploadConfigOverrides) -> Self {
        let mut c = self.clone();
        if let Some(v) = overrides.max_file_size {
            c.max_file_size = v;
        }
        if let Some(v) = overrides.chunk_size_bytes {
            c.chunk_size_bytes = v;
        }
        if let Some(v) = overrides.max_retries {
            c.max_retries = v;
        }
        if let Some(v) = overrides.timeout_ms {
            c.timeout_ms = v;
        }
        if let Some(v) = overrides.chunking_enabled {
            c.chunking_enabled = v;
        }
        if let Some(v) = overrides.resume_enabled {
            c.resume_enabled = v;
        }
        if let Some(v) = overrides.chunking_threshold {
            c.chunking_threshold = v;
        }
        if let Some(v) = &overrides.allowed_extensions {
            c.allowed_extensions = v
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect();
        }
        if let Some(v) = overrides.base_delay_ms {
            c.base_delay_ms = v;
        }
        if let Some(v) = overrides.max_delay_ms {
            c.max_delay_ms = v;
        }
        if let Some(v) = overrides.backoff_factor {
            c.backoff_factor = v;
        }
        if c.chunk_size_bytes == 0 {
            c.chunk_size_bytes = DEFAULT_CHUNK_SIZE;
        }
        c
    }

    /// Backoff policy for chunk sends.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            backoff_factor: self.backoff_factor,
        }
    }

    /// Per-operation timeout, `None` when disabled.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

/// Caller-supplied overrides; unset fields keep the defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_file_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunking_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunking_threshold: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_extensions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_delay_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_delay_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff_factor: Option<f64>,
}
