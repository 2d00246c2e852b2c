use std::time::{Duration, Instant};

use mediaferry_protocol::types::{UploadProgress, UploadStatus};

/// Minimum age of a throughput window before it is folded into a reading.
const WINDOW_REFRESH: Duration = Duration::from_secs(1);

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

// ---------------------------------------------------------------------------
// ThroughputWindow
// ---------------------------------------------------------------------------

/// Rolling throughput estimate refreshed at most once per `refresh` interval.
///
/// Bytes accumulate in the open window; once it is at least `refresh` old the
/// reading is replaced and a new window starts. Readings in between stay
/// stable, which keeps instantaneous spikes out of the UI.
#[derive(Debug, Clone)]
pub struct ThroughputWindow {
    refresh: Duration,
    window_start: Instant,
    window_bytes: u64,
    reading: Option<f64>,
}

impl ThroughputWindow {
    /// Opens the first window at `now`. `refresh` defaults to one second.
    pub fn new(now: Instant, refresh: Option<Duration>) -> Self {
        Self {
            refresh: refresh.unwrap_or(WINDOW_REFRESH),
            window_start: now,
            window_bytes: 0,
            reading: None,
        }
    }

    /// Adds `bytes` transferred, observed at `now`.
    pub fn add_sample(&mut self, bytes: u64, now: Instant) {
        self.window_bytes = self.window_bytes.saturating_add(bytes);
        let age = now.saturating_duration_since(self.window_start);
        if age >= self.refresh && !age.is_zero() {
            self.reading = Some(self.window_bytes as f64 / age.as_secs_f64());
            self.window_start = now;
            self.window_bytes = 0;
        }
    }

    /// Latest reading in bytes/second; 0.0 until the first window closes.
    pub fn bytes_per_second(&self) -> f64 {
        self.reading.unwrap_or(0.0)
    }

    /// Forgets the reading and reopens the window at `now`.
    pub fn reset(&mut self, now: Instant) {
        self.window_start = now;
        self.window_bytes = 0;
        self.reading = None;
    }
}

// ---------------------------------------------------------------------------
// ProgressTelemetry
// ---------------------------------------------------------------------------

/// Turns byte and chunk counters into [`UploadProgress`] snapshots.
///
/// Advisory only: it owns no I/O and never influences the transfer loop.
#[derive(Debug, Clone)]
pub struct ProgressTelemetry {
    total_bytes: u64,
    total_chunks: u32,
    bytes_uploaded: u64,
    chunks_completed: u32,
    /// Bytes already on the server when this attempt began (resume).
    baseline_bytes: u64,
    started_at: Instant,
    window: ThroughputWindow,
    status: UploadStatus,
}

impl ProgressTelemetry {
    /// Starts tracking an attempt at the current instant.
    pub fn new(total_bytes: u64, total_chunks: u32, status: UploadStatus) -> Self {
        Self::starting_at(total_bytes, total_chunks, status, Instant::now())
    }

    /// Starts tracking an attempt at `now`.
    pub fn starting_at(
        total_bytes: u64,
        total_chunks: u32,
        status: UploadStatus,
        now: Instant,
    ) -> Self {
        Self {
            total_bytes,
            total_chunks,
            bytes_uploaded: 0,
            chunks_completed: 0,
            baseline_bytes: 0,
            started_at: now,
            window: ThroughputWindow::new(now, None),
            status,
        }
    }

    /// Credits bytes and chunks the server already holds. They count towards
    /// the percentage but not towards this attempt's throughput.
    pub fn with_baseline(mut self, bytes: u64, chunks: u32) -> Self {
        self.baseline_bytes = bytes.min(self.total_bytes);
        self.bytes_uploaded = self.baseline_bytes;
        self.chunks_completed = chunks.min(self.total_chunks);
        self
    }

    /// Records an acknowledged chunk of `bytes` and returns the new snapshot.
    pub fn record_chunk(&mut self, bytes: u64) -> UploadProgress {
        self.record_chunk_at(bytes, Instant::now())
    }

    pub fn record_chunk_at(&mut self, bytes: u64, now: Instant) -> UploadProgress {
        self.chunks_completed = self.chunks_completed.saturating_add(1).min(self.total_chunks);
        self.record_bytes_at(bytes, now)
    }

    /// Records transport-level bytes without completing a chunk.
    pub fn record_bytes(&mut self, bytes: u64) -> UploadProgress {
        self.record_bytes_at(bytes, Instant::now())
    }

    pub fn record_bytes_at(&mut self, bytes: u64, now: Instant) -> UploadProgress {
        self.bytes_uploaded = self.bytes_uploaded.saturating_add(bytes).min(self.total_bytes);
        self.window.add_sample(bytes, now);
        self.snapshot_at(now)
    }

    /// Moves to a new status (e.g. `completed` or `failed`) and snapshots.
    pub fn finish(&mut self, status: UploadStatus) -> UploadProgress {
        self.status = status;
        if status == UploadStatus::Completed {
            self.bytes_uploaded = self.total_bytes;
            self.chunks_completed = self.total_chunks;
        }
        self.snapshot_at(Instant::now())
    }

    /// Seconds since the attempt began.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn chunks_completed(&self) -> u32 {
        self.chunks_completed
    }

    pub fn bytes_uploaded(&self) -> u64 {
        self.bytes_uploaded
    }

    /// Builds a snapshot as of `now` without recording anything.
    pub fn snapshot_at(&self, now: Instant) -> UploadProgress {
        let percentage = if self.total_bytes == 0 {
            if self.status == UploadStatus::Completed {
                100.0
            } else {
                0.0
            }
        } else {
            self.bytes_uploaded as f64 / self.total_bytes as f64 * 100.0
        };

        let elapsed = now.saturating_duration_since(self.started_at).as_secs_f64();
        let moved = self.bytes_uploaded - self.baseline_bytes;
        let average = if elapsed > 0.0 {
            moved as f64 / elapsed
        } else {
            0.0
        };
        let remaining = self.total_bytes - self.bytes_uploaded;
        let eta_seconds = if average > 0.0 {
            (remaining as f64 / average).max(0.0)
        } else {
            0.0
        };

        UploadProgress {
            percentage,
            bytes_uploaded: self.bytes_uploaded,
            total_bytes: self.total_bytes,
            chunks_completed: self.chunks_completed,
            total_chunks: self.total_chunks,
            throughput_mbps: self.window.bytes_per_second() / BYTES_PER_MB,
            eta_seconds,
            status: self.status,
        }
    }
}
