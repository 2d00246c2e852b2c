//! Terminal progress bar fed by upload progress ticks.

use indicatif::{ProgressBar, ProgressStyle};
use mediaferry_protocol::UploadProgress;

/// Upload progress display.
#[derive(Clone)]
pub struct UploadBar {
    bar: ProgressBar,
}

impl UploadBar {
    pub fn new(total_bytes: u64, filename: &str) -> Self {
        let bar = ProgressBar::new(total_bytes);
        let style = ProgressStyle::default_bar()
            .template("{msg}\n[{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        bar.set_style(style);
        bar.set_message(format!("Uploading: {filename}"));
        Self { bar }
    }

    /// Applies one tick.
    pub fn update(&self, p: &UploadProgress) {
        self.bar.set_position(p.bytes_uploaded);
        self.bar.set_message(format!(
            "{} chunks {}/{}, {}/s",
            p.status.as_str(),
            p.chunks_completed,
            p.total_chunks,
            format_bytes((p.throughput_mbps * 1024.0 * 1024.0) as u64)
        ));
    }

    pub fn finish_with_message(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }

    /// Leaves the bar where it stopped (for errors).
    pub fn abandon_with_message(&self, msg: String) {
        self.bar.abandon_with_message(msg);
    }
}

/// Formats bytes in human-readable binary units.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    format!("{size:.2} {}", UNITS[unit_idx])
}
