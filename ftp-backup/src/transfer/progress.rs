//! Byte-level progress reporting for uploads.

use std::io::{self, Read};
use std::time::{Duration, Instant};
use tracing::info;

/// Progress information for a single transfer
#[derive(Debug, Clone)]
pub struct TransferProgress {
    /// Total bytes to transfer
    pub total_bytes: u64,

    /// Bytes transferred so far
    pub transferred_bytes: u64,

    /// Percentage complete (0-100)
    pub percent_complete: f64,
}

impl TransferProgress {
    pub fn new(total_bytes: u64) -> Self {
        Self {
            total_bytes,
            transferred_bytes: 0,
            percent_complete: 0.0,
        }
    }

    /// Record `bytes` more transferred
    pub fn advance(&mut self, bytes: u64) {
        self.transferred_bytes += bytes;
        self.percent_complete = if self.total_bytes > 0 {
            (self.transferred_bytes as f64 / self.total_bytes as f64) * 100.0
        } else {
            0.0
        };
    }
}

/// Reader wrapper that logs transfer progress at a bounded rate.
pub struct ProgressReader<R> {
    inner: R,
    label: String,
    progress: TransferProgress,
    started: Instant,
    last_report: Instant,
    report_interval: Duration,
}

impl<R: Read> ProgressReader<R> {
    pub fn new(inner: R, total_bytes: u64, label: impl Into<String>) -> Self {
        let now = Instant::now();
        Self {
            inner,
            label: label.into(),
            progress: TransferProgress::new(total_bytes),
            started: now,
            last_report: now,
            report_interval: Duration::from_secs(5),
        }
    }

    /// Average speed since the first read, in bytes per second
    pub fn average_speed(&self) -> u64 {
        let elapsed = self.started.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            (self.progress.transferred_bytes as f64 / elapsed) as u64
        } else {
            0
        }
    }

    fn report(&mut self) {
        info!(
            file = %self.label,
            "Uploaded {} of {} ({:.1}%) at {}",
            format_bytes(self.progress.transferred_bytes),
            format_bytes(self.progress.total_bytes),
            self.progress.percent_complete,
            format_speed(self.average_speed())
        );
        self.last_report = Instant::now();
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.progress.advance(n as u64);
        if n > 0 && self.last_report.elapsed() >= self.report_interval {
            self.report();
        }
        Ok(n)
    }
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

/// Format speed as human-readable string
pub fn format_speed(bytes_per_second: u64) -> String {
    format!("{}/s", format_bytes(bytes_per_second))
}

/// Format duration as human-readable string
pub fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    }
}
