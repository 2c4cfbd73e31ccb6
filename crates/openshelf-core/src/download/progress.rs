//! Shared progress tracking for downloads.
//!
//! A `DownloadProgress` handle is cloned between the worker performing the
//! transfer and the UI tick that renders it. The worker records byte counts;
//! the UI reads snapshots. Cancellation rides on the same handle and is
//! observed by the worker at the next chunk boundary.

use crate::cancel::CancellationToken;
use crate::config::NetworkConfig;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Point-in-time view of a transfer.
#[derive(Debug, Clone, Default)]
pub struct ProgressSnapshot {
    pub bytes_downloaded: u64,
    pub total_bytes: Option<u64>,
    /// Average speed over the recent sample window, bytes per second.
    pub speed_bytes_per_sec: f64,
    /// 0-100 when the total is known.
    pub percent: Option<f64>,
    pub eta_seconds: Option<f64>,
}

impl ProgressSnapshot {
    /// One-line status text: size, percentage, speed, ETA.
    pub fn status_text(&self) -> String {
        let mut text = format_bytes(self.bytes_downloaded);
        if let Some(total) = self.total_bytes {
            text.push_str(&format!(" / {}", format_bytes(total)));
        }
        if let Some(percent) = self.percent {
            text.push_str(&format!(" ({percent:.0}%)"));
        }
        if self.speed_bytes_per_sec > 0.0 {
            text.push_str(&format!(" at {}/s", format_bytes(self.speed_bytes_per_sec as u64)));
        }
        if let Some(eta) = self.eta_seconds {
            text.push_str(&format!(", {}s left", eta.ceil() as u64));
        }
        text
    }
}

struct ProgressInner {
    bytes_downloaded: u64,
    total_bytes: Option<u64>,
    /// Recent `(instant, cumulative_bytes)` samples, capped at the window.
    samples: VecDeque<(Instant, u64)>,
}

/// Cloneable progress record with cooperative cancellation.
#[derive(Clone)]
pub struct DownloadProgress {
    inner: Arc<Mutex<ProgressInner>>,
    cancel: CancellationToken,
}

impl DownloadProgress {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ProgressInner {
                bytes_downloaded: 0,
                total_bytes: None,
                samples: VecDeque::with_capacity(NetworkConfig::SPEED_SAMPLE_WINDOW),
            })),
            cancel: CancellationToken::new(),
        }
    }

    /// Record cumulative progress after a chunk lands.
    pub fn record(&self, bytes_downloaded: u64, total_bytes: Option<u64>) {
        let mut inner = self.inner.lock().unwrap();
        inner.bytes_downloaded = bytes_downloaded;
        if total_bytes.is_some() {
            inner.total_bytes = total_bytes;
        }
        inner.samples.push_back((Instant::now(), bytes_downloaded));
        while inner.samples.len() > NetworkConfig::SPEED_SAMPLE_WINDOW {
            inner.samples.pop_front();
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let inner = self.inner.lock().unwrap();

        let speed = match (inner.samples.front(), inner.samples.back()) {
            (Some((t0, b0)), Some((t1, b1))) if t1 > t0 && b1 > b0 => {
                (b1 - b0) as f64 / (*t1 - *t0).as_secs_f64()
            }
            _ => 0.0,
        };

        let percent = inner.total_bytes.and_then(|total| {
            (total > 0).then(|| (inner.bytes_downloaded as f64 / total as f64) * 100.0)
        });

        let eta_seconds = inner.total_bytes.and_then(|total| {
            (speed > 0.0 && inner.bytes_downloaded < total)
                .then(|| (total - inner.bytes_downloaded) as f64 / speed)
        });

        ProgressSnapshot {
            bytes_downloaded: inner.bytes_downloaded,
            total_bytes: inner.total_bytes,
            speed_bytes_per_sec: speed,
            percent,
            eta_seconds,
        }
    }

    /// Stop the transfer at the next chunk boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl Default for DownloadProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Render a byte count with a binary unit suffix.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_percent_and_eta() {
        let progress = DownloadProgress::new();
        progress.record(0, Some(100));
        std::thread::sleep(std::time::Duration::from_millis(20));
        progress.record(50, Some(100));

        let snap = progress.snapshot();
        assert_eq!(snap.bytes_downloaded, 50);
        assert_eq!(snap.percent, Some(50.0));
        assert!(snap.speed_bytes_per_sec > 0.0);
        assert!(snap.eta_seconds.unwrap() > 0.0);
    }

    #[test]
    fn test_unknown_total() {
        let progress = DownloadProgress::new();
        progress.record(50, None);
        let snap = progress.snapshot();
        assert_eq!(snap.total_bytes, None);
        assert_eq!(snap.percent, None);
        assert_eq!(snap.eta_seconds, None);
    }

    #[test]
    fn test_sample_window_is_bounded() {
        let progress = DownloadProgress::new();
        for i in 0..50 {
            progress.record(i, Some(100));
        }
        let inner = progress.inner.lock().unwrap();
        assert!(inner.samples.len() <= NetworkConfig::SPEED_SAMPLE_WINDOW);
    }

    #[test]
    fn test_cancel_shared_across_clones() {
        let progress = DownloadProgress::new();
        let clone = progress.clone();
        clone.cancel();
        assert!(progress.is_cancelled());
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_status_text_mentions_progress() {
        let progress = DownloadProgress::new();
        progress.record(1024, Some(2048));
        let text = progress.snapshot().status_text();
        assert!(text.contains("1.0 KB"));
        assert!(text.contains("50%"));
    }
}
