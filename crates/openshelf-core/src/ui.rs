//! UI feedback plumbing: per-operation progress state and redraw throttling.

use std::time::{Duration, Instant};

/// Progress record for one asynchronous operation.
///
/// Progress is clamped to 0..=100 and never moves backwards while the
/// operation is active; `finish` is the only way to reset it.
#[derive(Debug, Clone, Default)]
pub struct UiState {
    pub is_active: bool,
    pub progress: u8,
    pub status_message: String,
    pub last_update: Option<Instant>,
    pub start_time: Option<Instant>,
}

impl UiState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the operation started.
    pub fn begin(&mut self, message: &str) {
        let now = Instant::now();
        self.is_active = true;
        self.progress = 0;
        self.status_message = message.to_string();
        self.start_time = Some(now);
        self.last_update = Some(now);
    }

    /// Advance progress. Regressions are ignored, values above 100 clamp.
    pub fn update(&mut self, progress: u8, message: &str) {
        if !self.is_active {
            return;
        }
        self.progress = self.progress.max(progress.min(100));
        self.status_message = message.to_string();
        self.last_update = Some(Instant::now());
    }

    /// Terminal transition. `final_progress` is 100 on success, 0 otherwise.
    pub fn finish(&mut self, final_progress: u8, message: &str) {
        self.is_active = false;
        self.progress = final_progress.min(100);
        self.status_message = message.to_string();
        self.last_update = Some(Instant::now());
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.start_time.map(|t| t.elapsed())
    }
}

/// Minimum-interval gate for UI refreshes.
#[derive(Debug)]
pub struct ResponsiveTimer {
    interval: Duration,
    last_redraw: Option<Instant>,
}

impl ResponsiveTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_redraw: None,
        }
    }

    /// True at most once per interval. The first call always passes.
    pub fn should_redraw(&mut self) -> bool {
        let now = Instant::now();
        match self.last_redraw {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last_redraw = Some(now);
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.last_redraw = None;
    }
}
