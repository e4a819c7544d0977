//! Throughput and ETA estimation for long batch runs.

use std::time::{Duration, Instant};

/// Width of the estimation window. Counts older than this stop influencing
/// the speed figure, so the estimate tracks the current service latency
/// instead of averaging over the whole run.
const WINDOW: Duration = Duration::from_secs(30);

/// Instantaneous items-per-second estimate with a decaying window.
///
/// Call [`update`](Self::update) after each completed batch with the total
/// processed count; timestamps are passed in explicitly so tests can drive
/// the clock.
#[derive(Debug, Clone)]
pub struct SpeedTracker {
    window_start: Instant,
    window_count: usize,
    speed: f64,
}

impl SpeedTracker {
    pub fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            window_count: 0,
            speed: 0.0,
        }
    }

    /// Record that `processed` items are done as of `now`.
    pub fn update(&mut self, processed: usize, now: Instant) {
        let mut elapsed = now.saturating_duration_since(self.window_start);
        let delta = processed.saturating_sub(self.window_count);

        if elapsed > WINDOW {
            // Window expired: restart it here, but still rate the delta
            // over a full window rather than over the whole gap.
            self.window_start = now;
            self.window_count = processed;
            elapsed = WINDOW;
        }

        if !elapsed.is_zero() {
            self.speed = delta as f64 / elapsed.as_secs_f64();
        }
    }

    /// Current estimate in items per second.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Estimated time remaining, if the speed estimate allows one.
    pub fn eta(&self, remaining: usize) -> Option<Duration> {
        if self.speed > 0.0 && remaining > 0 {
            Some(Duration::from_secs_f64(remaining as f64 / self.speed))
        } else {
            None
        }
    }
}

/// Format an ETA as `HH:MM:SS`, or `--:--:--` when unknown.
pub fn format_eta(eta: Option<Duration>) -> String {
    match eta {
        Some(d) => {
            let total = d.as_secs();
            format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
        }
        None => "--:--:--".to_string(),
    }
}
