//! Frame-rate gate in front of the detection pipeline.

use std::time::{Duration, Instant};

pub const DEFAULT_THROTTLE_INTERVAL: Duration = Duration::from_millis(500);

/// Lets at most one frame through per `interval`. Frames arriving early are
/// dropped, never queued.
#[derive(Debug, Clone)]
pub struct ThrottleGate {
    interval: Duration,
    last_processed: Option<Instant>,
}

impl ThrottleGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_processed: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns true if a frame arriving at `now` should be processed, and
    /// records `now` as the last processed instant when it does.
    pub fn try_pass(&mut self, now: Instant) -> bool {
        let pass = match self.last_processed {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        };
        if pass {
            self.last_processed = Some(now);
        }
        pass
    }

    pub fn reset(&mut self) {
        self.last_processed = None;
    }
}

impl Default for ThrottleGate {
    fn default() -> Self {
        Self::new(DEFAULT_THROTTLE_INTERVAL)
    }
}
