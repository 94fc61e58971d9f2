//! Auto-capture state machine.
//!
//! Decides when a detection result should trigger a photo capture. The
//! controller owns every "capture in flight" decision; callers report the
//! capture outcome back through [`AutoCapture::capture_succeeded`] or
//! [`AutoCapture::capture_failed`].

use crate::types::DetectionResult;
use std::time::{Duration, Instant};
use thiserror::Error;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.75;
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(4000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Capturing { manual: bool },
    /// An automatic capture succeeded recently. Left lazily, on the next
    /// qualifying detection after the window elapses.
    Cooldown,
}

/// Instruction to take a photo now.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureTrigger {
    pub manual: bool,
    /// Max score that caused an automatic trigger.
    pub score: Option<f32>,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureRejected {
    #[error("a capture is already in progress")]
    CaptureInFlight,
    #[error("an upload is in progress")]
    UploadInFlight,
}

#[derive(Debug, Clone, Copy)]
pub struct CaptureConfig {
    pub threshold: f32,
    pub cooldown: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            cooldown: DEFAULT_COOLDOWN,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AutoCapture {
    config: CaptureConfig,
    state: CaptureState,
    last_capture_at: Option<Instant>,
}

impl AutoCapture {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            state: CaptureState::Idle,
            last_capture_at: None,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn is_capturing(&self) -> bool {
        matches!(self.state, CaptureState::Capturing { .. })
    }

    pub fn last_capture_at(&self) -> Option<Instant> {
        self.last_capture_at
    }

    fn cooldown_elapsed(&self, now: Instant) -> bool {
        match self.last_capture_at {
            None => true,
            Some(at) => now.saturating_duration_since(at) >= self.config.cooldown,
        }
    }

    /// Feed one detection result. Returns a trigger when a capture should
    /// start; the controller is then in `Capturing`.
    pub fn on_detection(
        &mut self,
        result: &DetectionResult,
        now: Instant,
        upload_busy: bool,
    ) -> Option<CaptureTrigger> {
        let score = result.max_score()?;
        if score < self.config.threshold {
            return None;
        }

        if self.is_capturing() {
            return None;
        }
        // Checked in every state: a failed manual capture can leave `Idle`
        // while an automatic window is still open.
        if !self.cooldown_elapsed(now) {
            tracing::trace!(score, "qualifying detection during cooldown");
            return None;
        }
        self.state = CaptureState::Idle;

        if upload_busy {
            tracing::debug!(score, "qualifying detection ignored: upload in flight");
            return None;
        }

        tracing::debug!(score, threshold = self.config.threshold, "auto-capture triggered");
        self.state = CaptureState::Capturing { manual: false };
        Some(CaptureTrigger {
            manual: false,
            score: Some(score),
        })
    }

    /// User-triggered capture: skips threshold and cooldown, but never
    /// overlaps another capture or an upload.
    pub fn request_manual(
        &mut self,
        now: Instant,
        upload_busy: bool,
    ) -> Result<CaptureTrigger, CaptureRejected> {
        tracing::debug!(
            in_cooldown = !self.cooldown_elapsed(now),
            upload_busy,
            "manual capture requested"
        );
        if self.is_capturing() {
            return Err(CaptureRejected::CaptureInFlight);
        }
        if upload_busy {
            return Err(CaptureRejected::UploadInFlight);
        }
        self.state = CaptureState::Capturing { manual: true };
        Ok(CaptureTrigger {
            manual: true,
            score: None,
        })
    }

    /// The triggered capture produced a photo.
    pub fn capture_succeeded(&mut self, now: Instant) {
        match self.state {
            CaptureState::Capturing { manual: false } => {
                self.last_capture_at = Some(now);
                self.state = CaptureState::Cooldown;
            }
            CaptureState::Capturing { manual: true } => {
                self.state = if self.cooldown_elapsed(now) {
                    CaptureState::Idle
                } else {
                    CaptureState::Cooldown
                };
            }
            other => {
                tracing::warn!(state = ?other, "capture success reported with no capture in flight");
            }
        }
    }

    /// The triggered capture failed. No cooldown is charged.
    pub fn capture_failed(&mut self) {
        if self.is_capturing() {
            self.state = CaptureState::Idle;
        } else {
            tracing::warn!(state = ?self.state, "capture failure reported with no capture in flight");
        }
    }
}

impl Default for AutoCapture {
    fn default() -> Self {
        Self::new(CaptureConfig::default())
    }
}
