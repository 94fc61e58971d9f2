//! Five-direction face registration session.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DIRECTION_COUNT: usize = 5;

/// Head pose requested for one registration photo, in capture order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaceDirection {
    Front,
    Up,
    Down,
    Left,
    Right,
}

impl FaceDirection {
    pub const ALL: [FaceDirection; DIRECTION_COUNT] = [
        FaceDirection::Front,
        FaceDirection::Up,
        FaceDirection::Down,
        FaceDirection::Left,
        FaceDirection::Right,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn title(self) -> &'static str {
        match self {
            FaceDirection::Front => "Front",
            FaceDirection::Up => "Look Up",
            FaceDirection::Down => "Look Down",
            FaceDirection::Left => "Turn Left",
            FaceDirection::Right => "Turn Right",
        }
    }

    pub fn instruction(self) -> &'static str {
        match self {
            FaceDirection::Front => "Look straight at camera",
            FaceDirection::Up => "Tilt your head up",
            FaceDirection::Down => "Tilt your head down",
            FaceDirection::Left => "Turn your face left",
            FaceDirection::Right => "Turn your face right",
        }
    }
}

/// One photo per [`FaceDirection`], captured step by step.
#[derive(Debug, Clone, Default)]
pub struct CaptureSession {
    photos: [Option<PathBuf>; DIRECTION_COUNT],
    step: usize,
}

impl CaptureSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn current_direction(&self) -> FaceDirection {
        FaceDirection::ALL[self.step]
    }

    pub fn photo(&self, direction: FaceDirection) -> Option<&PathBuf> {
        self.photos[direction.index()].as_ref()
    }

    /// Store a photo for the current direction and move to the next step.
    /// The step stays on the last direction once reached.
    pub fn record(&mut self, handle: PathBuf) {
        tracing::debug!(
            direction = self.current_direction().title(),
            path = %handle.display(),
            "registration photo captured"
        );
        self.photos[self.step] = Some(handle);
        if self.step < DIRECTION_COUNT - 1 {
            self.step += 1;
        }
    }

    /// Move back one step. Returns false at the first step.
    pub fn previous(&mut self) -> bool {
        if self.step > 0 {
            self.step -= 1;
            true
        } else {
            false
        }
    }

    /// Discard the current direction's photo, returning it if there was one.
    pub fn retake(&mut self) -> Option<PathBuf> {
        self.photos[self.step].take()
    }

    pub fn captured_count(&self) -> usize {
        self.photos.iter().filter(|p| p.is_some()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.captured_count() == DIRECTION_COUNT
    }

    pub fn completed_steps(&self) -> [bool; DIRECTION_COUNT] {
        std::array::from_fn(|i| self.photos[i].is_some())
    }

    /// All handles in direction order, once every direction is captured.
    pub fn handles(&self) -> Option<[PathBuf; DIRECTION_COUNT]> {
        if !self.is_complete() {
            return None;
        }
        let mut out: [PathBuf; DIRECTION_COUNT] = Default::default();
        for (slot, photo) in out.iter_mut().zip(self.photos.iter()) {
            *slot = photo.clone()?;
        }
        Some(out)
    }
}
