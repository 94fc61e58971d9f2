use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw per-candidate confidence scores from one detector run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResult {
    /// One score per model candidate anchor, in model output order.
    pub scores: Vec<f32>,
    /// Wall-clock time the inference finished.
    pub timestamp: DateTime<Utc>,
    /// Shape of the score output tensor, when the runtime reports one.
    pub output_shape: Option<Vec<i64>>,
}

impl DetectionResult {
    pub fn new(scores: Vec<f32>, output_shape: Option<Vec<i64>>) -> Self {
        Self {
            scores,
            timestamp: Utc::now(),
            output_shape,
        }
    }

    /// Highest finite score, or `None` when there are no finite scores.
    pub fn max_score(&self) -> Option<f32> {
        self.scores
            .iter()
            .copied()
            .filter(|s| s.is_finite())
            .fold(None, |best, s| match best {
                Some(b) if b >= s => Some(b),
                _ => Some(s),
            })
    }

    /// Number of candidates scoring at or above `threshold`.
    pub fn count_above(&self, threshold: f32) -> usize {
        self.scores.iter().filter(|&&s| s >= threshold).count()
    }
}
