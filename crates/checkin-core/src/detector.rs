//! Face-presence scoring via ONNX Runtime.
//!
//! The detector model produces two outputs per run: box-like regression data
//! (output 0) and per-candidate confidence scores (output 1). Only the scores
//! drive auto-capture; boxes are kept for diagnostics.

use crate::assets::{AssetError, ModelAssets};
use crate::transform::FrameTensor;
use crate::types::DetectionResult;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const BOXES_OUTPUT: usize = 0;
const SCORES_OUTPUT: usize = 1;
const INTRA_THREADS: usize = 2;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model assets unavailable: {0}")]
    Assets(#[from] AssetError),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Raw tensors from one model run.
#[derive(Debug, Clone, Default)]
pub struct ModelOutput {
    pub boxes: Vec<f32>,
    pub scores: Vec<f32>,
    pub scores_shape: Option<Vec<i64>>,
}

/// A loaded model that scores a preprocessed frame.
pub trait ScoreModel: Send {
    fn infer(&mut self, input: &FrameTensor) -> Result<ModelOutput, DetectorError>;
}

/// BlazeFace-style detector session.
pub struct OnnxFaceDetector {
    session: Session,
}

impl OnnxFaceDetector {
    /// Build a session from materialized model assets.
    pub fn load(assets: &ModelAssets) -> Result<Self, DetectorError> {
        let session = Session::builder()?
            .with_intra_threads(INTRA_THREADS)?
            .commit_from_file(&assets.graph)?;

        let output_names: Vec<String> = session.outputs().iter().map(|o| o.name().to_string()).collect();

        tracing::info!(
            path = %assets.graph.display(),
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?output_names,
            "loaded face detection model"
        );

        if output_names.len() <= SCORES_OUTPUT {
            return Err(DetectorError::InferenceFailed(format!(
                "detector model requires at least 2 outputs (boxes, scores), got {}",
                output_names.len()
            )));
        }

        Ok(Self { session })
    }
}

impl ScoreModel for OnnxFaceDetector {
    fn infer(&mut self, input: &FrameTensor) -> Result<ModelOutput, DetectorError> {
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.data.view())?])?;

        let (_, boxes) = outputs[BOXES_OUTPUT]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("boxes: {e}")))?;
        let (shape, scores) = outputs[SCORES_OUTPUT]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("scores: {e}")))?;

        Ok(ModelOutput {
            boxes: boxes.to_vec(),
            scores: scores.to_vec(),
            scores_shape: Some(shape.to_vec()),
        })
    }
}

impl Drop for OnnxFaceDetector {
    fn drop(&mut self) {
        tracing::debug!("releasing face detection session");
    }
}

/// Owns the detector session for the lifetime of one capture flow.
///
/// The model is checked out while an inference call is running. A frame that
/// arrives in the meantime finds the slot empty and is dropped.
pub struct InferenceAdapter<M> {
    slot: Option<M>,
    enabled: bool,
}

impl<M: ScoreModel> InferenceAdapter<M> {
    pub fn new(model: M) -> Self {
        Self {
            slot: Some(model),
            enabled: true,
        }
    }

    /// An adapter with no model: every frame is dropped.
    pub fn disabled() -> Self {
        Self {
            slot: None,
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// True while a checked-out model has not been returned.
    pub fn is_in_flight(&self) -> bool {
        self.enabled && self.slot.is_none()
    }

    /// Whether a new frame would be accepted right now.
    pub fn is_ready(&self) -> bool {
        self.slot.is_some()
    }

    /// Take the model for one inference call. `None` if disabled or a call
    /// is already in flight.
    pub fn checkout(&mut self) -> Option<M> {
        self.slot.take()
    }

    /// Return the model after an inference call.
    pub fn checkin(&mut self, model: M) {
        debug_assert!(self.slot.is_none(), "checkin without checkout");
        if self.enabled {
            self.slot = Some(model);
        }
    }

    /// Run inference synchronously if the model is available.
    pub fn detect(&mut self, input: &FrameTensor) -> Option<DetectionResult> {
        let mut model = self.checkout()?;
        let result = run_inference(&mut model, input);
        self.checkin(model);
        result
    }
}

impl InferenceAdapter<OnnxFaceDetector> {
    /// Materialize the model assets and open a session. Any failure leaves
    /// detection disabled for this adapter.
    pub fn open(model_dir: &Path, file_name: &str, weights_source: Option<&Path>) -> Self {
        let loaded = ModelAssets::materialize(model_dir, file_name, weights_source)
            .map_err(DetectorError::from)
            .and_then(|assets| OnnxFaceDetector::load(&assets));

        match loaded {
            Ok(detector) => Self::new(detector),
            Err(e) => {
                tracing::error!(error = %e, "face detection disabled: model could not be loaded");
                Self::disabled()
            }
        }
    }
}

/// Run one inference call. Errors are logged and treated as no detection.
pub fn run_inference<M: ScoreModel>(model: &mut M, input: &FrameTensor) -> Option<DetectionResult> {
    match model.infer(input) {
        Ok(output) => {
            tracing::trace!(
                candidates = output.scores.len(),
                box_values = output.boxes.len(),
                "inference complete"
            );
            Some(DetectionResult::new(output.scores, output.scores_shape))
        }
        Err(e) => {
            tracing::warn!(error = %e, "inference error; treating frame as no detection");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{frame_to_tensor, TransformConfig};

    struct FixedModel {
        scores: Vec<f32>,
        calls: usize,
    }

    impl ScoreModel for FixedModel {
        fn infer(&mut self, _input: &FrameTensor) -> Result<ModelOutput, DetectorError> {
            self.calls += 1;
            Ok(ModelOutput {
                boxes: vec![0.0; self.scores.len() * 4],
                scores: self.scores.clone(),
                scores_shape: Some(vec![1, self.scores.len() as i64, 1]),
            })
        }
    }

    struct FailingModel;

    impl ScoreModel for FailingModel {
        fn infer(&mut self, _input: &FrameTensor) -> Result<ModelOutput, DetectorError> {
            Err(DetectorError::InferenceFailed("shape mismatch".into()))
        }
    }

    fn tensor() -> FrameTensor {
        let rgb = vec![100u8; 8 * 8 * 3];
        let cfg = TransformConfig { width: 4, height: 4, ..TransformConfig::default() };
        frame_to_tensor(&rgb, 8, 8, &cfg).unwrap()
    }

    #[test]
    fn test_detect_returns_scores() {
        let mut adapter = InferenceAdapter::new(FixedModel { scores: vec![0.1, 0.8], calls: 0 });
        let result = adapter.detect(&tensor()).unwrap();
        assert_eq!(result.scores, vec![0.1, 0.8]);
        assert_eq!(result.output_shape, Some(vec![1, 2, 1]));
        assert!(adapter.is_ready());
    }

    #[test]
    fn test_checkout_while_in_flight_drops_frame() {
        let mut adapter = InferenceAdapter::new(FixedModel { scores: vec![0.5], calls: 0 });
        let model = adapter.checkout().unwrap();
        assert!(adapter.is_in_flight());
        assert!(adapter.checkout().is_none());
        assert!(adapter.detect(&tensor()).is_none());

        adapter.checkin(model);
        assert!(!adapter.is_in_flight());
        assert!(adapter.detect(&tensor()).is_some());
    }

    #[test]
    fn test_inference_error_is_no_detection() {
        let mut adapter = InferenceAdapter::new(FailingModel);
        assert!(adapter.detect(&tensor()).is_none());
        // Adapter keeps working after an error
        assert!(adapter.is_ready());
    }

    #[test]
    fn test_disabled_adapter_never_detects() {
        let mut adapter: InferenceAdapter<FixedModel> = InferenceAdapter::disabled();
        assert!(!adapter.is_enabled());
        assert!(!adapter.is_in_flight());
        assert!(adapter.detect(&tensor()).is_none());
    }

    #[test]
    fn test_run_inference_calls_model_once() {
        let mut model = FixedModel { scores: vec![0.9], calls: 0 };
        let _ = run_inference(&mut model, &tensor());
        assert_eq!(model.calls, 1);
    }

    #[test]
    fn test_open_missing_assets_disables_detection() {
        let tmp = tempfile::tempdir().unwrap();
        let adapter = InferenceAdapter::open(tmp.path(), "blazeface.onnx", None);
        assert!(!adapter.is_enabled());
    }
}
