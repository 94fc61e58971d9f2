//! checkin-core — Frame pipeline for face check-in.
//!
//! Converts camera frames into detector input, rate-limits the pipeline,
//! scores frames with an ONNX face detector, and decides when to capture a
//! photo for upload.

pub mod assets;
pub mod capture;
pub mod detector;
pub mod registration;
pub mod throttle;
pub mod transform;
pub mod types;

pub use assets::ModelAssets;
pub use capture::{AutoCapture, CaptureConfig, CaptureRejected, CaptureState, CaptureTrigger};
pub use detector::{InferenceAdapter, OnnxFaceDetector, ScoreModel};
pub use registration::{CaptureSession, FaceDirection};
pub use throttle::ThrottleGate;
pub use transform::{frame_to_tensor, FrameTensor, Normalization, TensorLayout, TransformConfig};
pub use types::DetectionResult;
