//! checkin-api — Recognition backend client and upload bookkeeping.
//!
//! Uploads captured photos to the face recognition backend, tracks which
//! photos are pending or uploaded, and exposes a busy flag so capture logic
//! can avoid overlapping uploads.

pub mod client;
pub mod coordinator;
pub mod store;

pub use client::{ApiError, BackendClient, FaceBackend, MatchDecision};
pub use coordinator::UploadCoordinator;
pub use store::{normalize_handle, normalize_path, Photo, PhotoStore};
