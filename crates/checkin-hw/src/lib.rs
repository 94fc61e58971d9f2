//! checkin-hw — Camera capture and still-photo output.
//!
//! Provides V4L2-based frame streaming, pixel-format conversion to RGB, and
//! JPEG photo capture for upload.

pub mod camera;
pub mod frame;
pub mod photo;

pub use camera::{Camera, CameraError, DeviceInfo};
pub use frame::{Frame, FrameError, PixelFormat};
pub use photo::{PhotoError, PhotoWriter};
