//! Frame → detector input tensor.
//!
//! Resizes an interleaved RGB8 frame to the detector input size with bilinear
//! interpolation, normalizes each byte to `f32`, and lays the values out in
//! the channel order the model expects. The transform is pure: identical
//! input bytes always produce an identical tensor.

use ndarray::Array4;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const CHANNELS: usize = 3;
const UNIT_SCALE: f32 = 255.0;
const SYMMETRIC_SCALE: f32 = 127.5;

pub const DEFAULT_INPUT_WIDTH: usize = 256;
pub const DEFAULT_INPUT_HEIGHT: usize = 256;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TransformError {
    #[error("frame has zero dimension: {width}x{height}")]
    EmptyFrame { width: usize, height: usize },
    #[error("target size has zero dimension: {width}x{height}")]
    EmptyTarget { width: usize, height: usize },
    #[error("RGB buffer too short: expected {expected}, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },
}

/// Byte → float mapping applied after resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Normalization {
    /// `v / 255.0`, range [0, 1].
    UnitRange,
    /// `v / 127.5 - 1.0`, range [-1, 1].
    Symmetric,
}

impl Normalization {
    #[inline]
    pub fn apply(self, v: u8) -> f32 {
        match self {
            Normalization::UnitRange => v as f32 / UNIT_SCALE,
            Normalization::Symmetric => v as f32 / SYMMETRIC_SCALE - 1.0,
        }
    }

    /// Inclusive (min, max) of the normalized output.
    pub fn range(self) -> (f32, f32) {
        match self {
            Normalization::UnitRange => (0.0, 1.0),
            Normalization::Symmetric => (-1.0, 1.0),
        }
    }

    /// Parse the `unit` / `symmetric` spelling used in configuration.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unit" | "0-1" | "unit_range" => Some(Normalization::UnitRange),
            "symmetric" | "-1-1" | "signed" => Some(Normalization::Symmetric),
            _ => None,
        }
    }
}

/// Memory layout of the produced tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TensorLayout {
    /// Channel-major `[1, 3, H, W]`: all red values, then green, then blue.
    Nchw,
    /// Interleaved `[1, H, W, 3]`.
    Nhwc,
}

/// Detector input geometry and encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformConfig {
    pub width: usize,
    pub height: usize,
    pub normalization: Normalization,
    pub layout: TensorLayout,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_INPUT_WIDTH,
            height: DEFAULT_INPUT_HEIGHT,
            normalization: Normalization::UnitRange,
            layout: TensorLayout::Nchw,
        }
    }
}

/// Normalized detector input, batch size 1.
#[derive(Debug, Clone)]
pub struct FrameTensor {
    pub data: Array4<f32>,
    pub layout: TensorLayout,
}

impl FrameTensor {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Values in memory order. Tensors built by [`frame_to_tensor`] are
    /// always contiguous.
    pub fn as_slice(&self) -> &[f32] {
        self.data.as_slice().unwrap_or(&[])
    }
}

/// Convert an interleaved RGB8 frame into a detector input tensor.
pub fn frame_to_tensor(
    rgb: &[u8],
    width: usize,
    height: usize,
    config: &TransformConfig,
) -> Result<FrameTensor, TransformError> {
    if width == 0 || height == 0 {
        return Err(TransformError::EmptyFrame { width, height });
    }
    if config.width == 0 || config.height == 0 {
        return Err(TransformError::EmptyTarget {
            width: config.width,
            height: config.height,
        });
    }
    let expected = width * height * CHANNELS;
    if rgb.len() < expected {
        return Err(TransformError::BufferTooShort {
            expected,
            actual: rgb.len(),
        });
    }

    let resized = resize_rgb(&rgb[..expected], width, height, config.width, config.height);
    let data = layout_tensor(&resized, config);

    Ok(FrameTensor {
        data,
        layout: config.layout,
    })
}

/// Bilinear resize of interleaved RGB8 using half-pixel centers.
///
/// Identity-sized input is copied verbatim.
pub fn resize_rgb(rgb: &[u8], width: usize, height: usize, new_w: usize, new_h: usize) -> Vec<u8> {
    if width == new_w && height == new_h {
        return rgb.to_vec();
    }

    let scale_x = width as f32 / new_w as f32;
    let scale_y = height as f32 / new_h as f32;
    let mut resized = vec![0u8; new_w * new_h * CHANNELS];

    for y in 0..new_h {
        let src_y = (y as f32 + 0.5) * scale_y - 0.5;
        let y0 = (src_y.floor() as i32).clamp(0, height as i32 - 1) as usize;
        let y1 = (y0 + 1).min(height - 1);
        let fy = (src_y - src_y.floor()).clamp(0.0, 1.0);

        for x in 0..new_w {
            let src_x = (x as f32 + 0.5) * scale_x - 0.5;
            let x0 = (src_x.floor() as i32).clamp(0, width as i32 - 1) as usize;
            let x1 = (x0 + 1).min(width - 1);
            let fx = (src_x - src_x.floor()).clamp(0.0, 1.0);

            for c in 0..CHANNELS {
                let tl = rgb[(y0 * width + x0) * CHANNELS + c] as f32;
                let tr = rgb[(y0 * width + x1) * CHANNELS + c] as f32;
                let bl = rgb[(y1 * width + x0) * CHANNELS + c] as f32;
                let br = rgb[(y1 * width + x1) * CHANNELS + c] as f32;

                let val = tl * (1.0 - fx) * (1.0 - fy)
                    + tr * fx * (1.0 - fy)
                    + bl * (1.0 - fx) * fy
                    + br * fx * fy;

                resized[(y * new_w + x) * CHANNELS + c] = val.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    resized
}

/// Normalize and arrange resized RGB8 bytes into the configured layout.
fn layout_tensor(resized: &[u8], config: &TransformConfig) -> Array4<f32> {
    let (h, w) = (config.height, config.width);
    let norm = config.normalization;

    match config.layout {
        TensorLayout::Nchw => Array4::from_shape_fn((1, CHANNELS, h, w), |(_, c, row, col)| {
            norm.apply(resized[(row * w + col) * CHANNELS + c])
        }),
        TensorLayout::Nhwc => Array4::from_shape_fn((1, h, w, CHANNELS), |(_, row, col, c)| {
            norm.apply(resized[(row * w + col) * CHANNELS + c])
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: usize, height: usize, px: [u8; 3]) -> Vec<u8> {
        px.iter().copied().cycle().take(width * height * 3).collect()
    }

    fn config(w: usize, h: usize, normalization: Normalization, layout: TensorLayout) -> TransformConfig {
        TransformConfig { width: w, height: h, normalization, layout }
    }

    #[test]
    fn test_output_length_and_range_unit() {
        // Gradient input exercises every byte value
        let (w, h) = (64usize, 48usize);
        let rgb: Vec<u8> = (0..w * h * 3).map(|i| (i % 256) as u8).collect();
        let cfg = config(32, 32, Normalization::UnitRange, TensorLayout::Nchw);
        let tensor = frame_to_tensor(&rgb, w, h, &cfg).unwrap();

        assert_eq!(tensor.len(), 3 * 32 * 32);
        assert_eq!(tensor.shape(), &[1, 3, 32, 32]);
        assert!(tensor.as_slice().iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_output_range_symmetric() {
        let (w, h) = (40usize, 40usize);
        let rgb: Vec<u8> = (0..w * h * 3).map(|i| (i * 7 % 256) as u8).collect();
        let cfg = config(16, 16, Normalization::Symmetric, TensorLayout::Nchw);
        let tensor = frame_to_tensor(&rgb, w, h, &cfg).unwrap();

        assert_eq!(tensor.len(), 3 * 16 * 16);
        assert!(tensor.as_slice().iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn test_all_red_is_channel_major() {
        let (w, h) = (20usize, 10usize);
        let rgb = solid(w, h, [255, 0, 0]);
        let cfg = config(8, 8, Normalization::UnitRange, TensorLayout::Nchw);
        let tensor = frame_to_tensor(&rgb, w, h, &cfg).unwrap();

        let plane = 8 * 8;
        let values = tensor.as_slice();
        assert!(values[..plane].iter().all(|&v| v == 1.0), "red plane should be max");
        assert!(values[plane..].iter().all(|&v| v == 0.0), "green/blue planes should be min");
    }

    #[test]
    fn test_all_red_symmetric_extremes() {
        let rgb = solid(4, 4, [255, 0, 0]);
        let cfg = config(4, 4, Normalization::Symmetric, TensorLayout::Nchw);
        let tensor = frame_to_tensor(&rgb, 4, 4, &cfg).unwrap();

        let values = tensor.as_slice();
        assert!(values[..16].iter().all(|&v| (v - 1.0).abs() < 1e-6));
        assert!(values[16..].iter().all(|&v| (v + 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_transpose_index_mapping() {
        // 2x2 frame, same size as target so no resampling is involved
        let rgb: Vec<u8> = vec![
            10, 20, 30, 40, 50, 60, //
            70, 80, 90, 100, 110, 120,
        ];
        let cfg = config(2, 2, Normalization::UnitRange, TensorLayout::Nchw);
        let tensor = frame_to_tensor(&rgb, 2, 2, &cfg).unwrap();

        let (h, w) = (2usize, 2usize);
        for c in 0..3 {
            for row in 0..h {
                for col in 0..w {
                    let out = tensor.as_slice()[c * h * w + row * w + col];
                    let src = rgb[(row * w + col) * 3 + c] as f32 / 255.0;
                    assert_eq!(out, src, "c={c} h={row} w={col}");
                }
            }
        }
    }

    #[test]
    fn test_nhwc_keeps_interleaved_order() {
        let rgb: Vec<u8> = vec![255, 0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 255];
        let cfg = config(2, 2, Normalization::UnitRange, TensorLayout::Nhwc);
        let tensor = frame_to_tensor(&rgb, 2, 2, &cfg).unwrap();

        assert_eq!(tensor.shape(), &[1, 2, 2, 3]);
        let expected: Vec<f32> = rgb.iter().map(|&v| v as f32 / 255.0).collect();
        assert_eq!(tensor.as_slice(), expected.as_slice());
    }

    #[test]
    fn test_deterministic() {
        let (w, h) = (33usize, 17usize);
        let rgb: Vec<u8> = (0..w * h * 3).map(|i| (i * 31 % 251) as u8).collect();
        let cfg = TransformConfig::default();
        let a = frame_to_tensor(&rgb, w, h, &cfg).unwrap();
        let b = frame_to_tensor(&rgb, w, h, &cfg).unwrap();
        assert_eq!(a.as_slice(), b.as_slice());
    }

    #[test]
    fn test_bilinear_resize_uniform() {
        // Uniform frame resized either way should remain uniform
        let rgb = solid(100, 100, [128, 64, 32]);
        let up = resize_rgb(&rgb, 100, 100, 200, 150);
        assert_eq!(up.len(), 200 * 150 * 3);
        assert!(up.chunks(3).all(|p| p == [128, 64, 32]), "uniform upscale should stay uniform");

        let down = resize_rgb(&rgb, 100, 100, 30, 30);
        assert!(down.chunks(3).all(|p| p == [128, 64, 32]), "uniform downscale should stay uniform");
    }

    #[test]
    fn test_rejects_short_buffer() {
        let rgb = vec![0u8; 10];
        let err = frame_to_tensor(&rgb, 4, 4, &TransformConfig::default()).unwrap_err();
        assert_eq!(err, TransformError::BufferTooShort { expected: 48, actual: 10 });
    }

    #[test]
    fn test_rejects_empty_frame() {
        let err = frame_to_tensor(&[], 0, 4, &TransformConfig::default()).unwrap_err();
        assert_eq!(err, TransformError::EmptyFrame { width: 0, height: 4 });
    }

    #[test]
    fn test_normalization_parse() {
        assert_eq!(Normalization::parse("unit"), Some(Normalization::UnitRange));
        assert_eq!(Normalization::parse(" Symmetric "), Some(Normalization::Symmetric));
        assert_eq!(Normalization::parse("zscore"), None);
    }
}
