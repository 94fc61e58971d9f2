//! Frame type and pixel-format conversion to interleaved RGB8.

use std::time::Instant;

/// Pixel layout of a raw frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Interleaved 8-bit RGB (3 bytes/pixel).
    Rgb8,
    /// Interleaved 8-bit RGBA (4 bytes/pixel).
    Rgba8,
    /// Interleaved 8-bit BGRA (4 bytes/pixel).
    Bgra8,
    /// YUYV 4:2:2 packed (2 bytes/pixel).
    Yuyv,
    /// 8-bit grayscale (1 byte/pixel).
    Grey,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 | PixelFormat::Bgra8 => 4,
            PixelFormat::Yuyv => 2,
            PixelFormat::Grey => 1,
        }
    }
}

/// A captured camera frame.
#[derive(Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub timestamp: Instant,
    pub sequence: u32,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            data,
            width,
            height,
            format,
            timestamp: Instant::now(),
            sequence: 0,
        }
    }

    /// Convert to interleaved RGB8 (`width * height * 3` bytes).
    pub fn to_rgb8(&self) -> Result<Vec<u8>, FrameError> {
        let pixels = (self.width as usize) * (self.height as usize);
        let expected = pixels * self.format.bytes_per_pixel();
        if self.data.len() < expected {
            return Err(FrameError::InvalidLength {
                format: self.format,
                expected,
                actual: self.data.len(),
            });
        }
        let data = &self.data[..expected];

        Ok(match self.format {
            PixelFormat::Rgb8 => data.to_vec(),
            PixelFormat::Rgba8 => data.chunks_exact(4).flat_map(|p| [p[0], p[1], p[2]]).collect(),
            PixelFormat::Bgra8 => data.chunks_exact(4).flat_map(|p| [p[2], p[1], p[0]]).collect(),
            PixelFormat::Grey => data.iter().flat_map(|&y| [y, y, y]).collect(),
            PixelFormat::Yuyv => yuyv_to_rgb(data),
        })
    }
}

/// Convert packed YUYV (4:2:2) to RGB8 using BT.601 limited-range coefficients.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V], sharing chroma.
pub fn yuyv_to_rgb(yuyv: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(yuyv.len() / 2 * 3);
    for chunk in yuyv.chunks_exact(4) {
        let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        rgb.extend_from_slice(&ycbcr_to_rgb(y0, u, v));
        rgb.extend_from_slice(&ycbcr_to_rgb(y1, u, v));
    }
    rgb
}

fn ycbcr_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = (y as f32 - 16.0) * 1.164;
    let d = u as f32 - 128.0;
    let e = v as f32 - 128.0;

    let r = c + 1.596 * e;
    let g = c - 0.392 * d - 0.813 * e;
    let b = c + 2.017 * d;

    [
        r.round().clamp(0.0, 255.0) as u8,
        g.round().clamp(0.0, 255.0) as u8,
        b.round().clamp(0.0, 255.0) as u8,
    ]
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid {format:?} length: expected {expected}, got {actual}")]
    InvalidLength {
        format: PixelFormat,
        expected: usize,
        actual: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_passthrough() {
        let frame = Frame::new(vec![1, 2, 3, 4, 5, 6], 2, 1, PixelFormat::Rgb8);
        assert_eq!(frame.to_rgb8().unwrap(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_rgba_and_bgra_drop_alpha() {
        let rgba = Frame::new(vec![10, 20, 30, 255], 1, 1, PixelFormat::Rgba8);
        assert_eq!(rgba.to_rgb8().unwrap(), vec![10, 20, 30]);

        let bgra = Frame::new(vec![10, 20, 30, 255], 1, 1, PixelFormat::Bgra8);
        assert_eq!(bgra.to_rgb8().unwrap(), vec![30, 20, 10]);
    }

    #[test]
    fn test_grey_replicates() {
        let frame = Frame::new(vec![7, 200], 2, 1, PixelFormat::Grey);
        assert_eq!(frame.to_rgb8().unwrap(), vec![7, 7, 7, 200, 200, 200]);
    }

    #[test]
    fn test_yuyv_neutral_chroma_is_grey() {
        // U = V = 128 means no chroma: R = G = B
        let frame = Frame::new(vec![16, 128, 235, 128], 2, 1, PixelFormat::Yuyv);
        let rgb = frame.to_rgb8().unwrap();
        assert_eq!(rgb, vec![0, 0, 0, 255, 255, 255]);
    }

    #[test]
    fn test_yuyv_4x2_length() {
        // 4x2 image = 8 pixels, 16 YUYV bytes
        let yuyv: Vec<u8> = (0..16).map(|i| 100 + i).collect();
        let frame = Frame::new(yuyv, 4, 2, PixelFormat::Yuyv);
        assert_eq!(frame.to_rgb8().unwrap().len(), 4 * 2 * 3);
    }

    #[test]
    fn test_short_buffer_rejected() {
        let frame = Frame::new(vec![100, 128], 2, 1, PixelFormat::Yuyv);
        let err = frame.to_rgb8().unwrap_err();
        assert!(matches!(err, FrameError::InvalidLength { expected: 4, actual: 2, .. }));
    }

    #[test]
    fn test_extra_bytes_ignored() {
        let frame = Frame::new(vec![9, 9, 9, 0, 0], 1, 1, PixelFormat::Rgb8);
        assert_eq!(frame.to_rgb8().unwrap(), vec![9, 9, 9]);
    }
}
