//! Still photo capture: encode a frame as JPEG on local storage.

use crate::frame::{Frame, FrameError};
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

const JPEG_QUALITY: u8 = 90;

#[derive(Error, Debug)]
pub enum PhotoError {
    #[error("frame conversion failed: {0}")]
    Frame(#[from] FrameError),
    #[error("encode failed: {0}")]
    Encode(#[from] image::ImageError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes captured frames into a directory as `capture-<uuid>.jpg`.
#[derive(Debug, Clone)]
pub struct PhotoWriter {
    dir: PathBuf,
    quality: u8,
}

impl PhotoWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            quality: JPEG_QUALITY,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Encode `frame` and return the path of the new file.
    pub fn write(&self, frame: &Frame) -> Result<PathBuf, PhotoError> {
        fs::create_dir_all(&self.dir)?;
        let rgb = frame.to_rgb8()?;

        let path = self.dir.join(format!("capture-{}.jpg", Uuid::new_v4()));
        let mut out = BufWriter::new(File::create(&path)?);
        JpegEncoder::new_with_quality(&mut out, self.quality).encode(
            &rgb,
            frame.width,
            frame.height,
            ExtendedColorType::Rgb8,
        )?;
        out.flush()?;

        tracing::debug!(
            path = %path.display(),
            width = frame.width,
            height = frame.height,
            "photo written"
        );
        Ok(path)
    }
}
