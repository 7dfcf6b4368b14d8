//! Captured camera frames.
//!
//! - `RawFrame`: RGB24 pixel buffer plus dimensions and capture time.
//!
//! Frames are transient. They are handed to the detector, optionally rendered
//! into a screenshot when an event starts, and then dropped.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use image::RgbImage;

/// One RGB24 frame from a frame source.
pub struct RawFrame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Wall-clock capture time.
    pub captured_at: DateTime<Utc>,
}

impl RawFrame {
    /// Create a frame from packed RGB24 bytes. The length must match the dimensions.
    pub fn new(data: Vec<u8>, width: u32, height: u32, captured_at: DateTime<Utc>) -> Result<Self> {
        let expected = expected_rgb_len(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            captured_at,
        })
    }

    /// Solid-color frame, handy for tests and synthetic sources.
    pub fn filled(
        width: u32,
        height: u32,
        rgb: [u8; 3],
        captured_at: DateTime<Utc>,
    ) -> Result<Self> {
        let len = expected_rgb_len(width, height)?;
        let data = rgb.iter().copied().cycle().take(len).collect();
        Self::new(data, width, height, captured_at)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Copy into an `image` buffer for annotation and encoding.
    pub fn to_rgb_image(&self) -> Result<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", self.width, self.height))
    }
}

impl std::fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("captured_at", &self.captured_at)
            .field("bytes", &self.data.len())
            .finish()
    }
}

pub(crate) fn expected_rgb_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(3))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}
