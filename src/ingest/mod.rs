//! Frame ingestion sources.
//!
//! - `stub://...` devices: `SyntheticSource`, deterministic patterned frames.
//! - Device nodes such as `/dev/video0`: `V4l2Source` (feature: ingest-v4l2).
//!
//! Every source yields packed RGB24 `RawFrame`s stamped with their capture
//! time. Frames are handed to the monitor and never retained by the source.

mod normalize;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use anyhow::{anyhow, Result};

use crate::config::CameraSettings;
use crate::frame::RawFrame;

pub use synthetic::SyntheticSource;
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::V4l2Source;

/// A camera-like producer of frames.
pub trait FrameSource: Send {
    fn connect(&mut self) -> Result<()>;

    /// Block until the next frame is available.
    fn next_frame(&mut self) -> Result<RawFrame>;

    fn is_healthy(&self) -> bool;

    fn stats(&self) -> SourceStats;
}

/// Capture counters for a source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub device: String,
}

/// Build the source named by `settings.device`. The source is not yet connected.
pub fn open_source(settings: &CameraSettings) -> Result<Box<dyn FrameSource>> {
    let device = settings.device.trim();
    if device.is_empty() {
        return Err(anyhow!("camera device must not be empty"));
    }
    if device.starts_with("stub://") {
        return Ok(Box::new(SyntheticSource::new(settings.clone()).paced()));
    }
    if device.contains("://") {
        return Err(anyhow!("unsupported camera url {}", device));
    }

    #[cfg(feature = "ingest-v4l2")]
    {
        Ok(Box::new(V4l2Source::new(settings.clone())))
    }
    #[cfg(not(feature = "ingest-v4l2"))]
    {
        Err(anyhow!(
            "camera device {} requires the ingest-v4l2 feature",
            device
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(device: &str) -> CameraSettings {
        CameraSettings {
            device: device.to_string(),
            width: 32,
            height: 24,
            fps_target: 30,
        }
    }

    #[test]
    fn stub_device_opens_synthetic_source() -> Result<()> {
        let mut source = open_source(&settings("stub://desk"))?;
        source.connect()?;
        let frame = source.next_frame()?;
        assert_eq!((frame.width, frame.height), (32, 24));
        assert_eq!(source.stats().frames_captured, 1);
        assert_eq!(source.stats().device, "stub://desk");
        Ok(())
    }

    #[test]
    fn rejects_remote_urls_and_empty_devices() {
        assert!(open_source(&settings("rtsp://camera/stream")).is_err());
        assert!(open_source(&settings("  ")).is_err());
    }
}
