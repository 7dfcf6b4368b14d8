use anyhow::Result;

use crate::detect::result::DetectionFrame;
use crate::frame::RawFrame;

/// Detector backend trait.
///
/// A backend turns one captured frame into the person and phone detections for
/// that frame. Model inference lives behind this boundary; nothing downstream
/// depends on how boxes were produced.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    ///
    /// Implementations must treat the frame as read-only and must not retain it
    /// beyond the call.
    fn detect(&mut self, frame: &RawFrame) -> Result<DetectionFrame>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
