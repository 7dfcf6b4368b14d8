pub mod scripted;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use scripted::{read_detection_log, DetectionRecord, ScriptedBackend};

#[cfg(feature = "backend-tract")]
pub use tract::TractBackend;
