mod backend;
pub mod backends;
mod registry;
mod result;

pub use backend::DetectorBackend;
pub use backends::{read_detection_log, DetectionRecord, ScriptedBackend};
pub use registry::BackendRegistry;
pub use result::{BoundingBox, Detection, DetectionFrame, ObjectClass};
