//! Phone Shamer
//!
//! Watches a camera feed and records "phone usage" events: a person whose
//! bounding box overlaps a cell phone's bounding box for several consecutive
//! frames.
//!
//! # Architecture
//!
//! Each processed frame flows through a fixed pipeline:
//!
//! 1. **Ingest**: a `FrameSource` yields RGB24 `RawFrame`s.
//! 2. **Detect**: a `DetectorBackend` turns a frame into person and phone boxes.
//! 3. **Classify**: `overlap::classify` reduces the boxes to a per-frame overlap
//!    signal and the first overlapping pair.
//! 4. **Track**: `EventTracker` applies temporal consistency and a cooldown,
//!    emitting `EventStarted` once per confirmed event.
//! 5. **Persist**: the monitor saves a screenshot and stores the event; the
//!    final frame count is written when the event ends.
//!
//! # Module Structure
//!
//! - `detect`: Detection types, backend trait and registry, scripted and ONNX backends
//! - `overlap`, `tracker`, `event`: Per-frame classification and event lifecycle
//! - `frame`, `ingest`: Frames and camera sources
//! - `gesture`: Optional hand-gesture start/stop control
//! - `screenshot`, `storage`, `stats`: Evidence files, event database, reports
//! - `config`, `logging`: Runtime configuration and log setup
//! - `monitor`: The capture loop tying it together

pub mod config;
pub mod detect;
pub mod event;
pub mod frame;
pub mod gesture;
pub mod ingest;
pub mod logging;
pub mod monitor;
pub mod overlap;
pub mod screenshot;
pub mod stats;
pub mod storage;
pub mod tracker;

pub use config::ShamerConfig;
pub use detect::{
    BackendRegistry, BoundingBox, Detection, DetectionFrame, DetectorBackend, ObjectClass,
    ScriptedBackend,
};
pub use event::{EventStarted, PhoneUsageEvent};
pub use frame::RawFrame;
pub use gesture::{ControlSignal, GestureController, GestureRecognizer, Hand, HandGesture};
pub use ingest::{open_source, FrameSource, SourceStats, SyntheticSource};
#[cfg(feature = "ingest-v4l2")]
pub use ingest::V4l2Source;
pub use monitor::{FrameReport, Monitor, MonitorStats, StepOutcome};
pub use overlap::{classify, OverlapResult};
pub use screenshot::{ScreenshotMetadata, ScreenshotStore};
pub use storage::{EventStore, InMemoryEventStore, SqliteEventStore, StoredEvent};
pub use tracker::{ConsistencyWindow, EventTracker, TrackerConfig};
