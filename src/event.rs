use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::detect::BoundingBox;

/// A confirmed phone-usage event.
///
/// Boxes are a snapshot of the pair that confirmed the event and are never
/// updated. `frame_count` grows by one for every further confirmed frame while
/// the event stays active.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhoneUsageEvent {
    pub event_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub person_bbox: BoundingBox,
    pub phone_bbox: BoundingBox,
    pub frame_count: u32,
}

impl PhoneUsageEvent {
    pub fn new(
        start_time: DateTime<Utc>,
        person_bbox: BoundingBox,
        phone_bbox: BoundingBox,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            start_time,
            person_bbox,
            phone_bbox,
            frame_count: 1,
        }
    }

    /// Last 8 characters of the hyphenated id, used in screenshot names and reports.
    pub fn short_id(&self) -> String {
        let id = self.event_id.to_string();
        id[id.len() - 8..].to_string()
    }
}

/// Emitted exactly once per event, at creation.
///
/// Carries a snapshot taken at creation (`frame_count == 1`). The live count is
/// available from `EventTracker::active_event` until the event ends.
#[derive(Clone, Debug, PartialEq)]
pub struct EventStarted {
    pub event: PhoneUsageEvent,
}
