//! Per-frame person/phone overlap classification.
//!
//! A person is considered to be using a phone when a person box and a phone box
//! intersect with positive area. Pairs are scanned person-major in input order
//! and the first overlapping pair wins. There is no confidence weighting and no
//! best-pair selection: with several simultaneous overlaps the reported pair
//! depends only on detection order.

use crate::detect::{Detection, DetectionFrame};

/// Outcome of classifying one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OverlapResult {
    None,
    Found { person: Detection, phone: Detection },
}

impl OverlapResult {
    pub fn is_found(&self) -> bool {
        matches!(self, OverlapResult::Found { .. })
    }
}

/// Return the first person/phone pair whose boxes overlap.
pub fn classify(detections: &DetectionFrame) -> OverlapResult {
    if detections.persons.is_empty() || detections.phones.is_empty() {
        return OverlapResult::None;
    }

    for person in &detections.persons {
        for phone in &detections.phones {
            if person.bbox.overlaps(&phone.bbox) {
                return OverlapResult::Found {
                    person: *person,
                    phone: *phone,
                };
            }
        }
    }
    OverlapResult::None
}
