use serde::{Deserialize, Serialize};

/// Axis-aligned box in frame pixel coordinates, `(x1, y1)` top-left and `(x2, y2)` bottom-right.
///
/// Boxes carry no identity across frames. Coordinates are not validated: NaN or
/// inverted boxes flow through as-is and simply never overlap anything.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Build from a center point and size (YOLO output layout).
    pub fn from_center(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self {
            x1: cx - w / 2.0,
            y1: cy - h / 2.0,
            x2: cx + w / 2.0,
            y2: cy + h / 2.0,
        }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Strict separating-axis test. Boxes that only share an edge do not overlap.
    pub fn overlaps(&self, other: &BoundingBox) -> bool {
        let x_overlap = self.x1 < other.x2 && self.x2 > other.x1;
        let y_overlap = self.y1 < other.y2 && self.y2 > other.y1;
        x_overlap && y_overlap
    }

    /// Intersection over union, 0.0 for disjoint or degenerate boxes.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let iy = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let intersection = ix * iy;
        let union = self.area() + other.area() - intersection;
        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }

    /// Clamp into a `width` x `height` frame.
    pub fn clamp_to(&self, width: f32, height: f32) -> Self {
        Self {
            x1: self.x1.clamp(0.0, width),
            y1: self.y1.clamp(0.0, height),
            x2: self.x2.clamp(0.0, width),
            y2: self.y2.clamp(0.0, height),
        }
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectClass {
    Person,
    Phone,
    Other,
}

impl ObjectClass {
    /// COCO class ids used by the YOLO family: 0 = person, 67 = cell phone.
    pub fn from_coco_id(id: usize) -> Self {
        match id {
            0 => ObjectClass::Person,
            67 => ObjectClass::Phone,
            _ => ObjectClass::Other,
        }
    }
}

/// One detected object in one frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    /// Class confidence in [0, 1].
    pub confidence: f32,
    pub class: ObjectClass,
}

impl Detection {
    pub fn new(bbox: BoundingBox, confidence: f32, class: ObjectClass) -> Self {
        Self {
            bbox,
            confidence,
            class,
        }
    }

    pub fn person(bbox: BoundingBox, confidence: f32) -> Self {
        Self::new(bbox, confidence, ObjectClass::Person)
    }

    pub fn phone(bbox: BoundingBox, confidence: f32) -> Self {
        Self::new(bbox, confidence, ObjectClass::Phone)
    }

    pub fn center(&self) -> (f32, f32) {
        self.bbox.center()
    }
}

/// Person and phone detections produced from one camera frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionFrame {
    #[serde(default)]
    pub persons: Vec<Detection>,
    #[serde(default)]
    pub phones: Vec<Detection>,
}

impl DetectionFrame {
    pub fn new(persons: Vec<Detection>, phones: Vec<Detection>) -> Self {
        Self { persons, phones }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Partition a mixed detection list. Classes other than person and phone are dropped.
    pub fn from_detections(detections: impl IntoIterator<Item = Detection>) -> Self {
        let mut frame = Self::default();
        for detection in detections {
            match detection.class {
                ObjectClass::Person => frame.persons.push(detection),
                ObjectClass::Phone => frame.phones.push(detection),
                ObjectClass::Other => {}
            }
        }
        frame
    }

    pub fn is_empty(&self) -> bool {
        self.persons.is_empty() && self.phones.is_empty()
    }
}
