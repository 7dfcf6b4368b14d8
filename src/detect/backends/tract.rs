use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, Detection, DetectionFrame, ObjectClass};
use crate::frame::RawFrame;

const CXYWH_OFFSET: usize = 4;

type Model = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Tract-based YOLOv8 backend for ONNX inference.
///
/// Loads a local detection model exported with a `[1, 3, H, W]` input and a
/// `[1, 4 + classes, anchors]` output. Only COCO person and cell-phone classes
/// are kept.
pub struct TractBackend {
    model: Model,
    width: u32,
    height: u32,
    confidence_threshold: f32,
    iou_threshold: f32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            width,
            height,
            confidence_threshold: 0.5,
            iou_threshold: 0.45,
        })
    }

    /// Override the default confidence threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Override the default NMS IoU threshold.
    pub fn with_iou_threshold(mut self, threshold: f32) -> Self {
        self.iou_threshold = threshold;
        self
    }

    fn build_input(&self, frame: &RawFrame) -> Result<Tensor> {
        let img = frame.to_rgb_image()?;
        let resized = if img.dimensions() == (self.width, self.height) {
            img
        } else {
            image::imageops::resize(&img, self.width, self.height, FilterType::Triangle)
        };

        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.height as usize, self.width as usize),
            |(_, channel, y, x)| resized.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0,
        );

        Ok(input.into_tensor())
    }

    fn decode(&self, outputs: TVec<TValue>, frame: &RawFrame) -> Result<DetectionFrame> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let preds = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .context("expected a [1, 4 + classes, anchors] output")?;

        let (_, rows, anchors) = preds.dim();
        if rows <= CXYWH_OFFSET {
            return Err(anyhow!("model output has no class rows"));
        }

        let scale_x = frame.width as f32 / self.width as f32;
        let scale_y = frame.height as f32 / self.height as f32;

        let mut candidates = Vec::new();
        for a in 0..anchors {
            let mut best = (0usize, f32::NEG_INFINITY);
            for class_row in CXYWH_OFFSET..rows {
                let score = preds[(0, class_row, a)];
                if score > best.1 {
                    best = (class_row - CXYWH_OFFSET, score);
                }
            }
            let (class_id, confidence) = best;
            if confidence < self.confidence_threshold {
                continue;
            }
            let class = ObjectClass::from_coco_id(class_id);
            if class == ObjectClass::Other {
                continue;
            }
            let bbox = BoundingBox::from_center(
                preds[(0, 0, a)] * scale_x,
                preds[(0, 1, a)] * scale_y,
                preds[(0, 2, a)] * scale_x,
                preds[(0, 3, a)] * scale_y,
            )
            .clamp_to(frame.width as f32, frame.height as f32);
            candidates.push(Detection::new(bbox, confidence, class));
        }

        let mut persons: Vec<Detection> = candidates
            .iter()
            .filter(|d| d.class == ObjectClass::Person)
            .copied()
            .collect();
        let mut phones: Vec<Detection> = candidates
            .into_iter()
            .filter(|d| d.class == ObjectClass::Phone)
            .collect();
        non_max_suppression(&mut persons, self.iou_threshold);
        non_max_suppression(&mut phones, self.iou_threshold);

        Ok(DetectionFrame::new(persons, phones))
    }
}

/// Greedy NMS: keep the highest-confidence box, drop others above `iou_threshold`.
pub(crate) fn non_max_suppression(detections: &mut Vec<Detection>, iou_threshold: f32) {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept = 0;
    for index in 0..detections.len() {
        let drop = (0..kept).any(|prev| {
            detections[prev].bbox.iou(&detections[index].bbox) > iou_threshold
        });
        if !drop {
            detections.swap(kept, index);
            kept += 1;
        }
    }
    detections.truncate(kept);
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &RawFrame) -> Result<DetectionFrame> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode(outputs, frame)
    }
}
