//! Event screenshots.
//!
//! Layout on disk:
//!
//! ```text
//! <base>/<YYYY-MM-DD>/<HHMMSS>_event_<short id>.jpg
//! <base>/<YYYY-MM-DD>/<HHMMSS>_event_<short id>.json
//! ```
//!
//! Dates and times are local wall-clock, so folders line up with the
//! operator's day.

use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Days, Local, NaiveDate, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ScreenshotSettings;
use crate::detect::{BoundingBox, DetectionFrame};
use crate::event::PhoneUsageEvent;
use crate::frame::RawFrame;

const PERSON_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const PHONE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const BOX_THICKNESS: i32 = 2;
const DATE_DIR_FORMAT: &str = "%Y-%m-%d";

/// Sidecar metadata written next to each screenshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScreenshotMetadata {
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub person_bbox: BoundingBox,
    pub phone_bbox: BoundingBox,
    pub frame_count: u32,
    pub num_persons: usize,
    pub num_phones: usize,
}

pub struct ScreenshotStore {
    base: PathBuf,
    enabled: bool,
    quality: u8,
    annotate: bool,
}

impl ScreenshotStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            enabled: true,
            quality: 85,
            annotate: true,
        }
    }

    pub fn from_settings(base: impl Into<PathBuf>, settings: &ScreenshotSettings) -> Self {
        Self {
            base: base.into(),
            enabled: settings.save_enabled,
            quality: settings.quality.clamp(1, 100),
            annotate: settings.include_annotations,
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Write the screenshot and its metadata. `Ok(None)` when saving is disabled.
    pub fn save(
        &self,
        frame: &RawFrame,
        event: &PhoneUsageEvent,
        detections: &DetectionFrame,
    ) -> Result<Option<PathBuf>> {
        if !self.enabled {
            return Ok(None);
        }

        let local = event.start_time.with_timezone(&Local);
        let dir = self.base.join(local.format(DATE_DIR_FORMAT).to_string());
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;

        let stem = format!("{}_event_{}", local.format("%H%M%S"), event.short_id());
        let image_path = dir.join(format!("{}.jpg", stem));

        let mut img = frame.to_rgb_image()?;
        if self.annotate {
            for person in &detections.persons {
                draw_box(&mut img, &person.bbox, PERSON_COLOR);
            }
            for phone in &detections.phones {
                draw_box(&mut img, &phone.bbox, PHONE_COLOR);
            }
        }

        let file = fs::File::create(&image_path)
            .with_context(|| format!("failed to create {}", image_path.display()))?;
        let mut writer = BufWriter::new(file);
        JpegEncoder::new_with_quality(&mut writer, self.quality)
            .encode_image(&img)
            .with_context(|| format!("failed to encode {}", image_path.display()))?;

        let metadata = ScreenshotMetadata {
            event_id: event.event_id,
            timestamp: event.start_time,
            person_bbox: event.person_bbox,
            phone_bbox: event.phone_bbox,
            frame_count: event.frame_count,
            num_persons: detections.persons.len(),
            num_phones: detections.phones.len(),
        };
        let json = serde_json::to_string_pretty(&metadata)?;
        fs::write(image_path.with_extension("json"), json)?;

        log::info!("screenshot saved: {}", image_path.display());
        Ok(Some(image_path))
    }

    /// Sorted screenshot paths for one local date.
    pub fn screenshots_for_date(&self, date: NaiveDate) -> Result<Vec<PathBuf>> {
        let dir = self.base.join(date.format(DATE_DIR_FORMAT).to_string());
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "jpg") {
                out.push(path);
            }
        }
        out.sort();
        Ok(out)
    }

    pub fn metadata_for(&self, image_path: &Path) -> Result<ScreenshotMetadata> {
        let meta_path = image_path.with_extension("json");
        let raw = fs::read_to_string(&meta_path)
            .with_context(|| format!("failed to read {}", meta_path.display()))?;
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid screenshot metadata {}: {}", meta_path.display(), e))
    }

    /// Remove date folders older than `days` before `today`. Returns how many were removed.
    ///
    /// Entries that are not date folders are left alone.
    pub fn prune_older_than(&self, today: NaiveDate, days: u32) -> Result<usize> {
        if !self.base.is_dir() {
            return Ok(0);
        }
        // Nothing predates a cutoff before the calendar starts.
        let Some(cutoff) = today.checked_sub_days(Days::new(u64::from(days))) else {
            return Ok(0);
        };
        let mut removed = 0;
        for entry in fs::read_dir(&self.base)? {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Ok(date) = NaiveDate::parse_from_str(name, DATE_DIR_FORMAT) else {
                continue;
            };
            if date < cutoff {
                fs::remove_dir_all(&path)
                    .with_context(|| format!("failed to remove {}", path.display()))?;
                log::info!("removed old screenshots: {}", path.display());
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn draw_box(img: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>) {
    let clamped = bbox.clamp_to(img.width() as f32, img.height() as f32);
    let (x, y) = (clamped.x1 as i32, clamped.y1 as i32);
    let (w, h) = (clamped.width() as u32, clamped.height() as u32);
    for inset in 0..BOX_THICKNESS {
        let shrink = 2 * inset as u32;
        if w <= shrink || h <= shrink {
            break;
        }
        let rect = Rect::at(x + inset, y + inset).of_size(w - shrink, h - shrink);
        draw_hollow_rect_mut(img, rect, color);
    }
}
