//! Multi-variant, multi-region, multi-rotation QR scan of one photo.
//!
//! Every decoder runs on every (variant, region, rotation) combination.
//! Decoder panics are caught and skipped; the scan returns whatever was
//! found. Repeated reads of the same payload collapse into the one with the
//! highest confidence, and the result is ordered by confidence.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

use image::DynamicImage;
use serde::Serialize;
use tracing::{debug, warn};

use crate::decoder::{QrDecoder, RawDecode, default_decoders};
use crate::preprocess::{ImageBounds, ImageError, VariantKind, decode, prepare};
use crate::region::{Region, RegionKind, Rotation, regions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    pub bounds: ImageBounds,
    pub scan_regions: bool,
    pub try_rotations: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            bounds: ImageBounds::default(),
            scan_regions: true,
            try_rotations: true,
        }
    }
}

/// Axis-aligned box in original photo pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub text: String,
    /// Heuristic in `[0, 1]`; not a calibrated probability.
    pub confidence: f32,
    pub position: Option<BoundingBox>,
    pub decoder: &'static str,
    pub variant: VariantKind,
    pub region: RegionKind,
    pub rotation: u16,
}

/// Confidence heuristic: decoder base score, boosted when the decoder
/// reported geometry and when the payload is long enough to be one of ours.
pub fn confidence(base: f32, has_position: bool, text_len: usize) -> f32 {
    let mut score = base;
    if has_position {
        score += 0.1;
    }
    if text_len > 10 {
        score += 0.05;
    }
    if text_len > 20 {
        score += 0.05;
    }
    score.clamp(0.0, 1.0)
}

/// Keep the best detection per payload, highest confidence first.
pub fn dedupe_and_rank(detections: Vec<Detection>) -> Vec<Detection> {
    let mut best: HashMap<String, Detection> = HashMap::new();
    for detection in detections {
        match best.get(&detection.text) {
            Some(current) if current.confidence >= detection.confidence => {}
            _ => {
                best.insert(detection.text.clone(), detection);
            }
        }
    }
    let mut ranked: Vec<Detection> = best.into_values().collect();
    ranked.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.text.cmp(&b.text))
    });
    ranked
}

pub struct QrScanner {
    decoders: Vec<Box<dyn QrDecoder>>,
    options: ScanOptions,
}

impl QrScanner {
    pub fn new(decoders: Vec<Box<dyn QrDecoder>>, options: ScanOptions) -> Self {
        Self { decoders, options }
    }

    pub fn with_default_decoders(options: ScanOptions) -> Self {
        Self::new(default_decoders(), options)
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    pub fn scan_bytes(&self, bytes: &[u8]) -> Result<Vec<Detection>, ImageError> {
        self.scan_image(&decode(bytes)?)
    }

    pub fn scan_image(&self, img: &DynamicImage) -> Result<Vec<Detection>, ImageError> {
        let prepared = prepare(img, self.options.bounds)?;
        let rotations: &[Rotation] = if self.options.try_rotations {
            &Rotation::ALL
        } else {
            &[Rotation::R0]
        };

        let mut found = Vec::new();
        for variant in &prepared.variants {
            let (width, height) = variant.image.dimensions();
            for region in regions(width, height, self.options.scan_regions) {
                let cropped = region.crop(&variant.image);
                for &rotation in rotations {
                    let rotated = rotation.apply(&cropped);
                    for decoder in &self.decoders {
                        let hits = match catch_unwind(AssertUnwindSafe(|| {
                            decoder.attempt_decode(&rotated)
                        })) {
                            Ok(hits) => hits,
                            Err(_) => {
                                warn!(
                                    decoder = decoder.name(),
                                    variant = ?variant.kind,
                                    region = ?region.kind,
                                    rotation = rotation.degrees(),
                                    "decoder panicked, skipping combination"
                                );
                                continue;
                            }
                        };
                        for hit in hits.into_iter().filter(|h| !h.text.is_empty()) {
                            found.push(build_detection(
                                hit,
                                decoder.as_ref(),
                                variant.kind,
                                &region,
                                rotation,
                                prepared.scale,
                            ));
                        }
                    }
                }
            }
        }

        debug!(raw = found.len(), "scan finished");
        Ok(dedupe_and_rank(found))
    }
}

fn build_detection(
    hit: RawDecode,
    decoder: &dyn QrDecoder,
    variant: VariantKind,
    region: &Region,
    rotation: Rotation,
    scale: f32,
) -> Detection {
    let position = bounding_box(&hit.points, region, rotation, scale);
    Detection {
        confidence: confidence(
            decoder.base_confidence(),
            position.is_some(),
            hit.text.len(),
        ),
        text: hit.text,
        position,
        decoder: decoder.name(),
        variant,
        region: region.kind,
        rotation: rotation.degrees(),
    }
}

fn bounding_box(
    points: &[(f32, f32)],
    region: &Region,
    rotation: Rotation,
    scale: f32,
) -> Option<BoundingBox> {
    if points.is_empty() || scale <= 0.0 {
        return None;
    }
    let mapped = points.iter().map(|&(x, y)| {
        let (ux, uy) = rotation.map_back(x, y, region.width, region.height);
        (
            ((ux + region.x as f32) / scale).max(0.0),
            ((uy + region.y as f32) / scale).max(0.0),
        )
    });
    let (min_x, min_y, max_x, max_y) = mapped.fold(
        (f32::MAX, f32::MAX, f32::MIN, f32::MIN),
        |(lx, ly, hx, hy), (x, y)| (lx.min(x), ly.min(y), hx.max(x), hy.max(y)),
    );
    Some(BoundingBox {
        x: min_x.floor() as u32,
        y: min_y.floor() as u32,
        width: (max_x - min_x).ceil() as u32,
        height: (max_y - min_y).ceil() as u32,
    })
}
