//! Photo decoding and the grayscale variants handed to the decoders.
//!
//! Decoders are sensitive to lighting, so each photo is scanned as three
//! variants: the resized base, a contrast-boosted copy, and a
//! histogram-stretched copy.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, GrayImage, Luma};
use serde::Serialize;

pub const DEFAULT_MAX_WIDTH: u32 = 1920;
pub const DEFAULT_MAX_HEIGHT: u32 = 1080;

const CONTRAST_BOOST: f32 = 40.0;

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("image has zero width or height")]
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantKind {
    Base,
    Contrast,
    Normalized,
}

/// Largest working size; bigger photos are downscaled preserving aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageBounds {
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for ImageBounds {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
        }
    }
}

pub struct Variant {
    pub kind: VariantKind,
    pub image: GrayImage,
}

pub struct PreparedImage {
    pub original_width: u32,
    pub original_height: u32,
    /// Working width divided by original width (1.0 when not resized).
    pub scale: f32,
    pub variants: Vec<Variant>,
}

pub fn decode(bytes: &[u8]) -> Result<DynamicImage, ImageError> {
    Ok(image::load_from_memory(bytes)?)
}

pub fn prepare(img: &DynamicImage, bounds: ImageBounds) -> Result<PreparedImage, ImageError> {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(ImageError::Empty);
    }

    let resized = if width > bounds.max_width || height > bounds.max_height {
        img.resize(bounds.max_width, bounds.max_height, FilterType::Triangle)
    } else {
        img.clone()
    };
    let scale = resized.width() as f32 / width as f32;

    let base = resized.to_luma8();
    let contrast = resized.adjust_contrast(CONTRAST_BOOST).to_luma8();
    let normalized = stretch_histogram(&base);

    Ok(PreparedImage {
        original_width: width,
        original_height: height,
        scale,
        variants: vec![
            Variant {
                kind: VariantKind::Base,
                image: base,
            },
            Variant {
                kind: VariantKind::Contrast,
                image: contrast,
            },
            Variant {
                kind: VariantKind::Normalized,
                image: normalized,
            },
        ],
    })
}

/// Linearly remap luminance so the darkest pixel becomes 0 and the brightest 255.
pub fn stretch_histogram(img: &GrayImage) -> GrayImage {
    let (min, max) = img
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
    if max <= min.saturating_add(1) {
        return img.clone();
    }
    let range = u32::from(max - min);
    let mut out = img.clone();
    for p in out.pixels_mut() {
        let v = u32::from(p[0] - min) * 255 / range;
        *p = Luma([v as u8]);
    }
    out
}
