//! Decoder strategies behind one capability trait.
//!
//! Different engines miss different codes, so the scanner runs every
//! strategy on every variant/region/rotation and merges the results.

use image::GrayImage;
use rxing::BarcodeFormat;
use tracing::debug;

/// One payload read by a decoder. `points` are corner/finder coordinates in
/// the pixel space of the image that was passed in.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDecode {
    pub text: String,
    pub points: Vec<(f32, f32)>,
}

pub trait QrDecoder: Send + Sync {
    fn name(&self) -> &'static str;

    /// Starting confidence for payloads read by this decoder.
    fn base_confidence(&self) -> f32;

    /// Decode every QR code visible in `image`. Never fails: nothing found is an empty list.
    fn attempt_decode(&self, image: &GrayImage) -> Vec<RawDecode>;
}

/// Fast grid detector; finds several codes per frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct RqrrDecoder;

impl QrDecoder for RqrrDecoder {
    fn name(&self) -> &'static str {
        "rqrr"
    }

    fn base_confidence(&self) -> f32 {
        0.7
    }

    fn attempt_decode(&self, image: &GrayImage) -> Vec<RawDecode> {
        let (width, height) = image.dimensions();
        let mut prepared =
            rqrr::PreparedImage::prepare_from_greyscale(width as usize, height as usize, |x, y| {
                image.get_pixel(x as u32, y as u32)[0]
            });

        prepared
            .detect_grids()
            .into_iter()
            .filter_map(|grid| match grid.decode() {
                Ok((_meta, text)) => Some(RawDecode {
                    text,
                    points: grid
                        .bounds
                        .iter()
                        .map(|p| (p.x as f32, p.y as f32))
                        .collect(),
                }),
                Err(e) => {
                    debug!(error = %e, "rqrr found a grid it could not decode");
                    None
                }
            })
            .collect()
    }
}

/// ZXing-derived detector; slower, more tolerant of blur and perspective.
#[derive(Debug, Clone, Copy, Default)]
pub struct RxingDecoder;

impl QrDecoder for RxingDecoder {
    fn name(&self) -> &'static str {
        "rxing"
    }

    fn base_confidence(&self) -> f32 {
        0.75
    }

    fn attempt_decode(&self, image: &GrayImage) -> Vec<RawDecode> {
        let (width, height) = image.dimensions();
        match rxing::helpers::detect_in_luma(
            image.as_raw().clone(),
            width,
            height,
            Some(BarcodeFormat::QR_CODE),
        ) {
            Ok(result) => vec![RawDecode {
                text: result.getText().to_owned(),
                points: result.getPoints().iter().map(|p| (p.x, p.y)).collect(),
            }],
            Err(_) => Vec::new(),
        }
    }
}

/// Light-weight decoder first, robust decoder second.
pub fn default_decoders() -> Vec<Box<dyn QrDecoder>> {
    vec![Box::new(RqrrDecoder), Box::new(RxingDecoder)]
}
