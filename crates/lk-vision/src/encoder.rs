//! QR rendering to PNG (raw bytes or data URL) and SVG.
//!
//! Rendering is deterministic: the same content and options always produce
//! the same bytes.

use std::io::Cursor;

use base64::{Engine, engine::general_purpose::STANDARD};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use qrcode::render::svg;
use qrcode::types::QrError;
use qrcode::{Color, EcLevel, QrCode};
use serde::{Deserialize, Serialize};

/// Millimetres per inch, for print sizing.
const MM_PER_INCH: f32 = 25.4;

/// QR error-correction level. Higher levels survive more damage but hold less data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ErrorCorrection {
    L,
    #[default]
    M,
    Q,
    H,
}

impl From<ErrorCorrection> for EcLevel {
    fn from(level: ErrorCorrection) -> Self {
        match level {
            ErrorCorrection::L => EcLevel::L,
            ErrorCorrection::M => EcLevel::M,
            ErrorCorrection::Q => EcLevel::Q,
            ErrorCorrection::H => EcLevel::H,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("content is empty")]
    Empty,
    #[error("content of {len} bytes exceeds QR capacity at error correction {level:?}")]
    Capacity { len: usize, level: ErrorCorrection },
    #[error("QR encoding failed: {0}")]
    Qr(String),
    #[error("invalid color {0:?}, expected #RRGGBB")]
    InvalidColor(String),
    #[error("PNG encoding failed: {0}")]
    Png(#[from] image::ImageError),
}

/// Rendering parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeOptions {
    /// Target edge length in pixels. The output is at least this large.
    pub size: u32,
    pub error_correction: ErrorCorrection,
    /// Quiet zone width in modules.
    pub margin: u32,
    /// `#RRGGBB`
    pub dark: String,
    /// `#RRGGBB`
    pub light: String,
}

impl EncodeOptions {
    /// On-screen display: 256 px, ECC `M`, 2-module margin.
    pub fn screen() -> Self {
        Self {
            size: 256,
            error_correction: ErrorCorrection::M,
            margin: 2,
            dark: "#000000".to_owned(),
            light: "#FFFFFF".to_owned(),
        }
    }

    /// Printed sticker of `edge_mm` millimetres at `dpi`: ECC `H`, 4-module margin.
    pub fn print(edge_mm: f32, dpi: u32) -> Self {
        let size = (edge_mm / MM_PER_INCH * dpi as f32).round().max(21.0) as u32;
        Self {
            size,
            error_correction: ErrorCorrection::H,
            margin: 4,
            ..Self::screen()
        }
    }
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self::screen()
    }
}

fn build_code(content: &str, level: ErrorCorrection) -> Result<QrCode, EncodeError> {
    if content.is_empty() {
        return Err(EncodeError::Empty);
    }
    QrCode::with_error_correction_level(content.as_bytes(), level.into()).map_err(|e| match e {
        QrError::DataTooLong => EncodeError::Capacity {
            len: content.len(),
            level,
        },
        other => EncodeError::Qr(other.to_string()),
    })
}

fn parse_hex_color(hex: &str) -> Result<Rgba<u8>, EncodeError> {
    let invalid = || EncodeError::InvalidColor(hex.to_owned());
    let digits = hex.strip_prefix('#').ok_or_else(invalid)?;
    if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).map_err(|_| invalid());
    Ok(Rgba([channel(0)?, channel(2)?, channel(4)?, 255]))
}

/// Render `content` into an RGBA raster.
pub fn render_image(content: &str, opts: &EncodeOptions) -> Result<RgbaImage, EncodeError> {
    let dark = parse_hex_color(&opts.dark)?;
    let light = parse_hex_color(&opts.light)?;
    let code = build_code(content, opts.error_correction)?;

    let modules = code.width() as u32;
    let colors = code.to_colors();
    let total = modules + 2 * opts.margin;
    let scale = (opts.size / total).max(1);
    let drawn = total * scale;
    let canvas = opts.size.max(drawn);
    let offset = (canvas - drawn) / 2 + opts.margin * scale;

    let mut img = RgbaImage::from_pixel(canvas, canvas, light);
    for (i, color) in colors.iter().enumerate() {
        if *color != Color::Dark {
            continue;
        }
        let mx = i as u32 % modules;
        let my = i as u32 / modules;
        let x0 = offset + mx * scale;
        let y0 = offset + my * scale;
        for y in y0..y0 + scale {
            for x in x0..x0 + scale {
                img.put_pixel(x, y, dark);
            }
        }
    }
    Ok(img)
}

/// Render `content` as PNG bytes.
pub fn encode_png(content: &str, opts: &EncodeOptions) -> Result<Vec<u8>, EncodeError> {
    let img = render_image(content, opts)?;
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(img).write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}

/// Render `content` as a `data:image/png;base64,…` URL.
pub fn encode_data_url(content: &str, opts: &EncodeOptions) -> Result<String, EncodeError> {
    let png = encode_png(content, opts)?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
}

/// Render `content` as an SVG document.
pub fn encode_svg(content: &str, opts: &EncodeOptions) -> Result<String, EncodeError> {
    parse_hex_color(&opts.dark)?;
    parse_hex_color(&opts.light)?;
    let code = build_code(content, opts.error_correction)?;
    Ok(code
        .render::<svg::Color<'_>>()
        .min_dimensions(opts.size, opts.size)
        .quiet_zone(opts.margin > 0)
        .dark_color(svg::Color(&opts.dark))
        .light_color(svg::Color(&opts.light))
        .build())
}
