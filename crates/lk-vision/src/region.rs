//! Sub-regions and rotations scanned per variant.
//!
//! A small sticker in a corner of a class photo is easier to decode from an
//! overlapping quadrant than from the downscaled full frame.

use std::borrow::Cow;

use image::{GrayImage, imageops};
use serde::Serialize;

/// Share of each dimension covered by a quadrant. Above 0.5 so quadrants
/// overlap and a code sitting on a seam is whole in at least one of them.
pub const QUADRANT_FRACTION: f32 = 0.6;

/// Quadrants are skipped when they would be smaller than this on either edge.
pub const MIN_QUADRANT_EDGE: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    Full,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub kind: RegionKind,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn crop<'a>(&self, img: &'a GrayImage) -> Cow<'a, GrayImage> {
        if self.kind == RegionKind::Full {
            return Cow::Borrowed(img);
        }
        Cow::Owned(imageops::crop_imm(img, self.x, self.y, self.width, self.height).to_image())
    }
}

/// The full frame, followed by four overlapping quadrants when requested.
pub fn regions(width: u32, height: u32, include_quadrants: bool) -> Vec<Region> {
    let mut out = vec![Region {
        kind: RegionKind::Full,
        x: 0,
        y: 0,
        width,
        height,
    }];

    let qw = (width as f32 * QUADRANT_FRACTION).ceil() as u32;
    let qh = (height as f32 * QUADRANT_FRACTION).ceil() as u32;
    if !include_quadrants || qw < MIN_QUADRANT_EDGE || qh < MIN_QUADRANT_EDGE {
        return out;
    }

    let right = width - qw;
    let bottom = height - qh;
    for (kind, x, y) in [
        (RegionKind::TopLeft, 0, 0),
        (RegionKind::TopRight, right, 0),
        (RegionKind::BottomLeft, 0, bottom),
        (RegionKind::BottomRight, right, bottom),
    ] {
        out.push(Region {
            kind,
            x,
            y,
            width: qw,
            height: qh,
        });
    }
    out
}

/// Clockwise rotation applied before decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rotation {
    R0,
    R90,
    R180,
    R270,
}

impl Rotation {
    pub const ALL: [Rotation; 4] = [Rotation::R0, Rotation::R90, Rotation::R180, Rotation::R270];

    pub const fn degrees(self) -> u16 {
        match self {
            Rotation::R0 => 0,
            Rotation::R90 => 90,
            Rotation::R180 => 180,
            Rotation::R270 => 270,
        }
    }

    pub fn apply<'a>(self, img: &'a GrayImage) -> Cow<'a, GrayImage> {
        match self {
            Rotation::R0 => Cow::Borrowed(img),
            Rotation::R90 => Cow::Owned(imageops::rotate90(img)),
            Rotation::R180 => Cow::Owned(imageops::rotate180(img)),
            Rotation::R270 => Cow::Owned(imageops::rotate270(img)),
        }
    }

    /// Map a point found in the rotated image back to the unrotated one.
    /// `width`/`height` are the dimensions before rotation.
    pub fn map_back(self, x: f32, y: f32, width: u32, height: u32) -> (f32, f32) {
        let max_x = width.saturating_sub(1) as f32;
        let max_y = height.saturating_sub(1) as f32;
        match self {
            Rotation::R0 => (x, y),
            Rotation::R90 => (y, max_y - x),
            Rotation::R180 => (max_x - x, max_y - y),
            Rotation::R270 => (max_x - y, x),
        }
    }
}
