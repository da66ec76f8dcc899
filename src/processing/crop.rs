//! Aspect-ratio arithmetic: output size selection, crop rectangles and
//! rotation angles.

use crate::types::{AspectRatio, DisplayRotation, LensFacing, Size};
use serde::{Deserialize, Serialize};

/// Rectangle inside a source image, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    pub fn is_full(&self, width: u32, height: u32) -> bool {
        *self == Self::full(width, height)
    }
}

/// Pick the output size whose proportion is closest to `ratio`.
///
/// Camera outputs are listed landscape while targets describe the portrait
/// frame, so both sides are compared as short edge over long edge. `Full`
/// keeps the first advertised size. Ties keep the earlier entry.
pub fn best_size_for_aspect_ratio(sizes: &[Size], ratio: AspectRatio) -> Option<Size> {
    let first = *sizes.first()?;
    let Some(target) = ratio.target_ratio() else {
        return Some(first);
    };

    let mut best: Option<(Size, f64)> = None;
    for size in sizes.iter().copied() {
        if size.width == 0 || size.height == 0 {
            continue;
        }
        let diff = (normalized_ratio(size) - target).abs();
        match best {
            Some((_, best_diff)) if diff >= best_diff => {}
            _ => best = Some((size, diff)),
        }
    }

    Some(best.map(|(size, _)| size).unwrap_or(first))
}

fn normalized_ratio(size: Size) -> f64 {
    let short = size.width.min(size.height) as f64;
    let long = size.width.max(size.height) as f64;
    short / long
}

/// Centered crop of a `width`×`height` image to `ratio`.
///
/// Too-wide images lose columns (`floor(height × target)` are kept), too-tall
/// images lose rows (`floor(width / target)` are kept).
pub fn crop_rect(width: u32, height: u32, ratio: AspectRatio) -> CropRect {
    let Some(target) = ratio.target_ratio() else {
        return CropRect::full(width, height);
    };
    if width == 0 || height == 0 {
        return CropRect::full(width, height);
    }

    let current = width as f64 / height as f64;
    let mut crop_width = width;
    let mut crop_height = height;
    if current > target {
        crop_width = ((height as f64 * target) as u32).clamp(1, width);
    } else if current < target {
        crop_height = ((width as f64 / target) as u32).clamp(1, height);
    }

    CropRect {
        x: (width - crop_width) / 2,
        y: (height - crop_height) / 2,
        width: crop_width,
        height: crop_height,
    }
}

/// Clockwise rotation that makes a sensor image upright for the current
/// display rotation. Front lenses are mirrored, so their angles add.
pub fn rotation_degrees(sensor_orientation: u32, display: DisplayRotation, facing: LensFacing) -> u32 {
    let sensor = sensor_orientation % 360;
    let display = display.degrees();
    match facing {
        LensFacing::Front => (sensor + display) % 360,
        LensFacing::Back | LensFacing::External => (sensor + 360 - display) % 360,
    }
}

/// Orientation hint stamped into recorded video
pub fn video_orientation_hint(sensor_orientation: u32, display: DisplayRotation) -> u32 {
    (sensor_orientation % 360 + 360 - display.degrees()) % 360
}
