//! Affine transform that fits the camera preview buffer onto a view.

use crate::types::{DisplayRotation, Size};
use serde::{Deserialize, Serialize};

/// 2D affine matrix, row major: `x' = a·x + b·y + c`, `y' = d·x + e·y + f`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreviewTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for PreviewTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl PreviewTransform {
    pub const fn identity() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 0.0,
            e: 1.0,
            f: 0.0,
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    /// Uniformly scale `src` to fit inside `dst`, centred
    pub fn fit_center(src: (f64, f64), dst: (f64, f64)) -> Self {
        let (sw, sh) = src;
        let (dw, dh) = dst;
        if sw <= 0.0 || sh <= 0.0 {
            return Self::identity();
        }
        let scale = (dw / sw).min(dh / sh);
        Self {
            a: scale,
            b: 0.0,
            c: (dw - sw * scale) / 2.0,
            d: 0.0,
            e: scale,
            f: (dh - sh * scale) / 2.0,
        }
    }

    /// Follow this transform with a clockwise rotation about `(px, py)`
    pub fn post_rotate(self, degrees: f64, px: f64, py: f64) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        // snap quarter turns so 90° maps exactly
        let sin = snap(sin);
        let cos = snap(cos);
        let rotation = Self {
            a: cos,
            b: -sin,
            c: px - cos * px + sin * py,
            d: sin,
            e: cos,
            f: py - sin * px - cos * py,
        };
        rotation.concat(&self)
    }

    /// `self ∘ other`: apply `other` first
    fn concat(&self, other: &Self) -> Self {
        Self {
            a: self.a * other.a + self.b * other.d,
            b: self.a * other.b + self.b * other.e,
            c: self.a * other.c + self.b * other.f + self.c,
            d: self.d * other.a + self.e * other.d,
            e: self.d * other.b + self.e * other.e,
            f: self.d * other.c + self.e * other.f + self.f,
        }
    }

    pub fn map_point(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.b * y + self.c,
            self.d * x + self.e * y + self.f,
        )
    }

    /// Nine-value 3x3 form as consumed by canvas/CSS `matrix()` style APIs
    pub fn values(&self) -> [f64; 9] {
        [self.a, self.b, self.c, self.d, self.e, self.f, 0.0, 0.0, 1.0]
    }
}

fn snap(v: f64) -> f64 {
    if v.abs() < 1e-12 {
        0.0
    } else if (v.abs() - 1.0).abs() < 1e-12 {
        v.signum()
    } else {
        v
    }
}

/// Map the preview buffer onto a `view_width`×`view_height` surface.
///
/// Sensors mounted at 90 or 270 degrees deliver buffers with width and
/// height swapped relative to the display.
pub fn preview_transform(
    view_width: u32,
    view_height: u32,
    preview_size: Size,
    sensor_orientation: u32,
    display: DisplayRotation,
) -> PreviewTransform {
    let sensor = sensor_orientation % 360;
    let buffer = if sensor == 90 || sensor == 270 {
        preview_size.swapped()
    } else {
        preview_size
    };

    let view = (view_width as f64, view_height as f64);
    let rotation = (sensor + 360 - display.degrees()) % 360;

    PreviewTransform::fit_center((buffer.width as f64, buffer.height as f64), view).post_rotate(
        rotation as f64,
        view.0 / 2.0,
        view.1 / 2.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: (f64, f64), b: (f64, f64)) -> bool {
        (a.0 - b.0).abs() < 1e-6 && (a.1 - b.1).abs() < 1e-6
    }

    #[test]
    fn test_landscape_buffer_letterboxed_in_portrait_view() {
        let m = preview_transform(1080, 1920, Size::new(1920, 1080), 0, DisplayRotation::Rotation0);
        assert!(approx(m.map_point(0.0, 0.0), (0.0, 656.25)));
        assert!(approx(m.map_point(1920.0, 1080.0), (1080.0, 1263.75)));
    }

    #[test]
    fn test_sensor_90_rotates_about_view_center() {
        let m = preview_transform(1080, 1920, Size::new(1920, 1080), 90, DisplayRotation::Rotation0);
        assert!(approx(m.map_point(540.0, 960.0), (540.0, 960.0)));
        assert!(approx(m.map_point(0.0, 0.0), (1500.0, 420.0)));
    }

    #[test]
    fn test_display_rotation_cancels_sensor() {
        let m = preview_transform(1080, 1920, Size::new(1920, 1080), 90, DisplayRotation::Rotation90);
        // swapped buffer fills the view exactly and no rotation remains
        assert!(m.is_identity());
    }

    #[test]
    fn test_values_layout() {
        let v = PreviewTransform::identity().values();
        assert_eq!(v, [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
    }
}
