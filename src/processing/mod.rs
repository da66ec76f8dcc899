//! Still-image post-processing
//!
//! Every captured JPEG goes through the same pipeline before it is written
//! to the gallery:
//!
//! 1. the source EXIF orientation is read (for diagnostics only),
//! 2. the image is decoded and rotated upright using the sensor and display
//!    rotation captured at shutter time,
//! 3. it is centre-cropped to the selected aspect ratio,
//! 4. it is re-encoded as JPEG and stamped with a normal EXIF orientation.

pub mod crop;
pub mod exif;
pub mod transform;

pub use crop::{best_size_for_aspect_ratio, crop_rect, rotation_degrees, video_orientation_hint, CropRect};
pub use transform::{preview_transform, PreviewTransform};

use crate::errors::CameraError;
use crate::types::{AspectRatio, DisplayRotation, Frame, LensFacing};
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Inputs captured at shutter time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StillProcessingParams {
    pub aspect_ratio: AspectRatio,
    pub sensor_orientation: u32,
    pub display_rotation: DisplayRotation,
    pub lens_facing: LensFacing,
    pub jpeg_quality: u8,
}

impl StillProcessingParams {
    pub fn new(aspect_ratio: AspectRatio) -> Self {
        Self {
            aspect_ratio,
            sensor_orientation: 0,
            display_rotation: DisplayRotation::Rotation0,
            lens_facing: LensFacing::Back,
            jpeg_quality: 100,
        }
    }

    pub fn rotation(&self) -> u32 {
        rotation_degrees(self.sensor_orientation, self.display_rotation, self.lens_facing)
    }
}

/// Result of [`process_still`]
#[derive(Debug, Clone)]
pub struct ProcessedStill {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Clockwise rotation that was applied
    pub rotation: u32,
    /// Orientation tag found on the input, if any
    pub source_orientation: Option<u32>,
    pub crop: CropRect,
}

/// Run the full still pipeline on an encoded JPEG
pub fn process_still(jpeg: &[u8], params: &StillProcessingParams) -> Result<ProcessedStill, CameraError> {
    let source_orientation = exif::read_orientation(jpeg);
    log::debug!("Source EXIF orientation: {:?}", source_orientation);

    let decoded = image::load_from_memory(jpeg)?;
    let rotation = params.rotation();
    let upright = rotate(decoded, rotation)?;

    let crop = crop_rect(upright.width(), upright.height(), params.aspect_ratio);
    let cropped = center_crop(upright, params.aspect_ratio);

    let encoded = encode_jpeg(&cropped, params.jpeg_quality)?;
    let jpeg = exif::write_normal_orientation(&encoded)?;

    log::info!(
        "Processed still: rotation {}°, ratio {}, output {}x{}",
        rotation,
        params.aspect_ratio,
        cropped.width(),
        cropped.height()
    );

    Ok(ProcessedStill {
        jpeg,
        width: cropped.width(),
        height: cropped.height(),
        rotation,
        source_orientation,
        crop,
    })
}

/// Rotate clockwise by a multiple of 90 degrees
pub fn rotate(image: DynamicImage, degrees: u32) -> Result<DynamicImage, CameraError> {
    match degrees % 360 {
        0 => Ok(image),
        90 => Ok(image.rotate90()),
        180 => Ok(image.rotate180()),
        270 => Ok(image.rotate270()),
        other => Err(CameraError::ProcessingError(format!(
            "Unsupported rotation {}° (must be a multiple of 90)",
            other
        ))),
    }
}

/// Centre-crop to `ratio`; `Full` returns the image untouched
pub fn center_crop(image: DynamicImage, ratio: AspectRatio) -> DynamicImage {
    let rect = crop_rect(image.width(), image.height(), ratio);
    if rect.is_full(image.width(), image.height()) {
        return image;
    }
    image.crop_imm(rect.x, rect.y, rect.width, rect.height)
}

/// Encode as baseline JPEG at `quality` (clamped to 1-100)
/// Packed RGB8 camera frame to JPEG
pub fn encode_frame_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>, CameraError> {
    let rgb = image::RgbImage::from_vec(frame.width, frame.height, frame.data.clone())
        .ok_or_else(|| CameraError::CaptureError("Frame buffer does not match its size".to_string()))?;
    encode_jpeg(&DynamicImage::ImageRgb8(rgb), quality)
}

pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, CameraError> {
    let quality = quality.clamp(1, 100);
    let rgb = DynamicImage::ImageRgb8(image.to_rgb8());

    let mut buffer = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
    rgb.write_with_encoder(encoder)
        .map_err(|e| CameraError::ProcessingError(format!("JPEG encoding failed: {}", e)))?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::synthetic_jpeg;

    #[test]
    fn test_process_still_rotates_and_crops() {
        // landscape sensor buffer, back camera mounted at 90°
        let jpeg = synthetic_jpeg(400, 300, None);
        let mut params = StillProcessingParams::new(AspectRatio::Ratio1x1);
        params.sensor_orientation = 90;

        let out = process_still(&jpeg, &params).unwrap();
        assert_eq!(out.rotation, 90);
        assert_eq!((out.width, out.height), (300, 300));
        assert_eq!(exif::read_orientation(&out.jpeg), Some(exif::ORIENTATION_NORMAL));

        let decoded = image::load_from_memory(&out.jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (300, 300));
    }

    #[test]
    fn test_process_still_full_keeps_upright_dimensions() {
        let jpeg = synthetic_jpeg(400, 300, Some(6));
        let mut params = StillProcessingParams::new(AspectRatio::Full);
        params.sensor_orientation = 90;

        let out = process_still(&jpeg, &params).unwrap();
        assert_eq!(out.source_orientation, Some(6));
        assert_eq!((out.width, out.height), (300, 400));
        assert!(out.crop.is_full(300, 400));
    }

    #[test]
    fn test_front_camera_rotation() {
        let mut params = StillProcessingParams::new(AspectRatio::Full);
        params.lens_facing = LensFacing::Front;
        params.sensor_orientation = 270;
        params.display_rotation = DisplayRotation::Rotation90;
        assert_eq!(params.rotation(), 0);
    }

    #[test]
    fn test_rotate_rejects_odd_angles() {
        let img = DynamicImage::new_rgb8(4, 2);
        assert!(rotate(img.clone(), 45).is_err());
        let turned = rotate(img, 270).unwrap();
        assert_eq!((turned.width(), turned.height()), (2, 4));
    }

    #[test]
    fn test_encode_frame_jpeg() {
        let frame = Frame {
            sequence: 0,
            timestamp_us: 0,
            width: 8,
            height: 4,
            data: vec![200; 8 * 4 * 3],
        };
        let jpeg = encode_frame_jpeg(&frame, 90).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

        let short = Frame { data: vec![0; 3], ..frame };
        assert!(encode_frame_jpeg(&short, 90).is_err());
    }

    #[test]
    fn test_process_still_rejects_garbage() {
        let params = StillProcessingParams::new(AspectRatio::Full);
        assert!(matches!(
            process_still(b"not a jpeg", &params),
            Err(CameraError::ProcessingError(_))
        ));
    }
}
