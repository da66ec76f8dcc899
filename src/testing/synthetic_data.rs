//! Deterministic image data for offline tests

use crate::processing::exif::write_orientation;
use crate::processing::encode_jpeg;
use crate::types::Frame;

/// RGB gradient frame that shifts with `sequence`
pub fn synthetic_frame(sequence: u64, width: u32, height: u32) -> Frame {
    let mut data = vec![0u8; (width * height * 3) as usize];
    let base = (sequence % 256) as u8;
    for y in 0..height {
        for x in 0..width {
            let idx = ((y * width + x) * 3) as usize;
            data[idx] = base.wrapping_add((x % 256) as u8);
            data[idx + 1] = base.wrapping_add((y % 256) as u8);
            data[idx + 2] = base.wrapping_add(((x + y) % 256) as u8);
        }
    }

    Frame {
        sequence,
        timestamp_us: sequence * 33_333,
        width,
        height,
        data,
    }
}

/// Gradient JPEG, optionally tagged with an EXIF orientation (1-8)
pub fn synthetic_jpeg(width: u32, height: u32, orientation: Option<u32>) -> Vec<u8> {
    let frame = synthetic_frame(0, width, height);
    let Some(rgb) = image::RgbImage::from_vec(width, height, frame.data) else {
        return Vec::new();
    };
    let Ok(jpeg) = encode_jpeg(&image::DynamicImage::ImageRgb8(rgb), 90) else {
        return Vec::new();
    };
    match orientation {
        Some(tag) => write_orientation(&jpeg, tag).unwrap_or(jpeg),
        None => jpeg,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_layout() {
        let frame = synthetic_frame(3, 4, 2);
        assert_eq!(frame.data.len(), 4 * 2 * 3);
        assert_eq!(frame.data[0], 3);
    }

    #[test]
    fn test_jpeg_decodes() {
        let jpeg = synthetic_jpeg(20, 10, None);
        let img = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((img.width(), img.height()), (20, 10));
    }
}
