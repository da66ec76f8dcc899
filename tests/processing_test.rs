//! Post-processing properties: size selection, crop geometry and the full
//! still pipeline on synthetic JPEGs.

use camerak::processing::{
    best_size_for_aspect_ratio, crop_rect, exif, process_still, rotation_degrees, StillProcessingParams,
};
use camerak::testing::synthetic_jpeg;
use camerak::types::{AspectRatio, DisplayRotation, LensFacing, Size};
use proptest::prelude::*;

const CROPPING: [AspectRatio; 3] = [AspectRatio::Ratio16x9, AspectRatio::Ratio4x3, AspectRatio::Ratio1x1];

fn short_over_long(size: Size) -> f64 {
    size.width.min(size.height) as f64 / size.width.max(size.height) as f64
}

proptest! {
    #[test]
    fn best_size_is_closest_to_target(
        dims in prop::collection::vec((1u32..5000, 1u32..5000), 1..12),
        ratio_index in 0usize..3,
    ) {
        let sizes: Vec<Size> = dims.iter().map(|&(w, h)| Size::new(w, h)).collect();
        let ratio = CROPPING[ratio_index];
        let target = ratio.target_ratio().unwrap();

        let best = best_size_for_aspect_ratio(&sizes, ratio).unwrap();
        let best_diff = (short_over_long(best) - target).abs();
        for size in &sizes {
            prop_assert!(best_diff <= (short_over_long(*size) - target).abs() + 1e-12);
        }
    }

    #[test]
    fn full_keeps_first_size(dims in prop::collection::vec((1u32..5000, 1u32..5000), 1..12)) {
        let sizes: Vec<Size> = dims.iter().map(|&(w, h)| Size::new(w, h)).collect();
        prop_assert_eq!(best_size_for_aspect_ratio(&sizes, AspectRatio::Full), Some(sizes[0]));
    }

    #[test]
    fn crop_is_centred_sub_rectangle(width in 1u32..6000, height in 1u32..6000, ratio_index in 0usize..3) {
        let ratio = CROPPING[ratio_index];
        let rect = crop_rect(width, height, ratio);

        prop_assert!(rect.width >= 1 && rect.width <= width);
        prop_assert!(rect.height >= 1 && rect.height <= height);
        prop_assert!(rect.width == width || rect.height == height);
        prop_assert_eq!(rect.x, (width - rect.width) / 2);
        prop_assert_eq!(rect.y, (height - rect.height) / 2);
    }

    #[test]
    fn crop_matches_target_ratio(width in 100u32..6000, height in 100u32..6000, ratio_index in 0usize..3) {
        let ratio = CROPPING[ratio_index];
        let target = ratio.target_ratio().unwrap();
        let rect = crop_rect(width, height, ratio);

        // flooring loses at most one pixel on the cropped side
        let tolerance = 1.0 / rect.height.min(rect.width) as f64 + 1e-9;
        let got = rect.width as f64 / rect.height as f64;
        prop_assert!(((got - target) / target).abs() <= tolerance * 2.0, "{}x{} -> {:?}", width, height, rect);
    }

    #[test]
    fn rotation_is_quarter_turn(sensor in prop::sample::select(vec![0u32, 90, 180, 270]), display in 0i32..4, front in any::<bool>()) {
        let facing = if front { LensFacing::Front } else { LensFacing::Back };
        let degrees = rotation_degrees(sensor, DisplayRotation::from_quarter_turns(display), facing);
        prop_assert!(degrees < 360);
        prop_assert_eq!(degrees % 90, 0);
    }
}

#[test]
fn test_crop_examples() {
    let rect = crop_rect(3000, 4000, AspectRatio::Ratio16x9);
    assert_eq!((rect.width, rect.height), (2250, 4000));
    assert_eq!((rect.x, rect.y), (375, 0));

    let rect = crop_rect(3000, 4000, AspectRatio::Ratio1x1);
    assert_eq!((rect.x, rect.y, rect.width, rect.height), (0, 500, 3000, 3000));

    let rect = crop_rect(3000, 4000, AspectRatio::Full);
    assert!(rect.is_full(3000, 4000));
}

#[test]
fn test_front_and_back_rotation() {
    assert_eq!(rotation_degrees(90, DisplayRotation::Rotation90, LensFacing::Back), 0);
    assert_eq!(rotation_degrees(270, DisplayRotation::Rotation90, LensFacing::Front), 0);
    assert_eq!(rotation_degrees(270, DisplayRotation::Rotation0, LensFacing::Front), 270);
    assert_eq!(rotation_degrees(0, DisplayRotation::Rotation270, LensFacing::External), 90);
}

#[test]
fn test_process_still_rotates_crops_and_normalizes() {
    let jpeg = synthetic_jpeg(160, 120, Some(6));
    assert_eq!(exif::read_orientation(&jpeg), Some(6));

    let params = StillProcessingParams {
        sensor_orientation: 90,
        jpeg_quality: 90,
        ..StillProcessingParams::new(AspectRatio::Ratio4x3)
    };
    let processed = process_still(&jpeg, &params).unwrap();

    assert_eq!(processed.rotation, 90);
    assert_eq!(processed.source_orientation, Some(6));
    assert_eq!((processed.width, processed.height), (120, 160));
    assert_eq!(exif::read_orientation(&processed.jpeg), Some(exif::ORIENTATION_NORMAL));

    let decoded = image::load_from_memory(&processed.jpeg).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (120, 160));
}

#[test]
fn test_process_still_square_from_landscape() {
    let jpeg = synthetic_jpeg(160, 120, None);
    let processed = process_still(&jpeg, &StillProcessingParams::new(AspectRatio::Ratio1x1)).unwrap();
    assert_eq!((processed.width, processed.height), (120, 120));
    assert_eq!(processed.crop.x, 20);
    assert_eq!(processed.source_orientation, None);
}

#[test]
fn test_process_still_rejects_garbage() {
    let err = process_still(b"not a jpeg", &StillProcessingParams::new(AspectRatio::Full)).unwrap_err();
    assert!(err.to_string().contains("Image processing error"));
}
