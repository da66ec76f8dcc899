//! EXIF orientation handling for JPEG stills.
//!
//! Stills leave the pipeline with their pixels already upright, so the only
//! metadata written back is an orientation tag of 1 (normal).

use crate::errors::CameraError;
use exif::experimental::Writer;
use exif::{Field, In, Reader, Tag, Value};
use std::io::Cursor;

/// EXIF value meaning "rows top to bottom, columns left to right"
pub const ORIENTATION_NORMAL: u32 = 1;

const SOI: [u8; 2] = [0xFF, 0xD8];
const APP1: u8 = 0xE1;
const SOS: u8 = 0xDA;
const EOI: u8 = 0xD9;
const EXIF_HEADER: &[u8; 6] = b"Exif\0\0";

/// Orientation tag of the primary image, if the JPEG carries one
pub fn read_orientation(jpeg: &[u8]) -> Option<u32> {
    let mut cursor = Cursor::new(jpeg);
    let exif = Reader::new().read_from_container(&mut cursor).ok()?;
    let field = exif.get_field(Tag::Orientation, In::PRIMARY)?;
    field.value.get_uint(0)
}

/// Replace any EXIF block in `jpeg` with one whose orientation is normal
pub fn write_normal_orientation(jpeg: &[u8]) -> Result<Vec<u8>, CameraError> {
    write_orientation(jpeg, ORIENTATION_NORMAL)
}

/// Replace any EXIF block in `jpeg` with a single orientation tag
pub fn write_orientation(jpeg: &[u8], orientation: u32) -> Result<Vec<u8>, CameraError> {
    if jpeg.len() < 4 || jpeg[..2] != SOI {
        return Err(CameraError::ProcessingError(
            "Not a JPEG stream (missing SOI marker)".to_string(),
        ));
    }
    if !(1..=8).contains(&orientation) {
        return Err(CameraError::ProcessingError(format!(
            "Invalid EXIF orientation {}",
            orientation
        )));
    }

    let app1 = orientation_segment(orientation)?;

    let mut out = Vec::with_capacity(jpeg.len() + app1.len());
    out.extend_from_slice(&SOI);
    out.extend_from_slice(&app1);

    let mut pos = 2;
    while pos < jpeg.len() {
        if jpeg[pos] != 0xFF {
            return Err(CameraError::ProcessingError(format!(
                "Corrupt JPEG marker at offset {}",
                pos
            )));
        }
        let marker = jpeg
            .get(pos + 1)
            .copied()
            .ok_or_else(|| CameraError::ProcessingError("Truncated JPEG marker".to_string()))?;

        match marker {
            // fill byte before a marker
            0xFF => {
                pos += 1;
                continue;
            }
            // entropy-coded data follows, copy the rest verbatim
            SOS | EOI => {
                out.extend_from_slice(&jpeg[pos..]);
                return Ok(out);
            }
            0x01 | 0xD0..=0xD7 => {
                out.extend_from_slice(&jpeg[pos..pos + 2]);
                pos += 2;
                continue;
            }
            _ => {}
        }

        let len_bytes = jpeg
            .get(pos + 2..pos + 4)
            .ok_or_else(|| CameraError::ProcessingError("Truncated JPEG segment".to_string()))?;
        let len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
        let end = pos + 2 + len;
        if len < 2 || end > jpeg.len() {
            return Err(CameraError::ProcessingError(format!(
                "JPEG segment at offset {} overruns the stream",
                pos
            )));
        }

        let is_exif = marker == APP1 && jpeg[pos + 4..end].starts_with(EXIF_HEADER);
        if !is_exif {
            out.extend_from_slice(&jpeg[pos..end]);
        }
        pos = end;
    }

    Ok(out)
}

/// Complete APP1 segment (marker, length, header, TIFF body)
fn orientation_segment(orientation: u32) -> Result<Vec<u8>, CameraError> {
    let field = Field {
        tag: Tag::Orientation,
        ifd_num: In::PRIMARY,
        value: Value::Short(vec![orientation as u16]),
    };

    let mut writer = Writer::new();
    writer.push_field(&field);
    let mut tiff = Cursor::new(Vec::new());
    writer
        .write(&mut tiff, false)
        .map_err(|e| CameraError::ProcessingError(format!("Failed to build EXIF block: {}", e)))?;
    let tiff = tiff.into_inner();

    let payload_len = 2 + EXIF_HEADER.len() + tiff.len();
    let payload_len = u16::try_from(payload_len)
        .map_err(|_| CameraError::ProcessingError("EXIF block too large".to_string()))?;

    let mut segment = Vec::with_capacity(payload_len as usize + 2);
    segment.extend_from_slice(&[0xFF, APP1]);
    segment.extend_from_slice(&payload_len.to_be_bytes());
    segment.extend_from_slice(EXIF_HEADER);
    segment.extend_from_slice(&tiff);
    Ok(segment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::synthetic_jpeg;

    #[test]
    fn test_plain_jpeg_has_no_orientation() {
        let jpeg = synthetic_jpeg(32, 16, None);
        assert_eq!(read_orientation(&jpeg), None);
    }

    #[test]
    fn test_writes_normal_orientation() {
        let jpeg = synthetic_jpeg(32, 16, None);
        let tagged = write_normal_orientation(&jpeg).unwrap();
        assert_eq!(read_orientation(&tagged), Some(ORIENTATION_NORMAL));
        // pixels still decode
        let img = image::load_from_memory(&tagged).unwrap();
        assert_eq!((img.width(), img.height()), (32, 16));
    }

    #[test]
    fn test_replaces_existing_orientation() {
        let jpeg = synthetic_jpeg(16, 16, Some(6));
        assert_eq!(read_orientation(&jpeg), Some(6));

        let normalized = write_normal_orientation(&jpeg).unwrap();
        assert_eq!(read_orientation(&normalized), Some(ORIENTATION_NORMAL));

        let exif_blocks = normalized
            .windows(EXIF_HEADER.len())
            .filter(|w| *w == EXIF_HEADER)
            .count();
        assert_eq!(exif_blocks, 1);
    }

    #[test]
    fn test_rejects_non_jpeg() {
        assert!(write_normal_orientation(b"\x89PNG\r\n").is_err());
    }
}
