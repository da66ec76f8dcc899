//! H.264 encoder wrapper using openh264

use crate::errors::CameraError;
use openh264::encoder::{BitRate, Encoder, EncoderConfig, FrameRate, FrameType, RateControlMode};
use openh264::formats::YUVBuffer;
use openh264::OpenH264API;

pub struct H264Encoder {
    encoder: Encoder,
    width: u32,
    height: u32,
    bitrate: u32,
    fps: u32,
    frame_count: u64,
}

/// Encoded access unit in Annex B form
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub data: Vec<u8>,
    pub is_keyframe: bool,
}

impl H264Encoder {
    /// Dimensions must be even. `bitrate` is the target in bits per second;
    /// openh264 infers the frame size from the YUV source at encode time.
    pub fn new(width: u32, height: u32, bitrate: u32, fps: u32) -> Result<Self, CameraError> {
        if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
            return Err(CameraError::RecordingError(format!(
                "H.264 needs even, non-zero dimensions, got {}x{}",
                width, height
            )));
        }
        if bitrate == 0 || fps == 0 {
            return Err(CameraError::RecordingError(format!(
                "H.264 needs a bitrate and frame rate, got {} bps at {} fps",
                bitrate, fps
            )));
        }

        let config = EncoderConfig::new()
            .bitrate(BitRate::from_bps(bitrate))
            .max_frame_rate(FrameRate::from_hz(fps as f32))
            .rate_control_mode(RateControlMode::Bitrate);
        let encoder = Encoder::with_api_config(OpenH264API::from_source(), config)
            .map_err(|e| CameraError::RecordingError(format!("Failed to create encoder: {}", e)))?;

        log::debug!("H.264 encoder {}x{} at {} bps, {} fps", width, height, bitrate, fps);
        Ok(Self {
            encoder,
            width,
            height,
            bitrate,
            fps,
            frame_count: 0,
        })
    }

    pub fn bitrate(&self) -> u32 {
        self.bitrate
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn encode_rgb(&mut self, rgb: &[u8]) -> Result<EncodedFrame, CameraError> {
        let expected = (self.width * self.height * 3) as usize;
        if rgb.len() != expected {
            return Err(CameraError::RecordingError(format!(
                "Invalid frame size: expected {} bytes, got {}",
                expected,
                rgb.len()
            )));
        }

        let yuv = YUVBuffer::from_vec(
            rgb_to_yuv420(rgb, self.width, self.height),
            self.width as usize,
            self.height as usize,
        );

        let bitstream = self
            .encoder
            .encode(&yuv)
            .map_err(|e| CameraError::RecordingError(format!("Encoding failed: {}", e)))?;

        self.frame_count += 1;
        let is_keyframe = matches!(bitstream.frame_type(), FrameType::IDR | FrameType::I);

        Ok(EncodedFrame {
            data: bitstream.to_vec(),
            is_keyframe,
        })
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

/// Packed RGB24 to planar I420 (BT.601, 2x2 chroma subsampling)
pub(crate) fn rgb_to_yuv420(rgb: &[u8], width: u32, height: u32) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;

    let y_size = w * h;
    let uv_size = (w / 2) * (h / 2);
    let mut yuv = vec![0u8; y_size + uv_size * 2];

    let (y_plane, uv_planes) = yuv.split_at_mut(y_size);
    let (u_plane, v_plane) = uv_planes.split_at_mut(uv_size);

    for y in 0..h {
        for x in 0..w {
            let idx = (y * w + x) * 3;
            let r = rgb[idx] as i32;
            let g = rgb[idx + 1] as i32;
            let b = rgb[idx + 2] as i32;

            let luma = ((66 * r + 129 * g + 25 * b + 128) >> 8) + 16;
            y_plane[y * w + x] = luma.clamp(0, 255) as u8;

            if y % 2 == 0 && x % 2 == 0 {
                let uv_idx = (y / 2) * (w / 2) + (x / 2);
                let u = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
                let v = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;
                u_plane[uv_idx] = u.clamp(0, 255) as u8;
                v_plane[uv_idx] = v.clamp(0, 255) as u8;
            }
        }
    }

    yuv
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuv_plane_sizes() {
        let rgb = vec![128u8; 64 * 48 * 3];
        assert_eq!(rgb_to_yuv420(&rgb, 64, 48).len(), 64 * 48 * 3 / 2);
    }

    #[test]
    fn test_white_maps_to_studio_swing_luma() {
        let rgb = vec![255u8; 2 * 2 * 3];
        let yuv = rgb_to_yuv420(&rgb, 2, 2);
        assert_eq!(&yuv[..4], &[235, 235, 235, 235]);
        assert_eq!(yuv[4], 128);
        assert_eq!(yuv[5], 128);
    }

    #[test]
    fn test_rejects_odd_dimensions() {
        assert!(H264Encoder::new(641, 480, 10_000_000, 30).is_err());
    }

    #[test]
    fn test_rate_control_comes_from_settings() {
        let encoder = H264Encoder::new(320, 240, 2_000_000, 24).unwrap();
        assert_eq!(encoder.bitrate(), 2_000_000);
        assert_eq!(encoder.fps(), 24);
        assert!(H264Encoder::new(320, 240, 0, 24).is_err());
        assert!(H264Encoder::new(320, 240, 2_000_000, 0).is_err());
    }

    #[test]
    fn test_first_frame_is_keyframe() {
        let mut encoder = H264Encoder::new(320, 240, 1_000_000, 30).unwrap();
        let encoded = encoder.encode_rgb(&vec![90u8; 320 * 240 * 3]).unwrap();
        assert!(!encoded.data.is_empty());
        assert!(encoded.is_keyframe);
        assert_eq!(encoder.frame_count(), 1);
    }
}
