//! Video recording
//!
//! The view-model drives recording through the [`MediaRecorder`] trait:
//! `prepare` creates the output file and hands back the [`FrameSink`] that
//! becomes the capture session's recording target, `start` begins accepting
//! frames once that session is configured, `stop` finalizes the file.
//!
//! With the `recording` feature, [`H264Recorder`] encodes with openh264 and
//! muxes into MP4 with muxide.

#[cfg(feature = "recording")]
mod encoder;
#[cfg(feature = "recording")]
mod recorder;

#[cfg(feature = "recording")]
pub use encoder::{EncodedFrame, H264Encoder};
#[cfg(feature = "recording")]
pub use recorder::H264Recorder;

use crate::errors::CameraError;
use crate::platform::FrameSink;
use crate::types::Size;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Encoder parameters for one recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingSettings {
    pub size: Size,
    pub fps: u32,
    /// Bits per second
    pub bitrate: u32,
    /// Clockwise rotation players should apply, in degrees
    pub orientation_hint: u32,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            size: Size::new(1920, 1080),
            fps: 30,
            bitrate: 10_000_000,
            orientation_hint: 0,
        }
    }
}

impl RecordingSettings {
    pub fn with_orientation_hint(mut self, degrees: u32) -> Self {
        self.orientation_hint = degrees % 360;
        self
    }

    pub fn frame_duration_secs(&self) -> f64 {
        1.0 / self.fps.max(1) as f64
    }
}

/// Summary returned when a recording is finalized
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordingStats {
    pub video_frames: u64,
    pub duration_secs: f64,
    pub bytes_written: u64,
    pub dropped_frames: u64,
    pub output_path: PathBuf,
}

/// Video encoding delegate
pub trait MediaRecorder: Send + Sync {
    /// Create the output and return the sink frames should be written to
    fn prepare(&self, output: &Path, settings: &RecordingSettings) -> Result<Arc<dyn FrameSink>, CameraError>;

    /// Begin accepting frames
    fn start(&self) -> Result<(), CameraError>;

    /// Finalize the output; the recorder is reusable afterwards
    fn stop(&self) -> Result<RecordingStats, CameraError>;

    fn is_recording(&self) -> bool;
}

/// Recorder used by the Tauri plugin, if this build has one
pub fn default_recorder() -> Option<Arc<dyn MediaRecorder>> {
    #[cfg(feature = "recording")]
    {
        Some(Arc::new(H264Recorder::new()))
    }
    #[cfg(not(feature = "recording"))]
    {
        log::warn!("Built without the `recording` feature; video capture is unavailable");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_match_capture_profile() {
        let settings = RecordingSettings::default();
        assert_eq!(settings.size, Size::new(1920, 1080));
        assert_eq!(settings.fps, 30);
        assert_eq!(settings.bitrate, 10_000_000);
        assert_eq!(settings.orientation_hint, 0);
    }

    #[test]
    fn test_orientation_hint_wraps() {
        let settings = RecordingSettings::default().with_orientation_hint(450);
        assert_eq!(settings.orientation_hint, 90);
        assert!((settings.frame_duration_secs() - 1.0 / 30.0).abs() < f64::EPSILON);
    }
}
