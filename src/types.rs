//! Value types shared across the session controller, post-processing,
//! gallery lookup and the view-models.

use crate::errors::CameraError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Target proportion applied to preview and captured output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    /// Keep whatever the sensor produces
    #[default]
    Full,
    Ratio16x9,
    Ratio4x3,
    Ratio1x1,
}

impl AspectRatio {
    /// All ratios in cycling order
    pub const ALL: [AspectRatio; 4] = [
        AspectRatio::Full,
        AspectRatio::Ratio16x9,
        AspectRatio::Ratio4x3,
        AspectRatio::Ratio1x1,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            AspectRatio::Full => "Full",
            AspectRatio::Ratio16x9 => "16:9",
            AspectRatio::Ratio4x3 => "4:3",
            AspectRatio::Ratio1x1 => "1:1",
        }
    }

    /// Stable key used when the ratio is persisted
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Full => "FULL",
            AspectRatio::Ratio16x9 => "RATIO_16_9",
            AspectRatio::Ratio4x3 => "RATIO_4_3",
            AspectRatio::Ratio1x1 => "RATIO_1_1",
        }
    }

    /// Width divided by height of the portrait output, `None` for `Full`
    pub fn target_ratio(&self) -> Option<f64> {
        match self {
            AspectRatio::Full => None,
            AspectRatio::Ratio16x9 => Some(9.0 / 16.0),
            AspectRatio::Ratio4x3 => Some(3.0 / 4.0),
            AspectRatio::Ratio1x1 => Some(1.0),
        }
    }

    /// Next ratio in cycling order, wrapping back to `Full`
    pub fn next(self) -> Self {
        let index = Self::ALL.iter().position(|r| *r == self).unwrap_or(0);
        Self::ALL[(index + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for AspectRatio {
    type Err = CameraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AspectRatio::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s) || r.display_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| CameraError::InvalidState(format!("Unknown aspect ratio: {}", s)))
    }
}

/// Photo or video; the two are mutually exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CaptureMode {
    #[default]
    Photo,
    Video,
}

impl CaptureMode {
    pub fn display_name(&self) -> &'static str {
        match self {
            CaptureMode::Photo => "Photo",
            CaptureMode::Video => "Video",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            CaptureMode::Photo => "📷",
            CaptureMode::Video => "🎥",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureMode::Photo => "PHOTO",
            CaptureMode::Video => "VIDEO",
        }
    }
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for CaptureMode {
    type Err = CameraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [CaptureMode::Photo, CaptureMode::Video]
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s) || m.display_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| CameraError::InvalidState(format!("Unknown capture mode: {}", s)))
    }
}

/// Pixel dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Width over height; zero height yields infinity
    pub fn ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    pub fn swapped(&self) -> Self {
        Self::new(self.height, self.width)
    }
}

impl Default for Size {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Which way a lens points relative to the screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LensFacing {
    Front,
    Back,
    External,
}

/// Rotation of the device display from its natural orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DisplayRotation {
    #[default]
    Rotation0,
    Rotation90,
    Rotation180,
    Rotation270,
}

impl DisplayRotation {
    pub fn degrees(&self) -> u32 {
        match self {
            DisplayRotation::Rotation0 => 0,
            DisplayRotation::Rotation90 => 90,
            DisplayRotation::Rotation180 => 180,
            DisplayRotation::Rotation270 => 270,
        }
    }

    /// Map a degree value onto a rotation; anything unknown is treated as 0
    pub fn from_degrees(degrees: u32) -> Self {
        match degrees % 360 {
            90 => DisplayRotation::Rotation90,
            180 => DisplayRotation::Rotation180,
            270 => DisplayRotation::Rotation270,
            _ => DisplayRotation::Rotation0,
        }
    }

    /// Map a quarter-turn index (0..=3) onto a rotation
    pub fn from_quarter_turns(index: i32) -> Self {
        match index {
            1 => DisplayRotation::Rotation90,
            2 => DisplayRotation::Rotation180,
            3 => DisplayRotation::Rotation270,
            _ => DisplayRotation::Rotation0,
        }
    }
}

/// Static capabilities reported by the camera service for one camera
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraCharacteristics {
    pub id: String,
    pub lens_facing: LensFacing,
    /// Clockwise angle the sensor image must be rotated to be upright
    pub sensor_orientation: u32,
    pub flash_available: bool,
    /// Whether the auto-exposure routine can drive the flash unit
    pub ae_auto_flash_supported: bool,
    pub preview_sizes: Vec<Size>,
    pub jpeg_sizes: Vec<Size>,
}

impl CameraCharacteristics {
    pub fn new(id: impl Into<String>, lens_facing: LensFacing) -> Self {
        Self {
            id: id.into(),
            lens_facing,
            sensor_orientation: 0,
            flash_available: false,
            ae_auto_flash_supported: false,
            preview_sizes: Vec::new(),
            jpeg_sizes: Vec::new(),
        }
    }

    pub fn with_sensor_orientation(mut self, degrees: u32) -> Self {
        self.sensor_orientation = degrees % 360;
        self
    }

    pub fn with_flash(mut self, available: bool) -> Self {
        self.flash_available = available;
        self.ae_auto_flash_supported = available;
        self
    }

    pub fn with_preview_sizes(mut self, sizes: Vec<Size>) -> Self {
        self.preview_sizes = sizes;
        self
    }

    pub fn with_jpeg_sizes(mut self, sizes: Vec<Size>) -> Self {
        self.jpeg_sizes = sizes;
        self
    }

    /// Largest still-image output, falling back to `fallback` when none is advertised
    pub fn largest_jpeg_size(&self, fallback: Size) -> Size {
        self.jpeg_sizes
            .iter()
            .copied()
            .max_by_key(Size::area)
            .unwrap_or(fallback)
    }
}

/// Request template, chosen per use of the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestTemplate {
    Preview,
    StillCapture,
    Record,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AfMode {
    ContinuousPicture,
    ContinuousVideo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AeMode {
    On,
    OnAutoFlash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlashMode {
    Off,
    /// Fire once for a still capture
    Single,
    /// Keep the LED lit
    Torch,
}

/// Output stream a request writes into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputTarget {
    Preview,
    StillImage,
    Recording,
}

/// A single capture request handed to the camera service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureRequest {
    pub template: RequestTemplate,
    pub targets: Vec<OutputTarget>,
    pub af_mode: Option<AfMode>,
    pub ae_mode: Option<AeMode>,
    pub flash_mode: Option<FlashMode>,
}

impl CaptureRequest {
    pub fn new(template: RequestTemplate) -> Self {
        Self {
            template,
            targets: Vec::new(),
            af_mode: None,
            ae_mode: None,
            flash_mode: None,
        }
    }

    pub fn with_target(mut self, target: OutputTarget) -> Self {
        if !self.targets.contains(&target) {
            self.targets.push(target);
        }
        self
    }

    pub fn with_af_mode(mut self, mode: AfMode) -> Self {
        self.af_mode = Some(mode);
        self
    }

    pub fn with_exposure(mut self, ae_mode: AeMode, flash_mode: FlashMode) -> Self {
        self.ae_mode = Some(ae_mode);
        self.flash_mode = Some(flash_mode);
        self
    }

    pub fn targets(&self, target: OutputTarget) -> bool {
        self.targets.contains(&target)
    }
}

/// RGB8 frame flowing from the camera into preview or recording targets
#[derive(Debug, Clone, Serialize)]
pub struct Frame {
    pub sequence: u64,
    pub timestamp_us: u64,
    pub width: u32,
    pub height: u32,
    #[serde(skip)]
    pub data: Vec<u8>,
}

/// Live preview frame handed to the UI, JPEG encoded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewFrame {
    pub sequence: u64,
    pub timestamp_us: u64,
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn default_mime_type(&self) -> &'static str {
        match self {
            MediaKind::Image => "image/jpeg",
            MediaKind::Video => "video/mp4",
        }
    }
}

/// Reference to an item in the shared media index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: String,
    pub kind: MediaKind,
    pub path: PathBuf,
    pub mime_type: String,
    /// Seconds since the Unix epoch
    pub date_added: i64,
}

/// Snapshot of everything the camera screen renders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraUiState {
    pub aspect_ratio: AspectRatio,
    pub ratio_selector_expanded: bool,
    pub camera_mode: CaptureMode,
    pub is_recording: bool,
    pub recording_time_secs: u64,
    pub preview_size: Size,
    pub flash_enabled: bool,
    pub flash_supported: bool,
    pub camera_ready: bool,
    pub current_camera_id: Option<String>,
    pub front_camera_id: Option<String>,
    pub back_camera_id: Option<String>,
    pub last_photo: Option<MediaItem>,
    pub last_video: Option<MediaItem>,
    pub latest_gallery_media: Option<MediaItem>,
}

impl Default for CameraUiState {
    fn default() -> Self {
        Self {
            aspect_ratio: AspectRatio::Full,
            ratio_selector_expanded: false,
            camera_mode: CaptureMode::Photo,
            is_recording: false,
            recording_time_secs: 0,
            preview_size: Size::default(),
            flash_enabled: false,
            flash_supported: false,
            camera_ready: false,
            current_camera_id: None,
            front_camera_id: None,
            back_camera_id: None,
            last_photo: None,
            last_video: None,
            latest_gallery_media: None,
        }
    }
}
