//! Camera service abstraction
//!
//! The session controller never talks to hardware directly. It drives a
//! [`CameraService`] and reacts to the [`SessionEvent`]s the service posts on
//! an unbounded channel. Every event carries the generation it was issued
//! under so callbacks from a torn-down session can be told apart from live
//! ones.

pub mod desktop;
pub mod frame_queue;

pub use desktop::DesktopCameraService;
pub use frame_queue::FrameQueue;

use crate::errors::CameraError;
use crate::types::{CameraCharacteristics, CaptureRequest, Frame, Size};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// What a capture session was configured for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPurpose {
    Preview,
    Recording,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEventKind {
    Opened,
    Disconnected,
    /// Device error with the backend's numeric code
    Error(i32),
    SessionConfigured(SessionPurpose),
    ConfigureFailed(SessionPurpose),
    CaptureCompleted,
    CaptureFailed(String),
    /// Encoded JPEG from the still-image target
    ImageAvailable(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    pub generation: u64,
    pub camera_id: String,
    pub kind: SessionEventKind,
}

impl SessionEvent {
    pub fn new(generation: u64, camera_id: impl Into<String>, kind: SessionEventKind) -> Self {
        Self {
            generation,
            camera_id: camera_id.into(),
            kind,
        }
    }
}

pub type EventSender = mpsc::UnboundedSender<SessionEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Receiver of frames written to the recording target
pub trait FrameSink: Send + Sync {
    fn push_frame(&self, frame: &Frame) -> Result<(), CameraError>;
}

/// Streams a capture session writes into
#[derive(Clone)]
pub struct SessionOutputs {
    pub preview_size: Size,
    /// Present in photo mode, sized to the largest JPEG output
    pub still_size: Option<Size>,
    pub recording: Option<Arc<dyn FrameSink>>,
}

impl SessionOutputs {
    pub fn preview(preview_size: Size) -> Self {
        Self {
            preview_size,
            still_size: None,
            recording: None,
        }
    }

    pub fn with_still(mut self, size: Size) -> Self {
        self.still_size = Some(size);
        self
    }

    pub fn with_recording(mut self, sink: Arc<dyn FrameSink>) -> Self {
        self.recording = Some(sink);
        self
    }
}

impl fmt::Debug for SessionOutputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionOutputs")
            .field("preview_size", &self.preview_size)
            .field("still_size", &self.still_size)
            .field("recording", &self.recording.is_some())
            .finish()
    }
}

/// Hardware camera abstraction.
///
/// Calls return once the request has been accepted; results arrive later as
/// [`SessionEvent`]s on the sender handed to [`CameraService::open_device`],
/// tagged with the generation passed to the most recent `open_device` or
/// `create_session` call.
pub trait CameraService: Send + Sync {
    fn camera_ids(&self) -> Result<Vec<String>, CameraError>;

    fn characteristics(&self, camera_id: &str) -> Result<CameraCharacteristics, CameraError>;

    /// Start opening a device; success is reported with `Opened`
    fn open_device(&self, camera_id: &str, generation: u64, events: EventSender) -> Result<(), CameraError>;

    /// Replace the capture session; reported with `SessionConfigured` or `ConfigureFailed`
    fn create_session(
        &self,
        outputs: SessionOutputs,
        purpose: SessionPurpose,
        generation: u64,
    ) -> Result<(), CameraError>;

    fn set_repeating_request(&self, request: &CaptureRequest) -> Result<(), CameraError>;

    fn stop_repeating(&self) -> Result<(), CameraError>;

    /// Issue a one-shot request; reported with `ImageAvailable` and
    /// `CaptureCompleted`, or `CaptureFailed`
    fn capture(&self, request: &CaptureRequest) -> Result<(), CameraError>;

    /// Newest preview frame since the last call, if the preview is running
    fn latest_preview_frame(&self) -> Option<Frame> {
        None
    }

    fn close_session(&self);

    fn close_device(&self);
}
