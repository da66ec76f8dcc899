//! Camera session controller
//!
//! Drives one camera device through
//! `Closed → Opening → Configuring → Previewing → Capturing | Recording`.
//! Calls into the [`CameraService`] only *request* work; the controller
//! advances when the matching [`SessionEvent`] comes back through
//! [`SessionController::handle_event`].
//!
//! Every teardown (session replacement or device close) bumps the
//! generation. Events from an older generation belong to a session that no
//! longer exists and are dropped.

use crate::errors::CameraError;
use crate::platform::{
    CameraService, EventSender, FrameSink, SessionEvent, SessionEventKind, SessionOutputs, SessionPurpose,
};
use crate::processing::best_size_for_aspect_ratio;
use crate::types::{
    AeMode, AfMode, AspectRatio, CameraCharacteristics, CaptureMode, CaptureRequest, DisplayRotation, FlashMode,
    LensFacing, OutputTarget, RequestTemplate, Size,
};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Opening,
    Configuring,
    Previewing,
    Capturing,
    Recording,
}

/// User-selected parameters the session is configured from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSettings {
    pub aspect_ratio: AspectRatio,
    pub mode: CaptureMode,
    pub flash_enabled: bool,
    /// Used when the camera advertises no preview sizes
    pub fallback_preview_size: Size,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            aspect_ratio: AspectRatio::Full,
            mode: CaptureMode::Photo,
            flash_enabled: false,
            fallback_preview_size: Size::default(),
        }
    }
}

/// Orientation inputs recorded when the shutter was pressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShotInfo {
    pub aspect_ratio: AspectRatio,
    pub display_rotation: DisplayRotation,
    pub sensor_orientation: u32,
    pub lens_facing: LensFacing,
}

/// What an event meant for the caller
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    /// Stale, unexpected, or no visible effect
    Ignored,
    Opened { flash_supported: bool },
    Ready { preview_size: Size },
    ConfigureFailed,
    StillImage { jpeg: Vec<u8>, shot: ShotInfo },
    CaptureFinished { success: bool },
    RecordingSessionReady,
    RecordingSessionFailed,
    /// Device went away; everything was closed
    Closed,
}

pub struct SessionController {
    service: Arc<dyn CameraService>,
    events: EventSender,
    generation: u64,
    state: SessionState,
    camera_id: Option<String>,
    characteristics: Option<CameraCharacteristics>,
    settings: SessionSettings,
    ready: bool,
    preview_size: Size,
    has_still_target: bool,
    pending_shot: Option<ShotInfo>,
}

impl SessionController {
    pub fn new(service: Arc<dyn CameraService>, events: EventSender, settings: SessionSettings) -> Self {
        Self {
            service,
            events,
            generation: 0,
            state: SessionState::Closed,
            camera_id: None,
            characteristics: None,
            preview_size: settings.fallback_preview_size,
            settings,
            ready: false,
            has_still_target: false,
            pending_shot: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn camera_id(&self) -> Option<&str> {
        self.camera_id.as_deref()
    }

    pub fn characteristics(&self) -> Option<&CameraCharacteristics> {
        self.characteristics.as_ref()
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn preview_size(&self) -> Size {
        self.preview_size
    }

    pub fn flash_supported(&self) -> bool {
        self.characteristics
            .as_ref()
            .map(|c| c.flash_available)
            .unwrap_or(false)
    }

    /// A device handle is held and usable for sessions
    pub fn device_open(&self) -> bool {
        !matches!(self.state, SessionState::Closed | SessionState::Opening)
    }

    /// Start opening `camera_id`, closing whatever was open before
    pub fn open(&mut self, camera_id: Option<&str>) -> Result<(), CameraError> {
        let Some(camera_id) = camera_id else {
            log::warn!("No camera selected, not opening");
            return Ok(());
        };

        if self.state != SessionState::Closed {
            self.close();
        }

        let characteristics = self.service.characteristics(camera_id)?;
        self.camera_id = Some(camera_id.to_string());
        self.characteristics = Some(characteristics);
        self.generation += 1;
        self.state = SessionState::Opening;

        log::info!("Opening camera {} (generation {})", camera_id, self.generation);
        if let Err(e) = self
            .service
            .open_device(camera_id, self.generation, self.events.clone())
        {
            log::error!("Failed to open camera {}: {}", camera_id, e);
            self.state = SessionState::Closed;
            return Err(e);
        }
        Ok(())
    }

    /// Replace the capture session with one matching the current settings
    pub fn configure(&mut self) -> Result<(), CameraError> {
        if !self.device_open() {
            return Err(CameraError::InvalidState("No camera device open".to_string()));
        }
        let characteristics = self
            .characteristics
            .clone()
            .ok_or_else(|| CameraError::InvalidState("Camera characteristics unknown".to_string()))?;

        self.preview_size = best_size_for_aspect_ratio(&characteristics.preview_sizes, self.settings.aspect_ratio)
            .unwrap_or(self.settings.fallback_preview_size);

        let mut outputs = SessionOutputs::preview(self.preview_size);
        self.has_still_target = self.settings.mode == CaptureMode::Photo;
        if self.has_still_target {
            outputs = outputs.with_still(characteristics.largest_jpeg_size(self.preview_size));
        }

        self.teardown_session();
        self.state = SessionState::Configuring;
        log::debug!("Configuring {:?} session: {:?}", self.settings.mode, outputs);

        self.service
            .create_session(outputs, SessionPurpose::Preview, self.generation)
            .map_err(|e| {
                log::error!("Failed to create capture session: {}", e);
                e
            })
    }

    /// Configure preview + recording target; `RecordingSessionReady` follows
    pub fn begin_recording(&mut self, target: Arc<dyn FrameSink>) -> Result<(), CameraError> {
        if self.settings.mode != CaptureMode::Video {
            return Err(CameraError::InvalidState("Recording requires video mode".to_string()));
        }
        if !self.device_open() {
            return Err(CameraError::InvalidState("No camera device open".to_string()));
        }

        let outputs = SessionOutputs::preview(self.preview_size).with_recording(target);
        self.has_still_target = false;
        self.teardown_session();
        self.state = SessionState::Configuring;

        self.service
            .create_session(outputs, SessionPurpose::Recording, self.generation)
            .map_err(|e| {
                log::error!("Failed to create recording session: {}", e);
                e
            })
    }

    /// Go back to a plain preview session
    pub fn end_recording(&mut self) -> Result<(), CameraError> {
        if !self.device_open() {
            return Ok(());
        }
        self.configure()
    }

    /// Take one still. Refused unless a photo session is previewing.
    pub fn capture_still(&mut self, display_rotation: DisplayRotation) -> Result<(), CameraError> {
        if !self.ready || !self.has_still_target || self.state != SessionState::Previewing {
            log::warn!(
                "Capture refused: ready={}, still target={}, state={:?}",
                self.ready,
                self.has_still_target,
                self.state
            );
            return Err(CameraError::InvalidState("Camera not ready for capture".to_string()));
        }
        let characteristics = self
            .characteristics
            .as_ref()
            .ok_or_else(|| CameraError::InvalidState("Camera characteristics unknown".to_string()))?;

        self.pending_shot = Some(ShotInfo {
            aspect_ratio: self.settings.aspect_ratio,
            display_rotation,
            sensor_orientation: characteristics.sensor_orientation,
            lens_facing: characteristics.lens_facing,
        });

        if let Err(e) = self.service.stop_repeating() {
            log::warn!("Failed to stop preview before capture: {}", e);
        }

        let (ae, flash) = if self.flash_supported() && self.settings.flash_enabled {
            (AeMode::OnAutoFlash, FlashMode::Single)
        } else {
            (AeMode::On, FlashMode::Off)
        };
        let request = CaptureRequest::new(RequestTemplate::StillCapture)
            .with_target(OutputTarget::StillImage)
            .with_af_mode(AfMode::ContinuousPicture)
            .with_exposure(ae, flash);

        self.state = SessionState::Capturing;
        if let Err(e) = self.service.capture(&request) {
            log::error!("Failed to issue still capture: {}", e);
            self.pending_shot = None;
            self.restore_preview();
            return Err(e);
        }
        Ok(())
    }

    /// Change flash and re-issue the repeating request
    pub fn set_flash(&mut self, enabled: bool) {
        self.settings.flash_enabled = enabled;
        if self.state != SessionState::Previewing {
            return;
        }
        if let Err(e) = self.service.stop_repeating() {
            log::warn!("Failed to stop repeating request: {}", e);
        }
        if let Err(e) = self.service.set_repeating_request(&self.preview_request()) {
            log::error!("Failed to update flash mode: {}", e);
        }
    }

    pub fn set_mode(&mut self, mode: CaptureMode) {
        self.settings.mode = mode;
    }

    pub fn set_aspect_ratio(&mut self, ratio: AspectRatio) {
        self.settings.aspect_ratio = ratio;
    }

    /// Release the session and the device
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.ready = false;
        self.pending_shot = None;
        self.generation += 1;
        self.service.close_session();
        self.service.close_device();
        self.state = SessionState::Closed;
        log::info!("Camera closed (generation {})", self.generation);
    }

    /// Apply an event from the camera service
    pub fn handle_event(&mut self, event: SessionEvent) -> SessionOutcome {
        if event.generation != self.generation {
            log::debug!(
                "Ignoring stale {:?} (generation {}, current {})",
                event.kind,
                event.generation,
                self.generation
            );
            return SessionOutcome::Ignored;
        }

        match event.kind {
            SessionEventKind::Opened => {
                if self.state != SessionState::Opening {
                    return SessionOutcome::Ignored;
                }
                self.state = SessionState::Configuring;
                let flash_supported = self.flash_supported();
                log::info!("Camera {} opened, flash supported: {}", event.camera_id, flash_supported);
                if let Err(e) = self.configure() {
                    log::error!("Initial session configuration failed: {}", e);
                }
                SessionOutcome::Opened { flash_supported }
            }
            SessionEventKind::Disconnected => {
                log::warn!("Camera {} disconnected", event.camera_id);
                self.close();
                SessionOutcome::Closed
            }
            SessionEventKind::Error(code) => {
                log::error!("Camera {} error {}", event.camera_id, code);
                self.close();
                SessionOutcome::Closed
            }
            SessionEventKind::SessionConfigured(purpose) => self.on_configured(purpose),
            SessionEventKind::ConfigureFailed(purpose) => {
                if self.state != SessionState::Configuring {
                    return SessionOutcome::Ignored;
                }
                log::error!("Failed to configure {:?} session", purpose);
                self.ready = false;
                match purpose {
                    SessionPurpose::Preview => SessionOutcome::ConfigureFailed,
                    SessionPurpose::Recording => SessionOutcome::RecordingSessionFailed,
                }
            }
            SessionEventKind::CaptureCompleted => self.on_capture_finished(true),
            SessionEventKind::CaptureFailed(reason) => {
                log::error!("Still capture failed: {}", reason);
                self.on_capture_finished(false)
            }
            SessionEventKind::ImageAvailable(jpeg) => match self.pending_shot.take() {
                Some(shot) => SessionOutcome::StillImage { jpeg, shot },
                None => {
                    log::debug!("Unexpected still image ({} bytes) dropped", jpeg.len());
                    SessionOutcome::Ignored
                }
            },
        }
    }

    fn on_configured(&mut self, purpose: SessionPurpose) -> SessionOutcome {
        if self.state != SessionState::Configuring {
            return SessionOutcome::Ignored;
        }

        match purpose {
            SessionPurpose::Preview => match self.service.set_repeating_request(&self.preview_request()) {
                Ok(()) => {
                    self.ready = true;
                    self.state = SessionState::Previewing;
                    log::info!("Preview running at {}", self.preview_size);
                    SessionOutcome::Ready {
                        preview_size: self.preview_size,
                    }
                }
                Err(e) => {
                    log::error!("Failed to start preview: {}", e);
                    self.ready = false;
                    SessionOutcome::ConfigureFailed
                }
            },
            SessionPurpose::Recording => {
                let request = CaptureRequest::new(RequestTemplate::Record)
                    .with_target(OutputTarget::Preview)
                    .with_target(OutputTarget::Recording)
                    .with_af_mode(AfMode::ContinuousVideo);
                match self.service.set_repeating_request(&request) {
                    Ok(()) => {
                        self.ready = true;
                        self.state = SessionState::Recording;
                        log::info!("Recording session configured");
                        SessionOutcome::RecordingSessionReady
                    }
                    Err(e) => {
                        log::error!("Failed to start recording request: {}", e);
                        self.ready = false;
                        SessionOutcome::RecordingSessionFailed
                    }
                }
            }
        }
    }

    fn on_capture_finished(&mut self, success: bool) -> SessionOutcome {
        if self.state != SessionState::Capturing {
            return SessionOutcome::Ignored;
        }
        if !success {
            self.pending_shot = None;
        }
        self.restore_preview();
        SessionOutcome::CaptureFinished { success }
    }

    /// Best effort; the session stays usable for another attempt
    fn restore_preview(&mut self) {
        self.state = SessionState::Previewing;
        if let Err(e) = self.service.set_repeating_request(&self.preview_request()) {
            log::error!("Failed to restore preview: {}", e);
        }
    }

    fn teardown_session(&mut self) {
        self.ready = false;
        self.pending_shot = None;
        self.generation += 1;
        self.service.close_session();
    }

    /// Repeating request for the current mode and flash setting
    pub fn preview_request(&self) -> CaptureRequest {
        let (template, af) = match self.settings.mode {
            CaptureMode::Photo => (RequestTemplate::Preview, AfMode::ContinuousPicture),
            CaptureMode::Video => (RequestTemplate::Record, AfMode::ContinuousVideo),
        };
        let mut request = CaptureRequest::new(template)
            .with_target(OutputTarget::Preview)
            .with_af_mode(af);

        if self.flash_supported() && self.settings.mode == CaptureMode::Photo {
            request = if self.settings.flash_enabled {
                request.with_exposure(AeMode::OnAutoFlash, FlashMode::Torch)
            } else {
                request.with_exposure(AeMode::On, FlashMode::Off)
            };
        }
        request
    }
}
