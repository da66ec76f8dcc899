//! Webcam backend built on nokhwa
//!
//! Desktop webcams have no flash, no fixed sensor mounting and no separate
//! still pipeline, so this backend emulates the session model: the first
//! enumerated camera plays the back camera, the second the front one, stills
//! are the newest preview frame encoded as JPEG, and recording targets are
//! fed every preview frame.

use super::{
    CameraService, EventSender, FrameQueue, FrameSink, SessionEvent, SessionEventKind, SessionOutputs,
    SessionPurpose,
};
use crate::errors::CameraError;
use crate::processing::encode_frame_jpeg;
use crate::types::{CameraCharacteristics, CaptureRequest, Frame, LensFacing, Size};
use nokhwa::{
    pixel_format::RgbFormat,
    query,
    utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType},
    CallbackCamera,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Instant;

/// Sizes advertised for every webcam; most UVC devices support these
const COMMON_SIZES: [Size; 3] = [Size::new(1920, 1080), Size::new(1280, 720), Size::new(640, 480)];

const PREVIEW_QUEUE_CAPACITY: usize = 4;

struct OpenDevice {
    camera_id: String,
    camera: Arc<Mutex<CallbackCamera>>,
}

struct StreamWorker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

struct DesktopState {
    device: Option<OpenDevice>,
    events: Option<EventSender>,
    generation: u64,
    worker: Option<StreamWorker>,
    repeating: Option<CaptureRequest>,
}

pub struct DesktopCameraService {
    state: Mutex<DesktopState>,
    preview: Arc<FrameQueue<Frame>>,
    latest: Arc<Mutex<Option<Frame>>>,
    /// Preview frames are forwarded only while a repeating request is active
    forwarding: Arc<AtomicBool>,
    jpeg_quality: u8,
}

impl Default for DesktopCameraService {
    fn default() -> Self {
        Self::new()
    }
}

impl DesktopCameraService {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DesktopState {
                device: None,
                events: None,
                generation: 0,
                worker: None,
                repeating: None,
            }),
            preview: Arc::new(FrameQueue::new(PREVIEW_QUEUE_CAPACITY)),
            latest: Arc::new(Mutex::new(None)),
            forwarding: Arc::new(AtomicBool::new(false)),
            jpeg_quality: 95,
        }
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    /// Live preview frames for a UI to render
    pub fn preview_frames(&self) -> Arc<FrameQueue<Frame>> {
        Arc::clone(&self.preview)
    }

    fn lock(&self) -> MutexGuard<'_, DesktopState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(state: &DesktopState, kind: SessionEventKind) {
        let (Some(events), Some(device)) = (&state.events, &state.device) else {
            log::debug!("Dropping {:?}: no open device", kind);
            return;
        };
        let event = SessionEvent::new(state.generation, device.camera_id.clone(), kind);
        if events.send(event).is_err() {
            log::debug!("Session event receiver is gone");
        }
    }

    fn stop_worker(state: &mut DesktopState) {
        if let Some(worker) = state.worker.take() {
            worker.stop.store(true, Ordering::Relaxed);
            if worker.handle.join().is_err() {
                log::warn!("Preview worker panicked");
            }
        }
    }

    fn spawn_worker(&self, camera: Arc<Mutex<CallbackCamera>>, recording: Option<Arc<dyn FrameSink>>) -> StreamWorker {
        let stop = Arc::new(AtomicBool::new(false));
        let preview = Arc::clone(&self.preview);
        let latest = Arc::clone(&self.latest);
        let forwarding = Arc::clone(&self.forwarding);
        let stop_flag = Arc::clone(&stop);

        let handle = std::thread::spawn(move || {
            let started = Instant::now();
            let mut sequence = 0u64;
            while !stop_flag.load(Ordering::Relaxed) {
                let frame = match poll_rgb_frame(&camera, sequence, started) {
                    Ok(frame) => frame,
                    Err(e) => {
                        log::warn!("Preview frame dropped: {}", e);
                        std::thread::sleep(std::time::Duration::from_millis(10));
                        continue;
                    }
                };
                sequence += 1;

                if forwarding.load(Ordering::Relaxed) {
                    if let Some(sink) = &recording {
                        if let Err(e) = sink.push_frame(&frame) {
                            log::warn!("Recording target rejected frame {}: {}", frame.sequence, e);
                        }
                    }
                    preview.push_drop_oldest(frame.clone());
                }
                if let Ok(mut slot) = latest.lock() {
                    *slot = Some(frame);
                }
            }
            log::debug!("Preview worker stopped after {} frames", sequence);
        });

        StreamWorker { stop, handle }
    }
}

/// Grab one frame and convert it to packed RGB8
fn poll_rgb_frame(camera: &Arc<Mutex<CallbackCamera>>, sequence: u64, started: Instant) -> Result<Frame, CameraError> {
    let mut camera = camera
        .lock()
        .map_err(|_| CameraError::CaptureError("Failed to lock camera".to_string()))?;

    let buffer = camera
        .poll_frame()
        .map_err(|e| CameraError::CaptureError(format!("Failed to capture frame: {}", e)))?;

    let width = buffer.resolution().width_x;
    let height = buffer.resolution().height_y;
    let raw = buffer.buffer_bytes();

    // some backends hand out MJPEG even when RGB was requested
    let data = if raw.len() >= 3 && raw[0] == 0xFF && raw[1] == 0xD8 && raw[2] == 0xFF {
        image::load_from_memory(&raw)
            .map_err(|e| CameraError::CaptureError(format!("Failed to decode MJPEG: {}", e)))?
            .to_rgb8()
            .into_raw()
    } else if raw.len() == (width * height * 3) as usize {
        raw.to_vec()
    } else {
        buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| CameraError::CaptureError(format!("Failed to decode frame: {}", e)))?
            .into_raw()
    };

    Ok(Frame {
        sequence,
        timestamp_us: started.elapsed().as_micros() as u64,
        width,
        height,
        data,
    })
}

fn lens_facing_for_index(index: usize) -> LensFacing {
    match index {
        0 => LensFacing::Back,
        1 => LensFacing::Front,
        _ => LensFacing::External,
    }
}

impl CameraService for DesktopCameraService {
    fn camera_ids(&self) -> Result<Vec<String>, CameraError> {
        let cameras = query(ApiBackend::Auto)
            .map_err(|e| CameraError::InitializationError(format!("Failed to query cameras: {}", e)))?;
        Ok(cameras.iter().map(|info| info.index().to_string()).collect())
    }

    fn characteristics(&self, camera_id: &str) -> Result<CameraCharacteristics, CameraError> {
        let ids = self.camera_ids()?;
        let position = ids
            .iter()
            .position(|id| id == camera_id)
            .ok_or_else(|| CameraError::InitializationError(format!("Unknown camera: {}", camera_id)))?;

        Ok(CameraCharacteristics::new(camera_id, lens_facing_for_index(position))
            .with_preview_sizes(COMMON_SIZES.to_vec())
            .with_jpeg_sizes(COMMON_SIZES.to_vec()))
    }

    fn open_device(&self, camera_id: &str, generation: u64, events: EventSender) -> Result<(), CameraError> {
        let index = camera_id
            .parse::<u32>()
            .map_err(|_| CameraError::InitializationError("Invalid device ID".to_string()))?;

        let mut state = self.lock();
        Self::stop_worker(&mut state);
        state.device = None;

        let requested_format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::None);
        let camera = CallbackCamera::new(CameraIndex::Index(index), requested_format, |_| {})
            .map_err(|e| CameraError::InitializationError(format!("Failed to initialize camera: {}", e)))?;

        log::info!("Opened webcam {}", camera_id);
        state.device = Some(OpenDevice {
            camera_id: camera_id.to_string(),
            camera: Arc::new(Mutex::new(camera)),
        });
        state.events = Some(events);
        state.generation = generation;
        Self::emit(&state, SessionEventKind::Opened);
        Ok(())
    }

    fn create_session(
        &self,
        outputs: SessionOutputs,
        purpose: SessionPurpose,
        generation: u64,
    ) -> Result<(), CameraError> {
        let mut state = self.lock();
        state.generation = generation;
        Self::stop_worker(&mut state);
        self.forwarding.store(false, Ordering::Relaxed);
        self.preview.reset();

        let camera = match &state.device {
            Some(device) => Arc::clone(&device.camera),
            None => return Err(CameraError::InvalidState("No camera device open".to_string())),
        };

        let opened = camera
            .lock()
            .map_err(|_| CameraError::ConfigurationError("Failed to lock camera".to_string()))
            .and_then(|mut cam| {
                if cam.is_stream_open() {
                    return Ok(());
                }
                cam.open_stream()
                    .map_err(|e| CameraError::ConfigurationError(format!("Failed to start stream: {}", e)))
            });

        if let Err(e) = opened {
            log::error!("Session configuration failed: {}", e);
            Self::emit(&state, SessionEventKind::ConfigureFailed(purpose));
            return Ok(());
        }

        log::info!("Configured {:?} session: {:?}", purpose, outputs);
        state.worker = Some(self.spawn_worker(camera, outputs.recording));
        Self::emit(&state, SessionEventKind::SessionConfigured(purpose));
        Ok(())
    }

    fn set_repeating_request(&self, request: &CaptureRequest) -> Result<(), CameraError> {
        let mut state = self.lock();
        if state.worker.is_none() {
            return Err(CameraError::InvalidState("No capture session".to_string()));
        }
        if request.flash_mode.is_some() {
            log::debug!("Webcam has no flash unit, ignoring {:?}", request.flash_mode);
        }
        state.repeating = Some(request.clone());
        self.forwarding.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn stop_repeating(&self) -> Result<(), CameraError> {
        let mut state = self.lock();
        state.repeating = None;
        self.forwarding.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn capture(&self, request: &CaptureRequest) -> Result<(), CameraError> {
        let state = self.lock();
        let Some(device) = &state.device else {
            return Err(CameraError::InvalidState("No camera device open".to_string()));
        };
        log::debug!("Still capture with {:?}", request.template);

        let latest = self.latest.lock().ok().and_then(|mut slot| slot.take());
        let frame = match latest {
            Some(frame) => Ok(frame),
            None => poll_rgb_frame(&device.camera, 0, Instant::now()),
        };

        match frame.and_then(|frame| encode_frame_jpeg(&frame, self.jpeg_quality)) {
            Ok(jpeg) => {
                Self::emit(&state, SessionEventKind::ImageAvailable(jpeg));
                Self::emit(&state, SessionEventKind::CaptureCompleted);
            }
            Err(e) => {
                log::error!("Still capture failed: {}", e);
                Self::emit(&state, SessionEventKind::CaptureFailed(e.to_string()));
            }
        }
        Ok(())
    }

    fn latest_preview_frame(&self) -> Option<Frame> {
        self.preview.take_latest()
    }

    fn close_session(&self) {
        let mut state = self.lock();
        Self::stop_worker(&mut state);
        state.repeating = None;
        self.forwarding.store(false, Ordering::Relaxed);
    }

    fn close_device(&self) {
        let mut state = self.lock();
        Self::stop_worker(&mut state);
        self.forwarding.store(false, Ordering::Relaxed);
        self.preview.close();
        if let Some(device) = state.device.take() {
            if let Ok(mut camera) = device.camera.lock() {
                if camera.is_stream_open() {
                    if let Err(e) = camera.stop_stream() {
                        log::warn!("Failed to stop stream: {}", e);
                    }
                }
            }
            log::info!("Closed webcam {}", device.camera_id);
        }
        state.events = None;
        state.repeating = None;
    }
}
