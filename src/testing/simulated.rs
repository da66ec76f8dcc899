//! Scripted stand-ins for the camera service, recorder and media index.
//!
//! By default the simulated service answers every request the way a healthy
//! device would, synchronously posting the result event. Individual failures
//! can be scripted, and events can be injected by hand.

use super::synthetic_jpeg;
use crate::errors::CameraError;
use crate::gallery::MediaIndex;
use crate::platform::{
    CameraService, EventSender, FrameQueue, FrameSink, SessionEvent, SessionEventKind, SessionOutputs, SessionPurpose,
};
use crate::recording::{MediaRecorder, RecordingSettings, RecordingStats};
use crate::types::{CameraCharacteristics, CaptureRequest, Frame, LensFacing, MediaItem, MediaKind, Size};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Request recorded by [`SimulatedCameraService`]
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceCall {
    OpenDevice(String),
    CreateSession {
        purpose: SessionPurpose,
        preview_size: Size,
        still_size: Option<Size>,
        recording: bool,
    },
    SetRepeating(CaptureRequest),
    StopRepeating,
    Capture(CaptureRequest),
    CloseSession,
    CloseDevice,
}

#[derive(Default)]
struct Script {
    fail_open: bool,
    fail_configure: bool,
    fail_capture: bool,
    reject_capture: bool,
}

struct SimState {
    cameras: Vec<CameraCharacteristics>,
    calls: Vec<ServiceCall>,
    events: Option<EventSender>,
    camera_id: Option<String>,
    generation: u64,
    device_open: bool,
    repeating: Option<CaptureRequest>,
    recording_sink: Option<Arc<dyn FrameSink>>,
    auto_respond: bool,
    script: Script,
    still_jpeg: Vec<u8>,
}

pub struct SimulatedCameraService {
    state: Mutex<SimState>,
    preview: FrameQueue<Frame>,
}

impl Default for SimulatedCameraService {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedCameraService {
    /// Phone-like pair: back camera "0" (flash, sensor at 90°) and front
    /// camera "1" (no flash, sensor at 270°)
    pub fn new() -> Self {
        Self::with_cameras(vec![Self::back_camera("0"), Self::front_camera("1")])
    }

    pub fn with_cameras(cameras: Vec<CameraCharacteristics>) -> Self {
        Self {
            state: Mutex::new(SimState {
                cameras,
                calls: Vec::new(),
                events: None,
                camera_id: None,
                generation: 0,
                device_open: false,
                repeating: None,
                recording_sink: None,
                auto_respond: true,
                script: Script::default(),
                still_jpeg: synthetic_jpeg(64, 48, None),
            }),
            preview: FrameQueue::new(4),
        }
    }

    pub fn back_camera(id: &str) -> CameraCharacteristics {
        CameraCharacteristics::new(id, LensFacing::Back)
            .with_sensor_orientation(90)
            .with_flash(true)
            .with_preview_sizes(vec![
                Size::new(1920, 1080),
                Size::new(1440, 1080),
                Size::new(1080, 1080),
                Size::new(640, 480),
            ])
            .with_jpeg_sizes(vec![Size::new(1920, 1080), Size::new(4032, 3024)])
    }

    pub fn front_camera(id: &str) -> CameraCharacteristics {
        CameraCharacteristics::new(id, LensFacing::Front)
            .with_sensor_orientation(270)
            .with_preview_sizes(vec![Size::new(1280, 720), Size::new(960, 720)])
            .with_jpeg_sizes(vec![Size::new(2592, 1944)])
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// When off, no result events are posted automatically
    pub fn set_auto_respond(&self, enabled: bool) {
        self.lock().auto_respond = enabled;
    }

    pub fn fail_next_open(&self) {
        self.lock().script.fail_open = true;
    }

    /// Next session reports `ConfigureFailed`
    pub fn fail_next_configure(&self) {
        self.lock().script.fail_configure = true;
    }

    /// Next capture reports `CaptureFailed`
    pub fn fail_next_capture(&self) {
        self.lock().script.fail_capture = true;
    }

    /// Next `capture` call itself returns an error
    pub fn reject_next_capture(&self) {
        self.lock().script.reject_capture = true;
    }

    /// JPEG delivered by successful captures
    pub fn set_still_jpeg(&self, jpeg: Vec<u8>) {
        self.lock().still_jpeg = jpeg;
    }

    pub fn calls(&self) -> Vec<ServiceCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn last_repeating(&self) -> Option<CaptureRequest> {
        self.lock().repeating.clone()
    }

    pub fn is_device_open(&self) -> bool {
        self.lock().device_open
    }

    pub fn open_camera_id(&self) -> Option<String> {
        let state = self.lock();
        if state.device_open {
            state.camera_id.clone()
        } else {
            None
        }
    }

    /// Post an event tagged with the current generation
    pub fn emit(&self, kind: SessionEventKind) {
        let generation = self.lock().generation;
        self.emit_with_generation(generation, kind);
    }

    pub fn emit_with_generation(&self, generation: u64, kind: SessionEventKind) {
        let state = self.lock();
        Self::post(&state, generation, kind);
    }

    /// Queue a preview frame; dropped unless a repeating request is active
    pub fn push_preview_frame(&self, frame: Frame) -> bool {
        if self.lock().repeating.is_none() {
            return false;
        }
        self.preview.push_drop_oldest(frame);
        true
    }

    /// Feed a frame to the active recording target, if any
    pub fn push_recording_frame(&self, frame: &Frame) -> Result<bool, CameraError> {
        let sink = self.lock().recording_sink.clone();
        match sink {
            Some(sink) => sink.push_frame(frame).map(|_| true),
            None => Ok(false),
        }
    }

    fn post(state: &SimState, generation: u64, kind: SessionEventKind) {
        let Some(events) = &state.events else {
            return;
        };
        let camera_id = state.camera_id.clone().unwrap_or_default();
        let _ = events.send(SessionEvent::new(generation, camera_id, kind));
    }
}

impl CameraService for SimulatedCameraService {
    fn camera_ids(&self) -> Result<Vec<String>, CameraError> {
        Ok(self.lock().cameras.iter().map(|c| c.id.clone()).collect())
    }

    fn characteristics(&self, camera_id: &str) -> Result<CameraCharacteristics, CameraError> {
        self.lock()
            .cameras
            .iter()
            .find(|c| c.id == camera_id)
            .cloned()
            .ok_or_else(|| CameraError::InitializationError(format!("Unknown camera: {}", camera_id)))
    }

    fn open_device(&self, camera_id: &str, generation: u64, events: EventSender) -> Result<(), CameraError> {
        let mut state = self.lock();
        state.calls.push(ServiceCall::OpenDevice(camera_id.to_string()));
        if std::mem::take(&mut state.script.fail_open) {
            return Err(CameraError::PermissionDenied("Camera access denied".to_string()));
        }
        state.events = Some(events);
        state.camera_id = Some(camera_id.to_string());
        state.generation = generation;
        state.device_open = true;
        if state.auto_respond {
            Self::post(&state, generation, SessionEventKind::Opened);
        }
        Ok(())
    }

    fn create_session(
        &self,
        outputs: SessionOutputs,
        purpose: SessionPurpose,
        generation: u64,
    ) -> Result<(), CameraError> {
        let mut state = self.lock();
        state.calls.push(ServiceCall::CreateSession {
            purpose,
            preview_size: outputs.preview_size,
            still_size: outputs.still_size,
            recording: outputs.recording.is_some(),
        });
        if !state.device_open {
            return Err(CameraError::InvalidState("No camera device open".to_string()));
        }
        state.generation = generation;
        state.recording_sink = outputs.recording;

        let failed = std::mem::take(&mut state.script.fail_configure);
        if state.auto_respond {
            let kind = if failed {
                SessionEventKind::ConfigureFailed(purpose)
            } else {
                SessionEventKind::SessionConfigured(purpose)
            };
            Self::post(&state, generation, kind);
        }
        Ok(())
    }

    fn set_repeating_request(&self, request: &CaptureRequest) -> Result<(), CameraError> {
        let mut state = self.lock();
        state.calls.push(ServiceCall::SetRepeating(request.clone()));
        state.repeating = Some(request.clone());
        Ok(())
    }

    fn stop_repeating(&self) -> Result<(), CameraError> {
        let mut state = self.lock();
        state.calls.push(ServiceCall::StopRepeating);
        state.repeating = None;
        Ok(())
    }

    fn capture(&self, request: &CaptureRequest) -> Result<(), CameraError> {
        let mut state = self.lock();
        state.calls.push(ServiceCall::Capture(request.clone()));
        if std::mem::take(&mut state.script.reject_capture) {
            return Err(CameraError::CaptureError("Capture request rejected".to_string()));
        }

        let failed = std::mem::take(&mut state.script.fail_capture);
        if state.auto_respond {
            let generation = state.generation;
            if failed {
                Self::post(&state, generation, SessionEventKind::CaptureFailed("simulated failure".to_string()));
            } else {
                let jpeg = state.still_jpeg.clone();
                Self::post(&state, generation, SessionEventKind::ImageAvailable(jpeg));
                Self::post(&state, generation, SessionEventKind::CaptureCompleted);
            }
        }
        Ok(())
    }

    fn latest_preview_frame(&self) -> Option<Frame> {
        self.preview.take_latest()
    }

    fn close_session(&self) {
        self.preview.reset();
        let mut state = self.lock();
        state.calls.push(ServiceCall::CloseSession);
        state.repeating = None;
        state.recording_sink = None;
    }

    fn close_device(&self) {
        let mut state = self.lock();
        state.calls.push(ServiceCall::CloseDevice);
        state.device_open = false;
        state.events = None;
    }
}

struct RecorderState {
    prepared: Option<(PathBuf, RecordingSettings)>,
    history: Vec<RecordingSettings>,
    fail_prepare: bool,
}

struct CountingSink {
    frames: AtomicU64,
    started: AtomicBool,
}

impl FrameSink for CountingSink {
    fn push_frame(&self, _frame: &Frame) -> Result<(), CameraError> {
        if self.started.load(Ordering::Acquire) {
            self.frames.fetch_add(1, Ordering::AcqRel);
        }
        Ok(())
    }
}

/// Recorder that counts frames and writes a placeholder file on stop when
/// the output directory exists
pub struct SimulatedRecorder {
    state: Mutex<RecorderState>,
    sink: Arc<CountingSink>,
}

impl Default for SimulatedRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedRecorder {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RecorderState {
                prepared: None,
                history: Vec::new(),
                fail_prepare: false,
            }),
            sink: Arc::new(CountingSink {
                frames: AtomicU64::new(0),
                started: AtomicBool::new(false),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RecorderState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn sink(&self) -> Arc<dyn FrameSink> {
        Arc::clone(&self.sink) as Arc<dyn FrameSink>
    }

    pub fn fail_next_prepare(&self) {
        self.lock().fail_prepare = true;
    }

    /// Settings of every prepared recording, oldest first
    pub fn prepared_settings(&self) -> Vec<RecordingSettings> {
        self.lock().history.clone()
    }

    pub fn frames(&self) -> u64 {
        self.sink.frames.load(Ordering::Acquire)
    }
}

impl MediaRecorder for SimulatedRecorder {
    fn prepare(&self, output: &Path, settings: &RecordingSettings) -> Result<Arc<dyn FrameSink>, CameraError> {
        let mut state = self.lock();
        if std::mem::take(&mut state.fail_prepare) {
            return Err(CameraError::RecordingError("Simulated prepare failure".to_string()));
        }
        state.prepared = Some((output.to_path_buf(), settings.clone()));
        state.history.push(settings.clone());
        self.sink.frames.store(0, Ordering::Release);
        Ok(self.sink())
    }

    fn start(&self) -> Result<(), CameraError> {
        if self.lock().prepared.is_none() {
            return Err(CameraError::RecordingError("Recorder not prepared".to_string()));
        }
        self.sink.started.store(true, Ordering::Release);
        Ok(())
    }

    fn stop(&self) -> Result<RecordingStats, CameraError> {
        self.sink.started.store(false, Ordering::Release);
        let (path, settings) = self
            .lock()
            .prepared
            .take()
            .ok_or_else(|| CameraError::RecordingError("Recorder not prepared".to_string()))?;
        let frames = self.frames();
        // filesystem-backed galleries get real bytes; in-memory paths have no parent
        if path.parent().is_some_and(Path::is_dir) {
            std::fs::write(&path, b"simulated recording")?;
        }
        Ok(RecordingStats {
            video_frames: frames,
            duration_secs: frames as f64 * settings.frame_duration_secs(),
            bytes_written: 0,
            dropped_frames: 0,
            output_path: path,
        })
    }

    fn is_recording(&self) -> bool {
        self.sink.started.load(Ordering::Acquire)
    }
}

struct IndexEntry {
    item: MediaItem,
    data: Vec<u8>,
    removed: bool,
}

struct IndexState {
    entries: Vec<IndexEntry>,
    clock: i64,
    failing: bool,
}

/// Media index held in memory with a manual clock
pub struct InMemoryMediaIndex {
    state: Mutex<IndexState>,
}

impl Default for InMemoryMediaIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMediaIndex {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(IndexState {
                entries: Vec::new(),
                clock: 1_700_000_000,
                failing: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, IndexState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Timestamp given to the next inserted item
    pub fn set_clock(&self, epoch_secs: i64) {
        self.lock().clock = epoch_secs;
    }

    /// Add an existing item with an explicit timestamp
    pub fn add(&self, kind: MediaKind, name: &str, date_added: i64) -> MediaItem {
        let item = MediaItem {
            id: name.to_string(),
            kind,
            path: PathBuf::from("memory").join(name),
            mime_type: kind.default_mime_type().to_string(),
            date_added,
        };
        self.lock().entries.push(IndexEntry {
            item: item.clone(),
            data: Vec::new(),
            removed: false,
        });
        item
    }

    /// Simulate the file disappearing from the gallery
    pub fn remove(&self, id: &str) {
        for entry in self.lock().entries.iter_mut().filter(|e| e.item.id == id) {
            entry.removed = true;
        }
    }

    /// Make every query fail as if access were denied
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    pub fn data(&self, id: &str) -> Option<Vec<u8>> {
        self.lock()
            .entries
            .iter()
            .find(|e| e.item.id == id && !e.removed)
            .map(|e| e.data.clone())
    }

    pub fn items(&self, kind: MediaKind) -> Vec<MediaItem> {
        self.lock()
            .entries
            .iter()
            .filter(|e| e.item.kind == kind && !e.removed)
            .map(|e| e.item.clone())
            .collect()
    }
}

impl MediaIndex for InMemoryMediaIndex {
    fn latest(&self, kind: MediaKind) -> Result<Option<MediaItem>, CameraError> {
        let state = self.lock();
        if state.failing {
            return Err(CameraError::PermissionDenied("Media access denied".to_string()));
        }
        // later entries win ties
        Ok(state
            .entries
            .iter()
            .filter(|e| e.item.kind == kind && !e.removed)
            .fold(None::<&MediaItem>, |best, e| match best {
                Some(b) if b.date_added > e.item.date_added => Some(b),
                _ => Some(&e.item),
            })
            .cloned())
    }

    fn insert(&self, kind: MediaKind, display_name: &str, mime_type: &str) -> Result<MediaItem, CameraError> {
        let mut state = self.lock();
        if state.failing {
            return Err(CameraError::MediaStoreError("Media store unavailable".to_string()));
        }
        let date_added = state.clock;
        state.clock += 1;
        let item = MediaItem {
            id: display_name.to_string(),
            kind,
            path: PathBuf::from("memory").join(display_name),
            mime_type: mime_type.to_string(),
            date_added,
        };
        state.entries.push(IndexEntry {
            item: item.clone(),
            data: Vec::new(),
            removed: false,
        });
        Ok(item)
    }

    fn write(&self, item: &MediaItem, data: &[u8]) -> Result<(), CameraError> {
        let mut state = self.lock();
        let entry = state
            .entries
            .iter_mut()
            .find(|e| e.item.id == item.id && !e.removed)
            .ok_or_else(|| CameraError::MediaStoreError(format!("No such item: {}", item.id)))?;
        entry.data = data.to_vec();
        Ok(())
    }

    fn delete(&self, item: &MediaItem) -> Result<(), CameraError> {
        self.remove(&item.id);
        Ok(())
    }

    fn is_accessible(&self, item: &MediaItem) -> bool {
        self.lock()
            .entries
            .iter()
            .any(|e| e.item.id == item.id && !e.removed)
    }
}
