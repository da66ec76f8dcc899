//! Camera screen view-model
//!
//! Owns the session controller, the gallery state and the recording in
//! progress, and publishes a [`CameraUiState`] snapshot after every change.
//! User actions never fail: platform errors are logged and the state is left
//! usable.

use crate::config::CamerakConfig;
use crate::errors::CameraError;
use crate::gallery::{photo_file_name, video_file_name, GalleryState, MediaIndex};
use crate::platform::{event_channel, CameraService, EventReceiver, SessionEvent};
use crate::preferences::PreferencesRepository;
use crate::processing::{
    encode_frame_jpeg, preview_transform, process_still, video_orientation_hint, PreviewTransform,
    StillProcessingParams,
};
use crate::recording::MediaRecorder;
use crate::session::{SessionController, SessionOutcome, SessionSettings, ShotInfo};
use crate::types::{
    AspectRatio, CameraUiState, CaptureMode, DisplayRotation, LensFacing, MediaItem, MediaKind, PreviewFrame, Size,
};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

const PREVIEW_JPEG_QUALITY: u8 = 80;

/// Collaborators the camera view-model drives
#[derive(Clone)]
pub struct CameraDeps {
    pub service: Arc<dyn CameraService>,
    pub media_index: Arc<dyn MediaIndex>,
    /// `None` when this build cannot record video
    pub recorder: Option<Arc<dyn MediaRecorder>>,
    pub preferences: Arc<PreferencesRepository>,
    pub config: CamerakConfig,
}

struct ActiveRecording {
    item: MediaItem,
    started_at: Instant,
    timer: Option<JoinHandle<()>>,
    /// Set once the recorder accepted `start`; until then the file is empty
    recorder_started: bool,
}

struct Inner {
    ui: CameraUiState,
    session: SessionController,
    gallery: GalleryState,
    view_size: Option<Size>,
    recording: Option<ActiveRecording>,
}

struct Shared {
    inner: Mutex<Inner>,
    ui_tx: watch::Sender<CameraUiState>,
    events: Mutex<Option<EventReceiver>>,
    deps: CameraDeps,
}

/// Encoded still waiting for post-processing
struct PendingStill {
    jpeg: Vec<u8>,
    params: StillProcessingParams,
}

#[derive(Default)]
struct CameraScan {
    first: Option<String>,
    front: Option<String>,
    back: Option<String>,
    with_flash: Option<String>,
}

/// First camera of each kind, in enumeration order
fn scan_cameras(service: &dyn CameraService) -> CameraScan {
    let ids = match service.camera_ids() {
        Ok(ids) => ids,
        Err(e) => {
            log::error!("Failed to list cameras: {}", e);
            return CameraScan::default();
        }
    };

    let mut scan = CameraScan {
        first: ids.first().cloned(),
        ..CameraScan::default()
    };
    for id in ids {
        let characteristics = match service.characteristics(&id) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("Skipping camera {}: {}", id, e);
                continue;
            }
        };
        match characteristics.lens_facing {
            LensFacing::Front if scan.front.is_none() => scan.front = Some(id.clone()),
            LensFacing::Back if scan.back.is_none() => scan.back = Some(id.clone()),
            _ => {}
        }
        if characteristics.flash_available && scan.with_flash.is_none() {
            scan.with_flash = Some(id);
        }
    }
    scan
}

#[derive(Clone)]
pub struct CameraViewModel {
    shared: Arc<Shared>,
}

impl CameraViewModel {
    pub fn new(deps: CameraDeps) -> Self {
        let (events_tx, events_rx) = event_channel();
        let prefs = &deps.preferences;

        let camera_mode = if prefs.remember_camera_mode() {
            prefs.last_camera_mode().unwrap_or_default()
        } else {
            CaptureMode::Photo
        };
        let aspect_ratio = if prefs.remember_aspect_ratio() {
            prefs.last_aspect_ratio().unwrap_or_default()
        } else {
            AspectRatio::Full
        };

        let default_preview = deps.config.default_preview_size();
        let session = SessionController::new(
            Arc::clone(&deps.service),
            events_tx,
            SessionSettings {
                aspect_ratio,
                mode: camera_mode,
                flash_enabled: false,
                fallback_preview_size: default_preview,
            },
        );

        let scan = scan_cameras(deps.service.as_ref());
        let preferred = if deps.config.camera.prefer_flash_camera {
            scan.with_flash.clone()
        } else {
            None
        };
        let current = preferred.or_else(|| scan.back.clone()).or(scan.first);

        let mut gallery = GalleryState::default();
        gallery.refresh(deps.media_index.as_ref());

        let ui = CameraUiState {
            aspect_ratio,
            camera_mode,
            preview_size: default_preview,
            current_camera_id: current,
            front_camera_id: scan.front,
            back_camera_id: scan.back,
            last_photo: gallery.last_photo.clone(),
            last_video: gallery.last_video.clone(),
            latest_gallery_media: gallery.latest.clone(),
            ..CameraUiState::default()
        };
        log::info!(
            "Camera view-model ready: current={:?}, front={:?}, back={:?}, mode={}, ratio={}",
            ui.current_camera_id,
            ui.front_camera_id,
            ui.back_camera_id,
            camera_mode,
            aspect_ratio
        );

        let (ui_tx, _) = watch::channel(ui.clone());
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    ui,
                    session,
                    gallery,
                    view_size: None,
                    recording: None,
                }),
                ui_tx,
                events: Mutex::new(Some(events_rx)),
                deps,
            }),
        }
    }

    /// Current snapshot
    pub fn state(&self) -> CameraUiState {
        self.shared.ui_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CameraUiState> {
        self.shared.ui_tx.subscribe()
    }

    pub fn config(&self) -> &CamerakConfig {
        &self.shared.deps.config
    }

    fn update<R>(&self, f: impl FnOnce(&Arc<Shared>, &mut Inner) -> R) -> R {
        let mut inner = self.shared.lock();
        let result = f(&self.shared, &mut inner);
        self.shared.publish(&mut inner);
        result
    }

    /// The preview surface exists; the camera can be opened
    pub fn on_preview_surface_available(&self, width: u32, height: u32) {
        self.update(|shared, inner| {
            inner.view_size = Some(Size::new(width, height));
            shared.open_camera(inner);
        });
    }

    pub fn set_camera_mode(&self, mode: CaptureMode) {
        self.update(|shared, inner| {
            if inner.ui.camera_mode == mode {
                return;
            }
            log::info!("Switching to {} mode", mode);
            inner.ui.camera_mode = mode;
            inner.session.set_mode(mode);

            let prefs = &shared.deps.preferences;
            if prefs.remember_camera_mode() {
                if let Err(e) = prefs.set_last_camera_mode(mode) {
                    log::warn!("Failed to remember camera mode: {}", e);
                }
            }

            if inner.recording.is_some() {
                shared.finish_recording(inner, true);
            } else {
                shared.reconfigure(inner);
            }
        });
    }

    pub fn set_aspect_ratio(&self, ratio: AspectRatio) {
        self.update(|shared, inner| shared.set_aspect_ratio(inner, ratio));
    }

    pub fn cycle_aspect_ratio(&self) {
        self.update(|shared, inner| {
            let next = inner.ui.aspect_ratio.next();
            shared.set_aspect_ratio(inner, next);
        });
    }

    pub fn toggle_ratio_selector(&self) {
        self.update(|_, inner| inner.ui.ratio_selector_expanded = !inner.ui.ratio_selector_expanded);
    }

    pub fn collapse_ratio_selector(&self) {
        self.update(|_, inner| inner.ui.ratio_selector_expanded = false);
    }

    /// Toggle between the back and front cameras
    pub fn switch_camera(&self) {
        self.update(|shared, inner| {
            let target = if inner.ui.current_camera_id == inner.ui.back_camera_id {
                inner.ui.front_camera_id.clone()
            } else {
                inner.ui.back_camera_id.clone()
            };
            let Some(target) = target else {
                log::warn!("No other camera to switch to");
                return;
            };
            if inner.ui.current_camera_id.as_deref() == Some(target.as_str()) {
                return;
            }

            shared.close_camera(inner);
            inner.ui.current_camera_id = Some(target);
            inner.ui.flash_enabled = false;
            inner.session.set_flash(false);
            shared.open_camera(inner);
        });
    }

    pub fn switch_to_camera_with_flash(&self) {
        self.update(|shared, inner| {
            let Some(target) = scan_cameras(shared.deps.service.as_ref()).with_flash else {
                log::warn!("No camera with a flash unit");
                return;
            };
            if inner.ui.current_camera_id.as_deref() == Some(target.as_str()) {
                return;
            }
            shared.close_camera(inner);
            inner.ui.current_camera_id = Some(target);
            shared.open_camera(inner);
        });
    }

    pub fn toggle_flash(&self) {
        self.update(|_, inner| {
            let enabled = !inner.ui.flash_enabled;
            inner.ui.flash_enabled = enabled;
            inner.session.set_flash(enabled);
            log::debug!("Flash {}", if enabled { "on" } else { "off" });
        });
    }

    /// Shutter button: photo in photo mode, start/stop recording in video mode
    pub fn capture_action(&self, display_rotation: DisplayRotation) {
        self.update(|shared, inner| match inner.ui.camera_mode {
            CaptureMode::Photo => {
                if let Err(e) = inner.session.capture_still(display_rotation) {
                    log::warn!("Photo not taken: {}", e);
                }
            }
            CaptureMode::Video => {
                if inner.recording.is_some() {
                    shared.finish_recording(inner, true);
                } else {
                    shared.start_recording(inner, display_rotation);
                }
            }
        });
    }

    pub fn on_app_backgrounded(&self) {
        log::info!("App backgrounded, releasing camera");
        self.update(|shared, inner| shared.close_camera(inner));
    }

    pub fn on_app_foregrounded(&self) {
        log::info!("App foregrounded");
        self.update(|shared, inner| {
            if inner.view_size.is_some() {
                shared.open_camera(inner);
            }
            shared.refresh_gallery(inner);
        });
    }

    pub fn refresh_gallery_thumbnails(&self) {
        self.update(|shared, inner| shared.refresh_gallery(inner));
    }

    /// Newest gallery item, re-queried when the cached one is gone
    pub fn latest_media(&self) -> Option<MediaItem> {
        self.update(|shared, inner| {
            if !inner.gallery.validate_latest(shared.deps.media_index.as_ref()) {
                shared.refresh_gallery(inner);
            }
            inner.ui.latest_gallery_media.clone()
        })
    }

    /// Matrix mapping the camera buffer onto a `view_width`×`view_height` view
    pub fn preview_transform(&self, view_width: u32, view_height: u32, display: DisplayRotation) -> PreviewTransform {
        let inner = self.shared.lock();
        let Some(camera_id) = inner.ui.current_camera_id.as_deref() else {
            return PreviewTransform::identity();
        };
        let sensor = match inner.session.characteristics() {
            Some(c) => c.sensor_orientation,
            None => match self.shared.deps.service.characteristics(camera_id) {
                Ok(c) => c.sensor_orientation,
                Err(e) => {
                    log::warn!("No characteristics for camera {}: {}", camera_id, e);
                    return PreviewTransform::identity();
                }
            },
        };
        preview_transform(view_width, view_height, inner.ui.preview_size, sensor, display)
    }

    /// Newest live preview frame as JPEG; `None` until the camera is ready or
    /// when no new frame arrived since the last call
    pub fn preview_frame(&self) -> Option<PreviewFrame> {
        if !self.shared.lock().session.is_ready() {
            return None;
        }
        let frame = self.shared.deps.service.latest_preview_frame()?;
        match encode_frame_jpeg(&frame, PREVIEW_JPEG_QUALITY) {
            Ok(data) => Some(PreviewFrame {
                sequence: frame.sequence,
                timestamp_us: frame.timestamp_us,
                width: frame.width,
                height: frame.height,
                format: "jpeg".to_string(),
                data,
            }),
            Err(e) => {
                log::warn!("Preview frame {} dropped: {}", frame.sequence, e);
                None
            }
        }
    }

    /// Release the camera and finish any recording
    pub fn shutdown(&self) {
        self.update(|shared, inner| shared.close_camera(inner));
    }

    /// Handle every queued session event without blocking.
    ///
    /// Stills are processed inline. Returns the number of events handled.
    pub fn pump_pending(&self) -> usize {
        let mut handled = 0;
        loop {
            let event = {
                let mut events = self.shared.lock_events();
                match events.as_mut() {
                    Some(rx) => rx.try_recv().ok(),
                    None => None,
                }
            };
            let Some(event) = event else {
                break;
            };
            if let Some(still) = self.handle_event(event) {
                let saved = self.shared.save_still(still);
                self.update(|shared, inner| shared.apply_saved_still(inner, saved));
            }
            handled += 1;
        }
        handled
    }

    /// Move event handling onto a tokio task.
    ///
    /// Stills are processed on the blocking pool. Returns `None` when the
    /// loop is already running.
    pub fn spawn_event_loop(&self) -> Option<JoinHandle<()>> {
        let rx = self.shared.lock_events().take()?;
        let vm = self.clone();
        Some(tokio::spawn(async move { vm.run_event_loop(rx).await }))
    }

    async fn run_event_loop(self, mut rx: EventReceiver) {
        log::debug!("Session event loop started");
        while let Some(event) = rx.recv().await {
            let Some(still) = self.handle_event(event) else {
                continue;
            };
            let shared = Arc::clone(&self.shared);
            match tokio::task::spawn_blocking(move || shared.save_still(still)).await {
                Ok(saved) => self.update(|shared, inner| shared.apply_saved_still(inner, saved)),
                Err(e) => log::error!("Still processing task failed: {}", e),
            }
        }
        log::debug!("Session event loop finished");
    }

    fn handle_event(&self, event: SessionEvent) -> Option<PendingStill> {
        self.update(|shared, inner| {
            let outcome = inner.session.handle_event(event);
            shared.apply_outcome(inner, outcome)
        })
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_events(&self) -> MutexGuard<'_, Option<EventReceiver>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, inner: &mut Inner) {
        inner.ui.camera_ready = inner.session.is_ready();
        inner.ui.preview_size = inner.session.preview_size();
        self.ui_tx.send_if_modified(|ui| {
            if *ui == inner.ui {
                false
            } else {
                *ui = inner.ui.clone();
                true
            }
        });
    }

    fn open_camera(&self, inner: &mut Inner) {
        let camera_id = inner.ui.current_camera_id.clone();
        if let Err(e) = inner.session.open(camera_id.as_deref()) {
            log::error!("Failed to open camera {:?}: {}", camera_id, e);
        }
    }

    fn close_camera(&self, inner: &mut Inner) {
        if inner.recording.is_some() {
            self.finish_recording(inner, false);
        }
        inner.session.close();
    }

    fn reconfigure(&self, inner: &mut Inner) {
        if !inner.session.device_open() {
            return;
        }
        if let Err(e) = inner.session.configure() {
            log::error!("Failed to reconfigure camera session: {}", e);
        }
    }

    fn set_aspect_ratio(&self, inner: &mut Inner, ratio: AspectRatio) {
        if inner.ui.aspect_ratio == ratio {
            return;
        }
        log::info!("Aspect ratio set to {}", ratio);
        inner.ui.aspect_ratio = ratio;
        inner.session.set_aspect_ratio(ratio);

        let prefs = &self.deps.preferences;
        if prefs.remember_aspect_ratio() {
            if let Err(e) = prefs.set_last_aspect_ratio(ratio) {
                log::warn!("Failed to remember aspect ratio: {}", e);
            }
        }

        // applied when the recording ends
        if inner.recording.is_none() {
            self.reconfigure(inner);
        }
    }

    fn refresh_gallery(&self, inner: &mut Inner) {
        inner.gallery.refresh(self.deps.media_index.as_ref());
        inner.ui.last_photo = inner.gallery.last_photo.clone();
        inner.ui.last_video = inner.gallery.last_video.clone();
        inner.ui.latest_gallery_media = inner.gallery.latest.clone();
    }

    fn start_recording(self: &Arc<Self>, inner: &mut Inner, display_rotation: DisplayRotation) {
        let Some(recorder) = self.deps.recorder.clone() else {
            log::error!("Video recording is not available in this build");
            return;
        };
        if !inner.session.is_ready() {
            log::warn!("Camera not ready, recording not started");
            return;
        }

        let sensor = inner
            .session
            .characteristics()
            .map(|c| c.sensor_orientation)
            .unwrap_or(0);
        let settings = self
            .deps
            .config
            .recording_settings()
            .with_orientation_hint(video_orientation_hint(sensor, display_rotation));

        let name = video_file_name(&self.deps.config.recording.video_prefix);
        let item = match self
            .deps
            .media_index
            .insert(MediaKind::Video, &name, MediaKind::Video.default_mime_type())
        {
            Ok(item) => item,
            Err(e) => {
                log::error!("Failed to create video file: {}", e);
                return;
            }
        };

        let sink = match recorder.prepare(&item.path, &settings) {
            Ok(sink) => sink,
            Err(e) => {
                log::error!("Failed to prepare recorder: {}", e);
                self.discard_media(&item);
                return;
            }
        };
        if let Err(e) = inner.session.begin_recording(sink) {
            log::error!("Failed to configure recording session: {}", e);
            if let Err(e) = recorder.stop() {
                log::debug!("Discarding prepared recording: {}", e);
            }
            self.discard_media(&item);
            return;
        }

        log::info!(
            "Recording to {} ({}, {} fps, orientation hint {})",
            item.path.display(),
            settings.size,
            settings.fps,
            settings.orientation_hint
        );
        inner.ui.is_recording = true;
        inner.ui.recording_time_secs = 0;
        inner.gallery.last_video = Some(item.clone());
        inner.recording = Some(ActiveRecording {
            item,
            started_at: Instant::now(),
            timer: spawn_recording_timer(Arc::downgrade(self)),
            recorder_started: false,
        });
        self.refresh_gallery(inner);
    }

    /// Stop the recorder; with `restore_preview` the preview session is rebuilt
    fn finish_recording(&self, inner: &mut Inner, restore_preview: bool) {
        let Some(active) = inner.recording.take() else {
            return;
        };
        if let Some(timer) = active.timer {
            timer.abort();
        }

        if let Some(recorder) = &self.deps.recorder {
            match recorder.stop() {
                Ok(stats) => log::info!(
                    "Recording {} finished: {} frames, {:.1}s",
                    active.item.path.display(),
                    stats.video_frames,
                    stats.duration_secs
                ),
                Err(e) => log::error!("Failed to stop recording: {}", e),
            }
        }
        if !active.recorder_started {
            log::warn!("Recording never started, removing {}", active.item.path.display());
            self.discard_media(&active.item);
        }

        inner.ui.is_recording = false;
        inner.ui.recording_time_secs = 0;
        self.refresh_gallery(inner);

        if restore_preview {
            if let Err(e) = inner.session.end_recording() {
                log::error!("Failed to restore preview after recording: {}", e);
            }
        }
    }

    fn discard_media(&self, item: &MediaItem) {
        if let Err(e) = self.deps.media_index.delete(item) {
            log::warn!("Failed to remove {}: {}", item.path.display(), e);
        }
    }

    /// Publish elapsed seconds; false once no recording is active
    fn tick_recording(&self) -> bool {
        let mut inner = self.lock();
        let Some(active) = &inner.recording else {
            return false;
        };
        inner.ui.recording_time_secs = active.started_at.elapsed().as_secs();
        self.publish(&mut inner);
        true
    }

    fn apply_outcome(&self, inner: &mut Inner, outcome: SessionOutcome) -> Option<PendingStill> {
        match outcome {
            SessionOutcome::Opened { flash_supported } => {
                inner.ui.flash_supported = flash_supported;
                if !flash_supported && inner.ui.flash_enabled {
                    inner.ui.flash_enabled = false;
                    inner.session.set_flash(false);
                }
            }
            SessionOutcome::ConfigureFailed => {
                log::warn!("Camera session could not be configured");
            }
            SessionOutcome::StillImage { jpeg, shot } => {
                return Some(PendingStill {
                    jpeg,
                    params: self.still_params(&shot),
                });
            }
            SessionOutcome::RecordingSessionReady => {
                if let Some(recorder) = &self.deps.recorder {
                    match recorder.start() {
                        Ok(()) => {
                            if let Some(active) = inner.recording.as_mut() {
                                active.recorder_started = true;
                            }
                        }
                        Err(e) => {
                            log::error!("Failed to start recorder: {}", e);
                            self.finish_recording(inner, true);
                        }
                    }
                }
            }
            SessionOutcome::RecordingSessionFailed => {
                log::error!("Recording session failed");
                self.finish_recording(inner, true);
            }
            SessionOutcome::Closed => {
                self.finish_recording(inner, false);
            }
            SessionOutcome::Ignored | SessionOutcome::Ready { .. } | SessionOutcome::CaptureFinished { .. } => {}
        }
        None
    }

    fn still_params(&self, shot: &ShotInfo) -> StillProcessingParams {
        StillProcessingParams {
            aspect_ratio: shot.aspect_ratio,
            sensor_orientation: shot.sensor_orientation,
            display_rotation: shot.display_rotation,
            lens_facing: shot.lens_facing,
            jpeg_quality: self.deps.config.capture.jpeg_quality,
        }
    }

    /// Runs without the state lock held
    fn save_still(&self, still: PendingStill) -> Result<MediaItem, CameraError> {
        let processed = process_still(&still.jpeg, &still.params)?;
        let name = photo_file_name(&self.deps.config.capture.photo_prefix);
        let index = self.deps.media_index.as_ref();
        let item = index.insert(MediaKind::Image, &name, MediaKind::Image.default_mime_type())?;
        index.write(&item, &processed.jpeg)?;
        log::info!(
            "Photo saved to {} ({}x{}, rotated {})",
            item.path.display(),
            processed.width,
            processed.height,
            processed.rotation
        );
        Ok(item)
    }

    fn apply_saved_still(&self, inner: &mut Inner, saved: Result<MediaItem, CameraError>) {
        match saved {
            Ok(item) => {
                inner.gallery.last_photo = Some(item);
                self.refresh_gallery(inner);
            }
            Err(e) => log::error!("Failed to save photo: {}", e),
        }
    }
}

fn spawn_recording_timer(shared: Weak<Shared>) -> Option<JoinHandle<()>> {
    let handle = tokio::runtime::Handle::try_current().ok()?;
    Some(handle.spawn(async move {
        let mut ticks = tokio::time::interval(Duration::from_secs(1));
        ticks.tick().await;
        loop {
            ticks.tick().await;
            let Some(shared) = shared.upgrade() else {
                break;
            };
            if !shared.tick_recording() {
                break;
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{synthetic_jpeg, InMemoryMediaIndex, ServiceCall, SimulatedCameraService, SimulatedRecorder};
    use crate::types::{FlashMode, OutputTarget, RequestTemplate};

    struct Harness {
        vm: CameraViewModel,
        service: Arc<SimulatedCameraService>,
        index: Arc<InMemoryMediaIndex>,
        recorder: Arc<SimulatedRecorder>,
        prefs: Arc<PreferencesRepository>,
    }

    fn harness_with(prefs: PreferencesRepository, config: CamerakConfig) -> Harness {
        let service = Arc::new(SimulatedCameraService::new());
        let index = Arc::new(InMemoryMediaIndex::new());
        let recorder = Arc::new(SimulatedRecorder::new());
        let prefs = Arc::new(prefs);
        let vm = CameraViewModel::new(CameraDeps {
            service: service.clone(),
            media_index: index.clone(),
            recorder: Some(recorder.clone()),
            preferences: prefs.clone(),
            config,
        });
        Harness {
            vm,
            service,
            index,
            recorder,
            prefs,
        }
    }

    fn harness() -> Harness {
        harness_with(PreferencesRepository::in_memory(), CamerakConfig::default())
    }

    fn ready(h: &Harness) {
        h.vm.on_preview_surface_available(1080, 1920);
        h.vm.pump_pending();
        assert!(h.vm.state().camera_ready);
    }

    #[test]
    fn test_initial_state_prefers_flash_camera() {
        let h = harness();
        let state = h.vm.state();
        assert_eq!(state.current_camera_id.as_deref(), Some("0"));
        assert_eq!(state.back_camera_id.as_deref(), Some("0"));
        assert_eq!(state.front_camera_id.as_deref(), Some("1"));
        assert_eq!(state.preview_size, Size::new(1920, 1080));
        assert!(!state.camera_ready);
    }

    #[test]
    fn test_remembered_mode_and_ratio_restored() {
        let prefs = PreferencesRepository::in_memory();
        prefs.set_last_camera_mode(CaptureMode::Video).unwrap();
        prefs.set_last_aspect_ratio(AspectRatio::Ratio1x1).unwrap();
        let h = harness_with(prefs, CamerakConfig::default());
        assert_eq!(h.vm.state().camera_mode, CaptureMode::Video);
        assert_eq!(h.vm.state().aspect_ratio, AspectRatio::Ratio1x1);
    }

    #[test]
    fn test_forgotten_preferences_use_defaults() {
        let prefs = PreferencesRepository::in_memory();
        prefs.set_last_camera_mode(CaptureMode::Video).unwrap();
        prefs.set_remember_camera_mode(false).unwrap();
        let h = harness_with(prefs, CamerakConfig::default());
        assert_eq!(h.vm.state().camera_mode, CaptureMode::Photo);
    }

    #[test]
    fn test_surface_opens_camera() {
        let h = harness();
        ready(&h);
        let state = h.vm.state();
        assert!(state.flash_supported);
        assert_eq!(h.service.open_camera_id().as_deref(), Some("0"));
    }

    #[test]
    fn test_take_picture_saves_processed_photo() {
        let h = harness();
        h.service.set_still_jpeg(synthetic_jpeg(64, 48, Some(6)));
        ready(&h);

        h.vm.capture_action(DisplayRotation::Rotation0);
        h.vm.pump_pending();

        let photos = h.index.items(MediaKind::Image);
        assert_eq!(photos.len(), 1);
        let saved = h.index.data(&photos[0].id).unwrap();
        let image = image::load_from_memory(&saved).unwrap();
        // back sensor at 90 degrees turns the landscape buffer upright
        assert_eq!((image.width(), image.height()), (48, 64));
        assert_eq!(crate::processing::exif::read_orientation(&saved), Some(1));

        let state = h.vm.state();
        assert_eq!(state.last_photo.as_ref().map(|p| &p.id), Some(&photos[0].id));
        assert_eq!(state.latest_gallery_media, state.last_photo);
        assert!(state.camera_ready);
    }

    #[test]
    fn test_photo_cropped_to_selected_ratio() {
        let h = harness();
        h.service.set_still_jpeg(synthetic_jpeg(64, 48, None));
        ready(&h);
        h.vm.set_aspect_ratio(AspectRatio::Ratio1x1);
        h.vm.pump_pending();

        h.vm.capture_action(DisplayRotation::Rotation0);
        h.vm.pump_pending();

        let photo = &h.index.items(MediaKind::Image)[0];
        let image = image::load_from_memory(&h.index.data(&photo.id).unwrap()).unwrap();
        assert_eq!((image.width(), image.height()), (48, 48));
    }

    #[test]
    fn test_capture_failure_restores_preview() {
        let h = harness();
        ready(&h);
        h.service.fail_next_capture();
        h.vm.capture_action(DisplayRotation::Rotation0);
        h.vm.pump_pending();

        assert!(h.index.items(MediaKind::Image).is_empty());
        assert!(h.vm.state().camera_ready);
        let repeating = h.service.last_repeating().unwrap();
        assert_eq!(repeating.template, RequestTemplate::Preview);
    }

    #[test]
    fn test_failed_save_keeps_previous_photo() {
        let h = harness();
        let existing = h.index.add(MediaKind::Image, "IMG_old.jpg", 10);
        h.vm.refresh_gallery_thumbnails();
        ready(&h);

        h.index.set_failing(true);
        h.vm.capture_action(DisplayRotation::Rotation0);
        h.vm.pump_pending();
        assert_eq!(h.vm.state().last_photo, Some(existing));
    }

    #[test]
    fn test_mode_change_reconfigures_and_is_remembered() {
        let h = harness();
        ready(&h);
        h.service.clear_calls();

        h.vm.set_camera_mode(CaptureMode::Video);
        h.vm.pump_pending();

        assert_eq!(h.prefs.last_camera_mode(), Some(CaptureMode::Video));
        assert!(h.service.calls().iter().any(|c| matches!(
            c,
            ServiceCall::CreateSession {
                still_size: None,
                ..
            }
        )));
        assert_eq!(h.service.last_repeating().unwrap().template, RequestTemplate::Record);
    }

    #[test]
    fn test_same_mode_is_noop() {
        let h = harness();
        ready(&h);
        h.service.clear_calls();
        h.vm.set_camera_mode(CaptureMode::Photo);
        assert!(h.service.calls().is_empty());
    }

    #[test]
    fn test_ratio_not_saved_when_not_remembered() {
        let h = harness();
        h.prefs.set_remember_aspect_ratio(false).unwrap();
        h.vm.set_aspect_ratio(AspectRatio::Ratio4x3);
        assert_eq!(h.vm.state().aspect_ratio, AspectRatio::Ratio4x3);
        assert_eq!(h.prefs.last_aspect_ratio(), None);
    }

    #[test]
    fn test_cycle_aspect_ratio_wraps() {
        let h = harness();
        for expected in [
            AspectRatio::Ratio16x9,
            AspectRatio::Ratio4x3,
            AspectRatio::Ratio1x1,
            AspectRatio::Full,
        ] {
            h.vm.cycle_aspect_ratio();
            assert_eq!(h.vm.state().aspect_ratio, expected);
        }
    }

    #[test]
    fn test_ratio_selector_flags() {
        let h = harness();
        h.vm.toggle_ratio_selector();
        assert!(h.vm.state().ratio_selector_expanded);
        h.vm.collapse_ratio_selector();
        assert!(!h.vm.state().ratio_selector_expanded);
    }

    #[test]
    fn test_switch_camera_resets_flash() {
        let h = harness();
        ready(&h);
        h.vm.toggle_flash();
        assert!(h.vm.state().flash_enabled);
        assert_eq!(h.service.last_repeating().unwrap().flash_mode, Some(FlashMode::Torch));

        h.vm.switch_camera();
        h.vm.pump_pending();

        let state = h.vm.state();
        assert_eq!(state.current_camera_id.as_deref(), Some("1"));
        assert!(!state.flash_enabled);
        assert!(!state.flash_supported);
        assert!(state.camera_ready);
        assert_eq!(h.service.open_camera_id().as_deref(), Some("1"));
    }

    #[test]
    fn test_switch_to_camera_with_flash() {
        let h = harness();
        h.vm.switch_camera();
        assert_eq!(h.vm.state().current_camera_id.as_deref(), Some("1"));
        h.vm.switch_to_camera_with_flash();
        assert_eq!(h.vm.state().current_camera_id.as_deref(), Some("0"));
    }

    #[test]
    fn test_video_recording_cycle() {
        let h = harness();
        h.vm.set_camera_mode(CaptureMode::Video);
        ready(&h);

        h.vm.capture_action(DisplayRotation::Rotation90);
        assert!(h.vm.state().is_recording);
        h.vm.pump_pending();
        assert!(h.recorder.is_recording());

        let settings = &h.recorder.prepared_settings()[0];
        assert_eq!(settings.orientation_hint, 0);
        assert_eq!(settings.size, Size::new(1920, 1080));
        assert_eq!(settings.bitrate, 10_000_000);

        let frame = crate::testing::synthetic_frame(0, 8, 8);
        assert!(h.service.push_recording_frame(&frame).unwrap());
        assert!(h.service.last_repeating().unwrap().targets(OutputTarget::Recording));

        h.vm.capture_action(DisplayRotation::Rotation90);
        h.vm.pump_pending();

        let state = h.vm.state();
        assert!(!state.is_recording);
        assert_eq!(state.recording_time_secs, 0);
        assert!(!h.recorder.is_recording());
        assert_eq!(h.recorder.frames(), 1);
        assert_eq!(h.index.items(MediaKind::Video).len(), 1);
        assert_eq!(state.last_video, Some(h.index.items(MediaKind::Video)[0].clone()));
        assert!(state.camera_ready);
    }

    #[test]
    fn test_switching_to_photo_stops_recording() {
        let h = harness();
        h.vm.set_camera_mode(CaptureMode::Video);
        ready(&h);
        h.vm.capture_action(DisplayRotation::Rotation0);
        h.vm.pump_pending();

        h.vm.set_camera_mode(CaptureMode::Photo);
        h.vm.pump_pending();

        let state = h.vm.state();
        assert!(!state.is_recording);
        assert!(!h.recorder.is_recording());
        assert!(state.camera_ready);
        assert_eq!(h.service.last_repeating().unwrap().template, RequestTemplate::Preview);
    }

    #[test]
    fn test_recording_session_failure_aborts() {
        let h = harness();
        h.vm.set_camera_mode(CaptureMode::Video);
        ready(&h);
        h.service.fail_next_configure();
        h.vm.capture_action(DisplayRotation::Rotation0);
        h.vm.pump_pending();

        let state = h.vm.state();
        assert!(!state.is_recording);
        assert!(state.camera_ready);
        assert!(h.index.items(MediaKind::Video).is_empty());
        assert_eq!(state.last_video, None);
        assert_eq!(state.latest_gallery_media, None);
    }

    #[test]
    fn test_failed_recorder_prepare_leaves_no_video() {
        let h = harness();
        let photo = h.index.add(MediaKind::Image, "IMG_old.jpg", 10);
        h.vm.set_camera_mode(CaptureMode::Video);
        ready(&h);

        h.recorder.fail_next_prepare();
        h.vm.capture_action(DisplayRotation::Rotation0);
        h.vm.pump_pending();

        let state = h.vm.state();
        assert!(!state.is_recording);
        assert!(h.index.items(MediaKind::Video).is_empty());
        assert_eq!(state.last_video, None);

        h.vm.refresh_gallery_thumbnails();
        assert_eq!(h.vm.state().latest_gallery_media, Some(photo));

        // the next attempt still works
        h.vm.capture_action(DisplayRotation::Rotation0);
        h.vm.pump_pending();
        assert!(h.vm.state().is_recording);
        assert_eq!(h.index.items(MediaKind::Video).len(), 1);
    }

    #[test]
    fn test_recording_without_recorder_is_refused() {
        let service = Arc::new(SimulatedCameraService::new());
        let vm = CameraViewModel::new(CameraDeps {
            service,
            media_index: Arc::new(InMemoryMediaIndex::new()),
            recorder: None,
            preferences: Arc::new(PreferencesRepository::in_memory()),
            config: CamerakConfig::default(),
        });
        vm.set_camera_mode(CaptureMode::Video);
        vm.on_preview_surface_available(1080, 1920);
        vm.pump_pending();
        vm.capture_action(DisplayRotation::Rotation0);
        assert!(!vm.state().is_recording);
    }

    #[test]
    fn test_background_releases_and_foreground_reopens() {
        let h = harness();
        ready(&h);
        h.vm.on_app_backgrounded();
        assert!(!h.vm.state().camera_ready);
        assert!(!h.service.is_device_open());

        h.vm.on_app_foregrounded();
        h.vm.pump_pending();
        assert!(h.vm.state().camera_ready);
        assert!(h.service.is_device_open());
    }

    #[test]
    fn test_background_while_recording_finishes_recording() {
        let h = harness();
        h.vm.set_camera_mode(CaptureMode::Video);
        ready(&h);
        h.vm.capture_action(DisplayRotation::Rotation0);
        h.vm.pump_pending();

        h.vm.on_app_backgrounded();
        assert!(!h.vm.state().is_recording);
        assert!(!h.recorder.is_recording());
        assert!(!h.service.is_device_open());
    }

    #[test]
    fn test_foreground_without_surface_keeps_camera_closed() {
        let h = harness();
        h.vm.on_app_foregrounded();
        assert!(!h.service.is_device_open());
    }

    #[test]
    fn test_disconnect_marks_not_ready() {
        let h = harness();
        ready(&h);
        h.service.emit(crate::platform::SessionEventKind::Disconnected);
        h.vm.pump_pending();
        assert!(!h.vm.state().camera_ready);
    }

    #[test]
    fn test_latest_media_revalidates() {
        let h = harness();
        let photo = h.index.add(MediaKind::Image, "a.jpg", 10);
        let video = h.index.add(MediaKind::Video, "b.mp4", 20);
        h.vm.refresh_gallery_thumbnails();
        assert_eq!(h.vm.latest_media(), Some(video.clone()));

        h.index.remove(&video.id);
        assert_eq!(h.vm.latest_media(), Some(photo));
    }

    #[test]
    fn test_preview_frames_reach_the_ui() {
        let h = harness();
        assert!(!h.service.push_preview_frame(crate::testing::synthetic_frame(0, 16, 8)));
        assert_eq!(h.vm.preview_frame(), None);

        ready(&h);
        assert!(h.service.push_preview_frame(crate::testing::synthetic_frame(1, 16, 8)));
        assert!(h.service.push_preview_frame(crate::testing::synthetic_frame(2, 16, 8)));

        let frame = h.vm.preview_frame().expect("preview frame");
        assert_eq!(frame.sequence, 2);
        assert_eq!((frame.width, frame.height), (16, 8));
        assert_eq!(frame.format, "jpeg");
        assert_eq!(&frame.data[..2], &[0xFF, 0xD8]);
        assert_eq!(h.vm.preview_frame(), None);

        h.vm.on_app_backgrounded();
        assert!(!h.service.push_preview_frame(crate::testing::synthetic_frame(3, 16, 8)));
        assert_eq!(h.vm.preview_frame(), None);
    }

    #[test]
    fn test_preview_transform_without_camera_is_identity() {
        let vm = CameraViewModel::new(CameraDeps {
            service: Arc::new(SimulatedCameraService::with_cameras(Vec::new())),
            media_index: Arc::new(InMemoryMediaIndex::new()),
            recorder: None,
            preferences: Arc::new(PreferencesRepository::in_memory()),
            config: CamerakConfig::default(),
        });
        assert!(vm
            .preview_transform(1080, 1920, DisplayRotation::Rotation0)
            .is_identity());
    }

    #[test]
    fn test_preview_transform_uses_sensor_orientation() {
        let h = harness();
        let transform = h.vm.preview_transform(1080, 1920, DisplayRotation::Rotation0);
        assert!(!transform.is_identity());
        let (cx, cy) = transform.map_point(540.0, 960.0);
        assert!((cx - 540.0).abs() < 1e-6);
        assert!((cy - 960.0).abs() < 1e-6);
    }

    #[test]
    fn test_subscribers_see_changes() {
        let h = harness();
        let mut rx = h.vm.subscribe();
        h.vm.toggle_flash();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().flash_enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recording_timer_ticks() {
        let h = harness();
        h.vm.set_camera_mode(CaptureMode::Video);
        ready(&h);
        h.vm.capture_action(DisplayRotation::Rotation0);
        h.vm.pump_pending();

        tokio::time::sleep(Duration::from_millis(3_100)).await;
        assert_eq!(h.vm.state().recording_time_secs, 3);

        h.vm.capture_action(DisplayRotation::Rotation0);
        assert_eq!(h.vm.state().recording_time_secs, 0);
    }

    #[tokio::test]
    async fn test_event_loop_processes_stills() {
        let h = harness();
        let handle = h.vm.spawn_event_loop().unwrap();
        assert!(h.vm.spawn_event_loop().is_none());

        let mut rx = h.vm.subscribe();
        h.vm.on_preview_surface_available(1080, 1920);
        rx.wait_for(|s| s.camera_ready).await.unwrap();

        h.vm.capture_action(DisplayRotation::Rotation0);
        rx.wait_for(|s| s.last_photo.is_some()).await.unwrap();
        assert_eq!(h.index.items(MediaKind::Image).len(), 1);
        handle.abort();
    }
}
