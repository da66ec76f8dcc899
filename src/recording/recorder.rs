//! MP4 recorder combining the H.264 encoder with the muxide muxer

use super::encoder::H264Encoder;
use super::{MediaRecorder, RecordingSettings, RecordingStats};
use crate::errors::CameraError;
use crate::platform::FrameSink;
use crate::types::Frame;
use muxide::api::{Metadata, MuxerBuilder, VideoCodec};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

struct ActiveRecording {
    encoder: H264Encoder,
    muxer: muxide::api::Muxer<BufWriter<File>>,
    settings: RecordingSettings,
    output_path: PathBuf,
    frame_count: u64,
    dropped_frames: u64,
    start_time: Option<Instant>,
    last_frame_time: Option<Instant>,
}

impl ActiveRecording {
    fn create(output: &Path, settings: &RecordingSettings) -> Result<Self, CameraError> {
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(output)
            .map_err(|e| CameraError::RecordingError(format!("Failed to create output file: {}", e)))?;

        let encoder = H264Encoder::new(
            settings.size.width,
            settings.size.height,
            settings.bitrate,
            settings.fps,
        )?;
        let muxer = MuxerBuilder::new(BufWriter::new(file))
            .video(
                VideoCodec::H264,
                settings.size.width,
                settings.size.height,
                settings.fps as f64,
            )
            .with_fast_start(true)
            .with_metadata(Metadata::new().with_current_time())
            .build()
            .map_err(|e| CameraError::RecordingError(format!("Failed to create muxer: {}", e)))?;

        if settings.orientation_hint != 0 {
            log::info!(
                "Recording {} with orientation hint {}°",
                output.display(),
                settings.orientation_hint
            );
        }

        Ok(Self {
            encoder,
            muxer,
            settings: settings.clone(),
            output_path: output.to_path_buf(),
            frame_count: 0,
            dropped_frames: 0,
            start_time: None,
            last_frame_time: None,
        })
    }

    fn write_frame(&mut self, frame: &Frame) -> Result<(), CameraError> {
        let now = Instant::now();
        if self.start_time.is_none() {
            self.start_time = Some(now);
        }

        // frames arriving faster than the target rate are skipped
        let frame_duration = self.settings.frame_duration_secs();
        if let Some(last) = self.last_frame_time {
            if now.duration_since(last).as_secs_f64() < frame_duration * 0.8 {
                self.dropped_frames += 1;
                return Ok(());
            }
        }

        let target = self.settings.size;
        let encoded = if frame.width == target.width && frame.height == target.height {
            self.encoder.encode_rgb(&frame.data)?
        } else {
            let rgb = image::RgbImage::from_vec(frame.width, frame.height, frame.data.clone())
                .ok_or_else(|| CameraError::RecordingError("Frame buffer does not match its size".to_string()))?;
            let scaled = image::imageops::resize(
                &rgb,
                target.width,
                target.height,
                image::imageops::FilterType::Triangle,
            );
            self.encoder.encode_rgb(scaled.as_raw())?
        };

        if encoded.data.is_empty() {
            self.dropped_frames += 1;
            return Ok(());
        }

        let pts = self.frame_count as f64 * frame_duration;
        self.muxer
            .write_video(pts, &encoded.data, encoded.is_keyframe)
            .map_err(|e| CameraError::RecordingError(format!("Failed to write frame: {}", e)))?;

        self.frame_count += 1;
        self.last_frame_time = Some(now);
        Ok(())
    }

    fn finish(self) -> Result<RecordingStats, CameraError> {
        let stats = self
            .muxer
            .finish_with_stats()
            .map_err(|e| CameraError::RecordingError(format!("Failed to finalize recording: {}", e)))?;

        Ok(RecordingStats {
            video_frames: stats.video_frames,
            duration_secs: stats.duration_secs,
            bytes_written: stats.bytes_written,
            dropped_frames: self.dropped_frames,
            output_path: self.output_path,
        })
    }
}

struct Shared {
    active: Mutex<Option<ActiveRecording>>,
    started: AtomicBool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Option<ActiveRecording>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl FrameSink for Shared {
    fn push_frame(&self, frame: &Frame) -> Result<(), CameraError> {
        if !self.started.load(Ordering::Acquire) {
            return Ok(());
        }
        match self.lock().as_mut() {
            Some(recording) => recording.write_frame(frame),
            None => Ok(()),
        }
    }
}

/// H.264/MP4 implementation of [`MediaRecorder`]
pub struct H264Recorder {
    shared: Arc<Shared>,
}

impl Default for H264Recorder {
    fn default() -> Self {
        Self::new()
    }
}

impl H264Recorder {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                active: Mutex::new(None),
                started: AtomicBool::new(false),
            }),
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.shared.lock().as_ref().map(|r| r.frame_count).unwrap_or(0)
    }
}

impl MediaRecorder for H264Recorder {
    fn prepare(&self, output: &Path, settings: &RecordingSettings) -> Result<Arc<dyn FrameSink>, CameraError> {
        let mut active = self.shared.lock();
        if active.is_some() {
            return Err(CameraError::RecordingError("Recorder already prepared".to_string()));
        }
        *active = Some(ActiveRecording::create(output, settings)?);
        self.shared.started.store(false, Ordering::Release);
        log::info!("Prepared recorder for {}", output.display());
        Ok(Arc::clone(&self.shared) as Arc<dyn FrameSink>)
    }

    fn start(&self) -> Result<(), CameraError> {
        if self.shared.lock().is_none() {
            return Err(CameraError::RecordingError("Recorder not prepared".to_string()));
        }
        self.shared.started.store(true, Ordering::Release);
        Ok(())
    }

    fn stop(&self) -> Result<RecordingStats, CameraError> {
        self.shared.started.store(false, Ordering::Release);
        let recording = self
            .shared
            .lock()
            .take()
            .ok_or_else(|| CameraError::RecordingError("Recorder not prepared".to_string()))?;
        let stats = recording.finish()?;
        log::info!(
            "Recording finished: {} frames, {:.1}s, {} bytes",
            stats.video_frames,
            stats.duration_secs,
            stats.bytes_written
        );
        Ok(stats)
    }

    fn is_recording(&self) -> bool {
        self.shared.started.load(Ordering::Acquire)
    }
}
