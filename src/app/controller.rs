// SPDX-License-Identifier: GPL-3.0-only

//! Session controller
//!
//! Owns the [`Session`] and every resource opened for it. The driver (CLI
//! loop or terminal UI) calls [`SessionController::tick`] whenever
//! [`SessionController::tick_due`] says so; each tick moves exactly one frame
//! from the source to the preview, the virtual camera, the recorder and the
//! QR scanner.

use super::frame_processor::QrScanner;
use super::recording::ActiveRecording;
use super::state::{Session, SessionEvent, SessionState};
use crate::backends::MediaBackend;
use crate::backends::camera::{Frame, FrameSource, SourceDescriptor};
use crate::backends::virtual_camera::VirtualCamera;
use crate::config::Config;
use crate::constants::timing;
use crate::errors::{FrameReadError, PhotoError, RecordingError, SessionError, SessionResult};
use crate::pipelines::photo::save_jpeg;
use crate::pipelines::video::{MuxJob, Muxer};
use crate::storage::{StorageDirs, unique_output_path};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Capacity of the event channel
const EVENT_CHANNEL_CAPACITY: usize = 100;

pub struct SessionController<B: MediaBackend> {
    backend: B,
    config: Config,
    dirs: StorageDirs,
    session: Session,
    source: Option<Box<dyn FrameSource>>,
    virtual_camera: Option<VirtualCamera>,
    recording: Option<ActiveRecording>,
    qr_scanner: QrScanner,
    qr_payloads: Vec<String>,
    latest_frame: Option<Frame>,
    muxer: Muxer,
    mux_jobs: Vec<MuxJob>,
    next_job_id: u64,
    next_tick: Option<Instant>,
    read_failures: u64,
    events: broadcast::Sender<SessionEvent>,
}

impl<B: MediaBackend> SessionController<B> {
    /// Controller writing to the user's Pictures/Videos folders
    pub fn new(backend: B, config: Config) -> Self {
        let dirs = config.storage_dirs();
        Self::with_storage(backend, config, dirs)
    }

    /// Controller writing to explicit directories
    pub fn with_storage(backend: B, config: Config, dirs: StorageDirs) -> Self {
        let muxer = Muxer::new(backend.mux_engine());
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            session: Session::new(config.target_fps),
            backend,
            config,
            dirs,
            source: None,
            virtual_camera: None,
            recording: None,
            qr_scanner: QrScanner::new(),
            qr_payloads: Vec::new(),
            latest_frame: None,
            muxer,
            mux_jobs: Vec::new(),
            next_job_id: 1,
            next_tick: None,
            read_failures: 0,
            events,
        }
    }

    /// Open `source` and begin streaming
    ///
    /// The virtual camera is optional: if it cannot be created the stream
    /// still starts and [`SessionEvent::VirtualCameraUnavailable`] is sent.
    pub fn start(&mut self, source: SourceDescriptor) -> SessionResult<()> {
        if self.session.state.is_streaming() {
            return Err(SessionError::AlreadyStreaming);
        }

        let fps = self.config.target_fps;
        info!(source = %source, fps, "Starting stream");
        let frame_source = self.backend.open_source(&source, fps).map_err(|e| {
            warn!(source = %source, error = %e, "Failed to open source");
            SessionError::SourceUnavailable {
                source_name: source.to_string(),
                reason: e.to_string(),
            }
        })?;
        let (width, height) = frame_source.frame_size();
        let description = frame_source.description();

        if self.config.virtual_camera_enabled {
            let size = self.config.virtual_camera_size;
            match self
                .backend
                .open_virtual_output(size.width, size.height, fps)
            {
                Ok(output) => {
                    self.virtual_camera =
                        Some(VirtualCamera::new(output, size.width, size.height, fps));
                }
                Err(e) => {
                    warn!(error = %e, "Virtual camera unavailable, streaming without it");
                    self.emit(SessionEvent::VirtualCameraUnavailable(e.to_string()));
                }
            }
        }

        self.source = Some(frame_source);
        self.session.state = SessionState::Streaming;
        self.session.frame_size = Some((width, height));
        self.read_failures = 0;
        self.next_tick = Some(Instant::now());

        info!(source = %description, width, height, "Stream started");
        self.emit(SessionEvent::StreamStarted {
            source: description,
            width,
            height,
        });
        Ok(())
    }

    /// Stop streaming and release every resource
    ///
    /// Stops an active recording first. All resources are released even if
    /// finalizing the recording fails; that error is returned afterwards.
    /// Does nothing while idle.
    pub fn stop(&mut self) -> SessionResult<()> {
        if !self.session.state.is_streaming() {
            return Ok(());
        }
        info!("Stopping stream");

        let recording_result = self.stop_recording().map(|_| ());
        if let Err(e) = &recording_result {
            error!(error = %e, "Recording could not be finalized while stopping");
        }

        self.next_tick = None;
        if let Some(mut camera) = self.virtual_camera.take() {
            camera.close();
        }
        if let Some(mut source) = self.source.take() {
            source.close();
        }
        self.session.state = SessionState::Idle;
        self.session.frame_size = None;
        self.latest_frame = None;
        self.qr_payloads.clear();

        self.emit(SessionEvent::StreamStopped);
        recording_result
    }

    /// Run one iteration of the capture loop
    ///
    /// A failed read skips the tick; nothing else changes.
    pub fn tick(&mut self) {
        self.poll_mux_jobs();

        if !self.session.state.is_streaming() {
            return;
        }
        self.schedule_next_tick(Instant::now());

        let Some(source) = self.source.as_mut() else {
            return;
        };
        let frame = match source.read_frame() {
            Ok(frame) => frame,
            Err(e) => {
                self.read_failures += 1;
                match e {
                    FrameReadError::Timeout => debug!("No frame this tick"),
                    e if self.read_failures % timing::FRAME_LOG_INTERVAL == 1 => {
                        warn!(error = %e, failures = self.read_failures, "Frame read failed")
                    }
                    _ => {}
                }
                return;
            }
        };

        if let Some(camera) = self.virtual_camera.as_mut()
            && let Err(e) = camera.send(&frame)
        {
            warn!(error = %e, "Failed to send frame to virtual camera");
        }

        if let Some(recording) = self.recording.as_mut()
            && let Err(e) = recording.write_frame(&frame)
        {
            warn!(error = %e, "Failed to write frame to recording");
        }

        if self.config.qr_scan_enabled {
            let payloads = self.qr_scanner.scan(&frame);
            if payloads != self.qr_payloads {
                if !payloads.is_empty() {
                    info!(count = payloads.len(), "QR code detected");
                }
                self.qr_payloads = payloads.clone();
                self.emit(SessionEvent::QrDetected(payloads));
            }
        }

        self.latest_frame = Some(frame);
    }

    /// Whether a tick should run at `now`
    pub fn tick_due(&self, now: Instant) -> bool {
        self.next_tick.is_some_and(|at| now >= at)
    }

    /// When the next tick is scheduled, `None` while idle
    pub fn next_tick(&self) -> Option<Instant> {
        self.next_tick
    }

    /// Period of the tick schedule
    pub fn tick_interval(&self) -> Duration {
        self.config.tick_interval()
    }

    fn schedule_next_tick(&mut self, now: Instant) {
        let interval = self.tick_interval();
        let next = self
            .next_tick
            .map_or(now + interval, |previous| previous + interval);
        // A slow tick does not cause a burst of catch-up ticks
        self.next_tick = Some(if next < now { now + interval } else { next });
    }

    /// Begin writing video and audio to temporary files
    pub fn start_recording(&mut self) -> SessionResult<()> {
        match self.session.state {
            SessionState::Idle => return Err(SessionError::NotStreaming),
            SessionState::Recording => return Err(SessionError::AlreadyRecording),
            SessionState::Streaming => {}
        }
        let frame_size = self.session.frame_size.ok_or(SessionError::NotStreaming)?;

        let output = self.next_video_path();
        let recording = ActiveRecording::start(
            &self.backend,
            &self.config,
            &self.dirs.temp,
            output,
            frame_size,
        )?;

        let output = recording.output_path().to_path_buf();
        self.recording = Some(recording);
        self.session.state = SessionState::Recording;
        self.emit(SessionEvent::RecordingStarted { output });
        Ok(())
    }

    /// Finish the recording and hand its files to a mux job
    ///
    /// Returns the job id, or `None` when nothing was recording. The session
    /// is back in `Streaming` whether or not finalization succeeds.
    pub fn stop_recording(&mut self) -> SessionResult<Option<u64>> {
        let Some(recording) = self.recording.take() else {
            return Ok(None);
        };
        self.session.state = SessionState::Streaming;
        info!(
            frames = recording.frames_written(),
            elapsed = ?recording.elapsed(),
            "Stopping recording"
        );

        let finished = recording.finish()?;
        let id = self.next_job_id;
        self.next_job_id += 1;

        let job = MuxJob::spawn(id, self.muxer.clone(), finished.artifact)
            .map_err(|e| RecordingError::FinalizeFailed(e.to_string()))?;
        info!(job = id, output = %job.output_path().display(), "Mux job submitted");
        self.mux_jobs.push(job);
        self.emit(SessionEvent::RecordingStopped { job_id: id });
        Ok(Some(id))
    }

    /// Save the latest frame as a JPEG in the photo directory
    pub fn capture_photo(&mut self) -> Result<PathBuf, PhotoError> {
        let frame = self.latest_frame.as_ref().ok_or(PhotoError::NoFrameAvailable)?;
        let path = save_jpeg(frame, &self.dirs.photos)?;
        info!(path = %path.display(), "Photo saved");
        self.emit(SessionEvent::PhotoSaved(path.clone()));
        Ok(path)
    }

    /// Block until every mux job finished or `timeout` elapsed
    ///
    /// Returns `true` if no job is left running.
    pub fn wait_for_mux_jobs(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.poll_mux_jobs();
            if self.mux_jobs.is_empty() {
                return true;
            }
            if Instant::now() >= deadline {
                warn!(pending = self.mux_jobs.len(), "Mux jobs still running");
                return false;
            }
            std::thread::sleep(timing::CLI_POLL_INTERVAL);
        }
    }

    fn poll_mux_jobs(&mut self) {
        if self.mux_jobs.iter().all(|job| !job.is_finished()) {
            return;
        }
        let (finished, running): (Vec<_>, Vec<_>) = std::mem::take(&mut self.mux_jobs)
            .into_iter()
            .partition(MuxJob::is_finished);
        self.mux_jobs = running;

        for job in finished {
            let job_id = job.id();
            match job.join() {
                Ok(output) => self.emit(SessionEvent::MuxFinished { job_id, output }),
                Err(e) => self.emit(SessionEvent::MuxFailed {
                    job_id,
                    error: e.to_string(),
                }),
            }
        }
    }

    /// A unique destination that no pending mux job is writing to
    fn next_video_path(&self) -> PathBuf {
        let mut path = unique_output_path(&self.dirs.videos, "VID", "mp4");
        let mut n = 1u32;
        while self.output_in_use(&path) {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            path = self.dirs.videos.join(format!("{}_{}.mp4", stem, n));
            n += 1;
        }
        path
    }

    fn output_in_use(&self, path: &Path) -> bool {
        self.mux_jobs.iter().any(|job| job.output_path() == path)
    }

    fn emit(&self, event: SessionEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    pub fn state(&self) -> SessionState {
        self.session.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Most recent frame, used as the preview
    pub fn latest_frame(&self) -> Option<&Frame> {
        self.latest_frame.as_ref()
    }

    /// Payloads of the QR codes in the latest frame
    pub fn qr_payloads(&self) -> &[String] {
        &self.qr_payloads
    }

    pub fn pending_mux_jobs(&self) -> usize {
        self.mux_jobs.len()
    }

    /// Whether frames are being mirrored to a virtual camera
    pub fn virtual_camera_active(&self) -> bool {
        self.virtual_camera.is_some()
    }

    /// Output path and elapsed time of the active recording
    pub fn recording_status(&self) -> Option<(&Path, Duration)> {
        self.recording
            .as_ref()
            .map(|r| (r.output_path(), r.elapsed()))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

impl<B: MediaBackend> Drop for SessionController<B> {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!(error = %e, "Failed to stop session cleanly");
        }
    }
}
