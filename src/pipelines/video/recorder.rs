// SPDX-License-Identifier: MPL-2.0

//! Video recording
//!
//! The session pushes frames into the recorder as they arrive. Each frame is
//! stamped with its capture time relative to the start of the recording, so
//! the video timeline follows the wall clock (and the audio track) whatever
//! rate the session ticks at. The file is tagged with the fixed recording
//! frame rate. The recorder hands frames to a [`VideoWriter`].
//! [`GstVideoWriter`] encodes them:
//!
//! ```text
//! appsrc (RGBA) ! videoconvert ! <h264 encoder> ! h264parse ! mp4mux ! filesink
//! ```

use crate::backends::camera::types::Frame;
use crate::constants::{BitratePreset, timing};
use crate::errors::{BackendError, BackendResult, RecordingError};
use crate::media::encoders::select_h264_encoder;
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Sink for timestamped frames of one recording
pub trait VideoWriter: Send {
    /// Append one frame at presentation time `pts`
    fn write(&mut self, frame: &Frame, pts: Duration, duration: Duration) -> BackendResult<()>;

    /// Flush all pending data and close the file
    fn finish(&mut self) -> Result<(), RecordingError>;
}

/// A finalized video file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedVideo {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub frames: u64,
    pub duration: Duration,
}

/// Smallest gap between two presentation timestamps
const MIN_PTS_STEP: Duration = Duration::from_millis(1);

/// Appends session frames to a video file
pub struct VideoRecorder {
    writer: Option<Box<dyn VideoWriter>>,
    path: PathBuf,
    size: (u32, u32),
    origin: Instant,
    frame_duration: Duration,
    last_pts: Option<Duration>,
    frames_written: u64,
    frames_rejected: u64,
}

impl VideoRecorder {
    /// Start recording into an opened `writer`
    ///
    /// `width`x`height` is the native size of the source; frames of any
    /// other size are rejected.
    pub fn start(
        writer: Box<dyn VideoWriter>,
        output_path: PathBuf,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Self {
        info!(
            path = %output_path.display(),
            width,
            height,
            fps,
            "Video recording started"
        );
        Self {
            writer: Some(writer),
            path: output_path,
            size: (width, height),
            origin: Instant::now(),
            frame_duration: Duration::from_secs_f64(1.0 / fps.max(1) as f64),
            last_pts: None,
            frames_written: 0,
            frames_rejected: 0,
        }
    }

    /// Whether the writer is still open
    pub fn is_recording(&self) -> bool {
        self.writer.is_some()
    }

    /// Instant the recording timeline starts at
    pub fn origin(&self) -> Instant {
        self.origin
    }

    /// Append a frame at its capture time
    ///
    /// The first frame always starts at zero. Later frames keep their offset
    /// from [`origin`](Self::origin), bumped forward if needed so
    /// timestamps stay strictly increasing.
    pub fn write_frame(&mut self, frame: &Frame) -> Result<(), RecordingError> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(RecordingError::Write("recorder is stopped".to_string()));
        };

        if frame.size() != self.size {
            self.frames_rejected += 1;
            if self.frames_rejected % timing::FRAME_LOG_INTERVAL == 1 {
                warn!(
                    expected = ?self.size,
                    got = ?frame.size(),
                    rejected = self.frames_rejected,
                    "Frame size differs from recording, dropping frame"
                );
            }
            return Ok(());
        }

        let pts = match self.last_pts {
            None => Duration::ZERO,
            Some(last) => frame
                .captured_at
                .saturating_duration_since(self.origin)
                .max(last + MIN_PTS_STEP),
        };
        writer.write(frame, pts, self.frame_duration)?;
        self.last_pts = Some(pts);
        self.frames_written += 1;
        Ok(())
    }

    /// Length of the video timeline written so far
    pub fn duration(&self) -> Duration {
        self.last_pts
            .map_or(Duration::ZERO, |last| last + self.frame_duration)
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn frames_rejected(&self) -> u64 {
        self.frames_rejected
    }

    /// Output path of the temporary video file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush and close the file. Returns `None` if already stopped.
    pub fn stop(&mut self) -> Result<Option<RecordedVideo>, RecordingError> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(None);
        };
        info!(frames = self.frames_written, "Stopping video recording");
        writer.finish()?;

        let recorded = RecordedVideo {
            path: self.path.clone(),
            width: self.size.0,
            height: self.size.1,
            frames: self.frames_written,
            duration: self.duration(),
        };
        info!(
            path = %recorded.path.display(),
            frames = recorded.frames,
            duration = ?recorded.duration,
            "Video recording saved"
        );
        Ok(Some(recorded))
    }
}

impl Drop for VideoRecorder {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!(error = %e, "Failed to finalize video while dropping recorder");
        }
    }
}

/// H.264/MP4 writer built on GStreamer
pub struct GstVideoWriter {
    pipeline: gst::Pipeline,
    appsrc: gst_app::AppSrc,
    frame_bytes: usize,
    finished: bool,
}

impl GstVideoWriter {
    /// Build and start the encoding pipeline
    pub fn open(
        output_path: &Path,
        width: u32,
        height: u32,
        fps: u32,
        preset: BitratePreset,
    ) -> Result<Self, RecordingError> {
        info!(
            output = %output_path.display(),
            width,
            height,
            fps,
            "Creating video recorder pipeline"
        );

        gst::init().map_err(|e| {
            RecordingError::StartFailed(format!("Failed to initialize GStreamer: {}", e))
        })?;

        let encoder = select_h264_encoder(preset, width, height)
            .map_err(RecordingError::EncoderNotAvailable)?;

        let pipeline = gst::Pipeline::new();

        let appsrc = gst_app::AppSrc::builder()
            .name("recorder_src")
            .caps(
                &gst::Caps::builder("video/x-raw")
                    .field("format", "RGBA")
                    .field("width", width as i32)
                    .field("height", height as i32)
                    .field("framerate", gst::Fraction::new(fps.max(1) as i32, 1))
                    .build(),
            )
            .format(gst::Format::Time)
            .is_live(false)
            .build();

        let videoconvert = gst::ElementFactory::make("videoconvert")
            .build()
            .map_err(|e| {
                RecordingError::StartFailed(format!("Failed to create videoconvert: {}", e))
            })?;

        let muxer = gst::ElementFactory::make("mp4mux")
            .build()
            .map_err(|e| RecordingError::StartFailed(format!("Failed to create mp4mux: {}", e)))?;

        let filesink = gst::ElementFactory::make("filesink")
            .property("location", output_path.to_string_lossy().to_string())
            .build()
            .map_err(|e| RecordingError::StartFailed(format!("Failed to create filesink: {}", e)))?;

        let elements = [
            appsrc.upcast_ref::<gst::Element>(),
            &videoconvert,
            &encoder.encoder,
            &encoder.parser,
            &muxer,
            &filesink,
        ];
        pipeline.add_many(elements).map_err(|e| {
            RecordingError::StartFailed(format!("Failed to add elements to pipeline: {}", e))
        })?;
        gst::Element::link_many(elements)
            .map_err(|e| RecordingError::StartFailed(format!("Failed to link recorder: {}", e)))?;

        let writer = Self {
            pipeline,
            appsrc,
            frame_bytes: (width * height * 4) as usize,
            finished: false,
        };
        writer.start()?;
        Ok(writer)
    }

    fn start(&self) -> Result<(), RecordingError> {
        debug!("Starting recorder pipeline");
        self.pipeline
            .set_state(gst::State::Playing)
            .map_err(|e| RecordingError::StartFailed(format!("Failed to start recording: {}", e)))?;

        // Errors posted later while prerolling surface on the next write
        if let Some(reason) = self.take_bus_error() {
            let _ = self.pipeline.set_state(gst::State::Null);
            return Err(RecordingError::StartFailed(reason));
        }
        Ok(())
    }

    /// Pop pending bus messages without blocking, returning the first error
    fn take_bus_error(&self) -> Option<String> {
        let bus = self.pipeline.bus()?;
        while let Some(msg) =
            bus.pop_filtered(&[gst::MessageType::Error, gst::MessageType::Warning])
        {
            match msg.view() {
                gst::MessageView::Error(err) => {
                    error!(
                        error = %err.error(),
                        debug = ?err.debug(),
                        source = ?err.src().map(|s| s.name()),
                        "Recorder pipeline error"
                    );
                    return Some(err.error().to_string());
                }
                gst::MessageView::Warning(w) => {
                    warn!(
                        warning = %w.error(),
                        debug = ?w.debug(),
                        "Recorder pipeline warning"
                    );
                }
                _ => {}
            }
        }
        None
    }
}

impl VideoWriter for GstVideoWriter {
    fn write(&mut self, frame: &Frame, pts: Duration, duration: Duration) -> BackendResult<()> {
        if self.finished {
            return Err(BackendError::NotRunning);
        }
        if let Some(reason) = self.take_bus_error() {
            return Err(BackendError::Other(reason));
        }
        let data = frame.to_rgba_bytes();
        if data.len() != self.frame_bytes {
            return Err(BackendError::FormatNotSupported(format!(
                "Frame data size {} doesn't match expected {}",
                data.len(),
                self.frame_bytes
            )));
        }

        let mut buffer = gst::Buffer::from_mut_slice(data);
        {
            let buffer = buffer
                .get_mut()
                .ok_or_else(|| BackendError::Other("Buffer is not writable".to_string()))?;
            let clock_time = |d: Duration| {
                gst::ClockTime::try_from(d)
                    .map_err(|_| BackendError::Other(format!("Timestamp out of range: {:?}", d)))
            };
            buffer.set_pts(clock_time(pts)?);
            buffer.set_duration(clock_time(duration)?);
        }

        self.appsrc
            .push_buffer(buffer)
            .map(|_| ())
            .map_err(|e| BackendError::Other(format!("Failed to push frame: {:?}", e)))
    }

    fn finish(&mut self) -> Result<(), RecordingError> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        info!("Sending EOS to recorder pipeline");
        if let Err(e) = self.appsrc.end_of_stream() {
            warn!(?e, "Failed to send EOS to recorder");
        }

        let result = wait_for_eos(&self.pipeline, timing::EOS_TIMEOUT_SECS);

        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            warn!(error = %e, "Failed to stop recorder pipeline");
        }
        result.map_err(RecordingError::FinalizeFailed)
    }
}

impl Drop for GstVideoWriter {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gst::State::Null);
    }
}

/// Block until the pipeline posts EOS or an error
pub(crate) fn wait_for_eos(pipeline: &gst::Pipeline, timeout_secs: u64) -> Result<(), String> {
    let bus = pipeline.bus().ok_or("No bus available")?;
    match bus.timed_pop_filtered(
        gst::ClockTime::from_seconds(timeout_secs),
        &[gst::MessageType::Eos, gst::MessageType::Error],
    ) {
        Some(msg) => match msg.view() {
            gst::MessageView::Eos(..) => {
                debug!("Pipeline reached EOS");
                Ok(())
            }
            gst::MessageView::Error(err) => {
                error!(
                    error = %err.error(),
                    debug = ?err.debug(),
                    source = ?err.src().map(|s| s.name()),
                    "Pipeline error while finishing"
                );
                Err(err.error().to_string())
            }
            _ => Err("unexpected bus message".to_string()),
        },
        None => Err(format!("no EOS within {}s", timeout_secs)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::PixelFormat;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured {
        pts: Arc<Mutex<Vec<Duration>>>,
        finished: Arc<Mutex<u32>>,
    }

    impl VideoWriter for Captured {
        fn write(&mut self, _frame: &Frame, pts: Duration, _d: Duration) -> BackendResult<()> {
            self.pts.lock().unwrap().push(pts);
            Ok(())
        }

        fn finish(&mut self) -> Result<(), RecordingError> {
            *self.finished.lock().unwrap() += 1;
            Ok(())
        }
    }

    fn frame(width: u32, height: u32) -> Frame {
        Frame::new(width, height, PixelFormat::RGBA, vec![0u8; (width * height * 4) as usize])
    }

    fn frame_at(captured_at: Instant) -> Frame {
        Frame {
            captured_at,
            ..frame(4, 4)
        }
    }

    #[test]
    fn pts_follows_capture_time_not_frame_count() {
        let captured = Captured::default();
        let mut recorder =
            VideoRecorder::start(Box::new(captured.clone()), PathBuf::from("v.mp4"), 4, 4, 30);
        let origin = recorder.origin();

        // Frames arriving at 15 fps into a 30 fps file
        let step = Duration::from_secs_f64(1.0 / 15.0);
        for i in 0..15u32 {
            recorder.write_frame(&frame_at(origin + step * i)).unwrap();
        }

        let pts = captured.pts.lock().unwrap().clone();
        assert_eq!(pts.len(), 15);
        assert_eq!(pts[0], Duration::ZERO);
        assert_eq!(pts[1], step);
        assert_eq!(pts[14], step * 14);

        // One second of frames gives about one second of video
        let expected = step * 14 + Duration::from_secs_f64(1.0 / 30.0);
        assert_eq!(recorder.duration(), expected);
        assert_eq!(recorder.stop().unwrap().unwrap().duration, expected);
    }

    #[test]
    fn first_frame_starts_the_timeline() {
        let captured = Captured::default();
        let mut recorder =
            VideoRecorder::start(Box::new(captured.clone()), PathBuf::from("v.mp4"), 4, 4, 30);
        let origin = recorder.origin();

        recorder
            .write_frame(&frame_at(origin + Duration::from_millis(40)))
            .unwrap();
        recorder
            .write_frame(&frame_at(origin + Duration::from_millis(80)))
            .unwrap();

        let pts = captured.pts.lock().unwrap().clone();
        assert_eq!(pts, vec![Duration::ZERO, Duration::from_millis(80)]);
    }

    #[test]
    fn simultaneous_frames_get_increasing_pts() {
        let captured = Captured::default();
        let mut recorder =
            VideoRecorder::start(Box::new(captured.clone()), PathBuf::from("v.mp4"), 4, 4, 30);
        let at = recorder.origin() + Duration::from_millis(10);
        for _ in 0..3 {
            recorder.write_frame(&frame_at(at)).unwrap();
        }

        let pts = captured.pts.lock().unwrap().clone();
        assert_eq!(
            pts,
            vec![
                Duration::ZERO,
                Duration::from_millis(10),
                Duration::from_millis(11)
            ]
        );
    }

    #[test]
    fn gst_writer_opens_without_waiting_on_the_bus() {
        if gst::init().is_err() || crate::media::encoders::enumerate_h264_encoders().is_empty() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let started = Instant::now();
        let Ok(writer) =
            GstVideoWriter::open(&dir.path().join("v.mp4"), 64, 48, 30, BitratePreset::Low)
        else {
            return;
        };
        let elapsed = started.elapsed();
        drop(writer);

        assert!(elapsed < Duration::from_millis(400), "open took {:?}", elapsed);
    }

    #[test]
    fn mismatched_frames_are_rejected_not_resized() {
        let captured = Captured::default();
        let mut recorder =
            VideoRecorder::start(Box::new(captured.clone()), PathBuf::from("v.mp4"), 4, 4, 30);
        recorder.write_frame(&frame(8, 8)).unwrap();
        recorder.write_frame(&frame(4, 4)).unwrap();

        assert_eq!(recorder.frames_written(), 1);
        assert_eq!(recorder.frames_rejected(), 1);
        assert_eq!(captured.pts.lock().unwrap().len(), 1);
    }

    #[test]
    fn stop_is_idempotent() {
        let captured = Captured::default();
        let mut recorder =
            VideoRecorder::start(Box::new(captured.clone()), PathBuf::from("v.mp4"), 4, 4, 30);
        recorder.write_frame(&frame(4, 4)).unwrap();

        let recorded = recorder.stop().unwrap().unwrap();
        assert_eq!(recorded.frames, 1);
        assert!(recorder.stop().unwrap().is_none());
        drop(recorder);
        assert_eq!(*captured.finished.lock().unwrap(), 1);
    }
}
