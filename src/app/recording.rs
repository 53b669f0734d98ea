// SPDX-License-Identifier: GPL-3.0-only

//! One in-progress recording: video writer, audio thread and temp files

use crate::backends::MediaBackend;
use crate::backends::camera::Frame;
use crate::config::Config;
use crate::errors::{RecordingError, SessionError, SessionResult};
use crate::pipelines::audio::{AudioCapture, AudioSummary};
use crate::pipelines::video::{RecordedVideo, VideoRecorder};
use crate::storage::RecordingArtifact;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Files of a recording that finished cleanly and can be muxed
#[derive(Debug)]
pub struct FinishedRecording {
    pub artifact: RecordingArtifact,
    pub video: RecordedVideo,
    pub audio: AudioSummary,
}

pub(crate) struct ActiveRecording {
    artifact: RecordingArtifact,
    video: VideoRecorder,
    audio: AudioCapture,
    started_at: Instant,
}

impl ActiveRecording {
    /// Create the temp directory, open the writer, then start the audio thread
    ///
    /// Anything opened before a failure is closed again and the temp
    /// directory is removed.
    pub fn start<B: MediaBackend + ?Sized>(
        backend: &B,
        config: &Config,
        temp_root: &Path,
        output_path: PathBuf,
        (width, height): (u32, u32),
    ) -> SessionResult<Self> {
        let artifact = RecordingArtifact::create(temp_root, output_path)
            .map_err(RecordingError::Io)?;

        let writer = match backend.open_video_writer(
            &artifact.video_path,
            width,
            height,
            config.recording_fps,
        ) {
            Ok(writer) => writer,
            Err(e) => {
                artifact.remove_temp_files();
                return Err(e.into());
            }
        };
        let mut video = VideoRecorder::start(
            writer,
            artifact.video_path.clone(),
            width,
            height,
            config.recording_fps,
        );

        let mut audio = AudioCapture::new();
        let started = backend
            .open_audio_input(config.audio)
            .and_then(|input| audio.start(input, artifact.audio_path.clone()));
        if let Err(e) = started {
            warn!(error = %e, "Audio input unavailable, abandoning recording");
            if let Err(stop_err) = video.stop() {
                warn!(error = %stop_err, "Failed to close video writer");
            }
            artifact.remove_temp_files();
            return Err(SessionError::AudioDevice(e));
        }

        info!(
            output = %artifact.output_path.display(),
            temp_dir = %artifact.temp_dir.display(),
            width,
            height,
            "Recording started"
        );
        Ok(Self {
            artifact,
            video,
            audio,
            started_at: Instant::now(),
        })
    }

    pub fn write_frame(&mut self, frame: &Frame) -> Result<(), RecordingError> {
        self.video.write_frame(frame)
    }

    pub fn output_path(&self) -> &Path {
        &self.artifact.output_path
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn frames_written(&self) -> u64 {
        self.video.frames_written()
    }

    /// Finalize the video file and join the audio thread
    ///
    /// Both are stopped even if one fails. On error the temp files stay on
    /// disk, except when no frame was ever written.
    pub fn finish(mut self) -> SessionResult<FinishedRecording> {
        let video = self.video.stop();
        let audio = self.audio.stop();

        let video = video?.ok_or_else(|| {
            RecordingError::FinalizeFailed("video writer was already closed".to_string())
        })?;
        let audio = audio?;

        if video.frames == 0 {
            self.artifact.remove_temp_files();
            return Err(
                RecordingError::FinalizeFailed("no frames were recorded".to_string()).into(),
            );
        }

        info!(
            frames = video.frames,
            video = ?video.duration,
            audio = ?audio.duration(),
            audio_read_errors = audio.read_errors,
            "Recording finalized"
        );
        Ok(FinishedRecording {
            artifact: self.artifact,
            video,
            audio,
        })
    }
}
