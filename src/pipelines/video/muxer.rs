// SPDX-License-Identifier: MPL-2.0

//! Audio/video muxing
//!
//! After a recording stops, the temporary H.264 video and the WAV audio are
//! combined into one MP4 in the user's Videos folder. The video stream is
//! copied; the audio is encoded to AAC:
//!
//! ```text
//! filesrc ! qtdemux ! h264parse ──────────────────────────────┐
//!                                                             ├─▶ mp4mux ! filesink
//! filesrc ! wavparse ! audioconvert ! <aac> ! aacparse ───────┘
//! ```
//!
//! A [`MuxJob`] runs this on its own thread. Temporary inputs are deleted only
//! after the engine reports success.

use super::recorder::wait_for_eos;
use crate::constants::timing;
use crate::errors::MuxError;
use crate::media::encoders::AudioQuality;
use crate::media::encoders::audio::{available_aac_encoder, configure_aac_encoder};
use crate::storage::RecordingArtifact;
use gstreamer as gst;
use gstreamer::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};

/// Something that can combine a video file and a WAV file into one container
pub trait MuxEngine: Send + Sync {
    fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), MuxError>;
}

/// Validates inputs, runs the engine and cleans up after success
#[derive(Clone)]
pub struct Muxer {
    engine: Arc<dyn MuxEngine>,
}

impl Muxer {
    pub fn new(engine: Arc<dyn MuxEngine>) -> Self {
        Self { engine }
    }

    /// Combine `video` and `audio` into `output`
    ///
    /// Both inputs must exist and be non-empty. Inputs are never modified.
    pub fn combine(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), MuxError> {
        validate_input(video)?;
        validate_input(audio)?;

        if let Some(parent) = output.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        info!(
            video = %video.display(),
            audio = %audio.display(),
            output = %output.display(),
            "Muxing recording"
        );
        self.engine.mux(video, audio, output)
    }

    /// Combine a finished recording, then delete its temporary files
    ///
    /// On failure the temporary files are left in place.
    pub fn finish_recording(&self, artifact: &RecordingArtifact) -> Result<PathBuf, MuxError> {
        self.combine(&artifact.video_path, &artifact.audio_path, &artifact.output_path)?;
        artifact.remove_temp_files();
        info!(output = %artifact.output_path.display(), "Recording saved");
        Ok(artifact.output_path.clone())
    }
}

fn validate_input(path: &Path) -> Result<(), MuxError> {
    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(MuxError::MissingInput(path.to_path_buf()));
        }
        Err(e) => return Err(MuxError::Io(e)),
    };
    if metadata.len() == 0 {
        return Err(MuxError::EmptyInput(path.to_path_buf()));
    }
    Ok(())
}

/// A mux running in the background
pub struct MuxJob {
    id: u64,
    output_path: PathBuf,
    handle: Option<JoinHandle<Result<PathBuf, MuxError>>>,
}

impl MuxJob {
    /// Start muxing `artifact` on a dedicated thread
    pub fn spawn(id: u64, muxer: Muxer, artifact: RecordingArtifact) -> Result<Self, MuxError> {
        let output_path = artifact.output_path.clone();
        debug!(job = id, output = %output_path.display(), "Spawning mux job");

        let handle = std::thread::Builder::new()
            .name(format!("mux-{}", id))
            .spawn(move || {
                let result = muxer.finish_recording(&artifact);
                if let Err(e) = &result {
                    error!(
                        job = id,
                        error = %e,
                        temp_dir = %artifact.temp_dir.display(),
                        "Mux failed, keeping temporary files"
                    );
                }
                result
            })?;

        Ok(Self {
            id,
            output_path,
            handle: Some(handle),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Destination of the finished file
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Whether the thread has finished (successfully or not)
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// Wait for the job and return its result
    pub fn join(mut self) -> Result<PathBuf, MuxError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| MuxError::JobPanicked)?,
            None => Err(MuxError::JobPanicked),
        }
    }
}

/// GStreamer mux engine: video copied, audio encoded to AAC
pub struct GstMuxEngine {
    audio_quality: AudioQuality,
}

impl GstMuxEngine {
    pub fn new(audio_quality: AudioQuality) -> Self {
        Self { audio_quality }
    }
}

impl MuxEngine for GstMuxEngine {
    fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), MuxError> {
        gst::init()
            .map_err(|e| MuxError::Engine(format!("Failed to initialize GStreamer: {}", e)))?;

        let encoder_name = available_aac_encoder()
            .ok_or_else(|| MuxError::Engine("No AAC encoder available".to_string()))?;

        let description = format!(
            "filesrc name=vsrc ! qtdemux name=demux \
             demux.video_0 ! queue ! h264parse ! mux. \
             filesrc name=asrc ! wavparse ! audioconvert ! audioresample ! \
             {} name=aenc ! aacparse ! queue ! mux. \
             mp4mux name=mux ! filesink name=sink",
            encoder_name
        );
        debug!(%description, "Mux pipeline");

        let pipeline = gst::parse::launch(&description)
            .map_err(|e| MuxError::Engine(format!("Failed to create mux pipeline: {}", e)))?
            .dynamic_cast::<gst::Pipeline>()
            .map_err(|_| MuxError::Engine("Failed to cast mux pipeline".to_string()))?;

        let element = |name: &str| {
            pipeline
                .by_name(name)
                .ok_or_else(|| MuxError::Engine(format!("Mux pipeline has no '{}'", name)))
        };
        element("vsrc")?.set_property("location", video.to_string_lossy().to_string());
        element("asrc")?.set_property("location", audio.to_string_lossy().to_string());
        element("sink")?.set_property("location", output.to_string_lossy().to_string());
        configure_aac_encoder(&element("aenc")?, encoder_name, self.audio_quality);

        pipeline
            .set_state(gst::State::Playing)
            .map_err(|e| MuxError::Engine(format!("Failed to start mux: {}", e)))?;

        let result = wait_for_eos(&pipeline, timing::MUX_TIMEOUT_SECS);
        if let Err(e) = pipeline.set_state(gst::State::Null) {
            warn!(error = %e, "Failed to stop mux pipeline");
        }
        result.map_err(MuxError::Engine)?;

        match std::fs::metadata(output) {
            Ok(m) if m.len() > 0 => Ok(()),
            _ => Err(MuxError::Engine("mux produced no output".to_string())),
        }
    }
}
