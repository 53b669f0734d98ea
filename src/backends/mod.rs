// SPDX-License-Identifier: MPL-2.0

//! Backend abstraction layer for every OS resource the session touches
//!
//! The session never creates GStreamer pipelines itself. It asks a
//! [`MediaBackend`] for each resource and talks to it through a small trait:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              SessionController              │
//! └────────────────────┬────────────────────────┘
//!                      │ MediaBackend
//! ┌────────────────────┴────────────────────────┐
//! │  FrameSource    VirtualOutput   AudioInput  │
//! │  VideoWriter    MuxEngine                   │
//! └────────────────────┬────────────────────────┘
//!                      │
//!               GstBackend (GStreamer)
//! ```
//!
//! # Modules
//!
//! - [`audio`]: Audio input devices
//! - [`camera`]: Frame sources (cameras and stream URLs)
//! - [`virtual_camera`]: Virtual camera output

pub mod audio;
pub mod camera;
pub mod virtual_camera;

use crate::config::Config;
use crate::constants::BitratePreset;
use crate::errors::{AudioError, BackendResult, RecordingError};
use crate::media::encoders::AudioQuality;
use crate::pipelines::video::{GstMuxEngine, GstVideoWriter, MuxEngine, VideoWriter};
use audio::{AudioFormat, AudioInput, GstAudioInput};
use camera::{FrameSource, GstFrameSource, SourceDescriptor};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use virtual_camera::{GstVirtualOutput, VirtualOutput};

/// Factory for the resources a session opens
pub trait MediaBackend: Send {
    /// Open a camera or stream and wait for its first frame
    fn open_source(
        &self,
        source: &SourceDescriptor,
        fps: u32,
    ) -> BackendResult<Box<dyn FrameSource>>;

    /// Create the virtual camera device
    fn open_virtual_output(
        &self,
        width: u32,
        height: u32,
        fps: u32,
    ) -> BackendResult<Box<dyn VirtualOutput>>;

    /// Create an H.264/MP4 writer at `path`
    fn open_video_writer(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Result<Box<dyn VideoWriter>, RecordingError>;

    /// Open the default audio input
    fn open_audio_input(&self, format: AudioFormat) -> Result<Box<dyn AudioInput>, AudioError>;

    /// Engine used by mux jobs
    fn mux_engine(&self) -> Arc<dyn MuxEngine>;
}

/// Production backend built on GStreamer
#[derive(Debug, Clone)]
pub struct GstBackend {
    virtual_device: Option<PathBuf>,
    bitrate_preset: BitratePreset,
}

impl GstBackend {
    pub fn new(config: &Config) -> Self {
        Self {
            virtual_device: config.virtual_device.clone(),
            bitrate_preset: config.bitrate_preset,
        }
    }
}

impl MediaBackend for GstBackend {
    fn open_source(
        &self,
        source: &SourceDescriptor,
        fps: u32,
    ) -> BackendResult<Box<dyn FrameSource>> {
        Ok(Box::new(GstFrameSource::open(source, fps)?))
    }

    fn open_virtual_output(
        &self,
        width: u32,
        height: u32,
        fps: u32,
    ) -> BackendResult<Box<dyn VirtualOutput>> {
        Ok(Box::new(GstVirtualOutput::open(
            width,
            height,
            fps,
            self.virtual_device.as_deref(),
        )?))
    }

    fn open_video_writer(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Result<Box<dyn VideoWriter>, RecordingError> {
        Ok(Box::new(GstVideoWriter::open(
            path,
            width,
            height,
            fps,
            self.bitrate_preset,
        )?))
    }

    fn open_audio_input(&self, format: AudioFormat) -> Result<Box<dyn AudioInput>, AudioError> {
        Ok(Box::new(GstAudioInput::open(format)?))
    }

    fn mux_engine(&self) -> Arc<dyn MuxEngine> {
        Arc::new(GstMuxEngine::new(AudioQuality::from(self.bitrate_preset)))
    }
}
