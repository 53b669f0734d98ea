// SPDX-License-Identifier: MPL-2.0

//! Audio input devices
//!
//! The capture thread reads fixed-size chunks through the [`AudioInput`]
//! trait. [`GstAudioInput`] pulls S16LE samples from the default input via
//! `autoaudiosrc` and re-slices GStreamer buffers into exact chunks.

use super::camera::enumeration::{AUDIO_SOURCE_CLASS, monitor_devices, to_source_device};
use super::camera::types::SourceDevice;
use crate::constants::{audio, timing};
use crate::errors::AudioError;
use gstreamer::prelude::*;
use gstreamer_app::AppSink;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Capture format of the audio input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Samples per second
    pub sample_rate: u32,
    /// Interleaved channel count
    pub channels: u16,
    /// Samples per chunk (per channel)
    pub chunk_samples: usize,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: audio::SAMPLE_RATE,
            channels: audio::CHANNELS,
            chunk_samples: audio::CHUNK_SAMPLES,
        }
    }
}

impl AudioFormat {
    /// Wall-clock duration covered by one chunk
    pub fn chunk_duration(&self) -> Duration {
        Duration::from_secs_f64(self.chunk_samples as f64 / self.sample_rate.max(1) as f64)
    }

    /// Interleaved samples in one chunk
    pub fn samples_per_chunk(&self) -> usize {
        self.chunk_samples * self.channels as usize
    }
}

/// One chunk of interleaved signed 16-bit samples
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    pub samples: Vec<i16>,
}

impl AudioChunk {
    pub fn new(samples: Vec<i16>) -> Self {
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// An open audio input device
pub trait AudioInput: Send {
    /// Format the device was opened with
    fn format(&self) -> AudioFormat;

    /// Read the next full chunk
    ///
    /// Blocks at most `timeout`; `Ok(None)` means no complete chunk arrived
    /// in time and the caller should re-check its stop condition.
    fn read_chunk(&mut self, timeout: Duration) -> Result<Option<AudioChunk>, AudioError>;

    /// Release the device. Safe to call more than once.
    fn close(&mut self);
}

/// List audio capture devices
pub fn enumerate_audio_inputs() -> Vec<SourceDevice> {
    monitor_devices(AUDIO_SOURCE_CLASS)
        .iter()
        .map(to_source_device)
        .collect()
}

/// Default audio input backed by `autoaudiosrc ! appsink`
pub struct GstAudioInput {
    pipeline: gstreamer::Pipeline,
    appsink: AppSink,
    format: AudioFormat,
    /// Samples received but not yet handed out as a full chunk
    pending: Vec<i16>,
    closed: bool,
}

impl GstAudioInput {
    /// Open the default input device
    ///
    /// Fails with [`AudioError::DeviceUnavailable`] when no input exists or
    /// the device refuses the format.
    pub fn open(format: AudioFormat) -> Result<Self, AudioError> {
        info!(
            sample_rate = format.sample_rate,
            channels = format.channels,
            chunk = format.chunk_samples,
            "Opening audio input"
        );

        gstreamer::init().map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?;

        let description = format!(
            "autoaudiosrc name=src ! audioconvert ! audioresample ! \
             audio/x-raw,format=S16LE,layout=interleaved,channels={},rate={} ! \
             appsink name=sink sync=false",
            format.channels, format.sample_rate
        );
        debug!(%description, "Audio pipeline");

        let pipeline = gstreamer::parse::launch(&description)
            .map_err(|e| {
                AudioError::DeviceUnavailable(format!("Failed to create pipeline: {}", e))
            })?
            .dynamic_cast::<gstreamer::Pipeline>()
            .map_err(|_| AudioError::DeviceUnavailable("Failed to cast pipeline".to_string()))?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| AudioError::DeviceUnavailable("Failed to get appsink".to_string()))?
            .dynamic_cast::<AppSink>()
            .map_err(|_| AudioError::DeviceUnavailable("Failed to cast appsink".to_string()))?;

        // Every sample must reach the recording; never drop
        appsink.set_property("drop", false);
        appsink.set_property("max-buffers", 0u32);

        let started = pipeline.set_state(gstreamer::State::Playing).is_ok()
            && pipeline
                .state(gstreamer::ClockTime::from_seconds(timing::START_TIMEOUT_SECS))
                .0
                .is_ok();

        if !started {
            let reason = pipeline_error(&pipeline)
                .unwrap_or_else(|| "input device did not start".to_string());
            let _ = pipeline.set_state(gstreamer::State::Null);
            error!(%reason, "Audio input unavailable");
            return Err(AudioError::DeviceUnavailable(reason));
        }

        info!("Audio input opened");
        Ok(Self {
            pipeline,
            appsink,
            format,
            pending: Vec::with_capacity(format.samples_per_chunk() * 2),
            closed: false,
        })
    }
}

impl AudioInput for GstAudioInput {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn read_chunk(&mut self, timeout: Duration) -> Result<Option<AudioChunk>, AudioError> {
        if self.closed {
            return Err(AudioError::Read("input closed".to_string()));
        }
        let chunk_len = self.format.samples_per_chunk();
        let deadline = Instant::now() + timeout;

        while self.pending.len() < chunk_len {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            let wait =
                gstreamer::ClockTime::try_from(remaining).unwrap_or(gstreamer::ClockTime::ZERO);
            let Some(sample) = self.appsink.try_pull_sample(wait) else {
                if let Some(reason) = pipeline_error(&self.pipeline) {
                    return Err(AudioError::Read(reason));
                }
                if self.appsink.is_eos() {
                    return Err(AudioError::Read("audio input ended".to_string()));
                }
                return Ok(None);
            };

            let buffer = sample
                .buffer()
                .ok_or_else(|| AudioError::Read("No buffer in sample".to_string()))?;
            let map = buffer
                .map_readable()
                .map_err(|e| AudioError::Read(format!("Failed to map buffer: {}", e)))?;
            self.pending.extend(
                map.as_slice()
                    .chunks_exact(2)
                    .map(|b| i16::from_le_bytes([b[0], b[1]])),
            );
        }

        let rest = self.pending.split_off(chunk_len);
        let samples = std::mem::replace(&mut self.pending, rest);
        Ok(Some(AudioChunk::new(samples)))
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if !self.pending.is_empty() {
            debug!(samples = self.pending.len(), "Discarding partial audio chunk");
            self.pending.clear();
        }
        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            warn!(error = %e, "Failed to stop audio pipeline");
        }
        info!("Audio input closed");
    }
}

impl Drop for GstAudioInput {
    fn drop(&mut self) {
        self.close();
    }
}

fn pipeline_error(pipeline: &gstreamer::Pipeline) -> Option<String> {
    let bus = pipeline.bus()?;
    let msg = bus.pop_filtered(&[gstreamer::MessageType::Error])?;
    match msg.view() {
        gstreamer::MessageView::Error(err) => Some(err.error().to_string()),
        _ => None,
    }
}
