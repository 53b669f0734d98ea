// SPDX-License-Identifier: MPL-2.0

//! Audio capture thread
//!
//! The capture thread owns the input device and the chunk buffer. The only
//! state shared with the caller is the `recording` flag; [`AudioCapture::stop`]
//! clears it and joins the thread, so once `stop` returns no chunk is read.

use super::wav::write_wav;
use crate::backends::audio::{AudioChunk, AudioInput};
use crate::constants::timing;
use crate::errors::AudioError;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Consecutive read failures after which the device is considered gone
const MAX_CONSECUTIVE_READ_ERRORS: usize = 10;

/// Result of a finished capture
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioSummary {
    /// WAV file written, `None` when nothing was captured
    pub path: Option<PathBuf>,
    /// Chunks captured, in arrival order
    pub chunks: usize,
    /// Size of the WAV data section in bytes
    pub data_bytes: u64,
    /// Reads that failed and were skipped
    pub read_errors: usize,
    /// Sample rate of the written file
    pub sample_rate: u32,
}

impl AudioSummary {
    /// Captured duration
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64((self.data_bytes / 2) as f64 / self.sample_rate as f64)
    }
}

/// Microphone capture running on a dedicated thread
pub struct AudioCapture {
    recording: Arc<AtomicBool>,
    handle: Option<JoinHandle<Result<AudioSummary, AudioError>>>,
}

impl AudioCapture {
    pub fn new() -> Self {
        Self {
            recording: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Whether the capture thread is running
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Start capturing from an already opened `input` into `output_path`
    ///
    /// The device is opened by the caller so open failures surface
    /// synchronously; this only spawns the thread.
    pub fn start(
        &mut self,
        mut input: Box<dyn AudioInput>,
        output_path: PathBuf,
    ) -> Result<(), AudioError> {
        if self.handle.is_some() {
            input.close();
            return Err(AudioError::DeviceUnavailable(
                "audio capture already running".to_string(),
            ));
        }

        let recording = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&recording);
        let format = input.format();
        info!(path = %output_path.display(), "Starting audio capture");

        let handle = std::thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || {
                let mut chunks: Vec<AudioChunk> = Vec::new();
                let mut read_errors = 0usize;
                let mut consecutive_errors = 0usize;

                while flag.load(Ordering::Acquire) {
                    match input.read_chunk(timing::AUDIO_READ_TIMEOUT) {
                        Ok(Some(chunk)) => {
                            consecutive_errors = 0;
                            chunks.push(chunk);
                        }
                        Ok(None) => {}
                        Err(e) => {
                            read_errors += 1;
                            consecutive_errors += 1;
                            warn!(error = %e, "Audio read failed, skipping chunk");
                            if consecutive_errors >= MAX_CONSECUTIVE_READ_ERRORS {
                                error!("Audio input keeps failing, ending capture early");
                                break;
                            }
                        }
                    }
                }
                input.close();

                debug!(chunks = chunks.len(), "Audio capture loop finished");
                let data_bytes = write_wav(&output_path, &format, &chunks)?;
                info!(
                    path = %output_path.display(),
                    chunks = chunks.len(),
                    data_bytes,
                    "Audio written"
                );

                Ok(AudioSummary {
                    path: Some(output_path),
                    chunks: chunks.len(),
                    data_bytes,
                    read_errors,
                    sample_rate: format.sample_rate,
                })
            })?;

        self.recording = recording;
        self.handle = Some(handle);
        Ok(())
    }

    /// Signal the thread to stop and wait for the WAV to be written
    ///
    /// Calling this without a running capture returns an empty summary.
    pub fn stop(&mut self) -> Result<AudioSummary, AudioError> {
        self.recording.store(false, Ordering::Release);
        let Some(handle) = self.handle.take() else {
            return Ok(AudioSummary::default());
        };
        debug!("Joining audio capture thread");
        handle.join().map_err(|_| AudioError::ThreadPanicked)?
    }
}

impl Default for AudioCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        if self.handle.is_some()
            && let Err(e) = self.stop()
        {
            warn!(error = %e, "Audio capture failed while dropping");
        }
    }
}
