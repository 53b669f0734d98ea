// SPDX-License-Identifier: MPL-2.0

//! Error types for the relay pipeline
//!
//! Errors are grouped by the component that raises them. Acquisition errors
//! ([`SessionError`], [`AudioError`]) surface to the caller that initiated the
//! action; per-frame errors ([`FrameReadError`]) are logged and recovered on
//! the next tick; finalization errors ([`MuxError`]) are reported as session
//! events.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for session-level operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors from session lifecycle transitions
#[derive(Debug, Error)]
pub enum SessionError {
    /// The camera or stream URL could not be opened
    #[error("source unavailable ({source_name}): {reason}")]
    SourceUnavailable { source_name: String, reason: String },
    /// `start` was called while a stream is already running
    #[error("a stream is already running")]
    AlreadyStreaming,
    /// Recording requested without an active stream
    #[error("no stream is running")]
    NotStreaming,
    /// Recording already in progress
    #[error("recording already in progress")]
    AlreadyRecording,
    /// The audio input device could not be opened
    #[error("audio device error: {0}")]
    AudioDevice(#[from] AudioError),
    /// The video recorder failed to start or finalize
    #[error("recording error: {0}")]
    Recording(#[from] RecordingError),
}

/// A single frame could not be read; the tick is skipped
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FrameReadError {
    /// No frame arrived within the read timeout
    #[error("timed out waiting for a frame")]
    Timeout,
    /// The source reached end of stream
    #[error("source reached end of stream")]
    EndOfStream,
    /// The source pipeline reported an error
    #[error("source pipeline error: {0}")]
    Pipeline(String),
}

/// Audio capture errors
#[derive(Debug, Error)]
pub enum AudioError {
    /// No usable input device, or it could not be opened
    #[error("audio input unavailable: {0}")]
    DeviceUnavailable(String),
    /// Reading a chunk from the device failed
    #[error("failed to read audio: {0}")]
    Read(String),
    /// Writing the audio file failed
    #[error("audio file I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Encoding the WAV file failed
    #[error("failed to write WAV file: {0}")]
    Wav(#[from] hound::Error),
    /// The capture thread panicked before finishing
    #[error("audio capture thread panicked")]
    ThreadPanicked,
}

/// Video recording errors
#[derive(Debug, Error)]
pub enum RecordingError {
    /// Failed to start recording
    #[error("failed to start recording: {0}")]
    StartFailed(String),
    /// Encoder not available
    #[error("encoder not available: {0}")]
    EncoderNotAvailable(String),
    /// Failed to append a frame
    #[error("failed to write frame: {0}")]
    Write(String),
    /// Failed to flush or close the container
    #[error("failed to finalize recording: {0}")]
    FinalizeFailed(String),
    /// Temporary file handling failed
    #[error("recording I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Audio/video muxing errors
#[derive(Debug, Error)]
pub enum MuxError {
    /// An input file does not exist
    #[error("mux input missing: {}", .0.display())]
    MissingInput(PathBuf),
    /// An input file exists but holds no data
    #[error("mux input is empty: {}", .0.display())]
    EmptyInput(PathBuf),
    /// The encode job reported an error
    #[error("mux pipeline error: {0}")]
    Engine(String),
    /// Filesystem error around the mux
    #[error("mux I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The mux thread panicked
    #[error("mux job panicked")]
    JobPanicked,
}

/// Photo capture errors
#[derive(Debug, Error)]
pub enum PhotoError {
    /// No frame available for capture
    #[error("no frame available for capture")]
    NoFrameAvailable,
    /// Encoding failed
    #[error("encoding failed: {0}")]
    Encoding(#[from] image::ImageError),
    /// Save failed
    #[error("save failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised inside GStreamer-backed components
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// Failed to initialize a pipeline or element
    #[error("initialization failed: {0}")]
    InitializationFailed(String),
    /// Frame or buffer format does not match the pipeline
    #[error("format not supported: {0}")]
    FormatNotSupported(String),
    /// Component used before it was started, or after it was closed
    #[error("not running")]
    NotRunning,
    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl From<BackendError> for RecordingError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::InitializationFailed(msg) => RecordingError::StartFailed(msg),
            other => RecordingError::Write(other.to_string()),
        }
    }
}
