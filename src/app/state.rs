// SPDX-License-Identifier: GPL-3.0-only

//! Session state and events

use std::path::PathBuf;

/// Lifecycle state of the session
///
/// `Recording` is only reachable from `Streaming`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    /// No source open
    #[default]
    Idle,
    /// Source open, ticks running
    Streaming,
    /// Streaming and writing audio/video to disk
    Recording,
}

impl SessionState {
    /// Whether a source is open
    pub fn is_streaming(&self) -> bool {
        !matches!(self, SessionState::Idle)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, SessionState::Recording)
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Streaming => "Streaming",
            SessionState::Recording => "Recording",
        }
    }
}

/// The one session of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub state: SessionState,
    pub target_fps: u32,
    /// Native size of the open source, `None` while idle
    pub frame_size: Option<(u32, u32)>,
}

impl Session {
    pub fn new(target_fps: u32) -> Self {
        Self {
            state: SessionState::Idle,
            target_fps,
            frame_size: None,
        }
    }
}

/// Notifications for observers of the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Source opened
    StreamStarted {
        source: String,
        width: u32,
        height: u32,
    },
    /// Source released, session idle
    StreamStopped,
    /// Streaming continues without the virtual camera
    VirtualCameraUnavailable(String),
    /// Recording began; `output` is where the final file will be written
    RecordingStarted { output: PathBuf },
    /// Recording finalized and handed to a mux job
    RecordingStopped { job_id: u64 },
    /// The set of QR payloads visible in the frame changed
    QrDetected(Vec<String>),
    /// Mux finished and temporary files were removed
    MuxFinished { job_id: u64, output: PathBuf },
    /// Mux failed; temporary files were kept
    MuxFailed { job_id: u64, error: String },
    /// Photo written
    PhotoSaved(PathBuf),
}
