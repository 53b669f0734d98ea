// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default capture and virtual camera framerate
pub const DEFAULT_FPS: u32 = 30;

/// Fixed framerate of recorded video files
pub const RECORDING_FPS: u32 = 30;

/// Folder created under Pictures/ and Videos/ for saved media
pub const DEFAULT_SAVE_FOLDER: &str = "relaycam";

/// Video encoder bitrate presets
///
/// These presets define the target bitrate for video encoding based on resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BitratePreset {
    /// Low bitrate - smaller files, reduced quality
    Low,
    /// Medium bitrate - balanced quality and file size (default)
    #[default]
    Medium,
    /// High bitrate - larger files, better quality
    High,
}

impl BitratePreset {
    /// All preset variants, lowest first
    pub const ALL: [BitratePreset; 3] = [
        BitratePreset::Low,
        BitratePreset::Medium,
        BitratePreset::High,
    ];

    /// Get display name for the preset
    pub fn display_name(&self) -> &'static str {
        match self {
            BitratePreset::Low => "Low",
            BitratePreset::Medium => "Medium",
            BitratePreset::High => "High",
        }
    }

    /// Get bitrate in kbps for a given frame width
    ///
    /// - SD (640x480): Low=1, Medium=2, High=4 Mbps
    /// - HD (1280x720): Low=2.5, Medium=5, High=10 Mbps
    /// - Full HD (1920x1080): Low=4, Medium=8, High=16 Mbps
    /// - 2K (2560x1440): Low=8, Medium=16, High=32 Mbps
    /// - 4K (3840x2160): Low=15, Medium=30, High=50 Mbps
    pub fn bitrate_kbps(&self, width: u32) -> u32 {
        match (get_resolution_tier(width), self) {
            (ResolutionTier::SD, BitratePreset::Low) => 1_000,
            (ResolutionTier::SD, BitratePreset::Medium) => 2_000,
            (ResolutionTier::SD, BitratePreset::High) => 4_000,
            (ResolutionTier::HD, BitratePreset::Low) => 2_500,
            (ResolutionTier::HD, BitratePreset::Medium) => 5_000,
            (ResolutionTier::HD, BitratePreset::High) => 10_000,
            (ResolutionTier::FullHD, BitratePreset::Low) => 4_000,
            (ResolutionTier::FullHD, BitratePreset::Medium) => 8_000,
            (ResolutionTier::FullHD, BitratePreset::High) => 16_000,
            (ResolutionTier::TwoK, BitratePreset::Low) => 8_000,
            (ResolutionTier::TwoK, BitratePreset::Medium) => 16_000,
            (ResolutionTier::TwoK, BitratePreset::High) => 32_000,
            (ResolutionTier::FourK, BitratePreset::Low) => 15_000,
            (ResolutionTier::FourK, BitratePreset::Medium) => 30_000,
            (ResolutionTier::FourK, BitratePreset::High) => 50_000,
        }
    }

    /// Name plus effective bitrate at `width`, e.g. "Medium (5 Mbps)"
    pub fn describe(&self, width: u32) -> String {
        format!(
            "{} ({})",
            self.display_name(),
            format_bitrate(self.bitrate_kbps(width))
        )
    }
}

impl std::str::FromStr for BitratePreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(BitratePreset::Low),
            "medium" => Ok(BitratePreset::Medium),
            "high" => Ok(BitratePreset::High),
            other => Err(format!("unknown bitrate preset '{}'", other)),
        }
    }
}

/// Resolution tiers for bitrate calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionTier {
    /// SD: 640x480 and below
    SD,
    /// HD: 1280x720
    HD,
    /// Full HD: 1920x1080
    FullHD,
    /// 2K: 2560x1440
    TwoK,
    /// 4K: 3840x2160 and above
    FourK,
}

/// Get the resolution tier for a given width
pub fn get_resolution_tier(width: u32) -> ResolutionTier {
    match width {
        w if w >= 3840 => ResolutionTier::FourK,
        w if w >= 2560 => ResolutionTier::TwoK,
        w if w >= 1920 => ResolutionTier::FullHD,
        w if w >= 1280 => ResolutionTier::HD,
        _ => ResolutionTier::SD,
    }
}

/// Format bitrate for display (e.g., "8 Mbps" or "2.5 Mbps")
pub fn format_bitrate(kbps: u32) -> String {
    let mbps = kbps as f64 / 1000.0;
    if mbps == mbps.floor() {
        format!("{} Mbps", mbps as u32)
    } else {
        format!("{:.1} Mbps", mbps)
    }
}

/// Virtual camera output constants
pub mod virtual_camera {
    /// Output width of the virtual camera device
    pub const WIDTH: u32 = 640;

    /// Output height of the virtual camera device
    pub const HEIGHT: u32 = 480;

    /// PipeWire node name of the virtual camera
    pub const NODE_NAME: &str = "relaycam-virtual";

    /// Human-readable device name shown to other applications
    pub const NODE_DESCRIPTION: &str = "relaycam (Virtual)";
}

/// Audio capture format
pub mod audio {
    /// Sample rate in Hz
    pub const SAMPLE_RATE: u32 = 44_100;

    /// Channel count (mono)
    pub const CHANNELS: u16 = 1;

    /// Samples per chunk
    pub const CHUNK_SAMPLES: usize = 1024;

    /// Bits per sample (signed 16-bit)
    pub const BITS_PER_SAMPLE: u16 = 16;
}

/// GStreamer pipeline constants
pub mod pipeline {
    /// Maximum buffer queue size (keep small for low latency)
    pub const MAX_BUFFERS: u32 = 2;

    /// Output pixel format for appsink
    pub const OUTPUT_FORMAT: &str = "RGBA";
}

/// Timing constants
pub mod timing {
    use super::Duration;

    /// Frame counter modulo for periodic logging
    pub const FRAME_LOG_INTERVAL: u64 = 30;

    /// Pipeline state change timeout on stop
    pub const STOP_TIMEOUT_SECS: u64 = 2;

    /// Time allowed for a source to deliver its first frame
    pub const START_TIMEOUT_SECS: u64 = 5;

    /// Upper bound on waiting for EOS to drain through a recording pipeline
    pub const EOS_TIMEOUT_SECS: u64 = 5;

    /// Upper bound on a single mux job
    pub const MUX_TIMEOUT_SECS: u64 = 300;

    /// Longest a single audio chunk read may block before re-checking the stop flag
    pub const AUDIO_READ_TIMEOUT: Duration = Duration::from_millis(100);

    /// Polling interval for the headless CLI loops
    pub const CLI_POLL_INTERVAL: Duration = Duration::from_millis(5);
}
