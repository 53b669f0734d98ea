// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::audio::AudioFormat;
use crate::constants::{self, BitratePreset, virtual_camera};
use crate::storage::StorageDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Width and height in pixels
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Display for FrameSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Runtime configuration
///
/// Built from defaults and overridden by command-line flags; nothing is
/// persisted between runs.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Tick rate of the capture loop and the virtual camera
    pub target_fps: u32,
    /// Mirror frames to a virtual camera while streaming
    pub virtual_camera_enabled: bool,
    /// Output size of the virtual camera
    pub virtual_camera_size: FrameSize,
    /// v4l2loopback device to write to instead of a PipeWire node
    pub virtual_device: Option<PathBuf>,
    /// Frame rate of recorded video files
    pub recording_fps: u32,
    /// Video bitrate preset (also selects the AAC bitrate)
    pub bitrate_preset: BitratePreset,
    /// Audio capture format
    pub audio: AudioFormat,
    /// Scan every frame for QR codes
    pub qr_scan_enabled: bool,
    /// Folder created under Pictures/ and Videos/
    pub save_folder: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_fps: constants::DEFAULT_FPS,
            virtual_camera_enabled: true,
            virtual_camera_size: FrameSize {
                width: virtual_camera::WIDTH,
                height: virtual_camera::HEIGHT,
            },
            virtual_device: None,
            recording_fps: constants::RECORDING_FPS,
            bitrate_preset: BitratePreset::default(),
            audio: AudioFormat::default(),
            qr_scan_enabled: true,
            save_folder: constants::DEFAULT_SAVE_FOLDER.to_string(),
        }
    }
}

impl Config {
    /// Period between two ticks (`1000 / target_fps` ms)
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(1000 / self.target_fps.clamp(1, 1000) as u64)
    }

    /// Where photos are saved
    pub fn photo_dir(&self) -> PathBuf {
        crate::storage::photo_dir(&self.save_folder)
    }

    /// Where finished recordings are saved
    pub fn video_dir(&self) -> PathBuf {
        crate::storage::video_dir(&self.save_folder)
    }

    /// Photo, video and temp directories for a session
    pub fn storage_dirs(&self) -> StorageDirs {
        StorageDirs::for_folder(&self.save_folder)
    }
}
