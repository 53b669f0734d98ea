// SPDX-License-Identifier: MPL-2.0

//! Storage utilities for photo, video and temporary recording files

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Directory for saved photos (`~/Pictures/<folder>`)
pub fn photo_dir(folder: &str) -> PathBuf {
    dirs::picture_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join("Pictures")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(folder)
}

/// Directory for finished recordings (`~/Videos/<folder>`)
pub fn video_dir(folder: &str) -> PathBuf {
    dirs::video_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join("Videos")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(folder)
}

/// Root for per-recording temporary directories
pub fn temp_root() -> PathBuf {
    std::env::temp_dir().join(crate::constants::DEFAULT_SAVE_FOLDER)
}

/// Where a session writes its files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageDirs {
    pub photos: PathBuf,
    pub videos: PathBuf,
    /// Parent of the per-recording temp directories
    pub temp: PathBuf,
}

impl StorageDirs {
    /// User directories for `folder` and the system temp directory
    pub fn for_folder(folder: &str) -> Self {
        Self {
            photos: photo_dir(folder),
            videos: video_dir(folder),
            temp: temp_root(),
        }
    }

    /// Everything under one directory (`photos/`, `videos/`, `tmp/`)
    pub fn under(root: &Path) -> Self {
        Self {
            photos: root.join("photos"),
            videos: root.join("videos"),
            temp: root.join("tmp"),
        }
    }
}

/// `<prefix>_YYYYmmdd_HHMMSS_mmm.<ext>`
pub fn timestamped_name(prefix: &str, extension: &str, at: DateTime<Local>) -> String {
    format!("{}_{}.{}", prefix, at.format("%Y%m%d_%H%M%S_%3f"), extension)
}

/// A timestamped path in `dir` that does not exist yet
///
/// Two captures within the same millisecond get a numeric suffix instead of
/// overwriting each other.
pub fn unique_output_path(dir: &Path, prefix: &str, extension: &str) -> PathBuf {
    let name = timestamped_name(prefix, extension, Local::now());
    let candidate = dir.join(&name);
    if !candidate.exists() {
        return candidate;
    }
    let stem = name.trim_end_matches(&format!(".{}", extension)).to_string();
    (1u32..)
        .map(|n| dir.join(format!("{}_{}.{}", stem, n, extension)))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Temporary files of one recording and the final destination
///
/// Each recording gets its own directory `<temp_root>/<uuid>/`, so a mux job
/// still working on an earlier recording never shares paths with a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingArtifact {
    pub temp_dir: PathBuf,
    pub video_path: PathBuf,
    pub audio_path: PathBuf,
    pub output_path: PathBuf,
}

impl RecordingArtifact {
    /// Create the temp directory under `temp_root`
    pub fn create(temp_root: &Path, output_path: PathBuf) -> std::io::Result<Self> {
        let temp_dir = temp_root.join(Uuid::new_v4().to_string());
        std::fs::create_dir_all(&temp_dir)?;
        debug!(dir = %temp_dir.display(), "Created recording temp directory");

        Ok(Self {
            video_path: temp_dir.join("video.mp4"),
            audio_path: temp_dir.join("audio.wav"),
            temp_dir,
            output_path,
        })
    }

    /// Delete the temporary files and their directory
    pub fn remove_temp_files(&self) {
        if let Err(e) = std::fs::remove_dir_all(&self.temp_dir)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(
                dir = %self.temp_dir.display(),
                error = %e,
                "Failed to remove recording temp directory"
            );
        }
    }
}
