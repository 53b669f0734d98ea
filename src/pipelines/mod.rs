// SPDX-License-Identifier: MPL-2.0

//! Capture pipelines for photos, video and audio
//!
//! # Pipeline Architecture
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ Latest Frame │ ──▶ │  Photo Pipeline   │ ──▶ │  JPEG File   │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//!
//! ┌──────────────┐     ┌───────────────────┐
//! │ Tick Frames  │ ──▶ │  VideoRecorder    │ ──▶ temp video.mp4 ─┐
//! └──────────────┘     └───────────────────┘                     │
//!                                                                ├─▶ MuxJob ─▶ MP4
//! ┌──────────────┐     ┌───────────────────┐                     │
//! │ Audio Input  │ ──▶ │  AudioCapture     │ ──▶ temp audio.wav ─┘
//! └──────────────┘     └───────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`audio`]: Threaded microphone capture and WAV writing
//! - [`photo`]: JPEG snapshots
//! - [`video`]: Video recording and muxing

pub mod audio;
pub mod photo;
pub mod video;
