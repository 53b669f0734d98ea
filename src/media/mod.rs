// SPDX-License-Identifier: MPL-2.0

//! Media encoding utilities
//!
//! Recording produces H.264 video in MP4 and the final mux encodes the
//! captured PCM audio to AAC. The [`encoders`] module picks the first
//! installed GStreamer element for each and configures its bitrate.

pub mod encoders;

pub use encoders::{AudioQuality, SelectedVideoEncoder};
