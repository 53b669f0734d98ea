// SPDX-License-Identifier: MPL-2.0

//! Video recording and final audio/video muxing
//!
//! - [`recorder`]: frames → temporary H.264/MP4 file at a fixed frame rate
//! - [`muxer`]: temporary video + WAV → final MP4 in a background job

pub mod muxer;
pub mod recorder;

pub use muxer::{GstMuxEngine, MuxEngine, MuxJob, Muxer};
pub use recorder::{GstVideoWriter, RecordedVideo, VideoRecorder, VideoWriter};
