// SPDX-License-Identifier: MPL-2.0

//! Encoder selection and configuration
//!
//! - Video: H.264, software encoders first, then hardware
//! - Audio: AAC (avenc_aac, voaacenc, faac)

pub mod audio;
pub mod video;

pub use audio::AudioQuality;
pub use video::{EncoderInfo, SelectedVideoEncoder, enumerate_h264_encoders, select_h264_encoder};
