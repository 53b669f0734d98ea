// SPDX-License-Identifier: MPL-2.0

//! Audio recording pipeline
//!
//! Audio is captured on its own thread, independent of the video tick, and
//! serialized to a PCM WAV file once recording stops. The WAV is later muxed
//! with the recorded video.

pub mod capture;
pub mod wav;

pub use capture::{AudioCapture, AudioSummary};
pub use wav::write_wav;
