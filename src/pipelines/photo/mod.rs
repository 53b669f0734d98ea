// SPDX-License-Identifier: GPL-3.0-only

//! Photo capture
//!
//! Snapshots of the latest preview frame, encoded as JPEG at maximum
//! quality with a timestamped filename.

pub mod encoding;

pub use encoding::{JPEG_QUALITY, encode_jpeg, save_jpeg};
