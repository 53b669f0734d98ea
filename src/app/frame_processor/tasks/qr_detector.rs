// SPDX-License-Identifier: GPL-3.0-only

//! QR code detection task
//!
//! Frames are converted to grayscale, downscaled so the long edge is at most
//! 640px, and searched with the rqrr crate.

use crate::backends::camera::types::Frame;
use std::time::Instant;
use tracing::{debug, trace};

/// QR code scanner
pub struct QrScanner {
    /// Maximum dimension for processing (frames are downscaled to this)
    max_dimension: u32,
}

impl Default for QrScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl QrScanner {
    pub fn new() -> Self {
        Self { max_dimension: 640 }
    }

    /// Decode every QR code visible in `frame`
    pub fn scan(&self, frame: &Frame) -> Vec<String> {
        if frame.width == 0 || frame.height == 0 {
            return Vec::new();
        }
        let start = Instant::now();
        let (width, height, luma) = frame.to_gray_downscaled(self.max_dimension);

        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            width as usize,
            height as usize,
            |x, y| luma[y * width as usize + x],
        );
        let grids = prepared.detect_grids();

        let payloads: Vec<String> = grids
            .iter()
            .filter_map(|grid| match grid.decode() {
                Ok((_meta, content)) => Some(content),
                Err(e) => {
                    debug!(error = ?e, "Failed to decode QR code");
                    None
                }
            })
            .collect();

        trace!(
            width,
            height,
            grids = grids.len(),
            decoded = payloads.len(),
            elapsed = ?start.elapsed(),
            "QR scan complete"
        );
        payloads
    }
}
