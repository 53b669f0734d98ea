// SPDX-License-Identifier: GPL-3.0-only

//! Virtual camera output
//!
//! Mirrors the session's frames to an OS-level camera device that other
//! applications (video conferencing software, browsers) can open.
//!
//! # Architecture
//!
//! ```text
//! Session frames (native size, RGBA)
//!        │
//!        ▼
//! ┌──────────────────┐
//! │ VirtualCamera    │  ← scale to 640x480, RGBA → BGR, frame pacing
//! └──────────────────┘
//!        │
//!        ▼
//! ┌──────────────────┐
//! │ VirtualOutput    │  ← appsrc → videoconvert → pipewiresink / v4l2sink
//! └──────────────────┘
//!        │
//!        ▼
//!   Video Apps (Zoom, Teams, etc.)
//! ```

mod pipeline;

pub use pipeline::GstVirtualOutput;

use crate::backends::camera::types::Frame;
use crate::errors::BackendResult;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Sink that publishes BGR frames as a camera device
pub trait VirtualOutput: Send {
    /// Push one tightly packed BGR frame at the output size
    fn push_bgr(&mut self, data: &[u8]) -> BackendResult<()>;

    /// Tear the device down. Safe to call more than once.
    fn close(&mut self);
}

/// Keeps frames at least one period apart
#[derive(Debug, Clone)]
pub struct FramePacer {
    period: Duration,
    last_sent: Option<Instant>,
}

impl FramePacer {
    pub fn new(fps: u32) -> Self {
        Self {
            period: Duration::from_secs_f64(1.0 / fps.max(1) as f64),
            last_sent: None,
        }
    }

    /// Minimum spacing between two frames
    pub fn period(&self) -> Duration {
        self.period
    }

    /// How long to wait at `now` before the next frame may be sent
    pub fn delay_at(&self, now: Instant) -> Duration {
        match self.last_sent {
            Some(last) => (last + self.period).saturating_duration_since(now),
            None => Duration::ZERO,
        }
    }

    /// Record that a frame was sent at `at`
    pub fn mark_sent(&mut self, at: Instant) {
        self.last_sent = Some(at);
    }

    /// Sleep until the next frame slot, then claim it
    pub fn wait(&mut self) {
        let delay = self.delay_at(Instant::now());
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        self.mark_sent(Instant::now());
    }
}

/// Virtual camera device fed once per tick
pub struct VirtualCamera {
    output: Box<dyn VirtualOutput>,
    output_size: (u32, u32),
    pacer: FramePacer,
    frames_sent: u64,
    closed: bool,
}

impl VirtualCamera {
    /// Wrap an opened output of `width`x`height` running at `fps`
    pub fn new(output: Box<dyn VirtualOutput>, width: u32, height: u32, fps: u32) -> Self {
        info!(width, height, fps, "Virtual camera ready");
        Self {
            output,
            output_size: (width, height),
            pacer: FramePacer::new(fps),
            frames_sent: 0,
            closed: false,
        }
    }

    /// Scale `frame` to the output size and publish it
    pub fn send(&mut self, frame: &Frame) -> BackendResult<()> {
        let (width, height) = self.output_size;
        let bgr = frame.to_bgr_scaled(width, height);
        self.pacer.wait();
        self.output.push_bgr(&bgr)?;
        self.frames_sent += 1;
        Ok(())
    }

    /// Output resolution
    pub fn output_size(&self) -> (u32, u32) {
        self.output_size
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Close the device. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        debug!(frames = self.frames_sent, "Closing virtual camera");
        self.output.close();
    }
}

impl Drop for VirtualCamera {
    fn drop(&mut self) {
        self.close();
    }
}
