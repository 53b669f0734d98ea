// SPDX-License-Identifier: MPL-2.0

//! Frame sources
//!
//! A frame source is the single video origin of a session: a local camera or
//! a network stream. The session reads one frame per tick through the
//! [`FrameSource`] trait; the GStreamer implementation lives in [`pipeline`].
//!
//! ```text
//! ┌──────────────────────┐
//! │  SessionController   │  ← one read per tick
//! └──────────┬───────────┘
//!            │
//!            ▼
//! ┌──────────────────────┐
//! │  FrameSource Trait   │  ← common interface
//! └──────────┬───────────┘
//!            │
//!            ▼
//!   ┌─────────────────┐
//!   │  GstFrameSource │  ← camera / uridecodebin ! appsink
//!   └─────────────────┘
//! ```

pub mod enumeration;
pub mod pipeline;
pub mod types;

pub use enumeration::enumerate_video_sources;
pub use pipeline::GstFrameSource;
pub use types::*;

use crate::errors::FrameReadError;

/// An open video source
///
/// Implementations own their OS resources and must release them in
/// [`FrameSource::close`] and on drop.
pub trait FrameSource: Send {
    /// Read the next frame
    ///
    /// Blocks for at most a few frame periods. A failed read is transient:
    /// the caller skips the tick and tries again on the next one.
    fn read_frame(&mut self) -> Result<Frame, FrameReadError>;

    /// Native frame size of the source
    fn frame_size(&self) -> (u32, u32);

    /// Human-readable description for logs and the status bar
    fn description(&self) -> String;

    /// Release the device or network connection
    ///
    /// Must be safe to call more than once.
    fn close(&mut self);
}
