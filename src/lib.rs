// SPDX-License-Identifier: MPL-2.0

//! relaycam - camera and stream relay with virtual camera, recording and QR scanning
//!
//! A session opens a local camera or a stream URL, mirrors every frame to a
//! virtual camera other applications can open, records video with
//! microphone audio into an MP4, and scans frames for QR codes.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`app`]: Session controller, state machine and QR scanning
//! - [`backends`]: Frame sources, audio input and virtual camera output
//! - [`media`]: Encoder selection
//! - [`pipelines`]: Audio capture, video recording, muxing and photos
//! - [`config`]: Runtime configuration
//! - [`storage`]: Output and temporary file locations
//! - [`terminal`]: Terminal UI
//!
//! # Example
//!
//! ```ignore
//! let config = Config::default();
//! let mut session = SessionController::new(GstBackend::new(&config), config);
//! session.start(SourceDescriptor::parse("0"))?;
//! loop {
//!     if session.tick_due(Instant::now()) {
//!         session.tick();
//!     }
//! }
//! ```

pub mod app;
pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod media;
pub mod pipelines;
pub mod storage;
pub mod terminal;

// Re-export commonly used types
pub use app::frame_processor::{QrAction, QrScanner};
pub use app::{Session, SessionController, SessionEvent, SessionState};
pub use backends::camera::{Frame, PixelFormat, SourceDescriptor};
pub use backends::{GstBackend, MediaBackend};
pub use config::Config;
pub use constants::BitratePreset;
