// SPDX-License-Identifier: MPL-2.0

//! Session logic
//!
//! # Architecture
//!
//! - `controller`: [`SessionController`], the owner of the session and its resources
//! - `state`: Session state machine and the events observers receive
//! - `recording`: One in-progress recording (video writer, audio thread, temp files)
//! - `frame_processor`: QR scanning of the latest frame
//!
//! The UI never mutates the session directly. It calls controller methods and
//! observes state through accessors and [`SessionEvent`]s.

mod controller;
pub mod frame_processor;
mod recording;
mod state;

pub use controller::SessionController;
pub use recording::FinishedRecording;
pub use state::{Session, SessionEvent, SessionState};
