// SPDX-License-Identifier: MPL-2.0

//! Per-frame analysis
//!
//! Currently implements QR code detection and classification of the
//! decoded payloads.

pub mod tasks;
pub mod types;

pub use tasks::QrScanner;
pub use types::QrAction;
