// SPDX-License-Identifier: GPL-3.0-only

//! Frame analysis tasks run on every tick

pub mod qr_detector;

pub use qr_detector::QrScanner;
