// SPDX-License-Identifier: MPL-2.0

//! AAC encoder selection
//!
//! The recorded WAV is encoded to AAC while muxing into MP4.

use crate::constants::BitratePreset;
use gstreamer as gst;
use gstreamer::prelude::*;
use tracing::debug;

/// AAC encoders in priority order
pub const AAC_ENCODERS: [&str; 3] = ["avenc_aac", "voaacenc", "faac"];

/// Audio quality presets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioQuality {
    /// 64 kbps
    Low,
    /// 128 kbps
    Medium,
    /// 192 kbps
    High,
}

impl AudioQuality {
    /// Get bitrate in bits per second
    pub fn bitrate_bps(&self) -> i32 {
        match self {
            AudioQuality::Low => 64_000,
            AudioQuality::Medium => 128_000,
            AudioQuality::High => 192_000,
        }
    }
}

impl From<BitratePreset> for AudioQuality {
    fn from(preset: BitratePreset) -> Self {
        match preset {
            BitratePreset::Low => AudioQuality::Low,
            BitratePreset::Medium => AudioQuality::Medium,
            BitratePreset::High => AudioQuality::High,
        }
    }
}

/// Name of the first installed AAC encoder
pub fn available_aac_encoder() -> Option<&'static str> {
    gst::init().ok()?;
    AAC_ENCODERS
        .iter()
        .copied()
        .find(|name| gst::ElementFactory::find(name).is_some())
}

/// Configure AAC encoder
pub(crate) fn configure_aac_encoder(
    encoder: &gst::Element,
    encoder_name: &str,
    quality: AudioQuality,
) {
    // Property types differ between encoders; all take bits per second
    let bitrate = quality.bitrate_bps();

    match encoder_name {
        "avenc_aac" => {
            encoder.set_property_from_str("bitrate", &bitrate.to_string());
            debug!("Configured avenc_aac: bitrate={} bps", bitrate);
        }

        "faac" => {
            encoder.set_property_from_str("bitrate", &bitrate.to_string());
            debug!("Configured faac: bitrate={} bps", bitrate);
        }

        "voaacenc" => {
            encoder.set_property_from_str("bitrate", &bitrate.to_string());
            debug!("Configured voaacenc: bitrate={} bps", bitrate);
        }

        _ => {
            debug!("Unknown AAC encoder type, using default configuration");
        }
    }
}
