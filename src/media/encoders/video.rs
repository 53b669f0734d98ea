// SPDX-License-Identifier: MPL-2.0

//! H.264 encoder selection
//!
//! Recording always produces H.264 in MP4. Software encoders come first
//! since they accept any raw input the recorder negotiates; hardware
//! encoders are used when no software encoder is installed.

use crate::constants::BitratePreset;
use gstreamer as gst;
use gstreamer::prelude::*;
use tracing::{debug, info};

/// H.264 encoders in priority order: (element, display name, hardware)
const H264_ENCODERS: [(&str, &str, bool); 8] = [
    ("x264enc", "x264 H.264 (SW)", false),
    ("openh264enc", "OpenH264 H.264 (SW)", false),
    ("vah264enc", "VA-API H.264 (HW)", true),
    ("vaapih264enc", "VA-API H.264 (HW)", true),
    ("nvh264enc", "NVIDIA H.264 (HW)", true),
    ("qsvh264enc", "Intel QSV H.264 (HW)", true),
    ("amfh264enc", "AMD AMF H.264 (HW)", true),
    ("v4l2h264enc", "V4L2 H.264 (HW)", true),
];

/// OpenH264 rejects frames above this many pixels
pub const OPENH264_MAX_PIXELS: u32 = 9_437_184;

/// Information about an available encoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderInfo {
    /// GStreamer element name
    pub element_name: String,
    /// Display name
    pub display_name: String,
    /// Whether this is hardware accelerated
    pub is_hardware: bool,
    /// Priority (lower = higher priority)
    pub priority: u32,
}

/// Encoder plus the parser that feeds mp4mux
pub struct SelectedVideoEncoder {
    pub encoder: gst::Element,
    pub parser: gst::Element,
    pub element_name: &'static str,
    pub bitrate_kbps: u32,
}

/// Enumerate installed H.264 encoders, highest priority first
pub fn enumerate_h264_encoders() -> Vec<EncoderInfo> {
    if gst::init().is_err() {
        return Vec::new();
    }

    H264_ENCODERS
        .iter()
        .enumerate()
        .filter(|(_, (name, _, _))| gst::ElementFactory::find(name).is_some())
        .map(|(priority, (name, display, hardware))| EncoderInfo {
            element_name: name.to_string(),
            display_name: display.to_string(),
            is_hardware: *hardware,
            priority: priority as u32,
        })
        .collect()
}

/// Create and configure the best H.264 encoder for `width`x`height`
pub fn select_h264_encoder(
    preset: BitratePreset,
    width: u32,
    height: u32,
) -> Result<SelectedVideoEncoder, String> {
    gst::init().map_err(|e| format!("Failed to initialize GStreamer: {}", e))?;

    let bitrate = preset.bitrate_kbps(width);

    for (name, _, is_hardware) in &H264_ENCODERS {
        if *name == "openh264enc" && width * height > OPENH264_MAX_PIXELS {
            debug!(width, height, "Skipping openh264enc, resolution above its limit");
            continue;
        }
        let Ok(encoder) = gst::ElementFactory::make(name).build() else {
            continue;
        };
        let parser = gst::ElementFactory::make("h264parse")
            .build()
            .map_err(|e| format!("Failed to create h264parse: {}", e))?;

        configure_video_encoder(&encoder, name, preset, bitrate);
        info!(
            encoder = %name,
            hardware = is_hardware,
            bitrate_kbps = bitrate,
            "Selected video encoder"
        );

        return Ok(SelectedVideoEncoder {
            encoder,
            parser,
            element_name: name,
            bitrate_kbps: bitrate,
        });
    }

    Err(
        "No H.264 encoder available. Please install gstreamer1-plugins-ugly (x264enc) \
         or gstreamer1-plugin-openh264"
            .to_string(),
    )
}

/// Speed preset for x264 by bitrate preset
fn x264_preset(preset: BitratePreset) -> &'static str {
    match preset {
        BitratePreset::Low => "veryfast",
        BitratePreset::Medium => "faster",
        BitratePreset::High => "fast",
    }
}

/// Configure encoder based on element type
fn configure_video_encoder(
    encoder: &gst::Element,
    encoder_name: &str,
    preset: BitratePreset,
    bitrate: u32,
) {
    match encoder_name {
        "x264enc" => {
            encoder.set_property_from_str("speed-preset", x264_preset(preset));
            encoder.set_property_from_str("tune", "zerolatency");
            encoder.set_property("bitrate", bitrate);
            debug!(
                "Configured x264enc: preset={}, bitrate={} kbps",
                x264_preset(preset),
                bitrate
            );
        }

        "openh264enc" => {
            encoder.set_property_from_str("rate-control", "bitrate");
            encoder.set_property("bitrate", bitrate * 1000);
            encoder.set_property_from_str("usage-type", "camera");
            debug!("Configured openh264enc: bitrate={} bps", bitrate * 1000);
        }

        "vaapih264enc" => {
            encoder.set_property("bitrate", bitrate);
            debug!("Configured VA-API encoder: bitrate={} kbps", bitrate);
        }

        "vah264enc" | "amfh264enc" => {
            encoder.set_property_from_str("rate-control", "cbr");
            encoder.set_property("bitrate", bitrate);
            debug!("Configured {}: bitrate={} kbps", encoder_name, bitrate);
        }

        "nvh264enc" | "qsvh264enc" => {
            encoder.set_property("bitrate", bitrate);
            debug!("Configured {}: bitrate={} kbps", encoder_name, bitrate);
        }

        _ => {
            debug!("Using {} with default configuration", encoder_name);
        }
    }
}
