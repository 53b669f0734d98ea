// SPDX-License-Identifier: MPL-2.0

//! Capture device enumeration through the GStreamer device monitor

use super::types::SourceDevice;
use gstreamer::prelude::*;
use tracing::{debug, warn};

/// Device class of video capture devices
pub const VIDEO_SOURCE_CLASS: &str = "Video/Source";

/// Device class of audio capture devices
pub const AUDIO_SOURCE_CLASS: &str = "Audio/Source";

/// List video capture devices in enumeration order
///
/// The position in the returned list is the camera index accepted by
/// [`super::SourceDescriptor::Camera`].
pub fn enumerate_video_sources() -> Vec<SourceDevice> {
    monitor_devices(VIDEO_SOURCE_CLASS)
        .iter()
        .map(to_source_device)
        .collect()
}

/// Create the source element for the camera at `index`
///
/// Returns `Ok(None)` when the monitor has no device at that position.
pub(crate) fn create_camera_element(
    index: u32,
) -> Result<Option<gstreamer::Element>, gstreamer::glib::BoolError> {
    let devices = monitor_devices(VIDEO_SOURCE_CLASS);
    match devices.get(index as usize) {
        Some(device) => {
            debug!(index, name = %device.display_name(), "Creating element for camera");
            device.create_element(None).map(Some)
        }
        None => Ok(None),
    }
}

/// Query the device monitor for one device class
pub(crate) fn monitor_devices(class: &str) -> Vec<gstreamer::Device> {
    if let Err(e) = gstreamer::init() {
        warn!(error = %e, "Failed to initialize GStreamer");
        return Vec::new();
    }

    let monitor = gstreamer::DeviceMonitor::new();
    monitor.add_filter(Some(class), None);

    if let Err(e) = monitor.start() {
        warn!(class, error = %e, "Device monitor failed to start");
        return Vec::new();
    }
    let devices: Vec<gstreamer::Device> = monitor.devices().into_iter().collect();
    monitor.stop();

    debug!(class, count = devices.len(), "Enumerated devices");
    devices
}

pub(crate) fn to_source_device(device: &gstreamer::Device) -> SourceDevice {
    SourceDevice {
        name: device.display_name().to_string(),
        device_class: device.device_class().to_string(),
    }
}
