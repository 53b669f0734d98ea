// SPDX-License-Identifier: MPL-2.0

//! GStreamer pipeline for virtual camera output
//!
//! Creates a pipeline that:
//! 1. Receives BGR frames from the session (via appsrc)
//! 2. Converts format as needed (via videoconvert)
//! 3. Outputs to a PipeWire virtual camera node, or to a v4l2loopback
//!    device when a device path is configured

use super::VirtualOutput;
use crate::constants::{timing, virtual_camera};
use crate::errors::{BackendError, BackendResult};
use gstreamer::prelude::*;
use gstreamer_app::AppSrc;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info, warn};

static FRAME_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Virtual camera GStreamer pipeline
pub struct GstVirtualOutput {
    pipeline: gstreamer::Pipeline,
    appsrc: AppSrc,
    frame_bytes: usize,
    closed: bool,
}

impl GstVirtualOutput {
    /// Create and start the output pipeline
    ///
    /// With `device` set, frames go to that v4l2loopback device through
    /// `v4l2sink`; otherwise a PipeWire node named
    /// [`virtual_camera::NODE_DESCRIPTION`] is provided.
    pub fn open(width: u32, height: u32, fps: u32, device: Option<&Path>) -> BackendResult<Self> {
        info!(width, height, fps, ?device, "Creating virtual camera pipeline (BGR)");

        gstreamer::init().map_err(|e| {
            BackendError::InitializationFailed(format!("GStreamer init failed: {}", e))
        })?;

        let pipeline = gstreamer::Pipeline::new();

        let appsrc = gstreamer::ElementFactory::make("appsrc")
            .name("virtual_camera_src")
            .build()
            .map_err(|e| {
                BackendError::InitializationFailed(format!("Failed to create appsrc: {}", e))
            })?;

        let videoconvert = gstreamer::ElementFactory::make("videoconvert")
            .name("virtual_camera_convert")
            .build()
            .map_err(|e| {
                BackendError::InitializationFailed(format!("Failed to create videoconvert: {}", e))
            })?;

        let sink = match device {
            Some(path) => create_v4l2_sink(path)?,
            None => create_pipewire_sink()?,
        };

        let appsrc = appsrc.downcast::<AppSrc>().map_err(|_| {
            BackendError::InitializationFailed("Failed to downcast to AppSrc".into())
        })?;

        let caps = gstreamer::Caps::builder("video/x-raw")
            .field("format", "BGR")
            .field("width", width as i32)
            .field("height", height as i32)
            .field("framerate", gstreamer::Fraction::new(fps.max(1) as i32, 1))
            .build();

        appsrc.set_caps(Some(&caps));
        appsrc.set_format(gstreamer::Format::Time);
        appsrc.set_is_live(true);
        appsrc.set_do_timestamp(true);

        pipeline
            .add_many([appsrc.upcast_ref(), &videoconvert, &sink])
            .map_err(|e| {
                BackendError::InitializationFailed(format!("Failed to add elements: {}", e))
            })?;

        gstreamer::Element::link_many([appsrc.upcast_ref(), &videoconvert, &sink]).map_err(
            |e| BackendError::InitializationFailed(format!("Failed to link elements: {}", e)),
        )?;

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| {
                let _ = pipeline.set_state(gstreamer::State::Null);
                BackendError::InitializationFailed(format!("Failed to start pipeline: {}", e))
            })?;

        let (result, _state, _pending) = pipeline.state(gstreamer::ClockTime::from_seconds(
            timing::START_TIMEOUT_SECS,
        ));
        if result.is_err() {
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(BackendError::InitializationFailed(
                "Pipeline failed to reach Playing state".into(),
            ));
        }

        info!("Virtual camera pipeline started");
        Ok(Self {
            pipeline,
            appsrc,
            frame_bytes: (width * height * 3) as usize,
            closed: false,
        })
    }
}

impl VirtualOutput for GstVirtualOutput {
    fn push_bgr(&mut self, data: &[u8]) -> BackendResult<()> {
        if self.closed {
            return Err(BackendError::NotRunning);
        }
        if data.len() != self.frame_bytes {
            return Err(BackendError::FormatNotSupported(format!(
                "Frame data size {} doesn't match expected {} for BGR",
                data.len(),
                self.frame_bytes
            )));
        }

        let buffer = gstreamer::Buffer::from_slice(data.to_vec());
        match self.appsrc.push_buffer(buffer) {
            Ok(_) => {
                let count = FRAME_COUNTER.fetch_add(1, Ordering::Relaxed);
                if count % 100 == 0 {
                    debug!(frame = count, "Virtual camera frames pushed");
                }
                Ok(())
            }
            Err(e) => {
                warn!(?e, "Failed to push frame to virtual camera");
                Err(BackendError::Other(format!("Failed to push frame: {:?}", e)))
            }
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        debug!("Stopping virtual camera pipeline");

        if let Err(e) = self.appsrc.end_of_stream() {
            debug!(?e, "Failed to send EOS to virtual camera");
        }
        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            error!(?e, "Failed to stop virtual camera pipeline");
            return;
        }
        info!("Virtual camera pipeline stopped");
    }
}

impl Drop for GstVirtualOutput {
    fn drop(&mut self) {
        self.close();
    }
}

fn create_pipewire_sink() -> BackendResult<gstreamer::Element> {
    let sink = gstreamer::ElementFactory::make("pipewiresink")
        .name("virtual_camera_sink")
        .build()
        .map_err(|e| {
            BackendError::InitializationFailed(format!("Failed to create pipewiresink: {}", e))
        })?;

    // "provide" mode exposes a source node other applications can open
    sink.set_property_from_str("mode", "provide");

    // media.role = "Camera" is required for xdg-desktop-portal to list the node
    let stream_props = gstreamer::Structure::builder("props")
        .field("media.class", "Video/Source")
        .field("media.role", "Camera")
        .field("node.name", virtual_camera::NODE_NAME)
        .field("node.description", virtual_camera::NODE_DESCRIPTION)
        .build();
    sink.set_property("stream-properties", &stream_props);
    Ok(sink)
}

fn create_v4l2_sink(device: &Path) -> BackendResult<gstreamer::Element> {
    let device = device.to_str().ok_or_else(|| {
        BackendError::InitializationFailed(format!("Invalid device path: {}", device.display()))
    })?;
    gstreamer::ElementFactory::make("v4l2sink")
        .name("virtual_camera_sink")
        .property("device", device)
        .property("sync", false)
        .build()
        .map_err(|e| {
            BackendError::InitializationFailed(format!("Failed to create v4l2sink: {}", e))
        })
}
