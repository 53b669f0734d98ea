// SPDX-License-Identifier: MPL-2.0

//! GStreamer pipeline for frame capture
//!
//! Both local cameras and stream URLs end in the same tail:
//!
//! ```text
//! <source> ! videoconvert ! videorate ! video/x-raw,format=RGBA,framerate=N/1 ! appsink
//! ```
//!
//! Frames are pulled synchronously by the session tick, so the appsink keeps
//! only the newest couple of buffers and drops the rest.

use super::enumeration::create_camera_element;
use super::types::*;
use super::FrameSource;
use crate::constants::{pipeline, timing};
use crate::errors::{BackendError, BackendResult, FrameReadError};
use gstreamer::prelude::*;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, error, info, warn};

static FRAME_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Frame source backed by a GStreamer pipeline
pub struct GstFrameSource {
    pipeline: gstreamer::Pipeline,
    appsink: AppSink,
    description: String,
    frame_size: (u32, u32),
    read_timeout: gstreamer::ClockTime,
    /// First frame pulled during open, handed out by the first read
    pending: Option<Frame>,
    closed: bool,
}

impl GstFrameSource {
    /// Open `source` and wait for its first frame
    pub fn open(source: &SourceDescriptor, fps: u32) -> BackendResult<Self> {
        info!(source = %source, fps, "Opening frame source");

        gstreamer::init().map_err(|e| BackendError::InitializationFailed(e.to_string()))?;

        let fps = fps.max(1);
        let pipeline = gstreamer::Pipeline::new();
        let tail = build_tail(fps)?;
        pipeline
            .add(&tail)
            .map_err(|e| BackendError::InitializationFailed(format!("Failed to add tail: {}", e)))?;

        match source {
            SourceDescriptor::Camera(index) => link_camera(&pipeline, &tail, *index)?,
            SourceDescriptor::Url(url) => link_uri(&pipeline, &tail, url)?,
        }

        let appsink = tail
            .by_name("sink")
            .ok_or_else(|| BackendError::InitializationFailed("Failed to get appsink".to_string()))?
            .dynamic_cast::<AppSink>()
            .map_err(|_| {
                BackendError::InitializationFailed("Failed to cast appsink".to_string())
            })?;

        appsink.set_property("sync", false);
        appsink.set_property("max-buffers", pipeline::MAX_BUFFERS);
        appsink.set_property("drop", true);
        appsink.set_property("enable-last-sample", false);

        debug!("Setting pipeline to PLAYING state");
        if let Err(e) = pipeline.set_state(gstreamer::State::Playing) {
            let reason = bus_error(&pipeline).unwrap_or_else(|| e.to_string());
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(BackendError::InitializationFailed(format!(
                "Failed to start pipeline: {}",
                reason
            )));
        }

        // A source that cannot deliver one frame in time is treated as unavailable
        let first = appsink
            .try_pull_sample(gstreamer::ClockTime::from_seconds(timing::START_TIMEOUT_SECS))
            .ok_or_else(|| {
                bus_error(&pipeline).unwrap_or_else(|| "no frame received".to_string())
            })
            .and_then(|sample| sample_to_frame(&sample));

        let first = match first {
            Ok(frame) => frame,
            Err(reason) => {
                let _ = pipeline.set_state(gstreamer::State::Null);
                return Err(BackendError::InitializationFailed(reason));
            }
        };

        let frame_size = first.size();
        // Several frame periods, but never below 100ms
        let read_timeout_ms = (4_000 / fps as u64).max(100);
        info!(
            width = frame_size.0,
            height = frame_size.1,
            "Frame source ready"
        );

        Ok(Self {
            pipeline,
            appsink,
            description: source.to_string(),
            frame_size,
            read_timeout: gstreamer::ClockTime::from_mseconds(read_timeout_ms),
            pending: Some(first),
            closed: false,
        })
    }
}

impl FrameSource for GstFrameSource {
    fn read_frame(&mut self) -> Result<Frame, FrameReadError> {
        if self.closed {
            return Err(FrameReadError::EndOfStream);
        }
        if let Some(frame) = self.pending.take() {
            return Ok(frame);
        }
        if let Some(reason) = bus_error(&self.pipeline) {
            return Err(FrameReadError::Pipeline(reason));
        }

        match self.appsink.try_pull_sample(self.read_timeout) {
            Some(sample) => {
                let frame = sample_to_frame(&sample).map_err(FrameReadError::Pipeline)?;
                let frame_num = FRAME_COUNTER.fetch_add(1, Ordering::Relaxed);
                if frame_num % timing::FRAME_LOG_INTERVAL == 0 {
                    debug!(
                        frame = frame_num,
                        width = frame.width,
                        height = frame.height,
                        stride = frame.stride,
                        "Frame read"
                    );
                }
                Ok(frame)
            }
            None if self.appsink.is_eos() => Err(FrameReadError::EndOfStream),
            None => Err(FrameReadError::Timeout),
        }
    }

    fn frame_size(&self) -> (u32, u32) {
        self.frame_size
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.pending = None;
        info!(source = %self.description, "Closing frame source");

        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            warn!(error = %e, "Failed to stop source pipeline");
            return;
        }
        let (result, state, _) = self
            .pipeline
            .state(gstreamer::ClockTime::from_seconds(timing::STOP_TIMEOUT_SECS));
        debug!(result = ?result, state = ?state, "Source pipeline stopped");
    }
}

impl Drop for GstFrameSource {
    fn drop(&mut self) {
        self.close();
    }
}

/// Build the conversion tail ending in the appsink
fn build_tail(fps: u32) -> BackendResult<gstreamer::Bin> {
    let description = format!(
        "videoconvert ! videorate ! video/x-raw,format={},framerate={}/1 ! appsink name=sink",
        pipeline::OUTPUT_FORMAT,
        fps
    );
    debug!(%description, "Building source tail");
    gstreamer::parse::bin_from_description(&description, true)
        .map_err(|e| BackendError::InitializationFailed(format!("Failed to build tail: {}", e)))
}

/// Link a local camera into the tail
fn link_camera(
    pipeline: &gstreamer::Pipeline,
    tail: &gstreamer::Bin,
    index: u32,
) -> BackendResult<()> {
    let element = match create_camera_element(index) {
        Ok(Some(element)) => element,
        Ok(None) if index == 0 => {
            debug!("No camera found by device monitor, falling back to autovideosrc");
            gstreamer::ElementFactory::make("autovideosrc")
                .build()
                .map_err(|e| {
                    BackendError::InitializationFailed(format!(
                        "Failed to create autovideosrc: {}",
                        e
                    ))
                })?
        }
        Ok(None) => {
            return Err(BackendError::InitializationFailed(format!(
                "no camera at index {}",
                index
            )));
        }
        Err(e) => {
            return Err(BackendError::InitializationFailed(format!(
                "Failed to create camera element: {}",
                e
            )));
        }
    };

    pipeline.add(&element).map_err(|e| {
        BackendError::InitializationFailed(format!("Failed to add camera element: {}", e))
    })?;
    element.link(tail).map_err(|e| {
        BackendError::InitializationFailed(format!("Failed to link camera: {}", e))
    })
}

/// Link a stream URL into the tail through uridecodebin
fn link_uri(pipeline: &gstreamer::Pipeline, tail: &gstreamer::Bin, url: &str) -> BackendResult<()> {
    let uri = if url.contains("://") {
        url.to_string()
    } else {
        gstreamer::glib::filename_to_uri(url, None)
            .map_err(|e| {
                BackendError::InitializationFailed(format!("Invalid stream location: {}", e))
            })?
            .to_string()
    };

    let decodebin = gstreamer::ElementFactory::make("uridecodebin")
        .property("uri", uri.as_str())
        .build()
        .map_err(|e| {
            BackendError::InitializationFailed(format!("Failed to create uridecodebin: {}", e))
        })?;
    pipeline.add(&decodebin).map_err(|e| {
        BackendError::InitializationFailed(format!("Failed to add uridecodebin: {}", e))
    })?;

    let sink_pad = tail
        .static_pad("sink")
        .ok_or_else(|| BackendError::InitializationFailed("Tail has no sink pad".to_string()))?;

    // Only the first video pad is used; audio pads stay unlinked
    decodebin.connect_pad_added(move |_, src_pad| {
        if sink_pad.is_linked() {
            return;
        }
        let caps = src_pad
            .current_caps()
            .unwrap_or_else(|| src_pad.query_caps(None));
        let is_video = caps
            .structure(0)
            .is_some_and(|s| s.name().starts_with("video/"));
        if !is_video {
            return;
        }
        if let Err(e) = src_pad.link(&sink_pad) {
            error!(error = ?e, "Failed to link decoded video pad");
        }
    });

    debug!(%uri, "Stream source configured");
    Ok(())
}

/// Pop the first pending error from the pipeline bus, if any
fn bus_error(pipeline: &gstreamer::Pipeline) -> Option<String> {
    let bus = pipeline.bus()?;
    while let Some(msg) = bus.pop_filtered(&[gstreamer::MessageType::Error]) {
        if let gstreamer::MessageView::Error(err) = msg.view() {
            error!(
                error = %err.error(),
                debug = ?err.debug(),
                "Source pipeline error"
            );
            return Some(err.error().to_string());
        }
    }
    None
}

fn sample_to_frame(sample: &gstreamer::Sample) -> Result<Frame, String> {
    let captured_at = Instant::now();
    let buffer = sample.buffer().ok_or("No buffer in sample")?;
    let caps = sample.caps().ok_or("No caps in sample")?;
    let video_info =
        VideoInfo::from_caps(caps).map_err(|e| format!("Failed to get video info: {}", e))?;
    let format = PixelFormat::from_gst_format(video_info.format().to_str().as_str())
        .ok_or_else(|| format!("Unsupported frame format {:?}", video_info.format()))?;
    let map = buffer
        .map_readable()
        .map_err(|e| format!("Failed to map buffer: {}", e))?;

    Ok(Frame {
        width: video_info.width(),
        height: video_info.height(),
        data: Arc::from(map.as_slice()),
        format,
        stride: video_info.stride()[0] as u32,
        captured_at,
    })
}
