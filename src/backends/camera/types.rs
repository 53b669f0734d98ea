// SPDX-License-Identifier: GPL-3.0-only
// Shared types for frame sources

//! Shared types for frame sources

use std::sync::Arc;
use std::time::Instant;

/// Where frames come from: a local camera or a network stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDescriptor {
    /// Local camera by enumeration index (0 = default camera)
    Camera(u32),
    /// Remote or file stream URL (http, https, rtsp, file, ...)
    Url(String),
}

impl SourceDescriptor {
    /// Parse user input from the stream URL field
    ///
    /// Empty or whitespace input selects the default camera, a bare integer
    /// selects a camera by index, anything else is treated as a URL.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return SourceDescriptor::Camera(0);
        }
        match trimmed.parse::<u32>() {
            Ok(index) => SourceDescriptor::Camera(index),
            Err(_) => SourceDescriptor::Url(trimmed.to_string()),
        }
    }

    /// Whether this selects the default camera
    pub fn is_default_camera(&self) -> bool {
        matches!(self, SourceDescriptor::Camera(0))
    }
}

impl Default for SourceDescriptor {
    fn default() -> Self {
        SourceDescriptor::Camera(0)
    }
}

impl std::fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceDescriptor::Camera(0) => write!(f, "default camera"),
            SourceDescriptor::Camera(index) => write!(f, "camera {}", index),
            SourceDescriptor::Url(url) => write!(f, "{}", url),
        }
    }
}

/// A capture device found by enumeration
#[derive(Debug, Clone)]
pub struct SourceDevice {
    /// Display name reported by the device provider
    pub name: String,
    /// GStreamer device class (e.g. "Video/Source")
    pub device_class: String,
}

/// Pixel format for frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// RGBA - 32-bit with alpha (4 bytes per pixel)
    /// This is the format every source pipeline produces
    RGBA,
    /// BGR24 - 24-bit, blue first (virtual camera byte order)
    BGR24,
    /// RGB24 - 24-bit RGB (3 bytes per pixel, no alpha)
    RGB24,
    /// Gray8 - 8-bit grayscale (single channel)
    Gray8,
}

impl PixelFormat {
    /// Bytes per pixel
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            Self::RGBA => 4,
            Self::BGR24 | Self::RGB24 => 3,
            Self::Gray8 => 1,
        }
    }

    /// Parse format from GStreamer format string
    pub fn from_gst_format(format: &str) -> Option<Self> {
        match format {
            "RGBA" | "RGBx" => Some(Self::RGBA),
            "BGR" => Some(Self::BGR24),
            "RGB" => Some(Self::RGB24),
            "GRAY8" => Some(Self::Gray8),
            _ => None,
        }
    }
}

/// A single immutable frame
///
/// Pixel data is reference counted, so fanning a frame out to the preview,
/// the virtual camera, the recorder and the QR scanner never copies it.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Arc<[u8]>,
    pub format: PixelFormat,
    /// Row stride in bytes (may include padding)
    pub stride: u32,
    /// When the frame was read from the source
    pub captured_at: Instant,
}

impl Frame {
    /// Create a tightly packed frame
    pub fn new(width: u32, height: u32, format: PixelFormat, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            width,
            height,
            data: data.into(),
            format,
            stride: width * format.bytes_per_pixel(),
            captured_at: Instant::now(),
        }
    }

    /// Frame dimensions
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Sample one pixel as RGB, clamping coordinates to the frame
    pub fn pixel_rgb(&self, x: u32, y: u32) -> (u8, u8, u8) {
        if self.width == 0 || self.height == 0 {
            return (0, 0, 0);
        }
        let x = x.min(self.width - 1);
        let y = y.min(self.height - 1);
        let bpp = self.format.bytes_per_pixel();
        let idx = (y * self.stride + x * bpp) as usize;
        let data = &self.data;

        match self.format {
            PixelFormat::RGBA | PixelFormat::RGB24 => {
                if idx + 2 < data.len() {
                    (data[idx], data[idx + 1], data[idx + 2])
                } else {
                    (0, 0, 0)
                }
            }
            PixelFormat::BGR24 => {
                if idx + 2 < data.len() {
                    (data[idx + 2], data[idx + 1], data[idx])
                } else {
                    (0, 0, 0)
                }
            }
            PixelFormat::Gray8 => match data.get(idx) {
                Some(&v) => (v, v, v),
                None => (0, 0, 0),
            },
        }
    }

    /// Tightly packed RGB24 bytes (used for JPEG encoding)
    pub fn to_rgb_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity((self.width * self.height * 3) as usize);
        for y in 0..self.height {
            for x in 0..self.width {
                let (r, g, b) = self.pixel_rgb(x, y);
                out.extend_from_slice(&[r, g, b]);
            }
        }
        out
    }

    /// Tightly packed RGBA bytes with stride padding removed
    pub fn to_rgba_bytes(&self) -> Vec<u8> {
        if self.format == PixelFormat::RGBA && self.stride == self.width * 4 {
            return self.data.to_vec();
        }
        let mut out = Vec::with_capacity((self.width * self.height * 4) as usize);
        for y in 0..self.height {
            for x in 0..self.width {
                let (r, g, b) = self.pixel_rgb(x, y);
                out.extend_from_slice(&[r, g, b, 255]);
            }
        }
        out
    }

    /// BGR24 bytes resampled (nearest neighbour) to the given size
    pub fn to_bgr_scaled(&self, dst_width: u32, dst_height: u32) -> Vec<u8> {
        let mut out = Vec::with_capacity((dst_width * dst_height * 3) as usize);
        for y in 0..dst_height {
            let src_y = scale_coord(y, dst_height, self.height);
            for x in 0..dst_width {
                let src_x = scale_coord(x, dst_width, self.width);
                let (r, g, b) = self.pixel_rgb(src_x, src_y);
                out.extend_from_slice(&[b, g, r]);
            }
        }
        out
    }

    /// Grayscale luma (BT.601), downscaled so neither side exceeds `max_dimension`
    ///
    /// Returns the processed width, height and bytes.
    pub fn to_gray_downscaled(&self, max_dimension: u32) -> (u32, u32, Vec<u8>) {
        let (dst_width, dst_height) = if self.width > max_dimension || self.height > max_dimension
        {
            let scale = (self.width as f32 / max_dimension as f32)
                .max(self.height as f32 / max_dimension as f32);
            (
                ((self.width as f32 / scale) as u32).max(1),
                ((self.height as f32 / scale) as u32).max(1),
            )
        } else {
            (self.width, self.height)
        };

        let mut out = Vec::with_capacity((dst_width * dst_height) as usize);
        for y in 0..dst_height {
            let src_y = scale_coord(y, dst_height, self.height);
            for x in 0..dst_width {
                let src_x = scale_coord(x, dst_width, self.width);
                let (r, g, b) = self.pixel_rgb(src_x, src_y);
                let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
                out.push(luma.round().clamp(0.0, 255.0) as u8);
            }
        }
        (dst_width, dst_height, out)
    }
}

fn scale_coord(dst: u32, dst_len: u32, src_len: u32) -> u32 {
    if dst_len == 0 {
        return 0;
    }
    ((dst as u64 * src_len as u64) / dst_len as u64) as u32
}
