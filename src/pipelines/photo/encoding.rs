// SPDX-License-Identifier: GPL-3.0-only

//! JPEG encoding of captured frames

use crate::backends::camera::types::Frame;
use crate::errors::PhotoError;
use crate::storage::unique_output_path;
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// JPEG quality used for photos (0-100)
pub const JPEG_QUALITY: u8 = 100;

/// Encode `frame` as JPEG into `writer`
pub fn encode_jpeg<W: std::io::Write>(frame: &Frame, writer: W) -> Result<(), PhotoError> {
    if frame.width == 0 || frame.height == 0 {
        return Err(PhotoError::NoFrameAvailable);
    }
    let rgb = frame.to_rgb_bytes();
    let encoder = JpegEncoder::new_with_quality(writer, JPEG_QUALITY);
    encoder.write_image(&rgb, frame.width, frame.height, ExtendedColorType::Rgb8)?;
    Ok(())
}

/// Save `frame` as `IMG_<timestamp>.jpg` in `output_dir`
pub fn save_jpeg(frame: &Frame, output_dir: &Path) -> Result<PathBuf, PhotoError> {
    std::fs::create_dir_all(output_dir)?;
    let path = unique_output_path(output_dir, "IMG", "jpg");
    debug!(
        width = frame.width,
        height = frame.height,
        path = %path.display(),
        "Encoding photo"
    );

    let mut writer = BufWriter::new(File::create(&path)?);
    encode_jpeg(frame, &mut writer)?;
    std::io::Write::flush(&mut writer)?;

    info!(path = %path.display(), "Photo saved");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::PixelFormat;

    #[test]
    fn saved_photo_is_a_decodable_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let frame = Frame::new(16, 8, PixelFormat::RGBA, vec![200u8; 16 * 8 * 4]);

        let path = save_jpeg(&frame, dir.path()).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("IMG_"));
        assert!(name.ends_with(".jpg"));

        let decoded = image::open(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 8));
    }

    #[test]
    fn repeated_captures_do_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let frame = Frame::new(4, 4, PixelFormat::RGBA, vec![0u8; 64]);
        let a = save_jpeg(&frame, dir.path()).unwrap();
        let b = save_jpeg(&frame, dir.path()).unwrap();
        assert_ne!(a, b);
    }
}
