// SPDX-License-Identifier: MPL-2.0

//! 16-bit PCM WAV files written with `hound`

use crate::backends::audio::{AudioChunk, AudioFormat};
use crate::constants::audio::BITS_PER_SAMPLE;
use std::path::Path;

/// Size of the RIFF header hound writes for mono or stereo 16-bit PCM
pub const WAV_HEADER_SIZE: usize = 44;

/// hound spec for captured audio
pub fn wav_spec(format: &AudioFormat) -> hound::WavSpec {
    hound::WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: hound::SampleFormat::Int,
    }
}

/// Write `chunks` in order as a WAV file, returning the data size in bytes
pub fn write_wav(
    path: &Path,
    format: &AudioFormat,
    chunks: &[AudioChunk],
) -> Result<u64, hound::Error> {
    let mut writer = hound::WavWriter::create(path, wav_spec(format))?;
    let mut samples = 0u64;
    for chunk in chunks {
        for &sample in &chunk.samples {
            writer.write_sample(sample)?;
        }
        samples += chunk.len() as u64;
    }
    writer.finalize()?;
    Ok(samples * u64::from(BITS_PER_SAMPLE / 8))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u16_at(bytes: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
    }

    fn u32_at(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    #[test]
    fn header_describes_mono_16bit_44100() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audio.wav");
        write_wav(&path, &AudioFormat::default(), &[AudioChunk::new(vec![0; 1024])]).unwrap();

        let header = std::fs::read(&path).unwrap();
        assert_eq!(&header[0..4], b"RIFF");
        assert_eq!(&header[8..12], b"WAVE");
        assert_eq!(&header[12..16], b"fmt ");
        assert_eq!(&header[36..40], b"data");
        assert_eq!(u32_at(&header, 4), 36 + 2048);
        assert_eq!(u16_at(&header, 20), 1);
        assert_eq!(u16_at(&header, 22), 1);
        assert_eq!(u32_at(&header, 24), 44_100);
        assert_eq!(u32_at(&header, 28), 88_200);
        assert_eq!(u16_at(&header, 32), 2);
        assert_eq!(u16_at(&header, 34), 16);
        assert_eq!(u32_at(&header, 40), 2048);
    }

    #[test]
    fn samples_are_written_in_chunk_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audio.wav");
        let chunks = vec![
            AudioChunk::new(vec![1; 1024]),
            AudioChunk::new(vec![-2; 1024]),
            AudioChunk::new(vec![3; 1024]),
        ];

        let data_size = write_wav(&path, &AudioFormat::default(), &chunks).unwrap();
        assert_eq!(data_size, 3 * 1024 * 2);

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec(), wav_spec(&AudioFormat::default()));
        let samples: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
        assert_eq!(samples.len(), 3 * 1024);
        assert_eq!(samples[0], 1);
        assert_eq!(samples[1024], -2);
        assert_eq!(samples[3 * 1024 - 1], 3);
    }

    #[test]
    fn empty_recording_has_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        assert_eq!(write_wav(&path, &AudioFormat::default(), &[]).unwrap(), 0);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), WAV_HEADER_SIZE as u64);
    }
}
