// SPDX-License-Identifier: MPL-2.0

//! In-memory stand-ins for every `MediaBackend` seam

#![allow(dead_code)]

use relaycam::backends::MediaBackend;
use relaycam::backends::audio::{AudioChunk, AudioFormat, AudioInput};
use relaycam::backends::camera::{Frame, FrameSource, PixelFormat, SourceDescriptor};
use relaycam::backends::virtual_camera::VirtualOutput;
use relaycam::config::Config;
use relaycam::errors::{
    AudioError, BackendError, BackendResult, FrameReadError, MuxError, RecordingError,
};
use relaycam::pipelines::video::{MuxEngine, VideoWriter};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Knobs and counters shared between a test and its fakes
#[derive(Default)]
pub struct FakeState {
    pub frame_size: Mutex<(u32, u32)>,
    pub fail_source_open: AtomicBool,
    pub fail_reads: AtomicBool,
    pub frames_read: AtomicUsize,
    pub sources_closed: AtomicUsize,

    pub fail_virtual_open: AtomicBool,
    pub virtual_opened: AtomicUsize,
    pub virtual_frames: AtomicUsize,
    pub virtual_closed: AtomicUsize,

    pub writer_frames: AtomicUsize,
    /// End of the last written frame on the video timeline
    pub writer_end: Mutex<Duration>,
    pub fail_writer_finish: AtomicBool,

    pub fail_audio_open: AtomicBool,
    pub audio_reads: AtomicUsize,

    pub fail_mux: AtomicBool,
    pub mux_delay_ms: AtomicUsize,
    pub mux_runs: AtomicUsize,
}

impl FakeState {
    pub fn new(width: u32, height: u32) -> Arc<Self> {
        let state = Self::default();
        *state.frame_size.lock().unwrap() = (width, height);
        Arc::new(state)
    }

    pub fn set_frame_size(&self, width: u32, height: u32) {
        *self.frame_size.lock().unwrap() = (width, height);
    }

    fn frame_size(&self) -> (u32, u32) {
        *self.frame_size.lock().unwrap()
    }
}

/// Size of the data chunk of the first WAV file found in `bytes`
pub fn wav_data_size(bytes: &[u8]) -> Option<u32> {
    let riff = bytes.windows(4).position(|w| w == b"RIFF")?;
    let data = riff + bytes[riff..].windows(4).position(|w| w == b"data")?;
    let size = bytes.get(data + 4..data + 8)?;
    Some(u32::from_le_bytes(size.try_into().ok()?))
}

/// Config tuned for fast tests
pub fn test_config() -> Config {
    Config {
        target_fps: 200,
        qr_scan_enabled: false,
        ..Config::default()
    }
}

pub struct FakeBackend {
    pub state: Arc<FakeState>,
}

impl FakeBackend {
    pub fn new(state: &Arc<FakeState>) -> Self {
        Self {
            state: Arc::clone(state),
        }
    }
}

impl MediaBackend for FakeBackend {
    fn open_source(
        &self,
        source: &SourceDescriptor,
        _fps: u32,
    ) -> BackendResult<Box<dyn FrameSource>> {
        if self.state.fail_source_open.load(Ordering::SeqCst) {
            return Err(BackendError::InitializationFailed(format!(
                "cannot reach {}",
                source
            )));
        }
        Ok(Box::new(FakeSource {
            state: Arc::clone(&self.state),
            description: source.to_string(),
        }))
    }

    fn open_virtual_output(
        &self,
        _width: u32,
        _height: u32,
        _fps: u32,
    ) -> BackendResult<Box<dyn VirtualOutput>> {
        if self.state.fail_virtual_open.load(Ordering::SeqCst) {
            return Err(BackendError::InitializationFailed(
                "no virtual camera sink".to_string(),
            ));
        }
        self.state.virtual_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeVirtualOutput {
            state: Arc::clone(&self.state),
            closed: false,
        }))
    }

    fn open_video_writer(
        &self,
        path: &Path,
        _width: u32,
        _height: u32,
        _fps: u32,
    ) -> Result<Box<dyn VideoWriter>, RecordingError> {
        Ok(Box::new(FakeVideoWriter {
            state: Arc::clone(&self.state),
            path: path.to_path_buf(),
            frames: 0,
        }))
    }

    fn open_audio_input(&self, format: AudioFormat) -> Result<Box<dyn AudioInput>, AudioError> {
        if self.state.fail_audio_open.load(Ordering::SeqCst) {
            return Err(AudioError::DeviceUnavailable("no microphone".to_string()));
        }
        Ok(Box::new(FakeAudioInput::new(format, &self.state)))
    }

    fn mux_engine(&self) -> Arc<dyn MuxEngine> {
        Arc::new(FakeMuxEngine {
            state: Arc::clone(&self.state),
        })
    }
}

pub struct FakeSource {
    state: Arc<FakeState>,
    description: String,
}

impl FrameSource for FakeSource {
    fn read_frame(&mut self) -> Result<Frame, FrameReadError> {
        if self.state.fail_reads.load(Ordering::SeqCst) {
            return Err(FrameReadError::Timeout);
        }
        self.state.frames_read.fetch_add(1, Ordering::SeqCst);
        let (width, height) = self.state.frame_size();
        Ok(Frame::new(
            width,
            height,
            PixelFormat::RGBA,
            vec![128u8; (width * height * 4) as usize],
        ))
    }

    fn frame_size(&self) -> (u32, u32) {
        self.state.frame_size()
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn close(&mut self) {
        self.state.sources_closed.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct FakeVirtualOutput {
    state: Arc<FakeState>,
    closed: bool,
}

impl VirtualOutput for FakeVirtualOutput {
    fn push_bgr(&mut self, _data: &[u8]) -> BackendResult<()> {
        if self.closed {
            return Err(BackendError::NotRunning);
        }
        self.state.virtual_frames.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.state.virtual_closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Writes one line per frame so tests can count them in the file
pub struct FakeVideoWriter {
    state: Arc<FakeState>,
    path: std::path::PathBuf,
    frames: usize,
}

impl VideoWriter for FakeVideoWriter {
    fn write(&mut self, _frame: &Frame, pts: Duration, duration: Duration) -> BackendResult<()> {
        self.frames += 1;
        self.state.writer_frames.fetch_add(1, Ordering::SeqCst);
        *self.state.writer_end.lock().unwrap() = pts + duration;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), RecordingError> {
        if self.state.fail_writer_finish.load(Ordering::SeqCst) {
            return Err(RecordingError::FinalizeFailed("EOS never arrived".to_string()));
        }
        std::fs::write(&self.path, "frame\n".repeat(self.frames))?;
        Ok(())
    }
}

/// Produces silent chunks, each after a short delay
pub struct FakeAudioInput {
    format: AudioFormat,
    state: Arc<FakeState>,
}

impl FakeAudioInput {
    pub fn new(format: AudioFormat, state: &Arc<FakeState>) -> Self {
        Self {
            format,
            state: Arc::clone(state),
        }
    }
}

impl AudioInput for FakeAudioInput {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn read_chunk(&mut self, _timeout: Duration) -> Result<Option<AudioChunk>, AudioError> {
        std::thread::sleep(Duration::from_millis(1));
        self.state.audio_reads.fetch_add(1, Ordering::SeqCst);
        Ok(Some(AudioChunk::new(vec![0; self.format.samples_per_chunk()])))
    }

    fn close(&mut self) {}
}

/// Concatenates both inputs into the output
pub struct FakeMuxEngine {
    pub state: Arc<FakeState>,
}

impl MuxEngine for FakeMuxEngine {
    fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), MuxError> {
        let delay = self.state.mux_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay as u64));
        }
        self.state.mux_runs.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_mux.load(Ordering::SeqCst) {
            return Err(MuxError::Engine("encoder crashed".to_string()));
        }
        let mut combined = std::fs::read(video)?;
        combined.extend(std::fs::read(audio)?);
        std::fs::write(output, combined)?;
        Ok(())
    }
}
