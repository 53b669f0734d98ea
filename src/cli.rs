// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Listing cameras and audio inputs
//! - Relaying a source to the virtual camera
//! - Recording video with audio
//! - Taking photos
//! - Printing the effective configuration

use relaycam::backends::audio::enumerate_audio_inputs;
use relaycam::backends::camera::enumerate_video_sources;
use relaycam::constants::{BitratePreset, format_bitrate, timing};
use relaycam::media::encoders::audio::available_aac_encoder;
use relaycam::media::encoders::enumerate_h264_encoders;
use relaycam::pipelines::photo::encode_jpeg;
use relaycam::{Config, GstBackend, SessionController, SessionEvent, SourceDescriptor};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::broadcast::{self, error::TryRecvError};

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Widths the preset table is printed for
const PRESET_TABLE_WIDTHS: [(u32, &str); 3] = [(640, "SD"), (1280, "HD"), (1920, "Full HD")];

/// List cameras, audio inputs, encoders and bitrate presets
pub fn list_devices(config: &Config) -> CliResult {
    gstreamer::init()?;

    let cameras = enumerate_video_sources();
    if cameras.is_empty() {
        println!("No cameras found (index 0 uses the system default source).");
    } else {
        println!("Available cameras:");
        println!();
        for (index, camera) in cameras.iter().enumerate() {
            println!("  [{}] {}", index, camera.name);
        }
    }
    println!();

    let inputs = enumerate_audio_inputs();
    if inputs.is_empty() {
        println!("No audio inputs found.");
    } else {
        println!("Audio inputs:");
        println!();
        for input in &inputs {
            println!("  {}", input.name);
        }
    }
    println!();

    let encoders = enumerate_h264_encoders();
    if encoders.is_empty() {
        println!("No H.264 encoder installed; recording is unavailable.");
    } else {
        println!("H.264 encoders (first is used):");
        println!();
        for encoder in &encoders {
            let kind = if encoder.is_hardware { "hardware" } else { "software" };
            println!("  {} ({}, {})", encoder.display_name, encoder.element_name, kind);
        }
    }
    match available_aac_encoder() {
        Some(name) => println!("AAC encoder: {}", name),
        None => println!("No AAC encoder installed; recordings cannot be muxed."),
    }
    println!();

    println!("Bitrate presets:");
    println!();
    for preset in BitratePreset::ALL {
        let rates: Vec<String> = PRESET_TABLE_WIDTHS
            .iter()
            .map(|(width, tier)| {
                format!("{} {}", tier, format_bitrate(preset.bitrate_kbps(*width)))
            })
            .collect();
        let marker = if preset == config.bitrate_preset { "*" } else { " " };
        println!("{} {:<7} {}", marker, preset.display_name(), rates.join(", "));
    }

    Ok(())
}

/// Relay `source` to the virtual camera until Ctrl+C
pub fn stream(config: Config, source: &str) -> CliResult {
    gstreamer::init()?;
    let stop_flag = install_ctrlc_handler()?;

    let virtual_enabled = config.virtual_camera_enabled;
    let mut session = SessionController::new(GstBackend::new(&config), config);
    let mut events = session.subscribe();
    session.start(SourceDescriptor::parse(source))?;
    print_events(&mut events);

    if virtual_enabled && session.virtual_camera_active() {
        println!("Virtual camera active.");
    }
    println!("Streaming... (press Ctrl+C to stop)");

    drive(&mut session, &stop_flag, None, |_| {
        print_events(&mut events);
        true
    });
    println!();

    session.stop()?;
    print_events(&mut events);
    Ok(())
}

/// Record `source` with microphone audio and wait for the final file
pub fn record(config: Config, source: &str, duration: Option<u64>) -> CliResult {
    gstreamer::init()?;
    let stop_flag = install_ctrlc_handler()?;

    let mut session = SessionController::new(GstBackend::new(&config), config);
    let mut events = session.subscribe();
    session.start(SourceDescriptor::parse(source))?;
    session.start_recording()?;
    print_events(&mut events);

    if let Some((width, height)) = session.session().frame_size {
        println!(
            "Recording {}x{} at {} bitrate",
            width,
            height,
            session.config().bitrate_preset.describe(width)
        );
    }
    match duration {
        Some(seconds) => println!("Recording for {} seconds (press Ctrl+C to stop early)", seconds),
        None => println!("Recording... (press Ctrl+C to stop)"),
    }

    let deadline = duration.map(|s| Instant::now() + Duration::from_secs(s));
    drive(&mut session, &stop_flag, deadline, |session| {
        if let Some((_, elapsed)) = session.recording_status() {
            let secs = elapsed.as_secs();
            print!("\rRecording: {:02}:{:02}", secs / 60, secs % 60);
            let _ = std::io::Write::flush(&mut std::io::stdout());
        }
        true
    });
    println!();

    let job_id = session.stop_recording()?;
    session.stop()?;

    let Some(job_id) = job_id else {
        return Err("Recording was not running".into());
    };
    println!("Saving recording...");
    if !session.wait_for_mux_jobs(Duration::from_secs(timing::MUX_TIMEOUT_SECS)) {
        return Err("Timed out waiting for the recording to be saved".into());
    }

    loop {
        match events.try_recv() {
            Ok(SessionEvent::MuxFinished { job_id: id, output }) if id == job_id => {
                println!("Video saved: {}", output.display());
                return Ok(());
            }
            Ok(SessionEvent::MuxFailed { job_id: id, error }) if id == job_id => {
                return Err(format!("Failed to save recording: {}", error).into());
            }
            Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => return Err("Recording result was not reported".into()),
        }
    }
}

/// Take a photo from `source`
pub fn take_photo(mut config: Config, source: &str, output: Option<PathBuf>) -> CliResult {
    gstreamer::init()?;

    // A single photo does not need the virtual camera or QR scanning
    config.virtual_camera_enabled = false;
    config.qr_scan_enabled = false;

    let mut session = SessionController::new(GstBackend::new(&config), config);
    session.start(SourceDescriptor::parse(source))?;
    println!("Capturing...");

    // Let exposure settle before using a frame
    let warmup = Instant::now() + Duration::from_millis(500);
    let timeout = Instant::now() + Duration::from_secs(timing::START_TIMEOUT_SECS);
    let never = AtomicBool::new(false);
    drive(&mut session, &never, Some(timeout), |session| {
        Instant::now() < warmup || session.latest_frame().is_none()
    });

    let result = match output {
        Some(path) if !path.is_dir() => {
            let frame = session
                .latest_frame()
                .ok_or("Failed to capture frame from source")?;
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::io::BufWriter::new(std::fs::File::create(&path)?);
            encode_jpeg(frame, file)?;
            Ok(path)
        }
        Some(dir) => {
            let frame = session
                .latest_frame()
                .ok_or("Failed to capture frame from source")?;
            relaycam::pipelines::photo::save_jpeg(frame, &dir)
        }
        None => session.capture_photo(),
    };
    session.stop()?;

    println!("Photo saved: {}", result?.display());
    Ok(())
}

/// Print the effective configuration
pub fn print_config(config: &Config) -> CliResult {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

fn install_ctrlc_handler() -> Result<Arc<AtomicBool>, ctrlc::Error> {
    let stop_flag = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop_flag);
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })?;
    Ok(stop_flag)
}

/// Run ticks until `stop_flag` is set, `deadline` passes or `after_tick`
/// returns `false`
fn drive(
    session: &mut SessionController<GstBackend>,
    stop_flag: &AtomicBool,
    deadline: Option<Instant>,
    mut after_tick: impl FnMut(&SessionController<GstBackend>) -> bool,
) {
    loop {
        let now = Instant::now();
        if stop_flag.load(Ordering::SeqCst) || deadline.is_some_and(|d| now >= d) {
            break;
        }
        if session.tick_due(now) {
            session.tick();
            if !after_tick(session) {
                break;
            }
        } else {
            let wait = session
                .next_tick()
                .map_or(timing::CLI_POLL_INTERVAL, |at| at.saturating_duration_since(now))
                .min(timing::CLI_POLL_INTERVAL);
            std::thread::sleep(wait);
        }
    }
}

fn print_events(events: &mut broadcast::Receiver<SessionEvent>) {
    loop {
        match events.try_recv() {
            Ok(event) => print_event(&event),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::StreamStarted {
            source,
            width,
            height,
        } => println!("Using source: {} ({}x{})", source, width, height),
        SessionEvent::VirtualCameraUnavailable(reason) => {
            println!("Virtual camera unavailable: {}", reason)
        }
        SessionEvent::RecordingStarted { output } => println!("Output: {}", output.display()),
        SessionEvent::QrDetected(payloads) => {
            for payload in payloads {
                println!("\rQR code: {}", payload);
            }
        }
        SessionEvent::MuxFinished { output, .. } => println!("Video saved: {}", output.display()),
        SessionEvent::MuxFailed { error, .. } => println!("Failed to save recording: {}", error),
        SessionEvent::PhotoSaved(path) => println!("Photo saved: {}", path.display()),
        SessionEvent::StreamStopped | SessionEvent::RecordingStopped { .. } => {}
    }
}
