// SPDX-License-Identifier: MPL-2.0

//! Integration tests for the session controller

mod common;

use common::{FakeBackend, FakeState, test_config, wav_data_size};
use relaycam::Config;
use relaycam::errors::{PhotoError, SessionError};
use relaycam::storage::StorageDirs;
use relaycam::{SessionController, SessionEvent, SessionState, SourceDescriptor};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::sync::broadcast;

fn controller(state: &Arc<FakeState>, root: &TempDir) -> SessionController<FakeBackend> {
    controller_with(state, root, test_config())
}

fn controller_with(
    state: &Arc<FakeState>,
    root: &TempDir,
    config: Config,
) -> SessionController<FakeBackend> {
    SessionController::with_storage(
        FakeBackend::new(state),
        config,
        StorageDirs::under(root.path()),
    )
}

/// Tick `count` times, each when the schedule says it is due
fn run_paced_ticks(session: &mut SessionController<FakeBackend>, count: usize) {
    for _ in 0..count {
        while !session.tick_due(Instant::now()) {
            std::thread::sleep(Duration::from_millis(1));
        }
        session.tick();
    }
}

fn drain(events: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

fn temp_entries(root: &TempDir) -> usize {
    std::fs::read_dir(root.path().join("tmp"))
        .map(|dir| dir.count())
        .unwrap_or(0)
}

#[test]
fn start_opens_source_and_virtual_camera() {
    let state = FakeState::new(64, 48);
    let root = TempDir::new().unwrap();
    let mut session = controller(&state, &root);
    let mut events = session.subscribe();

    session.start(SourceDescriptor::default()).unwrap();

    assert_eq!(session.state(), SessionState::Streaming);
    assert_eq!(session.session().frame_size, Some((64, 48)));
    assert!(session.virtual_camera_active());
    assert_eq!(state.virtual_opened.load(Ordering::SeqCst), 1);
    assert!(session.next_tick().is_some());
    assert_eq!(
        drain(&mut events),
        vec![SessionEvent::StreamStarted {
            source: "default camera".to_string(),
            width: 64,
            height: 48,
        }]
    );
}

#[test]
fn unreachable_source_leaves_session_idle() {
    let state = FakeState::new(64, 48);
    state.fail_source_open.store(true, Ordering::SeqCst);
    let root = TempDir::new().unwrap();
    let mut session = controller(&state, &root);

    let err = session
        .start(SourceDescriptor::parse("rtsp://203.0.113.1/stream"))
        .unwrap_err();

    assert!(matches!(err, SessionError::SourceUnavailable { .. }));
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.session().frame_size, None);
    assert_eq!(state.virtual_opened.load(Ordering::SeqCst), 0);
    assert!(session.next_tick().is_none());
}

#[test]
fn start_twice_is_rejected() {
    let state = FakeState::new(64, 48);
    let root = TempDir::new().unwrap();
    let mut session = controller(&state, &root);

    session.start(SourceDescriptor::default()).unwrap();
    let err = session.start(SourceDescriptor::Camera(1)).unwrap_err();
    assert!(matches!(err, SessionError::AlreadyStreaming));
    assert_eq!(session.state(), SessionState::Streaming);
}

#[test]
fn stream_continues_without_virtual_camera() {
    let state = FakeState::new(64, 48);
    state.fail_virtual_open.store(true, Ordering::SeqCst);
    let root = TempDir::new().unwrap();
    let mut session = controller(&state, &root);
    let mut events = session.subscribe();

    session.start(SourceDescriptor::default()).unwrap();
    session.tick();

    assert_eq!(session.state(), SessionState::Streaming);
    assert!(!session.virtual_camera_active());
    assert!(session.latest_frame().is_some());
    assert!(
        drain(&mut events)
            .iter()
            .any(|e| matches!(e, SessionEvent::VirtualCameraUnavailable(_)))
    );
}

#[test]
fn disabled_virtual_camera_is_never_opened() {
    let state = FakeState::new(64, 48);
    let root = TempDir::new().unwrap();
    let mut config = test_config();
    config.virtual_camera_enabled = false;
    let mut session = SessionController::with_storage(
        FakeBackend::new(&state),
        config,
        StorageDirs::under(root.path()),
    );

    session.start(SourceDescriptor::default()).unwrap();
    assert_eq!(state.virtual_opened.load(Ordering::SeqCst), 0);
}

#[test]
fn ticks_forward_frames_to_virtual_camera() {
    let state = FakeState::new(64, 48);
    let root = TempDir::new().unwrap();
    let mut session = controller(&state, &root);
    session.start(SourceDescriptor::default()).unwrap();

    for _ in 0..5 {
        session.tick();
    }

    assert_eq!(state.frames_read.load(Ordering::SeqCst), 5);
    assert_eq!(state.virtual_frames.load(Ordering::SeqCst), 5);
    assert_eq!(session.latest_frame().map(|f| f.size()), Some((64, 48)));
}

#[test]
fn failed_read_skips_tick() {
    let state = FakeState::new(64, 48);
    let root = TempDir::new().unwrap();
    let mut session = controller(&state, &root);
    session.start(SourceDescriptor::default()).unwrap();

    state.fail_reads.store(true, Ordering::SeqCst);
    session.tick();

    assert_eq!(session.state(), SessionState::Streaming);
    assert!(session.latest_frame().is_none());
    assert_eq!(state.virtual_frames.load(Ordering::SeqCst), 0);

    state.fail_reads.store(false, Ordering::SeqCst);
    session.tick();
    assert!(session.latest_frame().is_some());
}

#[test]
fn tick_schedule_follows_target_fps() {
    let state = FakeState::new(64, 48);
    let root = TempDir::new().unwrap();
    let mut session = controller(&state, &root);
    assert_eq!(session.tick_interval(), Duration::from_millis(5));
    assert!(!session.tick_due(Instant::now()));

    session.start(SourceDescriptor::default()).unwrap();
    assert!(session.tick_due(Instant::now()));

    let before = Instant::now();
    session.tick();
    let next = session.next_tick().unwrap();
    assert!(next > before);
    assert!(!session.tick_due(before));

    session.stop().unwrap();
    assert!(session.next_tick().is_none());
}

#[test]
fn stop_is_idempotent() {
    let state = FakeState::new(64, 48);
    let root = TempDir::new().unwrap();
    let mut session = controller(&state, &root);

    // From idle
    session.stop().unwrap();
    assert_eq!(session.state(), SessionState::Idle);

    session.start(SourceDescriptor::default()).unwrap();
    session.tick();
    session.stop().unwrap();
    let first = session.session().clone();
    session.stop().unwrap();

    assert_eq!(session.session(), &first);
    assert_eq!(first.state, SessionState::Idle);
    assert_eq!(first.frame_size, None);
    assert!(session.latest_frame().is_none());
    assert_eq!(state.sources_closed.load(Ordering::SeqCst), 1);
    assert_eq!(state.virtual_closed.load(Ordering::SeqCst), 1);
}

#[test]
fn recording_requires_stream() {
    let state = FakeState::new(64, 48);
    let root = TempDir::new().unwrap();
    let mut session = controller(&state, &root);

    assert!(matches!(
        session.start_recording(),
        Err(SessionError::NotStreaming)
    ));

    session.start(SourceDescriptor::default()).unwrap();
    session.start_recording().unwrap();
    assert!(matches!(
        session.start_recording(),
        Err(SessionError::AlreadyRecording)
    ));
    assert_eq!(session.state(), SessionState::Recording);
}

#[test]
fn stop_recording_without_recording_is_noop() {
    let state = FakeState::new(64, 48);
    let root = TempDir::new().unwrap();
    let mut session = controller(&state, &root);

    assert_eq!(session.stop_recording().unwrap(), None);
    session.start(SourceDescriptor::default()).unwrap();
    assert_eq!(session.stop_recording().unwrap(), None);
    assert_eq!(session.state(), SessionState::Streaming);
}

#[test]
fn record_scenario_produces_muxed_file() {
    const TICKS: usize = 15;
    let state = FakeState::new(64, 48);
    let root = TempDir::new().unwrap();
    let config = Config {
        target_fps: 30,
        ..test_config()
    };
    let mut session = controller_with(&state, &root, config);
    let mut events = session.subscribe();

    session.start(SourceDescriptor::default()).unwrap();
    session.start_recording().unwrap();
    run_paced_ticks(&mut session, TICKS);
    let job_id = session.stop_recording().unwrap().expect("mux job submitted");
    assert_eq!(session.state(), SessionState::Streaming);
    session.stop().unwrap();

    assert!(session.wait_for_mux_jobs(Duration::from_secs(10)));
    assert_eq!(session.pending_mux_jobs(), 0);
    assert_eq!(state.writer_frames.load(Ordering::SeqCst), TICKS);

    let events = drain(&mut events);
    let output = events
        .iter()
        .find_map(|e| match e {
            SessionEvent::MuxFinished { job_id: id, output } if *id == job_id => {
                Some(output.clone())
            }
            _ => None,
        })
        .expect("mux finished event");

    assert!(output.starts_with(root.path().join("videos")));
    let name = output.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("VID_") && name.ends_with(".mp4"));

    // Fake engine concatenates video ("frame\n" per frame) and WAV
    let bytes = std::fs::read(&output).unwrap();
    let text_frames = bytes.windows(6).filter(|w| *w == b"frame\n").count();
    assert_eq!(text_frames, TICKS);

    // At least one 1024-sample chunk of audio per recorded frame
    let data_bytes = wav_data_size(&bytes).expect("WAV data chunk in output") as usize;
    assert_eq!(data_bytes % (1024 * 2), 0);
    assert!(
        data_bytes / 2 >= TICKS * 1024,
        "only {} samples for {} frames",
        data_bytes / 2,
        TICKS
    );

    // Temp files removed after the successful mux
    assert_eq!(temp_entries(&root), 0);
}

#[test]
fn video_timeline_tracks_wall_clock_below_recording_rate() {
    const TICKS: usize = 15;
    let state = FakeState::new(64, 48);
    let root = TempDir::new().unwrap();
    let config = Config {
        target_fps: 15,
        ..test_config()
    };
    assert_ne!(config.target_fps, config.recording_fps);
    let mut session = controller_with(&state, &root, config);

    session.start(SourceDescriptor::default()).unwrap();
    let started = Instant::now();
    session.start_recording().unwrap();
    run_paced_ticks(&mut session, TICKS);
    let elapsed = started.elapsed();
    session.stop_recording().unwrap();

    // Every tick is recorded once, but spaced by its capture time
    assert_eq!(state.writer_frames.load(Ordering::SeqCst), TICKS);
    let video = *state.writer_end.lock().unwrap();
    let tick = session.tick_interval();
    let frame_period = Duration::from_secs(1) / session.config().recording_fps;
    assert!(
        video + tick >= elapsed,
        "video {:?} lags wall clock {:?}",
        video,
        elapsed
    );
    assert!(
        video <= elapsed + frame_period,
        "video {:?} runs past wall clock {:?}",
        video,
        elapsed
    );
    session.stop().unwrap();
    assert!(session.wait_for_mux_jobs(Duration::from_secs(10)));
}

#[test]
fn stopping_stream_while_recording_finishes_recording() {
    let state = FakeState::new(64, 48);
    let root = TempDir::new().unwrap();
    let mut session = controller(&state, &root);
    let mut events = session.subscribe();

    session.start(SourceDescriptor::default()).unwrap();
    session.start_recording().unwrap();
    session.tick();
    session.stop().unwrap();

    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.wait_for_mux_jobs(Duration::from_secs(10)));
    let events = drain(&mut events);
    assert!(
        events
            .iter()
            .any(|e| matches!(e, SessionEvent::RecordingStopped { .. }))
    );
    assert!(
        events
            .iter()
            .any(|e| matches!(e, SessionEvent::MuxFinished { .. }))
    );
    assert!(matches!(
        events.last(),
        Some(SessionEvent::MuxFinished { job_id: 1, .. })
    ));
}

#[test]
fn audio_failure_keeps_streaming_without_leftovers() {
    let state = FakeState::new(64, 48);
    state.fail_audio_open.store(true, Ordering::SeqCst);
    let root = TempDir::new().unwrap();
    let mut session = controller(&state, &root);

    session.start(SourceDescriptor::default()).unwrap();
    let err = session.start_recording().unwrap_err();

    assert!(matches!(err, SessionError::AudioDevice(_)));
    assert_eq!(session.state(), SessionState::Streaming);
    assert!(session.recording_status().is_none());
    assert_eq!(temp_entries(&root), 0);

    // Frames no longer go to a recorder
    session.tick();
    assert_eq!(state.writer_frames.load(Ordering::SeqCst), 0);
}

#[test]
fn failed_mux_keeps_temp_files_and_reports_event() {
    let state = FakeState::new(64, 48);
    state.fail_mux.store(true, Ordering::SeqCst);
    let root = TempDir::new().unwrap();
    let mut session = controller(&state, &root);
    let mut events = session.subscribe();

    session.start(SourceDescriptor::default()).unwrap();
    session.start_recording().unwrap();
    session.tick();
    session.tick();
    let job_id = session.stop_recording().unwrap().unwrap();
    assert!(session.wait_for_mux_jobs(Duration::from_secs(10)));

    assert!(drain(&mut events).iter().any(
        |e| matches!(e, SessionEvent::MuxFailed { job_id: id, .. } if *id == job_id)
    ));
    assert_eq!(temp_entries(&root), 1);

    // Session is still usable
    assert_eq!(session.state(), SessionState::Streaming);
    state.fail_mux.store(false, Ordering::SeqCst);
    session.start_recording().unwrap();
    session.tick();
    let second = session.stop_recording().unwrap().unwrap();
    assert_ne!(second, job_id);
}

#[test]
fn finalize_failure_preserves_temp_files() {
    let state = FakeState::new(64, 48);
    state.fail_writer_finish.store(true, Ordering::SeqCst);
    let root = TempDir::new().unwrap();
    let mut session = controller(&state, &root);

    session.start(SourceDescriptor::default()).unwrap();
    session.start_recording().unwrap();
    session.tick();
    let err = session.stop_recording().unwrap_err();

    assert!(matches!(err, SessionError::Recording(_)));
    assert_eq!(session.state(), SessionState::Streaming);
    assert_eq!(session.pending_mux_jobs(), 0);
    assert_eq!(temp_entries(&root), 1);
}

#[test]
fn recording_without_frames_leaves_nothing_behind() {
    let state = FakeState::new(64, 48);
    let root = TempDir::new().unwrap();
    let mut session = controller(&state, &root);

    session.start(SourceDescriptor::default()).unwrap();
    session.start_recording().unwrap();
    assert!(session.stop_recording().is_err());

    assert_eq!(session.state(), SessionState::Streaming);
    assert_eq!(session.pending_mux_jobs(), 0);
    assert_eq!(temp_entries(&root), 0);
}

#[test]
fn frames_of_other_size_are_not_recorded() {
    let state = FakeState::new(64, 48);
    let root = TempDir::new().unwrap();
    let mut session = controller(&state, &root);

    session.start(SourceDescriptor::default()).unwrap();
    session.start_recording().unwrap();
    session.tick();
    state.set_frame_size(32, 24);
    session.tick();
    session.tick();

    assert_eq!(state.writer_frames.load(Ordering::SeqCst), 1);
    assert_eq!(session.latest_frame().map(|f| f.size()), Some((32, 24)));
}

#[test]
fn photo_requires_a_frame() {
    let state = FakeState::new(64, 48);
    let root = TempDir::new().unwrap();
    let mut session = controller(&state, &root);

    assert!(matches!(
        session.capture_photo(),
        Err(PhotoError::NoFrameAvailable)
    ));

    session.start(SourceDescriptor::default()).unwrap();
    assert!(matches!(
        session.capture_photo(),
        Err(PhotoError::NoFrameAvailable)
    ));

    session.tick();
    let first = session.capture_photo().unwrap();
    let second = session.capture_photo().unwrap();

    assert_ne!(first, second);
    assert!(first.starts_with(root.path().join("photos")));
    let image = image::open(&first).unwrap();
    assert_eq!((image.width(), image.height()), (64, 48));
}

#[test]
fn recording_is_only_reachable_while_streaming() {
    let state = FakeState::new(64, 48);
    let root = TempDir::new().unwrap();
    let mut session = controller(&state, &root);

    // Deterministic pseudo-random sequence of operations
    let mut seed: u32 = 0x2545_f491;
    for _ in 0..60 {
        seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        match (seed >> 16) % 5 {
            0 => {
                let _ = session.start(SourceDescriptor::default());
            }
            1 => {
                let _ = session.stop();
            }
            2 => {
                let _ = session.start_recording();
            }
            3 => {
                let _ = session.stop_recording();
            }
            _ => session.tick(),
        }
        let current = session.session();
        if current.state.is_recording() {
            assert!(current.state.is_streaming());
            assert!(current.frame_size.is_some());
        }
        if current.state == SessionState::Idle {
            assert!(current.frame_size.is_none());
            assert!(session.recording_status().is_none());
        }
    }

    session.stop().unwrap();
    assert!(session.wait_for_mux_jobs(Duration::from_secs(10)));
}
