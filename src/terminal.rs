// SPDX-License-Identifier: GPL-3.0-only

//! Terminal user interface
//!
//! Renders the session preview to the terminal using Unicode half-block
//! characters for improved vertical resolution, with a one-line status bar.

use crate::app::frame_processor::QrAction;
use crate::app::{SessionController, SessionEvent, SessionState};
use crate::backends::camera::{Frame, SourceDescriptor};
use crate::backends::{GstBackend, MediaBackend};
use crate::config::Config;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal, backend::CrosstermBackend, buffer::Buffer, layout::Rect, style::Color,
    widgets::Widget,
};
use std::io::{self, stdout};
use std::time::{Duration, Instant};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{error, info};

/// Longest the UI waits for input before redrawing
const INPUT_POLL: Duration = Duration::from_millis(16);

/// Run the terminal UI, starting a stream from `source`
pub fn run(config: Config, source: &str) -> Result<(), Box<dyn std::error::Error>> {
    gstreamer::init()?;

    let source = SourceDescriptor::parse(source);
    let session = SessionController::new(GstBackend::new(&config), config);

    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let mut app = TerminalApp::new(session, source);
    let result = app.run(&mut terminal);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    app.shutdown();
    result
}

struct TerminalApp<B: MediaBackend> {
    session: SessionController<B>,
    events: broadcast::Receiver<SessionEvent>,
    source: SourceDescriptor,
    show_help: bool,
    message: Option<String>,
    last_qr: Option<QrAction>,
}

impl<B: MediaBackend> TerminalApp<B> {
    fn new(session: SessionController<B>, source: SourceDescriptor) -> Self {
        let events = session.subscribe();
        Self {
            session,
            events,
            source,
            show_help: false,
            message: None,
            last_qr: None,
        }
    }

    fn run(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.toggle_stream();

        loop {
            if self.session.tick_due(Instant::now()) {
                self.session.tick();
            }
            self.drain_events();

            terminal.draw(|f| {
                let area = f.area();

                // Reserve bottom line for status
                let preview_area = Rect {
                    x: area.x,
                    y: area.y,
                    width: area.width,
                    height: area.height.saturating_sub(1),
                };
                f.render_widget(
                    FrameWidget {
                        frame: self.session.latest_frame(),
                        idle: !self.session.state().is_streaming(),
                    },
                    preview_area,
                );

                let status_area = Rect {
                    x: area.x,
                    y: area.height.saturating_sub(1),
                    width: area.width,
                    height: 1,
                };
                let status = self.status_line();
                f.render_widget(
                    StatusBar {
                        message: &status,
                        recording: self.session.state().is_recording(),
                    },
                    status_area,
                );
            })?;

            // Wait for input, but never past the next tick
            let timeout = self
                .session
                .next_tick()
                .map_or(INPUT_POLL, |at| at.saturating_duration_since(Instant::now()))
                .min(INPUT_POLL);
            if event::poll(timeout)?
                && let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
            {
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL)
                {
                    break;
                }
                match key.code {
                    KeyCode::Char('q') => break,
                    KeyCode::Char('s') => self.toggle_stream(),
                    KeyCode::Char('r') => self.toggle_recording(),
                    KeyCode::Char('p') => self.take_photo(),
                    KeyCode::Char('o') => self.open_qr(),
                    KeyCode::Char('h') => self.show_help = !self.show_help,
                    _ => {}
                }
            }
        }

        Ok(())
    }

    fn toggle_stream(&mut self) {
        self.show_help = false;
        if self.session.state().is_streaming() {
            if let Err(e) = self.session.stop() {
                error!(error = %e, "Failed to stop stream");
                self.message = Some(format!("Error: {}", e));
            }
            return;
        }
        match self.session.start(self.source.clone()) {
            Ok(()) => info!(source = %self.source, "Stream started from terminal"),
            Err(e) => {
                error!(error = %e, "Failed to start stream");
                self.message = Some(format!("Error: {}", e));
            }
        }
    }

    fn toggle_recording(&mut self) {
        self.show_help = false;
        let result = match self.session.state() {
            SessionState::Recording => self.session.stop_recording().map(|_| ()),
            _ => self.session.start_recording(),
        };
        if let Err(e) = result {
            error!(error = %e, "Recording toggle failed");
            self.message = Some(format!("Error: {}", e));
        }
    }

    fn take_photo(&mut self) {
        self.show_help = false;
        if let Err(e) = self.session.capture_photo() {
            error!(error = %e, "Failed to save photo");
            self.message = Some(format!("Error: {}", e));
        }
    }

    fn open_qr(&mut self) {
        let Some(uri) = self.last_qr.as_ref().and_then(QrAction::openable_uri) else {
            self.message = Some("No QR link to open".to_string());
            return;
        };
        match open::that_detached(&uri) {
            Ok(()) => self.message = Some(format!("Opened: {}", uri)),
            Err(e) => {
                error!(error = %e, uri = %uri, "Failed to open QR link");
                self.message = Some(format!("Error: {}", e));
            }
        }
    }

    fn drain_events(&mut self) {
        loop {
            let event = match self.events.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            };
            match event {
                SessionEvent::StreamStarted { source, width, height } => {
                    self.message = Some(format!("{} ({}x{})", source, width, height));
                }
                SessionEvent::StreamStopped => {
                    self.message = Some("Stream stopped".to_string());
                    self.last_qr = None;
                }
                SessionEvent::VirtualCameraUnavailable(reason) => {
                    self.message = Some(format!("No virtual camera: {}", reason));
                }
                SessionEvent::RecordingStarted { output } => {
                    self.message = Some(format!("Recording to {}", output.display()));
                }
                SessionEvent::RecordingStopped { .. } => {
                    self.message = Some("Saving recording...".to_string());
                }
                SessionEvent::QrDetected(payloads) => {
                    if let Some(payload) = payloads.first() {
                        let action = QrAction::classify(payload);
                        self.message = Some(format!("QR {}: {}", action.label(), payload));
                        self.last_qr = Some(action);
                    }
                }
                SessionEvent::MuxFinished { output, .. } => {
                    self.message = Some(format!("Saved: {}", output.display()));
                }
                SessionEvent::MuxFailed { error, .. } => {
                    self.message = Some(format!("Save failed: {}", error));
                }
                SessionEvent::PhotoSaved(path) => {
                    self.message = Some(format!("Saved: {}", path.display()));
                }
            }
        }
    }

    fn status_line(&self) -> String {
        if self.show_help {
            return build_help_message();
        }
        let mut line = self.session.state().label().to_string();
        if let Some((_, elapsed)) = self.session.recording_status() {
            let secs = elapsed.as_secs();
            line.push_str(&format!(" {:02}:{:02}", secs / 60, secs % 60));
        }
        if self.session.pending_mux_jobs() > 0 {
            line.push_str(&format!(" | saving {}", self.session.pending_mux_jobs()));
        }
        match &self.message {
            Some(message) => line.push_str(&format!(" | {}", message)),
            None => line.push_str(" | 'h' help | 'q' quit"),
        }
        line
    }

    fn shutdown(&mut self) {
        if let Err(e) = self.session.stop() {
            error!(error = %e, "Failed to stop session");
        }
        if self.session.pending_mux_jobs() > 0 {
            println!("Saving recording...");
            self.session.wait_for_mux_jobs(Duration::from_secs(
                crate::constants::timing::MUX_TIMEOUT_SECS,
            ));
            self.drain_events();
            if let Some(message) = &self.message {
                println!("{}", message);
            }
        }
    }
}

fn build_help_message() -> String {
    [
        "s: Start/stop stream",
        "r: Record",
        "p: Photo",
        "o: Open QR link",
        "h: Toggle help",
        "q/Ctrl+C: Quit",
    ]
    .join(" | ")
}

/// Widget that renders a frame using half-block characters
struct FrameWidget<'a> {
    frame: Option<&'a Frame>,
    idle: bool,
}

impl Widget for FrameWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(frame) = self.frame.filter(|f| f.width > 0 && f.height > 0) else {
            let msg = if self.idle {
                "Stream stopped - press 's' to start"
            } else {
                "Waiting for frames..."
            };
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, msg, ratatui::style::Style::default());
            }
            return;
        };

        // Each terminal cell displays 2 vertical pixels
        let frame_aspect = frame.width as f64 / frame.height as f64;
        let term_width = area.width as f64;
        let term_height = (area.height * 2) as f64;

        let (display_width, display_height) = if term_width / term_height > frame_aspect {
            // Terminal is wider - fit to height
            let h = term_height;
            let w = h * frame_aspect;
            (w as u16, (h / 2.0) as u16)
        } else {
            // Terminal is taller - fit to width
            let w = term_width;
            let h = w / frame_aspect;
            (w as u16, (h / 2.0) as u16)
        };
        if display_width == 0 || display_height == 0 {
            return;
        }

        // Center the image
        let x_offset = area.x + (area.width.saturating_sub(display_width)) / 2;
        let y_offset = area.y + (area.height.saturating_sub(display_height)) / 2;

        let x_scale = frame.width as f64 / display_width as f64;
        let y_scale = frame.height as f64 / (display_height * 2) as f64;

        // Upper half (▀) colored with fg, lower half with bg
        for ty in 0..display_height {
            for tx in 0..display_width {
                let term_x = x_offset + tx;
                let term_y = y_offset + ty;

                let src_x = (tx as f64 * x_scale) as u32;
                let src_y_top = (ty as f64 * 2.0 * y_scale) as u32;
                let src_y_bottom = ((ty as f64 * 2.0 + 1.0) * y_scale) as u32;

                if let Some(cell) = buf.cell_mut((term_x, term_y)) {
                    cell.set_char('▀');
                    cell.set_fg(sample_pixel(frame, src_x, src_y_top));
                    cell.set_bg(sample_pixel(frame, src_x, src_y_bottom));
                }
            }
        }
    }
}

fn sample_pixel(frame: &Frame, x: u32, y: u32) -> Color {
    let (r, g, b) = frame.pixel_rgb(x, y);
    Color::Rgb(r, g, b)
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
    recording: bool,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let bg = if self.recording {
            Color::Red
        } else {
            Color::DarkGray
        };

        // Fill background
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(bg);
            }
        }

        let text: String = self.message.chars().take(area.width as usize).collect();
        buf.set_string(
            area.x,
            area.y,
            text,
            ratatui::style::Style::default().fg(Color::White).bg(bg),
        );
    }
}
