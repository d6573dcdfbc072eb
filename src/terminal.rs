// SPDX-License-Identifier: GPL-3.0-only

//! Terminal-based barcode scanner
//!
//! Renders the camera feed to the terminal using Unicode half-block characters
//! for improved vertical resolution, with a product panel, an error line and
//! a status bar below it.

use crate::backends::camera::{
    CameraDevice, DeviceCatalog, DisplaySurface, FrameReceiver, GstCaptureBackend,
    GstDeviceCatalog, PreviewFrame,
};
use crate::config::{Settings, mask_token};
use crate::constants::{api, app_info, capture, scanning};
use crate::errors::CameraError;
use crate::scanner::{LookupClient, LookupOutcome, PresentationSink, ScanSession};

use chrono::{DateTime, Local};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::channel::mpsc;
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget, Wrap},
};
use std::collections::VecDeque;
use std::io::{self, stdout};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Run the terminal scanner
pub fn run(settings: &mut Settings) -> Result<(), Box<dyn std::error::Error>> {
    let cameras = GstDeviceCatalog::new().list_devices()?;
    info!(count = cameras.len(), "Found cameras");

    let client = LookupClient::from_config(&settings.config, settings.credential().clone())?;
    let runtime = tokio::runtime::Runtime::new()?;
    let session = ScanSession::new(
        Box::new(GstCaptureBackend::new()),
        client,
        runtime.handle().clone(),
    );
    let mut app = ScannerApp::new(settings, cameras, session);

    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let result = app.run(&mut terminal);
    app.stop();

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum InputMode {
    Normal,
    /// Token field being edited, holds the text typed so far
    EditToken(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Overlay {
    Help,
    About,
}

#[derive(Debug, Clone)]
struct HistoryEntry {
    time: DateTime<Local>,
    code: String,
    outcome: LookupOutcome,
}

/// Scanner output shown in the product panel and the error line
#[derive(Debug, Default)]
struct ScanPanel {
    status: Option<String>,
    error: Option<String>,
    product: Option<String>,
    /// Code of the last product with a name, target of the "open" key
    last_found: Option<String>,
    history: VecDeque<HistoryEntry>,
}

impl ScanPanel {
    fn clear_product(&mut self) {
        self.status = None;
        self.product = None;
        self.last_found = None;
    }
}

impl PresentationSink for ScanPanel {
    fn on_status(&mut self, message: &str) {
        self.status = Some(message.to_string());
    }

    fn on_error(&mut self, message: &str) {
        self.error = Some(message.to_string());
    }

    fn on_product_result(&mut self, code: &str, outcome: &LookupOutcome) {
        self.product = Some(outcome.describe(code));
        if matches!(outcome, LookupOutcome::Found(_)) {
            self.last_found = Some(code.to_string());
        }

        self.history.push_front(HistoryEntry {
            time: Local::now(),
            code: code.to_string(),
            outcome: outcome.clone(),
        });
        self.history.truncate(scanning::HISTORY_LEN);
    }
}

struct ScannerApp<'a> {
    settings: &'a mut Settings,
    cameras: Vec<CameraDevice>,
    camera_index: usize,
    session: ScanSession,
    frames: Option<FrameReceiver>,
    frame_widget: FrameWidget,
    panel: ScanPanel,
    input: InputMode,
    overlay: Option<Overlay>,
    quit: bool,
}

impl<'a> ScannerApp<'a> {
    fn new(settings: &'a mut Settings, cameras: Vec<CameraDevice>, session: ScanSession) -> Self {
        let camera_index = settings
            .config
            .last_camera
            .as_deref()
            .and_then(|handle| cameras.iter().position(|c| c.handle == handle))
            .unwrap_or(0);

        let mut panel = ScanPanel::default();
        if cameras.is_empty() {
            panel.error = Some(CameraError::NoCameraFound.to_string());
        }

        Self {
            settings,
            cameras,
            camera_index,
            session,
            frames: None,
            frame_widget: FrameWidget::new(),
            panel,
            input: InputMode::Normal,
            overlay: None,
            quit: false,
        }
    }

    fn run(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let mut last_poll = Instant::now();

        while !self.quit {
            // Drain all available frames to get the latest
            if let Some(receiver) = self.frames.as_mut() {
                while let Ok(frame) = receiver.try_recv() {
                    self.frame_widget.update_frame(frame);
                }
            }

            if last_poll.elapsed() >= scanning::POLL_INTERVAL {
                self.session.poll(&mut self.panel);
                last_poll = Instant::now();
            }

            terminal.draw(|f| self.draw(f))?;

            // Handle input with timeout for frame updates
            if event::poll(Duration::from_millis(16))?
                && let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
            {
                self.handle_key(key)?;
            }
        }

        Ok(())
    }

    fn current_camera(&self) -> Option<&CameraDevice> {
        self.cameras.get(self.camera_index)
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<(), Box<dyn std::error::Error>> {
        // Ctrl+C to quit, in every mode
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.quit = true;
            return Ok(());
        }

        if let InputMode::EditToken(buffer) = &mut self.input {
            match key.code {
                KeyCode::Enter => {
                    let token = buffer.trim().to_string();
                    self.commit_token(token);
                }
                KeyCode::Esc => self.input = InputMode::Normal,
                KeyCode::Backspace => {
                    buffer.pop();
                }
                KeyCode::Char(c) => buffer.push(c),
                _ => {}
            }
            return Ok(());
        }

        // Any key closes an overlay
        if self.overlay.take().is_some() && key.code != KeyCode::Char('q') {
            return Ok(());
        }

        match key.code {
            KeyCode::Enter | KeyCode::Char('s') => self.start()?,
            KeyCode::Char('x') => self.stop(),
            KeyCode::Char('c') => self.cycle_camera(),
            KeyCode::Char('t') => {
                self.input = InputMode::EditToken(self.settings.credential().get());
            }
            KeyCode::Char('o') => self.open_product_page(),
            KeyCode::Char('a') => self.overlay = Some(Overlay::About),
            KeyCode::Char('h') => self.overlay = Some(Overlay::Help),
            KeyCode::Char('q') => self.quit = true,
            _ => {}
        }

        Ok(())
    }

    /// Start scanning the selected camera
    ///
    /// Only a pipeline construction failure is returned, it ends the program.
    fn start(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if self.session.is_running() {
            return Ok(());
        }
        let Some(camera) = self.current_camera().cloned() else {
            self.panel.error = Some(CameraError::NoCameraFound.to_string());
            return Ok(());
        };

        self.panel.clear_product();
        self.frame_widget = FrameWidget::new();

        let (sender, receiver) = mpsc::channel(capture::MAX_BUFFERS as usize);
        if let Err(e) = self.session.start(&camera, DisplaySurface::Appsink(sender)) {
            error!(error = %e, "Failed to start scanning");
            if e.is_fatal() {
                return Err(e.into());
            }
            self.panel.error = Some(e.to_string());
            return Ok(());
        }

        if self.session.has_preview() {
            self.frames = Some(receiver);
        } else {
            self.frames = None;
            self.panel.status = Some("Preview not available, scanning continues".to_string());
        }
        self.settings.set_last_camera(&camera.handle);
        Ok(())
    }

    fn stop(&mut self) {
        self.session.stop();
        self.frames = None;
        self.frame_widget = FrameWidget::new();
        self.panel.error = None;
    }

    fn cycle_camera(&mut self) {
        if self.session.is_running() || self.cameras.len() < 2 {
            return;
        }
        self.camera_index = (self.camera_index + 1) % self.cameras.len();
        if let Some(camera) = self.current_camera() {
            info!(device = %camera, "Camera selected");
        }
    }

    fn commit_token(&mut self, token: String) {
        let message = if token.is_empty() {
            "API token cleared"
        } else {
            "API token updated"
        };
        self.settings.set_token(&token);
        self.panel.status = Some(message.to_string());
        self.input = InputMode::Normal;
    }

    fn open_product_page(&mut self) {
        let Some(code) = self.panel.last_found.as_deref() else {
            self.panel.status = Some("No product to open".to_string());
            return;
        };
        let url = api::product_page_url(code);
        if let Err(e) = open::that_detached(&url) {
            warn!(url = %url, error = %e, "Failed to open browser");
            self.panel.error = Some(format!("Failed to open {}: {}", url, e));
        }
    }

    fn status_message(&self) -> String {
        if matches!(self.input, InputMode::EditToken(_)) {
            return "Enter save | Esc cancel".to_string();
        }
        if self.cameras.is_empty() {
            return "No camera | 't' token | 'a' about | 'h' help | 'q' quit".to_string();
        }

        let mut msg = if self.session.is_running() {
            "'x' stop".to_string()
        } else {
            let mut msg = "Enter start".to_string();
            if self.cameras.len() > 1 {
                msg.push_str(" | 'c' switch camera");
            }
            msg
        };
        if self.panel.last_found.is_some() {
            msg.push_str(" | 'o' open product");
        }
        msg.push_str(" | 't' token | 'a' about | 'h' help | 'q' quit");
        msg
    }

    fn panel_lines(&self) -> Vec<Line<'_>> {
        let label = Style::default().add_modifier(Modifier::BOLD);
        let mut lines = Vec::new();

        let camera = match self.current_camera() {
            Some(camera) => format!(
                "{} [{}/{}]",
                camera.name,
                self.camera_index + 1,
                self.cameras.len()
            ),
            None => "none".to_string(),
        };
        lines.push(Line::from(vec![
            Span::styled("Camera:  ", label),
            Span::raw(camera),
        ]));

        let token = match &self.input {
            InputMode::EditToken(buffer) => format!("{}_", buffer),
            InputMode::Normal => mask_token(self.settings.credential().get().trim()),
        };
        lines.push(Line::from(vec![
            Span::styled("Token:   ", label),
            Span::raw(token),
        ]));

        lines.push(Line::from(vec![
            Span::styled("Product: ", label),
            Span::raw(self.panel.product.as_deref().unwrap_or("-")),
        ]));
        if let Some(status) = &self.panel.status {
            lines.push(Line::from(Span::styled(
                status.as_str(),
                Style::default().fg(Color::Yellow),
            )));
        }

        for entry in &self.panel.history {
            let color = match entry.outcome {
                LookupOutcome::Found(_) => Color::Green,
                LookupOutcome::NotFound | LookupOutcome::NoCredential => Color::Gray,
                LookupOutcome::InvalidCredential | LookupOutcome::TransportError(_) => Color::Red,
            };
            lines.push(Line::styled(
                format!(
                    "{} {}",
                    entry.time.format("%H:%M:%S"),
                    entry.outcome.describe(&entry.code)
                ),
                Style::default().fg(color),
            ));
        }

        lines
    }

    fn draw(&self, f: &mut Frame) {
        let area = f.area();
        let panel_height = (scanning::HISTORY_LEN as u16 + 6).min(area.height.saturating_sub(2));

        // Bottom line for status, one above it for errors, panel above that
        let preview_height = area.height.saturating_sub(panel_height + 2);
        let preview_area = Rect {
            x: area.x,
            y: area.y,
            width: area.width,
            height: preview_height,
        };
        let panel_area = Rect {
            x: area.x,
            y: area.y + preview_height,
            width: area.width,
            height: panel_height,
        };
        let error_area = Rect {
            x: area.x,
            y: area.y + area.height.saturating_sub(2),
            width: area.width,
            height: 1.min(area.height),
        };
        let status_area = Rect {
            x: area.x,
            y: area.y + area.height.saturating_sub(1),
            width: area.width,
            height: 1.min(area.height),
        };

        let placeholder = if self.cameras.is_empty() {
            "No camera found"
        } else if !self.session.is_running() {
            "Press Enter to start scanning"
        } else if self.session.has_preview() {
            "Waiting for camera..."
        } else {
            "Scanning without preview"
        };
        f.render_widget(
            FramePreview {
                widget: &self.frame_widget,
                placeholder,
            },
            preview_area,
        );

        let panel = Paragraph::new(self.panel_lines())
            .block(Block::default().borders(Borders::ALL).title(" Product "))
            .wrap(Wrap { trim: true });
        f.render_widget(panel, panel_area);

        if let Some(message) = &self.panel.error {
            f.render_widget(
                Paragraph::new(message.as_str()).style(Style::default().fg(Color::Red)),
                error_area,
            );
        }

        let status_message = self.status_message();
        f.render_widget(
            StatusBar {
                message: &status_message,
            },
            status_area,
        );

        if let Some(overlay) = self.overlay {
            let (title, text) = match overlay {
                Overlay::Help => (" Help ", help_text()),
                Overlay::About => (" About ", app_info::about_text()),
            };
            let popup = centered(preview_area, 70, 9);
            f.render_widget(Clear, popup);
            f.render_widget(
                Paragraph::new(text)
                    .block(Block::default().borders(Borders::ALL).title(title))
                    .wrap(Wrap { trim: false }),
                popup,
            );
        }
    }
}

fn help_text() -> String {
    [
        "Enter/s: Start scanning",
        "x: Stop scanning",
        "c: Switch camera (while stopped)",
        "t: Edit API token",
        "o: Open the last found product in the browser",
        "a: About | h: This help",
        "q/Ctrl+C: Quit",
    ]
    .join("\n")
}

/// Rectangle of at most `width` x `height` centered in `area`
fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

/// Widget that renders a camera frame using half-block characters
struct FrameWidget {
    frame: Option<PreviewFrame>,
}

impl FrameWidget {
    fn new() -> Self {
        Self { frame: None }
    }

    fn update_frame(&mut self, frame: PreviewFrame) {
        self.frame = Some(frame);
    }
}

/// Frame widget with the text shown while no frame is available
struct FramePreview<'a> {
    widget: &'a FrameWidget,
    placeholder: &'a str,
}

impl Widget for FramePreview<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(frame) = &self.widget.frame else {
            let msg = self.placeholder;
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, msg, Style::default());
            }
            return;
        };

        if frame.width == 0 || frame.height == 0 || area.width == 0 || area.height == 0 {
            return;
        }

        // Each terminal cell displays 2 vertical pixels using half-block characters
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

                if term_x >= area.x + area.width || term_y >= area.y + area.height {
                    continue;
                }

                let src_x = (tx as f64 * x_scale) as u32;
                let src_y_top = (ty as f64 * 2.0 * y_scale) as u32;
                let src_y_bottom = ((ty as f64 * 2.0 + 1.0) * y_scale) as u32;

                let (r, g, b) = frame.rgb_at(src_x, src_y_top);
                let top_color = Color::Rgb(r, g, b);
                let (r, g, b) = frame.rgb_at(src_x, src_y_bottom);
                let bottom_color = Color::Rgb(r, g, b);

                if let Some(cell) = buf.cell_mut((term_x, term_y)) {
                    cell.set_char('▀');
                    cell.set_fg(top_color);
                    cell.set_bg(bottom_color);
                }
            }
        }
    }
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Fill background
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(Color::DarkGray);
            }
        }

        let text: String = self.message.chars().take(area.width as usize).collect();
        buf.set_string(
            area.x,
            area.y,
            text,
            Style::default().fg(Color::White).bg(Color::DarkGray),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn solid_frame(width: u32, height: u32, rgb: (u8, u8, u8)) -> PreviewFrame {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..width * height {
            data.extend_from_slice(&[rgb.0, rgb.1, rgb.2, 255]);
        }
        PreviewFrame {
            width,
            height,
            stride: width * 4,
            data: Arc::from(data),
        }
    }

    #[test]
    fn test_panel_keeps_bounded_history() {
        let mut panel = ScanPanel::default();
        for i in 0..(scanning::HISTORY_LEN + 3) {
            panel.on_product_result(&format!("{:013}", i), &LookupOutcome::NotFound);
        }
        assert_eq!(panel.history.len(), scanning::HISTORY_LEN);
        // Newest first
        assert_eq!(
            panel.history[0].code,
            format!("{:013}", scanning::HISTORY_LEN + 2)
        );
    }

    #[test]
    fn test_panel_tracks_last_found_product() {
        let mut panel = ScanPanel::default();
        panel.on_product_result("4006381333931", &LookupOutcome::Found("Pen".into()));
        panel.on_product_result("036000291452", &LookupOutcome::NotFound);
        assert_eq!(panel.last_found.as_deref(), Some("4006381333931"));
        assert_eq!(
            panel.product.as_deref(),
            Some("EAN 036000291452: Product not found")
        );

        panel.on_error("Error: End of stream");
        panel.clear_product();
        assert_eq!(panel.product, None);
        assert_eq!(panel.last_found, None);
        // Errors are cleared on stop, not on start
        assert_eq!(panel.error.as_deref(), Some("Error: End of stream"));
        assert_eq!(panel.history.len(), 2);
    }

    #[test]
    fn test_frame_renders_half_blocks() {
        let widget = FrameWidget {
            frame: Some(solid_frame(4, 4, (10, 20, 30))),
        };
        let area = Rect::new(0, 0, 4, 2);
        let mut buf = Buffer::empty(area);
        FramePreview {
            widget: &widget,
            placeholder: "",
        }
        .render(area, &mut buf);

        let cell = &buf[(0, 0)];
        assert_eq!(cell.symbol(), "▀");
        assert_eq!(cell.fg, Color::Rgb(10, 20, 30));
        assert_eq!(cell.bg, Color::Rgb(10, 20, 30));
    }

    #[test]
    fn test_placeholder_without_frame() {
        let widget = FrameWidget::new();
        let area = Rect::new(0, 0, 20, 3);
        let mut buf = Buffer::empty(area);
        FramePreview {
            widget: &widget,
            placeholder: "No camera found",
        }
        .render(area, &mut buf);

        let row: String = (0..20).map(|x| buf[(x, 1)].symbol().to_string()).collect();
        assert!(row.contains("No camera found"));
    }

    #[test]
    fn test_centered_is_clamped() {
        let area = Rect::new(0, 0, 10, 4);
        assert_eq!(centered(area, 70, 9), area);
        assert_eq!(centered(area, 4, 2), Rect::new(3, 1, 4, 2));
    }
}
