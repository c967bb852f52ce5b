// SPDX-FileCopyrightText: 2026 Undine contributors
// SPDX-License-Identifier: MIT

//! Terminal UI.
//!
//! Interactive shell (ratatui + crossterm) around the application
//! controller: a Mermaid source editor, a preview status pane, a prompt
//! line for AI generation and a settings overlay for the credential.
//! Rendering and generation run on the async worker; this loop only drains
//! completion events and relays key input.

use std::collections::VecDeque;
use std::error::Error;
use std::io;
use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use tokio::sync::mpsc::UnboundedSender;

use crate::app::{AppController, CredentialMode, WorkEvent, WorkRequest};
use crate::model::NoticeKind;
use crate::render::RenderResult;

const FOCUS_COLOR: Color = Color::LightGreen;
const BLUR_COLOR: Color = Color::DarkGray;
const FOOTER_KEY_COLOR: Color = Color::Cyan;
const FOOTER_LABEL_COLOR: Color = Color::Gray;
const ERROR_COLOR: Color = Color::LightRed;
const SUCCESS_COLOR: Color = Color::LightGreen;

const TOAST_DURATION: Duration = Duration::from_secs(4);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Runs the interactive terminal UI until the user quits.
pub fn run(
    controller: AppController,
    requests: UnboundedSender<WorkRequest>,
    events: Receiver<WorkEvent>,
    preview_path: PathBuf,
) -> Result<(), Box<dyn Error>> {
    let mut terminal = TerminalSession::new()?;
    let mut app = App::new(controller, requests, events, preview_path);

    while !app.should_quit {
        app.tick(Instant::now());
        terminal.draw(|frame| draw(frame, &mut app))?;

        if event::poll(POLL_INTERVAL)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key);
                }
            }
        }
    }

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Editor,
    Prompt,
}

#[derive(Debug, Clone)]
struct Toast {
    message: String,
    kind: NoticeKind,
    expires_at: Instant,
}

struct App {
    controller: AppController,
    requests: UnboundedSender<WorkRequest>,
    events: Receiver<WorkEvent>,
    focus: Focus,
    lines: Vec<String>,
    cursor_row: usize,
    cursor_col: usize,
    editor_scroll: u16,
    synced_rev: u64,
    prompt: String,
    settings_input: String,
    settings_was_open: bool,
    toast: Option<Toast>,
    pending_toasts: VecDeque<(String, NoticeKind)>,
    preview_path: PathBuf,
    preview_bytes: Option<usize>,
    should_quit: bool,
}

impl App {
    fn new(
        controller: AppController,
        requests: UnboundedSender<WorkRequest>,
        events: Receiver<WorkEvent>,
        preview_path: PathBuf,
    ) -> Self {
        let lines = split_lines(controller.source());
        let synced_rev = controller.document_rev();
        Self {
            controller,
            requests,
            events,
            focus: Focus::Editor,
            lines,
            cursor_row: 0,
            cursor_col: 0,
            editor_scroll: 0,
            synced_rev,
            prompt: String::new(),
            settings_input: String::new(),
            settings_was_open: false,
            toast: None,
            pending_toasts: VecDeque::new(),
            preview_path,
            preview_bytes: None,
            should_quit: false,
        }
    }

    /// One loop tick: apply completions, schedule due work, surface notices.
    fn tick(&mut self, now: Instant) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                WorkEvent::RenderDone { seq, outcome } => {
                    if self.controller.finish_render(seq, outcome) {
                        self.export_preview();
                    }
                }
                WorkEvent::GenerationDone { seq, outcome } => {
                    self.controller.finish_generation(seq, outcome);
                }
            }
        }

        // Generation may have replaced the document out from under the
        // editor buffer.
        if self.controller.document_rev() != self.synced_rev {
            self.lines = split_lines(self.controller.source());
            self.synced_rev = self.controller.document_rev();
            self.cursor_row = 0;
            self.cursor_col = 0;
            self.editor_scroll = 0;
        }

        if let Some(ticket) = self.controller.take_due_render(now) {
            let seq = ticket.seq();
            let source = ticket.into_source();
            let _ = self.requests.send(WorkRequest::Render { seq, source });
        }

        for notice in self.controller.take_notices() {
            self.pending_toasts
                .push_back((format!("{}: {}", notice.title(), notice.body()), notice.kind()));
        }
        self.promote_toast(now);

        self.sync_settings();
    }

    /// Shows the next queued notice once the current toast has run out.
    fn promote_toast(&mut self, now: Instant) {
        if self.toast.as_ref().is_some_and(|toast| toast.expires_at > now) {
            return;
        }
        self.toast = self.pending_toasts.pop_front().map(|(message, kind)| Toast {
            message,
            kind,
            expires_at: now + TOAST_DURATION,
        });
    }

    /// The controller can open the settings surface itself (missing
    /// credential on submit); seed the input field when that happens.
    fn sync_settings(&mut self) {
        if self.controller.settings_open() && !self.settings_was_open {
            self.settings_input = self.controller.credential().unwrap_or_default().to_owned();
            self.settings_was_open = true;
        } else if !self.controller.settings_open() {
            self.settings_was_open = false;
        }
    }

    fn export_preview(&mut self) {
        let Some(svg) = self.controller.render_result().svg() else {
            self.preview_bytes = None;
            return;
        };
        match std::fs::write(&self.preview_path, svg) {
            Ok(()) => self.preview_bytes = Some(svg.len()),
            Err(err) => {
                tracing::error!(error = %err, path = ?self.preview_path, "preview export failed");
                self.preview_bytes = None;
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if self.controller.settings_open() {
            self.handle_settings_key(key);
            return;
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('q') => self.should_quit = true,
                KeyCode::Char('o') => self.controller.open_settings(),
                KeyCode::Char('s') => self.controller.save_to_library(),
                _ => {}
            }
            return;
        }

        if key.code == KeyCode::Tab {
            self.focus = match self.focus {
                Focus::Editor => Focus::Prompt,
                Focus::Prompt => Focus::Editor,
            };
            return;
        }

        match self.focus {
            Focus::Editor => self.handle_editor_key(key.code),
            Focus::Prompt => self.handle_prompt_key(key.code),
        }
    }

    fn handle_editor_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char(ch) => {
                insert_char(&mut self.lines, self.cursor_row, self.cursor_col, ch);
                self.cursor_col += 1;
                self.push_source();
            }
            KeyCode::Enter => {
                insert_newline(&mut self.lines, self.cursor_row, self.cursor_col);
                self.cursor_row += 1;
                self.cursor_col = 0;
                self.push_source();
            }
            KeyCode::Backspace => {
                if let Some((row, col)) =
                    delete_back(&mut self.lines, self.cursor_row, self.cursor_col)
                {
                    self.cursor_row = row;
                    self.cursor_col = col;
                    self.push_source();
                }
            }
            KeyCode::Up => {
                self.cursor_row = self.cursor_row.saturating_sub(1);
                self.clamp_cursor();
            }
            KeyCode::Down => {
                if self.cursor_row + 1 < self.lines.len() {
                    self.cursor_row += 1;
                }
                self.clamp_cursor();
            }
            KeyCode::Left => {
                if self.cursor_col > 0 {
                    self.cursor_col -= 1;
                } else if self.cursor_row > 0 {
                    self.cursor_row -= 1;
                    self.cursor_col = line_len(&self.lines, self.cursor_row);
                }
            }
            KeyCode::Right => {
                if self.cursor_col < line_len(&self.lines, self.cursor_row) {
                    self.cursor_col += 1;
                } else if self.cursor_row + 1 < self.lines.len() {
                    self.cursor_row += 1;
                    self.cursor_col = 0;
                }
            }
            _ => {}
        }
    }

    fn handle_prompt_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char(ch) => self.prompt.push(ch),
            KeyCode::Backspace => {
                self.prompt.pop();
            }
            KeyCode::Enter => self.submit_prompt(),
            _ => {}
        }
    }

    fn submit_prompt(&mut self) {
        let Some(request) = self.controller.submit_prompt(&self.prompt) else {
            return;
        };
        self.prompt.clear();
        let credential = self.controller.credential().map(str::to_owned);
        let _ = self.requests.send(WorkRequest::Generate {
            seq: request.seq,
            prompt: request.prompt,
            credential,
        });
    }

    fn handle_settings_key(&mut self, key: KeyEvent) {
        if self.controller.credential_mode() == CredentialMode::Relay {
            // The panel is informational; any dismissing key closes it.
            if matches!(key.code, KeyCode::Esc | KeyCode::Enter) {
                self.controller.close_settings();
            }
            return;
        }

        match key.code {
            KeyCode::Esc => self.controller.close_settings(),
            KeyCode::Enter => {
                let value = self.settings_input.clone();
                self.controller.save_credential(&value);
            }
            KeyCode::Backspace => {
                self.settings_input.pop();
            }
            KeyCode::Char(ch) => self.settings_input.push(ch),
            _ => {}
        }
    }

    fn push_source(&mut self) {
        self.controller.edit_source(self.lines.join("\n"));
        self.synced_rev = self.controller.document_rev();
    }

    fn clamp_cursor(&mut self) {
        self.cursor_col = self.cursor_col.min(line_len(&self.lines, self.cursor_row));
    }

    fn scroll_to_cursor(&mut self, viewport_height: usize) {
        if viewport_height == 0 {
            return;
        }
        let top = self.editor_scroll as usize;
        if self.cursor_row < top {
            self.editor_scroll = self.cursor_row as u16;
        } else if self.cursor_row >= top + viewport_height {
            self.editor_scroll = (self.cursor_row + 1 - viewport_height) as u16;
        }
    }
}

fn split_lines(source: &str) -> Vec<String> {
    let mut lines: Vec<String> = source.split('\n').map(str::to_owned).collect();
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

fn line_len(lines: &[String], row: usize) -> usize {
    lines.get(row).map(|line| line.chars().count()).unwrap_or(0)
}

fn byte_index(line: &str, col: usize) -> usize {
    line.char_indices().nth(col).map(|(idx, _)| idx).unwrap_or(line.len())
}

fn insert_char(lines: &mut [String], row: usize, col: usize, ch: char) {
    if let Some(line) = lines.get_mut(row) {
        let idx = byte_index(line, col);
        line.insert(idx, ch);
    }
}

fn insert_newline(lines: &mut Vec<String>, row: usize, col: usize) {
    if row >= lines.len() {
        lines.push(String::new());
        return;
    }
    let idx = byte_index(&lines[row], col);
    let rest = lines[row].split_off(idx);
    lines.insert(row + 1, rest);
}

/// Deletes the character before the cursor, joining lines at column zero.
/// Returns the new cursor position, or `None` when nothing was deleted.
fn delete_back(lines: &mut Vec<String>, row: usize, col: usize) -> Option<(usize, usize)> {
    if col > 0 {
        let line = lines.get_mut(row)?;
        let idx = byte_index(line, col - 1);
        line.remove(idx);
        return Some((row, col - 1));
    }
    if row == 0 {
        return None;
    }
    let current = lines.remove(row);
    let new_col = line_len(lines, row - 1);
    lines[row - 1].push_str(&current);
    Some((row - 1, new_col))
}

fn draw(frame: &mut Frame<'_>, app: &mut App) {
    let area = frame.size();

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3), Constraint::Length(1)])
        .split(area);
    let main_area = layout[0];
    let prompt_area = layout[1];
    let footer_area = layout[2];

    let panes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(main_area);
    let editor_area = panes[0];
    let preview_area = panes[1];

    let viewport_height = editor_area.height.saturating_sub(2) as usize;
    app.scroll_to_cursor(viewport_height);

    let editor_border = border_style(app.focus == Focus::Editor);
    let editor_text =
        Text::from(app.lines.iter().map(|line| Line::raw(line.clone())).collect::<Vec<_>>());
    let editor = Paragraph::new(editor_text)
        .block(Block::default().borders(Borders::ALL).title("Editor").border_style(editor_border))
        .scroll((app.editor_scroll, 0));
    frame.render_widget(editor, editor_area);

    let preview = Paragraph::new(preview_lines(app))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Preview")
                .border_style(Style::default().fg(BLUR_COLOR)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(preview, preview_area);

    let prompt_title =
        if app.controller.is_generating() { "Prompt (generating…)" } else { "Prompt" };
    let prompt_border = border_style(app.focus == Focus::Prompt);
    let prompt = Paragraph::new(Line::raw(app.prompt.clone())).block(
        Block::default().borders(Borders::ALL).title(prompt_title).border_style(prompt_border),
    );
    frame.render_widget(prompt, prompt_area);

    frame.render_widget(Paragraph::new(footer_line(app)), footer_area);

    if app.controller.settings_open() {
        draw_settings(frame, app, area);
    } else {
        match app.focus {
            Focus::Editor => {
                let col = display_col(&app.lines, app.cursor_row, app.cursor_col);
                let row = app.cursor_row.saturating_sub(app.editor_scroll as usize);
                frame.set_cursor(
                    editor_area.x + 1 + col.min(editor_area.width.saturating_sub(2) as usize) as u16,
                    editor_area.y + 1 + (row as u16).min(editor_area.height.saturating_sub(2)),
                );
            }
            Focus::Prompt => {
                let col = app.prompt.chars().count() as u16;
                frame.set_cursor(
                    prompt_area.x + 1 + col.min(prompt_area.width.saturating_sub(2)),
                    prompt_area.y + 1,
                );
            }
        }
    }
}

fn display_col(lines: &[String], row: usize, col: usize) -> usize {
    // Column is in chars; the terminal cursor wants cells. Mermaid source is
    // effectively single-width, so chars are close enough here.
    col.min(line_len(lines, row))
}

fn preview_lines(app: &App) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    match app.controller.render_result() {
        RenderResult::Pending => {
            if app.controller.source().trim().is_empty() {
                lines.push(Line::styled(
                    "Start typing Mermaid source to see a preview",
                    Style::default().fg(BLUR_COLOR),
                ));
            } else {
                lines.push(Line::styled("Rendering…", Style::default().fg(BLUR_COLOR)));
            }
        }
        RenderResult::Rendered { svg } => {
            let bytes = app.preview_bytes.unwrap_or(svg.len());
            lines.push(Line::styled(
                format!("✓ Rendered SVG ({bytes} bytes)"),
                Style::default().fg(SUCCESS_COLOR),
            ));
            lines.push(Line::raw(String::new()));
            lines.push(Line::raw(format!("Exported to {}", app.preview_path.display())));
        }
        RenderResult::Failed { message } => {
            lines.push(Line::styled(message.clone(), Style::default().fg(ERROR_COLOR)));
        }
    }

    if app.controller.is_generating() {
        lines.push(Line::raw(String::new()));
        lines.push(Line::styled("Generating diagram…", Style::default().fg(FOOTER_KEY_COLOR)));
    }

    lines
}

fn footer_line(app: &mut App) -> Line<'static> {
    let mut spans = vec![
        Span::styled("Tab", Style::default().fg(FOOTER_KEY_COLOR)),
        Span::styled(" focus  ", Style::default().fg(FOOTER_LABEL_COLOR)),
        Span::styled("Ctrl+O", Style::default().fg(FOOTER_KEY_COLOR)),
        Span::styled(" settings  ", Style::default().fg(FOOTER_LABEL_COLOR)),
        Span::styled("Ctrl+S", Style::default().fg(FOOTER_KEY_COLOR)),
        Span::styled(" save  ", Style::default().fg(FOOTER_LABEL_COLOR)),
        Span::styled("Ctrl+Q", Style::default().fg(FOOTER_KEY_COLOR)),
        Span::styled(" quit", Style::default().fg(FOOTER_LABEL_COLOR)),
    ];

    if app.controller.credential_mode() == CredentialMode::Direct && !app.controller.has_api_key()
    {
        spans.push(Span::styled(
            "  no API key configured",
            Style::default().fg(ERROR_COLOR),
        ));
    }

    let toast_snapshot = app.toast.as_ref().map(|toast| (toast.clone(), toast.expires_at));
    if let Some((toast, expires_at)) = toast_snapshot {
        if expires_at <= Instant::now() {
            app.toast = None;
        } else {
            let color = match toast.kind {
                NoticeKind::Success => SUCCESS_COLOR,
                NoticeKind::Error => ERROR_COLOR,
                NoticeKind::Info => FOOTER_LABEL_COLOR,
            };
            spans.push(Span::raw("  "));
            spans.push(Span::styled(toast.message, Style::default().fg(color)));
        }
    }

    Line::from(spans)
}

fn draw_settings(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let overlay = centered_rect(area, 60, 9);
    frame.render_widget(Clear, overlay);

    let (title, body) = if app.controller.credential_mode() == CredentialMode::Relay {
        (
            "Settings",
            Text::from(vec![
                Line::styled("Secure API Integration", Style::default().fg(SUCCESS_COLOR)),
                Line::raw(String::new()),
                Line::raw("Diagrams are generated through a relay service."),
                Line::raw("No API key is needed on this machine."),
                Line::raw(String::new()),
                Line::styled("Esc close", Style::default().fg(FOOTER_LABEL_COLOR)),
            ]),
        )
    } else {
        (
            "Settings: OpenAI API Key",
            Text::from(vec![
                Line::raw("Enter your OpenAI API key:"),
                Line::raw(String::new()),
                Line::styled(
                    mask_credential(&app.settings_input),
                    Style::default().fg(Color::White),
                ),
                Line::raw(String::new()),
                Line::styled(
                    "Enter save  Esc cancel  (empty clears the key)",
                    Style::default().fg(FOOTER_LABEL_COLOR),
                ),
            ]),
        )
    };

    let panel = Paragraph::new(body)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .border_style(Style::default().fg(FOCUS_COLOR)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(panel, overlay);
}

/// Masks all but the last four characters of the credential. Values of four
/// characters or fewer are masked entirely.
fn mask_credential(value: &str) -> String {
    let total = value.chars().count();
    if total <= 4 {
        return "*".repeat(total);
    }
    let tail: String = value.chars().skip(total - 4).collect();
    format!("{}{tail}", "*".repeat(total - 4))
}

fn border_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(FOCUS_COLOR)
    } else {
        Style::default().fg(BLUR_COLOR)
    }
}

fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

struct TerminalSession {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
}

impl TerminalSession {
    fn new() -> Result<Self, Box<dyn Error>> {
        enable_raw_mode()?;

        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen).map_err(|err| {
            teardown_terminal();
            err
        })?;

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).map_err(|err| {
            teardown_terminal();
            err
        })?;
        terminal.clear().map_err(|err| {
            teardown_terminal();
            err
        })?;

        Ok(Self { terminal })
    }

    fn draw(&mut self, draw_fn: impl FnOnce(&mut Frame<'_>)) -> io::Result<()> {
        self.terminal.draw(draw_fn)?;
        Ok(())
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        let _ = self.terminal.show_cursor();
        teardown_terminal();
    }
}

fn teardown_terminal() {
    let _ = disable_raw_mode();
    let mut stdout = io::stdout();
    let _ = execute!(stdout, LeaveAlternateScreen);
}
