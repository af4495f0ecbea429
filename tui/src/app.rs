//! Main Application
//!
//! The App struct manages the TUI lifecycle as a thin display client:
//! - Event loop (keyboard, resize)
//! - Controller from `muse-core` for everything stateful
//! - A small display state derived from controller events
//!
//! The app never talks to the network itself. It converts key presses into
//! controller calls, drains controller events into display state, and
//! renders from that state plus the controller's accessors.

use std::io;
use std::time::Duration;

use crossterm::event::{self, Event, EventStream, KeyCode, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Terminal;

use muse_core::auth::LoginPrompt;
use muse_core::{Category, Controller, ControllerEvent, DeviceFlowProvider, HttpCreativeApi};
use tokio::sync::mpsc;

use crate::output::{wrap_output, OutputPanel};
use crate::prompt::PromptInput;
use crate::theme;

/// Prompt box height (lines, including borders)
const PROMPT_HEIGHT: u16 = 4;

/// Feedback box height (lines, including borders)
const FEEDBACK_HEIGHT: u16 = 3;

/// Which panel receives typed characters
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Focus {
    /// The prompt box
    Prompt,
    /// The feedback box under the output
    Feedback,
}

/// Display state derived from controller events
#[derive(Debug, Default)]
struct Display {
    /// Pending login prompt, shown on the login screen
    login_prompt: Option<LoginPrompt>,
    /// Login failure message, shown with a retry hint
    login_error: Option<String>,
    /// Label of the signed-in user
    user_label: Option<String>,
}

impl Display {
    /// Apply a controller event
    fn apply_event(&mut self, event: &ControllerEvent) {
        match event {
            ControllerEvent::LoginRequired { prompt } => {
                self.login_prompt = Some(prompt.clone());
                self.login_error = None;
            }
            ControllerEvent::LoginFailed { message } => {
                self.login_error = Some(message.clone());
            }
            ControllerEvent::Authenticated { user } => {
                self.user_label = Some(user.label().to_string());
                self.login_prompt = None;
                self.login_error = None;
            }
            // Generation and session state is read off the controller
            ControllerEvent::GenerationStarted
            | ControllerEvent::GenerationComplete { .. }
            | ControllerEvent::GenerationFailed { .. }
            | ControllerEvent::SessionUpdated { .. }
            | ControllerEvent::HistoryLoaded { .. } => {}
        }
    }
}

/// Main application state
pub struct App {
    /// Is the app still running?
    running: bool,
    /// The headless client core
    controller: Controller<DeviceFlowProvider, HttpCreativeApi>,
    /// Events from the controller
    events: mpsc::Receiver<ControllerEvent>,
    /// Display state derived from those events
    display: Display,
    /// The prompt box
    prompt: PromptInput,
    /// The output panel
    output_panel: OutputPanel,
    /// Which panel has input focus
    focus: Focus,
}

impl App {
    /// Create the app over an already-constructed controller
    #[must_use]
    pub fn new(
        controller: Controller<DeviceFlowProvider, HttpCreativeApi>,
        events: mpsc::Receiver<ControllerEvent>,
    ) -> Self {
        Self {
            running: true,
            controller,
            events,
            display: Display::default(),
            prompt: PromptInput::new(),
            output_panel: OutputPanel::new(),
            focus: Focus::Prompt,
        }
    }

    /// Main event loop
    pub async fn run(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> anyhow::Result<()> {
        let mut event_stream = EventStream::new();

        // Render immediately so the user sees the loading screen
        self.render(terminal)?;

        while self.running {
            tokio::select! {
                biased;

                maybe_event = event_stream.next() => {
                    if let Some(Ok(event)) = maybe_event {
                        match event {
                            // Only handle Press events (not Release or Repeat)
                            Event::Key(key) if key.kind == KeyEventKind::Press => {
                                self.handle_key(key).await;
                            }
                            Event::Resize(_, _) => {
                                // Layout is recomputed every frame
                            }
                            _ => {}
                        }
                    }
                }

                _ = tokio::time::sleep(Duration::from_millis(50)) => {}
            }

            // Advance the auth machine and apply settled requests
            self.controller.observe_auth().await;
            self.controller.poll().await;
            self.process_controller_events();

            self.render(terminal)?;
        }

        Ok(())
    }

    /// Drain pending controller events into display state
    fn process_controller_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            if matches!(event, ControllerEvent::GenerationComplete { .. }) {
                self.output_panel.on_new_output();
            }
            self.display.apply_event(&event);
        }
    }

    /// Handle keyboard input
    async fn handle_key(&mut self, key: event::KeyEvent) {
        // Quit works on every screen
        match key.code {
            KeyCode::Esc => {
                self.running = false;
                return;
            }
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.running = false;
                return;
            }
            _ => {}
        }

        let auth = self.controller.auth_state();
        if !auth.is_authenticated {
            // Login screen: retry is the only other action
            if key.code == KeyCode::Char('r') && self.display.login_error.is_some() {
                self.controller.retry_login().await;
            }
            return;
        }

        match key.code {
            KeyCode::Char('f') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                if self.controller.output().is_some() {
                    self.output_panel.toggle_feedback();
                    self.focus = if self.output_panel.feedback_open() {
                        Focus::Feedback
                    } else {
                        Focus::Prompt
                    };
                }
            }
            KeyCode::Char('h') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.controller.fetch_history().await;
            }
            KeyCode::Tab if self.output_panel.feedback_open() => {
                self.focus = match self.focus {
                    Focus::Prompt => Focus::Feedback,
                    Focus::Feedback => Focus::Prompt,
                };
            }
            KeyCode::Enter => match self.focus {
                Focus::Prompt => self.submit_prompt().await,
                Focus::Feedback => self.submit_feedback().await,
            },
            KeyCode::Char(c) => match self.focus {
                Focus::Prompt => self.prompt.push(c),
                Focus::Feedback => self.output_panel.push_feedback(c),
            },
            KeyCode::Backspace => match self.focus {
                Focus::Prompt => self.prompt.backspace(),
                Focus::Feedback => self.output_panel.backspace_feedback(),
            },
            KeyCode::Left if self.focus == Focus::Prompt => self.prompt.prev_category(),
            KeyCode::Right if self.focus == Focus::Prompt => self.prompt.next_category(),
            KeyCode::PageUp => self.output_panel.scroll_up(5),
            KeyCode::PageDown => self.output_panel.scroll_down(5),
            _ => {}
        }
    }

    async fn submit_prompt(&mut self) {
        if let Some(submission) = self.prompt.submit() {
            self.controller
                .submit(&submission.text, submission.category)
                .await;
        }
    }

    async fn submit_feedback(&mut self) {
        let Some(output_id) = self
            .controller
            .output()
            .map(|output| output.output_id.clone().unwrap_or_default())
        else {
            return;
        };

        if let Some(feedback) = self.output_panel.submit_feedback() {
            self.controller
                .submit_feedback(&output_id, &feedback.text, None)
                .await;
            self.focus = Focus::Prompt;
        }
    }

    /// Render the UI
    fn render(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> anyhow::Result<()> {
        let auth = self.controller.auth_state();

        terminal.draw(|frame| {
            let area = frame.area();

            if auth.is_loading {
                render_centered(frame, area, "Connecting to your muse...", theme::LOADING);
                return;
            }

            if !auth.is_authenticated {
                self.render_login(frame, area);
                return;
            }

            let [header, prompt_area, output_area, status] = Layout::vertical([
                Constraint::Length(1),
                Constraint::Length(PROMPT_HEIGHT),
                Constraint::Min(3),
                Constraint::Length(1),
            ])
            .areas(area);

            self.render_header(frame, header);
            self.render_prompt(frame, prompt_area);
            self.render_output(frame, output_area);
            self.render_status(frame, status);
        })?;

        Ok(())
    }

    /// Render the login screen with the device flow prompt
    fn render_login(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let mut lines = vec![
            Line::styled(
                "muse",
                Style::default()
                    .fg(theme::MUSE_VIOLET)
                    .add_modifier(Modifier::BOLD),
            ),
            Line::raw(""),
        ];

        match &self.display.login_prompt {
            Some(prompt) => {
                lines.push(Line::styled(
                    "Sign in to continue:",
                    Style::default().fg(theme::TEXT),
                ));
                lines.push(Line::raw(""));
                lines.push(Line::styled(
                    format!("  1. Open {}", prompt.verification_uri),
                    Style::default().fg(theme::TEXT),
                ));
                lines.push(Line::from(vec![
                    Span::styled("  2. Enter code ", Style::default().fg(theme::TEXT)),
                    Span::styled(
                        prompt.user_code.clone(),
                        Style::default()
                            .fg(theme::MUSE_GOLD)
                            .add_modifier(Modifier::BOLD),
                    ),
                ]));
                lines.push(Line::raw(""));
                lines.push(Line::styled(
                    "Waiting for you to finish in the browser...",
                    Style::default().fg(theme::TEXT_DIM),
                ));
            }
            None => {
                lines.push(Line::styled(
                    "Starting sign-in...",
                    Style::default().fg(theme::TEXT_DIM),
                ));
            }
        }

        if let Some(error) = &self.display.login_error {
            lines.push(Line::raw(""));
            lines.push(Line::styled(
                format!("Sign-in failed: {error}"),
                Style::default().fg(theme::ERROR),
            ));
            lines.push(Line::styled(
                "Press r to try again, Esc to quit",
                Style::default().fg(theme::TEXT_DIM),
            ));
        }

        let paragraph = Paragraph::new(lines);
        frame.render_widget(paragraph, centered_rect(area, 60, 14));
    }

    fn render_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let user = self.display.user_label.as_deref().unwrap_or("signed in");
        let line = Line::from(vec![
            Span::styled(
                " muse ",
                Style::default()
                    .fg(theme::MUSE_VIOLET)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled("- creative companion", Style::default().fg(theme::TEXT_DIM)),
            Span::raw("  "),
            Span::styled(format!("[{user}]"), Style::default().fg(theme::OK)),
        ]);
        frame.render_widget(Paragraph::new(line), area);
    }

    fn render_prompt(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let focused = self.focus == Focus::Prompt;
        let border_color = if focused {
            theme::BORDER_FOCUSED
        } else {
            theme::BORDER
        };

        // Category selector as the block title
        let mut title_spans = vec![Span::raw(" ")];
        for category in Category::all() {
            let style = if category == self.prompt.category() {
                Style::default()
                    .fg(theme::MUSE_GOLD)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(theme::TEXT_DIM)
            };
            title_spans.push(Span::styled(category.label(), style));
            title_spans.push(Span::raw(" "));
        }

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border_color))
            .title(Line::from(title_spans));
        let inner = block.inner(area);

        let paragraph = Paragraph::new(self.prompt.draft())
            .style(Style::default().fg(theme::TEXT))
            .block(block);
        frame.render_widget(paragraph, area);

        if focused && inner.width > 0 {
            let cursor_x =
                inner.x + self.prompt.draft_width().min(inner.width as usize - 1) as u16;
            frame.set_cursor_position((cursor_x, inner.y));
        }
    }

    fn render_output(&mut self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let feedback_open = self.output_panel.feedback_open();
        let (output_area, feedback_area) = if feedback_open {
            let [output_area, feedback_area] =
                Layout::vertical([Constraint::Min(1), Constraint::Length(FEEDBACK_HEIGHT)])
                    .areas(area);
            (output_area, Some(feedback_area))
        } else {
            (area, None)
        };

        let mut title = String::from(" Output ");
        if self.output_panel.feedback_submitted() {
            title.push_str("(feedback sent) ");
        } else if self.controller.output().is_some() {
            title.push_str("(^F feedback) ");
        }

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme::BORDER))
            .title(Span::styled(title, Style::default().fg(theme::TEXT_DIM)));
        let inner = block.inner(output_area);

        let lines: Vec<Line> = if self.controller.is_loading() {
            vec![Line::styled(
                "Generating...",
                Style::default().fg(theme::LOADING),
            )]
        } else if let Some(error) = self.controller.error() {
            vec![Line::styled(
                error.to_string(),
                Style::default().fg(theme::ERROR),
            )]
        } else if let Some(output) = self.controller.output() {
            let wrapped = wrap_output(&output.output_text, inner.width as usize);
            self.output_panel
                .clamp_scroll(wrapped.len(), inner.height as usize);
            wrapped
                .into_iter()
                .skip(self.output_panel.scroll_offset())
                .take(inner.height as usize)
                .map(|line| Line::styled(line, Style::default().fg(theme::TEXT)))
                .collect()
        } else {
            vec![Line::styled(
                "Describe something and press Enter - a poem, a melody, a scene.",
                Style::default().fg(theme::TEXT_DIM),
            )]
        };

        frame.render_widget(Paragraph::new(lines).block(block), output_area);

        if let Some(feedback_area) = feedback_area {
            let focused = self.focus == Focus::Feedback;
            let border_color = if focused {
                theme::BORDER_FOCUSED
            } else {
                theme::BORDER
            };
            let block = Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border_color))
                .title(" Feedback ");
            let paragraph = Paragraph::new(self.output_panel.feedback_draft())
                .style(Style::default().fg(theme::TEXT))
                .block(block);
            frame.render_widget(paragraph, feedback_area);
        }
    }

    fn render_status(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let mut spans = vec![Span::styled(
            " Enter send | Left/Right category | ^F feedback | ^H history | Esc quit ",
            Style::default().fg(theme::TEXT_DIM),
        )];

        let session_id = self.controller.session_id();
        if !session_id.is_empty() {
            spans.push(Span::styled(
                format!(" session {session_id}"),
                Style::default().fg(theme::TEXT_DIM),
            ));
        }

        if let Some(history) = self.controller.history() {
            spans.push(Span::styled(
                format!(" | {} past entries", history.history.len()),
                Style::default().fg(theme::TEXT_DIM),
            ));
        }

        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }
}

/// Render a single centered message
fn render_centered(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    text: &str,
    color: ratatui::style::Color,
) {
    let paragraph = Paragraph::new(Line::styled(text, Style::default().fg(color)));
    frame.render_widget(paragraph, centered_rect(area, 50, 1));
}

/// A rect of the given size centered in `area`, clamped to fit
fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}
