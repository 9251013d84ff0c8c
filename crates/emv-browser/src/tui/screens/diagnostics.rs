use crossterm::event::KeyEvent;
use emv_card::{Diagnostic, Progress};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Style},
    text::Line,
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use super::{Screen, Scroll};

/// Diagnostics of the last scan and its progress log
#[derive(Default)]
pub struct DiagnosticsScreen {
    diagnostics: Vec<Diagnostic>,
    log: Vec<String>,
    scroll: Scroll,
}

impl DiagnosticsScreen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset for a scan starting on `reader`
    pub fn start(&mut self, reader: &str) {
        self.diagnostics.clear();
        self.log.clear();
        self.scroll = Scroll::default();
        self.log.push(format!("Reading card in {}", reader));
    }

    pub fn push_progress(&mut self, progress: &Progress) {
        self.log.push(describe(progress));
    }

    pub fn set_diagnostics(&mut self, diagnostics: Vec<Diagnostic>) {
        self.diagnostics = diagnostics;
    }
}

fn describe(progress: &Progress) -> String {
    match progress {
        Progress::State(state) => state.to_string(),
        Progress::ApplicationFound { aid } => format!("Found application {}", hex::encode_upper(aid)),
        Progress::RecordRead { sfi, record } => format!("Read record {} of SFI {}", record, sfi),
        Progress::Diagnostic(diagnostic) => format!("Problem: {}", diagnostic),
    }
}

impl Screen for DiagnosticsScreen {
    fn handle_key(&mut self, key: KeyEvent) {
        self.scroll.handle_key(key);
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        let height = (self.diagnostics.len() as u16).clamp(1, 10) + 2;
        let chunks = Layout::default()
            .direction(ratatui::layout::Direction::Vertical)
            .constraints([Constraint::Length(height), Constraint::Min(0)])
            .split(area);

        let diagnostics: Vec<Line> = if self.diagnostics.is_empty() {
            vec![Line::styled("No problems recorded", Style::default().fg(Color::Green))]
        } else {
            self.diagnostics
                .iter()
                .map(|d| Line::styled(format!("• {}", d), Style::default().fg(Color::Red)))
                .collect()
        };
        let summary = Paragraph::new(diagnostics)
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("Diagnostics"));
        frame.render_widget(summary, chunks[0]);

        let log: Vec<Line> = self.log.iter().map(|entry| Line::from(entry.as_str())).collect();
        let activity = Paragraph::new(log)
            .scroll((self.scroll.offset(), 0))
            .block(Block::default().borders(Borders::ALL).title("Activity"));
        frame.render_widget(activity, chunks[1]);
    }

    fn title(&self) -> &str {
        "Diagnostics"
    }
}
