use crossterm::event::KeyEvent;
use emv_card::Scan;
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use super::{Screen, Scroll};
use crate::formatters::{tree_lines, FormatMode};

#[derive(Debug, Clone, PartialEq)]
enum TreeState {
    Waiting,
    Loading { reader: String },
    Loaded { reader: String, status: String, complete: bool },
    Error(String),
}

/// Card tree of the last scan
pub struct TreeScreen {
    format: FormatMode,
    state: TreeState,
    lines: Vec<(usize, String)>,
    scroll: Scroll,
}

impl TreeScreen {
    pub fn new(format: FormatMode) -> Self {
        Self {
            format,
            state: TreeState::Waiting,
            lines: Vec::new(),
            scroll: Scroll::default(),
        }
    }

    pub fn set_loading(&mut self, reader: &str) {
        self.state = TreeState::Loading {
            reader: reader.to_string(),
        };
    }

    /// Show a finished scan; partial trees are shown too
    pub fn set_scan(&mut self, reader: String, scan: &Scan) {
        self.lines = tree_lines(&scan.tree, self.format);
        self.scroll = Scroll::default();
        self.state = TreeState::Loaded {
            reader,
            status: scan.status_message(),
            complete: scan.outcome.is_ok(),
        };
    }

    pub fn set_error(&mut self, error: String) {
        self.state = TreeState::Error(error);
    }

    fn content(&self) -> (Vec<Line<'_>>, String, Color) {
        match &self.state {
            TreeState::Waiting => (
                vec![Line::from("Waiting for card... (r: read now)")],
                "Status".to_string(),
                Color::Yellow,
            ),
            TreeState::Loading { reader } => (
                vec![Line::from(format!("Reading card in {}...", reader))],
                "Status".to_string(),
                Color::Cyan,
            ),
            TreeState::Error(error) => (vec![Line::from(error.as_str())], "Error".to_string(), Color::Red),
            TreeState::Loaded {
                reader,
                status,
                complete,
            } => {
                let lines = self
                    .lines
                    .iter()
                    .map(|(depth, text)| {
                        let indent = Span::raw("  ".repeat(*depth));
                        // Structural nodes are bold, TLV objects plain
                        let style = if text.starts_with('[') {
                            Style::default()
                        } else {
                            Style::default().add_modifier(Modifier::BOLD)
                        };
                        Line::from(vec![indent, Span::styled(text.as_str(), style)])
                    })
                    .collect();
                let color = if *complete { Color::Green } else { Color::Red };
                (lines, format!("{} - {}", reader, status), color)
            }
        }
    }
}

impl Screen for TreeScreen {
    fn handle_key(&mut self, key: KeyEvent) {
        self.scroll.handle_key(key);
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(ratatui::layout::Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0)])
            .split(area);

        let help = Paragraph::new("r: Read | c: Cancel | ↑/↓ j/k: Scroll | PgUp/PgDn | Home | Tab: Switch screen | q: Quit")
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL).title("Controls"));
        frame.render_widget(help, chunks[0]);

        let (lines, title, color) = self.content();
        let body = Paragraph::new(lines)
            .scroll((self.scroll.offset(), 0))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(Span::styled(title, Style::default().fg(color))),
            );
        frame.render_widget(body, chunks[1]);
    }

    fn title(&self) -> &str {
        "Card Tree"
    }
}
