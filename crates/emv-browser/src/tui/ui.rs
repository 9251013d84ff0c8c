use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::Span,
    widgets::{Block, Borders, Tabs},
    Frame,
};

use super::screens::Screen;

const TITLE: &str = "EMV Browser - ";

/// What the header reports, most important first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderStatus<'a> {
    Unavailable(&'a str),
    Scanning,
    CardPresent,
    NoCard,
}

/// Render the main UI with tabs and current screen
pub fn render(frame: &mut Frame, screens: &[&dyn Screen], selected_screen: usize, status: ReaderStatus<'_>) {
    let chunks = Layout::default()
        .direction(ratatui::layout::Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with reader status
            Constraint::Length(3), // Tabs
            Constraint::Min(0),    // Screen content
        ])
        .split(frame.area());

    render_header(frame, chunks[0], status);
    render_tabs(frame, chunks[1], screens, selected_screen);

    if let Some(screen) = screens.get(selected_screen) {
        screen.render(frame, chunks[2]);
    }
}

fn render_header(frame: &mut Frame, area: Rect, status: ReaderStatus<'_>) {
    let (status_text, status_color) = match status {
        ReaderStatus::Unavailable(error) => (format!("⚠ Card reader unavailable: {}", error), Color::Red),
        ReaderStatus::Scanning => ("◌ Reading card (c: cancel)".to_string(), Color::Cyan),
        ReaderStatus::CardPresent => ("● Card Present".to_string(), Color::Green),
        ReaderStatus::NoCard => ("○ No Card".to_string(), Color::Red),
    };

    let max_width = (area.width.saturating_sub(4) as usize).saturating_sub(TITLE.len());
    let title = format!("{}{}", TITLE, truncate(&status_text, max_width));
    let block = Block::default().borders(Borders::ALL).title(Span::styled(
        title,
        Style::default().fg(status_color).add_modifier(Modifier::BOLD),
    ));

    frame.render_widget(block, area);
}

fn render_tabs(frame: &mut Frame, area: Rect, screens: &[&dyn Screen], selected: usize) {
    let titles: Vec<_> = screens.iter().map(|s| s.title()).collect();

    let tabs = Tabs::new(titles)
        .block(Block::default().borders(Borders::ALL).title("Screens"))
        .select(selected)
        .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));

    frame.render_widget(tabs, area);
}

/// Cut `text` to `max` characters, ending in "..." when shortened
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}
