mod diagnostics;
mod tree;

pub use diagnostics::DiagnosticsScreen;
pub use tree::TreeScreen;

use crossterm::event::KeyEvent;
use ratatui::{layout::Rect, Frame};

/// Trait for all TUI screens
pub trait Screen {
    /// Handle a key event not consumed by the application
    fn handle_key(&mut self, key: KeyEvent);

    /// Render the screen
    fn render(&self, frame: &mut Frame, area: Rect);

    /// Get the screen title
    fn title(&self) -> &str;
}

/// Scroll position shared by the screens
#[derive(Debug, Default, Clone, Copy)]
struct Scroll(u16);

impl Scroll {
    fn handle_key(&mut self, key: KeyEvent) {
        use crossterm::event::KeyCode;

        self.0 = match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.0.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => self.0.saturating_add(1),
            KeyCode::PageUp => self.0.saturating_sub(10),
            KeyCode::PageDown => self.0.saturating_add(10),
            KeyCode::Home => 0,
            _ => self.0,
        };
    }

    fn offset(self) -> u16 {
        self.0
    }
}
