use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// Events that can occur in the TUI
#[derive(Debug, PartialEq, Eq)]
pub enum TuiEvent {
    /// User pressed a key
    Key(KeyEvent),
    /// User asked to leave (q, Esc or Ctrl-C)
    Quit,
    /// Tick event for periodic updates
    Tick,
}

/// Event handler for the TUI
pub struct EventHandler {
    tick_rate: Duration,
}

impl EventHandler {
    pub fn new(tick_rate: Duration) -> Self {
        Self { tick_rate }
    }

    /// Wait up to one tick for the next event
    pub fn next(&self) -> std::io::Result<TuiEvent> {
        if !event::poll(self.tick_rate)? {
            return Ok(TuiEvent::Tick);
        }

        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => Ok(classify(key)),
            _ => Ok(TuiEvent::Tick),
        }
    }
}

fn classify(key: KeyEvent) -> TuiEvent {
    let ctrl_c = key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL);
    if ctrl_c || matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
        TuiEvent::Quit
    } else {
        TuiEvent::Key(key)
    }
}
