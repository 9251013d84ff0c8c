use std::io::{self, Stdout};
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{KeyCode, KeyEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use emv_card::{CancellationToken, DiscoveryConfig, ReaderEvent, ReaderMonitor};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{debug, info, warn};

use super::{
    card_worker::{CardCommand, CardEvent, CardWorker, WorkerHandle},
    events::{EventHandler, TuiEvent},
    screens::{DiagnosticsScreen, Screen, TreeScreen},
    ui::{self, ReaderStatus},
};
use crate::formatters::FormatMode;

const SCREEN_COUNT: usize = 2;

/// Main TUI application
pub struct App {
    selected_screen: usize,
    tree_screen: TreeScreen,
    diagnostics_screen: DiagnosticsScreen,
    /// Reader named on the command line; other readers are ignored
    reader: Option<String>,
    card_present: bool,
    reader_error: Option<String>,
    /// Cancellation token of the scan in flight
    scanning: Option<CancellationToken>,
    worker: WorkerHandle,
    reader_events: Receiver<ReaderEvent>,
    monitor_stop: CancellationToken,
}

impl App {
    pub fn new(reader: Option<String>, config: DiscoveryConfig, format: FormatMode) -> Self {
        let worker = CardWorker::spawn(config);

        let (reader_event_tx, reader_events) = mpsc::channel();
        let monitor_stop = CancellationToken::new();
        ReaderMonitor::spawn(reader_event_tx, monitor_stop.clone());

        Self {
            selected_screen: 0,
            tree_screen: TreeScreen::new(format),
            diagnostics_screen: DiagnosticsScreen::new(),
            reader,
            card_present: false,
            reader_error: None,
            scanning: None,
            worker,
            reader_events,
            monitor_stop,
        }
    }

    /// Ask the worker for a scan unless one is already running
    fn start_read(&mut self, reader: Option<String>) {
        if self.scanning.is_some() {
            debug!("Scan already running");
            return;
        }

        let cancel = CancellationToken::new();
        let command = CardCommand::Read {
            reader: reader.or_else(|| self.reader.clone()),
            cancel: cancel.clone(),
        };
        if self.worker.commands.send(command).is_err() {
            self.tree_screen.set_error("Card worker stopped".to_string());
            return;
        }
        self.scanning = Some(cancel);
    }

    fn cancel_read(&mut self) {
        if let Some(cancel) = &self.scanning {
            info!("Cancelling scan");
            cancel.cancel();
        }
    }

    /// Insertion and removal only update the header; an insertion also
    /// starts a scan when none is running
    fn process_reader_events(&mut self) {
        while let Ok(event) = self.reader_events.try_recv() {
            debug!("Reader event: {:?}", event);

            match event {
                ReaderEvent::CardInserted { reader, atr } => {
                    info!(reader = %reader, atr = %hex::encode_upper(&atr), "Card inserted");
                    let wanted = self.reader.as_deref().map_or(true, |r| r == reader);
                    if wanted {
                        self.card_present = true;
                        self.reader_error = None;
                        self.start_read(Some(reader));
                    }
                }
                ReaderEvent::CardRemoved { reader } => {
                    info!(reader = %reader, "Card removed");
                    if self.reader.as_deref().map_or(true, |r| r == reader) {
                        self.card_present = false;
                    }
                }
                ReaderEvent::ReaderUnavailable { error } => {
                    self.card_present = false;
                    self.reader_error = Some(error);
                }
            }
        }
    }

    fn process_card_events(&mut self) {
        while let Ok(progress) = self.worker.progress.try_recv() {
            self.diagnostics_screen.push_progress(&progress);
        }

        while let Ok(event) = self.worker.events.try_recv() {
            match event {
                CardEvent::ReadingStarted { reader } => {
                    self.tree_screen.set_loading(&reader);
                    self.diagnostics_screen.start(&reader);
                }
                CardEvent::DataReady { reader, scan } => {
                    debug!(status = %scan.status_message(), "Card data ready");
                    self.scanning = None;
                    self.tree_screen.set_scan(reader, &scan);
                    self.diagnostics_screen.set_diagnostics(scan.tree.diagnostics);
                }
                CardEvent::Error { message } => {
                    warn!(error = %message, "Card error");
                    self.scanning = None;
                    self.tree_screen.set_error(message);
                }
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Tab => self.selected_screen = (self.selected_screen + 1) % SCREEN_COUNT,
            KeyCode::BackTab => self.selected_screen = (self.selected_screen + SCREEN_COUNT - 1) % SCREEN_COUNT,
            KeyCode::Char('1') => self.selected_screen = 0,
            KeyCode::Char('2') => self.selected_screen = 1,
            KeyCode::Char('r') => self.start_read(None),
            KeyCode::Char('c') => self.cancel_read(),
            _ => match self.selected_screen {
                0 => self.tree_screen.handle_key(key),
                _ => self.diagnostics_screen.handle_key(key),
            },
        }
    }

    fn status(&self) -> ReaderStatus<'_> {
        match (&self.reader_error, &self.scanning) {
            (Some(error), _) => ReaderStatus::Unavailable(error),
            (None, Some(_)) => ReaderStatus::Scanning,
            (None, None) if self.card_present => ReaderStatus::CardPresent,
            (None, None) => ReaderStatus::NoCard,
        }
    }

    fn render(&self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> io::Result<()> {
        terminal.draw(|frame| {
            let screens: [&dyn Screen; SCREEN_COUNT] = [&self.tree_screen, &self.diagnostics_screen];
            ui::render(frame, &screens, self.selected_screen, self.status());
        })?;
        Ok(())
    }

    /// Run the main event loop
    pub fn run(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> io::Result<()> {
        let event_handler = EventHandler::new(Duration::from_millis(100));

        loop {
            match event_handler.next()? {
                TuiEvent::Quit => {
                    info!("Quit requested");
                    return Ok(());
                }
                TuiEvent::Key(key) => self.handle_key(key),
                TuiEvent::Tick => {
                    self.process_reader_events();
                    self.process_card_events();
                }
            }

            self.render(terminal)?;
        }
    }

    /// Stop the background threads
    fn shutdown(&mut self) {
        self.cancel_read();
        self.monitor_stop.cancel();
        if self.worker.commands.send(CardCommand::Stop).is_err() {
            debug!("Card worker already stopped");
        }
    }
}

fn init_terminal() -> io::Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    Terminal::new(CrosstermBackend::new(stdout))
}

fn restore_terminal(mut terminal: Terminal<CrosstermBackend<Stdout>>) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Main entry point for the TUI
pub fn run_tui(reader: Option<String>, config: DiscoveryConfig, format: FormatMode) -> Result<()> {
    info!("Starting TUI");

    // Restore the terminal before the panic message is printed
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    let mut terminal = init_terminal().context("Failed to initialize terminal")?;
    let mut app = App::new(reader, config, format);

    let result = app.run(&mut terminal);
    app.shutdown();

    let restore_result = restore_terminal(terminal);
    let _ = std::panic::take_hook();

    restore_result.context("Failed to restore terminal")?;
    result.context("TUI error")?;

    info!("TUI stopped");
    Ok(())
}
