//! PC/SC card reader management

use std::ffi::CString;
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use pcsc::{Card, Context, Disposition, Protocols, ReaderState, Scope, ShareMode, State, MAX_BUFFER_SIZE};
use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::transport::{CardTransport, TransportError};

/// Card reader wrapper for managing PC/SC connections
pub struct CardReader {
    context: Context,
    connection: Option<(Card, String)>,
}

impl CardReader {
    /// Create a new CardReader by establishing a PC/SC context
    pub fn new() -> Result<Self, TransportError> {
        let context = Context::establish(Scope::User)?;
        Ok(Self {
            context,
            connection: None,
        })
    }

    /// First reader that currently holds a card
    pub fn find_card(&self) -> Result<String, TransportError> {
        let readers = self.list_readers()?;
        if readers.is_empty() {
            return Err(TransportError::NoReadersAvailable);
        }

        let mut states: Vec<ReaderState> = readers
            .into_iter()
            .filter_map(|name| CString::new(name).ok())
            .map(|name| ReaderState::new(name, State::UNAWARE))
            .collect();
        self.context.get_status_change(Duration::ZERO, &mut states)?;

        states
            .iter()
            .find(|s| s.event_state().contains(State::PRESENT))
            .map(|s| s.name().to_string_lossy().into_owned())
            .ok_or_else(|| TransportError::Unavailable("no card present in any reader".into()))
    }
}

impl CardTransport for CardReader {
    fn list_readers(&self) -> Result<Vec<String>, TransportError> {
        match self.context.list_readers_owned() {
            Ok(readers) => Ok(readers
                .iter()
                .map(|r| r.to_string_lossy().into_owned())
                .collect()),
            Err(pcsc::Error::NoReadersAvailable) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn connect(&mut self, reader: &str) -> Result<(), TransportError> {
        if let Some((_, current)) = &self.connection {
            return Err(TransportError::AlreadyConnected(current.clone()));
        }

        let name = CString::new(reader).map_err(|_| TransportError::ReaderNotFound(reader.to_string()))?;
        let card = self
            .context
            .connect(&name, ShareMode::Shared, Protocols::ANY)
            .map_err(|e| match e {
                pcsc::Error::UnknownReader => TransportError::ReaderNotFound(reader.to_string()),
                e => e.into(),
            })?;

        debug!(reader, "Connected");
        self.connection = Some((card, reader.to_string()));
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        let Some((card, reader)) = self.connection.take() else {
            return Ok(());
        };

        // Unpower so the next session starts from a fresh card reset
        card.disconnect(Disposition::UnpowerCard).map_err(|(_, e)| e)?;
        debug!(reader = %reader, "Disconnected");
        Ok(())
    }

    fn transmit_raw(&mut self, command: &[u8]) -> Result<Vec<u8>, TransportError> {
        let (card, _) = self.connection.as_ref().ok_or(TransportError::NotConnected)?;
        let mut rapdu_buf = [0; MAX_BUFFER_SIZE];
        let rapdu = card.transmit(command, &mut rapdu_buf)?;
        Ok(rapdu.to_vec())
    }
}

/// Card presence notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderEvent {
    CardInserted { reader: String, atr: Vec<u8> },
    CardRemoved { reader: String },
    ReaderUnavailable { error: String },
}

/// Tracks card insertion and removal across all readers
///
/// Only watches reader state; it never opens a connection, so it cannot
/// disturb a scan running on another thread.
pub struct ReaderMonitor {
    context: Context,
    states: Vec<ReaderState>,
    present: Vec<bool>,
}

impl ReaderMonitor {
    pub fn new() -> Result<Self, TransportError> {
        Ok(Self {
            context: Context::establish(Scope::User)?,
            states: Vec::new(),
            present: Vec::new(),
        })
    }

    /// Wait up to `timeout` for reader changes
    pub fn poll(&mut self, timeout: Duration) -> Result<Vec<ReaderEvent>, TransportError> {
        let mut events = Vec::new();
        self.refresh_readers(&mut events)?;

        if self.states.is_empty() {
            thread::sleep(timeout);
            return Ok(events);
        }

        match self.context.get_status_change(timeout, &mut self.states) {
            Ok(()) => {}
            Err(pcsc::Error::Timeout) => return Ok(events),
            Err(e) => return Err(e.into()),
        }

        for (state, was_present) in self.states.iter_mut().zip(self.present.iter_mut()) {
            let event_state = state.event_state();
            if !event_state.contains(State::CHANGED) {
                continue;
            }

            let reader = state.name().to_string_lossy().into_owned();
            let present = event_state.contains(State::PRESENT);
            if present && !*was_present {
                events.push(ReaderEvent::CardInserted {
                    reader,
                    atr: state.atr().to_vec(),
                });
            } else if !present && *was_present {
                events.push(ReaderEvent::CardRemoved { reader });
            }

            *was_present = present;
            state.sync_current_state();
        }

        Ok(events)
    }

    fn refresh_readers(&mut self, events: &mut Vec<ReaderEvent>) -> Result<(), TransportError> {
        let readers = match self.context.list_readers_owned() {
            Ok(readers) => readers,
            Err(pcsc::Error::NoReadersAvailable) => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        // Drop readers that went away, reporting their cards as removed
        let mut index = 0;
        while index < self.states.len() {
            if readers.iter().any(|r| r.as_c_str() == self.states[index].name()) {
                index += 1;
                continue;
            }
            let state = self.states.remove(index);
            if self.present.remove(index) {
                events.push(ReaderEvent::CardRemoved {
                    reader: state.name().to_string_lossy().into_owned(),
                });
            }
        }

        for reader in readers {
            if !self.states.iter().any(|s| s.name() == reader.as_c_str()) {
                debug!(reader = %reader.to_string_lossy(), "Watching reader");
                self.states.push(ReaderState::new(reader, State::UNAWARE));
                self.present.push(false);
            }
        }

        Ok(())
    }

    /// Run a monitor on its own thread until `stop` is cancelled or the
    /// receiving end of `events` goes away
    pub fn spawn(events: Sender<ReaderEvent>, stop: CancellationToken) -> JoinHandle<()> {
        thread::spawn(move || {
            info!("Reader monitor started");
            let mut monitor: Option<ReaderMonitor> = None;

            while !stop.is_cancelled() {
                if monitor.is_none() {
                    match ReaderMonitor::new() {
                        Ok(m) => monitor = Some(m),
                        Err(e) => {
                            debug!("PC/SC unavailable: {}", e);
                            let event = ReaderEvent::ReaderUnavailable { error: e.to_string() };
                            if events.send(event).is_err() {
                                break;
                            }
                            thread::sleep(Duration::from_secs(2));
                            continue;
                        }
                    }
                }
                let Some(m) = monitor.as_mut() else {
                    continue;
                };

                match m.poll(Duration::from_millis(500)) {
                    Ok(batch) => {
                        if batch.into_iter().any(|event| events.send(event).is_err()) {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Reader monitor failed, re-establishing context");
                        monitor = None;
                        let event = ReaderEvent::ReaderUnavailable { error: e.to_string() };
                        if events.send(event).is_err() {
                            break;
                        }
                        thread::sleep(Duration::from_secs(2));
                    }
                }
            }

            info!("Reader monitor stopped");
        })
    }
}
