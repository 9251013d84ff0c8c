use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use emv_card::{CancellationToken, CardReader, Discovery, DiscoveryConfig, Progress, Scan};
use tracing::{debug, info, warn};

/// Messages sent from the card worker to the UI
#[derive(Debug)]
pub enum CardEvent {
    /// A scan started on `reader`
    ReadingStarted { reader: String },
    /// A scan finished, completely or not
    DataReady { reader: String, scan: Scan },
    /// No scan could be started
    Error { message: String },
}

/// Commands sent from the UI to the card worker
#[derive(Debug)]
pub enum CardCommand {
    /// Scan `reader`, or the first reader holding a card
    Read {
        reader: Option<String>,
        cancel: CancellationToken,
    },
    /// Stop the worker thread
    Stop,
}

/// UI side of a running worker
pub struct WorkerHandle {
    pub events: Receiver<CardEvent>,
    pub progress: Receiver<Progress>,
    pub commands: Sender<CardCommand>,
}

/// Background worker running scans one at a time
pub struct CardWorker {
    config: DiscoveryConfig,
    event_tx: Sender<CardEvent>,
    progress_tx: Sender<Progress>,
    command_rx: Receiver<CardCommand>,
}

impl CardWorker {
    /// Spawn a new card worker thread
    pub fn spawn(config: DiscoveryConfig) -> WorkerHandle {
        let (event_tx, events) = mpsc::channel();
        let (progress_tx, progress) = mpsc::channel();
        let (commands, command_rx) = mpsc::channel();

        thread::spawn(move || {
            let worker = CardWorker {
                config,
                event_tx,
                progress_tx,
                command_rx,
            };
            worker.run();
        });

        WorkerHandle {
            events,
            progress,
            commands,
        }
    }

    fn run(self) {
        info!("Card worker thread started");

        while let Ok(command) = self.command_rx.recv() {
            match command {
                CardCommand::Read { reader, cancel } => self.read(reader, cancel),
                CardCommand::Stop => break,
            }
        }

        info!("Card worker thread stopped");
    }

    fn read(&self, reader: Option<String>, cancel: CancellationToken) {
        let mut card_reader = match CardReader::new() {
            Ok(r) => r,
            Err(e) => {
                debug!("Card reader unavailable: {}", e);
                self.send(CardEvent::Error {
                    message: format!("Card reader unavailable: {}", e),
                });
                return;
            }
        };

        let reader = match reader {
            Some(name) => name,
            None => match card_reader.find_card() {
                Ok(name) => name,
                Err(e) => {
                    self.send(CardEvent::Error {
                        message: format!("No card found: {}", e),
                    });
                    return;
                }
            },
        };

        self.send(CardEvent::ReadingStarted {
            reader: reader.clone(),
        });

        let scan = Discovery::new(self.config)
            .with_cancellation(cancel)
            .with_progress(self.progress_tx.clone())
            .run(&mut card_reader, &reader);

        if let Err(e) = &scan.outcome {
            warn!(reader = %reader, error = %e, "Scan ended early");
        }
        self.send(CardEvent::DataReady { reader, scan });
    }

    fn send(&self, event: CardEvent) {
        if self.event_tx.send(event).is_err() {
            debug!("UI went away, dropping card event");
        }
    }
}
