//! EMV application discovery
//!
//! A scan walks `Idle -> PseScan -> (PseDirectoryRead | AidProbe) ->
//! ApplicationSelect -> ProcessingOptions -> RecordRead -> Idle`. Problems
//! confined to one application become [`Diagnostic`]s and the scan moves on
//! to the next candidate; transport failures and cancellation end the scan,
//! keeping whatever was read so far.

use std::fmt;
use std::sync::mpsc::Sender;

use emv_tlv::{tags, Tlv};
use tracing::{debug, info, warn};

use crate::apdu::{ApduResponse, Status};
use crate::cancel::CancellationToken;
use crate::error::{Diagnostic, Error, Exchange, Fault};
use crate::protocol::{aids, application_ids, EmvCard, ProcessingOptions};
use crate::transport::{CardTransport, Session};
use crate::tree::{Application, CardTree, ElementaryFile, PaymentDirectory, Record};

/// Objects requested with GET DATA when `read_data_objects` is set
const DATA_OBJECTS: [tags::EmvTag; 3] = [
    tags::APPLICATION_TRANSACTION_COUNTER,
    tags::LAST_ONLINE_ATC_REGISTER,
    tags::PIN_TRY_COUNTER,
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Go straight to AID probing without selecting a payment system directory
    pub skip_pse: bool,
    /// Read the transaction counters with GET DATA after each application's records
    pub read_data_objects: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    PseScan,
    PseDirectoryRead,
    AidProbe,
    ApplicationSelect,
    ProcessingOptions,
    RecordRead,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Idle => "Idle",
            State::PseScan => "Selecting payment system environment",
            State::PseDirectoryRead => "Reading payment system directory",
            State::AidProbe => "Probing known applications",
            State::ApplicationSelect => "Selecting application",
            State::ProcessingOptions => "Getting processing options",
            State::RecordRead => "Reading records",
        };
        f.write_str(name)
    }
}

/// Events emitted while a scan runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    State(State),
    ApplicationFound { aid: Vec<u8> },
    RecordRead { sfi: u8, record: u8 },
    Diagnostic(Diagnostic),
}

/// Result of one scan
#[derive(Debug)]
pub struct Scan {
    /// Everything read, also when `outcome` is an error
    pub tree: CardTree,
    pub outcome: Result<(), Error>,
}

impl Scan {
    /// "Ready" after a complete scan, otherwise the error that ended it
    pub fn status_message(&self) -> String {
        match &self.outcome {
            Ok(()) => "Ready".to_string(),
            Err(e) => e.to_string(),
        }
    }
}

/// Discovery engine
pub struct Discovery {
    config: DiscoveryConfig,
    cancel: CancellationToken,
    progress: Option<Sender<Progress>>,
}

impl Discovery {
    pub fn new(config: DiscoveryConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
            progress: None,
        }
    }

    /// Stop the scan before its next exchange once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_progress(mut self, progress: Sender<Progress>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Discover and read every application on the card in `reader`
    ///
    /// Opens one session for the directory phase and one per candidate
    /// application; each is closed before the next is opened.
    pub fn run<T: CardTransport + ?Sized>(&self, transport: &mut T, reader: &str) -> Scan {
        let mut tree = CardTree::default();
        let outcome = self.discover(transport, reader, &mut tree);

        match &outcome {
            Ok(()) => info!(
                applications = tree.applications.len(),
                diagnostics = tree.diagnostics.len(),
                "Scan complete"
            ),
            Err(e) => warn!(error = %e, applications = tree.applications.len(), "Scan aborted"),
        }
        self.enter(State::Idle);

        Scan { tree, outcome }
    }

    fn discover<T: CardTransport + ?Sized>(
        &self,
        transport: &mut T,
        reader: &str,
        tree: &mut CardTree,
    ) -> Result<(), Error> {
        let mut candidates = Vec::new();
        if self.config.skip_pse {
            debug!("Payment system environment skipped");
        } else {
            candidates = self.scan_pse(transport, reader, tree)?;
        }

        if candidates.is_empty() {
            self.enter(State::AidProbe);
            candidates = aids::CATALOGUE.iter().map(|(_, aid)| aid.to_vec()).collect();
        }

        for aid in &candidates {
            self.read_application(transport, reader, aid, tree)?;
        }
        Ok(())
    }

    /// Select the first directory that answers and collect its AIDs
    fn scan_pse<T: CardTransport + ?Sized>(
        &self,
        transport: &mut T,
        reader: &str,
        tree: &mut CardTree,
    ) -> Result<Vec<Vec<u8>>, Error> {
        self.enter(State::PseScan);
        self.check_cancelled()?;
        let mut session = Session::open(transport, reader)?;
        let mut card = EmvCard::new(&mut *session, &self.cancel);

        for name in aids::PAYMENT_SYSTEM_ENVIRONMENTS {
            let response = card.select(name)?;
            if response.is_success() {
                return self.read_directory(&mut card, name, &response, tree);
            }
            debug!(
                name = %String::from_utf8_lossy(name),
                sw = %response.status_string(),
                "Payment system environment not available"
            );
        }

        Ok(Vec::new())
    }

    fn read_directory<T: CardTransport + ?Sized>(
        &self,
        card: &mut EmvCard<'_, T>,
        name: &[u8],
        response: &ApduResponse,
        tree: &mut CardTree,
    ) -> Result<Vec<Vec<u8>>, Error> {
        self.enter(State::PseDirectoryRead);

        let fci = match Tlv::decode(response.data()) {
            Ok(fci) => fci,
            Err(source) => {
                let fault = Fault::MalformedEncoding {
                    exchange: Exchange::Select,
                    source,
                };
                self.diagnose(tree, Some(name), fault);
                return Ok(Vec::new());
            }
        };

        // Contactless directories list their applications in the FCI itself
        let mut candidates: Vec<Vec<u8>> = fci
            .find(tags::FCI_ISSUER_DISCRETIONARY_DATA.bytes())
            .map(|data| application_ids(data).collect())
            .unwrap_or_default();

        let sfi = fci
            .find(tags::SHORT_FILE_IDENTIFIER.bytes())
            .and_then(|tlv| tlv.value().first().copied());
        let mut directory = PaymentDirectory {
            name: name.to_vec(),
            fci,
            file: None,
        };

        if let Some(sfi) = sfi {
            let mut file = ElementaryFile::new(sfi);
            let outcome = self.read_directory_records(card, sfi, &mut file, &mut candidates, tree);
            directory.file = Some(file);
            tree.directory = Some(directory);
            outcome?;
        } else {
            tree.directory = Some(directory);
        }

        let mut unique: Vec<Vec<u8>> = Vec::with_capacity(candidates.len());
        for aid in candidates {
            if !unique.contains(&aid) {
                unique.push(aid);
            }
        }
        debug!(count = unique.len(), "Directory applications");
        Ok(unique)
    }

    fn read_directory_records<T: CardTransport + ?Sized>(
        &self,
        card: &mut EmvCard<'_, T>,
        sfi: u8,
        file: &mut ElementaryFile,
        candidates: &mut Vec<Vec<u8>>,
        tree: &mut CardTree,
    ) -> Result<(), Error> {
        for number in 1..=u8::MAX {
            let response = card.read_record(number, sfi)?;
            match response.status() {
                Status::Success => {}
                Status::RecordNotFound => break,
                _ => {
                    let fault = Fault::UnexpectedStatusWord {
                        exchange: Exchange::ReadRecord { sfi, record: number },
                        sw: response.status_word(),
                    };
                    self.diagnose(tree, None, fault);
                    break;
                }
            }

            match Tlv::decode(response.data()) {
                Ok(tlv) => {
                    candidates.extend(application_ids(&tlv));
                    self.emit(Progress::RecordRead { sfi, record: number });
                    file.records.push(Record {
                        number,
                        static_data_authentication: false,
                        tlv,
                    });
                }
                Err(source) => {
                    let fault = Fault::MalformedEncoding {
                        exchange: Exchange::ReadRecord { sfi, record: number },
                        source,
                    };
                    self.diagnose(tree, None, fault);
                }
            }
        }
        Ok(())
    }

    fn read_application<T: CardTransport + ?Sized>(
        &self,
        transport: &mut T,
        reader: &str,
        aid: &[u8],
        tree: &mut CardTree,
    ) -> Result<(), Error> {
        self.enter(State::ApplicationSelect);
        self.check_cancelled()?;
        let mut session = Session::open(transport, reader)?;
        let mut card = EmvCard::new(&mut *session, &self.cancel);

        let response = card.select(aid)?;
        match response.status() {
            Status::Success => {}
            Status::FileNotFound => {
                debug!(aid = %hex::encode_upper(aid), "Application not present");
                return Ok(());
            }
            _ => {
                let fault = Fault::UnexpectedStatusWord {
                    exchange: Exchange::Select,
                    sw: response.status_word(),
                };
                self.diagnose(tree, Some(aid), fault);
                return Ok(());
            }
        }

        let fci = match Tlv::decode(response.data()) {
            Ok(fci) => fci,
            Err(source) => {
                let fault = Fault::MalformedEncoding {
                    exchange: Exchange::Select,
                    source,
                };
                self.diagnose(tree, Some(aid), fault);
                return Ok(());
            }
        };

        info!(aid = %hex::encode_upper(aid), "Application found");
        self.emit(Progress::ApplicationFound { aid: aid.to_vec() });

        let mut application = Application::new(aid.to_vec(), fci);
        let outcome = self.read_records(&mut card, &mut application, tree);
        tree.applications.push(application);
        outcome
    }

    fn read_records<T: CardTransport + ?Sized>(
        &self,
        card: &mut EmvCard<'_, T>,
        application: &mut Application,
        tree: &mut CardTree,
    ) -> Result<(), Error> {
        self.enter(State::ProcessingOptions);
        let aid = application.aid.clone();

        let response = card.get_processing_options()?;
        if !response.is_success() {
            let fault = Fault::UnexpectedStatusWord {
                exchange: Exchange::GetProcessingOptions,
                sw: response.status_word(),
            };
            self.diagnose(tree, Some(&aid), fault);
            return Ok(());
        }

        let options = match Tlv::decode(response.data()) {
            Ok(template) => ProcessingOptions::from_template(template).map_err(Fault::from),
            Err(source) => Err(Fault::MalformedEncoding {
                exchange: Exchange::GetProcessingOptions,
                source,
            }),
        };
        let options = match options {
            Ok(options) => options,
            Err(fault) => {
                self.diagnose(tree, Some(&aid), fault);
                return Ok(());
            }
        };

        self.enter(State::RecordRead);
        let afl = options.afl.clone();
        application.processing = Some(options);

        for entry in &afl {
            for number in entry.records() {
                let exchange = Exchange::ReadRecord {
                    sfi: entry.sfi,
                    record: number,
                };
                let response = card.read_record(number, entry.sfi)?;
                match response.status() {
                    Status::Success => {}
                    Status::RecordNotFound => {
                        debug!(sfi = entry.sfi, record = number, "Record not found");
                        continue;
                    }
                    _ => {
                        let sw = response.status_word();
                        self.diagnose(tree, Some(&aid), Fault::UnexpectedStatusWord { exchange, sw });
                        continue;
                    }
                }

                match Tlv::decode(response.data()) {
                    Ok(tlv) => {
                        application.file_mut(entry.sfi).records.push(Record {
                            number,
                            static_data_authentication: entry.is_static(number),
                            tlv,
                        });
                        self.emit(Progress::RecordRead {
                            sfi: entry.sfi,
                            record: number,
                        });
                    }
                    Err(source) => {
                        self.diagnose(tree, Some(&aid), Fault::MalformedEncoding { exchange, source });
                    }
                }
            }
        }

        if self.config.read_data_objects {
            self.read_data_objects(card, application)?;
        }
        Ok(())
    }

    /// GET DATA for the optional counters; absent objects are not reported
    fn read_data_objects<T: CardTransport + ?Sized>(
        &self,
        card: &mut EmvCard<'_, T>,
        application: &mut Application,
    ) -> Result<(), Error> {
        for tag in DATA_OBJECTS {
            let response = card.get_data(tag.bytes())?;
            if !response.is_success() {
                debug!(tag = %hex::encode_upper(tag.bytes()), sw = %response.status_string(), "Data object not available");
                continue;
            }
            match Tlv::decode(response.data()) {
                Ok(tlv) => application.data_objects.push(tlv),
                Err(e) => debug!(tag = %hex::encode_upper(tag.bytes()), error = %e, "Ignoring malformed data object"),
            }
        }
        Ok(())
    }

    fn check_cancelled(&self) -> Result<(), Error> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    fn enter(&self, state: State) {
        debug!(%state, "Discovery state");
        self.emit(Progress::State(state));
    }

    fn diagnose(&self, tree: &mut CardTree, aid: Option<&[u8]>, fault: Fault) {
        let diagnostic = Diagnostic {
            aid: aid.map(<[u8]>::to_vec),
            fault,
        };
        warn!("{}", diagnostic);
        self.emit(Progress::Diagnostic(diagnostic.clone()));
        tree.diagnostics.push(diagnostic);
    }

    fn emit(&self, event: Progress) {
        if let Some(progress) = &self.progress {
            // A caller that stopped listening does not stop the scan
            let _ = progress.send(event);
        }
    }
}
