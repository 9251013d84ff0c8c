//! EMV Card - Smart card reading and EMV application discovery
//!
//! This crate provides APDU framing, a transport abstraction with a PC/SC
//! implementation, and the discovery engine that finds the payment
//! applications on a card and reads their records into a [`CardTree`].
//!
//! ```no_run
//! use emv_card::{CardReader, Discovery, DiscoveryConfig};
//!
//! let mut reader = CardReader::new()?;
//! let name = reader.find_card()?;
//! let scan = Discovery::new(DiscoveryConfig::default()).run(&mut reader, &name);
//! println!("{} application(s): {}", scan.tree.applications.len(), scan.status_message());
//! # Ok::<(), emv_card::TransportError>(())
//! ```

pub mod apdu;
pub mod cancel;
pub mod discovery;
pub mod error;
pub mod protocol;
pub mod reader;
pub mod transport;
pub mod tree;

pub use apdu::{ApduCommand, ApduResponse, Status};
pub use cancel::CancellationToken;
pub use discovery::{Discovery, DiscoveryConfig, Progress, Scan, State};
pub use error::{Diagnostic, Error, Exchange, Fault, Violation};
pub use protocol::{AflEntry, EmvCard, ProcessingOptions};
pub use reader::{CardReader, ReaderEvent, ReaderMonitor};
pub use transport::{CardTransport, Session, TransportError};
pub use tree::{Application, CardTree, ElementaryFile, Node, PaymentDirectory, Record};
