//! Scan errors and per-application diagnostics

use std::fmt;

use emv_tlv::TlvError;
use thiserror::Error;

use crate::transport::TransportError;

/// Errors that end a scan
///
/// Results collected before the error are kept; see [`crate::Scan`].
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("scan cancelled")]
    Cancelled,
}

/// The command exchange a fault was observed on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exchange {
    Select,
    GetProcessingOptions,
    ReadRecord { sfi: u8, record: u8 },
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exchange::Select => write!(f, "SELECT"),
            Exchange::GetProcessingOptions => write!(f, "GET PROCESSING OPTIONS"),
            Exchange::ReadRecord { sfi, record } => {
                write!(f, "READ RECORD (SFI {:02X}, record {:02X})", sfi, record)
            }
        }
    }
}

/// Malformed processing options
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("AFL length {0} is not a multiple of 4")]
    AflLength(usize),

    #[error("AFL entry for SFI {sfi:02X} has an invalid record range {first}..={last}")]
    AflRange { sfi: u8, first: u8, last: u8 },

    #[error("unrecognized processing options template {0}")]
    UnknownTemplate(String),

    #[error("processing options template is missing {0}")]
    MissingObject(&'static str),
}

/// Problems confined to one application or record
///
/// These never stop a scan; they are recorded as [`Diagnostic`]s.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    #[error("malformed response to {exchange}: {source}")]
    MalformedEncoding {
        exchange: Exchange,
        #[source]
        source: TlvError,
    },

    #[error("unexpected response from {exchange} command: 0x{sw:04X}")]
    UnexpectedStatusWord { exchange: Exchange, sw: u16 },

    #[error("protocol violation: {0}")]
    ProtocolViolation(#[from] Violation),
}

/// A fault together with the application it occurred in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// AID (or directory name) being processed, if any
    pub aid: Option<Vec<u8>>,
    pub fault: Fault,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.aid {
            Some(aid) => write!(f, "{}: {}", hex::encode_upper(aid), self.fault),
            None => write!(f, "{}", self.fault),
        }
    }
}
