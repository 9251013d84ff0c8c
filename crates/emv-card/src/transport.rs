//! Card transport contract
//!
//! The discovery engine talks to the card through [`CardTransport`]. The
//! PC/SC implementation lives in [`crate::reader`]; tests plug in scripted
//! transports.

use std::ops::{Deref, DerefMut};

use thiserror::Error;
use tracing::{trace, warn};

use crate::apdu::{ApduCommand, ApduError, ApduResponse};

/// Failures at the reader/driver boundary
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("PC/SC error: {0}")]
    Pcsc(#[from] pcsc::Error),

    #[error("no card readers available")]
    NoReadersAvailable,

    #[error("reader not found: {0}")]
    ReaderNotFound(String),

    #[error("not connected to a card")]
    NotConnected,

    #[error("already connected to {0}")]
    AlreadyConnected(String),

    #[error("malformed card response: {0}")]
    Response(#[from] ApduError),

    #[error("{0}")]
    Unavailable(String),
}

/// Reader operations the discovery engine consumes
///
/// At most one connection is open at a time: `connect` on a connected
/// transport fails with [`TransportError::AlreadyConnected`].
pub trait CardTransport {
    /// Names of the readers known to the driver
    fn list_readers(&self) -> Result<Vec<String>, TransportError>;

    /// Open a connection to the card in `reader`
    fn connect(&mut self, reader: &str) -> Result<(), TransportError>;

    /// Close the current connection
    fn disconnect(&mut self) -> Result<(), TransportError>;

    /// Exchange raw bytes with the connected card
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Vec<u8>, TransportError>;

    /// Send a framed command and parse the card's answer
    fn transmit(&mut self, command: &ApduCommand) -> Result<ApduResponse, TransportError> {
        let bytes = command.to_bytes();
        trace!(apdu = %hex::encode_upper(&bytes), "C-APDU");

        let raw = self.transmit_raw(&bytes)?;
        trace!(apdu = %hex::encode_upper(&raw), "R-APDU");

        Ok(ApduResponse::parse(&raw)?)
    }
}

/// An open connection, disconnected when dropped
///
/// Every path out of a scan (success, error, cancellation, panic) releases
/// the reader through this guard.
pub struct Session<'a, T: CardTransport + ?Sized> {
    transport: &'a mut T,
    reader: String,
}

impl<'a, T: CardTransport + ?Sized> Session<'a, T> {
    pub fn open(transport: &'a mut T, reader: &str) -> Result<Self, TransportError> {
        transport.connect(reader)?;
        Ok(Self {
            transport,
            reader: reader.to_string(),
        })
    }

    pub fn reader(&self) -> &str {
        &self.reader
    }
}

impl<T: CardTransport + ?Sized> Deref for Session<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &*self.transport
    }
}

impl<T: CardTransport + ?Sized> DerefMut for Session<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut *self.transport
    }
}

impl<T: CardTransport + ?Sized> Drop for Session<'_, T> {
    fn drop(&mut self) {
        if let Err(e) = self.transport.disconnect() {
            warn!(reader = %self.reader(), error = %e, "Failed to disconnect");
        }
    }
}
