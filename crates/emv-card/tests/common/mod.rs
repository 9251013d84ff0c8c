//! Scripted in-memory card for driving the discovery engine without hardware

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};

use emv_card::apdu::ApduCommand;
use emv_card::{CancellationToken, CardTransport, TransportError};
use emv_tlv::Tlv;

pub const READER: &str = "Scripted Reader 00";

/// Replies to commands by exact byte match, anything unscripted gets 6A82
#[derive(Default)]
pub struct ScriptedCard {
    replies: HashMap<Vec<u8>, VecDeque<Vec<u8>>>,
    failures: Vec<Vec<u8>>,
    cancel_on: Option<(Vec<u8>, CancellationToken)>,
    connected: bool,
    pub sent: Vec<Vec<u8>>,
    pub connects: usize,
    pub disconnects: usize,
}

impl ScriptedCard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for `command`; the last reply queued repeats
    pub fn reply(mut self, command: &ApduCommand, response: Vec<u8>) -> Self {
        self.replies
            .entry(command.to_bytes())
            .or_default()
            .push_back(response);
        self
    }

    /// Fail the exchange with a transport error when `command` is sent
    pub fn fail(mut self, command: &ApduCommand) -> Self {
        self.failures.push(command.to_bytes());
        self
    }

    /// Cancel `token` while `command` is in flight
    pub fn cancel_on(mut self, command: &ApduCommand, token: CancellationToken) -> Self {
        self.cancel_on = Some((command.to_bytes(), token));
        self
    }

    pub fn sent_count(&self, command: &ApduCommand) -> usize {
        let bytes = command.to_bytes();
        self.sent.iter().filter(|sent| **sent == bytes).count()
    }

    pub fn was_sent(&self, command: &ApduCommand) -> bool {
        self.sent_count(command) > 0
    }

    /// Commands with the given instruction byte, in order
    pub fn sent_with_ins(&self, ins: u8) -> Vec<Vec<u8>> {
        self.sent.iter().filter(|sent| sent[1] == ins).cloned().collect()
    }
}

impl CardTransport for ScriptedCard {
    fn list_readers(&self) -> Result<Vec<String>, TransportError> {
        Ok(vec![READER.to_string()])
    }

    fn connect(&mut self, reader: &str) -> Result<(), TransportError> {
        if self.connected {
            return Err(TransportError::AlreadyConnected(reader.to_string()));
        }
        if reader != READER {
            return Err(TransportError::ReaderNotFound(reader.to_string()));
        }
        self.connected = true;
        self.connects += 1;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        if self.connected {
            self.connected = false;
            self.disconnects += 1;
        }
        Ok(())
    }

    fn transmit_raw(&mut self, command: &[u8]) -> Result<Vec<u8>, TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        self.sent.push(command.to_vec());

        if let Some((trigger, token)) = &self.cancel_on {
            if trigger.as_slice() == command {
                token.cancel();
            }
        }
        if self.failures.iter().any(|failure| failure.as_slice() == command) {
            return Err(TransportError::Unavailable("card removed".into()));
        }

        let reply = match self.replies.get_mut(command) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        Ok(reply.unwrap_or_else(|| vec![0x6A, 0x82]))
    }
}

/// `data` followed by 9000
pub fn ok(data: &[u8]) -> Vec<u8> {
    let mut response = data.to_vec();
    response.extend_from_slice(&[0x90, 0x00]);
    response
}

pub fn sw(sw1: u8, sw2: u8) -> Vec<u8> {
    vec![sw1, sw2]
}

pub fn bytes(hex_str: &str) -> Vec<u8> {
    hex::decode(hex_str).unwrap()
}

/// FCI for an application with a label
pub fn application_fci(aid: &[u8], label: &str) -> Vec<u8> {
    Tlv::constructed(
        vec![0x6F],
        vec![
            Tlv::new(vec![0x84], aid.to_vec()),
            Tlv::constructed(vec![0xA5], vec![Tlv::new(vec![0x50], label.as_bytes().to_vec())]),
        ],
    )
    .encode()
}

/// FCI for a payment system directory whose records live in `sfi`
pub fn directory_fci(name: &[u8], sfi: u8) -> Vec<u8> {
    Tlv::constructed(
        vec![0x6F],
        vec![
            Tlv::new(vec![0x84], name.to_vec()),
            Tlv::constructed(vec![0xA5], vec![Tlv::new(vec![0x88], vec![sfi])]),
        ],
    )
    .encode()
}

/// Contactless directory FCI listing `aids` under BF0C
pub fn contactless_fci(name: &[u8], aids: &[&[u8]]) -> Vec<u8> {
    let templates = aids
        .iter()
        .map(|aid| {
            Tlv::constructed(
                vec![0x61],
                vec![Tlv::new(vec![0x4F], aid.to_vec()), Tlv::new(vec![0x87], vec![0x01])],
            )
        })
        .collect();
    Tlv::constructed(
        vec![0x6F],
        vec![
            Tlv::new(vec![0x84], name.to_vec()),
            Tlv::constructed(vec![0xA5], vec![Tlv::constructed(vec![0xBF, 0x0C], templates)]),
        ],
    )
    .encode()
}

/// Directory record listing `aids`
pub fn directory_record(aids: &[&[u8]]) -> Vec<u8> {
    let templates = aids
        .iter()
        .map(|aid| Tlv::constructed(vec![0x61], vec![Tlv::new(vec![0x4F], aid.to_vec())]))
        .collect();
    Tlv::constructed(vec![0x70], templates).encode()
}

/// Format 1 GPO response
pub fn gpo_format_1(aip: [u8; 2], afl: &[u8]) -> Vec<u8> {
    let mut value = aip.to_vec();
    value.extend_from_slice(afl);
    Tlv::new(vec![0x80], value).encode()
}

/// Record template holding a single PAN
pub fn pan_record(pan: &str) -> Vec<u8> {
    Tlv::constructed(vec![0x70], vec![Tlv::new(vec![0x5A], bytes(pan))]).encode()
}
