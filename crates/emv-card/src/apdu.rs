//! APDU (Application Protocol Data Unit) command and response framing

use thiserror::Error;

/// Errors raised while framing APDUs
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApduError {
    #[error("response too short: expected at least 2 bytes, got {0}")]
    ResponseTooShort(usize),
}

/// Status word classes the discovery engine acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// 9000
    Success,
    /// 61xx: xx bytes are waiting for a GET RESPONSE
    MoreData(u8),
    /// 6Cxx: repeat the command with Le = xx
    WrongLength(u8),
    /// 6A82
    FileNotFound,
    /// 6A83
    RecordNotFound,
    /// Anything else
    Other(u16),
}

/// APDU response containing data and status word
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduResponse {
    /// Response data (without status word), `None` if the card sent only SW1 SW2
    pub data: Option<Vec<u8>>,
    /// Status word SW1
    pub sw1: u8,
    /// Status word SW2
    pub sw2: u8,
}

impl ApduResponse {
    /// Split raw card bytes into data and status word
    pub fn parse(raw: &[u8]) -> Result<Self, ApduError> {
        if raw.len() < 2 {
            return Err(ApduError::ResponseTooShort(raw.len()));
        }

        let (data, sw) = raw.split_at(raw.len() - 2);
        Ok(Self {
            data: (!data.is_empty()).then(|| data.to_vec()),
            sw1: sw[0],
            sw2: sw[1],
        })
    }

    /// Check if the response indicates success (9000)
    pub fn is_success(&self) -> bool {
        self.sw1 == 0x90 && self.sw2 == 0x00
    }

    /// Get the full status word as a 16-bit value
    pub fn status_word(&self) -> u16 {
        ((self.sw1 as u16) << 8) | (self.sw2 as u16)
    }

    /// Get status word as hex string (e.g., "9000")
    pub fn status_string(&self) -> String {
        format!("{:02X}{:02X}", self.sw1, self.sw2)
    }

    pub fn status(&self) -> Status {
        match (self.sw1, self.sw2) {
            (0x90, 0x00) => Status::Success,
            (0x61, len) => Status::MoreData(len),
            (0x6C, len) => Status::WrongLength(len),
            (0x6A, 0x82) => Status::FileNotFound,
            (0x6A, 0x83) => Status::RecordNotFound,
            _ => Status::Other(self.status_word()),
        }
    }

    /// Response data, empty if the card sent none
    pub fn data(&self) -> &[u8] {
        self.data.as_deref().unwrap_or_default()
    }
}

/// APDU command builder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduCommand {
    pub cla: u8,
    pub ins: u8,
    pub p1: u8,
    pub p2: u8,
    pub data: Option<Vec<u8>>,
    pub le: u8,
}

impl ApduCommand {
    /// Create a new APDU command
    pub fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: None,
            le: 0,
        }
    }

    /// Set command data
    ///
    /// Lc is a single byte, so `data` holds at most 255 bytes.
    pub fn data(mut self, data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        debug_assert!(data.len() <= 0xFF, "command data of {} bytes does not fit a short Lc", data.len());
        self.data = Some(data);
        self
    }

    /// Set expected response length
    pub fn le(mut self, le: u8) -> Self {
        self.le = le;
        self
    }

    /// Build the APDU command bytes
    ///
    /// With data: `CLA INS P1 P2 Lc data`, Le is implied by the data length
    /// and never appended. Without data: `CLA INS P1 P2 [Le]`, Le only when
    /// it is non-zero.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut apdu = vec![self.cla, self.ins, self.p1, self.p2];

        match &self.data {
            Some(data) => {
                apdu.push(data.len() as u8);
                apdu.extend_from_slice(data);
            }
            None if self.le != 0 => apdu.push(self.le),
            None => {}
        }

        apdu
    }
}

/// Common EMV APDU commands
pub mod commands {
    use super::ApduCommand;

    /// SELECT command (by name/AID)
    pub fn select(aid: &[u8]) -> ApduCommand {
        ApduCommand::new(0x00, 0xA4, 0x04, 0x00).data(aid)
    }

    /// GET RESPONSE for the `le` bytes announced by a 61xx status
    pub fn get_response(le: u8) -> ApduCommand {
        ApduCommand::new(0x00, 0xC0, 0x00, 0x00).le(le)
    }

    /// GET PROCESSING OPTIONS command
    pub fn get_processing_options(pdol_data: &[u8]) -> ApduCommand {
        ApduCommand::new(0x80, 0xA8, 0x00, 0x00).data(pdol_data)
    }

    /// READ RECORD command
    pub fn read_record(record_number: u8, sfi: u8) -> ApduCommand {
        let p2 = (sfi << 3) | 0x04;
        ApduCommand::new(0x00, 0xB2, record_number, p2)
    }

    /// GET DATA command for a one or two byte tag
    pub fn get_data(tag: &[u8]) -> ApduCommand {
        match *tag {
            [p2] => ApduCommand::new(0x80, 0xCA, 0x00, p2),
            [p1, p2, ..] => ApduCommand::new(0x80, 0xCA, p1, p2),
            [] => ApduCommand::new(0x80, 0xCA, 0x00, 0x00),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_only() {
        let apdu = commands::read_record(1, 2);
        assert_eq!(apdu.to_bytes(), vec![0x00, 0xB2, 0x01, 0x14]);
    }

    #[test]
    fn test_le_appended_when_non_zero() {
        let apdu = commands::read_record(1, 2).le(0x1A);
        assert_eq!(apdu.to_bytes(), vec![0x00, 0xB2, 0x01, 0x14, 0x1A]);
        assert_eq!(commands::get_response(0x05).to_bytes(), vec![0x00, 0xC0, 0x00, 0x00, 0x05]);
    }

    #[test]
    fn test_data_carries_lc_and_no_le() {
        let apdu = commands::select(b"1PAY.SYS.DDF01").le(0x10);
        let bytes = apdu.to_bytes();
        assert_eq!(&bytes[..5], &[0x00, 0xA4, 0x04, 0x00, 14]);
        assert_eq!(&bytes[5..], b"1PAY.SYS.DDF01");

        let gpo = commands::get_processing_options(&[0x83, 0x00]);
        assert_eq!(gpo.to_bytes(), vec![0x80, 0xA8, 0x00, 0x00, 0x02, 0x83, 0x00]);
    }

    #[test]
    fn test_largest_short_lc() {
        let bytes = ApduCommand::new(0x00, 0xA4, 0x04, 0x00).data(vec![0xAA; 255]).to_bytes();
        assert_eq!(bytes[4], 0xFF);
        assert_eq!(bytes.len(), 5 + 255);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "does not fit a short Lc")]
    fn test_oversized_data_rejected() {
        let _ = ApduCommand::new(0x00, 0xA4, 0x04, 0x00).data(vec![0xAA; 256]);
    }

    #[test]
    fn test_get_data() {
        assert_eq!(commands::get_data(&[0x9F, 0x36]).to_bytes(), vec![0x80, 0xCA, 0x9F, 0x36]);
        assert_eq!(commands::get_data(&[0xC1]).to_bytes(), vec![0x80, 0xCA, 0x00, 0xC1]);
    }

    #[test]
    fn test_parse_response() {
        let response = ApduResponse::parse(&[0x6F, 0x00, 0x90, 0x00]).unwrap();
        assert_eq!(response.data, Some(vec![0x6F, 0x00]));
        assert!(response.is_success());
        assert_eq!(response.status(), Status::Success);
        assert_eq!(response.status_string(), "9000");
    }

    #[test]
    fn test_parse_status_only() {
        let response = ApduResponse::parse(&[0x6A, 0x82]).unwrap();
        assert_eq!(response.data, None);
        assert!(response.data().is_empty());
        assert_eq!(response.status_word(), 0x6A82);
        assert_eq!(response.status(), Status::FileNotFound);
    }

    #[test]
    fn test_parse_too_short() {
        assert_eq!(ApduResponse::parse(&[0x90]), Err(ApduError::ResponseTooShort(1)));
        assert_eq!(ApduResponse::parse(&[]), Err(ApduError::ResponseTooShort(0)));
    }

    #[test]
    fn test_status_classes() {
        let status = |sw1, sw2| ApduResponse { data: None, sw1, sw2 }.status();
        assert_eq!(status(0x61, 0x05), Status::MoreData(5));
        assert_eq!(status(0x6C, 0x1A), Status::WrongLength(0x1A));
        assert_eq!(status(0x6A, 0x83), Status::RecordNotFound);
        assert_eq!(status(0x6A, 0x81), Status::Other(0x6A81));
        assert_eq!(status(0x90, 0x01), Status::Other(0x9001));
    }
}
