//! EMV protocol implementation

use emv_tlv::{tags, Tlv};

use crate::apdu::{commands, ApduCommand, ApduResponse, Status};
use crate::cancel::CancellationToken;
use crate::error::{Error, Violation};
use crate::transport::CardTransport;

/// Known EMV Application Identifiers (AIDs)
pub mod aids {
    /// PSE (Payment System Environment)
    pub const PSE: &[u8] = b"1PAY.SYS.DDF01";

    /// PPSE (Proximity Payment System Environment)
    pub const PPSE: &[u8] = b"2PAY.SYS.DDF01";

    /// Directory names tried before probing, in order
    pub const PAYMENT_SYSTEM_ENVIRONMENTS: [&[u8]; 2] = [PSE, PPSE];

    /// Visa
    pub const VISA: &[u8] = &[0xA0, 0x00, 0x00, 0x00, 0x03, 0x10, 0x10];

    /// Mastercard
    pub const MASTERCARD: &[u8] = &[0xA0, 0x00, 0x00, 0x00, 0x04, 0x10, 0x10];

    /// Probe catalogue for cards without a usable directory
    pub const CATALOGUE: &[(&str, &[u8])] = &[
        ("Visa", &[0xA0, 0x00, 0x00, 0x00, 0x03]),
        ("Visa Debit/Credit", VISA),
        ("Visa Credit", &[0xA0, 0x00, 0x00, 0x00, 0x03, 0x10, 0x10, 0x01]),
        ("Visa Debit", &[0xA0, 0x00, 0x00, 0x00, 0x03, 0x10, 0x10, 0x02]),
        ("Visa Electron", &[0xA0, 0x00, 0x00, 0x00, 0x03, 0x20, 0x10]),
        ("Visa Interlink", &[0xA0, 0x00, 0x00, 0x00, 0x03, 0x30, 0x10]),
        ("Visa Plus", &[0xA0, 0x00, 0x00, 0x00, 0x03, 0x80, 0x10]),
        ("Visa ATM", &[0xA0, 0x00, 0x00, 0x00, 0x03, 0x99, 0x99, 0x10]),
        ("Mastercard", MASTERCARD),
        ("Mastercard Cirrus", &[0xA0, 0x00, 0x00, 0x00, 0x04, 0x80, 0x10]),
        ("Maestro", &[0xA0, 0x00, 0x00, 0x00, 0x04, 0x30, 0x60]),
        ("Maestro UK", &[0xA0, 0x00, 0x00, 0x00, 0x05, 0x00, 0x01]),
        ("Self Service", &[0xA0, 0x00, 0x00, 0x00, 0x24, 0x01]),
        ("American Express", &[0xA0, 0x00, 0x00, 0x00, 0x25]),
        ("American Express", &[0xA0, 0x00, 0x00, 0x00, 0x25, 0x01, 0x01, 0x04]),
        ("American Express", &[0xA0, 0x00, 0x00, 0x00, 0x25, 0x01, 0x07, 0x01]),
        ("Link ATM", &[0xA0, 0x00, 0x00, 0x00, 0x29, 0x10, 0x10]),
        ("Test", &[0xB0, 0x12, 0x34, 0x56, 0x78]),
        ("JCB", &[0xA0, 0x00, 0x00, 0x00, 0x65, 0x10, 0x10]),
    ];
}

/// Command data for GET PROCESSING OPTIONS with an empty PDOL
pub const EMPTY_PDOL_DATA: [u8; 2] = [0x83, 0x00];

/// One Application File Locator entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AflEntry {
    pub sfi: u8,
    pub first_record: u8,
    pub last_record: u8,
    /// Records numbered up to this count take part in offline data authentication
    pub offline_records: u8,
}

impl AflEntry {
    /// Whether `record` is a static data authentication record
    pub fn is_static(&self, record: u8) -> bool {
        record <= self.offline_records
    }

    pub fn records(&self) -> std::ops::RangeInclusive<u8> {
        self.first_record..=self.last_record
    }
}

/// Parse AFL (Application File Locator) bytes into entries
///
/// Each 4-byte group is SFI (upper 5 bits), first record, last record and
/// the number of records involved in offline data authentication.
pub fn parse_afl(afl: &[u8]) -> Result<Vec<AflEntry>, Violation> {
    if afl.len() % 4 != 0 {
        return Err(Violation::AflLength(afl.len()));
    }

    afl.chunks_exact(4)
        .map(|chunk| {
            let entry = AflEntry {
                sfi: chunk[0] >> 3,
                first_record: chunk[1],
                last_record: chunk[2],
                offline_records: chunk[3],
            };
            if entry.first_record == 0 || entry.first_record > entry.last_record {
                return Err(Violation::AflRange {
                    sfi: entry.sfi,
                    first: entry.first_record,
                    last: entry.last_record,
                });
            }
            Ok(entry)
        })
        .collect()
}

/// Decoded GET PROCESSING OPTIONS response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingOptions {
    /// Response template as returned by the card (tag 80 or 77)
    pub template: Tlv,
    pub aip: Vec<u8>,
    pub afl: Vec<AflEntry>,
}

impl ProcessingOptions {
    /// Extract AIP and AFL from a Format 1 or Format 2 response template
    pub fn from_template(template: Tlv) -> Result<Self, Violation> {
        let (aip, afl) = if template.tag() == tags::RESPONSE_MESSAGE_TEMPLATE_FORMAT_1.bytes() {
            // Format 1: AIP (2 bytes) followed by the AFL
            let value = template.value();
            if value.len() < 2 {
                return Err(Violation::MissingObject("Application Interchange Profile"));
            }
            let (aip, afl) = value.split_at(2);
            (aip.to_vec(), parse_afl(afl)?)
        } else if template.tag() == tags::RESPONSE_MESSAGE_TEMPLATE_FORMAT_2.bytes() {
            let aip = template
                .child(tags::AIP.bytes())
                .ok_or(Violation::MissingObject("Application Interchange Profile"))?;
            let afl = template
                .child(tags::AFL.bytes())
                .ok_or(Violation::MissingObject("Application File Locator"))?;
            (aip.value().to_vec(), parse_afl(afl.value())?)
        } else {
            return Err(Violation::UnknownTemplate(template.tag_hex()));
        };

        Ok(Self { template, aip, afl })
    }
}

/// Collect the AIDs of every application template (tag 61) directly under `tlv`
pub fn application_ids(tlv: &Tlv) -> impl Iterator<Item = Vec<u8>> + '_ {
    tlv.children_with(tags::APPLICATION_TEMPLATE.bytes())
        .filter_map(|template| template.child(tags::APPLICATION_IDENTIFIER.bytes()))
        .map(|aid| aid.value().to_vec())
}

/// EMV card interface
///
/// Wraps an open connection and applies the status word rules shared by
/// every exchange: 61xx is followed by GET RESPONSE, 6Cxx repeats the
/// command with the length the card asked for.
pub struct EmvCard<'a, T: CardTransport + ?Sized> {
    transport: &'a mut T,
    cancel: &'a CancellationToken,
}

impl<'a, T: CardTransport + ?Sized> EmvCard<'a, T> {
    pub fn new(transport: &'a mut T, cancel: &'a CancellationToken) -> Self {
        Self { transport, cancel }
    }

    /// Select an application or directory by name
    pub fn select(&mut self, aid: &[u8]) -> Result<ApduResponse, Error> {
        let response = self.transmit(&commands::select(aid))?;
        self.continue_response(response)
    }

    /// Send GET PROCESSING OPTIONS with an empty PDOL
    pub fn get_processing_options(&mut self) -> Result<ApduResponse, Error> {
        let response = self.transmit(&commands::get_processing_options(&EMPTY_PDOL_DATA))?;
        self.continue_response(response)
    }

    /// Read a single record from the card
    pub fn read_record(&mut self, record_number: u8, sfi: u8) -> Result<ApduResponse, Error> {
        self.transmit_with_retry(commands::read_record(record_number, sfi))
    }

    /// Read a primitive data object with GET DATA
    pub fn get_data(&mut self, tag: &[u8]) -> Result<ApduResponse, Error> {
        self.transmit_with_retry(commands::get_data(tag))
    }

    fn transmit(&mut self, command: &ApduCommand) -> Result<ApduResponse, Error> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(self.transport.transmit(command)?)
    }

    fn continue_response(&mut self, response: ApduResponse) -> Result<ApduResponse, Error> {
        match response.status() {
            Status::MoreData(le) => self.transmit(&commands::get_response(le)),
            _ => Ok(response),
        }
    }

    fn transmit_with_retry(&mut self, command: ApduCommand) -> Result<ApduResponse, Error> {
        let response = self.transmit(&command)?;
        let response = match response.status() {
            Status::WrongLength(le) => self.transmit(&command.le(le))?,
            _ => response,
        };
        self.continue_response(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aids() {
        assert_eq!(aids::VISA.len(), 7);
        assert_eq!(aids::MASTERCARD.len(), 7);
        assert_eq!(aids::PSE, b"1PAY.SYS.DDF01");
        assert_eq!(aids::CATALOGUE.len(), 19);
        assert_eq!(aids::CATALOGUE[0].1, &[0xA0, 0x00, 0x00, 0x00, 0x03]);
    }

    #[test]
    fn test_parse_afl() {
        let afl = parse_afl(&hex::decode("08010100100102011801020018040400").unwrap()).unwrap();
        assert_eq!(afl.len(), 4);
        assert_eq!(
            afl[1],
            AflEntry {
                sfi: 2,
                first_record: 1,
                last_record: 2,
                offline_records: 1,
            }
        );
        assert!(afl[1].is_static(1));
        assert!(!afl[1].is_static(2));
        assert_eq!(afl[3].records().collect::<Vec<_>>(), vec![4]);
    }

    #[test]
    fn test_parse_afl_rejects_partial_entry() {
        assert_eq!(parse_afl(&[0x08, 0x01, 0x01, 0x00, 0x10]), Err(Violation::AflLength(5)));
    }

    #[test]
    fn test_parse_afl_rejects_bad_range() {
        assert_eq!(
            parse_afl(&[0x10, 0x03, 0x01, 0x00]),
            Err(Violation::AflRange { sfi: 2, first: 3, last: 1 })
        );
        assert!(parse_afl(&[0x10, 0x00, 0x01, 0x00]).is_err());
    }

    #[test]
    fn test_format_1() {
        let template = Tlv::decode(&hex::decode("800A19800801010010010301").unwrap()).unwrap();
        let options = ProcessingOptions::from_template(template).unwrap();
        assert_eq!(options.aip, vec![0x19, 0x80]);
        assert_eq!(options.afl.len(), 2);
        assert_eq!(options.afl[1].sfi, 2);
        assert_eq!(options.afl[1].last_record, 3);
    }

    #[test]
    fn test_format_2() {
        let template = Tlv::decode(&hex::decode("770A82021980940410010301").unwrap()).unwrap();
        let options = ProcessingOptions::from_template(template).unwrap();
        assert_eq!(options.aip, vec![0x19, 0x80]);
        assert_eq!(options.afl[0].sfi, 2);
        assert_eq!(options.afl[0].offline_records, 1);
    }

    #[test]
    fn test_unknown_template() {
        let template = Tlv::new(vec![0x6F], vec![0x00]);
        assert_eq!(
            ProcessingOptions::from_template(template),
            Err(Violation::UnknownTemplate("6F".into()))
        );
    }

    #[test]
    fn test_format_2_without_afl() {
        let template = Tlv::decode(&hex::decode("770482021980").unwrap()).unwrap();
        assert_eq!(
            ProcessingOptions::from_template(template),
            Err(Violation::MissingObject("Application File Locator"))
        );
    }

    #[test]
    fn test_application_ids() {
        // A stray AID outside any application template is not a candidate
        let record = Tlv::decode(
            &hex::decode("70144F07A000000003101061094F07A0000000041010").unwrap(),
        )
        .unwrap();
        let ids: Vec<_> = application_ids(&record).collect();
        assert_eq!(ids, vec![hex::decode("A0000000041010").unwrap()]);
    }
}
