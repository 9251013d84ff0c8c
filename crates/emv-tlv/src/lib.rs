//! EMV TLV - BER-TLV codec and tag dictionary for EMV card data
//!
//! Card responses (FCI templates, processing options, records) are nested
//! BER-TLV structures. [`Tlv::decode`] turns them into a tree and
//! [`Tlv::encode`] turns a decoded tree back into the same bytes.
//!
//! ```
//! use emv_tlv::{tags, Tlv};
//!
//! let fci = Tlv::decode(&[0x6F, 0x05, 0xA5, 0x03, 0x88, 0x01, 0x01]).unwrap();
//! let sfi = fci.find(tags::SHORT_FILE_IDENTIFIER.bytes()).unwrap();
//! assert_eq!(sfi.value(), &[0x01]);
//! assert_eq!(fci.encode(), vec![0x6F, 0x05, 0xA5, 0x03, 0x88, 0x01, 0x01]);
//! ```

pub mod tags;
mod tlv;

pub use tags::{lookup_description, tag_name, EmvTag};
pub use tlv::{encode_length, Tlv, TlvError};
