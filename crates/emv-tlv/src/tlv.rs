//! BER-TLV tree decoding and encoding
//!
//! A [`Tlv`] owns its tag bytes, its raw value bytes and, when the tag is
//! constructed (bit 0x20 of the first tag byte), the child objects decoded
//! from that value. The raw value is kept for constructed objects too, so a
//! decoded tree always re-encodes to the exact bytes it came from.

use thiserror::Error;

/// Maximum nesting of constructed objects accepted by the decoder
const MAX_DEPTH: usize = 32;

/// Malformed BER-TLV encodings
///
/// Offsets are relative to the start of the buffer handed to the decoder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TlvError {
    #[error("empty input")]
    Empty,

    #[error("unexpected end of data while parsing tag at offset {offset}")]
    TruncatedTag { offset: usize },

    #[error("unexpected end of data while parsing length at offset {offset}")]
    TruncatedLength { offset: usize },

    #[error("indefinite length encoding at offset {offset} is not supported")]
    IndefiniteLength { offset: usize },

    #[error("length at offset {offset} uses {octets} octets, at most 4 are supported")]
    LengthTooLarge { offset: usize, octets: u8 },

    #[error("value at offset {offset} needs {needed} bytes, only {available} available")]
    TruncatedValue {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("constructed objects nested too deeply at offset {offset}")]
    TooDeep { offset: usize },
}

/// A decoded (or built) BER-TLV object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tlv {
    tag: Vec<u8>,
    value: Vec<u8>,
    children: Vec<Tlv>,
    /// Long-form length octets seen on the wire, 0 for the short form
    length_octets: u8,
}

impl Tlv {
    /// Create a primitive object
    pub fn new(tag: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            tag: tag.into(),
            value: value.into(),
            children: Vec::new(),
            length_octets: 0,
        }
    }

    /// Create a constructed object; its value is the encoding of `children`
    pub fn constructed(tag: impl Into<Vec<u8>>, children: Vec<Tlv>) -> Self {
        let value = children.iter().flat_map(Tlv::encode).collect();
        Self {
            tag: tag.into(),
            value,
            children,
            length_octets: 0,
        }
    }

    /// Decode the first object in `data`
    ///
    /// Bytes following the first object are ignored.
    pub fn decode(data: &[u8]) -> Result<Self, TlvError> {
        if data.is_empty() {
            return Err(TlvError::Empty);
        }
        Decoder::new(data, 0).read_object(0)
    }

    /// Decode a run of sibling objects
    ///
    /// Uses the same rules as the children of a constructed object: all-zero
    /// tags are padding and skipped, and a single trailing byte is ignored.
    pub fn decode_all(data: &[u8]) -> Result<Vec<Self>, TlvError> {
        if data.is_empty() {
            return Err(TlvError::Empty);
        }
        decode_children(data, 0, 0)
    }

    /// Encode this object, reproducing the length form it was decoded with
    pub fn encode(&self) -> Vec<u8> {
        let length = encode_length_with(self.value.len(), self.length_octets);
        let mut out = Vec::with_capacity(self.tag.len() + length.len() + self.value.len());
        out.extend_from_slice(&self.tag);
        out.extend_from_slice(&length);
        out.extend_from_slice(&self.value);
        out
    }

    pub fn tag(&self) -> &[u8] {
        &self.tag
    }

    /// Raw value bytes (for constructed objects, the encoded children)
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn children(&self) -> &[Tlv] {
        &self.children
    }

    /// Length of the value in bytes
    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Whether the constructed bit (0x20) of the first tag byte is set
    pub fn is_constructed(&self) -> bool {
        self.tag.first().is_some_and(|b| b & 0x20 != 0)
    }

    /// Tag as uppercase hex, e.g. `9F36`
    pub fn tag_hex(&self) -> String {
        hex::encode_upper(&self.tag)
    }

    /// Value as uppercase hex
    pub fn value_hex(&self) -> String {
        hex::encode_upper(&self.value)
    }

    /// Depth-first pre-order search, starting with this object
    pub fn find(&self, tag: &[u8]) -> Option<&Tlv> {
        if self.tag == tag {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(tag))
    }

    /// First direct child with `tag`
    pub fn child(&self, tag: &[u8]) -> Option<&Tlv> {
        self.children.iter().find(|child| child.tag == tag)
    }

    /// Direct children with `tag`, in order
    pub fn children_with<'a>(&'a self, tag: &'a [u8]) -> impl Iterator<Item = &'a Tlv> + 'a {
        self.children.iter().filter(move |child| child.tag == tag)
    }
}

/// Encode a length using the shortest definite form
///
/// `<= 127` is the short form; longer values use `0x81`..`0x84` followed by
/// 1 to 4 big-endian length bytes.
pub fn encode_length(length: usize) -> Vec<u8> {
    let octets = match length {
        0..=0x7F => return vec![length as u8],
        0x80..=0xFF => 1,
        0x100..=0xFFFF => 2,
        0x1_0000..=0xFF_FFFF => 3,
        _ => 4,
    };
    long_form(length, octets)
}

fn encode_length_with(length: usize, octets: u8) -> Vec<u8> {
    let fits = (1..=4).contains(&octets) && (length as u64) < (1u64 << (8 * octets as u32));
    if fits {
        long_form(length, octets)
    } else {
        encode_length(length)
    }
}

fn long_form(length: usize, octets: u8) -> Vec<u8> {
    let bytes = (length as u32).to_be_bytes();
    let mut out = Vec::with_capacity(1 + octets as usize);
    out.push(0x80 | octets);
    out.extend_from_slice(&bytes[4 - octets as usize..]);
    out
}

fn decode_children(data: &[u8], base: usize, depth: usize) -> Result<Vec<Tlv>, TlvError> {
    if depth > MAX_DEPTH {
        return Err(TlvError::TooDeep { offset: base });
    }

    let mut decoder = Decoder::new(data, base);
    let mut children = Vec::new();

    // tag + length is at least two bytes
    while decoder.remaining() >= 2 {
        let child = decoder.read_object(depth)?;
        if child.tag.iter().all(|&b| b == 0) {
            continue;
        }
        children.push(child);
    }

    Ok(children)
}

struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> Decoder<'a> {
    fn new(data: &'a [u8], base: usize) -> Self {
        Self { data, pos: 0, base }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn offset(&self, pos: usize) -> usize {
        self.base + pos
    }

    fn next_byte(&mut self) -> Option<u8> {
        let byte = *self.data.get(self.pos)?;
        self.pos += 1;
        Some(byte)
    }

    fn read_tag(&mut self) -> Result<Vec<u8>, TlvError> {
        let start = self.pos;
        let truncated = TlvError::TruncatedTag {
            offset: self.offset(start),
        };

        let first = self.next_byte().ok_or_else(|| truncated.clone())?;
        if first & 0x1F == 0x1F {
            // Subsequent bytes carry bit 0x80 while more tag bytes follow
            loop {
                let byte = self.next_byte().ok_or_else(|| truncated.clone())?;
                if byte & 0x80 == 0 {
                    break;
                }
            }
        }

        Ok(self.data[start..self.pos].to_vec())
    }

    fn read_length(&mut self) -> Result<(usize, u8), TlvError> {
        let offset = self.offset(self.pos);
        let first = self
            .next_byte()
            .ok_or(TlvError::TruncatedLength { offset })?;

        match first {
            0x00..=0x7F => Ok((first as usize, 0)),
            0x80 => Err(TlvError::IndefiniteLength { offset }),
            _ => {
                let octets = first & 0x7F;
                if octets > 4 {
                    return Err(TlvError::LengthTooLarge { offset, octets });
                }
                let bytes = self
                    .data
                    .get(self.pos..self.pos + octets as usize)
                    .ok_or(TlvError::TruncatedLength { offset })?;
                let length = bytes
                    .iter()
                    .fold(0usize, |acc, &b| (acc << 8) | b as usize);
                self.pos += octets as usize;
                Ok((length, octets))
            }
        }
    }

    fn read_object(&mut self, depth: usize) -> Result<Tlv, TlvError> {
        let tag = self.read_tag()?;
        let (length, length_octets) = self.read_length()?;

        let value_start = self.pos;
        if length > self.remaining() {
            return Err(TlvError::TruncatedValue {
                offset: self.offset(value_start),
                needed: length,
                available: self.remaining(),
            });
        }
        let value = &self.data[value_start..value_start + length];
        self.pos += length;

        let children = if tag[0] & 0x20 != 0 {
            decode_children(value, self.offset(value_start), depth + 1)?
        } else {
            Vec::new()
        };

        Ok(Tlv {
            tag,
            value: value.to_vec(),
            children,
            length_octets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(s: &str) -> Vec<u8> {
        hex::decode(s).unwrap()
    }

    #[test]
    fn test_decode_primitive() {
        let tlv = Tlv::decode(&bytes("8F0105")).unwrap();
        assert_eq!(tlv.tag(), &[0x8F]);
        assert_eq!(tlv.value(), &[0x05]);
        assert!(tlv.children().is_empty());
        assert!(!tlv.is_constructed());
    }

    #[test]
    fn test_multi_byte_tag() {
        let tlv = Tlv::decode(&bytes("9F36020012")).unwrap();
        assert_eq!(tlv.tag(), &[0x9F, 0x36]);
        assert_eq!(tlv.tag_hex(), "9F36");
        assert_eq!(tlv.value(), &[0x00, 0x12]);
    }

    #[test]
    fn test_three_byte_tag() {
        // 0x81 continues the tag, 0x01 terminates it
        let tlv = Tlv::decode(&bytes("5F810101AA")).unwrap();
        assert_eq!(tlv.tag(), &[0x5F, 0x81, 0x01]);
        assert_eq!(tlv.value(), &[0xAA]);
    }

    #[test]
    fn test_nested_constructed() {
        // 70 { 5A { 4761 }, 61 { 4F { A0000000031010 } } }
        let data = bytes("700F5A0247616109 4F07A0000000031010".replace(' ', "").as_str());
        let tlv = Tlv::decode(&data).unwrap();
        assert!(tlv.is_constructed());
        assert_eq!(tlv.children().len(), 2);
        assert_eq!(tlv.children()[1].tag(), &[0x61]);

        let aid = tlv.find(&[0x4F]).unwrap();
        assert_eq!(aid.value_hex(), "A0000000031010");
        assert_eq!(tlv.child(&[0x5A]).unwrap().value(), &[0x47, 0x61]);
        assert!(tlv.child(&[0x4F]).is_none());
    }

    #[test]
    fn test_find_is_pre_order() {
        // 6F { A5 { 50 {01} }, 50 {02} } - the nested 50 comes first
        let tlv = Tlv::decode(&bytes("6F08A5035001015001 02".replace(' ', "").as_str())).unwrap();
        assert_eq!(tlv.find(&[0x50]).unwrap().value(), &[0x01]);
        assert_eq!(tlv.find(&[0x6F]).unwrap().tag(), &[0x6F]);
    }

    #[test]
    fn test_children_with() {
        let tlv = Tlv::decode(&bytes("700C6104 4F02A0016104 4F02A002".replace(' ', "").as_str())).unwrap();
        let aids: Vec<_> = tlv
            .children_with(&[0x61])
            .filter_map(|t| t.find(&[0x4F]))
            .map(|t| t.value_hex())
            .collect();
        assert_eq!(aids, vec!["A001", "A002"]);
    }

    #[test]
    fn test_zero_padding_is_skipped() {
        let data = bytes("70075A01110000 0000".replace(' ', "").as_str());
        let tlv = Tlv::decode(&data).unwrap();
        assert_eq!(tlv.children().len(), 1);
        assert_eq!(tlv.encode(), data);
    }

    #[test]
    fn test_long_form_length() {
        let value = vec![0xAB; 300];
        let tlv = Tlv::new(vec![0x90], value.clone());
        let encoded = tlv.encode();
        assert_eq!(&encoded[..4], &[0x90, 0x82, 0x01, 0x2C]);

        let decoded = Tlv::decode(&encoded).unwrap();
        assert_eq!(decoded.len(), 300);
        assert_eq!(decoded.value(), value.as_slice());
    }

    #[test]
    fn test_length_classes() {
        assert_eq!(encode_length(0), vec![0x00]);
        assert_eq!(encode_length(127), vec![0x7F]);
        assert_eq!(encode_length(128), vec![0x81, 0x80]);
        assert_eq!(encode_length(255), vec![0x81, 0xFF]);
        assert_eq!(encode_length(256), vec![0x82, 0x01, 0x00]);
        assert_eq!(encode_length(65_535), vec![0x82, 0xFF, 0xFF]);
        assert_eq!(encode_length(65_536), vec![0x83, 0x01, 0x00, 0x00]);
        assert_eq!(encode_length(16_777_216), vec![0x84, 0x01, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_non_minimal_length_round_trips() {
        let data = bytes("5A8103112233");
        let tlv = Tlv::decode(&data).unwrap();
        assert_eq!(tlv.value(), &[0x11, 0x22, 0x33]);
        assert_eq!(tlv.encode(), data);
    }

    #[test]
    fn test_round_trip() {
        let samples = [
            "6F1A840E315041592E5359532E4444463031A5088801015F2D02656E",
            "770E8202200094080801010010010301",
            "8006580008010100",
            "702D5F200F43415244484F4C4445522F564953419F1F18303030303030303030303030303030303030303030303030",
        ];
        for sample in samples {
            let data = bytes(sample);
            let tlv = Tlv::decode(&data).unwrap();
            assert_eq!(tlv.encode(), data, "round trip of {}", sample);
            assert_eq!(Tlv::decode(&tlv.encode()).unwrap(), tlv);
        }
    }

    #[test]
    fn test_constructed_builder_encodes_children() {
        let tlv = Tlv::constructed(
            vec![0x77],
            vec![Tlv::new(vec![0x82], vec![0x20, 0x00]), Tlv::new(vec![0x94], vec![0x08, 0x01, 0x01, 0x00])],
        );
        assert_eq!(tlv.encode(), bytes("770A820220009404 08010100".replace(' ', "").as_str()));
        assert_eq!(Tlv::decode(&tlv.encode()).unwrap(), tlv);
    }

    #[test]
    fn test_decode_all() {
        let tlvs = Tlv::decode_all(&bytes("9F360200129F170103")).unwrap();
        assert_eq!(tlvs.len(), 2);
        assert_eq!(tlvs[1].tag_hex(), "9F17");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(Tlv::decode(&[]), Err(TlvError::Empty));
    }

    #[test]
    fn test_indefinite_length_rejected() {
        assert_eq!(
            Tlv::decode(&bytes("70805A0100")),
            Err(TlvError::IndefiniteLength { offset: 1 })
        );
    }

    #[test]
    fn test_truncated_tag() {
        assert_eq!(Tlv::decode(&[0x9F]), Err(TlvError::TruncatedTag { offset: 0 }));
        assert_eq!(Tlv::decode(&[0x9F, 0x81]), Err(TlvError::TruncatedTag { offset: 0 }));
    }

    #[test]
    fn test_truncated_length() {
        assert_eq!(Tlv::decode(&[0x5A]), Err(TlvError::TruncatedLength { offset: 1 }));
        assert_eq!(
            Tlv::decode(&[0x5A, 0x82, 0x01]),
            Err(TlvError::TruncatedLength { offset: 1 })
        );
    }

    #[test]
    fn test_truncated_value() {
        assert_eq!(
            Tlv::decode(&bytes("5A0511")),
            Err(TlvError::TruncatedValue {
                offset: 2,
                needed: 5,
                available: 1
            })
        );
    }

    #[test]
    fn test_truncated_child_reports_absolute_offset() {
        // Child 5A claims 4 bytes but its parent only holds 2 of them
        let err = Tlv::decode(&bytes("70045A041122")).unwrap_err();
        assert_eq!(
            err,
            TlvError::TruncatedValue {
                offset: 4,
                needed: 4,
                available: 2
            }
        );
    }

    #[test]
    fn test_oversized_length_field() {
        assert_eq!(
            Tlv::decode(&bytes("5A850000000001")),
            Err(TlvError::LengthTooLarge { offset: 1, octets: 5 })
        );
    }

    #[test]
    fn test_nesting_limit() {
        let mut data = vec![0x5A, 0x00];
        for _ in 0..40 {
            let mut outer = vec![0xE1];
            outer.extend(encode_length(data.len()));
            outer.extend(&data);
            data = outer;
        }
        assert!(matches!(Tlv::decode(&data), Err(TlvError::TooDeep { .. })));
    }
}
