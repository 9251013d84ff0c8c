//! Field formatters for human-readable output

use clap::ValueEnum;
use emv_card::tree::Node;
use emv_card::CardTree;
use emv_tlv::{lookup_description, Tlv};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatMode {
    /// Raw hex output
    Raw,
    /// Human-readable formatted output
    Human,
}

impl FormatMode {
    pub fn description(&self) -> &'static str {
        match self {
            FormatMode::Raw => "Raw",
            FormatMode::Human => "Human-Readable",
        }
    }
}

/// Format a field value based on its tag type
pub fn format_value(tag: &[u8], value: &[u8], mode: FormatMode) -> String {
    if mode == FormatMode::Raw {
        return hex::encode_upper(value);
    }

    // Human-readable formatting
    match tag {
        // Application Label, Preferred Name, DF Name when printable (ASCII text)
        [0x50] | [0x9F, 0x12] | [0x84] if is_printable(value) => {
            String::from_utf8_lossy(value).trim().to_string()
        }

        // Cardholder Name (ASCII text)
        [0x5F, 0x20] => String::from_utf8(value.to_vec())
            .unwrap_or_else(|_| hex::encode_upper(value))
            .trim()
            .to_string(),

        // Language Preference (pairs of ASCII letters)
        [0x5F, 0x2D] if is_printable(value) => String::from_utf8_lossy(value).to_string(),

        // Application Expiration Date (YYMMDD)
        [0x5F, 0x24] => {
            if value.len() == 3 {
                format!("20{:02X}/{:02X} (Year/Month)", value[0], value[1])
            } else {
                hex::encode_upper(value)
            }
        }

        // Application Effective Date (YYMMDD)
        [0x5F, 0x25] => {
            if value.len() == 3 {
                format!(
                    "20{:02X}/{:02X}/{:02X} (YY/MM/DD)",
                    value[0], value[1], value[2]
                )
            } else {
                hex::encode_upper(value)
            }
        }

        // Issuer Country Code (ISO 3166-1 numeric, BCD)
        [0x5F, 0x28] | [0x9F, 0x1A] => {
            if value.len() == 2 {
                let code = bcd_number(value);
                if let Some(country) = get_country_name(code) {
                    format!("{} ({})", code, country)
                } else {
                    format!("{}", code)
                }
            } else {
                hex::encode_upper(value)
            }
        }

        // Currency Codes (ISO 4217 numeric, BCD)
        [0x5F, 0x2A] | [0x9F, 0x42] => {
            if value.len() == 2 {
                let code = bcd_number(value);
                if let Some(currency) = get_currency_name(code) {
                    currency.to_string()
                } else {
                    format!("Currency Code {}", code)
                }
            } else {
                hex::encode_upper(value)
            }
        }

        // Application PAN Sequence Number, Priority Indicator, SFI
        [0x5F, 0x34] | [0x87] | [0x88] => {
            if value.len() == 1 {
                format!("{}", value[0])
            } else {
                hex::encode_upper(value)
            }
        }

        // Counters
        [0x9F, 0x36] | [0x9F, 0x13] | [0x9F, 0x17] => {
            if (1..=2).contains(&value.len()) {
                let count = value.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32);
                format!("{} (0x{})", count, hex::encode_upper(value))
            } else {
                hex::encode_upper(value)
            }
        }

        // Application File Locator (4 byte entries)
        [0x94] if !value.is_empty() && value.len() % 4 == 0 => value
            .chunks_exact(4)
            .map(|e| format!("SFI {} records {}-{} ({} offline)", e[0] >> 3, e[1], e[2], e[3]))
            .collect::<Vec<_>>()
            .join(", "),

        // Large binary fields (certificates, etc.)
        [0x90] | [0x92] | [0x9F, 0x46] | [0x9F, 0x48] => {
            if value.len() > 32 {
                format!(
                    "{} ... ({} bytes total)",
                    hex::encode_upper(&value[..32]),
                    value.len()
                )
            } else {
                hex::encode_upper(value)
            }
        }

        // Track 2 Data
        [0x57] | [0x9F, 0x6B] => {
            let hex_str = hex::encode_upper(value);
            hex_str.replace('D', " | ")
        }

        // Default: hex for everything else
        _ => hex::encode_upper(value),
    }
}

/// One line per TLV object: tag, description and value
pub fn format_tlv(tlv: &Tlv, mode: FormatMode) -> String {
    let tag = tlv.tag_hex();
    let description = lookup_description(&tag);
    if tlv.is_constructed() {
        format!("[{}] {} ({} bytes)", tag, description, tlv.len())
    } else {
        format!("[{}] {}: {}", tag, description, format_value(tlv.tag(), tlv.value(), mode))
    }
}

/// Label for any node of the result tree
pub fn format_node(node: &Node<'_>, mode: FormatMode) -> String {
    match node {
        Node::Tlv(tlv) => format_tlv(tlv, mode),
        Node::Record(record) if record.static_data_authentication => {
            format!("{} (static data authentication)", node.label())
        }
        _ => node.label(),
    }
}

/// Flatten the tree into indented lines, root first
pub fn tree_lines(tree: &CardTree, mode: FormatMode) -> Vec<(usize, String)> {
    let mut lines = Vec::new();
    tree.root()
        .walk(&mut |node, depth| lines.push((depth, format_node(node, mode))));
    lines
}

fn is_printable(value: &[u8]) -> bool {
    !value.is_empty() && value.iter().all(|b| (0x20..0x7F).contains(b))
}

/// Two BCD bytes as a number, e.g. `08 40` is 840
fn bcd_number(value: &[u8]) -> u16 {
    value.iter().fold(0u16, |acc, &b| {
        acc.wrapping_mul(100)
            .wrapping_add(((b >> 4) as u16) * 10 + (b & 0x0F) as u16)
    })
}

/// ISO 3166-1 numeric country codes (subset)
fn get_country_name(code: u16) -> Option<&'static str> {
    match code {
        124 => Some("Canada"),
        840 => Some("United States"),
        826 => Some("United Kingdom"),
        276 => Some("Germany"),
        250 => Some("France"),
        380 => Some("Italy"),
        724 => Some("Spain"),
        528 => Some("Netherlands"),
        156 => Some("China"),
        392 => Some("Japan"),
        _ => None,
    }
}

/// ISO 4217 numeric currency codes (subset)
fn get_currency_name(code: u16) -> Option<&'static str> {
    match code {
        124 => Some("CAD (Canadian Dollar)"),
        840 => Some("USD (US Dollar)"),
        978 => Some("EUR (Euro)"),
        826 => Some("GBP (Pound Sterling)"),
        392 => Some("JPY (Japanese Yen)"),
        156 => Some("CNY (Chinese Yuan)"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_mode_is_hex() {
        assert_eq!(format_value(&[0x50], b"VISA", FormatMode::Raw), "56495341");
    }

    #[test]
    fn test_human_values() {
        assert_eq!(format_value(&[0x50], b"VISA DEBIT ", FormatMode::Human), "VISA DEBIT");
        assert_eq!(format_value(&[0x5F, 0x24], &[0x27, 0x08, 0x31], FormatMode::Human), "2027/08 (Year/Month)");
        assert_eq!(format_value(&[0x5F, 0x28], &[0x08, 0x26], FormatMode::Human), "826 (United Kingdom)");
        assert_eq!(format_value(&[0x5F, 0x2A], &[0x09, 0x78], FormatMode::Human), "EUR (Euro)");
        assert_eq!(format_value(&[0x9F, 0x36], &[0x00, 0x2A], FormatMode::Human), "42 (0x002A)");
        assert_eq!(
            format_value(&[0x94], &[0x10, 0x01, 0x03, 0x01], FormatMode::Human),
            "SFI 2 records 1-3 (1 offline)"
        );
    }

    #[test]
    fn test_binary_dedicated_file_name_stays_hex() {
        let aid = [0xA0, 0x00, 0x00, 0x00, 0x03, 0x10, 0x10];
        assert_eq!(format_value(&[0x84], &aid, FormatMode::Human), "A0000000031010");
    }

    #[test]
    fn test_format_tlv() {
        let tlv = Tlv::new(vec![0x9F, 0x17], vec![0x03]);
        assert_eq!(format_tlv(&tlv, FormatMode::Human), "[9F17] Personal Identification Number (PIN) Try Counter: 3 (0x03)");

        let template = Tlv::constructed(vec![0x70], vec![tlv]);
        assert_eq!(format_tlv(&template, FormatMode::Raw), "[70] READ RECORD Response Message Template (4 bytes)");

        let unknown = Tlv::new(vec![0xDF, 0x01], vec![0x01]);
        assert_eq!(format_tlv(&unknown, FormatMode::Raw), "[DF01] None: 01");
    }
}
