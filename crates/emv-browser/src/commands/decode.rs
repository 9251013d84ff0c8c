//! Offline decoding of hex TLV data

use anyhow::{Context, Result};
use emv_card::tree::Node;
use emv_tlv::Tlv;

use crate::formatters::{format_node, FormatMode};

pub fn cmd_decode(input: &str, format_mode: FormatMode) -> Result<()> {
    for line in decode_lines(input, format_mode)? {
        println!("{}", line);
    }
    Ok(())
}

/// Decode `input` (hex, whitespace allowed) into indented display lines
pub fn decode_lines(input: &str, format_mode: FormatMode) -> Result<Vec<String>> {
    let cleaned: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = hex::decode(&cleaned).context("Input is not valid hex")?;
    let objects = Tlv::decode_all(&bytes).context("Malformed TLV data")?;

    let mut lines = Vec::new();
    for tlv in &objects {
        Node::Tlv(tlv).walk(&mut |node, depth| {
            lines.push(format!("{}{}", "  ".repeat(depth), format_node(node, format_mode)));
        });
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_lines() {
        let lines = decode_lines("6F 07 84 05 A000000003", FormatMode::Raw).unwrap();
        assert_eq!(
            lines,
            vec![
                "[6F] File Control Information (FCI) Template (7 bytes)",
                "  [84] Dedicated File (DF) Name: A000000003",
            ]
        );
    }

    #[test]
    fn test_decode_siblings() {
        let lines = decode_lines("9F360200059F170103", FormatMode::Human).unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].ends_with("3 (0x03)"));
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        assert!(decode_lines("6F0", FormatMode::Raw).is_err());
        assert!(decode_lines("6F80", FormatMode::Raw).is_err());
    }
}
