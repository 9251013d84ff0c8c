pub mod decode;
pub mod export;
pub mod read;
pub mod readers;

use anyhow::{Context, Result};
use emv_card::{CardReader, CardTree, Discovery, DiscoveryConfig, Scan};
use tracing::info;

use crate::formatters::{self, FormatMode};

/// Establish a PC/SC context and pick the reader to use
///
/// Without an explicit name the first reader holding a card is used.
pub(crate) fn open_reader(reader: Option<&str>) -> Result<(CardReader, String)> {
    let card_reader = CardReader::new().context("Failed to establish PC/SC context")?;
    let name = match reader {
        Some(name) => name.to_string(),
        None => card_reader
            .find_card()
            .context("No card found, please ensure a card is present on the reader")?,
    };
    Ok((card_reader, name))
}

/// Run a full discovery against the selected reader
pub(crate) fn scan_card(reader: Option<&str>, config: DiscoveryConfig) -> Result<(String, Scan)> {
    let (mut card_reader, name) = open_reader(reader)?;
    info!(reader = %name, "Reading card");
    let scan = Discovery::new(config).run(&mut card_reader, &name);
    Ok((name, scan))
}

/// Print the result tree, two spaces per level
pub(crate) fn print_tree(tree: &CardTree, mode: FormatMode) {
    for (depth, line) in formatters::tree_lines(tree, mode) {
        println!("{}{}", "  ".repeat(depth), line);
    }
}
