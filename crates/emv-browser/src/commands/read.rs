use anyhow::{Context, Result};
use emv_card::DiscoveryConfig;

use crate::formatters::FormatMode;

use super::{print_tree, scan_card};

pub fn cmd_read(reader: Option<&str>, config: DiscoveryConfig, format_mode: FormatMode) -> Result<()> {
    println!("EMV Card Browser - {} Mode\n", format_mode.description());

    let (reader_name, scan) = scan_card(reader, config)?;
    println!("Reader: {}\n", reader_name);

    if scan.tree.is_empty() {
        println!("No applications found\n");
    } else {
        print_tree(&scan.tree, format_mode);
    }

    if !scan.tree.diagnostics.is_empty() {
        println!("\n=== Diagnostics ===\n");
        for diagnostic in &scan.tree.diagnostics {
            println!("  - {}", diagnostic);
        }
    }

    println!("\nStatus: {}", scan.status_message());
    scan.outcome.context("Card read did not complete")
}
