//! Hardware-dependent integration tests
//!
//! These tests require a physical EMV card in a card reader.
//! They are ignored by default and must be explicitly run with:
//!
//!     cargo test --package emv-card --test hardware_integration -- --ignored
//!
//! Or to run all tests including hardware tests:
//!
//!     cargo test --package emv-card --test hardware_integration -- --include-ignored

use emv_card::apdu::commands;
use emv_card::protocol::aids;
use emv_card::reader::CardReader;
use emv_card::transport::{CardTransport, Session};
use emv_card::{CancellationToken, Discovery, DiscoveryConfig, EmvCard};

/// Test that we can establish a PC/SC context and list readers
///
/// **Requires**: Card reader connected (card not required)
#[test]
#[ignore = "requires hardware: card reader"]
fn test_list_readers() {
    let reader = CardReader::new().expect("Failed to establish PC/SC context");
    let readers = reader.list_readers().expect("Failed to list readers");
    assert!(!readers.is_empty(), "No card reader found. Is a reader connected?");
}

/// Test that we can detect an inserted card
///
/// **Requires**: Card reader with card inserted
#[test]
#[ignore = "requires hardware: card inserted in reader"]
fn test_card_present() {
    let mut reader = CardReader::new().expect("Failed to establish PC/SC context");
    let name = reader.find_card().expect("No card present");

    println!("Card found in reader: {}", name);
    let session = Session::open(&mut reader, &name).expect("Failed to connect to card");
    assert_eq!(session.reader(), name);
}

/// Test selecting a known EMV application
///
/// **Requires**: EMV card (credit/debit card) inserted
#[test]
#[ignore = "requires hardware: EMV card"]
fn test_select_emv_application() {
    let mut reader = CardReader::new().expect("Failed to establish PC/SC context");
    let name = reader.find_card().expect("No card present");
    let mut session = Session::open(&mut reader, &name).expect("Failed to connect to card");
    let cancel = CancellationToken::new();
    let mut card = EmvCard::new(&mut *session, &cancel);

    let selected = aids::CATALOGUE.iter().find(|(_, aid)| {
        card.select(aid)
            .map(|response| response.is_success())
            .unwrap_or(false)
    });

    match selected {
        Some((label, aid)) => println!("Selected {} ({})", label, hex::encode_upper(aid)),
        None => panic!("No EMV application could be selected"),
    }
}

/// Full end-to-end discovery
///
/// **Requires**: EMV card inserted
#[test]
#[ignore = "requires hardware: EMV card"]
fn test_full_discovery() {
    let mut reader = CardReader::new().expect("Failed to establish PC/SC context");
    let name = reader.find_card().expect("No card present");

    let config = DiscoveryConfig {
        read_data_objects: true,
        ..Default::default()
    };
    let scan = Discovery::new(config).run(&mut reader, &name);

    println!("Status: {}", scan.status_message());
    scan.tree.root().walk(&mut |node, depth| println!("{}{}", "  ".repeat(depth), node.label()));
    for diagnostic in &scan.tree.diagnostics {
        println!("Diagnostic: {}", diagnostic);
    }

    assert!(scan.outcome.is_ok(), "Discovery failed: {}", scan.status_message());
    assert!(!scan.tree.applications.is_empty(), "No applications found");

    // The session must have been released
    let session = Session::open(&mut reader, &name);
    assert!(session.is_ok(), "Reader still held after discovery");
}

/// Test GET DATA command for the application transaction counter
///
/// **Requires**: EMV card inserted
#[test]
#[ignore = "requires hardware: EMV card"]
fn test_get_data_command() {
    let mut reader = CardReader::new().expect("Failed to establish PC/SC context");
    let name = reader.find_card().expect("No card present");
    let mut session = Session::open(&mut reader, &name).expect("Failed to connect to card");

    for (label, aid) in aids::CATALOGUE {
        let response = session.transmit(&commands::select(aid)).expect("Transmit failed");
        if !response.is_success() {
            continue;
        }
        println!("Selected {}", label);

        let response = session
            .transmit(&commands::get_data(&[0x9F, 0x36]))
            .expect("Transmit failed");
        println!("ATC: {} ({})", hex::encode_upper(response.data()), response.status_string());
        return;
    }

    panic!("No EMV application could be selected");
}
