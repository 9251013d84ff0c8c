use anyhow::{Context, Result};
use emv_card::{CardReader, CardTransport};

pub fn cmd_readers() -> Result<()> {
    let reader = CardReader::new().context("Failed to establish PC/SC context")?;
    let readers = reader.list_readers().context("Failed to list readers")?;

    if readers.is_empty() {
        println!("No card readers found");
        return Ok(());
    }

    let with_card = reader.find_card().ok();
    println!("Found {} reader(s):\n", readers.len());
    for (i, name) in readers.iter().enumerate() {
        let marker = if with_card.as_deref() == Some(name.as_str()) {
            " (card present)"
        } else {
            ""
        };
        println!("  {}: {}{}", i, name, marker);
    }

    Ok(())
}
