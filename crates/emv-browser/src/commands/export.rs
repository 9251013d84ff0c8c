//! XML export of a scan result
//!
//! Element layout:
//!
//! ```text
//! <card>
//!   <paymentSystemEnvironment name="1PAY.SYS.DDF01">
//!     <fileControlInformation> <tlv .../> </fileControlInformation>
//!     <elementaryFile sfi="1"> <record number="1"> ... </record> </elementaryFile>
//!   </paymentSystemEnvironment>
//!   <application aid="A0000000031010">
//!     <fileControlInformation/> <applicationInterchangeProfile/>
//!     <elementaryFile/> <dataObjects/>
//!   </application>
//! </card>
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use emv_card::{CardTree, DiscoveryConfig, Node};
use emv_tlv::lookup_description;
use quick_xml::events::{BytesDecl, BytesStart, Event};
use quick_xml::Writer;

use super::scan_card;

pub fn cmd_export(reader: Option<&str>, config: DiscoveryConfig, output: &Path) -> Result<()> {
    let (reader_name, scan) = scan_card(reader, config)?;

    let xml = to_xml(&scan.tree)?;
    fs::write(output, xml).with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "Exported {} application(s) from {} to {}",
        scan.tree.applications.len(),
        reader_name,
        output.display()
    );
    if !scan.tree.diagnostics.is_empty() {
        println!("{} diagnostic(s) recorded during the scan", scan.tree.diagnostics.len());
    }
    println!("Status: {}", scan.status_message());

    scan.outcome.context("Card read did not complete")
}

/// Serialize the tree as an indented XML document
pub fn to_xml(tree: &CardTree) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    write_node(&mut writer, &tree.root())?;
    Ok(String::from_utf8(writer.into_inner())?)
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &Node<'_>) -> Result<()> {
    let element = start_element(node);
    let children = node.children();

    if children.is_empty() {
        writer.write_event(Event::Empty(element))?;
        return Ok(());
    }

    let end = element.to_end().into_owned();
    writer.write_event(Event::Start(element))?;
    for child in &children {
        write_node(writer, child)?;
    }
    writer.write_event(Event::End(end))?;
    Ok(())
}

fn start_element(node: &Node<'_>) -> BytesStart<'static> {
    match node {
        Node::Card(_) => BytesStart::new("card"),
        Node::Directory(directory) => {
            let mut element = BytesStart::new("paymentSystemEnvironment");
            element.push_attribute(("name", String::from_utf8_lossy(&directory.name).as_ref()));
            element
        }
        Node::Application(app) => {
            let mut element = BytesStart::new("application");
            element.push_attribute(("aid", app.aid_hex().as_str()));
            if let Some(label) = app.label() {
                element.push_attribute(("label", label.as_str()));
            }
            element
        }
        Node::FileControlInformation(_) => BytesStart::new("fileControlInformation"),
        Node::AipAfl(_) => BytesStart::new("applicationInterchangeProfile"),
        Node::ElementaryFile(file) => {
            let mut element = BytesStart::new("elementaryFile");
            element.push_attribute(("sfi", file.sfi.to_string().as_str()));
            element
        }
        Node::Record(record) => {
            let mut element = BytesStart::new("record");
            element.push_attribute(("number", record.number.to_string().as_str()));
            if record.static_data_authentication {
                element.push_attribute(("staticDataAuthentication", "true"));
            }
            element
        }
        Node::DataObjects(_) => BytesStart::new("dataObjects"),
        Node::Tlv(tlv) => {
            let tag = tlv.tag_hex();
            let mut element = BytesStart::new("tlv");
            element.push_attribute(("tag", tag.as_str()));
            element.push_attribute(("length", tlv.len().to_string().as_str()));
            element.push_attribute(("value", tlv.value_hex().as_str()));
            element.push_attribute(("description", lookup_description(&tag)));
            element
        }
    }
}
