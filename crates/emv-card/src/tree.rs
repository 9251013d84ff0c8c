//! Discovery result tree

use emv_tlv::{tags, Tlv};

use crate::error::Diagnostic;
use crate::protocol::ProcessingOptions;

/// Everything read from one card
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardTree {
    /// Payment system directory that answered SELECT, if any
    pub directory: Option<PaymentDirectory>,
    pub applications: Vec<Application>,
    pub diagnostics: Vec<Diagnostic>,
}

impl CardTree {
    pub fn root(&self) -> Node<'_> {
        Node::Card(self)
    }

    pub fn is_empty(&self) -> bool {
        self.directory.is_none() && self.applications.is_empty()
    }

    pub fn application(&self, aid: &[u8]) -> Option<&Application> {
        self.applications.iter().find(|app| app.aid == aid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentDirectory {
    pub name: Vec<u8>,
    pub fci: Tlv,
    /// Directory records, when the FCI names an SFI
    pub file: Option<ElementaryFile>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Application {
    pub aid: Vec<u8>,
    pub fci: Tlv,
    pub processing: Option<ProcessingOptions>,
    pub files: Vec<ElementaryFile>,
    /// Objects read with GET DATA
    pub data_objects: Vec<Tlv>,
}

impl Application {
    pub fn new(aid: Vec<u8>, fci: Tlv) -> Self {
        Self {
            aid,
            fci,
            processing: None,
            files: Vec::new(),
            data_objects: Vec::new(),
        }
    }

    /// Application label (50) or preferred name (9F12) from the FCI
    pub fn label(&self) -> Option<String> {
        self.fci
            .find(tags::APPLICATION_LABEL.bytes())
            .or_else(|| self.fci.find(tags::APPLICATION_PREFERRED_NAME.bytes()))
            .map(|tlv| String::from_utf8_lossy(tlv.value()).trim().to_string())
    }

    pub fn aid_hex(&self) -> String {
        hex::encode_upper(&self.aid)
    }

    /// Elementary file for `sfi`, created on first use
    pub fn file_mut(&mut self, sfi: u8) -> &mut ElementaryFile {
        match self.files.iter().position(|file| file.sfi == sfi) {
            Some(index) => &mut self.files[index],
            None => {
                self.files.push(ElementaryFile::new(sfi));
                let last = self.files.len() - 1;
                &mut self.files[last]
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementaryFile {
    pub sfi: u8,
    pub records: Vec<Record>,
}

impl ElementaryFile {
    pub fn new(sfi: u8) -> Self {
        Self {
            sfi,
            records: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub number: u8,
    /// Part of the static data authentication input (informational only)
    pub static_data_authentication: bool,
    pub tlv: Tlv,
}

/// Borrowed view over a [`CardTree`], one variant per node role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node<'a> {
    Card(&'a CardTree),
    Directory(&'a PaymentDirectory),
    Application(&'a Application),
    FileControlInformation(&'a Tlv),
    AipAfl(&'a ProcessingOptions),
    ElementaryFile(&'a ElementaryFile),
    Record(&'a Record),
    DataObjects(&'a [Tlv]),
    Tlv(&'a Tlv),
}

impl<'a> Node<'a> {
    pub fn children(&self) -> Vec<Node<'a>> {
        match *self {
            Node::Card(card) => card
                .directory
                .iter()
                .map(Node::Directory)
                .chain(card.applications.iter().map(Node::Application))
                .collect(),
            Node::Directory(directory) => std::iter::once(Node::FileControlInformation(&directory.fci))
                .chain(directory.file.iter().map(Node::ElementaryFile))
                .collect(),
            Node::Application(app) => {
                let mut children = vec![Node::FileControlInformation(&app.fci)];
                children.extend(app.processing.iter().map(Node::AipAfl));
                children.extend(app.files.iter().map(Node::ElementaryFile));
                if !app.data_objects.is_empty() {
                    children.push(Node::DataObjects(&app.data_objects));
                }
                children
            }
            Node::FileControlInformation(tlv) => vec![Node::Tlv(tlv)],
            Node::AipAfl(options) => vec![Node::Tlv(&options.template)],
            Node::ElementaryFile(file) => file.records.iter().map(Node::Record).collect(),
            Node::Record(record) => vec![Node::Tlv(&record.tlv)],
            Node::DataObjects(objects) => objects.iter().map(Node::Tlv).collect(),
            Node::Tlv(tlv) => tlv.children().iter().map(Node::Tlv).collect(),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Node::Card(_) => "Card".to_string(),
            Node::Directory(directory) => {
                format!("Payment System Environment - {}", String::from_utf8_lossy(&directory.name))
            }
            Node::Application(app) => match app.label() {
                Some(label) => format!("Application {} ({})", app.aid_hex(), label),
                None => format!("Application {}", app.aid_hex()),
            },
            Node::FileControlInformation(_) => "File Control Information".to_string(),
            Node::AipAfl(_) => "Application Interchange Profile - Application File Locator".to_string(),
            Node::ElementaryFile(file) => format!("Elementary File - {:02X}", file.sfi),
            Node::Record(record) => format!("Record - {:02X}", record.number),
            Node::DataObjects(_) => "Data Objects".to_string(),
            Node::Tlv(tlv) => tlv.tag_hex(),
        }
    }

    /// Visit this node and its descendants depth first
    pub fn walk(&self, visit: &mut impl FnMut(&Node<'a>, usize)) {
        self.walk_at(0, visit);
    }

    fn walk_at(&self, depth: usize, visit: &mut impl FnMut(&Node<'a>, usize)) {
        visit(self, depth);
        for child in self.children() {
            child.walk_at(depth + 1, visit);
        }
    }
}
