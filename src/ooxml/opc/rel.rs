//! Relationship parts (`*.rels`).
//!
//! Relationship ids are assigned in insertion order (`rId1`, `rId2`, ...),
//! which is what lets a worksheet reference its drawing or tables by an id
//! that was fixed when the feature was added.

use crate::common::xml::push_attr;
use crate::ooxml::opc::constants::namespace;

/// A single relationship from a source part to a target.
#[derive(Debug, Clone)]
pub struct Relationship {
    /// Relationship ID (e.g., "rId1", "rId2")
    r_id: String,
    /// Relationship type URI
    reltype: &'static str,
    /// Target reference, relative to the source part
    target_ref: String,
}

impl Relationship {
    pub fn r_id(&self) -> &str {
        &self.r_id
    }

    pub fn reltype(&self) -> &str {
        self.reltype
    }

    pub fn target_ref(&self) -> &str {
        &self.target_ref
    }
}

/// Ordered collection of relationships for one source part.
#[derive(Debug, Clone, Default)]
pub struct Relationships {
    rels: Vec<Relationship>,
}

impl Relationships {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a relationship and return its id.
    pub fn add(&mut self, reltype: &'static str, target_ref: impl Into<String>) -> &str {
        let r_id = format!("rId{}", self.rels.len() + 1);
        self.rels.push(Relationship {
            r_id,
            reltype,
            target_ref: target_ref.into(),
        });
        self.rels.last().map(|rel| rel.r_id()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.rels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.rels.iter()
    }

    /// Generate the XML for the relationships part.
    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(256 + self.rels.len() * 160);

        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push('\n');
        xml.push_str("<Relationships");
        push_attr(&mut xml, "xmlns", namespace::OPC_RELATIONSHIPS);
        xml.push('>');

        for rel in &self.rels {
            xml.push_str("<Relationship");
            push_attr(&mut xml, "Id", rel.r_id());
            push_attr(&mut xml, "Type", rel.reltype());
            push_attr(&mut xml, "Target", rel.target_ref());
            xml.push_str("/>");
        }

        xml.push_str("</Relationships>");
        xml
    }
}
