//! Builder for the `[Content_Types].xml` part.

use crate::common::xml::push_attr;
use crate::ooxml::opc::constants::{content_type as ct, namespace};
use std::collections::BTreeMap;

/// Manages Default and Override elements for content type mapping.
///
/// Both maps are ordered so the part is byte-for-byte reproducible.
#[derive(Debug)]
pub struct ContentTypesItem {
    /// Default content types by extension
    defaults: BTreeMap<String, &'static str>,
    /// Override content types by partname
    overrides: BTreeMap<String, &'static str>,
}

impl ContentTypesItem {
    /// Create a new ContentTypesItem with the standard defaults.
    pub fn new() -> Self {
        let mut defaults = BTreeMap::new();
        defaults.insert("rels".to_string(), ct::OPC_RELATIONSHIPS);
        defaults.insert("xml".to_string(), ct::XML);

        Self {
            defaults,
            overrides: BTreeMap::new(),
        }
    }

    /// Map every part with this extension to a content type.
    pub fn add_default(&mut self, ext: &str, content_type: &'static str) {
        self.defaults.insert(ext.to_string(), content_type);
    }

    /// Map one absolute partname (e.g. `/xl/workbook.xml`) to a content type.
    pub fn add_override(&mut self, partname: impl Into<String>, content_type: &'static str) {
        self.overrides.insert(partname.into(), content_type);
    }

    /// Generate the XML for [Content_Types].xml.
    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(512 + self.overrides.len() * 160);

        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push('\n');
        xml.push_str("<Types");
        push_attr(&mut xml, "xmlns", namespace::OPC_CONTENT_TYPES);
        xml.push('>');

        for (ext, content_type) in &self.defaults {
            xml.push_str("<Default");
            push_attr(&mut xml, "Extension", ext);
            push_attr(&mut xml, "ContentType", content_type);
            xml.push_str("/>");
        }

        for (partname, content_type) in &self.overrides {
            xml.push_str("<Override");
            push_attr(&mut xml, "PartName", partname);
            push_attr(&mut xml, "ContentType", content_type);
            xml.push_str("/>");
        }

        xml.push_str("</Types>");
        xml
    }
}

impl Default for ContentTypesItem {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_types_xml() {
        let mut cti = ContentTypesItem::new();
        cti.add_default("png", ct::PNG);
        cti.add_override("/xl/workbook.xml", ct::SML_SHEET_MAIN);

        let xml = cti.to_xml();

        assert!(xml.contains(r#"<Default Extension="png" ContentType="image/png"/>"#));
        assert!(xml.contains(r#"<Default Extension="rels""#));
        assert!(xml.contains(r#"<Override PartName="/xl/workbook.xml""#));
    }
}
