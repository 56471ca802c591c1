//! Document-level parts written when the spreadsheet is finished.

use crate::common::xml::{escape_xml, push_attr, push_num_attr};
use crate::ooxml::opc::constants::{content_type as ct, namespace, relationship_type as rt};
use crate::ooxml::opc::{ContentTypesItem, Relationships};
use crate::ooxml::xlsx::options::{DocumentProperties, WorksheetVisibility};
use chrono::NaiveDateTime;

pub(crate) const APPLICATION_NAME: &str = "spreadstream";

/// A finished worksheet as the workbook part sees it.
#[derive(Debug, Clone)]
pub(crate) struct SheetEntry {
    pub name: String,
    pub visibility: WorksheetVisibility,
}

/// Counts of every part, for `[Content_Types].xml`.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PartCounts<'a> {
    pub worksheets: u32,
    /// Ids of the table parts in the archive. Ids are not contiguous.
    pub tables: &'a [u32],
    pub drawings: u32,
    pub images: u32,
}

/// Generate `xl/workbook.xml`. Sheet N refers to relationship `rIdN`.
pub(crate) fn workbook_xml(sheets: &[SheetEntry]) -> String {
    let mut xml = String::with_capacity(512 + sheets.len() * 96);

    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str("<workbook");
    push_attr(&mut xml, "xmlns", namespace::SML_MAIN);
    push_attr(&mut xml, "xmlns:r", namespace::OFC_RELATIONSHIPS);
    xml.push('>');

    let active = sheets
        .iter()
        .position(|s| s.visibility == WorksheetVisibility::Visible)
        .unwrap_or(0);
    xml.push_str("<bookViews><workbookView");
    if active > 0 {
        push_num_attr(&mut xml, "activeTab", active);
        push_num_attr(&mut xml, "firstSheet", active);
    }
    xml.push_str("/></bookViews>");

    xml.push_str("<sheets>");
    for (i, sheet) in sheets.iter().enumerate() {
        let id = i + 1;
        xml.push_str("<sheet");
        push_attr(&mut xml, "name", &sheet.name);
        push_num_attr(&mut xml, "sheetId", id);
        if sheet.visibility == WorksheetVisibility::Hidden {
            xml.push_str(r#" state="hidden""#);
        }
        push_attr(&mut xml, "r:id", &format!("rId{}", id));
        xml.push_str("/>");
    }
    xml.push_str("</sheets>");

    xml.push_str("</workbook>");
    xml
}

/// Generate `xl/_rels/workbook.xml.rels`: the worksheets, then styles.
pub(crate) fn workbook_rels(sheet_count: u32) -> String {
    let mut rels = Relationships::new();
    for n in 1..=sheet_count {
        rels.add(rt::WORKSHEET, format!("worksheets/sheet{}.xml", n));
    }
    rels.add(rt::STYLES, "styles.xml");
    rels.to_xml()
}

/// Generate `_rels/.rels`.
pub(crate) fn package_rels() -> String {
    let mut rels = Relationships::new();
    rels.add(rt::OFFICE_DOCUMENT, "xl/workbook.xml");
    rels.add(rt::CORE_PROPERTIES, "docProps/core.xml");
    rels.add(rt::EXTENDED_PROPERTIES, "docProps/app.xml");
    rels.to_xml()
}

/// Generate `[Content_Types].xml`.
pub(crate) fn content_types(counts: PartCounts<'_>) -> String {
    let mut cti = ContentTypesItem::new();
    if counts.images > 0 {
        cti.add_default("png", ct::PNG);
    }

    cti.add_override("/xl/workbook.xml", ct::SML_SHEET_MAIN);
    cti.add_override("/xl/styles.xml", ct::SML_STYLES);
    cti.add_override("/docProps/core.xml", ct::OPC_CORE_PROPERTIES);
    cti.add_override("/docProps/app.xml", ct::OFC_EXTENDED_PROPERTIES);
    for n in 1..=counts.worksheets {
        cti.add_override(format!("/xl/worksheets/sheet{}.xml", n), ct::SML_WORKSHEET);
    }
    for n in counts.tables {
        cti.add_override(format!("/xl/tables/table{}.xml", n), ct::SML_TABLE);
    }
    for n in 1..=counts.drawings {
        cti.add_override(format!("/xl/drawings/drawing{}.xml", n), ct::OFC_DRAWING);
    }
    cti.to_xml()
}

/// Generate `docProps/app.xml`.
pub(crate) fn app_xml(properties: &DocumentProperties, sheets: &[SheetEntry]) -> String {
    let mut xml = String::with_capacity(768 + sheets.len() * 48);
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(r#"<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties" xmlns:vt="http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes">"#);

    xml.push_str("<Application>");
    xml.push_str(&escape_xml(
        properties.application.as_deref().unwrap_or(APPLICATION_NAME),
    ));
    xml.push_str("</Application>");

    let count = itoa::Buffer::new().format(sheets.len()).to_string();
    xml.push_str(r#"<HeadingPairs><vt:vector size="2" baseType="variant"><vt:variant><vt:lpstr>Worksheets</vt:lpstr></vt:variant><vt:variant><vt:i4>"#);
    xml.push_str(&count);
    xml.push_str("</vt:i4></vt:variant></vt:vector></HeadingPairs>");

    xml.push_str("<TitlesOfParts><vt:vector");
    push_attr(&mut xml, "size", &count);
    xml.push_str(r#" baseType="lpstr">"#);
    for sheet in sheets {
        xml.push_str("<vt:lpstr>");
        xml.push_str(&escape_xml(&sheet.name));
        xml.push_str("</vt:lpstr>");
    }
    xml.push_str("</vt:vector></TitlesOfParts>");

    xml.push_str("</Properties>");
    xml
}

/// Generate `docProps/core.xml`. `now` stands in for an unset creation time.
pub(crate) fn core_xml(properties: &DocumentProperties, now: NaiveDateTime) -> String {
    let mut xml = String::with_capacity(1024);
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(r#"<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:dcmitype="http://purl.org/dc/dcmitype/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#);

    let elements = [
        ("dc:title", &properties.title),
        ("dc:subject", &properties.subject),
        ("dc:creator", &properties.author),
        ("cp:keywords", &properties.keywords),
    ];
    for (tag, value) in elements {
        if let Some(value) = value {
            xml.push('<');
            xml.push_str(tag);
            xml.push('>');
            xml.push_str(&escape_xml(value));
            xml.push_str("</");
            xml.push_str(tag);
            xml.push('>');
        }
    }

    let created = properties
        .created
        .unwrap_or(now)
        .format("%Y-%m-%dT%H:%M:%SZ")
        .to_string();
    xml.push_str(r#"<dcterms:created xsi:type="dcterms:W3CDTF">"#);
    xml.push_str(&created);
    xml.push_str("</dcterms:created>");
    xml.push_str(r#"<dcterms:modified xsi:type="dcterms:W3CDTF">"#);
    xml.push_str(&created);
    xml.push_str("</dcterms:modified>");

    xml.push_str("</cp:coreProperties>");
    xml
}
