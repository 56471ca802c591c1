//! End-to-end tests for the streaming writer
//!
//! These tests write complete workbooks and read them back with an
//! independent ZIP reader, checking the parts a spreadsheet application
//! would open.

use super::*;
use crate::common::error::Error;
use crate::common::reference::CellRef;
use crate::ooxml::xlsx::writer::{DEFAULT_BUFFER_SIZE, MAX_TEXT_LENGTH};
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::io::{Cursor, Read};
use tempfile::tempdir;

fn read_part(bytes: &[u8], name: &str) -> String {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut file = archive.by_name(name).unwrap();
    let mut text = String::new();
    file.read_to_string(&mut text).unwrap();
    text
}

fn part_names(bytes: &[u8]) -> BTreeSet<String> {
    let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    archive.file_names().map(str::to_string).collect()
}

/// Text of every `<v>` or `<t>` inside `<sheetData>`, in document order.
fn cell_texts(sheet: &str) -> Vec<String> {
    let start = sheet.find("<sheetData>").unwrap();
    let end = sheet.find("</sheetData>").unwrap();
    sheet[start..end]
        .split("</c>")
        .filter_map(|chunk| {
            let (_, cell) = chunk.rsplit_once("<c")?;
            let tag = if cell.contains("<t>") { "t" } else { "v" };
            let open = format!("<{}>", tag);
            let from = cell.find(&open)? + open.len();
            let to = cell.find(&format!("</{}>", tag))?;
            Some(cell[from..to].to_string())
        })
        .collect()
}

/// Every `attr="..."` value in `xml`.
fn attr_values<'a>(xml: &'a str, attr: &str) -> Vec<&'a str> {
    let needle = format!(" {}=\"", attr);
    xml.match_indices(&needle)
        .filter_map(|(at, _)| {
            let rest = &xml[at + needle.len()..];
            rest.find('"').map(|end| &rest[..end])
        })
        .collect()
}

/// Resolve a relationship target against the directory of its source part.
fn resolve_target(rels_name: &str, target: &str) -> String {
    let base = &rels_name[..rels_name.find("_rels/").unwrap()];
    let mut segments: Vec<&str> = Vec::new();
    for segment in base.split('/').chain(target.split('/')) {
        match segment {
            "" | "." => {},
            ".." => {
                segments.pop();
            },
            s => segments.push(s),
        }
    }
    segments.join("/")
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let mut data = vec![0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n'];
    data.extend_from_slice(&13u32.to_be_bytes());
    data.extend_from_slice(b"IHDR");
    data.extend_from_slice(&width.to_be_bytes());
    data.extend_from_slice(&height.to_be_bytes());
    data.extend_from_slice(&[8, 2, 0, 0, 0]);
    data.extend_from_slice(&crc32fast::hash(&data[12..29]).to_be_bytes());
    data.extend_from_slice(&0u32.to_be_bytes());
    data.extend_from_slice(b"IEND");
    data.extend_from_slice(&[0xAE, 0x42, 0x60, 0x82]);
    data
}

#[tokio::test]
async fn test_mixed_rows_to_file() {
    let dir = tempdir().expect("create temp dir");
    let path = dir.path().join("mixed.xlsx");

    let file = tokio::fs::File::create(&path).await.unwrap();
    let mut spreadsheet = Spreadsheet::create(file, SpreadsheetOptions::default()).unwrap();
    spreadsheet
        .start_worksheet("Mixed", WorksheetOptions::default())
        .await
        .unwrap();
    let rows: [(&str, i64); 3] = [("alpha", 1), ("beta", -2), ("gamma", 3_000_000_000)];
    for (name, value) in rows {
        spreadsheet
            .add_row(&[Cell::new(name), Cell::new(value)])
            .await
            .unwrap();
    }
    spreadsheet.finish_worksheet().await.unwrap();
    drop(spreadsheet.finish().await.unwrap());

    let bytes = std::fs::read(&path).unwrap();
    let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");
    assert_eq!(
        cell_texts(&sheet),
        ["alpha", "1", "beta", "-2", "gamma", "3000000000"]
    );
    assert_eq!(sheet.matches(r#"t="inlineStr""#).count(), 3);
}

#[tokio::test]
async fn test_equal_formats_share_one_style() {
    let options = SpreadsheetOptions {
        default_date_time_format: None,
        ..Default::default()
    };
    let mut spreadsheet = Spreadsheet::create(Vec::new(), options).unwrap();

    let thousandths = || CellFormat::new().with_number_format(NumberFormat::custom("#,##0.000"));
    let first = spreadsheet.add_style(&thousandths()).unwrap();
    let second = spreadsheet.add_style(&thousandths()).unwrap();
    assert_eq!(first, second);

    spreadsheet
        .start_worksheet("Styles", WorksheetOptions::default())
        .await
        .unwrap();
    spreadsheet
        .add_row(&[
            Cell::new(1.5).with_style(first),
            Cell::new(2.25).with_style(second),
        ])
        .await
        .unwrap();
    spreadsheet.finish_worksheet().await.unwrap();
    let bytes = spreadsheet.finish().await.unwrap();

    let styles = read_part(&bytes, "xl/styles.xml");
    assert!(styles.contains(r##"<numFmts count="1"><numFmt numFmtId="164" formatCode="#,##0.000"/></numFmts>"##));
    assert!(styles.contains(r#"<cellXfs count="2">"#));

    let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");
    assert!(sheet.contains(r#"<c s="1"><v>1.5</v></c><c s="1"><v>2.25</v></c>"#));
}

#[tokio::test]
async fn test_column_widths_within_tolerance_form_one_run() {
    let mut options = WorksheetOptions::default();
    for column in 1..=5 {
        options.column(column).width = Some(12.0);
    }
    options.column(6).width = Some(12.00005);
    options.column(7).width = Some(15.0);

    let mut spreadsheet = Spreadsheet::create(Vec::new(), SpreadsheetOptions::default()).unwrap();
    spreadsheet.start_worksheet("Widths", options).await.unwrap();
    spreadsheet.finish_worksheet().await.unwrap();
    let bytes = spreadsheet.finish().await.unwrap();

    let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");
    assert!(sheet.contains(
        r#"<cols><col min="1" max="6" width="12" customWidth="1"/><col min="7" max="7" width="15" customWidth="1"/></cols>"#
    ));
}

#[tokio::test]
async fn test_relative_hyperlink_is_rejected_up_front() {
    for uri in ["reports/q1.html", "//example.com/q1", "not a uri"] {
        let err = Formula::hyperlink(uri, Some("Q1")).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)), "{}", uri);
    }

    let link = Formula::hyperlink("https://example.com/q1?a=1&b=2", Some("Q1")).unwrap();
    let mut spreadsheet = Spreadsheet::create(Vec::new(), SpreadsheetOptions::default()).unwrap();
    spreadsheet
        .start_worksheet("Links", WorksheetOptions::default())
        .await
        .unwrap();
    spreadsheet
        .add_row(&[Cell::new("Q1").with_formula(&link)])
        .await
        .unwrap();
    spreadsheet.finish_worksheet().await.unwrap();
    let bytes = spreadsheet.finish().await.unwrap();

    let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");
    assert!(sheet.contains("<f>HYPERLINK(&quot;https://example.com/q1?a=1&amp;b=2&quot;, &quot;Q1&quot;)</f>"));
}

#[tokio::test]
async fn test_value_larger_than_default_buffer() {
    let text = "&".repeat(MAX_TEXT_LENGTH);
    assert!(text.len() * "&amp;".len() > DEFAULT_BUFFER_SIZE);

    let mut spreadsheet = Spreadsheet::create(Vec::new(), SpreadsheetOptions::default()).unwrap();
    spreadsheet
        .start_worksheet("Long", WorksheetOptions::default())
        .await
        .unwrap();
    spreadsheet
        .add_row(&[Cell::new(text.as_str()), Cell::new("after")])
        .await
        .unwrap();
    let too_long = "x".repeat(MAX_TEXT_LENGTH + 1);
    let err = spreadsheet
        .add_row(&[Cell::new(too_long.as_str())])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert_eq!(spreadsheet.next_row_number().unwrap(), 2);

    spreadsheet.finish_worksheet().await.unwrap();
    let bytes = spreadsheet.finish().await.unwrap();

    let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");
    assert_eq!(sheet.matches("&amp;").count(), MAX_TEXT_LENGTH);
    assert_eq!(cell_texts(&sheet).last().map(String::as_str), Some("after"));
}

#[tokio::test]
async fn test_every_value_kind() {
    let total = Formula::new("=SUM(A1:B1)").unwrap();
    let day = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();

    let mut spreadsheet = Spreadsheet::create(Vec::new(), SpreadsheetOptions::default()).unwrap();
    spreadsheet
        .start_worksheet("Kinds", WorksheetOptions::default())
        .await
        .unwrap();
    spreadsheet
        .add_row(&[
            DataCell::from(7),
            DataCell::from(0.5f32),
            DataCell::bool(true),
            DataCell::from(day),
            DataCell::null(),
            DataCell::from(Some("tail")),
        ])
        .await
        .unwrap();
    spreadsheet
        .add_row(&[Cell::new(7.5).with_formula(&total), Cell::formula(&total)])
        .await
        .unwrap();
    spreadsheet.finish_worksheet().await.unwrap();
    let bytes = spreadsheet.finish().await.unwrap();

    let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");
    assert!(sheet.contains(
        r#"<row r="1"><c><v>7</v></c><c><v>0.5</v></c><c t="b"><v>1</v></c><c s="1"><v>45351</v></c><c/><c t="inlineStr"><is><t>tail</t></is></c></row>"#
    ));
    assert!(sheet.contains(
        r#"<row r="2"><c><f>SUM(A1:B1)</f><v>7.5</v></c><c><f>SUM(A1:B1)</f></c></row>"#
    ));
}

#[tokio::test]
async fn test_package_is_self_consistent() {
    let options = SpreadsheetOptions {
        properties: DocumentProperties {
            title: Some("Inventory".to_string()),
            author: Some("Warehouse".to_string()),
            ..Default::default()
        },
        ..Default::default()
    };
    let mut spreadsheet = Spreadsheet::create(Vec::new(), options).unwrap();
    let bold = spreadsheet
        .add_style(&CellFormat::new().with_font(CellFont {
            bold: true,
            ..Default::default()
        }))
        .unwrap();
    let logo = spreadsheet
        .embed_image(Cursor::new(png(64, 32)))
        .await
        .unwrap();

    let lookup = WorksheetOptions::default().with_visibility(WorksheetVisibility::Hidden);
    spreadsheet.start_worksheet("Lookup", lookup).await.unwrap();
    for unit in ["box", "pallet"] {
        spreadsheet.add_row(&[Cell::new(unit)]).await.unwrap();
    }
    spreadsheet.finish_worksheet().await.unwrap();

    let stock = WorksheetOptions::default()
        .with_frozen_rows(2)
        .with_column_width(1, 24.0);
    spreadsheet.start_worksheet("Stock", stock).await.unwrap();
    spreadsheet
        .add_row(&[Cell::new("Stock report").with_style(bold)])
        .await
        .unwrap();
    spreadsheet.merge_cells("A1:C1").unwrap();

    let table = Table::new(TableStyle::Light(1))
        .with_name("Stock")
        .unwrap()
        .with_total_row_label(1, "Total")
        .with_total_row_function(3, TotalRowFunction::Sum);
    spreadsheet.start_table(table, 1).unwrap();
    spreadsheet
        .add_row(&[Cell::new("Item"), Cell::new("Unit"), Cell::new("Count")])
        .await
        .unwrap();
    for (item, count) in [("Bolts", 1200), ("Nuts", 950), ("Washers", 3000)] {
        spreadsheet
            .add_row(&[Cell::new(item), Cell::new("box"), Cell::new(count)])
            .await
            .unwrap();
    }
    spreadsheet.finish_table().await.unwrap();

    let units = DataValidation::list_from_worksheet_cells("Lookup", "A1:A2".parse().unwrap(), true);
    spreadsheet.add_data_validation("B3:B5", units).unwrap();
    let anchor: CellRef = "E2".parse().unwrap();
    spreadsheet
        .add_image(ImageCanvas::original_size(anchor), &logo)
        .unwrap();
    spreadsheet.finish_worksheet().await.unwrap();
    let bytes = spreadsheet.finish().await.unwrap();

    let names = part_names(&bytes);
    for expected in [
        "[Content_Types].xml",
        "_rels/.rels",
        "docProps/app.xml",
        "docProps/core.xml",
        "xl/workbook.xml",
        "xl/_rels/workbook.xml.rels",
        "xl/styles.xml",
        "xl/worksheets/sheet1.xml",
        "xl/worksheets/sheet2.xml",
        "xl/worksheets/_rels/sheet2.xml.rels",
        "xl/tables/table1.xml",
        "xl/drawings/drawing1.xml",
        "xl/drawings/_rels/drawing1.xml.rels",
        "xl/media/image1.png",
    ] {
        assert!(names.contains(expected), "missing {}", expected);
    }
    assert!(!names.contains("xl/worksheets/_rels/sheet1.xml.rels"));

    // Every override names a part and every relationship resolves
    let types = read_part(&bytes, "[Content_Types].xml");
    for part in attr_values(&types, "PartName") {
        assert!(names.contains(&part[1..]), "override for missing {}", part);
    }
    for rels in names.iter().filter(|n| n.ends_with(".rels")) {
        let xml = read_part(&bytes, rels);
        for target in attr_values(&xml, "Target") {
            let resolved = resolve_target(rels, target);
            assert!(names.contains(&resolved), "{} -> {}", rels, resolved);
        }
    }

    let workbook = read_part(&bytes, "xl/workbook.xml");
    assert!(workbook.contains(r#"<sheet name="Lookup" sheetId="1" state="hidden" r:id="rId1"/>"#));
    assert!(workbook.contains(r#"<workbookView activeTab="1" firstSheet="1"/>"#));

    let sheet = read_part(&bytes, "xl/worksheets/sheet2.xml");
    assert!(sheet.contains(r#"<pane ySplit="2" topLeftCell="A3" activePane="bottomLeft" state="frozen"/>"#));
    assert!(sheet.contains(r#"<mergeCell ref="A1:C1"/>"#));
    assert!(sheet.contains(r#"<f>SUBTOTAL(109,Stock[Count])</f>"#));
    assert!(sheet.contains("<formula1>&apos;Lookup&apos;!$A$1:$A$2</formula1>"));

    let table = read_part(&bytes, "xl/tables/table1.xml");
    assert!(table.contains(r#"name="Stock" displayName="Stock" ref="A2:C6""#));
    assert!(table.contains(r#"<autoFilter ref="A2:C5"/>"#));

    let core = read_part(&bytes, "docProps/core.xml");
    assert!(core.contains("<dc:title>Inventory</dc:title>"));
    let app = read_part(&bytes, "docProps/app.xml");
    assert!(app.contains("<vt:lpstr>Lookup</vt:lpstr><vt:lpstr>Stock</vt:lpstr>"));
}
