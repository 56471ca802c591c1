//! Worksheet part fragments.
//!
//! A worksheet is streamed in three pieces: the preamble up to `<sheetData>`,
//! the rows, and the tail with every section that can only be written once
//! all rows are known. The schema fixes the element order, so `<cols>` is
//! part of the preamble and comes from the options supplied when the
//! worksheet starts.

use crate::common::error::Result;
use crate::common::reference::{CellRange, column_to_letters};
use crate::common::xml::{push_attr, push_num_attr};
use crate::ooxml::opc::constants::namespace;
use crate::ooxml::xlsx::options::{ColumnOptions, RowOptions, WorksheetOptions};
use crate::ooxml::xlsx::validation::DataValidation;
use crate::ooxml::xlsx::writer::buffer::{SpreadsheetBuffer, WriteOutcome};
use crate::ooxml::xlsx::writer::dimension::{DimensionRun, DimensionRunCompactor};
use crate::ooxml::xlsx::writer::styles::trim_float;

/// Upper bound of `<row r="1048576" s="4294967295" customFormat="1" ht="…" customHeight="1" hidden="1">`.
const ROW_START_BOUND: usize = 128;

const ROW_END: &[u8] = b"</row>";

/// Compact the column settings into runs of equal columns.
pub(crate) fn column_runs(options: &WorksheetOptions) -> Result<Vec<DimensionRun<ColumnOptions>>> {
    let mut compactor = DimensionRunCompactor::new();
    for (&column, settings) in &options.columns {
        compactor.record(column, *settings)?;
    }
    Ok(compactor.into_runs())
}

/// Everything from the XML declaration through `<sheetData>`.
pub(crate) fn worksheet_preamble(
    options: &WorksheetOptions,
    columns: &[DimensionRun<ColumnOptions>],
    selected: bool,
) -> String {
    let mut xml = String::with_capacity(512 + columns.len() * 64);

    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str("<worksheet");
    push_attr(&mut xml, "xmlns", namespace::SML_MAIN);
    push_attr(&mut xml, "xmlns:r", namespace::OFC_RELATIONSHIPS);
    xml.push('>');

    write_sheet_views(&mut xml, options, selected);
    write_cols(&mut xml, columns);

    xml.push_str("<sheetData>");
    xml
}

fn write_sheet_views(xml: &mut String, options: &WorksheetOptions, selected: bool) {
    let (rows, cols) = (options.frozen_rows, options.frozen_columns);
    if rows == 0 && cols == 0 && !selected {
        return;
    }

    xml.push_str("<sheetViews><sheetView");
    if selected {
        xml.push_str(r#" tabSelected="1""#);
    }
    xml.push_str(r#" workbookViewId="0""#);

    if rows == 0 && cols == 0 {
        xml.push_str("/></sheetViews>");
        return;
    }

    let pane = match (rows > 0, cols > 0) {
        (true, true) => "bottomRight",
        (true, false) => "bottomLeft",
        _ => "topRight",
    };

    xml.push_str("><pane");
    if cols > 0 {
        push_num_attr(xml, "xSplit", cols);
    }
    if rows > 0 {
        push_num_attr(xml, "ySplit", rows);
    }
    let top_left = format!("{}{}", column_to_letters(cols + 1), rows + 1);
    push_attr(xml, "topLeftCell", &top_left);
    push_attr(xml, "activePane", pane);
    xml.push_str(r#" state="frozen"/><selection"#);
    push_attr(xml, "pane", pane);
    xml.push_str("/></sheetView></sheetViews>");
}

fn write_cols(xml: &mut String, columns: &[DimensionRun<ColumnOptions>]) {
    let mut runs = columns
        .iter()
        .filter(|run| run.value.width.is_some() || run.value.hidden)
        .peekable();
    if runs.peek().is_none() {
        return;
    }

    let mut buf = ryu::Buffer::new();
    xml.push_str("<cols>");
    for run in runs {
        xml.push_str("<col");
        push_num_attr(xml, "min", run.start);
        push_num_attr(xml, "max", run.end());
        if let Some(width) = run.value.width {
            xml.push_str(r#" width=""#);
            xml.push_str(trim_float(buf.format(width)));
            xml.push_str(r#"" customWidth="1""#);
        }
        if run.value.hidden {
            xml.push_str(r#" hidden="1""#);
        }
        xml.push_str("/>");
    }
    xml.push_str("</cols>");
}

/// Append the opening `<row>` tag, or nothing if it does not fit.
pub(crate) fn try_write_row_start(
    buffer: &mut SpreadsheetBuffer,
    row: u32,
    options: Option<&RowOptions>,
) -> WriteOutcome {
    buffer.try_write_with(ROW_START_BOUND, |out| {
        let mut int = itoa::Buffer::new();
        out.extend_from_slice(b"<row r=\"");
        out.extend_from_slice(int.format(row).as_bytes());
        out.push(b'"');

        if let Some(options) = options {
            if let Some(style) = options.style.filter(|s| s.0 != 0) {
                out.extend_from_slice(b" s=\"");
                out.extend_from_slice(int.format(style.0).as_bytes());
                out.extend_from_slice(b"\" customFormat=\"1\"");
            }
            if let Some(height) = options.height {
                let mut float = ryu::Buffer::new();
                out.extend_from_slice(b" ht=\"");
                out.extend_from_slice(trim_float(float.format(height)).as_bytes());
                out.extend_from_slice(b"\" customHeight=\"1\"");
            }
            if options.hidden {
                out.extend_from_slice(b" hidden=\"1\"");
            }
        }

        out.push(b'>');
    })
}

#[inline]
pub(crate) fn try_write_row_end(buffer: &mut SpreadsheetBuffer) -> WriteOutcome {
    buffer.try_append(ROW_END)
}

/// Sections written after the last row.
#[derive(Debug, Default)]
pub(crate) struct WorksheetTail<'a> {
    pub auto_filter: Option<CellRange>,
    pub merged_cells: &'a [CellRange],
    pub validations: &'a [(Vec<CellRange>, DataValidation)],
    pub drawing_rel_id: Option<&'a str>,
    pub table_rel_ids: &'a [String],
}

impl WorksheetTail<'_> {
    /// `</sheetData>` through `</worksheet>`.
    pub(crate) fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(
            64 + self.merged_cells.len() * 32 + self.validations.len() * 256,
        );
        xml.push_str("</sheetData>");

        if let Some(range) = self.auto_filter {
            xml.push_str("<autoFilter");
            push_attr(&mut xml, "ref", &range.to_string());
            xml.push_str("/>");
        }

        if !self.merged_cells.is_empty() {
            xml.push_str("<mergeCells");
            push_num_attr(&mut xml, "count", self.merged_cells.len());
            xml.push('>');
            for range in self.merged_cells {
                xml.push_str("<mergeCell");
                push_attr(&mut xml, "ref", &range.to_string());
                xml.push_str("/>");
            }
            xml.push_str("</mergeCells>");
        }

        if !self.validations.is_empty() {
            xml.push_str("<dataValidations");
            push_num_attr(&mut xml, "count", self.validations.len());
            xml.push('>');
            for (ranges, validation) in self.validations {
                validation.write_xml(&mut xml, ranges);
            }
            xml.push_str("</dataValidations>");
        }

        if let Some(r_id) = self.drawing_rel_id {
            xml.push_str("<drawing");
            push_attr(&mut xml, "r:id", r_id);
            xml.push_str("/>");
        }

        if !self.table_rel_ids.is_empty() {
            xml.push_str("<tableParts");
            push_num_attr(&mut xml, "count", self.table_rel_ids.len());
            xml.push('>');
            for r_id in self.table_rel_ids {
                xml.push_str("<tablePart");
                push_attr(&mut xml, "r:id", r_id);
                xml.push_str("/>");
            }
            xml.push_str("</tableParts>");
        }

        xml.push_str("</worksheet>");
        xml
    }
}
