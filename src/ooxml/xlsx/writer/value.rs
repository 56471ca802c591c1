//! Cell value writers.
//!
//! Each [`ValueKind`] has one writer. A writer first computes an upper bound
//! for the serialized cell and only touches the buffer when the whole cell
//! fits, so a failed attempt leaves no trace and can simply be retried after
//! a flush.
//!
//! Cells are written without an `r` attribute; readers place them by order,
//! which is why an empty unstyled cell still writes `<c/>`.

use crate::common::error::{Error, Result};
use crate::common::xml::{escape_into, escaped_len};
use crate::ooxml::xlsx::cell::{Cell, CellValue, DataCell, ValueKind};
use crate::ooxml::xlsx::formula::Formula;
use crate::ooxml::xlsx::writer::buffer::{SpreadsheetBuffer, WriteOutcome};
use crate::ooxml::xlsx::writer::styles::{DefaultStyling, StyleId, trim_float};
use smallvec::SmallVec;

/// Longest text a cell may hold, in characters.
pub const MAX_TEXT_LENGTH: usize = 32_767;

/// Bytes of markup around any value: `<c s="4294967295" t="inlineStr">`,
/// `<is><t xml:space="preserve">`, the closing tags and `<f></f>` all fit.
const CELL_OVERHEAD: usize = 96;

/// Room for the longest integer or shortest-round-trip float, plus `<v></v>`.
const NUMBER_BOUND: usize = 40;

const ERROR_NUM: &[u8] = b"#NUM!";

/// Writes cells into the buffer and keeps the cached value block of the
/// last formula cell.
#[derive(Debug, Default)]
pub(crate) struct CellWriter {
    cached: CachedValueBlock,
}

/// The `<v>` block of a formula's cached result.
///
/// Consecutive formula cells often cache the same value (and a retry after a
/// flush always does), so the serialized block is kept and reused while the
/// value is unchanged. Text results are not cached.
#[derive(Debug, Default)]
struct CachedValueBlock {
    key: Option<(ValueKind, u64)>,
    type_attr: Option<&'static str>,
    bytes: SmallVec<[u8; 48]>,
}

impl CachedValueBlock {
    fn get_or_render(&mut self, data: &DataCell<'_>) -> (Option<&'static str>, &[u8]) {
        let key = (data.kind(), data.bits());
        if self.key != Some(key) {
            self.bytes.clear();
            let mut out = Vec::with_capacity(NUMBER_BOUND);
            push_number_value(&mut out, data);
            self.bytes.extend_from_slice(&out);
            self.type_attr = value_type(data, true);
            self.key = Some(key);
        }
        (self.type_attr, &self.bytes)
    }

    #[cfg(test)]
    fn key(&self) -> Option<(ValueKind, u64)> {
        self.key
    }
}

impl CellWriter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Attempt to write one cell.
    ///
    /// Text over [`MAX_TEXT_LENGTH`] is rejected before the buffer is
    /// touched. Running out of space is not an error: it is reported as
    /// [`WriteOutcome::InsufficientSpace`] with the bound that did not fit.
    pub(crate) fn try_write(
        &mut self,
        cell: &Cell<'_>,
        defaults: &DefaultStyling,
        buffer: &mut SpreadsheetBuffer,
    ) -> Result<WriteOutcome> {
        let style = resolve_style(cell, defaults);

        if let Some(text) = cell.data.as_text() {
            check_text_length(text)?;
        }

        Ok(match cell.formula {
            Some(formula) => self.try_write_formula_cell(&cell.data, style, formula, buffer),
            None => try_write_data_cell(&cell.data, style, buffer),
        })
    }

    fn try_write_formula_cell(
        &mut self,
        data: &DataCell<'_>,
        style: Option<StyleId>,
        formula: &Formula,
        buffer: &mut SpreadsheetBuffer,
    ) -> WriteOutcome {
        let formula_len = escaped_len(formula.text());

        if let Some(text) = data.as_text() {
            let bound = CELL_OVERHEAD + formula_len + escaped_len(text);
            return buffer.try_write_with(bound, |out| {
                open_cell(out, style, Some("str"));
                push_formula(out, formula);
                out.extend_from_slice(b"<v>");
                escape_into(text, out);
                out.extend_from_slice(b"</v></c>");
            });
        }

        if data.is_null() {
            let bound = CELL_OVERHEAD + formula_len;
            return buffer.try_write_with(bound, |out| {
                open_cell(out, style, None);
                push_formula(out, formula);
                out.extend_from_slice(b"</c>");
            });
        }

        let (type_attr, block) = self.cached.get_or_render(data);
        let bound = CELL_OVERHEAD + formula_len + block.len();
        buffer.try_write_with(bound, |out| {
            open_cell(out, style, type_attr);
            push_formula(out, formula);
            out.extend_from_slice(block);
            out.extend_from_slice(b"</c>");
        })
    }
}

/// Explicit style first, then the default for the value's kind.
#[inline]
pub(crate) fn resolve_style(cell: &Cell<'_>, defaults: &DefaultStyling) -> Option<StyleId> {
    cell.style.or(match cell.data.kind() {
        ValueKind::DateTime => defaults.date_time,
        _ => None,
    })
}

pub(crate) fn check_text_length(text: &str) -> Result<()> {
    // Byte length bounds the character count from above
    if text.len() > MAX_TEXT_LENGTH && text.chars().count() > MAX_TEXT_LENGTH {
        return Err(Error::invalid_argument(format!(
            "Cell text cannot be longer than {} characters",
            MAX_TEXT_LENGTH
        )));
    }
    Ok(())
}

/// Upper bound of the serialized plain cell.
pub(crate) fn data_cell_bound(data: &DataCell<'_>) -> usize {
    match data.kind() {
        ValueKind::Null => CELL_OVERHEAD,
        ValueKind::String => CELL_OVERHEAD + data.as_text().map_or(0, escaped_len),
        _ => CELL_OVERHEAD + NUMBER_BOUND,
    }
}

fn try_write_data_cell(
    data: &DataCell<'_>,
    style: Option<StyleId>,
    buffer: &mut SpreadsheetBuffer,
) -> WriteOutcome {
    let bound = data_cell_bound(data);
    buffer.try_write_with(bound, |out| match data.kind() {
        ValueKind::Null => {
            out.extend_from_slice(b"<c");
            push_style_attr(out, style);
            out.extend_from_slice(b"/>");
        },
        ValueKind::String => {
            let text = data.as_text().unwrap_or_default();
            open_cell(out, style, Some("inlineStr"));
            if needs_space_preserve(text) {
                out.extend_from_slice(br#"<is><t xml:space="preserve">"#);
            } else {
                out.extend_from_slice(b"<is><t>");
            }
            escape_into(text, out);
            out.extend_from_slice(b"</t></is></c>");
        },
        _ => {
            open_cell(out, style, value_type(data, false));
            push_number_value(out, data);
            out.extend_from_slice(b"</c>");
        },
    })
}

/// The `t` attribute for a value, if any.
fn value_type(data: &DataCell<'_>, in_formula: bool) -> Option<&'static str> {
    match (data.kind(), data.value()) {
        (ValueKind::Boolean, _) => Some("b"),
        (ValueKind::String, _) => Some(if in_formula { "str" } else { "inlineStr" }),
        (_, CellValue::Float32(v)) if !v.is_finite() => Some("e"),
        (_, CellValue::Float64(v)) if !v.is_finite() => Some("e"),
        _ => None,
    }
}

fn open_cell(out: &mut Vec<u8>, style: Option<StyleId>, type_attr: Option<&str>) {
    out.extend_from_slice(b"<c");
    push_style_attr(out, style);
    if let Some(t) = type_attr {
        out.extend_from_slice(b" t=\"");
        out.extend_from_slice(t.as_bytes());
        out.push(b'"');
    }
    out.push(b'>');
}

#[inline]
fn push_style_attr(out: &mut Vec<u8>, style: Option<StyleId>) {
    // Style 0 is the default and needs no attribute
    if let Some(style) = style.filter(|s| s.0 != 0) {
        let mut buf = itoa::Buffer::new();
        out.extend_from_slice(b" s=\"");
        out.extend_from_slice(buf.format(style.0).as_bytes());
        out.push(b'"');
    }
}

fn push_formula(out: &mut Vec<u8>, formula: &Formula) {
    out.extend_from_slice(b"<f>");
    escape_into(formula.text(), out);
    out.extend_from_slice(b"</f>");
}

/// Write `<v>…</v>` for a non-text value.
fn push_number_value(out: &mut Vec<u8>, data: &DataCell<'_>) {
    out.extend_from_slice(b"<v>");
    match data.value() {
        CellValue::Int32(v) => {
            let mut buf = itoa::Buffer::new();
            out.extend_from_slice(buf.format(v).as_bytes());
        },
        CellValue::Int64(v) => {
            let mut buf = itoa::Buffer::new();
            out.extend_from_slice(buf.format(v).as_bytes());
        },
        CellValue::Float32(v) if v.is_finite() => {
            let mut buf = ryu::Buffer::new();
            out.extend_from_slice(trim_float(buf.format_finite(v)).as_bytes());
        },
        CellValue::Float64(v) if v.is_finite() => {
            let mut buf = ryu::Buffer::new();
            out.extend_from_slice(trim_float(buf.format_finite(v)).as_bytes());
        },
        CellValue::Float32(_) | CellValue::Float64(_) => out.extend_from_slice(ERROR_NUM),
        CellValue::Text(_) => {},
    }
    out.extend_from_slice(b"</v>");
}

#[inline]
fn needs_space_preserve(text: &str) -> bool {
    text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace)
}
