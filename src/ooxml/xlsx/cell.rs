//! Cell values as handed to the row writers.
//!
//! A [`DataCell`] pairs a small [`CellValue`] with the [`ValueKind`] of the
//! writer that must interpret it. Numbers, booleans and dates are stored
//! inline and strings are borrowed, so building a row never allocates.

use crate::common::unit::{date_to_oa_date, datetime_to_oa_date};
use crate::ooxml::xlsx::formula::Formula;
use crate::ooxml::xlsx::writer::styles::StyleId;
use chrono::{NaiveDate, NaiveDateTime};
use std::hash::{Hash, Hasher};

/// Raw cell content.
///
/// The variant alone does not say how the value is written: a boolean and an
/// integer both travel as `Int32`. The paired [`ValueKind`] decides.
#[derive(Debug, Clone, Copy)]
pub enum CellValue<'a> {
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Text(&'a str),
}

/// The writer responsible for a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Integer,
    Long,
    Float,
    Double,
    Boolean,
    DateTime,
    String,
    Null,
}

/// A value together with the kind of writer that produced it.
///
/// Fields are private so a value can only be paired with the kind that
/// matches it.
#[derive(Debug, Clone, Copy)]
pub struct DataCell<'a> {
    value: CellValue<'a>,
    kind: ValueKind,
}

impl<'a> DataCell<'a> {
    /// An empty cell.
    #[inline]
    pub const fn null() -> Self {
        Self {
            value: CellValue::Int32(0),
            kind: ValueKind::Null,
        }
    }

    #[inline]
    pub const fn bool(value: bool) -> Self {
        Self {
            value: CellValue::Int32(value as i32),
            kind: ValueKind::Boolean,
        }
    }

    /// A date cell from an OLE Automation serial.
    #[inline]
    pub const fn date_serial(serial: f64) -> Self {
        Self {
            value: CellValue::Float64(serial),
            kind: ValueKind::DateTime,
        }
    }

    #[inline]
    pub fn value(&self) -> CellValue<'a> {
        self.value
    }

    #[inline]
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.kind == ValueKind::Null
    }

    /// The text of a string cell.
    pub fn as_text(&self) -> Option<&'a str> {
        match (self.kind, self.value) {
            (ValueKind::String, CellValue::Text(text)) => Some(text),
            _ => None,
        }
    }

    /// Bit pattern of a non-text value, used as an equality key.
    pub(crate) fn bits(&self) -> u64 {
        match self.value {
            CellValue::Int32(v) => v as u32 as u64,
            CellValue::Int64(v) => v as u64,
            CellValue::Float32(v) => v.to_bits() as u64,
            CellValue::Float64(v) => v.to_bits(),
            CellValue::Text(_) => 0,
        }
    }
}

impl Default for DataCell<'_> {
    fn default() -> Self {
        Self::null()
    }
}

impl PartialEq for DataCell<'_> {
    fn eq(&self, other: &Self) -> bool {
        if self.kind != other.kind {
            return false;
        }
        match (self.value, other.value) {
            (CellValue::Text(a), CellValue::Text(b)) => a == b,
            (CellValue::Text(_), _) | (_, CellValue::Text(_)) => false,
            _ => self.bits() == other.bits(),
        }
    }
}

impl Eq for DataCell<'_> {}

impl Hash for DataCell<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        match self.value {
            CellValue::Text(text) => text.hash(state),
            _ => self.bits().hash(state),
        }
    }
}

impl From<i32> for DataCell<'_> {
    fn from(value: i32) -> Self {
        Self {
            value: CellValue::Int32(value),
            kind: ValueKind::Integer,
        }
    }
}

impl From<u32> for DataCell<'_> {
    fn from(value: u32) -> Self {
        Self::from(i64::from(value))
    }
}

impl From<i64> for DataCell<'_> {
    fn from(value: i64) -> Self {
        Self {
            value: CellValue::Int64(value),
            kind: ValueKind::Long,
        }
    }
}

impl From<f32> for DataCell<'_> {
    fn from(value: f32) -> Self {
        Self {
            value: CellValue::Float32(value),
            kind: ValueKind::Float,
        }
    }
}

impl From<f64> for DataCell<'_> {
    fn from(value: f64) -> Self {
        Self {
            value: CellValue::Float64(value),
            kind: ValueKind::Double,
        }
    }
}

impl From<bool> for DataCell<'_> {
    fn from(value: bool) -> Self {
        Self::bool(value)
    }
}

impl<'a> From<&'a str> for DataCell<'a> {
    fn from(value: &'a str) -> Self {
        Self {
            value: CellValue::Text(value),
            kind: ValueKind::String,
        }
    }
}

impl<'a> From<&'a String> for DataCell<'a> {
    fn from(value: &'a String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<NaiveDateTime> for DataCell<'_> {
    fn from(value: NaiveDateTime) -> Self {
        Self::date_serial(datetime_to_oa_date(value))
    }
}

impl From<NaiveDate> for DataCell<'_> {
    fn from(value: NaiveDate) -> Self {
        Self::date_serial(date_to_oa_date(value))
    }
}

impl<'a, T: Into<DataCell<'a>>> From<Option<T>> for DataCell<'a> {
    fn from(value: Option<T>) -> Self {
        value.map_or_else(DataCell::null, Into::into)
    }
}

/// One cell of a row: a value, an optional style and an optional formula.
///
/// With a formula, the value becomes the formula's cached result.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cell<'a> {
    pub data: DataCell<'a>,
    pub style: Option<StyleId>,
    pub formula: Option<&'a Formula>,
}

impl<'a> Cell<'a> {
    pub fn new(data: impl Into<DataCell<'a>>) -> Self {
        Self {
            data: data.into(),
            style: None,
            formula: None,
        }
    }

    /// A formula cell with no cached value.
    pub fn formula(formula: &'a Formula) -> Self {
        Self {
            data: DataCell::null(),
            style: None,
            formula: Some(formula),
        }
    }

    pub fn with_style(mut self, style: StyleId) -> Self {
        self.style = Some(style);
        self
    }

    pub fn with_formula(mut self, formula: &'a Formula) -> Self {
        self.formula = Some(formula);
        self
    }
}

impl<'a> From<DataCell<'a>> for Cell<'a> {
    fn from(data: DataCell<'a>) -> Self {
        Cell {
            data,
            style: None,
            formula: None,
        }
    }
}

/// A value with an optional style and no formula.
#[derive(Debug, Clone, Copy, Default)]
pub struct StyledCell<'a> {
    pub data: DataCell<'a>,
    pub style: Option<StyleId>,
}

impl<'a> StyledCell<'a> {
    pub fn new(data: impl Into<DataCell<'a>>, style: Option<StyleId>) -> Self {
        Self {
            data: data.into(),
            style,
        }
    }
}

impl<'a> From<StyledCell<'a>> for Cell<'a> {
    fn from(cell: StyledCell<'a>) -> Self {
        Cell {
            data: cell.data,
            style: cell.style,
            formula: None,
        }
    }
}

/// Anything a row can be built from.
///
/// Implemented by [`Cell`], [`StyledCell`] and [`DataCell`], so plain values
/// can be written without wrapping each one.
pub trait RowCell<'a> {
    fn to_cell(&self) -> Cell<'a>;
}

impl<'a> RowCell<'a> for Cell<'a> {
    #[inline]
    fn to_cell(&self) -> Cell<'a> {
        *self
    }
}

impl<'a> RowCell<'a> for StyledCell<'a> {
    #[inline]
    fn to_cell(&self) -> Cell<'a> {
        (*self).into()
    }
}

impl<'a> RowCell<'a> for DataCell<'a> {
    #[inline]
    fn to_cell(&self) -> Cell<'a> {
        (*self).into()
    }
}
