//! Table definitions.
//!
//! A [`Table`] describes how a block of rows is presented. The rows
//! themselves are written normally; the table part that refers to them is
//! generated after the worksheet is finished.

use crate::common::error::{Error, Result};
use crate::common::reference::{MAX_COLUMNS, looks_like_cell_reference};
use crate::ooxml::xlsx::writer::value::check_text_length;
use std::collections::BTreeMap;

/// Longest table name.
pub const MAX_TABLE_NAME_LENGTH: usize = 255;

/// One of the built-in table styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableStyle {
    /// No style; the table still filters and sorts.
    None,
    /// `TableStyleLight1` through `TableStyleLight21`.
    Light(u8),
    /// `TableStyleMedium1` through `TableStyleMedium28`.
    Medium(u8),
    /// `TableStyleDark1` through `TableStyleDark11`.
    Dark(u8),
}

impl TableStyle {
    pub(crate) fn validate(&self) -> Result<()> {
        let (family, number, max) = match *self {
            Self::None => return Ok(()),
            Self::Light(n) => ("Light", n, 21),
            Self::Medium(n) => ("Medium", n, 28),
            Self::Dark(n) => ("Dark", n, 11),
        };
        if number == 0 || number > max {
            return Err(Error::invalid_argument(format!(
                "Table style {}{} does not exist (1..={})",
                family, number, max
            )));
        }
        Ok(())
    }

    /// Name written to `tableStyleInfo`, if any.
    pub(crate) fn name(&self) -> Option<String> {
        match self {
            Self::None => None,
            Self::Light(n) => Some(format!("TableStyleLight{}", n)),
            Self::Medium(n) => Some(format!("TableStyleMedium{}", n)),
            Self::Dark(n) => Some(format!("TableStyleDark{}", n)),
        }
    }
}

impl Default for TableStyle {
    fn default() -> Self {
        Self::Medium(2)
    }
}

/// Aggregate shown in a column of the total row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TotalRowFunction {
    Average,
    Count,
    CountNumbers,
    Maximum,
    Minimum,
    StandardDeviation,
    Sum,
    Variance,
}

impl TotalRowFunction {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Average => "average",
            Self::Count => "count",
            Self::CountNumbers => "countNums",
            Self::Maximum => "max",
            Self::Minimum => "min",
            Self::StandardDeviation => "stdDev",
            Self::Sum => "sum",
            Self::Variance => "var",
        }
    }

    /// `SUBTOTAL` function number that ignores hidden rows.
    pub(crate) fn subtotal_code(&self) -> u32 {
        match self {
            Self::Average => 101,
            Self::Count => 103,
            Self::CountNumbers => 102,
            Self::Maximum => 104,
            Self::Minimum => 105,
            Self::StandardDeviation => 107,
            Self::Sum => 109,
            Self::Variance => 110,
        }
    }
}

/// Total row settings of one column. A column shows either a label or a
/// function, never both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableColumnOptions {
    pub total_row_function: Option<TotalRowFunction>,
    pub total_row_label: Option<String>,
}

/// Presentation of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub(crate) name: Option<String>,
    pub style: TableStyle,
    pub banded_rows: bool,
    pub banded_columns: bool,
    pub emphasize_first_column: bool,
    pub emphasize_last_column: bool,
    pub show_auto_filter: bool,
    pub(crate) number_of_columns: Option<u32>,
    /// Keyed by 1-based column number within the table.
    pub(crate) columns: BTreeMap<u32, TableColumnOptions>,
}

impl Table {
    pub fn new(style: TableStyle) -> Self {
        Self {
            name: None,
            style,
            banded_rows: true,
            banded_columns: false,
            emphasize_first_column: false,
            emphasize_last_column: false,
            show_auto_filter: true,
            number_of_columns: None,
            columns: BTreeMap::new(),
        }
    }

    /// Name the table. Unnamed tables are called `Table{id}`.
    pub fn with_name(mut self, name: &str) -> Result<Self> {
        validate_table_name(name)?;
        self.name = Some(name.to_string());
        Ok(self)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Fix the column count instead of taking it from the header row.
    pub fn with_number_of_columns(mut self, count: u32) -> Result<Self> {
        if count == 0 || count > MAX_COLUMNS {
            return Err(Error::invalid_argument(format!(
                "Table column count {} is outside 1..={}",
                count, MAX_COLUMNS
            )));
        }
        self.number_of_columns = Some(count);
        Ok(self)
    }

    pub fn number_of_columns(&self) -> Option<u32> {
        self.number_of_columns
    }

    pub fn with_banded_rows(mut self, banded: bool) -> Self {
        self.banded_rows = banded;
        self
    }

    pub fn with_banded_columns(mut self, banded: bool) -> Self {
        self.banded_columns = banded;
        self
    }

    /// Options of a 1-based table column, created on first access.
    pub fn column(&mut self, column: u32) -> &mut TableColumnOptions {
        self.columns.entry(column).or_default()
    }

    /// Show `function` under `column` in the total row.
    pub fn with_total_row_function(mut self, column: u32, function: TotalRowFunction) -> Self {
        self.column(column).total_row_function = Some(function);
        self
    }

    /// Show `label` under `column` in the total row.
    pub fn with_total_row_label(mut self, column: u32, label: impl Into<String>) -> Self {
        self.column(column).total_row_label = Some(label.into());
        self
    }

    /// Whether a total row is written when the table is finished.
    pub fn has_total_row(&self) -> bool {
        self.columns
            .values()
            .any(|c| c.total_row_function.is_some() || c.total_row_label.is_some())
    }

    pub(crate) fn validate(&self) -> Result<()> {
        self.style.validate()?;

        for (&column, options) in &self.columns {
            if column == 0 || column > MAX_COLUMNS {
                return Err(Error::invalid_argument(format!(
                    "Table column {} is outside 1..={}",
                    column, MAX_COLUMNS
                )));
            }
            if let Some(count) = self.number_of_columns
                && column > count
            {
                return Err(Error::invalid_argument(format!(
                    "Table column {} is beyond the table's {} columns",
                    column, count
                )));
            }
            if options.total_row_function.is_some() && options.total_row_label.is_some() {
                return Err(Error::invalid_argument(format!(
                    "Table column {} cannot have both a total row label and function",
                    column
                )));
            }
            if let Some(label) = &options.total_row_label {
                check_text_length(label)?;
            }
        }
        Ok(())
    }
}

impl Default for Table {
    fn default() -> Self {
        Self::new(TableStyle::default())
    }
}

/// Check the shape of a table name. Uniqueness is checked by the workbook.
pub fn validate_table_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| {
        Err(Error::invalid_argument(format!(
            "Invalid table name '{}': {}",
            name, reason
        )))
    };

    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return invalid("name is empty");
    };
    if name.chars().count() > MAX_TABLE_NAME_LENGTH {
        return invalid("name is too long");
    }
    if !(first.is_alphabetic() || first == '_' || first == '\\') {
        return invalid("name must start with a letter, '_' or '\\'");
    }
    if !chars.all(|c| c.is_alphanumeric() || c == '_' || c == '.' || c == '\\') {
        return invalid("name may only contain letters, digits, '_', '.' and '\\'");
    }
    if looks_like_cell_reference(name) {
        return invalid("name looks like a cell reference");
    }
    Ok(())
}
