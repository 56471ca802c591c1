//! Table tracking while rows stream, and table part serialization.

use crate::common::error::{Error, Result};
use crate::common::reference::{CellRange, CellRef, MAX_COLUMNS};
use crate::common::xml::{push_attr, push_num_attr};
use crate::ooxml::opc::constants::namespace;
use crate::ooxml::xlsx::cell::Cell;
use crate::ooxml::xlsx::formula::Formula;
use crate::ooxml::xlsx::table::Table;
use std::collections::HashSet;

/// A table whose rows are being written.
#[derive(Debug)]
pub(crate) struct ActiveTable {
    table: Table,
    id: u32,
    name: String,
    first_column: u32,
    header: Option<TableHeader>,
    last_row: u32,
}

#[derive(Debug)]
struct TableHeader {
    row: u32,
    names: Vec<String>,
}

/// One cell of a total row, owned until the row is written.
#[derive(Debug)]
pub(crate) enum TotalRowCell {
    Empty,
    Label(String),
    Function(Formula),
}

impl TotalRowCell {
    pub(crate) fn as_cell(&self) -> Cell<'_> {
        match self {
            Self::Empty => Cell::default(),
            Self::Label(label) => Cell::new(label),
            Self::Function(formula) => Cell::formula(formula),
        }
    }
}

impl ActiveTable {
    pub(crate) fn new(table: Table, id: u32, name: String, first_column: u32) -> Self {
        Self {
            table,
            id,
            name,
            first_column,
            header: None,
            last_row: 0,
        }
    }

    #[inline]
    pub(crate) fn has_header(&self) -> bool {
        self.header.is_some()
    }

    #[inline]
    pub(crate) fn first_column(&self) -> u32 {
        self.first_column
    }

    #[inline]
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Work out the column names from the header row's cells.
    ///
    /// String cells give their text; any other cell, and any column the row
    /// does not reach, is named `Column{n}`. Names must be unique ignoring
    /// case.
    pub(crate) fn header_names(&self, cells: &[Cell<'_>]) -> Result<Vec<String>> {
        let skip = (self.first_column - 1) as usize;
        let count = match self.table.number_of_columns {
            Some(count) => count,
            None => {
                let available = cells.len().saturating_sub(skip);
                if available == 0 {
                    return Err(Error::invalid_operation(format!(
                        "Header row of table '{}' has no cells from column {}",
                        self.name, self.first_column
                    )));
                }
                available as u32
            },
        };

        if self.first_column + count - 1 > MAX_COLUMNS {
            return Err(Error::invalid_operation(format!(
                "Table '{}' extends past column {}",
                self.name, MAX_COLUMNS
            )));
        }

        let mut seen = HashSet::with_capacity(count as usize);
        let mut names = Vec::with_capacity(count as usize);
        for n in 1..=count {
            let name = cells
                .get(skip + n as usize - 1)
                .and_then(|cell| cell.data.as_text())
                .filter(|text| !text.is_empty())
                .map_or_else(|| format!("Column{}", n), str::to_string);

            if !seen.insert(name.to_lowercase()) {
                return Err(Error::invalid_argument(format!(
                    "Table '{}' has more than one column named '{}'",
                    self.name, name
                )));
            }
            names.push(name);
        }
        Ok(names)
    }

    pub(crate) fn set_header(&mut self, row: u32, names: Vec<String>) {
        self.header = Some(TableHeader { row, names });
        self.last_row = row;
    }

    /// Row of the header, once written.
    pub(crate) fn header_row(&self) -> Option<u32> {
        self.header.as_ref().map(|h| h.row)
    }

    #[inline]
    pub(crate) fn record_row(&mut self, row: u32) {
        self.last_row = row;
    }

    /// Cells of the total row, or `None` when the table has none.
    pub(crate) fn total_row(&self) -> Result<Option<Vec<TotalRowCell>>> {
        let Some(header) = &self.header else {
            return Ok(None);
        };
        if !self.table.has_total_row() {
            return Ok(None);
        }

        let mut cells = Vec::with_capacity((self.first_column - 1) as usize + header.names.len());
        cells.extend((1..self.first_column).map(|_| TotalRowCell::Empty));

        for (i, name) in header.names.iter().enumerate() {
            let options = self.table.columns.get(&(i as u32 + 1));
            let cell = match options {
                Some(o) if o.total_row_label.is_some() => {
                    TotalRowCell::Label(o.total_row_label.clone().unwrap_or_default())
                },
                Some(o) => match o.total_row_function {
                    Some(function) => TotalRowCell::Function(Formula::new(format!(
                        "SUBTOTAL({},{}[{}])",
                        function.subtotal_code(),
                        self.name,
                        escape_structured_name(name)
                    ))?),
                    None => TotalRowCell::Empty,
                },
                None => TotalRowCell::Empty,
            };
            cells.push(cell);
        }
        Ok(Some(cells))
    }

    /// Work out the table's cells given the row the total row goes to.
    ///
    /// Nothing is committed, so a failure leaves the table active.
    pub(crate) fn ranges(&self, total_row: Option<u32>) -> Result<TableRanges> {
        let Some(header) = &self.header else {
            return Err(Error::invalid_operation(format!(
                "Table '{}' needs a header row before it can be finished",
                self.name
            )));
        };

        let last_column = self.first_column + header.names.len() as u32 - 1;
        let last_row = total_row.unwrap_or(self.last_row);
        // A table covers at least one data row, even if none was written
        let data_end = if total_row.is_some() {
            last_row - 1
        } else {
            last_row
        }
        .max(header.row + 1);
        let last_row = last_row.max(data_end);

        let range = CellRange::new(
            CellRef::new(self.first_column, header.row)?,
            CellRef::new(last_column, last_row)?,
        );
        let filter_range = CellRange::new(range.first, CellRef::new(last_column, data_end)?);

        Ok(TableRanges {
            range,
            filter_range,
            has_total_row: total_row.is_some(),
        })
    }

    /// Close the table with ranges from [`ActiveTable::ranges`].
    pub(crate) fn finish(self, ranges: TableRanges) -> FinishedTable {
        FinishedTable {
            id: self.id,
            name: self.name,
            table: self.table,
            range: ranges.range,
            filter_range: ranges.filter_range,
            column_names: self.header.map(|h| h.names).unwrap_or_default(),
            has_total_row: ranges.has_total_row,
        }
    }
}

/// Cells covered by a table about to be finished.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TableRanges {
    range: CellRange,
    filter_range: CellRange,
    has_total_row: bool,
}

/// A table whose rows are complete.
#[derive(Debug)]
pub(crate) struct FinishedTable {
    pub id: u32,
    pub name: String,
    table: Table,
    pub range: CellRange,
    filter_range: CellRange,
    column_names: Vec<String>,
    has_total_row: bool,
}

impl FinishedTable {
    /// Generate the table part.
    pub(crate) fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(512 + self.column_names.len() * 48);

        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push_str("<table");
        push_attr(&mut xml, "xmlns", namespace::SML_MAIN);
        push_num_attr(&mut xml, "id", self.id);
        push_attr(&mut xml, "name", &self.name);
        push_attr(&mut xml, "displayName", &self.name);
        push_attr(&mut xml, "ref", &self.range.to_string());
        if self.has_total_row {
            xml.push_str(r#" totalsRowCount="1""#);
        } else {
            xml.push_str(r#" totalsRowShown="0""#);
        }
        xml.push('>');

        if self.table.show_auto_filter {
            xml.push_str("<autoFilter");
            push_attr(&mut xml, "ref", &self.filter_range.to_string());
            xml.push_str("/>");
        }

        xml.push_str("<tableColumns");
        push_num_attr(&mut xml, "count", self.column_names.len());
        xml.push('>');
        for (i, name) in self.column_names.iter().enumerate() {
            let id = i as u32 + 1;
            xml.push_str("<tableColumn");
            push_num_attr(&mut xml, "id", id);
            push_attr(&mut xml, "name", name);
            if let Some(options) = self.table.columns.get(&id) {
                if let Some(ref label) = options.total_row_label {
                    push_attr(&mut xml, "totalsRowLabel", label);
                }
                if let Some(function) = options.total_row_function {
                    push_attr(&mut xml, "totalsRowFunction", function.as_str());
                }
            }
            xml.push_str("/>");
        }
        xml.push_str("</tableColumns>");

        xml.push_str("<tableStyleInfo");
        if let Some(style_name) = self.table.style.name() {
            push_attr(&mut xml, "name", &style_name);
        }
        let flag = |on: bool| if on { "1" } else { "0" };
        push_attr(&mut xml, "showFirstColumn", flag(self.table.emphasize_first_column));
        push_attr(&mut xml, "showLastColumn", flag(self.table.emphasize_last_column));
        push_attr(&mut xml, "showRowStripes", flag(self.table.banded_rows));
        push_attr(&mut xml, "showColumnStripes", flag(self.table.banded_columns));
        xml.push_str("/>");

        xml.push_str("</table>");
        xml
    }
}

/// Escape a column name for use inside `Table[...]`.
fn escape_structured_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if matches!(c, '[' | ']' | '#' | '\'') {
            out.push('\'');
        }
        out.push(c);
    }
    out
}
