//! Streaming Excel (.xlsx) writer.
//!
//! The model types describe what goes into a workbook (cells, formats,
//! formulas, validations, tables and images); [`Spreadsheet`] streams them
//! into a SpreadsheetML package; the [`writer`] module holds the part
//! serializers it drives.

pub mod cell;
pub mod format;
pub mod formula;
pub mod image;
pub mod options;
pub mod spreadsheet;
pub mod table;
pub mod validation;
pub mod writer;

// Re-export main types
pub use cell::{Cell, CellValue, DataCell, RowCell, StyledCell, ValueKind};
pub use format::{
    CellAlignment, CellBorder, CellBorderLineStyle, CellBorderSide, CellFill, CellFillPatternType,
    CellFont, CellFormat, HorizontalAlignment, NumberFormat, StandardNumberFormat,
    VerticalAlignment,
};
pub use formula::Formula;
pub use image::{EmbeddedImage, ImageCanvas, ImageSize};
pub use options::{
    ColumnOptions, CompressionLevel, DocumentProperties, RowOptions, SpreadsheetOptions,
    WorksheetOptions, WorksheetVisibility,
};
pub use spreadsheet::{Spreadsheet, validate_worksheet_name};
pub use table::{Table, TableColumnOptions, TableStyle, TotalRowFunction};
pub use validation::{DataValidation, ValidationCondition, ValidationErrorStyle};
pub use writer::{DefaultStyling, StyleId, WriteOutcome};

#[cfg(test)]
mod tests;
