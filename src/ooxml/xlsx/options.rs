//! Document, worksheet and row options.
//!
//! Options are plain data handed to the spreadsheet explicitly; nothing is
//! read from the environment.

use crate::common::error::{Error, Result};
use crate::common::reference::{CellRange, MAX_COLUMNS};
use crate::ooxml::xlsx::format::NumberFormat;
use crate::ooxml::xlsx::writer::buffer::{DEFAULT_BUFFER_SIZE, MIN_BUFFER_SIZE};
use crate::ooxml::xlsx::writer::dimension::Dimension;
use crate::ooxml::xlsx::writer::styles::StyleId;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;

/// Widest column a reader accepts, in characters.
pub const MAX_COLUMN_WIDTH: f64 = 255.0;

/// Tallest row a reader accepts, in points.
pub const MAX_ROW_HEIGHT: f64 = 409.0;

/// Deflate effort for the worksheet parts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompressionLevel {
    /// Smallest output.
    #[default]
    Optimal,
    /// Least CPU per byte.
    Fastest,
}

impl CompressionLevel {
    pub(crate) fn to_flate2(self) -> flate2::Compression {
        match self {
            Self::Optimal => flate2::Compression::default(),
            Self::Fastest => flate2::Compression::fast(),
        }
    }
}

/// Values written to `docProps/core.xml` and `docProps/app.xml`.
#[derive(Debug, Clone, Default)]
pub struct DocumentProperties {
    pub title: Option<String>,
    pub subject: Option<String>,
    pub author: Option<String>,
    pub keywords: Option<String>,
    /// Creation timestamp; the time the document is created when unset.
    pub created: Option<NaiveDateTime>,
    /// Written as the `Application` property.
    pub application: Option<String>,
}

/// Options for a whole document.
#[derive(Debug, Clone)]
pub struct SpreadsheetOptions {
    /// Output buffer capacity in bytes, at least 512.
    pub buffer_size: usize,
    pub compression: CompressionLevel,
    /// Number format applied to date cells without a style. `None` writes
    /// dates as bare serial numbers.
    pub default_date_time_format: Option<NumberFormat>,
    pub properties: DocumentProperties,
}

impl Default for SpreadsheetOptions {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            compression: CompressionLevel::default(),
            default_date_time_format: Some(NumberFormat::custom("yyyy-mm-dd hh:mm:ss")),
            properties: DocumentProperties::default(),
        }
    }
}

impl SpreadsheetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_compression(mut self, compression: CompressionLevel) -> Self {
        self.compression = compression;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.buffer_size < MIN_BUFFER_SIZE {
            return Err(Error::invalid_argument(format!(
                "Buffer size must be at least {} bytes",
                MIN_BUFFER_SIZE
            )));
        }
        Ok(())
    }
}

/// Whether a worksheet tab is shown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WorksheetVisibility {
    #[default]
    Visible,
    Hidden,
}

/// Width and visibility of one column.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ColumnOptions {
    /// Width in characters, in (0, 255].
    pub width: Option<f64>,
    pub hidden: bool,
}

impl Dimension for ColumnOptions {
    #[inline]
    fn approx_eq(&self, other: &Self) -> bool {
        self.hidden == other.hidden && self.width.approx_eq(&other.width)
    }
}

/// Options for one worksheet, fixed when the worksheet starts.
#[derive(Debug, Clone, Default)]
pub struct WorksheetOptions {
    /// Column settings keyed by 1-based column number.
    pub columns: BTreeMap<u32, ColumnOptions>,
    /// Rows kept in view at the top.
    pub frozen_rows: u32,
    /// Columns kept in view at the left.
    pub frozen_columns: u32,
    pub visibility: WorksheetVisibility,
    /// Range that gets filter buttons.
    pub auto_filter: Option<CellRange>,
}

impl WorksheetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings of a 1-based column, created on first access.
    pub fn column(&mut self, column: u32) -> &mut ColumnOptions {
        self.columns.entry(column).or_default()
    }

    pub fn with_column_width(mut self, column: u32, width: f64) -> Self {
        self.column(column).width = Some(width);
        self
    }

    pub fn with_frozen_rows(mut self, rows: u32) -> Self {
        self.frozen_rows = rows;
        self
    }

    pub fn with_frozen_columns(mut self, columns: u32) -> Self {
        self.frozen_columns = columns;
        self
    }

    pub fn with_visibility(mut self, visibility: WorksheetVisibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_auto_filter(mut self, range: CellRange) -> Self {
        self.auto_filter = Some(range);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        for (&column, options) in &self.columns {
            if column == 0 || column > MAX_COLUMNS {
                return Err(Error::invalid_argument(format!(
                    "Column {} is outside 1..={}",
                    column, MAX_COLUMNS
                )));
            }
            if let Some(width) = options.width
                && !(width > 0.0 && width <= MAX_COLUMN_WIDTH)
            {
                return Err(Error::invalid_argument(format!(
                    "Column width {} is outside (0, {}]",
                    width, MAX_COLUMN_WIDTH
                )));
            }
        }

        if self.frozen_columns >= MAX_COLUMNS {
            return Err(Error::invalid_argument(
                "Cannot freeze every column of a worksheet",
            ));
        }
        Ok(())
    }
}

/// Options for one row.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RowOptions {
    /// Height in points, in (0, 409].
    pub height: Option<f64>,
    /// Style applied to empty cells of the row.
    pub style: Option<StyleId>,
    pub hidden: bool,
}

impl RowOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_height(mut self, height: f64) -> Self {
        self.height = Some(height);
        self
    }

    pub fn with_style(mut self, style: StyleId) -> Self {
        self.style = Some(style);
        self
    }

    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if let Some(height) = self.height
            && !(height > 0.0 && height <= MAX_ROW_HEIGHT)
        {
            return Err(Error::invalid_argument(format!(
                "Row height {} is outside (0, {}]",
                height, MAX_ROW_HEIGHT
            )));
        }
        Ok(())
    }
}
