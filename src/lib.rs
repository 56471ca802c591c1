//! Spreadstream - A streaming writer for Excel (.xlsx) workbooks
//!
//! Rows are encoded straight into a ZIP archive as they arrive, so a
//! workbook of any length is written with a fixed amount of memory. The
//! destination is any [`tokio::io::AsyncWrite`]; when the output buffer
//! fills up, the write awaits the destination, which gives natural
//! backpressure.
//!
//! # Features
//!
//! - **Streaming rows**: cells are serialized once and never held in memory
//! - **Styles**: fonts, fills, borders, alignment and number formats,
//!   deduplicated by value
//! - **Formulas and hyperlinks**, with cached results
//! - **Worksheet layout**: column widths, row heights, frozen panes, merged
//!   cells, auto-filters and hidden sheets
//! - **Data validation**, **tables** with total rows, and **PNG images**
//!
//! # Example
//!
//! ```no_run
//! use spreadstream::{
//!     Cell, CellFont, CellFormat, Spreadsheet, SpreadsheetOptions, WorksheetOptions,
//! };
//!
//! # async fn demo() -> spreadstream::Result<()> {
//! let file = tokio::fs::File::create("inventory.xlsx").await?;
//! let mut spreadsheet = Spreadsheet::create(file, SpreadsheetOptions::default())?;
//!
//! let bold = spreadsheet.add_style(&CellFormat::new().with_font(CellFont {
//!     bold: true,
//!     ..Default::default()
//! }))?;
//!
//! let mut options = WorksheetOptions::default().with_frozen_rows(1);
//! options.column(1).width = Some(24.0);
//! spreadsheet.start_worksheet("Inventory", options).await?;
//!
//! spreadsheet
//!     .add_row(&[Cell::new("Item").with_style(bold), Cell::new("Count").with_style(bold)])
//!     .await?;
//! for (item, count) in [("Bolts", 1200), ("Nuts", 950)] {
//!     spreadsheet.add_row(&[Cell::new(item), Cell::new(count)]).await?;
//! }
//!
//! spreadsheet.finish_worksheet().await?;
//! spreadsheet.finish().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Errors
//!
//! Invalid input and misuse are reported before anything is written and
//! leave the spreadsheet usable. A failed or cancelled write to the
//! destination leaves it [`Error::Poisoned`].

/// Types and helpers shared by every layer (errors, references, colors, XML)
pub mod common;

/// Office Open XML packaging and the SpreadsheetML writer
pub mod ooxml;

// Re-export the writer API at the crate root
pub use common::{CellRange, CellRef, Color, Error, Result};
pub use ooxml::xlsx::*;
