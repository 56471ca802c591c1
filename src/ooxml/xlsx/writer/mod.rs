//! Serializers for the parts of a streamed workbook.
//!
//! Worksheet rows go through [`buffer`] and [`value`]; every other part is
//! rendered to a string once its content is complete.

pub mod buffer;
pub mod dimension;
pub(crate) mod drawing;
pub(crate) mod sheet;
pub mod styles;
pub(crate) mod table;
pub mod value;
pub(crate) mod workbook;

// Re-export main types
pub use buffer::{DEFAULT_BUFFER_SIZE, MIN_BUFFER_SIZE, SpreadsheetBuffer, WriteOutcome};
pub use dimension::{DIMENSION_TOLERANCE, Dimension, DimensionRun, DimensionRunCompactor};
pub use styles::{DefaultStyling, MAX_STYLES, StyleId, StylesBuilder};
pub use value::MAX_TEXT_LENGTH;
