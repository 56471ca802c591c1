//! Types and helpers shared by the packaging and spreadsheet layers.

// Submodule declarations
pub mod error;
pub mod reference;
pub mod style;
pub mod unit;
pub mod xml;

// Re-exports for convenience
pub use error::{Error, Result};
pub use reference::{CellRange, CellRef};
pub use style::Color;
