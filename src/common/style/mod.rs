//! Common style types.

// Submodule declarations
pub mod color;

// Re-exports
pub use color::Color;
