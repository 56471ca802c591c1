//! Unified error types for spreadstream.
//!
//! Every fallible operation in the crate returns [`Result`], whose error side
//! distinguishes caller bugs, rejected input and fatal output failures.

// Submodule declarations
pub mod types;
pub mod conversions;

// Re-exports
pub use types::{Error, Result};
