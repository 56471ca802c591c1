//! Office Open XML output.
//!
//! The module is organized in two layers:
//!
//! 1. **OPC layer** (`opc`): the ZIP container, content types and
//!    relationship parts
//! 2. **SpreadsheetML** (`xlsx`): worksheets, styles, tables and drawings
//!    written on top of it

pub mod opc;
pub mod xlsx;
