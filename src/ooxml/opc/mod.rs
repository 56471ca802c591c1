/// Open Packaging Conventions (OPC) output layer.
///
/// This module provides the packaging primitives a SpreadsheetML writer
/// needs in a single forward pass:
///
/// - A streaming ZIP writer over any `tokio::io::AsyncWrite`
/// - Content type management (`[Content_Types].xml`)
/// - Relationship parts with stable, insertion-ordered ids

pub mod archive;
pub mod constants;
pub mod content_types;
pub mod rel;

// Re-export commonly used types
pub use archive::{ArchiveWriter, EntryMethod, EntrySummary};
pub use content_types::ContentTypesItem;
pub use rel::{Relationship, Relationships};
