//! Loquat - fills Word (.docx) templates through their content controls
//!
//! A template is an ordinary .docx whose placeholders are content controls
//! (`w:sdt`) named by their alias or tag. Rendering replaces each
//! placeholder's content with a value from a field record and repeats the
//! table row or block around a placeholder once per record of a sequence.
//!
//! # Features
//!
//! - **Scalar substitution**: text and inline images keep the control's run formatting
//! - **Repeating blocks**: table rows, paragraphs and block controls, one per record
//! - **Byte-exact round-trip**: entries no placeholder touched are copied raw
//! - **Headers and footers**: rendered alongside the main document
//! - **Batch rendering**: independent templates rendered in parallel (`parallel` feature)
//!
//! # Example
//!
//! ```no_run
//! use std::collections::BTreeMap;
//! use loquat::{render, FieldRecord};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let template = std::fs::read("template.docx")?;
//! let fields = FieldRecord::from([("project", "Loquat"), ("owner", "Ana")]);
//!
//! let mut sequences = BTreeMap::new();
//! sequences.insert(
//!     "h.version".to_string(),
//!     vec![
//!         FieldRecord::from([("h.version", "V00")]),
//!         FieldRecord::from([("h.version", "V01")]),
//!     ],
//! );
//!
//! let output = render(&template, &fields, &sequences)?;
//! std::fs::write("report.docx", &output.bytes)?;
//! # Ok(())
//! # }
//! ```

/// OOXML package handling and template rendering
///
/// This module provides the package layer, the XML tree the renderer edits
/// and the Word-specific rendering logic.
pub mod ooxml;

// Re-export commonly used types for convenience
pub use ooxml::docx::{
    FieldRecord, FieldValue, ImagePayload, MediaEmbedder, RecordSequence, RenderJob, RenderOptions,
    RenderOutput, RenderReport, Renderer, TemplateData, render,
};
pub use ooxml::error::{OoxmlError, Result};
