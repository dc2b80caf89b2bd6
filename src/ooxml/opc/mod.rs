/// Open Packaging Conventions (OPC) layer.
///
/// A package is a ZIP container of named parts. This module reads one into
/// memory, lets callers replace or add parts, and writes it back while copying
/// every untouched member verbatim. It also understands the two bookkeeping
/// streams the renderer has to update when media is embedded:
///
/// - `.rels` relationship parts ([`Relationships`])
/// - `[Content_Types].xml` ([`ContentTypes`])
///
/// # Performance Features
///
/// - Untouched members are raw-copied, never re-compressed
/// - Uses `atoi_simd` and `itoa` for relationship id arithmetic
/// - Uses `quick-xml` for parsing relationship parts
pub mod constants;
pub mod content_types;
pub mod error;
pub mod package;
pub mod packuri;
pub mod phys_pkg;
pub mod rel;

// Re-export commonly used types
pub use content_types::ContentTypes;
pub use error::OpcError;
pub use package::Package;
pub use packuri::{CONTENT_TYPES_MEMBER, PackURI};
pub use rel::{Relationship, Relationships};
