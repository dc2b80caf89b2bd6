//! Office Open XML (OOXML) template rendering.
//!
//! The implementation is layered the way an OOXML consumer reads a package:
//!
//! 1. **OPC Layer** (`opc`): ZIP container, relationships and content types
//! 2. **XML Layer** (`xml`): namespace-aware arena tree for part content
//! 3. **Word Layer** (`docx`): content controls, substitution, repeating blocks
//!    and the render orchestrator
//!
//! Errors from every layer converge on [`OoxmlError`].
pub mod docx;
pub mod error;
pub mod opc;
pub mod xml;

// Re-export commonly used types from OPC layer
pub use opc::{Package, PackURI};

// Re-export error types
pub use error::{OoxmlError, Result};
