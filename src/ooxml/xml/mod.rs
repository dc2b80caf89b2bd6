//! Mutable, namespace-aware XML tree for document parts.
//!
//! Parts are parsed into an arena of nodes addressed by [`NodeId`]. Parent and
//! child relationships are index links, so subtrees can be cloned, detached and
//! re-inserted without any aliasing between nodes:
//!
//! ```text
//! XmlTree
//! ├── nodes: Vec<Node>        # kind + parent + ordered children
//! ├── namespaces: Vec<String> # interned namespace URIs
//! └── document: NodeId        # synthetic node above the root element
//! ```
//!
//! Text, attribute values, comments and processing instructions are stored in
//! their escaped source form, so re-serializing an unmodified tree reproduces
//! the original markup apart from the XML declaration and whitespace outside
//! the root element.

mod reader;
mod tree;
mod writer;

pub use tree::{Ancestors, Attribute, Descendants, Name, NodeId, NodeKind, XmlTree};

use thiserror::Error;

/// Error raised when a part is not well-formed XML.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum XmlError {
    /// Tokenizer error at a byte offset
    #[error("syntax error at byte {position}: {message}")]
    Syntax { position: u64, message: String },

    /// Markup that is not valid UTF-8
    #[error("invalid UTF-8 at byte {0}")]
    Utf8(u64),

    /// A prefix used without a namespace declaration in scope
    #[error("undeclared namespace prefix '{0}'")]
    UndeclaredPrefix(String),

    /// Structural problem (no root, several roots, unclosed elements)
    #[error("{0}")]
    Structure(String),
}

/// Result type for XML tree operations.
pub type Result<T> = std::result::Result<T, XmlError>;

/// A namespace URI together with the prefix preferred when new nodes need one.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NamespaceBinding {
    /// Prefix used when the document has no binding of its own for `uri`
    pub prefix: String,
    /// Namespace URI
    pub uri: String,
}

impl NamespaceBinding {
    /// Create a new binding.
    pub fn new(prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            uri: uri.into(),
        }
    }
}
