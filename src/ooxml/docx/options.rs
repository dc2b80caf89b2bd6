//! Render configuration.
//!
//! Everything the renderer needs to know about WordprocessingML conventions
//! lives in [`RenderOptions`]: the namespace table used to match and create
//! nodes, which parts are treated as document flow, and where new media goes.
//! The defaults describe a standard Word package, so most callers never build
//! one by hand; the rest can load one from YAML:
//!
//! ```yaml
//! part_prefixes: [word/document, word/header, word/footer]
//! media_dir: word/media
//! strict_anchors: true
//! ```
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ooxml::error::{OoxmlError, Result};
use crate::ooxml::opc::constants::{namespace, part_prefix};
use crate::ooxml::xml::NamespaceBinding;

/// Namespaces the renderer matches against and creates nodes in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Namespaces {
    /// WordprocessingML main (`w`)
    pub wordprocessing: NamespaceBinding,
    /// WordprocessingML drawing (`wp`)
    pub drawing: NamespaceBinding,
    /// DrawingML main (`a`)
    pub drawingml: NamespaceBinding,
    /// DrawingML picture (`pic`)
    pub picture: NamespaceBinding,
    /// Office document relationships (`r`)
    pub relationships: NamespaceBinding,
}

impl Default for Namespaces {
    fn default() -> Self {
        Self {
            wordprocessing: NamespaceBinding::new("w", namespace::WML_MAIN),
            drawing: NamespaceBinding::new("wp", namespace::DML_WORDPROCESSING_DRAWING),
            drawingml: NamespaceBinding::new("a", namespace::DML_MAIN),
            picture: NamespaceBinding::new("pic", namespace::DML_PICTURE),
            relationships: NamespaceBinding::new("r", namespace::OFC_RELATIONSHIPS),
        }
    }
}

impl Namespaces {
    /// WordprocessingML namespace URI.
    #[inline]
    pub fn w(&self) -> &str {
        &self.wordprocessing.uri
    }
}

/// Immutable render configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Namespace table
    pub namespaces: Namespaces,
    /// Entry-name prefixes of renderable parts
    pub part_prefixes: Vec<String>,
    /// Directory new media entries are written to
    pub media_dir: String,
    /// Fail when a declared repeating key matches no placeholder
    pub strict_anchors: bool,
    /// Keep parts without any `sdtPr` marker unparsed
    pub skip_parts_without_controls: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            namespaces: Namespaces::default(),
            part_prefixes: vec![
                part_prefix::MAIN_DOCUMENT.to_string(),
                part_prefix::HEADER.to_string(),
                part_prefix::FOOTER.to_string(),
            ],
            media_dir: part_prefix::MEDIA_DIR.to_string(),
            strict_anchors: false,
            skip_parts_without_controls: true,
        }
    }
}

impl RenderOptions {
    /// Parse options from a YAML document. Missing fields take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_saphyr::from_str(yaml).map_err(|e| OoxmlError::Config(e.to_string()))
    }

    /// Load options from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Check whether an entry is a renderable document-flow part.
    pub fn is_renderable(&self, entry_name: &str) -> bool {
        entry_name.ends_with(".xml")
            && self
                .part_prefixes
                .iter()
                .any(|prefix| entry_name.starts_with(prefix.as_str()))
    }

    /// Entry-name prefix of the main document part, e.g. `word/document`.
    pub(crate) fn main_document_prefix(&self) -> &str {
        self.part_prefixes
            .first()
            .map(String::as_str)
            .unwrap_or(part_prefix::MAIN_DOCUMENT)
    }
}
