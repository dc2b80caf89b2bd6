//! The `[Content_Types].xml` stream.
//!
//! Only `Default` entries are ever added (for new media extensions); the rest
//! of the stream, `Override` entries included, is carried through untouched.

use crate::ooxml::opc::constants::namespace;
use crate::ooxml::opc::error::{OpcError, Result};
use crate::ooxml::opc::packuri::PackURI;
use crate::ooxml::xml::{NamespaceBinding, NodeId, XmlTree};

/// Parsed content-type map of a package.
#[derive(Debug, Clone)]
pub struct ContentTypes {
    tree: XmlTree,
}

impl ContentTypes {
    /// Parse the content of `[Content_Types].xml`.
    pub fn from_xml(xml: &[u8]) -> Result<Self> {
        let tree = XmlTree::parse(xml)?;
        let is_types = tree
            .root()
            .is_some_and(|root| tree.is_element(root, namespace::OPC_CONTENT_TYPES, "Types"));
        if !is_types {
            return Err(OpcError::XmlError("content types root is not <Types>".to_string()));
        }
        Ok(Self { tree })
    }

    fn entries<'a>(&'a self, local: &'a str) -> impl Iterator<Item = NodeId> + 'a {
        self.tree
            .root()
            .into_iter()
            .flat_map(move |root| self.tree.child_elements(root, namespace::OPC_CONTENT_TYPES, local))
    }

    /// The `Default` content type for an extension, compared case-insensitively.
    pub fn default_for(&self, ext: &str) -> Option<String> {
        self.entries("Default").find_map(|id| {
            let extension = self.tree.attribute(id, None, "Extension")?;
            extension
                .eq_ignore_ascii_case(ext)
                .then(|| self.tree.attribute(id, None, "ContentType"))
                .flatten()
                .map(|ct| ct.into_owned())
        })
    }

    /// The `Override` content type for a part.
    pub fn override_for(&self, partname: &PackURI) -> Option<String> {
        self.entries("Override").find_map(|id| {
            let name = self.tree.attribute(id, None, "PartName")?;
            name.eq_ignore_ascii_case(partname.as_str())
                .then(|| self.tree.attribute(id, None, "ContentType"))
                .flatten()
                .map(|ct| ct.into_owned())
        })
    }

    /// The effective content type of a part: its override, else its extension default.
    pub fn content_type_for(&self, partname: &PackURI) -> Option<String> {
        self.override_for(partname)
            .or_else(|| self.default_for(partname.ext()))
    }

    /// Add a `Default` entry unless the extension already has one.
    ///
    /// Returns whether an entry was added.
    pub fn add_default(&mut self, ext: &str, content_type: &str) -> bool {
        if self.default_for(ext).is_some() {
            return false;
        }
        let Some(root) = self.tree.root() else {
            return false;
        };

        let binding = NamespaceBinding::new("", namespace::OPC_CONTENT_TYPES);
        let entry = self.tree.create_element(&binding, "Default");
        self.tree.set_attribute(entry, None, "Extension", ext);
        self.tree.set_attribute(entry, None, "ContentType", content_type);

        // Defaults conventionally precede overrides
        let position = self
            .entries("Override")
            .next()
            .and_then(|first| self.tree.index_in_parent(first))
            .unwrap_or(usize::MAX);
        self.tree.insert_child(root, position, entry);
        true
    }

    /// Serialize the stream.
    pub fn to_xml(&self) -> Vec<u8> {
        self.tree.serialize()
    }
}
