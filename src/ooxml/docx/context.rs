//! Per-part render state.
use std::collections::{BTreeSet, HashSet};

use crate::ooxml::docx::ids::IdAllocator;
use crate::ooxml::docx::media::MediaEmbedder;
use crate::ooxml::docx::options::RenderOptions;
use crate::ooxml::xml::{NodeId, XmlTree};

/// Mutable state threaded through substitution and expansion of one part.
pub struct PartContext<'a> {
    /// Entry name of the part, e.g. `word/header1.xml`
    pub part: &'a str,
    pub tree: XmlTree,
    pub options: &'a RenderOptions,
    pub embedder: &'a mut dyn MediaEmbedder,
    pub ids: IdAllocator,
    /// `w:sdt` nodes that received a value
    pub filled: HashSet<NodeId>,
    /// Record and field keys that were used at least once
    pub used_keys: BTreeSet<String>,
    /// Whether the tree differs from the source part
    pub modified: bool,
}

impl<'a> PartContext<'a> {
    pub fn new(
        part: &'a str,
        tree: XmlTree,
        options: &'a RenderOptions,
        embedder: &'a mut dyn MediaEmbedder,
    ) -> Self {
        let ids = IdAllocator::from_tree(&tree, &options.namespaces);
        Self {
            part,
            tree,
            options,
            embedder,
            ids,
            filled: HashSet::new(),
            used_keys: BTreeSet::new(),
            modified: false,
        }
    }
}
