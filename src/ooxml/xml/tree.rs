/// Arena storage and tree surgery operations.
use super::{NamespaceBinding, Result, reader, writer};
use crate::ooxml::opc::constants::namespace;
use quick_xml::escape::{escape, partial_escape, unescape};
use smallvec::SmallVec;
use std::borrow::Cow;

/// Index of a node in an [`XmlTree`] arena.
///
/// Ids stay valid for the lifetime of the tree: detaching a node only unlinks
/// it, it never frees or renumbers arena slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// A qualified element or attribute name with its resolved namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Name {
    /// Name as written in the markup, prefix included
    raw: String,
    /// Byte offset of the prefix separator
    colon: Option<usize>,
    /// Index into the tree's namespace table
    ns: Option<u16>,
}

impl Name {
    pub(super) fn new(raw: String, ns: Option<u16>) -> Self {
        let colon = raw.find(':');
        Self { raw, colon, ns }
    }

    /// The name as written, e.g. `w:sdt`.
    #[inline]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The prefix, e.g. `w` for `w:sdt`.
    #[inline]
    pub fn prefix(&self) -> Option<&str> {
        self.colon.map(|c| &self.raw[..c])
    }

    /// The local part, e.g. `sdt` for `w:sdt`.
    #[inline]
    pub fn local(&self) -> &str {
        match self.colon {
            Some(c) => &self.raw[c + 1..],
            None => &self.raw,
        }
    }
}

/// An attribute with its value in escaped source form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    name: Name,
    value: String,
}

impl Attribute {
    pub(super) fn new(name: Name, value: String) -> Self {
        Self { name, value }
    }

    /// The attribute name.
    #[inline]
    pub fn name(&self) -> &Name {
        &self.name
    }

    /// The value exactly as it appears in the markup.
    #[inline]
    pub fn raw_value(&self) -> &str {
        &self.value
    }

    /// The unescaped value. Unknown entities are left as written.
    pub fn value(&self) -> Cow<'_, str> {
        unescape(&self.value).unwrap_or(Cow::Borrowed(&self.value))
    }

    /// Whether this attribute is a namespace declaration (`xmlns` or `xmlns:p`).
    #[inline]
    pub fn is_declaration(&self) -> bool {
        self.name.raw == "xmlns" || self.name.prefix() == Some("xmlns")
    }
}

/// The content of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Synthetic node holding the root element and top-level misc nodes
    Document,
    Element {
        name: Name,
        attributes: SmallVec<[Attribute; 4]>,
    },
    /// Escaped character data, entity references kept verbatim
    Text(String),
    CData(String),
    Comment(String),
    ProcessingInstruction(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A parsed XML part.
#[derive(Debug, Clone)]
pub struct XmlTree {
    nodes: Vec<Node>,
    namespaces: Vec<String>,
    document: NodeId,
}

/// Index of [`namespace::XML`] in every namespace table.
pub(super) const XML_NS: u16 = 0;
/// Index of [`namespace::XMLNS`] in every namespace table.
pub(super) const XMLNS_NS: u16 = 1;

impl XmlTree {
    /// Create a tree holding only the document node.
    pub(super) fn empty() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
            namespaces: vec![namespace::XML.to_string(), namespace::XMLNS.to_string()],
            document: NodeId(0),
        }
    }

    /// Parse a part.
    ///
    /// # Errors
    /// Returns an [`XmlError`](super::XmlError) if the markup is not well-formed.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        reader::parse(bytes)
    }

    /// Serialize the tree with a UTF-8, `standalone="yes"` declaration.
    pub fn serialize(&self) -> Vec<u8> {
        writer::serialize(self)
    }

    /// The synthetic document node.
    #[inline]
    pub fn document(&self) -> NodeId {
        self.document
    }

    /// The root element.
    pub fn root(&self) -> Option<NodeId> {
        self.children(self.document)
            .iter()
            .copied()
            .find(|&id| matches!(self.kind(id), NodeKind::Element { .. }))
    }

    /// Number of arena slots, detached nodes included.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// A tree always holds its document node.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    #[inline]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    #[inline]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    #[inline]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].children
    }

    /// The element name, `None` for non-element nodes.
    pub fn name(&self, id: NodeId) -> Option<&Name> {
        match self.kind(id) {
            NodeKind::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    /// The namespace URI of an element.
    pub fn namespace_uri(&self, id: NodeId) -> Option<&str> {
        self.name(id)
            .and_then(|name| name.ns)
            .map(|ns| self.namespaces[ns as usize].as_str())
    }

    /// Check whether `id` is the element `{ns_uri}local`.
    ///
    /// An empty `ns_uri` matches elements in no namespace.
    pub fn is_element(&self, id: NodeId, ns_uri: &str, local: &str) -> bool {
        match self.kind(id) {
            NodeKind::Element { name, .. } => {
                name.local() == local
                    && match name.ns {
                        Some(ns) => self.namespaces[ns as usize] == ns_uri,
                        None => ns_uri.is_empty(),
                    }
            },
            _ => false,
        }
    }

    /// Iterate over the child elements named `{ns_uri}local`.
    pub fn child_elements<'a>(
        &'a self,
        id: NodeId,
        ns_uri: &'a str,
        local: &'a str,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.children(id)
            .iter()
            .copied()
            .filter(move |&child| self.is_element(child, ns_uri, local))
    }

    /// The first child element named `{ns_uri}local`.
    pub fn first_child_element(&self, id: NodeId, ns_uri: &str, local: &str) -> Option<NodeId> {
        self.child_elements(id, ns_uri, local).next()
    }

    /// The attributes of an element; empty for other nodes.
    pub fn attributes(&self, id: NodeId) -> &[Attribute] {
        match self.kind(id) {
            NodeKind::Element { attributes, .. } => attributes,
            _ => &[],
        }
    }

    /// The unescaped value of attribute `{ns_uri}local`.
    ///
    /// `None` for `ns_uri` selects an unprefixed attribute.
    pub fn attribute(&self, id: NodeId, ns_uri: Option<&str>, local: &str) -> Option<Cow<'_, str>> {
        self.attributes(id)
            .iter()
            .find(|attr| self.attribute_matches(attr, ns_uri, local))
            .map(Attribute::value)
    }

    fn attribute_matches(&self, attr: &Attribute, ns_uri: Option<&str>, local: &str) -> bool {
        if attr.name.local() != local || attr.is_declaration() {
            return false;
        }
        match (attr.name.ns, ns_uri) {
            (Some(ns), Some(uri)) => self.namespaces[ns as usize] == uri,
            (None, None) => true,
            _ => false,
        }
    }

    /// Set attribute `{binding.uri}local` (or an unprefixed one) to `value`.
    ///
    /// The value is escaped. An existing attribute keeps its position.
    pub fn set_attribute(
        &mut self,
        id: NodeId,
        binding: Option<&NamespaceBinding>,
        local: &str,
        value: &str,
    ) {
        let name = match binding {
            Some(binding) => self.qualified_name(binding, local, true),
            None => Name::new(local.to_string(), None),
        };
        let ns_uri = name.ns.map(|ns| self.namespaces[ns as usize].clone());
        let escaped = escape(value).into_owned();

        let position = self
            .attributes(id)
            .iter()
            .position(|attr| self.attribute_matches(attr, ns_uri.as_deref(), local));

        if let NodeKind::Element { attributes, .. } = &mut self.nodes[id.index()].kind {
            match position {
                Some(i) => attributes[i].value = escaped,
                None => attributes.push(Attribute::new(name, escaped)),
            }
        }
    }

    /// Remove attribute `{ns_uri}local`. Returns whether one was removed.
    pub fn remove_attribute(&mut self, id: NodeId, ns_uri: Option<&str>, local: &str) -> bool {
        let position = self
            .attributes(id)
            .iter()
            .position(|attr| self.attribute_matches(attr, ns_uri, local));

        match (position, &mut self.nodes[id.index()].kind) {
            (Some(i), NodeKind::Element { attributes, .. }) => {
                attributes.remove(i);
                true
            },
            _ => false,
        }
    }

    /// Create a detached element `{binding.uri}local`.
    ///
    /// The prefix the root element binds to `binding.uri` is reused; if the root
    /// has none, `binding.prefix` is declared on the root.
    pub fn create_element(&mut self, binding: &NamespaceBinding, local: &str) -> NodeId {
        let name = self.qualified_name(binding, local, false);
        self.push_node(NodeKind::Element {
            name,
            attributes: SmallVec::new(),
        })
    }

    /// Create a detached text node holding `value`, escaped for character data.
    pub fn create_text(&mut self, value: &str) -> NodeId {
        self.push_node(NodeKind::Text(partial_escape(value).into_owned()))
    }

    pub(super) fn push_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Extend a text node in place. Returns `false` for other node kinds.
    pub(super) fn append_text(&mut self, id: NodeId, text: &str) -> bool {
        match &mut self.nodes[id.index()].kind {
            NodeKind::Text(existing) => {
                existing.push_str(text);
                true
            },
            _ => false,
        }
    }

    pub(super) fn intern_namespace(&mut self, uri: &str) -> u16 {
        match self.namespaces.iter().position(|known| known == uri) {
            Some(i) => i as u16,
            None => {
                self.namespaces.push(uri.to_string());
                (self.namespaces.len() - 1) as u16
            },
        }
    }

    /// Build the name for `{binding.uri}local`, declaring a prefix if needed.
    fn qualified_name(&mut self, binding: &NamespaceBinding, local: &str, attribute: bool) -> Name {
        let prefix = if binding.uri == namespace::XML {
            "xml".to_string()
        } else {
            match self.declared_prefix(&binding.uri, !attribute) {
                Some(prefix) => prefix.to_string(),
                None => self.declare_namespace(binding),
            }
        };

        let ns = self.intern_namespace(&binding.uri);
        let raw = if prefix.is_empty() {
            local.to_string()
        } else {
            format!("{}:{}", prefix, local)
        };
        Name::new(raw, Some(ns))
    }

    /// The prefix the root element binds to `uri`.
    ///
    /// With `allow_default`, a default namespace declaration yields `""`.
    pub fn declared_prefix(&self, uri: &str, allow_default: bool) -> Option<&str> {
        let root = self.root()?;
        self.attributes(root).iter().find_map(|attr| {
            if !attr.is_declaration() || attr.value() != uri {
                return None;
            }
            match attr.name.prefix() {
                Some(_) => Some(attr.name.local()),
                None if allow_default => Some(""),
                None => None,
            }
        })
    }

    /// Declare `binding` on the root element and return the prefix used.
    fn declare_namespace(&mut self, binding: &NamespaceBinding) -> String {
        let Some(root) = self.root() else {
            return binding.prefix.clone();
        };

        let taken = |tree: &Self, prefix: &str| {
            tree.attributes(root)
                .iter()
                .any(|attr| attr.is_declaration() && attr.name.local() == prefix)
        };
        let mut prefix = binding.prefix.clone();
        let mut suffix = 1u32;
        while taken(self, &prefix) {
            prefix = format!("{}{}", binding.prefix, suffix);
            suffix += 1;
        }

        let name = Name::new(format!("xmlns:{}", prefix), Some(XMLNS_NS));
        let value = escape(binding.uri.as_str()).into_owned();
        if let NodeKind::Element { attributes, .. } = &mut self.nodes[root.index()].kind {
            attributes.push(Attribute::new(name, value));
        }
        prefix
    }

    /// Drop declarations on `id` that repeat a binding the root already makes.
    pub fn remove_redundant_declarations(&mut self, id: NodeId) {
        let Some(root) = self.root() else {
            return;
        };
        if root == id {
            return;
        }

        let root_declarations: Vec<(String, String)> = self
            .attributes(root)
            .iter()
            .filter(|attr| attr.is_declaration())
            .map(|attr| (attr.name.raw.clone(), attr.value.clone()))
            .collect();

        if let NodeKind::Element { attributes, .. } = &mut self.nodes[id.index()].kind {
            attributes.retain(|attr| {
                !(attr.is_declaration()
                    && root_declarations
                        .iter()
                        .any(|(raw, value)| *raw == attr.name.raw && *value == attr.value))
            });
        }
    }

    /// Append `child` as the last child of `parent`, detaching it first.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[parent.index()].children.push(child);
        self.nodes[child.index()].parent = Some(parent);
    }

    /// Insert `child` at `index` among the children of `parent`, detaching it first.
    ///
    /// An index past the end appends.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        let children = &mut self.nodes[parent.index()].children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.nodes[child.index()].parent = Some(parent);
    }

    /// Unlink a node from its parent. The subtree stays intact.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.index()].parent.take() {
            self.nodes[parent.index()].children.retain(|&c| c != id);
        }
    }

    /// Position of a node among its parent's children.
    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&c| c == id)
    }

    /// Copy the subtree rooted at `id`. The copy is detached.
    pub fn deep_clone(&mut self, id: NodeId) -> NodeId {
        let copy = self.push_node(self.kind(id).clone());
        let children = self.children(id).to_vec();
        for child in children {
            let child_copy = self.deep_clone(child);
            self.append_child(copy, child_copy);
        }
        copy
    }

    /// Copy the subtree rooted at `id` of another tree into this one.
    ///
    /// Namespaces are re-interned; the copy is detached.
    pub fn import(&mut self, other: &XmlTree, id: NodeId) -> NodeId {
        let kind = match other.kind(id) {
            NodeKind::Element { name, attributes } => NodeKind::Element {
                name: self.import_name(other, name),
                attributes: attributes
                    .iter()
                    .map(|attr| Attribute::new(self.import_name(other, &attr.name), attr.value.clone()))
                    .collect(),
            },
            other_kind => other_kind.clone(),
        };

        let copy = self.push_node(kind);
        for &child in other.children(id) {
            let child_copy = self.import(other, child);
            self.append_child(copy, child_copy);
        }
        copy
    }

    fn import_name(&mut self, other: &XmlTree, name: &Name) -> Name {
        let ns = name
            .ns
            .map(|ns| self.intern_namespace(&other.namespaces[ns as usize]));
        Name::new(name.raw.clone(), ns)
    }

    /// Iterate over the ancestors of a node, nearest first. The document node is included.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.parent(id),
        }
    }

    /// Iterate over a subtree in document order, starting with `id` itself.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            tree: self,
            stack: vec![id],
        }
    }

    /// Concatenated, unescaped character data of a subtree.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut text = String::new();
        for node in self.descendants(id) {
            match self.kind(node) {
                NodeKind::Text(raw) => {
                    text.push_str(&unescape(raw).unwrap_or(Cow::Borrowed(raw.as_str())))
                },
                NodeKind::CData(raw) => text.push_str(raw),
                _ => {},
            }
        }
        text
    }
}

/// Iterator over the ancestors of a node.
pub struct Ancestors<'a> {
    tree: &'a XmlTree,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.parent(current);
        Some(current)
    }
}

/// Pre-order iterator over a subtree.
pub struct Descendants<'a> {
    tree: &'a XmlTree,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.stack.pop()?;
        self.stack
            .extend(self.tree.children(current).iter().rev().copied());
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::opc::constants::namespace::WML_MAIN;

    const BODY: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t xml:space="preserve">Tom &amp; Jerry </w:t></w:r></w:p><w:p/></w:body></w:document>"#;

    fn wml() -> NamespaceBinding {
        NamespaceBinding::new("w", WML_MAIN)
    }

    fn body(tree: &XmlTree) -> NodeId {
        let root = tree.root().unwrap();
        tree.first_child_element(root, WML_MAIN, "body").unwrap()
    }

    #[test]
    fn test_namespace_matching() {
        let tree = XmlTree::parse(BODY.as_bytes()).unwrap();
        let root = tree.root().unwrap();
        assert!(tree.is_element(root, WML_MAIN, "document"));
        assert!(!tree.is_element(root, "", "document"));
        assert_eq!(tree.namespace_uri(root), Some(WML_MAIN));
        assert_eq!(tree.child_elements(body(&tree), WML_MAIN, "p").count(), 2);
    }

    #[test]
    fn test_text_content_unescapes() {
        let tree = XmlTree::parse(BODY.as_bytes()).unwrap();
        assert_eq!(tree.text_content(tree.document()), "Tom & Jerry ");
    }

    #[test]
    fn test_xml_space_attribute() {
        let tree = XmlTree::parse(BODY.as_bytes()).unwrap();
        let t = tree
            .descendants(tree.document())
            .find(|&id| tree.is_element(id, WML_MAIN, "t"))
            .unwrap();
        assert_eq!(
            tree.attribute(t, Some(namespace::XML), "space").as_deref(),
            Some("preserve")
        );
    }

    #[test]
    fn test_create_element_reuses_root_prefix() {
        let mut tree = XmlTree::parse(BODY.as_bytes()).unwrap();
        let p = tree.create_element(&NamespaceBinding::new("word", WML_MAIN), "p");
        assert_eq!(tree.name(p).unwrap().raw(), "w:p");
        assert!(tree.is_element(p, WML_MAIN, "p"));
    }

    #[test]
    fn test_create_element_declares_missing_namespace() {
        let mut tree = XmlTree::parse(BODY.as_bytes()).unwrap();
        let binding = NamespaceBinding::new("w", "urn:example:other");
        let el = tree.create_element(&binding, "thing");
        // "w" is taken by WordprocessingML, so a numbered prefix is declared
        assert_eq!(tree.name(el).unwrap().raw(), "w1:thing");
        assert_eq!(tree.declared_prefix("urn:example:other", false), Some("w1"));
    }

    #[test]
    fn test_insert_detach_and_index() {
        let mut tree = XmlTree::parse(BODY.as_bytes()).unwrap();
        let body = body(&tree);
        let first = tree.children(body)[0];
        let copy = tree.deep_clone(first);
        assert_eq!(tree.parent(copy), None);

        tree.insert_child(body, 1, copy);
        assert_eq!(tree.index_in_parent(copy), Some(1));
        assert_eq!(tree.children(body).len(), 3);
        assert_eq!(tree.text_content(body), "Tom & Jerry Tom & Jerry ");

        tree.detach(first);
        assert_eq!(tree.index_in_parent(copy), Some(0));
        assert_eq!(tree.parent(first), None);
    }

    #[test]
    fn test_deep_clone_is_independent() {
        let mut tree = XmlTree::parse(BODY.as_bytes()).unwrap();
        let body = body(&tree);
        let first = tree.children(body)[0];
        let copy = tree.deep_clone(first);

        let text = tree.create_text("more");
        let run = tree.children(copy)[0];
        tree.append_child(run, text);

        assert_eq!(tree.text_content(first), "Tom & Jerry ");
        assert_eq!(tree.text_content(copy), "Tom & Jerry more");
    }

    #[test]
    fn test_set_and_remove_attribute() {
        let mut tree = XmlTree::parse(BODY.as_bytes()).unwrap();
        let p = tree.children(body(&tree))[1];
        tree.set_attribute(p, Some(&wml()), "rsidR", "00A1 \"x\"");
        assert_eq!(
            tree.attribute(p, Some(WML_MAIN), "rsidR").as_deref(),
            Some("00A1 \"x\"")
        );
        tree.set_attribute(p, Some(&wml()), "rsidR", "00B2");
        assert_eq!(tree.attributes(p).len(), 1);
        assert!(tree.remove_attribute(p, Some(WML_MAIN), "rsidR"));
        assert!(tree.attributes(p).is_empty());
    }

    #[test]
    fn test_ancestors_and_descendants_order() {
        let tree = XmlTree::parse(BODY.as_bytes()).unwrap();
        let locals: Vec<&str> = tree
            .descendants(tree.root().unwrap())
            .filter_map(|id| tree.name(id).map(Name::local))
            .collect();
        assert_eq!(locals, ["document", "body", "p", "r", "t", "p"]);

        let t = tree
            .descendants(tree.document())
            .find(|&id| tree.is_element(id, WML_MAIN, "t"))
            .unwrap();
        let up: Vec<&str> = tree
            .ancestors(t)
            .filter_map(|id| tree.name(id).map(Name::local))
            .collect();
        assert_eq!(up, ["r", "p", "body", "document"]);
    }

    #[test]
    fn test_import_from_other_tree() {
        let mut tree = XmlTree::parse(BODY.as_bytes()).unwrap();
        let fragment = XmlTree::parse(
            br#"<w:r xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:t>x</w:t></w:r>"#,
        )
        .unwrap();
        let imported = tree.import(&fragment, fragment.root().unwrap());
        let p = tree.children(body(&tree))[1];
        tree.append_child(p, imported);
        tree.remove_redundant_declarations(imported);

        assert!(tree.is_element(imported, WML_MAIN, "r"));
        assert!(tree.attributes(imported).is_empty());
        assert_eq!(tree.text_content(p), "x");
    }
}
