//! Streaming parse of a part into an [`XmlTree`].
//!
//! quick-xml does the tokenizing; namespace scoping is tracked here so that
//! every element and attribute name is resolved to an interned URI while the
//! raw, prefixed name is kept for serialization.

use super::tree::{Attribute, Name, NodeId, NodeKind, XML_NS, XMLNS_NS, XmlTree};
use super::{Result, XmlError};
use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use smallvec::SmallVec;

/// In-scope prefix bindings, innermost last.
struct Scopes {
    /// `(prefix, namespace)`; the empty prefix is the default namespace and a
    /// `None` namespace undeclares it
    bindings: Vec<(String, Option<u16>)>,
    /// Length of `bindings` when each open element was entered
    frames: Vec<usize>,
}

impl Scopes {
    fn new() -> Self {
        Self {
            bindings: vec![
                ("xml".to_string(), Some(XML_NS)),
                ("xmlns".to_string(), Some(XMLNS_NS)),
            ],
            frames: Vec::new(),
        }
    }

    fn enter(&mut self) {
        self.frames.push(self.bindings.len());
    }

    fn leave(&mut self) {
        if let Some(len) = self.frames.pop() {
            self.bindings.truncate(len);
        }
    }

    fn bind(&mut self, prefix: &str, ns: Option<u16>) {
        self.bindings.push((prefix.to_string(), ns));
    }

    fn lookup(&self, prefix: &str) -> Option<Option<u16>> {
        self.bindings
            .iter()
            .rev()
            .find(|(bound, _)| bound == prefix)
            .map(|&(_, ns)| ns)
    }

    fn resolve_element(&self, name: &Name) -> Result<Option<u16>> {
        match name.prefix() {
            Some(prefix) => match self.lookup(prefix) {
                Some(Some(ns)) => Ok(Some(ns)),
                _ => Err(XmlError::UndeclaredPrefix(prefix.to_string())),
            },
            None => Ok(self.lookup("").flatten()),
        }
    }

    fn resolve_attribute(&self, raw: &str) -> Result<Option<u16>> {
        if raw == "xmlns" {
            return Ok(Some(XMLNS_NS));
        }
        match raw.split_once(':') {
            Some((prefix, _)) => match self.lookup(prefix) {
                Some(Some(ns)) => Ok(Some(ns)),
                _ => Err(XmlError::UndeclaredPrefix(prefix.to_string())),
            },
            None => Ok(None),
        }
    }
}

#[inline]
fn utf8(bytes: &[u8], position: u64) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|_| XmlError::Utf8(position))
}

pub(super) fn parse(bytes: &[u8]) -> Result<XmlTree> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(false);

    let mut tree = XmlTree::empty();
    let mut scopes = Scopes::new();
    let mut stack: Vec<NodeId> = vec![tree.document()];

    loop {
        let position = reader.buffer_position() as u64;
        let event = reader.read_event().map_err(|e| XmlError::Syntax {
            position: reader.error_position() as u64,
            message: e.to_string(),
        })?;
        let parent = stack.last().copied().unwrap_or(tree.document());

        match event {
            Event::Start(e) => {
                let id = open_element(&mut tree, &mut scopes, &e, position)?;
                attach_element(&mut tree, parent, id)?;
                stack.push(id);
            },
            Event::Empty(e) => {
                let id = open_element(&mut tree, &mut scopes, &e, position)?;
                scopes.leave();
                attach_element(&mut tree, parent, id)?;
            },
            Event::End(_) => {
                if stack.len() <= 1 {
                    return Err(XmlError::Structure(format!(
                        "unexpected end tag at byte {}",
                        position
                    )));
                }
                stack.pop();
                scopes.leave();
            },
            Event::Text(e) => push_text(&mut tree, parent, utf8(&e, position)?, position)?,
            Event::GeneralRef(e) => {
                let entity = format!("&{};", utf8(&e, position)?);
                push_text(&mut tree, parent, &entity, position)?;
            },
            Event::CData(e) => {
                let kind = NodeKind::CData(utf8(&e, position)?.to_string());
                push_leaf(&mut tree, parent, kind, position)?;
            },
            Event::Comment(e) => {
                let id = tree.push_node(NodeKind::Comment(utf8(&e, position)?.to_string()));
                tree.append_child(parent, id);
            },
            Event::PI(e) => {
                let kind = NodeKind::ProcessingInstruction(utf8(&e, position)?.to_string());
                let id = tree.push_node(kind);
                tree.append_child(parent, id);
            },
            Event::Eof => break,
            // The declaration is regenerated on write; DTDs are not supported
            _ => {},
        }
    }

    if stack.len() > 1 {
        let open = stack
            .last()
            .and_then(|&id| tree.name(id))
            .map(|name| name.raw().to_string())
            .unwrap_or_default();
        return Err(XmlError::Structure(format!("unclosed element <{}>", open)));
    }
    if tree.root().is_none() {
        return Err(XmlError::Structure("no root element".to_string()));
    }

    Ok(tree)
}

fn open_element(
    tree: &mut XmlTree,
    scopes: &mut Scopes,
    start: &BytesStart<'_>,
    position: u64,
) -> Result<NodeId> {
    scopes.enter();

    let mut raw_attributes: SmallVec<[(String, String); 4]> = SmallVec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| XmlError::Syntax {
            position,
            message: e.to_string(),
        })?;
        let key = utf8(attr.key.as_ref(), position)?.to_string();
        let value = utf8(&attr.value, position)?.to_string();

        let declared = if key == "xmlns" {
            Some("")
        } else {
            key.strip_prefix("xmlns:")
        };
        if let Some(prefix) = declared {
            let uri = unescape(&value).map_err(|e| XmlError::Syntax {
                position,
                message: e.to_string(),
            })?;
            let ns = (!uri.is_empty()).then(|| tree.intern_namespace(&uri));
            scopes.bind(prefix, ns);
        }
        raw_attributes.push((key, value));
    }

    let raw_name = utf8(start.name().as_ref(), position)?.to_string();
    let mut name = Name::new(raw_name, None);
    let ns = scopes.resolve_element(&name)?;
    name = Name::new(name.raw().to_string(), ns);

    let mut attributes = SmallVec::with_capacity(raw_attributes.len());
    for (key, value) in raw_attributes {
        let ns = scopes.resolve_attribute(&key)?;
        attributes.push(Attribute::new(Name::new(key, ns), value));
    }

    Ok(tree.push_node(NodeKind::Element { name, attributes }))
}

fn attach_element(tree: &mut XmlTree, parent: NodeId, id: NodeId) -> Result<()> {
    if parent == tree.document() && tree.root().is_some() {
        return Err(XmlError::Structure("multiple root elements".to_string()));
    }
    tree.append_child(parent, id);
    Ok(())
}

fn push_leaf(tree: &mut XmlTree, parent: NodeId, kind: NodeKind, position: u64) -> Result<()> {
    if parent == tree.document() {
        return Err(XmlError::Structure(format!(
            "character data outside the root element at byte {}",
            position
        )));
    }
    let id = tree.push_node(kind);
    tree.append_child(parent, id);
    Ok(())
}

/// Append character data, merging with a preceding text node.
fn push_text(tree: &mut XmlTree, parent: NodeId, text: &str, position: u64) -> Result<()> {
    if parent == tree.document() {
        if text.trim().is_empty() {
            return Ok(());
        }
        return push_leaf(tree, parent, NodeKind::Text(text.to_string()), position);
    }

    let last = tree.children(parent).last().copied();
    if last.is_some_and(|last| tree.append_text(last, text)) {
        return Ok(());
    }
    let id = tree.push_node(NodeKind::Text(text.to_string()));
    tree.append_child(parent, id);
    Ok(())
}
