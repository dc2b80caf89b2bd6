//! Serialization of an [`XmlTree`] back to part bytes.

use super::tree::{NodeId, NodeKind, XmlTree};

/// Declaration written at the head of every serialized part.
pub(super) const DECLARATION: &[u8] =
    b"<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n";

pub(super) fn serialize(tree: &XmlTree) -> Vec<u8> {
    let mut out = Vec::with_capacity(DECLARATION.len() + tree.len() * 24);
    out.extend_from_slice(DECLARATION);
    write_node(tree, tree.document(), &mut out);
    out
}

fn write_node(tree: &XmlTree, id: NodeId, out: &mut Vec<u8>) {
    match tree.kind(id) {
        NodeKind::Document => {
            for &child in tree.children(id) {
                write_node(tree, child, out);
            }
        },
        NodeKind::Element { name, attributes } => {
            out.push(b'<');
            out.extend_from_slice(name.raw().as_bytes());
            for attr in attributes {
                out.push(b' ');
                out.extend_from_slice(attr.name().raw().as_bytes());
                out.extend_from_slice(b"=\"");
                write_attribute_value(attr.raw_value().as_bytes(), out);
                out.push(b'"');
            }

            let children = tree.children(id);
            let has_content = children
                .iter()
                .any(|&c| !matches!(tree.kind(c), NodeKind::Text(raw) if raw.is_empty()));
            if !has_content {
                out.extend_from_slice(b"/>");
                return;
            }

            out.push(b'>');
            for &child in children {
                write_node(tree, child, out);
            }
            out.extend_from_slice(b"</");
            out.extend_from_slice(name.raw().as_bytes());
            out.push(b'>');
        },
        NodeKind::Text(raw) => out.extend_from_slice(raw.as_bytes()),
        NodeKind::CData(raw) => {
            out.extend_from_slice(b"<![CDATA[");
            out.extend_from_slice(raw.as_bytes());
            out.extend_from_slice(b"]]>");
        },
        NodeKind::Comment(raw) => {
            out.extend_from_slice(b"<!--");
            out.extend_from_slice(raw.as_bytes());
            out.extend_from_slice(b"-->");
        },
        NodeKind::ProcessingInstruction(raw) => {
            out.extend_from_slice(b"<?");
            out.extend_from_slice(raw.as_bytes());
            out.extend_from_slice(b"?>");
        },
    }
}

/// Values read from single-quoted attributes may hold a bare `"`.
fn write_attribute_value(value: &[u8], out: &mut Vec<u8>) {
    let mut rest = value;
    while let Some(quote) = memchr::memchr(b'"', rest) {
        out.extend_from_slice(&rest[..quote]);
        out.extend_from_slice(b"&quot;");
        rest = &rest[quote + 1..];
    }
    out.extend_from_slice(rest);
}
