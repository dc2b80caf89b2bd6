//! Identifier allocation for cloned content.
//!
//! Word expects `w:sdtPr/w:id` values to be unique within a part and drawing
//! `wp:docPr/@id` values to be unique across the whole document, headers and
//! footers included. Cloned units would otherwise duplicate them, so every
//! clone is renumbered from counters seeded past the largest id in use.
use std::collections::HashSet;

use memchr::memmem;

use crate::ooxml::docx::options::Namespaces;
use crate::ooxml::xml::{NodeId, XmlTree};

/// Hands out fresh content-control and drawing ids for one part.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    used_sdt_ids: HashSet<i64>,
    next_sdt_id: i64,
    next_doc_pr: u32,
}

impl IdAllocator {
    /// Seed the counters from the ids already present in `tree`.
    pub fn from_tree(tree: &XmlTree, ns: &Namespaces) -> Self {
        let w = ns.w();
        let wp = ns.drawing.uri.as_str();

        let mut used_sdt_ids = HashSet::new();
        let mut max_doc_pr = 0u32;
        for id in tree.descendants(tree.document()) {
            if tree.is_element(id, w, "id")
                && tree
                    .parent(id)
                    .is_some_and(|p| tree.is_element(p, w, "sdtPr"))
            {
                if let Some(value) = tree
                    .attribute(id, Some(w), "val")
                    .and_then(|v| atoi_simd::parse::<i64, false, false>(v.as_bytes()).ok())
                {
                    used_sdt_ids.insert(value);
                }
            } else if tree.is_element(id, wp, "docPr") {
                let value = tree
                    .attribute(id, None, "id")
                    .and_then(|v| atoi_simd::parse::<u32, false, false>(v.as_bytes()).ok());
                max_doc_pr = max_doc_pr.max(value.unwrap_or(0));
            }
        }

        let next_sdt_id = used_sdt_ids.iter().max().map_or(1, |max| max + 1);
        Self {
            used_sdt_ids,
            next_sdt_id,
            next_doc_pr: max_doc_pr.saturating_add(1),
        }
    }

    /// Raise the drawing counter to at least `next`.
    ///
    /// Used to carry one document-wide sequence of drawing ids across parts.
    pub fn reserve_doc_prs_below(&mut self, next: u32) {
        self.next_doc_pr = self.next_doc_pr.max(next);
    }

    /// The drawing id the next call to [`next_doc_pr`](Self::next_doc_pr) returns.
    #[inline]
    pub fn peek_doc_pr(&self) -> u32 {
        self.next_doc_pr
    }

    /// A content-control id not used anywhere in the part.
    ///
    /// Ids stay in the signed 32-bit range Word writes; the counter wraps to
    /// the negative half once the positive half is exhausted.
    pub fn next_sdt_id(&mut self) -> i64 {
        loop {
            if self.next_sdt_id > i64::from(i32::MAX) {
                self.next_sdt_id = i64::from(i32::MIN);
            }
            let candidate = self.next_sdt_id;
            self.next_sdt_id += 1;
            if self.used_sdt_ids.insert(candidate) {
                return candidate;
            }
        }
    }

    /// A drawing object id not used anywhere in the part.
    pub fn next_doc_pr(&mut self) -> u32 {
        let id = self.next_doc_pr;
        self.next_doc_pr = self.next_doc_pr.saturating_add(1);
        id
    }

    /// Give every content control and drawing under `unit` a fresh id.
    pub fn renumber(&mut self, tree: &mut XmlTree, unit: NodeId, ns: &Namespaces) {
        let w = ns.wordprocessing.clone();
        let wp = ns.drawing.uri.as_str();

        let (sdt_ids, doc_prs): (Vec<NodeId>, Vec<NodeId>) = tree
            .descendants(unit)
            .filter(|&id| {
                (tree.is_element(id, &w.uri, "id")
                    && tree
                        .parent(id)
                        .is_some_and(|p| tree.is_element(p, &w.uri, "sdtPr")))
                    || tree.is_element(id, wp, "docPr")
            })
            .partition(|&id| tree.is_element(id, &w.uri, "id"));

        let mut buf = itoa::Buffer::new();
        for id in sdt_ids {
            let value = self.next_sdt_id();
            tree.set_attribute(id, Some(&w), "val", buf.format(value));
        }
        for id in doc_prs {
            let value = self.next_doc_pr();
            tree.set_attribute(id, None, "id", buf.format(value));
        }
    }
}

/// Largest `docPr` id in raw part bytes, or 0 when there is none.
///
/// Works on the bytes so parts that are never parsed still reserve their ids.
pub fn max_doc_pr_id(part: &[u8]) -> u32 {
    memmem::find_iter(part, b"docPr")
        .filter_map(|start| {
            let tag = &part[start..];
            let tag = &tag[..memchr::memchr(b'>', tag)?];
            let value = &tag[memmem::find(tag, b" id=")? + 4..];
            let quote = *value.first()?;
            let value = value.get(1..)?;
            let digits = &value[..memchr::memchr(quote, value)?];
            atoi_simd::parse::<u32, false, false>(digits).ok()
        })
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PART: &str = r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing"><w:body>
<w:sdt><w:sdtPr><w:alias w:val="a"/><w:id w:val="-5"/></w:sdtPr><w:sdtContent><w:p><w:r><w:drawing><wp:inline><wp:docPr id="4" name="Picture 4"/></wp:inline></w:drawing></w:r></w:p></w:sdtContent></w:sdt>
<w:sdt><w:sdtPr><w:alias w:val="b"/><w:id w:val="12"/></w:sdtPr><w:sdtContent><w:p/></w:sdtContent></w:sdt>
</w:body></w:document>"#;

    #[test]
    fn test_seeded_past_existing_ids() {
        let tree = XmlTree::parse(PART.as_bytes()).unwrap();
        let mut ids = IdAllocator::from_tree(&tree, &Namespaces::default());
        assert_eq!(ids.next_sdt_id(), 13);
        assert_eq!(ids.next_sdt_id(), 14);
        assert_eq!(ids.next_doc_pr(), 5);
    }

    #[test]
    fn test_doc_pr_ids_from_bytes() {
        assert_eq!(max_doc_pr_id(PART.as_bytes()), 4);
        assert_eq!(
            max_doc_pr_id(br#"<wp:docPr name="a" id='17'/><wp:docPr id="9"></wp:docPr><pic:cNvPr id="40"/>"#),
            17
        );
        assert_eq!(max_doc_pr_id(b"<w:document/>"), 0);

        let tree = XmlTree::parse(PART.as_bytes()).unwrap();
        let mut ids = IdAllocator::from_tree(&tree, &Namespaces::default());
        ids.reserve_doc_prs_below(30);
        assert_eq!(ids.next_doc_pr(), 30);
        ids.reserve_doc_prs_below(2);
        assert_eq!(ids.peek_doc_pr(), 31);
    }

    #[test]
    fn test_wraps_into_negative_range() {
        let tree = XmlTree::parse(
            br#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:sdt><w:sdtPr><w:id w:val="2147483647"/></w:sdtPr></w:sdt><w:sdt><w:sdtPr><w:id w:val="-2147483648"/></w:sdtPr></w:sdt></w:document>"#,
        )
        .unwrap();
        let mut ids = IdAllocator::from_tree(&tree, &Namespaces::default());
        assert_eq!(ids.next_sdt_id(), -2147483647);
    }

    #[test]
    fn test_renumber_clone() {
        let ns = Namespaces::default();
        let mut tree = XmlTree::parse(PART.as_bytes()).unwrap();
        let mut ids = IdAllocator::from_tree(&tree, &ns);

        let body = tree.children(tree.root().unwrap())[0];
        let first = tree.first_child_element(body, ns.w(), "sdt").unwrap();
        let copy = tree.deep_clone(first);
        ids.renumber(&mut tree, copy, &ns);

        assert_eq!(content_ids(&tree, copy, &ns), ["13", "5"]);

        // The original keeps its ids
        assert_eq!(content_ids(&tree, first, &ns), ["-5", "4"]);
    }

    fn content_ids(tree: &XmlTree, unit: NodeId, ns: &Namespaces) -> Vec<String> {
        tree.descendants(unit)
            .filter_map(|id| {
                if tree.is_element(id, ns.w(), "id") {
                    tree.attribute(id, Some(ns.w()), "val")
                } else if tree.is_element(id, &ns.drawing.uri, "docPr") {
                    tree.attribute(id, None, "id")
                } else {
                    None
                }
            })
            .map(|v| v.into_owned())
            .collect()
    }
}
