//! Repeating-block expansion.
//!
//! A repeating key names an *anchor*: the first placeholder answering to it.
//! The anchor's structural unit is repeated once per record:
//!
//! ```text
//! before                     records = [r0, r1, r2]
//! ┌──────────────────┐       ┌──────────────────┐
//! │ header row       │       │ header row       │
//! │ unit (anchor)    │  ──▶  │ unit  ← r0       │
//! │ footer row       │       │ clone ← r1       │
//! └──────────────────┘       │ clone ← r2       │
//!                            │ footer row       │
//!                            └──────────────────┘
//! ```
//!
//! Clones are taken from a detached copy of the unit made before record 0 is
//! filled in place, so no record's values leak into the next one. An empty
//! sequence removes the unit.
use tracing::debug;

use crate::ooxml::docx::content_control::ContentControlIndex;
use crate::ooxml::docx::context::PartContext;
use crate::ooxml::docx::record::FieldRecord;
use crate::ooxml::docx::substitute::{apply_record, enclosing_paragraph};
use crate::ooxml::error::{OoxmlError, Result};
use crate::ooxml::xml::{NodeId, XmlTree};

/// Containers a table-row search never leaves.
const ROW_SEARCH_BOUNDARIES: &[&str] = &["body", "hdr", "ftr", "txbxContent", "footnote", "endnote", "comment"];

/// The node repeated for each record of the anchor `sdt`.
///
/// The nearest enclosing table row; otherwise the enclosing paragraph for an
/// inline control; otherwise the control itself.
pub fn structural_unit(tree: &XmlTree, sdt: NodeId, w: &str) -> NodeId {
    for ancestor in tree.ancestors(sdt) {
        if tree.is_element(ancestor, w, "tr") {
            return ancestor;
        }
        if ROW_SEARCH_BOUNDARIES
            .iter()
            .any(|local| tree.is_element(ancestor, w, local))
        {
            break;
        }
    }
    enclosing_paragraph(tree, sdt, w).unwrap_or(sdt)
}

/// Expand the unit of the anchor for `key` once per record.
///
/// Returns the number of units left in the tree, or `None` when no
/// placeholder in this part answers to `key`.
pub(crate) fn expand(ctx: &mut PartContext<'_>, key: &str, records: &[FieldRecord]) -> Result<Option<usize>> {
    let w = ctx.options.namespaces.w().to_string();
    let index = ContentControlIndex::scan(&ctx.tree, &ctx.options.namespaces);
    let Some(anchor) = index.find(key) else {
        return Ok(None);
    };

    let unit = structural_unit(&ctx.tree, anchor.node(), &w);
    let parent = ctx
        .tree
        .parent(unit)
        .filter(|&parent| parent != ctx.tree.document())
        .ok_or_else(|| OoxmlError::StructuralIntegrity {
            part: ctx.part.to_string(),
            message: format!("unit of repeating key '{}' is the document root", key),
        })?;
    let position = ctx.tree.index_in_parent(unit).unwrap_or_default();

    debug!(
        part = ctx.part,
        key,
        unit = ctx.tree.name(unit).map(|n| n.raw()).unwrap_or_default(),
        records = records.len(),
        "expanding repeating block"
    );
    ctx.modified = true;

    let Some((first, rest)) = records.split_first() else {
        ctx.tree.detach(unit);
        return Ok(Some(0));
    };

    let template = ctx.tree.deep_clone(unit);
    carry_filled(ctx, unit, template);
    apply_record(ctx, unit, first)?;

    let mut insert_index = position + 1;
    for record in rest {
        let clone = ctx.tree.deep_clone(template);
        carry_filled(ctx, template, clone);
        ctx.ids.renumber(&mut ctx.tree, clone, &ctx.options.namespaces);
        ctx.tree.insert_child(parent, insert_index, clone);
        insert_index += 1;
        apply_record(ctx, clone, record)?;
    }

    Ok(Some(records.len()))
}

/// Mark the nodes of `copy` filled wherever their counterpart in `source` is.
///
/// `copy` must be a fresh deep clone of `source`, so both subtrees walk in
/// the same pre-order.
fn carry_filled(ctx: &mut PartContext<'_>, source: NodeId, copy: NodeId) {
    let carried: Vec<NodeId> = ctx
        .tree
        .descendants(source)
        .zip(ctx.tree.descendants(copy))
        .filter(|(original, _)| ctx.filled.contains(original))
        .map(|(_, cloned)| cloned)
        .collect();
    ctx.filled.extend(carried);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::docx::media::NoMedia;
    use crate::ooxml::docx::options::RenderOptions;

    const W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

    const HISTORY: &str = r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:tbl><w:tr><w:tc><w:p><w:r><w:t>Version</w:t></w:r></w:p></w:tc></w:tr><w:tr><w:tc><w:sdt><w:sdtPr><w:alias w:val="h.version"/><w:id w:val="1"/></w:sdtPr><w:sdtContent><w:p><w:r><w:t>v</w:t></w:r></w:p></w:sdtContent></w:sdt></w:tc><w:tc><w:sdt><w:sdtPr><w:alias w:val="h.estado"/><w:id w:val="2"/></w:sdtPr><w:sdtContent><w:p><w:r><w:t>e</w:t></w:r></w:p></w:sdtContent></w:sdt></w:tc></w:tr><w:tr><w:tc><w:p><w:r><w:t>End</w:t></w:r></w:p></w:tc></w:tr></w:tbl><w:p><w:r><w:t>Evidence:</w:t></w:r><w:sdt><w:sdtPr><w:alias w:val="photo"/></w:sdtPr><w:sdtContent><w:r><w:t>caption</w:t></w:r></w:sdtContent></w:sdt></w:p><w:sdt><w:sdtPr><w:tag w:val="note"/></w:sdtPr><w:sdtContent><w:p><w:r><w:t>n</w:t></w:r></w:p></w:sdtContent></w:sdt></w:body></w:document>"#;

    fn render(key: &str, records: &[FieldRecord]) -> (XmlTree, Option<usize>) {
        let options = RenderOptions::default();
        let mut media = NoMedia;
        let tree = XmlTree::parse(HISTORY.as_bytes()).unwrap();
        let mut ctx = PartContext::new("word/document.xml", tree, &options, &mut media);
        let count = expand(&mut ctx, key, records).unwrap();
        (ctx.tree, count)
    }

    fn rows(tree: &XmlTree) -> Vec<String> {
        tree.descendants(tree.document())
            .filter(|&id| tree.is_element(id, W, "tr"))
            .map(|row| tree.text_content(row))
            .collect()
    }

    fn versions(n: usize) -> Vec<FieldRecord> {
        (0..n)
            .map(|i| FieldRecord::from([("h.version", format!("V0{}", i)), ("h.estado", format!("S{}", i))]))
            .collect()
    }

    #[test]
    fn test_unit_selection() {
        let tree = XmlTree::parse(HISTORY.as_bytes()).unwrap();
        let index = ContentControlIndex::scan(&tree, &RenderOptions::default().namespaces);

        let version = index.find("h.version").unwrap().node();
        assert!(tree.is_element(structural_unit(&tree, version, W), W, "tr"));

        let photo = index.find("photo").unwrap().node();
        assert!(tree.is_element(structural_unit(&tree, photo, W), W, "p"));

        let note = index.find("note").unwrap().node();
        assert_eq!(structural_unit(&tree, note, W), note);
    }

    #[test]
    fn test_rows_follow_sequence_order() {
        let (tree, count) = render("h.version", &versions(3));
        assert_eq!(count, Some(3));
        assert_eq!(rows(&tree), ["Version", "V00S0", "V01S1", "V02S2", "End"]);
    }

    #[test]
    fn test_empty_sequence_removes_unit() {
        let (tree, count) = render("h.version", &[]);
        assert_eq!(count, Some(0));
        assert_eq!(rows(&tree), ["Version", "End"]);
    }

    #[test]
    fn test_fields_outside_record_keep_template_text() {
        let records = vec![
            FieldRecord::from([("h.version", "V00")]),
            FieldRecord::from([("h.version", "V01")]),
        ];
        let (tree, _) = render("h.version", &records);
        assert_eq!(rows(&tree), ["Version", "V00e", "V01e", "End"]);
    }

    #[test]
    fn test_clones_get_fresh_ids() {
        let (tree, _) = render("h.version", &versions(2));
        let mut ids: Vec<String> = tree
            .descendants(tree.document())
            .filter(|&id| tree.is_element(id, W, "id"))
            .filter_map(|id| tree.attribute(id, Some(W), "val").map(|v| v.into_owned()))
            .collect();
        ids.sort();
        assert_eq!(ids, ["1", "2", "3", "4"]);
    }

    #[test]
    fn test_inline_and_block_units() {
        let (tree, _) = render("photo", &[FieldRecord::from([("photo", "a")]), FieldRecord::from([("photo", "b")])]);
        let body = tree.children(tree.root().unwrap())[0];
        let paragraphs: Vec<String> = tree
            .child_elements(body, W, "p")
            .map(|p| tree.text_content(p))
            .collect();
        assert_eq!(paragraphs, ["Evidence:a", "Evidence:b"]);

        let (tree, count) = render("note", &[]);
        assert_eq!(count, Some(0));
        let index = ContentControlIndex::scan(&tree, &RenderOptions::default().namespaces);
        assert!(index.find("note").is_none());
        assert!(index.find("photo").is_some());
    }

    #[test]
    fn test_scalar_fill_survives_cloning() {
        let options = RenderOptions::default();
        let mut media = NoMedia;
        let tree = XmlTree::parse(
            br#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:tbl><w:tr><w:tc><w:sdt><w:sdtPr><w:alias w:val="h.version"/></w:sdtPr><w:sdtContent><w:p><w:r><w:t>v</w:t></w:r></w:p></w:sdtContent></w:sdt></w:tc><w:tc><w:sdt><w:sdtPr><w:alias w:val="project"/></w:sdtPr><w:sdtContent><w:p><w:r><w:t>p</w:t></w:r></w:p></w:sdtContent></w:sdt></w:tc></w:tr></w:tbl></w:body></w:document>"#,
        )
        .unwrap();
        let mut ctx = PartContext::new("word/document.xml", tree, &options, &mut media);
        let document = ctx.tree.document();
        apply_record(&mut ctx, document, &FieldRecord::from([("project", "Loquat")])).unwrap();

        let records = vec![
            FieldRecord::from([("h.version", "V00")]),
            FieldRecord::from([("h.version", "V01")]),
        ];
        expand(&mut ctx, "h.version", &records).unwrap();
        assert_eq!(rows(&ctx.tree), ["V00Loquat", "V01Loquat"]);

        let index = ContentControlIndex::scan(&ctx.tree, &options.namespaces);
        let unfilled: Vec<&str> = index
            .leaves()
            .filter(|placeholder| !ctx.filled.contains(&placeholder.node()))
            .map(|placeholder| placeholder.key())
            .collect();
        assert!(unfilled.is_empty(), "{unfilled:?}");
    }

    #[test]
    fn test_unknown_key() {
        let (_, count) = render("nope", &versions(1));
        assert_eq!(count, None);
    }

    #[test]
    fn test_root_unit_is_rejected() {
        let options = RenderOptions::default();
        let mut media = NoMedia;
        let tree = XmlTree::parse(
            br#"<w:sdt xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:sdtPr><w:alias w:val="k"/></w:sdtPr></w:sdt>"#,
        )
        .unwrap();
        let mut ctx = PartContext::new("word/document.xml", tree, &options, &mut media);
        assert!(matches!(
            expand(&mut ctx, "k", &[]),
            Err(OoxmlError::StructuralIntegrity { .. })
        ));
    }
}
