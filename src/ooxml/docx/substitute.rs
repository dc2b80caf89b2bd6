//! Scalar substitution: replacing a placeholder's content with a value.
//!
//! The control's own formatting survives: the first run of its content is
//! reused (so its `w:rPr` stays), only text and drawings are replaced. Other
//! sample runs left holding nothing but properties are dropped.
use tracing::trace;

use crate::ooxml::docx::content_control::ContentControlIndex;
use crate::ooxml::docx::context::PartContext;
use crate::ooxml::docx::image::{self, ImageFormat, InlinePicture};
use crate::ooxml::docx::record::{FieldRecord, FieldValue, ImagePayload};
use crate::ooxml::error::{OoxmlError, Result};
use crate::ooxml::opc::constants::namespace;
use crate::ooxml::xml::{NamespaceBinding, NodeId, XmlTree};

/// Style Word applies to placeholder text.
const PLACEHOLDER_STYLE: &str = "PlaceholderText";

/// Containers that end the search for an enclosing paragraph.
const BLOCK_BOUNDARIES: &[&str] = &[
    "body",
    "hdr",
    "ftr",
    "tc",
    "tr",
    "tbl",
    "txbxContent",
    "footnote",
    "endnote",
    "comment",
];

/// The paragraph an inline control sits in, if it is inline.
pub(crate) fn enclosing_paragraph(tree: &XmlTree, node: NodeId, w: &str) -> Option<NodeId> {
    for ancestor in tree.ancestors(node) {
        if tree.is_element(ancestor, w, "p") {
            return Some(ancestor);
        }
        if BLOCK_BOUNDARIES
            .iter()
            .any(|local| tree.is_element(ancestor, w, local))
        {
            return None;
        }
    }
    None
}

/// Fill every leaf placeholder under `scope` whose alias or tag is a key of `record`.
///
/// Returns the number of placeholders filled.
pub(crate) fn apply_record(ctx: &mut PartContext<'_>, scope: NodeId, record: &FieldRecord) -> Result<usize> {
    if record.is_empty() {
        return Ok(0);
    }

    let index = ContentControlIndex::scan_subtree(&ctx.tree, scope, &ctx.options.namespaces);
    let mut filled = 0;
    for placeholder in index.leaves() {
        let matched = placeholder
            .alias()
            .and_then(|alias| record.get(alias).map(|value| (alias, value)))
            .or_else(|| {
                placeholder
                    .tag()
                    .and_then(|tag| record.get(tag).map(|value| (tag, value)))
            });
        let Some((key, value)) = matched else {
            continue;
        };

        trace!(part = ctx.part, key, "filling placeholder");
        match value {
            FieldValue::Text(text) => fill_text(ctx, placeholder.node(), text),
            FieldValue::Image(image) => fill_image(ctx, placeholder.node(), image)?,
        }
        ctx.filled.insert(placeholder.node());
        ctx.used_keys.insert(key.to_string());
        filled += 1;
    }

    if filled > 0 {
        ctx.modified = true;
    }
    Ok(filled)
}

/// Replace the text of the control `sdt` with `value`.
pub(crate) fn fill_text(ctx: &mut PartContext<'_>, sdt: NodeId, value: &str) {
    let w = ctx.options.namespaces.wordprocessing.clone();
    let content = sdt_content(&mut ctx.tree, sdt, &w);

    let emptied = remove_elements(&mut ctx.tree, content, &w.uri, &["t"]);
    let run = target_run(&mut ctx.tree, sdt, content, &w);
    prune_runs(&mut ctx.tree, &emptied, run, &w.uri);

    let t = ctx.tree.create_element(&w, "t");
    if value.starts_with(char::is_whitespace) || value.ends_with(char::is_whitespace) {
        let xml = NamespaceBinding::new("xml", namespace::XML);
        ctx.tree.set_attribute(t, Some(&xml), "space", "preserve");
    }
    let text = ctx.tree.create_text(value);
    ctx.tree.append_child(t, text);
    ctx.tree.append_child(run, t);

    clear_placeholder_state(&mut ctx.tree, sdt, run, &w.uri);
}

/// Replace the content of the control `sdt` with an inline picture.
pub(crate) fn fill_image(ctx: &mut PartContext<'_>, sdt: NodeId, payload: &ImagePayload) -> Result<()> {
    let format = ImageFormat::detect_from_bytes(&payload.data).ok_or_else(|| {
        OoxmlError::InvalidImage(format!(
            "unrecognized image data for placeholder in {}",
            ctx.part
        ))
    })?;
    let r_id = ctx.embedder.embed(ctx.part, payload)?;
    let (cx, cy) = image::extent_emu(payload, format);
    let picture = InlinePicture {
        r_id: &r_id,
        doc_pr_id: ctx.ids.next_doc_pr(),
        cx,
        cy,
        description: payload.description.as_deref().unwrap_or_default(),
    };

    let options = ctx.options;
    let ns = &options.namespaces;
    let fragment = XmlTree::parse(picture.to_xml(ns).as_bytes())
        .map_err(|e| OoxmlError::InvalidImage(e.to_string()))?;
    let Some(fragment_root) = fragment.root() else {
        return Err(OoxmlError::InvalidImage("empty drawing fragment".to_string()));
    };

    let w = ns.wordprocessing.clone();
    let content = sdt_content(&mut ctx.tree, sdt, &w);
    let emptied = remove_elements(&mut ctx.tree, content, &w.uri, &["t", "drawing", "pict"]);
    let run = target_run(&mut ctx.tree, sdt, content, &w);
    prune_runs(&mut ctx.tree, &emptied, run, &w.uri);

    let drawing = ctx.tree.import(&fragment, fragment_root);
    ctx.tree.append_child(run, drawing);
    ctx.tree.remove_redundant_declarations(drawing);

    clear_placeholder_state(&mut ctx.tree, sdt, run, &w.uri);
    Ok(())
}

/// The `w:sdtContent` of a control, created when missing.
fn sdt_content(tree: &mut XmlTree, sdt: NodeId, w: &NamespaceBinding) -> NodeId {
    match tree.first_child_element(sdt, &w.uri, "sdtContent") {
        Some(content) => content,
        None => {
            let content = tree.create_element(w, "sdtContent");
            tree.append_child(sdt, content);
            content
        },
    }
}

/// Detach every element under `scope` with one of the given local names.
///
/// Returns the runs that lost a child, in document order.
fn remove_elements(tree: &mut XmlTree, scope: NodeId, w: &str, locals: &[&str]) -> Vec<NodeId> {
    let doomed: Vec<NodeId> = tree
        .descendants(scope)
        .filter(|&id| locals.iter().any(|local| tree.is_element(id, w, local)))
        .collect();
    let mut runs = Vec::new();
    for id in doomed {
        let run = tree.parent(id).filter(|&parent| tree.is_element(parent, w, "r"));
        if let Some(run) = run {
            if !runs.contains(&run) {
                runs.push(run);
            }
        }
        tree.detach(id);
    }
    runs
}

/// Detach the runs in `runs` other than `keep` that hold nothing but `w:rPr`.
fn prune_runs(tree: &mut XmlTree, runs: &[NodeId], keep: NodeId, w: &str) {
    for &run in runs {
        if run != keep && tree.children(run).iter().all(|&child| tree.is_element(child, w, "rPr")) {
            tree.detach(run);
        }
    }
}

/// The run that receives the new value: the first existing one, else a new one.
fn target_run(tree: &mut XmlTree, sdt: NodeId, content: NodeId, w: &NamespaceBinding) -> NodeId {
    let existing = tree
        .descendants(content)
        .find(|&id| tree.is_element(id, &w.uri, "r"));
    if let Some(run) = existing {
        return run;
    }

    let run = tree.create_element(w, "r");
    if enclosing_paragraph(tree, sdt, &w.uri).is_some() {
        tree.append_child(content, run);
        return run;
    }

    let existing = tree
        .descendants(content)
        .find(|&id| tree.is_element(id, &w.uri, "p"));
    let paragraph = match existing {
        Some(paragraph) => paragraph,
        None => {
            let paragraph = tree.create_element(w, "p");
            tree.append_child(content, paragraph);
            paragraph
        },
    };
    tree.append_child(paragraph, run);
    run
}

/// Drop `w:showingPlcHdr` and the placeholder character style of the filled run.
fn clear_placeholder_state(tree: &mut XmlTree, sdt: NodeId, run: NodeId, w: &str) {
    let Some(properties) = tree.first_child_element(sdt, w, "sdtPr") else {
        return;
    };
    let Some(flag) = tree.first_child_element(properties, w, "showingPlcHdr") else {
        return;
    };
    tree.detach(flag);

    let style = tree
        .first_child_element(run, w, "rPr")
        .and_then(|rpr| tree.first_child_element(rpr, w, "rStyle"))
        .filter(|&style| tree.attribute(style, Some(w), "val").as_deref() == Some(PLACEHOLDER_STYLE));
    if let Some(style) = style {
        tree.detach(style);
    }
}
