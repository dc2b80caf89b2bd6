//! Render orchestration.
//!
//! A render opens the template package, runs scalar substitution and every
//! repeating-block expansion over each renderable part, stores the modified
//! parts back and saves the package. Parts that no placeholder touched keep
//! their original bytes, and entries that are not renderable are never parsed.
//!
//! # Example
//!
//! ```no_run
//! use std::collections::BTreeMap;
//! use loquat::{FieldRecord, Renderer, RenderOptions};
//!
//! let template = std::fs::read("template.docx")?;
//! let fields = FieldRecord::from([("project", "Loquat")]);
//! let mut sequences = BTreeMap::new();
//! sequences.insert(
//!     "h.version".to_string(),
//!     vec![
//!         FieldRecord::from([("h.version", "V00"), ("h.estado", "Draft")]),
//!         FieldRecord::from([("h.version", "V01"), ("h.estado", "Approved")]),
//!     ],
//! );
//!
//! let output = Renderer::new(RenderOptions::default()).render(&template, &fields, &sequences)?;
//! for key in &output.report.unmatched {
//!     eprintln!("no value for {}", key);
//! }
//! std::fs::write("out.docx", &output.bytes)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use memchr::memmem;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::{debug, info, trace, warn};

use crate::ooxml::docx::content_control::ContentControlIndex;
use crate::ooxml::docx::context::PartContext;
use crate::ooxml::docx::ids;
use crate::ooxml::docx::media::PackageMediaEmbedder;
use crate::ooxml::docx::options::RenderOptions;
use crate::ooxml::docx::record::{FieldRecord, RecordSequence, TemplateData};
use crate::ooxml::docx::repeat::expand;
use crate::ooxml::docx::substitute::apply_record;
use crate::ooxml::error::{OoxmlError, Result};
use crate::ooxml::opc::{OpcError, Package};
use crate::ooxml::xml::XmlTree;

/// Marker every part with at least one content control contains.
const SDT_PROPERTIES_MARKER: &[u8] = b"sdtPr";

/// Diagnostics collected during a render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderReport {
    /// Keys of leaf placeholders left unfilled, across all parts
    pub unmatched: BTreeSet<String>,
    /// Field keys that matched no placeholder
    pub unused_fields: BTreeSet<String>,
    /// Repeating keys that matched no placeholder in any part
    pub missing_anchors: BTreeSet<String>,
    /// Repeating key to the number of units it left in the document
    pub expanded: BTreeMap<String, usize>,
    /// Parts whose content was rewritten, in archive order
    pub rendered_parts: Vec<String>,
    /// Media entries added for image values
    pub media_added: usize,
}

impl RenderReport {
    /// Check whether every placeholder was filled and every input was used.
    pub fn is_clean(&self) -> bool {
        self.unmatched.is_empty() && self.unused_fields.is_empty() && self.missing_anchors.is_empty()
    }
}

/// A rendered package and what happened while producing it.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    /// ZIP bytes of the rendered package
    pub bytes: Vec<u8>,
    pub report: RenderReport,
}

/// One independent unit of work for [`Renderer::render_batch`].
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub template: Vec<u8>,
    pub data: TemplateData,
}

impl RenderJob {
    pub fn new(template: Vec<u8>, data: TemplateData) -> Self {
        Self { template, data }
    }
}

/// Template renderer bound to a set of [`RenderOptions`].
///
/// A renderer holds no per-render state; one instance can serve any number of
/// renders, including concurrent ones.
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    options: RenderOptions,
}

impl Renderer {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    #[inline]
    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Render `template` with scalar `fields` and the repeating `sequences`.
    ///
    /// Sequences are expanded in key order. Either the whole package is
    /// rendered or an error is returned; no partial output is produced.
    ///
    /// # Errors
    /// - [`OoxmlError::MalformedArchive`] if `template` is not a ZIP stream
    /// - [`OoxmlError::MalformedXml`] if a renderable part is not well-formed
    /// - [`OoxmlError::StructuralIntegrity`] if a repeating unit is the document root
    /// - [`OoxmlError::MissingAnchor`] for an unmatched repeating key, with `strict_anchors`
    /// - [`OoxmlError::InvalidImage`] if an image value cannot be embedded
    pub fn render(
        &self,
        template: &[u8],
        fields: &FieldRecord,
        sequences: &BTreeMap<String, RecordSequence>,
    ) -> Result<RenderOutput> {
        let mut package = Package::open(template)?;
        let options = &self.options;

        let main_prefix = options.main_document_prefix();
        let part_names: Vec<String> = package
            .file_names()
            .filter(|name| options.is_renderable(name))
            .map(str::to_string)
            .collect();
        if !part_names.iter().any(|name| name.starts_with(main_prefix)) {
            return Err(OpcError::PartNotFound(format!("{}.xml", main_prefix)).into());
        }

        let mut report = RenderReport::default();
        let mut used_keys = BTreeSet::new();
        let mut anchored = BTreeSet::new();
        let mut rendered = Vec::new();
        // Drawing ids are unique across the whole document, not per part
        let mut next_doc_pr = part_names
            .iter()
            .filter_map(|name| package.get(name))
            .map(ids::max_doc_pr_id)
            .max()
            .unwrap_or(0)
            .saturating_add(1);

        let changes = {
            let mut embedder = PackageMediaEmbedder::new(&package, &options.media_dir);
            for name in &part_names {
                let Some(bytes) = package.get(name) else {
                    continue;
                };
                if options.skip_parts_without_controls
                    && memmem::find(bytes, SDT_PROPERTIES_MARKER).is_none()
                {
                    trace!(part = %name, "no content controls, skipped");
                    continue;
                }

                let tree = XmlTree::parse(bytes).map_err(|e| OoxmlError::malformed_xml(name, e))?;
                let mut ctx = PartContext::new(name, tree, options, &mut embedder);
                ctx.ids.reserve_doc_prs_below(next_doc_pr);

                let document = ctx.tree.document();
                apply_record(&mut ctx, document, fields)?;
                for (key, records) in sequences {
                    if let Some(units) = expand(&mut ctx, key, records)? {
                        anchored.insert(key.as_str());
                        *report.expanded.entry(key.clone()).or_default() += units;
                    }
                }

                let index = ContentControlIndex::scan(&ctx.tree, &options.namespaces);
                report.unmatched.extend(
                    index
                        .leaves()
                        .filter(|placeholder| !ctx.filled.contains(&placeholder.node()))
                        .map(|placeholder| placeholder.key().to_string()),
                );
                used_keys.append(&mut ctx.used_keys);
                next_doc_pr = ctx.ids.peek_doc_pr();

                if ctx.modified {
                    debug!(part = %name, "part rendered");
                    rendered.push((name.as_str(), ctx.tree.serialize()));
                }
            }
            embedder.into_changes()
        };

        report.unused_fields = fields
            .keys()
            .filter(|key| !used_keys.contains(*key))
            .map(str::to_string)
            .collect();
        report.missing_anchors = sequences
            .keys()
            .filter(|key| !anchored.contains(key.as_str()))
            .cloned()
            .collect();
        for key in &report.missing_anchors {
            warn!(key = %key, "repeating key matched no placeholder");
        }
        if options.strict_anchors {
            if let Some(key) = report.missing_anchors.first() {
                return Err(OoxmlError::MissingAnchor(key.clone()));
            }
        }

        for (name, bytes) in rendered {
            package.replace(name, bytes)?;
            report.rendered_parts.push(name.to_string());
        }
        report.media_added = changes.apply(&mut package)?;

        let bytes = package.save()?;
        info!(
            parts = report.rendered_parts.len(),
            unmatched = report.unmatched.len(),
            media = report.media_added,
            "template rendered"
        );
        Ok(RenderOutput { bytes, report })
    }

    /// Render with the fields and sequences of a [`TemplateData`].
    #[inline]
    pub fn render_data(&self, template: &[u8], data: &TemplateData) -> Result<RenderOutput> {
        self.render(template, &data.fields, &data.sequences)
    }

    /// Render the template at `template_path` and write the result to `output_path`.
    ///
    /// The output file is only written when the render succeeds.
    pub fn render_file<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        template_path: P,
        output_path: Q,
        data: &TemplateData,
    ) -> Result<RenderReport> {
        let template = std::fs::read(template_path)?;
        let output = self.render_data(&template, data)?;
        std::fs::write(output_path, &output.bytes)?;
        Ok(output.report)
    }

    /// Render independent jobs, returning one result per job in input order.
    pub fn render_batch(&self, jobs: &[RenderJob]) -> Vec<Result<RenderOutput>> {
        #[cfg(feature = "parallel")]
        let results = jobs
            .par_iter()
            .map(|job| self.render_data(&job.template, &job.data))
            .collect();
        #[cfg(not(feature = "parallel"))]
        let results = jobs
            .iter()
            .map(|job| self.render_data(&job.template, &job.data))
            .collect();
        results
    }
}

/// Render `template` with default options.
pub fn render(
    template: &[u8],
    fields: &FieldRecord,
    sequences: &BTreeMap<String, RecordSequence>,
) -> Result<RenderOutput> {
    Renderer::default().render(template, fields, sequences)
}
