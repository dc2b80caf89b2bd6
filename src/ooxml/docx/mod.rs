/// Word (.docx) template rendering.
///
/// This module fills the content controls (`w:sdt`) of a WordprocessingML
/// package with caller data and expands repeating blocks.
///
/// # Architecture
///
/// The module is organized around these key types:
/// - `ContentControlIndex`: placeholders of a part, in document order
/// - `FieldRecord` / `RecordSequence`: scalar values and repeated records
/// - `MediaEmbedder`: capability that turns image bytes into a relationship id
/// - `Renderer`: drives substitution and expansion over every renderable part
///
/// # Example
///
/// ```rust,no_run
/// use loquat::ooxml::docx::{FieldRecord, Renderer, RenderOptions, TemplateData};
///
/// let options = RenderOptions::from_yaml_file("render.yaml")?;
/// let data = TemplateData::new(FieldRecord::from([("project", "Loquat")]))
///     .with_sequence("h.version", vec![FieldRecord::from([("h.version", "V00")])]);
///
/// let report = Renderer::new(options).render_file("template.docx", "out.docx", &data)?;
/// println!("unfilled: {:?}", report.unmatched);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub mod content_control;
pub mod context;
pub mod ids;
pub mod image;
pub mod media;
pub mod options;
pub mod record;
pub mod render;
pub mod repeat;
pub mod substitute;

pub use content_control::{ContentControlIndex, ControlType, Placeholder};
pub use media::{MediaChanges, MediaEmbedder, NoMedia, PackageMediaEmbedder};
pub use options::{Namespaces, RenderOptions};
pub use record::{FieldRecord, FieldValue, ImagePayload, RecordSequence, TemplateData};
pub use render::{RenderJob, RenderOutput, RenderReport, Renderer, render};
