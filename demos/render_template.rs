/// Example: Render a .docx template from a YAML data file
///
/// ```text
/// cargo run --example render_template -- \
///     --template report.docx --data data.yaml --output out.docx [--config render.yaml]
/// ```
///
/// The data file holds scalar `fields` and repeating `sequences`. A value is
/// either text or an image loaded from a path relative to the data file:
///
/// ```yaml
/// fields:
///   project: Loquat
///   logo: { image: logo.png, description: Company logo }
/// sequences:
///   h.version:
///     - { h.version: V00, h.estado: Draft }
///     - { h.version: V01, h.estado: Approved }
/// ```
///
/// Set `RUST_LOG=loquat=debug` to follow the render part by part.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::Parser;
use loquat::{FieldRecord, ImagePayload, RenderOptions, Renderer, TemplateData};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "render_template")]
#[command(about = "Fill the content controls of a .docx template", long_about = None)]
struct Cli {
    /// Path to the .docx template
    #[arg(short, long)]
    template: PathBuf,

    /// Path to the YAML data file
    #[arg(short, long)]
    data: PathBuf,

    /// Where to write the rendered document
    #[arg(short, long)]
    output: PathBuf,

    /// Optional YAML render options
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DataValue {
    Text(String),
    Image {
        image: PathBuf,
        width_emu: Option<i64>,
        height_emu: Option<i64>,
        description: Option<String>,
    },
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct DataFile {
    fields: BTreeMap<String, DataValue>,
    sequences: BTreeMap<String, Vec<BTreeMap<String, DataValue>>>,
}

fn load_record(
    values: BTreeMap<String, DataValue>,
    base: &Path,
) -> Result<FieldRecord, Box<dyn std::error::Error>> {
    let mut record = FieldRecord::new();
    for (key, value) in values {
        match value {
            DataValue::Text(text) => {
                record.insert(key, text);
            },
            DataValue::Image {
                image,
                width_emu,
                height_emu,
                description,
            } => {
                let mut payload = ImagePayload::new(std::fs::read(base.join(image))?);
                payload.width_emu = width_emu;
                payload.height_emu = height_emu;
                payload.description = description;
                record.insert(key, payload);
            },
        }
    }
    Ok(record)
}

fn load_data(path: &Path) -> Result<TemplateData, Box<dyn std::error::Error>> {
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let file: DataFile = serde_saphyr::from_str(&std::fs::read_to_string(path)?)?;

    let mut data = TemplateData::new(load_record(file.fields, base)?);
    for (key, records) in file.sequences {
        let records = records
            .into_iter()
            .map(|values| load_record(values, base))
            .collect::<Result<Vec<_>, _>>()?;
        data = data.with_sequence(key, records);
    }
    Ok(data)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("loquat=info")))
        .init();

    let cli = Cli::parse();
    let options = match &cli.config {
        Some(path) => RenderOptions::from_yaml_file(path)?,
        None => RenderOptions::default(),
    };
    let data = load_data(&cli.data)?;

    println!("Rendering template: {}", cli.template.display());
    println!("{}", "=".repeat(60));

    let report = Renderer::new(options).render_file(&cli.template, &cli.output, &data)?;

    println!("✓ Written to {}", cli.output.display());
    println!("  Parts rendered: {}", report.rendered_parts.join(", "));
    println!("  Media added:    {}", report.media_added);
    for (key, units) in &report.expanded {
        println!("  {}: {} unit(s)", key, units);
    }

    if !report.is_clean() {
        println!();
        println!("Diagnostics:");
        println!("{}", "-".repeat(60));
        for key in &report.unmatched {
            println!("  unfilled placeholder: {}", key);
        }
        for key in &report.unused_fields {
            println!("  unused field:         {}", key);
        }
        for key in &report.missing_anchors {
            println!("  missing anchor:       {}", key);
        }
    }

    Ok(())
}
