//! Media embedding for picture placeholders.
//!
//! Substituting an image needs three coordinated package changes: a new media
//! entry, a relationship from the rendering part to it, and a content-type
//! default for its extension. The renderer only sees the [`MediaEmbedder`]
//! capability (image in, relationship id out); text-only renders never touch
//! any of this bookkeeping.
use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::ooxml::docx::image::ImageFormat;
use crate::ooxml::docx::record::ImagePayload;
use crate::ooxml::error::{OoxmlError, Result};
use crate::ooxml::opc::constants::relationship_type;
use crate::ooxml::opc::{CONTENT_TYPES_MEMBER, ContentTypes, OpcError, PackURI, Package, Relationships};

/// Capability to register image bytes as media of a part.
pub trait MediaEmbedder {
    /// Register `image` for `part` (an entry name such as `word/document.xml`)
    /// and return the relationship id a drawing should reference.
    fn embed(&mut self, part: &str, image: &ImagePayload) -> Result<String>;
}

/// Embedder for renders that must not add entries; every image is rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMedia;

impl MediaEmbedder for NoMedia {
    fn embed(&mut self, part: &str, _image: &ImagePayload) -> Result<String> {
        Err(OoxmlError::InvalidImage(format!(
            "image embedding is disabled (part {})",
            part
        )))
    }
}

/// Embedder that stages media against a package.
///
/// The package is only read while rendering; the staged changes are written
/// by [`MediaChanges::apply`] once every part has been rendered.
pub struct PackageMediaEmbedder<'p> {
    package: &'p Package,
    media_dir: String,
    /// Entry names staged so far
    staged_names: HashSet<String>,
    changes: MediaChanges,
}

impl<'p> PackageMediaEmbedder<'p> {
    pub fn new(package: &'p Package, media_dir: &str) -> Self {
        Self {
            package,
            media_dir: media_dir.trim_end_matches('/').to_string(),
            staged_names: HashSet::new(),
            changes: MediaChanges::default(),
        }
    }

    /// Finish staging.
    pub fn into_changes(self) -> MediaChanges {
        self.changes
    }

    fn next_media_name(&self, ext: &str) -> String {
        let mut buf = itoa::Buffer::new();
        let mut n = 1u32;
        loop {
            let candidate = format!("{}/image{}.{}", self.media_dir, buf.format(n), ext);
            if !self.package.contains(&candidate) && !self.staged_names.contains(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    fn relationships_of(&mut self, part: &str) -> Result<&mut Relationships> {
        if !self.changes.relationships.contains_key(part) {
            let rels_name = PackURI::from_membername(part).rels_uri();
            let rels = match self.package.get(rels_name.membername()) {
                Some(xml) => Relationships::from_xml(xml)?,
                None => Relationships::new(),
            };
            self.changes.relationships.insert(part.to_string(), rels);
        }
        self.changes
            .relationships
            .get_mut(part)
            .ok_or_else(|| OpcError::PartNotFound(part.to_string()).into())
    }
}

impl MediaEmbedder for PackageMediaEmbedder<'_> {
    fn embed(&mut self, part: &str, image: &ImagePayload) -> Result<String> {
        let format = ImageFormat::detect_from_bytes(&image.data).ok_or_else(|| {
            OoxmlError::InvalidImage(format!(
                "unrecognized image data ({} bytes) for {}",
                image.data.len(),
                part
            ))
        })?;

        let name = self.next_media_name(format.extension());
        let source = PackURI::from_membername(part);
        let target = PackURI::from_membername(&name).relative_ref(source.base_uri());
        let r_id = self
            .relationships_of(part)?
            .add_internal(relationship_type::IMAGE, &target);

        debug!(part, media = %name, r_id = %r_id, "staged image");
        self.staged_names.insert(name.clone());
        self.changes.media.push((name, image.data.clone()));
        self.changes
            .content_types
            .insert(format.extension().to_string(), format.content_type());
        Ok(r_id)
    }
}

/// Package changes staged by a [`PackageMediaEmbedder`].
#[derive(Debug, Clone, Default)]
pub struct MediaChanges {
    /// New media entries, in staging order
    media: Vec<(String, Vec<u8>)>,
    /// Updated relationships per source part
    relationships: BTreeMap<String, Relationships>,
    /// Extension to content type
    content_types: BTreeMap<String, &'static str>,
}

impl MediaChanges {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.media.is_empty()
    }

    /// Names of the staged media entries.
    pub fn media_names(&self) -> impl Iterator<Item = &str> {
        self.media.iter().map(|(name, _)| name.as_str())
    }

    /// Write the staged entries, relationship parts and content types into `package`.
    ///
    /// Returns the number of media entries added.
    pub fn apply(self, package: &mut Package) -> Result<usize> {
        if self.is_empty() {
            return Ok(0);
        }
        let added = self.media.len();

        for (name, data) in self.media {
            package.add(&name, data)?;
        }

        for (part, rels) in self.relationships {
            let rels_uri = PackURI::from_membername(&part).rels_uri();
            let xml = rels.to_xml().into_bytes();
            if package.contains(rels_uri.membername()) {
                package.replace(rels_uri.membername(), xml)?;
            } else {
                package.add(rels_uri.membername(), xml)?;
            }
        }

        let current = package
            .get(CONTENT_TYPES_MEMBER)
            .ok_or_else(|| OpcError::PartNotFound(CONTENT_TYPES_MEMBER.to_string()))?;
        let mut types = ContentTypes::from_xml(current)?;
        let mut changed = false;
        for (ext, content_type) in &self.content_types {
            changed |= types.add_default(ext, content_type);
        }
        if changed {
            package.replace(CONTENT_TYPES_MEMBER, types.to_xml())?;
        }

        Ok(added)
    }
}
