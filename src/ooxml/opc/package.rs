/// In-memory OPC package with byte-exact round-tripping.
///
/// This module provides the main [`Package`] type: an ordered mapping from ZIP
/// member name to raw bytes. Members that are never replaced are written back
/// by copying their compressed records from the source archive, so untouched
/// parts survive a render byte-for-byte, in their original order.
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use crate::ooxml::opc::error::{OpcError, Result};
use crate::ooxml::opc::phys_pkg::{PhysPkgReader, PhysPkgWriter};

/// Where the bytes of an entry come from when the package is saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryOrigin {
    /// Untouched member `n` of the source archive
    Original(usize),
    /// Member `n` of the source archive with replaced content
    Modified(usize),
    /// Entry that did not exist in the source archive
    Added,
}

#[derive(Debug, Clone)]
struct PackageEntry {
    name: String,
    data: Vec<u8>,
    is_dir: bool,
    origin: EntryOrigin,
}

/// An OOXML package held entirely in memory.
///
/// # Example
///
/// ```no_run
/// use loquat::ooxml::opc::Package;
///
/// let bytes = std::fs::read("template.docx")?;
/// let mut pkg = Package::open(&bytes)?;
/// let body = pkg.get("word/document.xml").unwrap_or_default().to_vec();
/// pkg.replace("word/document.xml", body)?;
/// let out = pkg.save()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct Package {
    /// The source archive, kept for raw copies of untouched members
    source: Vec<u8>,
    /// Entries in archive order; added entries follow the originals
    entries: Vec<PackageEntry>,
    /// Entry name to position in `entries`
    index: HashMap<String, usize>,
}

impl Package {
    /// Open a package from ZIP bytes.
    ///
    /// # Errors
    /// Returns [`OpcError::MalformedArchive`] if the bytes are not a readable ZIP stream.
    pub fn open(bytes: &[u8]) -> Result<Self> {
        let raw = PhysPkgReader::new(bytes)?.read_all()?;

        let mut entries = Vec::with_capacity(raw.len());
        let mut index = HashMap::with_capacity(raw.len());
        for (position, entry) in raw.into_iter().enumerate() {
            // The first occurrence wins for duplicated member names
            index.entry(entry.name.clone()).or_insert(position);
            entries.push(PackageEntry {
                name: entry.name,
                data: entry.data,
                is_dir: entry.is_dir,
                origin: EntryOrigin::Original(position),
            });
        }

        Ok(Self {
            source: bytes.to_vec(),
            entries,
            index,
        })
    }

    /// Open a package from a file path.
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(OpcError::PartNotFound(path.display().to_string()));
        }
        let bytes = std::fs::read(path)?;
        Self::open(&bytes)
    }

    /// Open a package from a reader.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::open(&bytes)
    }

    /// Serialize the package to ZIP bytes.
    ///
    /// Untouched members are copied raw from the source archive; replaced and
    /// added members are written with Deflate compression.
    pub fn save(&self) -> Result<Vec<u8>> {
        let mut source = PhysPkgReader::new(&self.source)?;
        let mut writer = PhysPkgWriter::new();

        for entry in &self.entries {
            match entry.origin {
                EntryOrigin::Original(position) => writer.copy_raw(&mut source, position)?,
                EntryOrigin::Modified(_) | EntryOrigin::Added => {
                    writer.write(&entry.name, &entry.data)?
                },
            }
        }

        writer.finish()
    }

    /// Get an iterator over entry names, in archive order.
    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Get an iterator over the names of file entries (directories excluded).
    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|e| !e.is_dir)
            .map(|e| e.name.as_str())
    }

    /// Get the current content of an entry.
    #[inline]
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.index.get(name).map(|&i| self.entries[i].data.as_slice())
    }

    /// Check if an entry exists.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Replace the content of an existing entry.
    ///
    /// The entry keeps its name and position.
    pub fn replace(&mut self, name: &str, data: Vec<u8>) -> Result<()> {
        let position = *self
            .index
            .get(name)
            .ok_or_else(|| OpcError::PartNotFound(name.to_string()))?;

        let entry = &mut self.entries[position];
        entry.data = data;
        if let EntryOrigin::Original(n) = entry.origin {
            entry.origin = EntryOrigin::Modified(n);
        }
        Ok(())
    }

    /// Append a new entry after all existing ones.
    pub fn add(&mut self, name: &str, data: Vec<u8>) -> Result<()> {
        if self.index.contains_key(name) {
            return Err(OpcError::DuplicatePart(name.to_string()));
        }
        self.index.insert(name.to_string(), self.entries.len());
        self.entries.push(PackageEntry {
            name: name.to_string(),
            data,
            is_dir: false,
            origin: EntryOrigin::Added,
        });
        Ok(())
    }

    /// Check whether an entry was replaced or added since the package was opened.
    pub fn is_modified(&self, name: &str) -> bool {
        self.index
            .get(name)
            .is_some_and(|&i| !matches!(self.entries[i].origin, EntryOrigin::Original(_)))
    }

    /// Get the number of entries in the package.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the package has no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    fn create_minimal_docx() -> Vec<u8> {
        let mut zip_data = Vec::new();
        {
            let cursor = Cursor::new(&mut zip_data);
            let mut writer = ZipWriter::new(cursor);
            let options = SimpleFileOptions::default();

            writer.start_file("[Content_Types].xml", options).unwrap();
            writer.write_all(br#"<?xml version="1.0"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
    <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
    <Default Extension="xml" ContentType="application/xml"/>
</Types>"#).unwrap();

            writer.start_file("_rels/.rels", options).unwrap();
            writer.write_all(br#"<?xml version="1.0"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
    <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
</Relationships>"#).unwrap();

            writer.start_file("word/document.xml", options).unwrap();
            writer.write_all(br#"<?xml version="1.0"?>
<document xmlns="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
    <body><p><t>Test</t></p></body>
</document>"#).unwrap();

            writer.finish().unwrap();
        }
        zip_data
    }

    #[test]
    fn test_open_package() {
        let pkg = Package::open(&create_minimal_docx()).unwrap();
        let names: Vec<&str> = pkg.entry_names().collect();
        assert_eq!(names, ["[Content_Types].xml", "_rels/.rels", "word/document.xml"]);
        assert!(pkg.get("word/document.xml").unwrap().ends_with(b"</document>"));
    }

    #[test]
    fn test_untouched_save_is_byte_identical_per_entry() {
        let original = create_minimal_docx();
        let pkg = Package::open(&original).unwrap();
        let saved = pkg.save().unwrap();

        let reopened = Package::open(&saved).unwrap();
        for name in pkg.entry_names() {
            assert_eq!(pkg.get(name), reopened.get(name), "entry {name}");
        }
        assert!(!reopened.is_modified("word/document.xml"));
    }

    #[test]
    fn test_replace_keeps_order() {
        let mut pkg = Package::open(&create_minimal_docx()).unwrap();
        pkg.replace("_rels/.rels", b"<Relationships/>".to_vec()).unwrap();
        assert!(pkg.is_modified("_rels/.rels"));

        let reopened = Package::open(&pkg.save().unwrap()).unwrap();
        let names: Vec<&str> = reopened.entry_names().collect();
        assert_eq!(names, ["[Content_Types].xml", "_rels/.rels", "word/document.xml"]);
        assert_eq!(reopened.get("_rels/.rels").unwrap(), b"<Relationships/>");
    }

    #[test]
    fn test_add_and_duplicate() {
        let mut pkg = Package::open(&create_minimal_docx()).unwrap();
        pkg.add("word/media/image1.png", vec![1, 2, 3]).unwrap();
        assert!(matches!(
            pkg.add("word/media/image1.png", vec![]),
            Err(OpcError::DuplicatePart(_))
        ));
        assert!(matches!(
            pkg.replace("word/missing.xml", vec![]),
            Err(OpcError::PartNotFound(_))
        ));

        let reopened = Package::open(&pkg.save().unwrap()).unwrap();
        assert_eq!(reopened.len(), 4);
        assert_eq!(reopened.entry_names().last(), Some("word/media/image1.png"));
    }

    #[test]
    fn test_open_rejects_garbage() {
        assert!(matches!(
            Package::open(b"PK\x03\x04 truncated"),
            Err(OpcError::MalformedArchive(_))
        ));
    }
}
