//! Provides a general interface to a physical OPC package (ZIP file).
//!
//! This module handles the low-level reading and writing of ZIP archives. Reading
//! inflates every member into memory; writing either stores new content with
//! Deflate compression or copies a member of the source archive verbatim,
//! compressed bytes, CRC and header fields included.

use crate::ooxml::opc::error::{OpcError, Result};
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// One member of a ZIP archive, fully inflated.
#[derive(Debug, Clone)]
pub struct RawEntry {
    /// Member name exactly as recorded in the central directory
    pub name: String,
    /// Decompressed content
    pub data: Vec<u8>,
    /// Whether the member is a directory record
    pub is_dir: bool,
}

/// Physical package reader over a borrowed ZIP buffer.
pub struct PhysPkgReader<'data> {
    archive: ZipArchive<Cursor<&'data [u8]>>,
}

impl<'data> PhysPkgReader<'data> {
    /// Create a new PhysPkgReader from a byte slice.
    ///
    /// # Errors
    /// Returns [`OpcError::MalformedArchive`] if the central directory cannot be read.
    pub fn new(data: &'data [u8]) -> Result<Self> {
        let archive = ZipArchive::new(Cursor::new(data))
            .map_err(|e| OpcError::MalformedArchive(e.to_string()))?;
        Ok(Self { archive })
    }

    /// Get the number of members in the archive, directories included.
    #[inline]
    pub fn len(&self) -> usize {
        self.archive.len()
    }

    /// Check if the archive has no members.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.archive.len() == 0
    }

    /// Inflate every member, in central-directory order.
    pub fn read_all(&mut self) -> Result<Vec<RawEntry>> {
        let mut entries = Vec::with_capacity(self.archive.len());

        for i in 0..self.archive.len() {
            let mut file = self
                .archive
                .by_index(i)
                .map_err(|e| OpcError::MalformedArchive(e.to_string()))?;

            let name = file.name().to_string();
            let is_dir = file.is_dir();
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)
                .map_err(|e| OpcError::MalformedArchive(format!("{}: {}", name, e)))?;

            entries.push(RawEntry { name, data, is_dir });
        }

        Ok(entries)
    }
}

/// Physical package writer for creating OPC packages in memory.
pub struct PhysPkgWriter {
    archive: ZipWriter<Cursor<Vec<u8>>>,
    options: SimpleFileOptions,
}

impl PhysPkgWriter {
    /// Create a new package writer that writes to memory.
    pub fn new() -> Self {
        Self {
            archive: ZipWriter::new(Cursor::new(Vec::new())),
            options: SimpleFileOptions::default().compression_method(CompressionMethod::Deflated),
        }
    }

    /// Write a member with Deflate compression.
    pub fn write(&mut self, name: &str, blob: &[u8]) -> Result<()> {
        self.archive.start_file(name, self.options)?;
        self.archive.write_all(blob)?;
        Ok(())
    }

    /// Copy member `index` of `source` without decompressing it.
    pub fn copy_raw(&mut self, source: &mut PhysPkgReader<'_>, index: usize) -> Result<()> {
        let file = source.archive.by_index_raw(index)?;
        self.archive.raw_copy_file(file)?;
        Ok(())
    }

    /// Finish writing and return the package bytes.
    pub fn finish(self) -> Result<Vec<u8>> {
        let cursor = self.archive.finish()?;
        Ok(cursor.into_inner())
    }
}

impl Default for PhysPkgWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let mut writer = PhysPkgWriter::new();
        writer.write("test.txt", b"Hello, World!").unwrap();
        let zip_data = writer.finish().unwrap();

        let mut reader = PhysPkgReader::new(&zip_data).unwrap();
        let entries = reader.read_all().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "test.txt");
        assert_eq!(entries[0].data, b"Hello, World!");
    }

    #[test]
    fn test_raw_copy_keeps_content() {
        let mut writer = PhysPkgWriter::new();
        writer.write("[Content_Types].xml", b"<Types/>").unwrap();
        writer.write("word/document.xml", b"<document/>").unwrap();
        let original = writer.finish().unwrap();

        let mut source = PhysPkgReader::new(&original).unwrap();
        let mut copy = PhysPkgWriter::new();
        copy.copy_raw(&mut source, 1).unwrap();
        copy.copy_raw(&mut source, 0).unwrap();
        let copied = copy.finish().unwrap();

        let entries = PhysPkgReader::new(&copied).unwrap().read_all().unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["word/document.xml", "[Content_Types].xml"]);
        assert_eq!(entries[0].data, b"<document/>");
    }

    #[test]
    fn test_rejects_non_zip() {
        let err = PhysPkgReader::new(b"definitely not a zip archive").err();
        assert!(matches!(err, Some(OpcError::MalformedArchive(_))));
    }
}
