//! Zip package I/O for `.docx` files.

use crate::error::FormatError;
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::ZipArchive;

pub const CONTENT_TYPES: &str = "[Content_Types].xml";
pub const PACKAGE_RELS: &str = "_rels/.rels";
pub const DOCUMENT: &str = "word/document.xml";
pub const DOCUMENT_RELS: &str = "word/_rels/document.xml.rels";
pub const STYLES: &str = "word/styles.xml";
pub const NUMBERING: &str = "word/numbering.xml";
pub const COMMENTS: &str = "word/comments.xml";

/// The parts of a package, keyed by their path inside the archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Package {
    parts: BTreeMap<String, Vec<u8>>,
}

impl Package {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.parts.insert(name.into(), content.into());
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.parts.get(name).map(Vec::as_slice)
    }

    /// A part decoded as UTF-8 text. `None` when absent.
    pub fn text(&self, name: &str) -> Option<Result<&str, std::str::Utf8Error>> {
        self.get(name).map(|bytes| std::str::from_utf8(strip_bom(bytes)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parts.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }

    /// Read every file entry of a zip archive.
    pub fn read(bytes: &[u8]) -> Result<Self, FormatError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut package = Package::new();
        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().trim_start_matches('/').to_string();
            let mut content = Vec::new();
            file.read_to_end(&mut content)
                .map_err(|e| FormatError::Archive(format!("{name}: {e}")))?;
            package.parts.insert(name, content);
        }
        tracing::debug!(parts = package.parts.len(), "package read");
        Ok(package)
    }

    /// Write the package as a deflated zip archive, content types first.
    pub fn write(&self) -> Result<Vec<u8>, FormatError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        let ordered = self
            .parts
            .iter()
            .filter(|(name, _)| name.as_str() == CONTENT_TYPES)
            .chain(
                self.parts
                    .iter()
                    .filter(|(name, _)| name.as_str() != CONTENT_TYPES),
            );
        for (name, content) in ordered {
            writer.start_file(name.as_str(), options)?;
            writer.write_all(content)?;
        }
        let cursor = writer.finish()?;
        Ok(cursor.into_inner())
    }
}

fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(b"\xEF\xBB\xBF".as_slice()).unwrap_or(bytes)
}
