//! Zip archives of translation files exchanged between environments

use std::io::{Cursor, Read, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{LokalisointiError, Result};
use crate::storage::object_key::parse_file_path;

/// Largest translation file accepted from an archive
pub const MAX_ENTRY_BYTES: u64 = 64 * 1024 * 1024;

/// Upper bound of the buffer reserved from an entry's declared size
const PREALLOC_LIMIT: u64 = 64 * 1024;

/// One translation file inside an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub namespace: Option<String>,
    pub locale: String,
    pub content: Vec<u8>,
}

impl ArchiveEntry {
    /// `<namespace>/<locale>.json` or `<locale>.json`
    pub fn path(&self) -> String {
        crate::storage::object_key::file_path(self.namespace.as_deref(), &self.locale)
    }
}

/// Build a zip archive; entries are written in the given order
pub fn write_archive<I>(entries: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = ArchiveEntry>,
{
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in entries {
        writer.start_file(entry.path(), options)?;
        writer.write_all(&entry.content)?;
    }

    Ok(writer.finish()?.into_inner())
}

/// Unpack a zip archive.
///
/// Every file entry must be named `[<namespace>/]<locale>.json`; a single
/// malformed name fails the whole archive. Directory entries are skipped.
/// Declared entry sizes come from the peer and are only trusted up to
/// [`MAX_ENTRY_BYTES`]; the content read is bounded the same way.
pub fn read_archive(bytes: &[u8]) -> Result<Vec<ArchiveEntry>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut entries = Vec::with_capacity(archive.len());

    for index in 0..archive.len() {
        let mut file = archive.by_index(index)?;
        if file.is_dir() {
            continue;
        }
        let (namespace, locale) = parse_file_path(file.name())?;
        let declared = file.size();
        if declared > MAX_ENTRY_BYTES {
            return Err(LokalisointiError::Parse(format!(
                "archive entry '{}' declares {} bytes, limit is {}",
                file.name(),
                declared,
                MAX_ENTRY_BYTES
            )));
        }

        let mut content = Vec::with_capacity(declared.min(PREALLOC_LIMIT) as usize);
        (&mut file).take(MAX_ENTRY_BYTES + 1).read_to_end(&mut content)?;
        if content.len() as u64 > MAX_ENTRY_BYTES {
            return Err(LokalisointiError::Parse(format!(
                "archive entry '{}' exceeds {} bytes",
                file.name(),
                MAX_ENTRY_BYTES
            )));
        }
        entries.push(ArchiveEntry {
            namespace,
            locale,
            content,
        });
    }

    Ok(entries)
}
