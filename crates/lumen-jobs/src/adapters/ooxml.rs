//! Archive helpers for Office Open XML containers (DOCX, PPTX).

use std::io::{Cursor, Read};

use zip::ZipArchive;

use lumen_core::{defaults, Error, Result};

pub(crate) type Archive<'a> = ZipArchive<Cursor<&'a [u8]>>;

pub(crate) fn open_archive(data: &[u8]) -> Result<Archive<'_>> {
    ZipArchive::new(Cursor::new(data))
        .map_err(|e| Error::Extraction(format!("Not a valid OOXML container: {}", e)))
}

/// Reject archives whose declared uncompressed size exceeds `limit`.
pub(crate) fn check_expanded_size(archive: &mut Archive<'_>, limit: u64) -> Result<()> {
    let mut total = 0u64;
    for index in 0..archive.len() {
        let entry = archive
            .by_index(index)
            .map_err(|e| Error::Extraction(format!("Unreadable archive member: {}", e)))?;
        total = total.saturating_add(entry.size());
        if total > limit {
            return Err(Error::Extraction(format!(
                "Archive expands beyond {} bytes",
                limit
            )));
        }
    }
    Ok(())
}

/// Read one archive member as UTF-8 text, at most `limit` bytes.
pub(crate) fn read_entry(archive: &mut Archive<'_>, name: &str, limit: u64) -> Result<String> {
    let file = archive
        .by_name(name)
        .map_err(|e| Error::Extraction(format!("Missing '{}': {}", name, e)))?;
    let mut xml = String::new();
    file.take(limit.saturating_add(1))
        .read_to_string(&mut xml)
        .map_err(|e| Error::Extraction(format!("Failed to read '{}': {}", name, e)))?;
    if xml.len() as u64 > limit {
        return Err(Error::Extraction(format!(
            "'{}' exceeds {} bytes",
            name, limit
        )));
    }
    Ok(xml)
}

/// Open an archive and apply the default expansion limit.
pub(crate) fn open_checked(data: &[u8]) -> Result<Archive<'_>> {
    let mut archive = open_archive(data)?;
    check_expanded_size(&mut archive, defaults::MAX_ARCHIVE_EXPANDED_BYTES)?;
    Ok(archive)
}

/// Whether the archive contains a member with this exact name.
pub(crate) fn has_entry(data: &[u8], name: &str) -> bool {
    open_archive(data)
        .map(|archive| archive.file_names().any(|n| n == name))
        .unwrap_or(false)
}

/// Build an in-memory zip from `(name, contents)` pairs.
#[cfg(test)]
pub(crate) fn build_zip(entries: &[(&str, &str)]) -> Vec<u8> {
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(contents.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}
