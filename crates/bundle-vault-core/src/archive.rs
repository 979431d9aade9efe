// crates/bundle-vault-core/src/archive.rs
// ============================================================================
// Module: Bundle Vault Archive Codec
// Description: ZIP packing and unpacking for stored bundles.
// Purpose: Turn named byte payloads into one opaque blob and back into files.
// Dependencies: zip, thiserror
// ============================================================================

//! ## Overview
//! Bundles are ZIP archives with Deflated entries. Packing names each entry
//! by the base name of its source, so directory components never leak into
//! the archive. Unpacking recreates the entries under a destination
//! directory and overwrites existing files.
//!
//! ## Invariants
//! - Packing an empty entry set fails with [`ArchiveError::EmptyInput`].
//! - Entry names are unique; inputs sharing a base name are rejected.
//! - Unpacking never writes outside the destination directory; entries with
//!   absolute or parent-relative names are rejected as corrupt.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fs;
use std::io::Cursor;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;
use zip::CompressionMethod;
use zip::ZipArchive;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

// ============================================================================
// SECTION: Types
// ============================================================================

/// One named payload inside a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Entry name inside the archive.
    pub name: String,
    /// Entry contents.
    pub bytes: Vec<u8>,
}

impl ArchiveEntry {
    /// Creates an entry named by the base name of `name`.
    #[must_use]
    pub fn new(name: impl AsRef<str>, bytes: Vec<u8>) -> Self {
        Self {
            name: base_name(name.as_ref()),
            bytes,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Archive codec errors.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// No entries were supplied for packing.
    #[error("no files to pack")]
    EmptyInput,
    /// A source file does not exist.
    #[error("source file not found: {0}")]
    SourceNotFound(String),
    /// Two inputs share the same base name.
    #[error("duplicate archive entry name: {0}")]
    DuplicateEntry(String),
    /// The blob is not a well-formed archive.
    #[error("corrupt archive: {0}")]
    CorruptArchive(String),
    /// Filesystem error while reading sources or writing entries.
    #[error("archive io error: {0}")]
    Io(String),
}

// ============================================================================
// SECTION: Packing
// ============================================================================

/// Packs named payloads into a ZIP blob.
///
/// # Errors
///
/// Returns [`ArchiveError::EmptyInput`] when `entries` is empty,
/// [`ArchiveError::DuplicateEntry`] when two entries share a base name, and
/// [`ArchiveError::Io`] when the archive cannot be written.
pub fn pack_entries(entries: Vec<ArchiveEntry>) -> Result<Vec<u8>, ArchiveError> {
    if entries.is_empty() {
        return Err(ArchiveError::EmptyInput);
    }
    let mut seen = BTreeSet::new();
    for entry in &entries {
        let name = base_name(&entry.name);
        if !seen.insert(name.clone()) {
            return Err(ArchiveError::DuplicateEntry(name));
        }
    }
    let mut buffer = Cursor::new(Vec::new());
    {
        let mut writer = ZipWriter::new(&mut buffer);
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for entry in entries {
            writer
                .start_file(base_name(&entry.name), options)
                .map_err(|err| ArchiveError::Io(err.to_string()))?;
            writer.write_all(&entry.bytes).map_err(|err| ArchiveError::Io(err.to_string()))?;
        }
        writer.finish().map_err(|err| ArchiveError::Io(err.to_string()))?;
    }
    Ok(buffer.into_inner())
}

/// Reads files from disk and packs them by base name.
///
/// # Errors
///
/// Returns [`ArchiveError::EmptyInput`] when `paths` is empty,
/// [`ArchiveError::SourceNotFound`] when a path is not a readable file,
/// [`ArchiveError::DuplicateEntry`] when two paths share a file name, and
/// [`ArchiveError::Io`] on other read failures.
pub fn pack_files(paths: &[PathBuf]) -> Result<Vec<u8>, ArchiveError> {
    if paths.is_empty() {
        return Err(ArchiveError::EmptyInput);
    }
    let mut entries = Vec::with_capacity(paths.len());
    for path in paths {
        if !path.is_file() {
            return Err(ArchiveError::SourceNotFound(path.display().to_string()));
        }
        let bytes = fs::read(path).map_err(|err| ArchiveError::Io(err.to_string()))?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| ArchiveError::SourceNotFound(path.display().to_string()))?;
        entries.push(ArchiveEntry::new(name, bytes));
    }
    pack_entries(entries)
}

// ============================================================================
// SECTION: Unpacking
// ============================================================================

/// Writes every entry of `blob` under `destination`, creating it if absent.
///
/// Returns the written file paths in archive order.
///
/// # Errors
///
/// Returns [`ArchiveError::CorruptArchive`] when `blob` is not a ZIP archive
/// or an entry name escapes `destination`, and [`ArchiveError::Io`] when a
/// file cannot be written.
pub fn unpack(blob: &[u8], destination: &Path) -> Result<Vec<PathBuf>, ArchiveError> {
    let mut archive = open_archive(blob)?;
    fs::create_dir_all(destination).map_err(|err| ArchiveError::Io(err.to_string()))?;
    let mut written = Vec::with_capacity(archive.len());
    for index in 0 .. archive.len() {
        let mut file =
            archive.by_index(index).map_err(|err| ArchiveError::CorruptArchive(err.to_string()))?;
        let relative = file.enclosed_name().ok_or_else(|| {
            ArchiveError::CorruptArchive(format!("entry escapes destination: {}", file.name()))
        })?;
        let target = destination.join(relative);
        if file.is_dir() {
            fs::create_dir_all(&target).map_err(|err| ArchiveError::Io(err.to_string()))?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|err| ArchiveError::Io(err.to_string()))?;
        }
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .map_err(|err| ArchiveError::CorruptArchive(err.to_string()))?;
        fs::write(&target, bytes).map_err(|err| ArchiveError::Io(err.to_string()))?;
        written.push(target);
    }
    Ok(written)
}

/// Returns the entry names of `blob` in archive order.
///
/// # Errors
///
/// Returns [`ArchiveError::CorruptArchive`] when `blob` is not a ZIP archive.
pub fn list_entries(blob: &[u8]) -> Result<Vec<String>, ArchiveError> {
    let archive = open_archive(blob)?;
    Ok(archive.file_names().map(str::to_string).collect())
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Opens a ZIP reader over an in-memory blob.
fn open_archive(blob: &[u8]) -> Result<ZipArchive<Cursor<&[u8]>>, ArchiveError> {
    ZipArchive::new(Cursor::new(blob)).map_err(|err| ArchiveError::CorruptArchive(err.to_string()))
}

/// Strips directory components from an entry name.
fn base_name(name: &str) -> String {
    name.rsplit(['/', '\\']).next().unwrap_or(name).to_string()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions favor direct unwrap/expect for clarity."
    )]

    use super::base_name;

    #[test]
    fn base_name_strips_unix_and_windows_directories() {
        assert_eq!(base_name("a/b/c.json"), "c.json");
        assert_eq!(base_name("a\\b\\c.json"), "c.json");
        assert_eq!(base_name("plain.bin"), "plain.bin");
    }
}
