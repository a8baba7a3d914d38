//! Zip archive expansion.
//!
//! Archives found during the scan are unpacked into a caller-owned temp
//! directory and their contents handed back as plain file paths, so the rest
//! of the pipeline treats archived files exactly like on-disk ones. Entry
//! reads are byte-bounded as zip-bomb protection.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

/// Maximum decompressed bytes per archive entry.
const MAX_ENTRY_BYTES: u64 = 100 * 1024 * 1024;

/// A file extracted from an archive: where it landed on disk, plus its
/// path inside the archive for provenance.
#[derive(Debug)]
pub struct ExtractedFile {
    pub path: PathBuf,
    pub archive_path: String,
}

/// True if the scan should expand this file as an archive.
pub fn is_archive(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_ascii_lowercase() == "zip")
        .unwrap_or(false)
}

/// Unpack `archive_path` into `dest`, returning the extracted files in
/// archive order. Directory entries and entries that escape `dest` are
/// skipped; an over-limit entry is skipped with a warning rather than
/// aborting the archive.
pub fn extract_zip(archive_path: &Path, dest: &Path) -> Result<Vec<ExtractedFile>> {
    let file = std::fs::File::open(archive_path)
        .with_context(|| format!("Failed to open archive {}", archive_path.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Failed to read {} as a ZIP archive", archive_path.display()))?;

    let archive_name = archive_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let mut extracted = Vec::new();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        // enclosed_name rejects absolute paths and `..` traversal.
        let Some(relative) = entry.enclosed_name() else {
            warn!(archive = %archive_name, entry = %entry.name(), "skipping unsafe entry path");
            continue;
        };

        let mut contents = Vec::new();
        entry
            .by_ref()
            .take(MAX_ENTRY_BYTES)
            .read_to_end(&mut contents)?;
        if contents.len() as u64 >= MAX_ENTRY_BYTES {
            warn!(archive = %archive_name, entry = %entry.name(), "skipping over-limit entry");
            continue;
        }

        let out_path = dest.join(&relative);
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&out_path, &contents)?;

        extracted.push(ExtractedFile {
            path: out_path,
            archive_path: format!("{}!/{}", archive_name, relative.display()),
        });
    }

    Ok(extracted)
}
