//! Directory traversal and per-file extraction.
//!
//! Walks the configured source root with the built-in ignore patterns plus
//! any configured extras, applies the exclusion toggles, expands zip
//! archives in place (nested archives included), and returns the ordered
//! list of extraction results the aggregator consumes. Files that fail
//! extraction are skipped with a logged warning; the scan itself only fails
//! on a missing root or bad ignore patterns.

use std::path::Path;

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::archive;
use crate::config::Config;
use crate::extract::{extract_file, IMAGE_EXTENSIONS};
use crate::models::ExtractionResult;

/// Names and patterns never worth compiling: VCS internals, dependency
/// trees, lockfiles, build output, and binary media.
const DEFAULT_IGNORE_GLOBS: [&str; 24] = [
    "**/.git/**",
    "**/.svn/**",
    "**/.hg/**",
    "**/node_modules/**",
    "**/bower_components/**",
    "**/venv/**",
    "**/target/**",
    "**/.idea/**",
    "**/.vscode/**",
    "**/.github/**",
    "**/.DS_Store",
    "**/Thumbs.db",
    "**/package-lock.json",
    "**/yarn.lock",
    "**/pnpm-lock.yaml",
    "**/composer.lock",
    "**/*.pyc",
    "**/*.class",
    "**/*.o",
    "**/*.so",
    "**/*.exe",
    "**/*.dll",
    "**/*.bak",
    "**/merged_data.json",
];

const LOCK_FILE_NAMES: [&str; 4] = [
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "composer.lock",
];

const CONFIG_EXTENSIONS: [&str; 4] = [".json", ".yaml", ".yml", ".toml"];

/// Walk the source root and extract every supported file, in deterministic
/// (name-sorted) order.
pub fn scan(config: &Config) -> Result<Vec<ExtractionResult>> {
    let root = &config.source.root;
    if !root.exists() {
        bail!("Source root does not exist: {}", root.display());
    }

    let ignore = build_ignore_set(&config.source.ignore_globs)?;
    let mut ctx = ScanContext {
        config,
        ignore,
        temp_dirs: Vec::new(),
        results: Vec::new(),
    };
    ctx.walk(root)?;
    Ok(ctx.results)
}

struct ScanContext<'a> {
    config: &'a Config,
    ignore: GlobSet,
    // Keeps extracted archive contents alive for the duration of the scan.
    temp_dirs: Vec<tempfile::TempDir>,
    results: Vec<ExtractionResult>,
}

impl ScanContext<'_> {
    fn walk(&mut self, root: &Path) -> Result<()> {
        let walker = WalkDir::new(root)
            .follow_links(self.config.source.follow_symlinks)
            .sort_by_file_name();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(%err, "traversal error, skipping entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            let rel_str = relative.to_string_lossy().to_string();
            if self.ignore.is_match(&rel_str) {
                continue;
            }
            self.process_file(path, &rel_str)?;
        }
        Ok(())
    }

    fn process_file(&mut self, path: &Path, label: &str) -> Result<()> {
        if self.excluded(path) {
            debug!(file = %label, "excluded by config");
            return Ok(());
        }

        if archive::is_archive(path) {
            self.expand_archive(path, label)?;
            return Ok(());
        }

        match extract_file(path, label) {
            Ok(Some(result)) => {
                debug!(file = %label, bucket = %result.content_type, "extracted");
                self.results.push(result);
            }
            Ok(None) => debug!(file = %label, "unsupported format, skipped"),
            Err(err) => warn!(file = %label, %err, "extraction failed, skipped"),
        }
        Ok(())
    }

    fn expand_archive(&mut self, path: &Path, label: &str) -> Result<()> {
        let temp = tempfile::tempdir().context("Failed to create temp directory for archive")?;
        match archive::extract_zip(path, temp.path()) {
            Ok(files) => {
                for file in files {
                    // Members keep their archive-relative provenance; the
                    // ignore set applies to the in-archive path too.
                    let inner = file.archive_path.split("!/").last().unwrap_or("");
                    if self.ignore.is_match(inner) {
                        continue;
                    }
                    let nested_label = format!("{}!/{}", label, inner);
                    self.process_file(&file.path, &nested_label)?;
                }
            }
            Err(err) => warn!(archive = %label, %err, "archive expansion failed, skipped"),
        }
        self.temp_dirs.push(temp);
        Ok(())
    }

    fn excluded(&self, path: &Path) -> bool {
        let exclude = &self.config.exclude;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_ascii_lowercase()))
            .unwrap_or_default();

        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            if exclude.images {
                return true;
            }
            if exclude.small_images {
                let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
                if size < exclude.small_image_threshold {
                    return true;
                }
            }
        }
        if exclude.config_files && CONFIG_EXTENSIONS.contains(&ext.as_str()) {
            return true;
        }
        if exclude.lock_files && LOCK_FILE_NAMES.contains(&name.as_str()) {
            return true;
        }
        false
    }
}

fn build_ignore_set(extra: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in DEFAULT_IGNORE_GLOBS {
        builder.add(Glob::new(pattern)?);
    }
    for pattern in extra {
        builder.add(Glob::new(pattern).with_context(|| format!("Bad ignore glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}
