//! Output artifact writers.
//!
//! Serializes the aggregated store to a single JSON document (UTF-8,
//! non-ASCII preserved, 4-space indentation) or to a Markdown report with
//! one section per content-type bucket. Artifacts land in the configured
//! output directory under a timestamped name unless an explicit path is
//! given.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;
use tracing::info;

use crate::config::Config;
use crate::models::{AggregatedStore, ContentType};

/// Serialize the store as pretty JSON with 4-space indentation.
pub fn to_json(store: &AggregatedStore) -> Result<String> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    store
        .serialize(&mut serializer)
        .context("Failed to serialize aggregated store")?;
    // serde_json always emits valid UTF-8.
    Ok(String::from_utf8(out).expect("serialized JSON is UTF-8"))
}

/// Render the store as a Markdown report: one section per non-empty bucket,
/// one fenced JSON block per item.
pub fn to_markdown(store: &AggregatedStore) -> Result<String> {
    let mut out = String::new();
    out.push_str("# Compiled Knowledge\n");

    out.push_str(&format!("\nItems: {}\n", store.metadata.len()));

    for ty in ContentType::ALL {
        let Some(bucket) = store.bucket(ty) else {
            continue;
        };
        if bucket.is_empty() {
            continue;
        }
        out.push_str(&format!("\n## {}\n", ty));
        for (key, value) in bucket {
            out.push_str(&format!("\n### {}\n\n", key));
            if let Some(meta) = store.metadata.get(key) {
                if let Some(file_name) = meta.get("file_name").and_then(|v| v.as_str()) {
                    out.push_str(&format!("Source file: `{}`\n\n", file_name));
                }
            }
            out.push_str("```json\n");
            out.push_str(&serde_json::to_string_pretty(value)?);
            out.push_str("\n```\n");
        }
    }
    Ok(out)
}

/// Write the artifact, returning the path it landed at.
///
/// With `output` set, writes exactly there; otherwise writes a timestamped
/// file into the configured output directory.
pub fn write_artifact(
    store: &AggregatedStore,
    config: &Config,
    output: Option<&Path>,
) -> Result<PathBuf> {
    let rendered = match config.output.format.as_str() {
        "markdown" => to_markdown(store)?,
        _ => to_json(store)?,
    };

    let path = match output {
        Some(path) => path.to_path_buf(),
        None => {
            let extension = if config.output.format == "markdown" {
                "md"
            } else {
                "json"
            };
            let stamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
            config
                .output
                .dir
                .join(format!("{}_{}.{}", stamp, config.output.project_name, extension))
        }
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory {}", parent.display()))?;
    }
    std::fs::write(&path, rendered.as_bytes())
        .with_context(|| format!("Failed to write artifact to {}", path.display()))?;

    info!(
        path = %path.display(),
        bytes = rendered.len(),
        "artifact written"
    );
    Ok(path)
}
