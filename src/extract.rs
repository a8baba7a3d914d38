//! Per-format extraction of file contents into tagged payloads.
//!
//! Each supported format produces an [`ExtractionResult`] whose content type
//! is decided here, at the extraction boundary, so downstream aggregation
//! never has to sniff shapes. Text-like formats still go through
//! [`classify`] (which applies the `.json`/`.md` extension overrides);
//! structured formats tag themselves directly.
//!
//! Extraction never panics: unsupported formats return `Ok(None)` and the
//! scan layer skips unreadable files with a logged warning.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};

use crate::classify::classify;
use crate::models::{ContentType, ExtractionResult};

/// Raster/vector image extensions handled by the image extractor.
pub const IMAGE_EXTENSIONS: [&str; 7] = [".png", ".jpg", ".jpeg", ".gif", ".bmp", ".ico", ".svg"];

/// Extensions read as plain text (source code, config, docs).
const TEXT_EXTENSIONS: [&str; 14] = [
    ".txt", ".py", ".rs", ".ts", ".js", ".html", ".php", ".css", ".toml", ".cfg", ".ini", ".log",
    ".gitignore", ".editorconfig",
];

/// Maximum decompressed bytes read from a single docx ZIP entry.
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extract one file into a tagged result.
///
/// `source_label` is recorded as the item's provenance (the on-disk path, or
/// an archive-relative path for files pulled out of a zip). Returns
/// `Ok(None)` for formats the compiler does not handle.
pub fn extract_file(path: &Path, source_label: &str) -> Result<Option<ExtractionResult>> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let mut extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_ascii_lowercase()))
        .unwrap_or_default();
    // Dotfiles like `.babelrc` have no extension in path terms; treat the
    // whole name as one so they route to the right extractor.
    if extension.is_empty() && file_name.starts_with('.') {
        extension = file_name.to_ascii_lowercase();
    }
    let file_size = std::fs::metadata(path)
        .with_context(|| format!("Failed to stat {}", path.display()))?
        .len();

    let payload = match extension.as_str() {
        ".pdf" => Some(extract_pdf(path)?),
        ext if IMAGE_EXTENSIONS.contains(&ext) => Some(extract_image(path, ext, file_size)?),
        ".json" | ".babelrc" | ".eslintrc" => Some(extract_json(path)?),
        ".yml" | ".yaml" => Some(extract_yaml(path)?),
        ".csv" => Some(extract_csv(path)?),
        ".xml" => Some(extract_xml(path)?),
        ".docx" => Some(extract_docx(path)?),
        ".md" => Some((
            Value::String(read_text(path)?),
            ContentType::Markdown,
        )),
        "" => Some(read_classified_text(path, &extension)?),
        ext if TEXT_EXTENSIONS.contains(&ext) => Some(read_classified_text(path, ext)?),
        _ => None,
    };

    Ok(payload.map(|(data, content_type)| ExtractionResult {
        data,
        file_name,
        file_size,
        file_type: extension,
        file_source: Some(source_label.to_string()),
        content_type,
    }))
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {} as UTF-8", path.display()))
}

fn read_classified_text(path: &Path, extension: &str) -> Result<(Value, ContentType)> {
    let body = read_text(path)?;
    let data = Value::String(body);
    let ty = classify(&data, extension);
    Ok((data, ty))
}

fn extract_pdf(path: &Path) -> Result<(Value, ContentType)> {
    let bytes = std::fs::read(path)?;
    let text = pdf_extract::extract_text_from_mem(&bytes)
        .with_context(|| format!("PDF extraction failed for {}", path.display()))?;
    // One entry per page would need layout info pdf-extract does not expose;
    // the whole document goes in as a single text element.
    Ok((json!({"text": [text], "images": []}), ContentType::Pdf))
}

fn extract_image(path: &Path, extension: &str, file_size: u64) -> Result<(Value, ContentType)> {
    let bytes = std::fs::read(path)?;
    let format = extension.trim_start_matches('.').to_ascii_uppercase();
    Ok((
        json!({
            "format": format,
            "size": file_size,
            "mode": Value::Null,
            "ocr_text": "",
            "image_base64": STANDARD.encode(&bytes),
        }),
        ContentType::Image,
    ))
}

fn extract_json(path: &Path) -> Result<(Value, ContentType)> {
    let body = read_text(path)?;
    let data: Value = serde_json::from_str(&body)
        .with_context(|| format!("Invalid JSON in {}", path.display()))?;
    Ok((data, ContentType::Json))
}

fn extract_yaml(path: &Path) -> Result<(Value, ContentType)> {
    let body = read_text(path)?;
    let data: Value = serde_yaml::from_str(&body)
        .with_context(|| format!("Invalid YAML in {}", path.display()))?;
    let ty = classify(&data, ".yaml");
    Ok((data, ty))
}

/// Rows split on bare commas; quoted-field handling is not implemented.
fn extract_csv(path: &Path) -> Result<(Value, ContentType)> {
    let body = read_text(path)?;
    let rows: Vec<Value> = body
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| {
            Value::Array(
                line.split(',')
                    .map(|field| Value::String(field.trim().to_string()))
                    .collect(),
            )
        })
        .collect();
    Ok((Value::Array(rows), ContentType::Csv))
}

/// XML is stored as its raw text, after a well-formedness pass.
fn extract_xml(path: &Path) -> Result<(Value, ContentType)> {
    let body = read_text(path)?;
    let mut reader = quick_xml::Reader::from_reader(body.as_bytes());
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Eof) => break,
            Ok(_) => {}
            Err(err) => anyhow::bail!("Malformed XML in {}: {}", path.display(), err),
        }
        buf.clear();
    }
    Ok((Value::String(body), ContentType::Xml))
}

/// Paragraph texts from `word/document.xml`, one entry per `w:p`.
///
/// Only the ZIP-based `.docx` container is handled; legacy binary `.doc`
/// files are not archives and are skipped as unsupported.
fn extract_docx(path: &Path) -> Result<(Value, ContentType)> {
    let bytes = std::fs::read(path)?;
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes.as_slice()))
        .with_context(|| format!("Failed to open {} as a ZIP archive", path.display()))?;
    let mut doc_xml = Vec::new();
    {
        let entry = archive
            .by_name("word/document.xml")
            .context("word/document.xml not found")?;
        entry
            .take(MAX_XML_ENTRY_BYTES)
            .read_to_end(&mut doc_xml)
            .context("Failed to read word/document.xml")?;
        if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
            anyhow::bail!("word/document.xml exceeds size limit");
        }
    }
    let paragraphs = extract_paragraphs(&doc_xml)?;
    Ok((
        Value::Array(paragraphs.into_iter().map(Value::String).collect()),
        ContentType::Docx,
    ))
}

fn extract_paragraphs(xml: &[u8]) -> Result<Vec<String>> {
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        current.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"p" {
                    paragraphs.push(std::mem::take(&mut current));
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(err) => anyhow::bail!("Failed to parse document.xml: {}", err),
            _ => {}
        }
        buf.clear();
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }
    Ok(paragraphs)
}
