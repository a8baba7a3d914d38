//! Core data models used throughout the knowledge compiler.
//!
//! These types represent the per-file extraction results flowing out of the
//! scan stage and the aggregated store the organization engine builds from
//! them. Everything here is plain data: built once per run, held in memory,
//! serialized to the output artifact, then discarded.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Content-type bucket an extraction result is filed under.
///
/// The tag is assigned once, at the extraction boundary (see
/// [`crate::classify::classify`]); the aggregator never re-derives it from
/// untyped structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Json,
    Csv,
    Xml,
    Text,
    Markdown,
    Docx,
    Image,
    Pdf,
    Other,
}

impl ContentType {
    /// Bucket name as it appears in the output artifact.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Json => "json",
            ContentType::Csv => "csv",
            ContentType::Xml => "xml",
            ContentType::Text => "text",
            ContentType::Markdown => "markdown",
            ContentType::Docx => "docx",
            ContentType::Image => "image",
            ContentType::Pdf => "pdf",
            ContentType::Other => "other",
        }
    }

    /// All buckets, in the order they appear in the output artifact.
    pub const ALL: [ContentType; 9] = [
        ContentType::Json,
        ContentType::Csv,
        ContentType::Xml,
        ContentType::Text,
        ContentType::Markdown,
        ContentType::Docx,
        ContentType::Image,
        ContentType::Other,
        ContentType::Pdf,
    ];
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One per source file: the extracted payload plus file-level metadata.
/// Produced by the scan stage, consumed exactly once by the aggregator.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    /// Extracted payload. Shape depends on the content type: OCR-style
    /// `{text, images}` for PDFs, `{format, ...}` for images, parsed values
    /// for JSON/YAML, row lists for CSV, paragraph lists for DOCX, plain
    /// strings for everything text-like.
    pub data: Value,
    pub file_name: String,
    pub file_size: u64,
    /// Extension including the leading dot, or empty.
    pub file_type: String,
    /// Path the file was read from, if it came from the filesystem (files
    /// pulled out of archives report their in-archive path).
    pub file_source: Option<String>,
    pub content_type: ContentType,
}

/// Metadata written alongside every aggregated data item. Immutable once
/// written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataRecord {
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub description: String,
    pub file_name: String,
    pub file_size: u64,
    pub source: Option<String>,
}

/// An oversized text or JSON value split into bounded fragments.
///
/// Concatenating `chunks` in order reconstructs the original text up to
/// whitespace normalization at wrap points. Every chunk stays within the
/// byte budget unless it is a single unsplittable line that exceeds the
/// budget on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunks: Vec<String>,
    pub num_chunks: usize,
    pub chunk_lengths: Vec<usize>,
}

/// The aggregated output: a metadata index plus per-content-type buckets of
/// keyed payloads.
///
/// Buckets are `serde_json` maps (insertion-order preserving) so the output
/// mirrors input order. Invariant: every key present in any bucket has a
/// corresponding entry in `metadata`.
#[derive(Debug, Clone, Serialize)]
pub struct AggregatedStore {
    pub metadata: Map<String, Value>,
    pub data: Map<String, Value>,
}

impl AggregatedStore {
    /// Create a store with every bucket present and empty.
    pub fn new() -> Self {
        let mut data = Map::new();
        for ty in ContentType::ALL {
            data.insert(ty.as_str().to_string(), Value::Object(Map::new()));
        }
        AggregatedStore {
            metadata: Map::new(),
            data,
        }
    }

    /// Mutable access to one content-type bucket.
    pub fn bucket_mut(&mut self, ty: ContentType) -> &mut Map<String, Value> {
        let slot = self
            .data
            .entry(ty.as_str().to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        slot.as_object_mut().unwrap()
    }

    /// Read access to one content-type bucket.
    pub fn bucket(&self, ty: ContentType) -> Option<&Map<String, Value>> {
        self.data.get(ty.as_str()).and_then(Value::as_object)
    }

    /// Record metadata for a data key.
    pub fn insert_metadata(&mut self, key: &str, record: &MetadataRecord) {
        // MetadataRecord contains no non-serializable values.
        let value = serde_json::to_value(record).unwrap_or(Value::Null);
        self.metadata.insert(key.to_string(), value);
    }
}

impl Default for AggregatedStore {
    fn default() -> Self {
        Self::new()
    }
}
