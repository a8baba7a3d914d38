//! Aggregation of extraction results into a single nested store.
//!
//! Folds an ordered list of [`ExtractionResult`]s into an
//! [`AggregatedStore`]: each item is filed under its content-type bucket
//! with a unique key derived from its file name, a metadata record is
//! written for every key, and oversized text or JSON values are split into
//! bounded chunks. A final deep normalization pass walks the whole store and
//! chunks any leaf string still over the line budget, so the bound holds
//! everywhere, not just at top level.
//!
//! Nothing in here is fatal: malformed items are skipped with a logged
//! error, and chunking failures degrade to storing the value unchunked.

use serde_json::{json, Map, Value};
use tracing::{debug, error};

use crate::chunk::{chunk_lines, split_string, split_value};
use crate::config::ChunkingConfig;
use crate::models::{AggregatedStore, ContentType, ExtractionResult, MetadataRecord};

/// Allocates unique keys within each content-type bucket.
///
/// Counters are scoped to one aggregation run and live here rather than in
/// module state: one monotonic counter per bucket for collision suffixes,
/// plus a run-wide counter for synthesizing names for empty file names.
#[derive(Debug, Default)]
pub struct KeyAllocator {
    suffix_counters: std::collections::HashMap<ContentType, u64>,
    anon_counter: u64,
}

impl KeyAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce a key for `file_name` that is not already present in
    /// `bucket`. Periods become underscores; an empty name synthesizes
    /// `file_<n>`; collisions append `_<n>` from the bucket's counter,
    /// retrying until the key is free.
    pub fn allocate(
        &mut self,
        ty: ContentType,
        file_name: &str,
        bucket: &Map<String, Value>,
    ) -> String {
        let mut base = file_name.replace('.', "_");
        if base.is_empty() {
            self.anon_counter += 1;
            base = format!("file_{}", self.anon_counter);
        }
        if !bucket.contains_key(&base) {
            return base;
        }
        let counter = self.suffix_counters.entry(ty).or_insert(0);
        loop {
            *counter += 1;
            let candidate = format!("{}_{}", base, counter);
            if !bucket.contains_key(&candidate) {
                return candidate;
            }
        }
    }
}

/// Fold all extraction results, in input order, into one aggregated store
/// and deep-normalize it.
pub fn aggregate(results: &[ExtractionResult], cfg: &ChunkingConfig) -> AggregatedStore {
    let mut store = AggregatedStore::new();
    let mut keys = KeyAllocator::new();

    for result in results {
        let ty = result.content_type;
        let key = keys.allocate(ty, &result.file_name, store.bucket_mut(ty));
        debug!(file = %result.file_name, bucket = %ty, %key, "organizing item");

        store.insert_metadata(
            &key,
            &MetadataRecord {
                content_type: ty,
                description: format!("Data item from {}", result.file_name),
                file_name: result.file_name.clone(),
                file_size: result.file_size,
                source: result.file_source.clone(),
            },
        );

        match ty {
            ContentType::Pdf => organize_pdf(&mut store, &key, result),
            ContentType::Image => organize_image(&mut store, &key, result),
            ContentType::Csv | ContentType::Xml | ContentType::Docx => {
                store.bucket_mut(ty).insert(key, result.data.clone());
            }
            ContentType::Json => organize_json(&mut store, &key, result, cfg),
            ContentType::Text | ContentType::Markdown | ContentType::Other => {
                organize_text(&mut store, &key, result, cfg);
            }
        }
    }

    debug!(items = results.len(), "aggregated all extraction results");
    normalize(&mut store, cfg.max_line_length);
    store
}

fn organize_pdf(store: &mut AggregatedStore, key: &str, result: &ExtractionResult) {
    let (Some(text), Some(images)) = (result.data.get("text"), result.data.get("images")) else {
        error!(file = %result.file_name, "pdf payload missing text/images, skipping");
        return;
    };
    store.bucket_mut(ContentType::Pdf).insert(
        key.to_string(),
        json!({"text": text, "images": images}),
    );
}

fn organize_image(store: &mut AggregatedStore, key: &str, result: &ExtractionResult) {
    let Some(image) = result.data.as_object() else {
        error!(file = %result.file_name, "image payload is not an object, skipping");
        return;
    };
    let null = Value::Null;
    let field = |name: &str| image.get(name).unwrap_or(&null).clone();
    store.bucket_mut(ContentType::Image).insert(
        key.to_string(),
        json!({
            "metadata": {
                "format": field("format"),
                "size": field("size"),
                "mode": field("mode"),
            },
            "ocr_text": field("ocr_text"),
        }),
    );
}

/// JSON payloads are stored whole when under budget, otherwise chunked per
/// top-level key with each chunk re-parsed as JSON where possible.
fn organize_json(
    store: &mut AggregatedStore,
    key: &str,
    result: &ExtractionResult,
    cfg: &ChunkingConfig,
) {
    let serialized = match serde_json::to_string_pretty(&result.data) {
        Ok(s) => s,
        Err(err) => {
            error!(file = %result.file_name, %err, "failed to serialize json payload, skipping");
            return;
        }
    };
    let json_size = serialized.len() as u64;
    let budget = cfg.json_chunk_size_bytes.max(cfg.text_chunk_size_bytes);

    if json_size > budget {
        let entry = chunk_json_payload(&result.data, &result.file_name, key, cfg);
        store.bucket_mut(ContentType::Json).insert(key.to_string(), entry);
    } else {
        store.bucket_mut(ContentType::Json).insert(
            key.to_string(),
            json!({
                "data": result.data,
                "metadata": {
                    "file_name": result.file_name,
                    "file_size": json_size,
                },
            }),
        );
    }
}

/// Split an oversized JSON payload per top-level entry.
///
/// Container values are kept structured with the budgets applied to their
/// string leaves. String and scalar values are pretty-serialized and run
/// through the byte+line chunker; every resulting chunk is re-parsed as
/// JSON, falling back to the raw chunk text when the parse fails (a
/// mid-value split rarely re-parses — the fallback is lossy but the
/// concatenated chunk text still reconstructs the value).
fn chunk_json_payload(
    data: &Value,
    file_name: &str,
    key: &str,
    cfg: &ChunkingConfig,
) -> Value {
    // Non-object payloads (arrays, scalars tagged json by extension) have no
    // entries to iterate; chunk the whole serialized value as one blob.
    let values: Vec<&Value> = match data.as_object() {
        Some(map) => map.values().collect(),
        None => vec![data],
    };

    let mut out = Map::new();
    let mut idx = 0usize;
    let mut insert = |out: &mut Map<String, Value>, idx: &mut usize, data: Value| {
        out.insert(
            format!("{}_chunk_{}", key, *idx),
            json!({
                "data": data,
                "metadata": {
                    "file_name": file_name,
                    "chunk_number": *idx,
                },
            }),
        );
        *idx += 1;
    };

    for value in values {
        match value {
            // Container values keep their structure; the budgets apply to
            // their string leaves.
            Value::Object(_) | Value::Array(_) => {
                let data = split_value(
                    value,
                    cfg.text_chunk_size_bytes as usize,
                    cfg.max_line_length,
                );
                insert(&mut out, &mut idx, data);
            }
            _ => {
                let text = serde_json::to_string_pretty(value).unwrap_or_default();
                let chunk =
                    split_string(&text, cfg.text_chunk_size_bytes as usize, cfg.max_line_length);
                for piece in &chunk.chunks {
                    let parsed = match serde_json::from_str::<Value>(piece.trim()) {
                        Ok(v) => v,
                        Err(_) => {
                            debug!(file = %file_name, chunk = idx, "json chunk not re-parseable, storing as text");
                            Value::String(piece.clone())
                        }
                    };
                    insert(&mut out, &mut idx, parsed);
                }
            }
        }
    }
    Value::Object(out)
}

/// Text-like payloads are stored whole when under both budgets, otherwise
/// split into chunks keyed `<key>_chunk_<idx>`, each with its own metadata
/// record.
fn organize_text(
    store: &mut AggregatedStore,
    key: &str,
    result: &ExtractionResult,
    cfg: &ChunkingConfig,
) {
    let ty = result.content_type;
    let Some(content) = result.data.as_str() else {
        // Non-string payloads classified `other` (booleans, numbers, null)
        // are stored as-is; the chunk path applies to strings.
        store.bucket_mut(ty).insert(key.to_string(), result.data.clone());
        return;
    };

    let over_bytes = content.len() as u64 > cfg.text_chunk_size_bytes;
    let over_line = content
        .split('\n')
        .any(|line| line.chars().count() > cfg.max_line_length);

    if over_bytes || over_line {
        let chunk = split_string(content, cfg.text_chunk_size_bytes as usize, cfg.max_line_length);
        for (idx, piece) in chunk.chunks.iter().enumerate() {
            let chunk_key = format!("{}_chunk_{}", key, idx);
            store.insert_metadata(
                &chunk_key,
                &MetadataRecord {
                    content_type: ty,
                    description: format!("Chunk {} of {}", idx, key),
                    file_name: result.file_name.clone(),
                    file_size: piece.len() as u64,
                    source: result.file_source.clone(),
                },
            );
            store
                .bucket_mut(ty)
                .insert(chunk_key, Value::String(piece.clone()));
        }
    } else {
        store.bucket_mut(ty).insert(
            key.to_string(),
            json!({
                "content": content,
                "metadata": {
                    "type": ty,
                    "description": format!("{} data from {}", ty, result.file_name),
                    "file_name": result.file_name,
                    "file_size": content.len() as u64,
                    "source": result.file_source,
                },
            }),
        );
    }
}

/// Deep normalization pass: chunk any leaf string anywhere in the store that
/// still exceeds the line budget.
///
/// Only strings sitting as mapping values are rewritten (into
/// `{type: "text_chunk", chunks: [...]}`); strings inside sequences are left
/// alone, which is what makes the pass idempotent — the `chunks` lists it
/// produces are never re-nested on a second run.
pub fn normalize(store: &mut AggregatedStore, max_line_length: usize) {
    for value in store.metadata.values_mut() {
        normalize_value(value, max_line_length);
    }
    for value in store.data.values_mut() {
        normalize_value(value, max_line_length);
    }
}

fn normalize_value(value: &mut Value, max_line_length: usize) {
    match value {
        Value::Object(map) => {
            for entry in map.values_mut() {
                let oversized = entry
                    .as_str()
                    .map(|s| s.chars().count() > max_line_length)
                    .unwrap_or(false);
                if oversized {
                    let chunks = chunk_lines(entry.as_str().unwrap(), max_line_length);
                    *entry = json!({"type": "text_chunk", "chunks": chunks});
                } else {
                    normalize_value(entry, max_line_length);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                normalize_value(item, max_line_length);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ChunkingConfig {
        ChunkingConfig {
            text_chunk_size_bytes: 1024,
            json_chunk_size_bytes: 1024,
            max_line_length: 80,
        }
    }

    fn text_result(name: &str, body: &str) -> ExtractionResult {
        ExtractionResult {
            data: Value::String(body.to_string()),
            file_name: name.to_string(),
            file_size: body.len() as u64,
            file_type: ".txt".to_string(),
            file_source: Some(format!("/src/{}", name)),
            content_type: ContentType::Text,
        }
    }

    #[test]
    fn keys_are_unique_within_a_bucket() {
        let results = vec![
            text_result("report.txt", "one"),
            text_result("report.txt", "two"),
            text_result("report.txt", "three"),
        ];
        let store = aggregate(&results, &cfg());
        let bucket = store.bucket(ContentType::Text).unwrap();
        assert_eq!(bucket.len(), 3);
        assert!(bucket.contains_key("report_txt"));
        assert!(bucket.contains_key("report_txt_1"));
        assert!(bucket.contains_key("report_txt_2"));
    }

    #[test]
    fn empty_file_names_synthesize_counted_keys() {
        let results = vec![text_result("", "one"), text_result("", "two")];
        let store = aggregate(&results, &cfg());
        let bucket = store.bucket(ContentType::Text).unwrap();
        assert!(bucket.contains_key("file_1"));
        assert!(bucket.contains_key("file_2"));
    }

    #[test]
    fn every_data_key_has_metadata() {
        let mut results = vec![
            text_result("a.txt", &"long line ".repeat(300)),
            text_result("b.txt", "short"),
        ];
        results.push(ExtractionResult {
            data: serde_json::json!({"k": "v"}),
            file_name: "c.json".into(),
            file_size: 10,
            file_type: ".json".into(),
            file_source: None,
            content_type: ContentType::Json,
        });
        let store = aggregate(&results, &cfg());
        for ty in ContentType::ALL {
            for key in store.bucket(ty).unwrap().keys() {
                assert!(
                    store.metadata.contains_key(key),
                    "key {} in bucket {} lacks metadata",
                    key,
                    ty
                );
            }
        }
    }

    #[test]
    fn small_text_stored_with_inline_metadata() {
        let store = aggregate(&[text_result("note.txt", "tiny note")], &cfg());
        let entry = &store.bucket(ContentType::Text).unwrap()["note_txt"];
        assert_eq!(entry["content"], "tiny note");
        assert_eq!(entry["metadata"]["type"], "text");
        assert_eq!(entry["metadata"]["source"], "/src/note.txt");
    }

    #[test]
    fn oversized_text_becomes_indexed_chunks_with_metadata() {
        let body = "lorem ipsum dolor sit amet ".repeat(100);
        let store = aggregate(&[text_result("big.txt", &body)], &cfg());
        let bucket = store.bucket(ContentType::Text).unwrap();
        assert!(!bucket.contains_key("big_txt"));
        assert!(bucket.contains_key("big_txt_chunk_0"));
        assert!(bucket.contains_key("big_txt_chunk_1"));
        for key in bucket.keys() {
            assert!(store.metadata.contains_key(key));
            let record = &store.metadata[key];
            assert_eq!(record["type"], "text");
            assert_eq!(record["file_name"], "big.txt");
        }
    }

    #[test]
    fn long_single_line_triggers_chunking_even_under_byte_budget() {
        // Under the 1024-byte budget but the one line exceeds 80 chars.
        let body = "x".repeat(200);
        let store = aggregate(&[text_result("line.txt", &body)], &cfg());
        let bucket = store.bucket(ContentType::Text).unwrap();
        assert!(bucket.contains_key("line_txt_chunk_0"));
    }

    #[test]
    fn small_json_stored_directly_with_size() {
        let result = ExtractionResult {
            data: serde_json::json!({"name": "demo", "version": 3}),
            file_name: "pkg.json".into(),
            file_size: 30,
            file_type: ".json".into(),
            file_source: Some("/src/pkg.json".into()),
            content_type: ContentType::Json,
        };
        let store = aggregate(&[result], &cfg());
        let entry = &store.bucket(ContentType::Json).unwrap()["pkg_json"];
        assert_eq!(entry["data"]["name"], "demo");
        assert_eq!(entry["metadata"]["file_name"], "pkg.json");
        assert!(entry["metadata"]["file_size"].as_u64().unwrap() > 0);
    }

    #[test]
    fn oversized_json_is_chunked_per_key_and_reparsed() {
        let small = ChunkingConfig {
            text_chunk_size_bytes: 500,
            json_chunk_size_bytes: 500,
            max_line_length: 400,
        };
        let data = serde_json::json!({
            "alpha": {"k": "v"},
            "beta": "word ".repeat(300),
        });
        let result = ExtractionResult {
            data: data.clone(),
            file_name: "big.json".into(),
            file_size: 2000,
            file_type: ".json".into(),
            file_source: None,
            content_type: ContentType::Json,
        };
        let store = aggregate(&[result], &small);
        let entry = store.bucket(ContentType::Json).unwrap()["big_json"]
            .as_object()
            .unwrap();
        assert!(entry.len() > 1, "expected multiple chunks, got {:?}", entry.keys());
        // First chunk is the whole "alpha" value: small, so it re-parses.
        let first = &entry["big_json_chunk_0"];
        assert_eq!(first["data"]["k"], "v");
        assert_eq!(first["metadata"]["chunk_number"], 0);
        // The oversized "beta" string splits mid-value: raw-text fallback.
        let second = &entry["big_json_chunk_1"];
        assert!(second["data"].is_string());
        assert_eq!(second["metadata"]["file_name"], "big.json");
    }

    #[test]
    fn json_chunks_that_fail_reparse_stored_as_raw_text() {
        let small = ChunkingConfig {
            text_chunk_size_bytes: 500,
            json_chunk_size_bytes: 500,
            max_line_length: 400,
        };
        // One oversized string value: every serialized fragment is a bare
        // word run, none of which re-parses as JSON.
        let result = ExtractionResult {
            data: serde_json::json!({"beta": "word ".repeat(300)}),
            file_name: "prose.json".into(),
            file_size: 1500,
            file_type: ".json".into(),
            file_source: None,
            content_type: ContentType::Json,
        };
        let store = aggregate(&[result], &small);
        let entry = store.bucket(ContentType::Json).unwrap()["prose_json"]
            .as_object()
            .unwrap();
        assert!(entry.len() > 1, "expected multiple chunks, got {:?}", entry.keys());
        for (chunk_key, value) in entry {
            assert!(
                value["data"].is_string(),
                "chunk {} should fall back to raw text, got {:?}",
                chunk_key,
                value["data"]
            );
        }
    }

    #[test]
    fn pdf_and_image_payloads_stored_structurally() {
        let results = vec![
            ExtractionResult {
                data: serde_json::json!({"text": ["page one"], "images": []}),
                file_name: "doc.pdf".into(),
                file_size: 900,
                file_type: ".pdf".into(),
                file_source: None,
                content_type: ContentType::Pdf,
            },
            ExtractionResult {
                data: serde_json::json!({
                    "format": "PNG", "size": 512, "mode": "RGB",
                    "ocr_text": "scanned", "image_base64": "aGk="
                }),
                file_name: "scan.png".into(),
                file_size: 512,
                file_type: ".png".into(),
                file_source: None,
                content_type: ContentType::Image,
            },
        ];
        let store = aggregate(&results, &cfg());
        let pdf = &store.bucket(ContentType::Pdf).unwrap()["doc_pdf"];
        assert_eq!(pdf["text"][0], "page one");
        let image = &store.bucket(ContentType::Image).unwrap()["scan_png"];
        assert_eq!(image["metadata"]["format"], "PNG");
        assert_eq!(image["ocr_text"], "scanned");
    }

    #[test]
    fn malformed_pdf_payload_skipped_without_abort() {
        let results = vec![
            ExtractionResult {
                data: serde_json::json!({"text": ["ok"]}),
                file_name: "broken.pdf".into(),
                file_size: 1,
                file_type: ".pdf".into(),
                file_source: None,
                content_type: ContentType::Pdf,
            },
            text_result("after.txt", "still processed"),
        ];
        let store = aggregate(&results, &cfg());
        assert!(store.bucket(ContentType::Pdf).unwrap().is_empty());
        assert!(store.bucket(ContentType::Text).unwrap().contains_key("after_txt"));
    }

    #[test]
    fn bucket_order_mirrors_input_order() {
        let results = vec![
            text_result("z.txt", "1"),
            text_result("a.txt", "2"),
            text_result("m.txt", "3"),
        ];
        let store = aggregate(&results, &cfg());
        let keys: Vec<&String> = store.bucket(ContentType::Text).unwrap().keys().collect();
        assert_eq!(keys, ["z_txt", "a_txt", "m_txt"]);
    }

    #[test]
    fn normalization_is_idempotent() {
        let results = vec![
            text_result("deep.txt", &"nested value ".repeat(50)),
            ExtractionResult {
                data: serde_json::json!({"note": "n ".repeat(120)}),
                file_name: "d.json".into(),
                file_size: 240,
                file_type: ".json".into(),
                file_source: None,
                content_type: ContentType::Json,
            },
        ];
        let mut store = aggregate(&results, &cfg());
        let once = serde_json::to_value(&store).unwrap();
        normalize(&mut store, cfg().max_line_length);
        let twice = serde_json::to_value(&store).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn normalize_rewrites_oversized_leaf_strings() {
        let mut store = AggregatedStore::new();
        store.bucket_mut(ContentType::Other).insert(
            "blob".into(),
            serde_json::json!({"inner": "word ".repeat(100)}),
        );
        normalize(&mut store, 40);
        let rewritten = &store.bucket(ContentType::Other).unwrap()["blob"]["inner"];
        assert_eq!(rewritten["type"], "text_chunk");
        let chunks = rewritten["chunks"].as_array().unwrap();
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.is_string()));
    }
}
