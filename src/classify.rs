//! Structural content-type classification.
//!
//! [`classify`] is total: every payload shape maps to some [`ContentType`],
//! with unrecognized shapes falling through to `other` rather than failing.
//! Two extension overrides take precedence over structural inspection: a
//! `.json` source file is always `json` and a `.md` source file is always
//! `markdown`, regardless of payload shape.

use serde_json::Value;

use crate::models::ContentType;

/// Classify a payload into its content-type bucket.
///
/// `extension` is the originating file's extension including the leading dot
/// (may be empty). Precedence among object shapes: `text` + `images` keys win
/// over a `format` key, so an OCR'd PDF that happens to carry a `format`
/// field still lands in the `pdf` bucket.
pub fn classify(data: &Value, extension: &str) -> ContentType {
    match extension.to_ascii_lowercase().as_str() {
        ".json" => return ContentType::Json,
        ".md" => return ContentType::Markdown,
        _ => {}
    }

    match data {
        Value::Object(map) => {
            if map.contains_key("text") && map.contains_key("images") {
                ContentType::Pdf
            } else if map.contains_key("format") {
                ContentType::Image
            } else {
                ContentType::Json
            }
        }
        Value::Array(items) => {
            if items.iter().all(Value::is_array) {
                ContentType::Csv
            } else {
                ContentType::Docx
            }
        }
        Value::String(s) => {
            if s.contains("<p>") {
                ContentType::Markdown
            } else {
                ContentType::Text
            }
        }
        _ => ContentType::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pdf_shape_wins_over_format_key() {
        let payload = json!({"text": ["page"], "images": [], "format": "PNG"});
        assert_eq!(classify(&payload, ".pdf"), ContentType::Pdf);
    }

    #[test]
    fn image_requires_absent_text_and_images() {
        let payload = json!({"format": "PNG", "size": 12, "mode": "RGB"});
        assert_eq!(classify(&payload, ".png"), ContentType::Image);
    }

    #[test]
    fn plain_object_is_json() {
        assert_eq!(classify(&json!({"a": 1}), ".yaml"), ContentType::Json);
    }

    #[test]
    fn list_of_lists_is_csv_otherwise_docx() {
        assert_eq!(classify(&json!([[1, 2], [3, 4]]), ".csv"), ContentType::Csv);
        assert_eq!(classify(&json!(["para one", "para two"]), ".docx"), ContentType::Docx);
        // Vacuously all-lists.
        assert_eq!(classify(&json!([]), ""), ContentType::Csv);
    }

    #[test]
    fn string_with_paragraph_marker_is_markdown() {
        assert_eq!(classify(&json!("<p>hi</p>"), ".html"), ContentType::Markdown);
        assert_eq!(classify(&json!("plain prose"), ".txt"), ContentType::Text);
    }

    #[test]
    fn json_extension_overrides_shape() {
        assert_eq!(classify(&json!("just a string"), ".json"), ContentType::Json);
        assert_eq!(classify(&json!([[1], [2]]), ".JSON"), ContentType::Json);
    }

    #[test]
    fn md_extension_overrides_shape() {
        assert_eq!(classify(&json!({"a": 1}), ".md"), ContentType::Markdown);
    }

    #[test]
    fn unknown_shapes_are_other_never_an_error() {
        assert_eq!(classify(&json!(null), ""), ContentType::Other);
        assert_eq!(classify(&json!(true), ""), ContentType::Other);
        assert_eq!(classify(&json!(3.25), ".bin"), ContentType::Other);
    }
}
