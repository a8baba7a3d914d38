//! Bounded-size text chunking.
//!
//! Splits oversized text into [`Chunk`]s that respect two independent
//! budgets at once: a UTF-8 byte budget per chunk and a character budget per
//! line. Lines longer than the line budget are greedily wrapped at the last
//! space at or before the limit (hard break when a line has no space), and
//! the accumulating buffer is flushed whenever the next wrapped line would
//! push it past the byte budget. A chunk may therefore come in under the
//! byte budget when wrapping forces an earlier flush.
//!
//! The only permitted overrun is a single unsplittable line that exceeds the
//! byte budget on its own; it becomes a chunk by itself.

use serde_json::Value;

use crate::models::Chunk;

/// Split `text` into chunks bounded by `max_bytes` per chunk and
/// `max_line_length` characters per line.
///
/// Concatenating the returned `chunks` in order reproduces the original
/// text up to whitespace normalization at wrap points (wrap spaces become
/// newlines, every chunk ends with a newline).
pub fn split_string(text: &str, max_bytes: usize, max_line_length: usize) -> Chunk {
    // A zero line budget cannot make progress; treat it as one column.
    let max_line_length = max_line_length.max(1);

    let mut chunks: Vec<String> = Vec::new();
    let mut buf = String::new();

    if text.is_empty() {
        return finish(chunks);
    }

    for line in text.split('\n') {
        let mut rest = line;
        while char_len(rest) > max_line_length {
            let limit = byte_index_at(rest, max_line_length);
            // Last space at or before the line budget; hard break without one.
            let brk = match rest[..limit].rfind(' ') {
                Some(0) | None => limit,
                Some(pos) => pos,
            };
            push_line(&mut chunks, &mut buf, &rest[..brk], max_bytes);
            rest = rest[brk..].trim_start_matches(' ');
        }
        push_line(&mut chunks, &mut buf, rest, max_bytes);
    }

    if !buf.is_empty() {
        chunks.push(buf);
    }
    finish(chunks)
}

/// Append one (already line-bounded) line plus newline to the buffer,
/// flushing first if the addition would exceed the byte budget.
fn push_line(chunks: &mut Vec<String>, buf: &mut String, line: &str, max_bytes: usize) {
    let addition = line.len() + 1;
    if !buf.is_empty() && buf.len() + addition > max_bytes {
        chunks.push(std::mem::take(buf));
    }
    buf.push_str(line);
    buf.push('\n');
}

fn finish(chunks: Vec<String>) -> Chunk {
    let chunk_lengths: Vec<usize> = chunks.iter().map(|c| char_len(c)).collect();
    Chunk {
        num_chunks: chunks.len(),
        chunk_lengths,
        chunks,
    }
}

/// Recursively apply the chunk budgets to every string leaf of a nested
/// value. Mappings and sequences are walked; non-string leaves pass through
/// untouched; a string leaf over either budget is replaced by its serialized
/// [`Chunk`].
pub fn split_value(value: &Value, max_bytes: usize, max_line_length: usize) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), split_value(v, max_bytes, max_line_length)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| split_value(v, max_bytes, max_line_length))
                .collect(),
        ),
        Value::String(s) => {
            if s.len() > max_bytes || char_len(s) > max_line_length {
                let chunk = split_string(s, max_bytes, max_line_length);
                serde_json::to_value(chunk).unwrap_or_else(|_| value.clone())
            } else {
                value.clone()
            }
        }
        other => other.clone(),
    }
}

/// Line-accumulation splitter used by the deep normalization pass.
///
/// Byte-budget-unaware by design: lines are accumulated into a chunk while
/// the running character count stays within `max_line_length`; once the next
/// line would exceed it, the chunk is flushed. An overlong single line
/// becomes a chunk of its own.
pub fn chunk_lines(text: &str, max_line_length: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for line in text.split('\n') {
        if char_len(&current) + char_len(line) <= max_line_length {
            current.push_str(line);
            current.push('\n');
        } else {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            current.push_str(line);
            current.push('\n');
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Byte offset of the `n`-th character, clamped to the string length.
fn byte_index_at(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len())
}
