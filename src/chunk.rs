//! Span-preserving text chunker.
//!
//! Splits cleaned document text into [`Chunk`]s sized for embedding. Cuts
//! prefer paragraph boundaries (blank lines), then sentence boundaries,
//! and only hard-split inside a sentence as a last resort.
//!
//! # Guarantees
//!
//! - Chunk spans are non-overlapping, monotonically increasing byte ranges
//!   that partition the input exactly: concatenating `text[start..end]` over
//!   all chunks reconstructs the input.
//! - Every chunk's trimmed content is at most `max_chars` characters.
//! - Chunk sequences are contiguous: `0, 1, 2, …, N-1`.
//! - Empty (or whitespace-only) input yields an empty sequence, not an error.
//!
//! Input is expected to be already cleaned (markdown artifacts stripped) by
//! the caller; the chunker does no normalization of its own.

use crate::models::Chunk;

/// Default maximum chunk size, in characters of trimmed content.
pub const DEFAULT_MAX_CHARS: usize = 1000;

/// Split `text` into chunks of at most `max_chars` characters, preferring
/// paragraph and sentence boundaries.
///
/// `document_id` is stamped on every chunk as its source.
pub fn chunk_text(document_id: &str, text: &str, max_chars: usize) -> Vec<Chunk> {
    if text.trim().is_empty() || max_chars == 0 {
        return Vec::new();
    }

    let (paragraphs, sentences) = boundary_candidates(text);
    let len = text.len();
    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut start = 0usize;

    while start < len {
        let limit = byte_budget(text, start, max_chars);
        if limit >= len {
            spans.push((start, len));
            break;
        }
        let end = last_break_in(&paragraphs, start, limit)
            .or_else(|| last_break_in(&sentences, start, limit))
            .or_else(|| hard_split_at_whitespace(text, start, limit))
            .unwrap_or(limit);
        spans.push((start, end));
        start = end;
    }

    // Fold whitespace-only spans into their neighbors so the span sequence
    // still partitions the input while every chunk carries real content.
    let mut chunks: Vec<Chunk> = Vec::new();
    let mut pending_start: Option<usize> = None;
    for (i, &(s, e)) in spans.iter().enumerate() {
        let span_start = pending_start.take().unwrap_or(s);
        let content = text[span_start..e].trim();
        if content.is_empty() {
            if i + 1 < spans.len() {
                pending_start = Some(span_start);
            } else if let Some(prev) = chunks.last_mut() {
                prev.end = e;
            }
            continue;
        }
        chunks.push(Chunk {
            content: content.to_string(),
            start: span_start,
            end: e,
            sequence: chunks.len() as u32,
            source_document_id: document_id.to_string(),
        });
    }

    chunks
}

/// Collect cut candidates: positions after blank lines (paragraphs) and
/// after sentence terminators or single newlines (sentences). All positions
/// are valid `char` boundaries.
fn boundary_candidates(text: &str) -> (Vec<usize>, Vec<usize>) {
    let bytes = text.as_bytes();
    let mut paragraphs = Vec::new();
    for i in 0..bytes.len().saturating_sub(1) {
        if bytes[i] == b'\n' && bytes[i + 1] == b'\n' {
            paragraphs.push(i + 2);
        }
    }

    let mut sentences = Vec::new();
    let mut iter = text.char_indices().peekable();
    while let Some((i, c)) = iter.next() {
        match c {
            '.' | '!' | '?' => {
                if let Some(&(j, d)) = iter.peek() {
                    if d.is_whitespace() {
                        sentences.push(j);
                    }
                }
            }
            '\n' => sentences.push(i + 1),
            _ => {}
        }
    }

    (paragraphs, sentences)
}

/// Byte index of the position `max_chars` characters past `start`, or the
/// end of the text if fewer characters remain.
fn byte_budget(text: &str, start: usize, max_chars: usize) -> usize {
    let mut count = 0;
    for (i, _) in text[start..].char_indices() {
        if count == max_chars {
            return start + i;
        }
        count += 1;
    }
    text.len()
}

/// The furthest break position in `(start, limit]`, if any.
fn last_break_in(breaks: &[usize], start: usize, limit: usize) -> Option<usize> {
    let hi = breaks.partition_point(|&b| b <= limit);
    let lo = breaks.partition_point(|&b| b <= start);
    if hi > lo {
        Some(breaks[hi - 1])
    } else {
        None
    }
}

/// Last-resort split: cut after the last whitespace character before the
/// budget boundary, keeping words intact where possible.
fn hard_split_at_whitespace(text: &str, start: usize, limit: usize) -> Option<usize> {
    text[start..limit]
        .char_indices()
        .filter(|(_, c)| c.is_whitespace())
        .last()
        .map(|(i, c)| start + i + c.len_utf8())
}
