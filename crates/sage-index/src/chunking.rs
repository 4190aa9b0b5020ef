//! Document chunking for ingestion.
//!
//! Splits extracted document text into overlapping chunks sized for the
//! embedding model. Paragraph boundaries are preferred; paragraphs that
//! exceed the size limit fall back to a fixed sliding window with overlap.

use sage_core::defaults::{CHUNK_OVERLAP, CHUNK_SIZE};

/// Configuration for text chunking.
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Maximum size of a chunk in bytes (at UTF-8 boundaries).
    pub max_chunk_size: usize,
    /// Bytes of overlap between adjacent window chunks.
    pub overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: CHUNK_SIZE,
            overlap: CHUNK_OVERLAP,
        }
    }
}

/// Split text into chunks, preferring paragraph boundaries.
///
/// Adjacent paragraphs are packed into one chunk while they fit; an
/// oversized paragraph is split by [`sliding_window`]. Blank input yields
/// no chunks.
pub fn split_text(text: &str, config: &ChunkerConfig) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        if paragraph.len() > config.max_chunk_size {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            chunks.extend(sliding_window(paragraph, config));
            continue;
        }

        if current.is_empty() {
            current = paragraph.to_string();
        } else if current.len() + 2 + paragraph.len() <= config.max_chunk_size {
            current.push_str("\n\n");
            current.push_str(paragraph);
        } else {
            chunks.push(std::mem::take(&mut current));
            current = paragraph.to_string();
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Fixed-size chunks with overlap, cut at UTF-8 boundaries.
fn sliding_window(text: &str, config: &ChunkerConfig) -> Vec<String> {
    let step = config
        .max_chunk_size
        .saturating_sub(config.overlap)
        .max(1);

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + config.max_chunk_size).min(text.len());
        end = char_boundary_before(text, end);

        if end > start {
            chunks.push(text[start..end].to_string());
        }
        if end >= text.len() {
            break;
        }

        start += step;
        start = char_boundary_after(text, start);
    }

    chunks
}

fn char_boundary_before(text: &str, mut pos: usize) -> usize {
    while pos > 0 && !text.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

fn char_boundary_after(text: &str, mut pos: usize) -> usize {
    while pos < text.len() && !text.is_char_boundary(pos) {
        pos += 1;
    }
    pos
}
