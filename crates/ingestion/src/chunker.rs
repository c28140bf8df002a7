//! Text chunking module
//!
//! Caps sections at a maximum word count, splitting oversized sections into
//! overlapping word windows. Every chunk keeps its parent section's
//! document, headings, page range and images.

use crate::errors::IngestionError;
use outlook_common::config::ChunkingConfig;
use outlook_common::models::{Chunk, Section};
use tracing::debug;

/// Default maximum words per chunk
pub const DEFAULT_MAX_WORDS: usize = 800;

/// Default words shared by consecutive windows
pub const DEFAULT_OVERLAP: usize = 100;

/// Split sections into chunks with ids assigned sequentially from 0
pub fn chunk(
    sections: &[Section],
    max_words: usize,
    overlap: usize,
) -> Result<Vec<Chunk>, IngestionError> {
    if max_words == 0 {
        return Err(IngestionError::ChunkingError(
            "max_words must be at least 1".to_string(),
        ));
    }
    if overlap >= max_words {
        return Err(IngestionError::ChunkingError(format!(
            "overlap ({}) must be smaller than max_words ({})",
            overlap, max_words
        )));
    }

    let mut chunks = Vec::with_capacity(sections.len());

    for section in sections {
        for text in split_words(&section.text, max_words, overlap) {
            let chunk_id = chunks.len();
            chunks.push(Chunk::from_section(section, chunk_id, text));
        }
    }

    debug!(
        sections = sections.len(),
        chunk_count = chunks.len(),
        max_words,
        overlap,
        "Sections chunked"
    );

    Ok(chunks)
}

/// [`chunk`] with parameters taken from configuration
pub fn chunk_sections(
    sections: &[Section],
    config: &ChunkingConfig,
) -> Result<Vec<Chunk>, IngestionError> {
    chunk(sections, config.max_words, config.overlap)
}

/// Window texts for one section. A section within the limit is returned
/// verbatim; otherwise windows advance by `max_words - overlap` and the
/// window reaching the last word is the final one.
fn split_words(text: &str, max_words: usize, overlap: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();

    if words.len() <= max_words {
        return vec![text.to_string()];
    }

    let step = max_words - overlap;
    let mut windows = Vec::with_capacity(words.len().div_ceil(step));
    let mut start = 0;

    while start < words.len() {
        let end = (start + max_words).min(words.len());
        windows.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }
        start += step;
    }

    windows
}
