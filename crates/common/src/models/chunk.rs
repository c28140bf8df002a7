//! Citable chunk with a write-once embedding

use super::{ImageRecord, Section};
use serde::{Deserialize, Serialize};

/// Bounded-size excerpt of one section, the unit of retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: usize,
    pub doc_name: String,
    pub heading: Option<String>,
    pub subheading: Option<String>,
    pub text: String,
    /// Copied from the parent section, not narrowed to this window
    pub images: Vec<ImageRecord>,
    pub page_start: u32,
    pub page_end: u32,
    #[serde(default)]
    embedding: Option<Vec<f32>>,
}

impl Chunk {
    /// Derive a chunk carrying `text` and the rest of `section`'s metadata
    pub fn from_section(section: &Section, chunk_id: usize, text: String) -> Self {
        Self {
            chunk_id,
            doc_name: section.doc_name.clone(),
            heading: section.heading.clone(),
            subheading: section.subheading.clone(),
            text,
            images: section.images.clone(),
            page_start: section.page_start,
            page_end: section.page_end,
            embedding: None,
        }
    }

    pub fn embedding(&self) -> Option<&[f32]> {
        self.embedding.as_deref()
    }

    pub fn has_embedding(&self) -> bool {
        self.embedding.is_some()
    }

    /// Store the embedding unless one is already present.
    /// Returns whether the vector was stored.
    pub fn set_embedding(&mut self, embedding: Vec<f32>) -> bool {
        if self.embedding.is_some() {
            return false;
        }
        self.embedding = Some(embedding);
        true
    }

    /// Builder-style variant of [`Chunk::set_embedding`]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.set_embedding(embedding);
        self
    }

    /// Text sent to the embedding service: heading, subheading, body and
    /// every image's OCR text, skipping empty fields, joined by single spaces
    pub fn search_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(3 + self.images.len());
        if let Some(heading) = self.heading.as_deref().filter(|h| !h.is_empty()) {
            parts.push(heading);
        }
        if let Some(subheading) = self.subheading.as_deref().filter(|s| !s.is_empty()) {
            parts.push(subheading);
        }
        if !self.text.is_empty() {
            parts.push(&self.text);
        }
        parts.extend(
            self.images
                .iter()
                .map(|img| img.ocr_text.as_str())
                .filter(|t| !t.is_empty()),
        );
        parts.join(" ")
    }

    /// `"{doc_name} | {heading} | Pages {page_start}-{page_end}"`
    pub fn citation(&self) -> String {
        format!(
            "{} | {} | Pages {}-{}",
            self.doc_name,
            self.heading.as_deref().unwrap_or("N/A"),
            self.page_start,
            self.page_end
        )
    }
}
