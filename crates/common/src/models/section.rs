//! Sections: the text between one heading and the next

use super::ImageRecord;
use serde::{Deserialize, Serialize};

/// A finished section. Only the segmenter creates these, through [`SectionBuilder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: usize,
    pub doc_name: String,
    /// `None` only for a preamble section (text before the first heading)
    pub heading: Option<String>,
    pub subheading: Option<String>,
    pub text: String,
    pub images: Vec<ImageRecord>,
    pub page_start: u32,
    pub page_end: u32,
}

/// Accumulates the lines of the section currently open in the segmenter
#[derive(Debug)]
pub struct SectionBuilder {
    doc_name: String,
    heading: Option<String>,
    subheading: Option<String>,
    text: String,
    images: Vec<ImageRecord>,
    page_start: u32,
    page_end: u32,
}

impl SectionBuilder {
    /// Open a section at `heading` on `page`
    pub fn new(doc_name: impl Into<String>, heading: Option<String>, page: u32) -> Self {
        Self {
            doc_name: doc_name.into(),
            heading,
            subheading: None,
            text: String::new(),
            images: Vec::new(),
            page_start: page,
            page_end: page,
        }
    }

    pub fn doc_name(&self) -> &str {
        &self.doc_name
    }

    pub fn set_subheading(&mut self, subheading: impl Into<String>) {
        self.subheading = Some(subheading.into());
    }

    /// Append a body line followed by a single space
    pub fn push_line(&mut self, line: &str, page: u32) {
        self.text.push_str(line);
        self.text.push(' ');
        self.page_end = self.page_end.max(page);
    }

    pub fn extend_images(&mut self, images: impl IntoIterator<Item = ImageRecord>) {
        self.images.extend(images);
    }

    /// Close the section under the given id
    pub fn finish(self, id: usize) -> Section {
        Section {
            id,
            doc_name: self.doc_name,
            heading: self.heading,
            subheading: self.subheading,
            text: self.text,
            images: self.images,
            page_start: self.page_start,
            page_end: self.page_end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_tracks_page_range() {
        let mut builder = SectionBuilder::new("outlook_2025", Some("EQUITY OUTLOOK".into()), 3);
        builder.push_line("Stocks rallied.", 3);
        builder.push_line("Earnings grew.", 5);
        builder.set_subheading("1 Market Summary");

        let section = builder.finish(7);
        assert_eq!(section.id, 7);
        assert_eq!(section.page_start, 3);
        assert_eq!(section.page_end, 5);
        assert_eq!(section.text, "Stocks rallied. Earnings grew. ");
        assert_eq!(section.subheading.as_deref(), Some("1 Market Summary"));
    }
}
