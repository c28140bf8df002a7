//! Page records produced by a page source

use serde::{Deserialize, Serialize};

/// Text recognized from one image embedded in a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// 1-based page the image was found on
    pub page: u32,
    /// Where the cropped image was written
    pub image_path: String,
    /// OCR output, empty when OCR is disabled or found nothing
    pub ocr_text: String,
}

/// One page of one document, in reading order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    pub doc_name: String,
    /// 1-based page number
    pub page: u32,
    pub text: String,
    pub images: Vec<ImageRecord>,
}

impl PageRecord {
    pub fn new(doc_name: impl Into<String>, page: u32, text: impl Into<String>) -> Self {
        Self {
            doc_name: doc_name.into(),
            page,
            text: text.into(),
            images: Vec::new(),
        }
    }

    pub fn with_images(mut self, images: Vec<ImageRecord>) -> Self {
        self.images = images;
        self
    }
}
