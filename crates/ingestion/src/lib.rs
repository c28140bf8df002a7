//! Outlook RAG Ingestion Library
//!
//! Turns PDF outlooks into a chunk snapshot:
//! 1. Extracts page text and images (with OCR) from each PDF
//! 2. Segments pages into heading-delimited sections
//! 3. Chunks sections into overlapping word windows
//! 4. Writes the corpus snapshot

pub mod chunker;
pub mod errors;
pub mod ocr;
pub mod pdf;
pub mod processor;
pub mod segmenter;
pub mod source;

pub use chunker::chunk;
pub use errors::IngestionError;
pub use ocr::{ImageTextRecognizer, TesseractRecognizer};
pub use pdf::PdfPageSource;
pub use processor::{IngestionProcessor, IngestionReport};
pub use segmenter::{segment, segment_with, Segmentation, SegmenterConfig};
pub use source::PageSource;
