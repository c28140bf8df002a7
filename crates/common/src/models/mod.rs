//! Pipeline data model
//!
//! Pages come from a page source, sections from the segmenter and chunks
//! from the chunker. Chunks are the unit persisted in the corpus snapshot.

mod chunk;
mod page;
mod section;

pub use chunk::Chunk;
pub use page::{ImageRecord, PageRecord};
pub use section::{Section, SectionBuilder};
