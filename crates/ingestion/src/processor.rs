//! Ingestion processor
//!
//! Core pipeline: page extraction, segmentation, chunking and snapshot write.

use crate::chunker::chunk_sections;
use crate::errors::IngestionError;
use crate::ocr::ImageTextRecognizer;
use crate::pdf::PdfPageSource;
use crate::segmenter::{segment_with, SegmenterConfig};
use crate::source::PageSource;
use outlook_common::config::ChunkingConfig;
use outlook_common::corpus::save_corpus;
use outlook_common::metrics;
use outlook_common::models::{Chunk, PageRecord};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Counts from one ingestion run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestionReport {
    pub documents: usize,
    pub pages: usize,
    pub sections: usize,
    pub orphan_lines: usize,
    pub chunks: usize,
}

/// Ingestion processor
pub struct IngestionProcessor {
    chunking: ChunkingConfig,
    snapshot_path: PathBuf,
}

impl IngestionProcessor {
    pub fn new(chunking: ChunkingConfig, snapshot_path: impl Into<PathBuf>) -> Self {
        Self {
            chunking,
            snapshot_path: snapshot_path.into(),
        }
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Segment and chunk pages already extracted, in the order given
    pub fn build_corpus(
        &self,
        pages: &[PageRecord],
    ) -> Result<(Vec<Chunk>, IngestionReport), IngestionError> {
        let segmentation = segment_with(
            pages,
            SegmenterConfig {
                keep_preamble: self.chunking.keep_preamble,
            },
        );
        let chunks = chunk_sections(&segmentation.sections, &self.chunking)?;

        let mut documents: Vec<&str> = pages.iter().map(|p| p.doc_name.as_str()).collect();
        documents.dedup();

        let report = IngestionReport {
            documents: documents.len(),
            pages: pages.len(),
            sections: segmentation.sections.len(),
            orphan_lines: segmentation.orphan_lines,
            chunks: chunks.len(),
        };

        Ok((chunks, report))
    }

    /// Read every source in order, build the corpus and write the snapshot
    #[instrument(skip(self, sources), fields(sources = sources.len(), snapshot = %self.snapshot_path.display()))]
    pub async fn ingest(
        &self,
        sources: &[Arc<dyn PageSource>],
    ) -> Result<IngestionReport, IngestionError> {
        let mut pages = Vec::new();

        for source in sources {
            debug!(source = %source.name(), "Reading pages");
            pages.extend(source.pages().await?);
        }

        let (chunks, report) = self.build_corpus(&pages)?;

        metrics::record_ingestion(report.pages, report.sections, report.orphan_lines, report.chunks);

        save_corpus(&self.snapshot_path, &chunks).await?;

        info!(
            documents = report.documents,
            pages = report.pages,
            sections = report.sections,
            chunks = report.chunks,
            "Ingestion complete"
        );

        Ok(report)
    }

    /// Ingest local PDF files; document names come from the file names
    pub async fn process_local_pdfs(
        &self,
        paths: &[PathBuf],
        image_dir: &Path,
        recognizer: Option<Arc<dyn ImageTextRecognizer>>,
    ) -> Result<IngestionReport, IngestionError> {
        let sources: Vec<Arc<dyn PageSource>> = paths
            .iter()
            .map(|path| {
                Arc::new(PdfPageSource::new(path, image_dir, recognizer.clone()))
                    as Arc<dyn PageSource>
            })
            .collect();

        self.ingest(&sources).await
    }
}
