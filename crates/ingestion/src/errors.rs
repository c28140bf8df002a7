//! Ingestion error types

use outlook_common::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("PDF parse error for {path}: {message}")]
    PdfParseError { path: String, message: String },

    #[error("Chunking error: {0}")]
    ChunkingError(String),

    #[error("OCR error for {path}: {message}")]
    OcrError { path: String, message: String },

    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Failure raised by the shared library, such as a snapshot write
    #[error(transparent)]
    Common(#[from] AppError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<IngestionError> for AppError {
    fn from(e: IngestionError) -> Self {
        match e {
            IngestionError::PdfParseError { path, message } => AppError::Extraction {
                source_path: path,
                message,
            },
            IngestionError::FileNotFound(path) => AppError::Extraction {
                message: "file not found".to_string(),
                source_path: path,
            },
            IngestionError::ChunkingError(message) => AppError::Validation {
                message,
                field: Some("chunking".to_string()),
            },
            IngestionError::Common(inner) => inner,
            IngestionError::IoError(e) => AppError::Io(e),
            other @ IngestionError::OcrError { .. } => AppError::Internal {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outlook_common::errors::ErrorCode;

    #[test]
    fn test_unreadable_pdf_maps_to_extraction() {
        let err: AppError = IngestionError::PdfParseError {
            path: "data/raw/outlook_2025.pdf".to_string(),
            message: "bad xref".to_string(),
        }
        .into();
        assert_eq!(err.code(), ErrorCode::ExtractionError);
    }

    #[test]
    fn test_common_error_passes_through() {
        let err: AppError = IngestionError::from(AppError::Snapshot {
            path: "data/processed/semantic_chunks.json".to_string(),
            message: "disk full".to_string(),
        })
        .into();
        assert_eq!(err.code(), ErrorCode::SnapshotError);
    }

    #[test]
    fn test_chunking_maps_to_validation() {
        let err: AppError = IngestionError::ChunkingError("overlap".to_string()).into();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }
}
