//! Page sources
//!
//! A page source yields the pages of one document in reading order.

use crate::errors::IngestionError;
use async_trait::async_trait;
use outlook_common::models::PageRecord;

#[async_trait]
pub trait PageSource: Send + Sync {
    /// Name used in logs
    fn name(&self) -> String;

    /// All pages, in order
    async fn pages(&self) -> Result<Vec<PageRecord>, IngestionError>;
}

/// Pages already in memory
#[async_trait]
impl PageSource for Vec<PageRecord> {
    fn name(&self) -> String {
        self.first()
            .map(|p| p.doc_name.clone())
            .unwrap_or_else(|| "empty".to_string())
    }

    async fn pages(&self) -> Result<Vec<PageRecord>, IngestionError> {
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_source() {
        let source = vec![
            PageRecord::new("midyear_2025", 1, "MID-YEAR REVIEW"),
            PageRecord::new("midyear_2025", 2, "rates held"),
        ];
        assert_eq!(source.name(), "midyear_2025");
        let pages = source.pages().await.unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].page, 2);
    }
}
