//! Image text recognition

use crate::errors::IngestionError;
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

/// Reads the text printed in an image file
#[async_trait]
pub trait ImageTextRecognizer: Send + Sync {
    async fn recognize(&self, image: &Path) -> Result<String, IngestionError>;
}

/// Runs the `tesseract` command line tool, reading its output from stdout
pub struct TesseractRecognizer {
    command: String,
}

impl TesseractRecognizer {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Default for TesseractRecognizer {
    fn default() -> Self {
        Self::new("tesseract")
    }
}

#[async_trait]
impl ImageTextRecognizer for TesseractRecognizer {
    async fn recognize(&self, image: &Path) -> Result<String, IngestionError> {
        let ocr_error = |message: String| IngestionError::OcrError {
            path: image.display().to_string(),
            message,
        };

        let output = Command::new(&self.command)
            .arg(image)
            .arg("stdout")
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ocr_error(format!("failed to run {}: {}", self.command, e)))?;

        if !output.status.success() {
            return Err(ocr_error(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!(image = %image.display(), chars = text.len(), "Image text recognized");
        Ok(text)
    }
}
