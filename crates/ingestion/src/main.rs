//! Outlook RAG Ingestion
//!
//! Usage: `ingestion [pdf...]`
//!
//! Extracts the configured (or given) PDFs, segments and chunks them and
//! writes the corpus snapshot read by `search` and `context`.

use outlook_common::config::{AppConfig, ObservabilityConfig};
use outlook_common::{metrics, VERSION};
use outlook_ingestion::{ImageTextRecognizer, IngestionProcessor, TesseractRecognizer};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    init_tracing(&config.observability);
    metrics::register_metrics();

    info!("Starting Outlook RAG Ingestion v{}", VERSION);

    let args: Vec<PathBuf> = std::env::args().skip(1).map(PathBuf::from).collect();
    let pdf_paths = if args.is_empty() {
        config.ingestion.pdf_paths.clone()
    } else {
        args
    };

    let recognizer: Option<Arc<dyn ImageTextRecognizer>> = if config.ingestion.use_ocr {
        Some(Arc::new(TesseractRecognizer::new(
            config.ingestion.ocr_command.clone(),
        )))
    } else {
        info!("OCR disabled, images are kept without text");
        None
    };

    let processor =
        IngestionProcessor::new(config.chunking.clone(), config.ingestion.snapshot_path.clone());

    let report = processor
        .process_local_pdfs(&pdf_paths, &config.ingestion.image_dir, recognizer)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Ingestion failed");
            e
        })?;

    println!(
        "Created {} semantic chunks from {} pages -> {}",
        report.chunks,
        report.pages,
        processor.snapshot_path().display()
    );

    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}
