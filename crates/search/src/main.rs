//! Outlook RAG Search
//!
//! Usage: `search "<query>" [top_k]`
//!
//! Loads the corpus snapshot, embeds any chunk still lacking a vector and
//! prints the best matching chunks with their citations.

use outlook_common::config::{AppConfig, ObservabilityConfig};
use outlook_common::embeddings::create_embedder;
use outlook_common::{metrics, AppError, VERSION};
use outlook_search::{load_embedded_corpus, EmbeddingOptions, VectorRetriever};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Characters of chunk text shown per result
const PREVIEW_CHARS: usize = 300;

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

    let mut args = std::env::args().skip(1);
    let query = args
        .next()
        .ok_or_else(|| AppError::validation("usage: search \"<query>\" [top_k]", Some("query")))?;
    let top_k = match args.next() {
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| AppError::validation(format!("invalid top_k '{}'", raw), Some("top_k")))?,
        None => config.retrieval.top_k,
    };

    info!("Starting Outlook RAG Search v{}", VERSION);

    let embedder = create_embedder(&config.embedding)?;
    let corpus = load_embedded_corpus(
        &config.ingestion.snapshot_path,
        embedder.as_ref(),
        EmbeddingOptions::from(&config.embedding),
    )
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to prepare corpus");
        e
    })?;

    let retriever = VectorRetriever::new(embedder, top_k);
    let results = retriever.retrieve(&corpus, &query).await?;

    if results.is_empty() {
        println!("No results.");
    }

    for result in results {
        let preview: String = result.chunk.text.chars().take(PREVIEW_CHARS).collect();
        println!("[{}] score={:.4}", result.chunk.citation(), result.score);
        println!("{}", preview);
        println!("{}", "-".repeat(80));
    }

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
