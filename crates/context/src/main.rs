//! Outlook RAG Context
//!
//! Usage:
//! - `context run` answers the fixed forecast-versus-reality questions
//! - `context ask` reads questions from stdin until `exit`, `quit` or `q`

use outlook_common::config::{AppConfig, ObservabilityConfig};
use outlook_common::embeddings::create_embedder;
use outlook_common::{metrics, AppError, VERSION};
use outlook_context::{QuestionRunner, Synthesizer, QUESTIONS};
use outlook_search::{load_embedded_corpus, EmbeddingOptions, VectorRetriever};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

const RULE_WIDTH: usize = 90;

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

    let command = std::env::args().nth(1).unwrap_or_else(|| "ask".to_string());
    if command != "run" && command != "ask" {
        return Err(AppError::validation(
            format!("unknown command '{}', expected 'run' or 'ask'", command),
            Some("command"),
        )
        .into());
    }

    info!("Starting Outlook RAG Context v{}", VERSION);

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

    let runner = QuestionRunner::new(
        corpus,
        VectorRetriever::new(embedder, config.retrieval.top_k),
        Synthesizer::from_config(&config.llm)?,
    );

    if command == "run" {
        run_all(&runner).await;
    } else {
        ask_loop(&runner).await?;
    }

    Ok(())
}

async fn run_all(runner: &QuestionRunner) {
    println!("\n2025 Forecast vs Mid-Year Reality\n");
    println!("{}", "=".repeat(RULE_WIDTH));

    for (id, question) in QUESTIONS {
        println!("\n{}", id);
        println!("{}", "-".repeat(RULE_WIDTH));
        answer_and_print(runner, question).await;
        println!("\n{}", "=".repeat(RULE_WIDTH));
    }
}

async fn ask_loop(runner: &QuestionRunner) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("Question: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question.to_lowercase().as_str(), "exit" | "quit" | "q") {
            break;
        }

        answer_and_print(runner, question).await;
        println!("\n{}\n", "-".repeat(RULE_WIDTH));
    }

    Ok(())
}

async fn answer_and_print(runner: &QuestionRunner, question: &str) {
    match runner.answer(question).await {
        Ok(result) => {
            println!("{}", result.answer.answer);
            if !result.answer.cited.is_empty() {
                println!("\nCited:");
                for citation in &result.answer.cited {
                    println!("  [{}]", citation);
                }
            }
        }
        Err(e) => {
            tracing::error!(error = %e, code = e.code().as_code(), "Question failed");
            eprintln!("Error: {}", e);
        }
    }
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
