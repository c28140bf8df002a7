//! Configuration management for Outlook RAG
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values
//!
//! Secrets are never read from ambient state after startup: the loaded
//! config is handed to the embedder and LLM client constructors.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use validator::{Validate, ValidationError};

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct AppConfig {
    /// Page extraction and snapshot location
    #[serde(default)]
    #[validate(nested)]
    pub ingestion: IngestionConfig,

    /// Section splitting parameters
    #[serde(default)]
    #[validate(nested)]
    pub chunking: ChunkingConfig,

    /// Embedding service configuration
    #[serde(default)]
    #[validate(nested)]
    pub embedding: EmbeddingConfig,

    /// Retrieval parameters
    #[serde(default)]
    #[validate(nested)]
    pub retrieval: RetrievalConfig,

    /// Answer synthesis (chat completion) configuration
    #[serde(default)]
    #[validate(nested)]
    pub llm: LlmConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct IngestionConfig {
    /// PDFs to ingest, in document order
    #[serde(default = "default_pdf_paths")]
    pub pdf_paths: Vec<PathBuf>,

    /// Directory receiving extracted page images
    #[serde(default = "default_image_dir")]
    pub image_dir: PathBuf,

    /// Run OCR over extracted images
    #[serde(default = "default_use_ocr")]
    pub use_ocr: bool,

    /// OCR binary invoked per image
    #[serde(default = "default_ocr_command")]
    pub ocr_command: String,

    /// Corpus snapshot written by ingestion and read by search
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[validate(schema(function = "validate_window"))]
pub struct ChunkingConfig {
    /// Maximum words per chunk
    #[serde(default = "default_max_words")]
    #[validate(range(min = 1))]
    pub max_words: usize,

    /// Words shared by consecutive windows of a split section
    #[serde(default = "default_overlap")]
    pub overlap: usize,

    /// Emit text found before a document's first heading as a heading-less section
    #[serde(default)]
    pub keep_preamble: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct EmbeddingConfig {
    /// Embedding provider: openai, mock
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for embedding service (falls back to OPENAI_API_KEY)
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension
    #[serde(default = "default_embedding_dimension")]
    #[validate(range(min = 1))]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Texts per embedding request
    #[serde(default = "default_batch_size")]
    #[validate(range(min = 1, max = 2048))]
    pub batch_size: usize,

    /// Embedding requests in flight at once
    #[serde(default = "default_concurrency")]
    #[validate(range(min = 1, max = 64))]
    pub concurrency: usize,

    /// Request rate ceiling (0 disables the limiter)
    #[serde(default)]
    pub requests_per_second: u32,

    /// Memoize embeddings by content hash within a process
    #[serde(default = "default_enabled")]
    pub cache: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct RetrievalConfig {
    /// Chunks handed to synthesis per question
    #[serde(default = "default_top_k")]
    #[validate(range(min = 1))]
    pub top_k: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct LlmConfig {
    /// Chat completions endpoint
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    /// API key (falls back to OPENAI_API_KEY)
    pub api_key: Option<String>,

    /// Model name
    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default)]
    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: f32,

    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Give up retrying transient failures after this many seconds
    #[serde(default = "default_llm_retry_window")]
    pub max_retry_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level or filter directive (debug, info, outlook_search=debug)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logging: bool,
}

// Default value functions
fn default_pdf_paths() -> Vec<PathBuf> {
    vec![
        PathBuf::from("data/raw/outlook_2025.pdf"),
        PathBuf::from("data/raw/midyear_2025.pdf"),
    ]
}
fn default_image_dir() -> PathBuf { PathBuf::from("data/images") }
fn default_use_ocr() -> bool { true }
fn default_ocr_command() -> String { "tesseract".to_string() }
fn default_snapshot_path() -> PathBuf { PathBuf::from("data/processed/semantic_chunks.json") }
fn default_max_words() -> usize { 800 }
fn default_overlap() -> usize { 100 }
fn default_embedding_provider() -> String { "openai".to_string() }
fn default_embedding_model() -> String { crate::DEFAULT_EMBEDDING_MODEL.to_string() }
fn default_embedding_dimension() -> usize { crate::DEFAULT_EMBEDDING_DIMENSION }
fn default_embedding_timeout() -> u64 { 30 }
fn default_batch_size() -> usize { 64 }
fn default_concurrency() -> usize { 4 }
fn default_enabled() -> bool { true }
fn default_top_k() -> usize { 8 }
fn default_llm_endpoint() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_llm_model() -> String { "gpt-4o-mini".to_string() }
fn default_llm_timeout() -> u64 { 60 }
fn default_llm_retry_window() -> u64 { 120 }
fn default_log_level() -> String { "info".to_string() }

fn validate_window(config: &ChunkingConfig) -> Result<(), ValidationError> {
    if config.overlap >= config.max_words {
        let mut err = ValidationError::new("overlap_not_below_max_words");
        err.message = Some("chunking.overlap must be smaller than chunking.max_words".into());
        return Err(err);
    }
    Ok(())
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // e.g., APP__CHUNKING__MAX_WORDS=600
            .add_source(Self::environment())
            .build()?;

        Self::finish(config.try_deserialize()?)
    }

    fn environment() -> Environment {
        Environment::with_prefix("APP")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("ingestion.pdf_paths")
    }

    fn finish(mut config: Self) -> Result<Self, ConfigError> {
        config.resolve_api_keys(std::env::var("OPENAI_API_KEY").ok());
        config
            .validate()
            .map_err(|e| ConfigError::Message(e.to_string()))?;
        Ok(config)
    }

    /// Fill unset API keys from the conventional OpenAI variable
    pub fn resolve_api_keys(&mut self, fallback: Option<String>) {
        let fallback = fallback.filter(|k| !k.trim().is_empty());
        if self.embedding.api_key.is_none() {
            self.embedding.api_key = fallback.clone();
        }
        if self.llm.api_key.is_none() {
            self.llm.api_key = fallback;
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            pdf_paths: default_pdf_paths(),
            image_dir: default_image_dir(),
            use_ocr: default_use_ocr(),
            ocr_command: default_ocr_command(),
            snapshot_path: default_snapshot_path(),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_words: default_max_words(),
            overlap: default_overlap(),
            keep_preamble: false,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
            batch_size: default_batch_size(),
            concurrency: default_concurrency(),
            requests_per_second: 0,
            cache: default_enabled(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: default_top_k() }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            api_key: None,
            model: default_llm_model(),
            temperature: 0.0,
            timeout_secs: default_llm_timeout(),
            max_retry_secs: default_llm_retry_window(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.chunking.max_words, 800);
        assert_eq!(config.chunking.overlap, 100);
        assert_eq!(config.retrieval.top_k, 8);
        assert_eq!(config.embedding.model, "text-embedding-3-small");
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overlap_must_be_below_max_words() {
        let mut config = AppConfig::default();
        config.chunking.overlap = config.chunking.max_words;
        assert!(config.validate().is_err());

        config.chunking.overlap = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_api_key_fallback() {
        let mut config = AppConfig::default();
        config.llm.api_key = Some("llm-key".to_string());
        config.resolve_api_keys(Some("shared-key".to_string()));

        assert_eq!(config.embedding.api_key.as_deref(), Some("shared-key"));
        assert_eq!(config.llm.api_key.as_deref(), Some("llm-key"));
    }

    #[test]
    fn test_blank_fallback_is_ignored() {
        let mut config = AppConfig::default();
        config.resolve_api_keys(Some("   ".to_string()));
        assert!(config.embedding.api_key.is_none());
    }
}
