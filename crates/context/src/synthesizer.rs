//! LLM Synthesizer - Generates cited answers from retrieved chunks
//!
//! Provides:
//! - Prompt construction from citation-labelled context blocks
//! - A chat-completion client retried with exponential backoff
//! - Extraction of the context citations referenced by the answer

use crate::router::QuestionKind;
use async_trait::async_trait;
use backoff::ExponentialBackoff;
use outlook_common::config::LlmConfig;
use outlook_common::errors::{AppError, Result};
use outlook_common::models::Chunk;
use outlook_search::ScoredChunk;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, instrument, warn};

// Citation hint uses the hyphen of `Chunk::citation` so the model copies
// context labels verbatim; `extract_citations` still accepts an en dash.
const GLOBAL_RULES: &[&str] = &[
    "Use ONLY the provided context.",
    "You MAY synthesize across multiple excerpts and pages.",
    "Do NOT introduce external knowledge.",
    "Every factual claim MUST include a citation (Document | Page X-Y).",
    "If evidence truly does not exist, say \"Not stated in the documents\".",
];

/// Synthesized answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesizedAnswer {
    /// Generated answer text
    pub answer: String,

    /// Citations of the context blocks, in retrieval order
    pub sources: Vec<String>,

    /// Sources whose document and page range the answer refers to
    pub cited: Vec<String>,
}

/// A chat model answering a single user prompt
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;

    fn model_name(&self) -> &str;
}

/// OpenAI-compatible chat completion client
pub struct OpenAIChatModel {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_retry: Duration,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

impl OpenAIChatModel {
    /// Create a new chat client; the API key is required
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| AppError::Configuration {
            message: "LLM API key required (llm.api_key or OPENAI_API_KEY)".to_string(),
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_retry: Duration::from_secs(config.max_retry_secs),
        })
    }

    async fn request(&self, prompt: &str) -> std::result::Result<String, backoff::Error<AppError>> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                backoff::Error::transient(AppError::Synthesis {
                    message: format!("LLM API request failed: {}", e),
                })
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = AppError::Synthesis {
                message: format!("LLM API error {}: {}", status, body),
            };
            return if status.as_u16() == 429 || status.is_server_error() {
                Err(backoff::Error::transient(err))
            } else {
                Err(backoff::Error::permanent(err))
            };
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            backoff::Error::permanent(AppError::Synthesis {
                message: format!("Failed to parse LLM response: {}", e),
            })
        })?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| {
                backoff::Error::permanent(AppError::Synthesis {
                    message: "Empty response from LLM".to_string(),
                })
            })
    }
}

#[async_trait]
impl ChatModel for OpenAIChatModel {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let policy = ExponentialBackoff {
            max_elapsed_time: Some(self.max_retry),
            ..ExponentialBackoff::default()
        };

        backoff::future::retry_notify(
            policy,
            || self.request(prompt),
            |err: AppError, wait: Duration| {
                warn!(error = %err, retry_in_ms = wait.as_millis() as u64, "LLM request failed, retrying");
            },
        )
        .await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Synthesizer for generating answers
pub struct Synthesizer {
    model: Arc<dyn ChatModel>,
}

impl Synthesizer {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Create a synthesizer backed by the configured chat completion endpoint
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(OpenAIChatModel::new(config)?)))
    }

    /// Answer `question` from the retrieved chunks
    #[instrument(skip_all, fields(model = self.model.model_name(), context_chunks = retrieved.len()))]
    pub async fn synthesize(
        &self,
        question: &str,
        kind: QuestionKind,
        retrieved: &[ScoredChunk<'_>],
    ) -> Result<SynthesizedAnswer> {
        let chunks: Vec<&Chunk> = retrieved.iter().map(|r| r.chunk).collect();
        let prompt = build_prompt(question, kind, &chunks);
        debug!(prompt_chars = prompt.len(), ?kind, "Prompt built");

        let answer = self.model.complete(&prompt).await?;

        let mut sources: Vec<String> = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let citation = chunk.citation();
            if !sources.contains(&citation) {
                sources.push(citation);
            }
        }
        let cited = extract_citations(&answer, &chunks);

        Ok(SynthesizedAnswer {
            answer,
            sources,
            cited,
        })
    }
}

/// Context blocks `[citation]\ntext\n\n` in retrieval order
pub fn build_context(chunks: &[&Chunk]) -> String {
    chunks
        .iter()
        .map(|c| format!("[{}]\n{}\n\n", c.citation(), c.text))
        .collect()
}

fn bullets(rules: &[&str]) -> String {
    rules.iter().map(|r| format!("- {}\n", r)).collect()
}

pub fn build_prompt(question: &str, kind: QuestionKind, chunks: &[&Chunk]) -> String {
    format!(
        "You are a financial research assistant.\n\n\
         GLOBAL RULES:\n{}\n\
         QUESTION-SPECIFIC RULES:\n{}\n\
         Question:\n{}\n\n\
         Context:\n{}\n\
         Answer:\n",
        bullets(GLOBAL_RULES),
        bullets(kind.rules()),
        question,
        build_context(chunks)
    )
}

fn page_reference() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"([a-z]+_\d{4})[^\n\]\)]*?Pages?\s*(\d+)\s*(?:[-\x{2013}]\s*(\d+))?")
            .expect("valid page reference pattern")
    })
}

/// Citations of the context chunks referenced by document and pages in `answer`,
/// deduplicated, in order of first reference
pub fn extract_citations(answer: &str, chunks: &[&Chunk]) -> Vec<String> {
    let mut cited = Vec::new();

    for cap in page_reference().captures_iter(answer) {
        let (Some(doc), Some(start)) = (cap.get(1), cap.get(2)) else {
            continue;
        };
        let Ok(start) = start.as_str().parse::<u32>() else {
            continue;
        };
        let end = cap
            .get(3)
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .unwrap_or(start);

        for chunk in chunks {
            if chunk.doc_name == doc.as_str()
                && chunk.page_start == start
                && chunk.page_end == end
            {
                let citation = chunk.citation();
                if !cited.contains(&citation) {
                    cited.push(citation);
                }
            }
        }
    }

    cited
}
