//! Question runner
//!
//! Route, filter, retrieve, synthesize. Retrieval failures are returned to
//! the caller and never reach the model.

use crate::router::{route, DocumentScope, QuestionKind};
use crate::synthesizer::{SynthesizedAnswer, Synthesizer};
use outlook_common::errors::Result;
use outlook_common::models::Chunk;
use outlook_search::VectorRetriever;
use serde::Serialize;
use tracing::{info, instrument};

/// The fixed analyst questions comparing the 2025 forecast with mid-year reality
pub const QUESTIONS: [(&str, &str); 5] = [
    (
        "Q1",
        "According to Outlook 2025:\n\
         Which equity market themes were expected to perform well in 2025?\n\
         Which specific stocks or groups of stocks were highlighted?",
    ),
    (
        "Q2",
        "According to Mid-Year Outlook 2025:\n\
         Which forecasted themes played out as expected?\n\
         Which underperformed or disappointed?",
    ),
    (
        "Q3",
        "Identify at least two named stocks such as Apple, Microsoft, or NVIDIA.\n\
         What was stated about them in the 2025 forecast?\n\
         How are they described at mid-year 2025?",
    ),
    (
        "Q4",
        "What valuation or risk concerns were highlighted at the start of 2025?\n\
         Which of those risks materialized by mid-year, according to J.P. Morgan?",
    ),
    (
        "Q5",
        "Produce a table with the following columns:\n\
         | Stock / Theme | 2025 Forecast View | Mid-Year 2025 Reality | Supported? (Yes/No) | Citation |\n\
         Use only information explicitly stated in the documents.",
    ),
];

/// One answered question
#[derive(Debug, Clone, Serialize)]
pub struct QuestionAnswer {
    pub question: String,
    pub kind: QuestionKind,
    pub scope: DocumentScope,
    /// Chunks handed to the model
    pub retrieved: usize,
    #[serde(flatten)]
    pub answer: SynthesizedAnswer,
}

pub struct QuestionRunner {
    corpus: Vec<Chunk>,
    retriever: VectorRetriever,
    synthesizer: Synthesizer,
}

impl QuestionRunner {
    /// `corpus` must already be embedded with the retriever's embedder
    pub fn new(corpus: Vec<Chunk>, retriever: VectorRetriever, synthesizer: Synthesizer) -> Self {
        Self {
            corpus,
            retriever,
            synthesizer,
        }
    }

    #[instrument(skip_all, fields(kind, scope))]
    pub async fn answer(&self, question: &str) -> Result<QuestionAnswer> {
        let kind = QuestionKind::classify(question);
        let scope = route(question);
        tracing::Span::current()
            .record("kind", tracing::field::debug(kind))
            .record("scope", tracing::field::debug(scope));

        let retrieved = self
            .retriever
            .retrieve_from(&self.corpus, scope.docs(), question)
            .await?;

        info!(retrieved = retrieved.len(), "Context retrieved");

        let answer = self.synthesizer.synthesize(question, kind, &retrieved).await?;

        Ok(QuestionAnswer {
            question: question.to_string(),
            kind,
            scope,
            retrieved: retrieved.len(),
            answer,
        })
    }
}
