//! Outlook RAG Context Library
//!
//! Answers analyst questions over the embedded corpus:
//! - Question classification and document routing
//! - Cited answer synthesis through a chat model
//! - The fixed forecast-versus-reality question set

pub mod router;
pub mod runner;
pub mod synthesizer;

pub use router::{route, DocumentScope, QuestionKind};
pub use runner::{QuestionAnswer, QuestionRunner, QUESTIONS};
pub use synthesizer::{ChatModel, OpenAIChatModel, SynthesizedAnswer, Synthesizer};
