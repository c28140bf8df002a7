//! Question routing
//!
//! A question is classified once into a [`QuestionKind`], which decides both
//! the documents searched and the extra answer rules given to the model.

use outlook_common::{MIDYEAR_2025, OUTLOOK_2025};
use serde::Serialize;

/// Analyst question families with dedicated answer rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    /// "According to Outlook 2025 ..."
    OutlookThemes,
    /// "According to Mid-Year Outlook 2025 ..."
    MidyearComparison,
    /// "Identify at least two named stocks ..."
    NamedStocks,
    /// "What valuation or risk concerns ..."
    RiskConcerns,
    /// "Produce a table ..."
    ComparisonTable,
    General,
}

/// Documents a question is answered from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentScope {
    Both,
    OutlookOnly,
    MidyearOnly,
}

impl DocumentScope {
    pub fn docs(self) -> &'static [&'static str] {
        match self {
            DocumentScope::Both => &[OUTLOOK_2025, MIDYEAR_2025],
            DocumentScope::OutlookOnly => &[OUTLOOK_2025],
            DocumentScope::MidyearOnly => &[MIDYEAR_2025],
        }
    }
}

impl QuestionKind {
    /// Classify by the question's opening words, ignoring case
    pub fn classify(question: &str) -> Self {
        let q = question.trim_start().to_lowercase();

        if q.starts_with("according to outlook 2025") {
            QuestionKind::OutlookThemes
        } else if q.starts_with("according to mid-year outlook 2025") {
            QuestionKind::MidyearComparison
        } else if q.starts_with("identify at least two named stocks") {
            QuestionKind::NamedStocks
        } else if q.starts_with("what valuation or risk concerns") {
            QuestionKind::RiskConcerns
        } else if q.starts_with("produce a table") {
            QuestionKind::ComparisonTable
        } else {
            QuestionKind::General
        }
    }

    /// Extra answer rules, one per line
    pub fn rules(self) -> &'static [&'static str] {
        match self {
            QuestionKind::OutlookThemes => &[
                "Identify major equity themes.",
                "Group related statements into coherent themes.",
                "List specific stocks or stock groups explicitly mentioned.",
            ],
            QuestionKind::MidyearComparison => &[
                "Compare forecast expectations with mid-year outcomes.",
                "If mid-year language confirms strength or resilience, mark as \"played out as expected\".",
                "If it mentions underperformance, volatility, or concern, mark as \"underperformed or disappointed\".",
                "Do NOT say \"Not stated\" if comparative evidence exists across documents.",
            ],
            QuestionKind::NamedStocks => &[
                "Identify at least two explicitly named stocks.",
                "Describe their 2025 forecast view.",
                "Describe how they are discussed at mid-year.",
            ],
            QuestionKind::RiskConcerns => &[
                "Identify risks mentioned at the start of 2025.",
                "Explicitly state which risks materialized by mid-year.",
            ],
            QuestionKind::ComparisonTable => &[
                "Produce a table with AT LEAST three rows.",
                "Each row must represent a stock or investment theme.",
                "Use both Outlook 2025 and Mid-Year 2025.",
                "\"Supported = Yes\" only if mid-year evidence confirms the forecast.",
                "\"Supported = No\" if it weakens or contradicts the forecast.",
                "Every row MUST have citations.",
                "Do NOT return a placeholder or empty table.",
            ],
            QuestionKind::General => &[],
        }
    }
}

/// Documents to search for a question.
///
/// Questions opening with "According to Mid-Year Outlook" or "Produce a
/// table" compare both documents. Otherwise a mention of "mid-year" selects
/// the mid-year review, a mention of "forecast" or "outlook" selects the
/// annual outlook, and anything else searches both.
pub fn route(question: &str) -> DocumentScope {
    let q = question.trim_start().to_lowercase();

    if q.starts_with("according to mid-year outlook") || q.starts_with("produce a table") {
        DocumentScope::Both
    } else if q.contains("mid-year") {
        DocumentScope::MidyearOnly
    } else if q.contains("forecast") || q.contains("outlook") {
        DocumentScope::OutlookOnly
    } else {
        DocumentScope::Both
    }
}
