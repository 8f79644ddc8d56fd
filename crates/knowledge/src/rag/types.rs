//! Pipeline report types.

use crate::types::{
    CitedAnswer, CollectionOutcome, Degradation, RetrievedPassage, RoutingDecision,
    RoutingStrategy,
};
use serde::{Deserialize, Serialize};

/// Snippet length shown for cited passages.
pub const SNIPPET_MAX_CHARS: usize = 240;

/// A passage the answer cites.
///
/// `index` is the 1-based position the synthesizer saw it at, which is also
/// its position in [`AnswerReport::all_retrieved_passages`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitedPassage {
    pub index: usize,

    /// Formatted source, e.g. "Article L1221-19 (Code du travail)"
    pub citation: String,

    /// Légifrance link, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Start of the passage text
    pub snippet: String,

    pub passage: RetrievedPassage,
}

/// Everything `answer_query` returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerReport {
    pub request_id: String,
    pub query: String,

    pub answer: String,

    /// In [0, 1]
    pub confidence: f32,

    /// Subset of `all_retrieved_passages`, ordered by index
    pub cited_passages: Vec<CitedPassage>,

    /// Merged result set, best first
    pub all_retrieved_passages: Vec<RetrievedPassage>,

    pub routing_strategy: RoutingStrategy,

    pub sector_id: Option<String>,

    pub routing_rationale: String,
    pub synthesis_rationale: String,

    /// Every fallback taken during the run
    #[serde(default)]
    pub degradations: Vec<Degradation>,

    /// Per-collection call outcomes, in call order
    #[serde(default)]
    pub collections: Vec<CollectionOutcome>,
}

impl AnswerReport {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        request_id: String,
        query: &str,
        routing: RoutingDecision,
        passages: Vec<RetrievedPassage>,
        collections: Vec<CollectionOutcome>,
        answer: CitedAnswer,
        cited_passages: Vec<CitedPassage>,
        degradations: Vec<Degradation>,
    ) -> Self {
        Self {
            request_id,
            query: query.to_string(),
            answer: answer.answer_text,
            confidence: answer.confidence,
            cited_passages,
            all_retrieved_passages: passages,
            routing_strategy: routing.strategy,
            sector_id: routing.sector_id,
            routing_rationale: routing.confidence_rationale,
            synthesis_rationale: answer.synthesis_rationale,
            degradations,
            collections,
        }
    }

    /// Whether any stage fell back.
    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }
}

/// Truncate at a word boundary, on a char boundary, appending "...".
pub fn truncate_snippet(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    let Some((cut, _)) = text.char_indices().nth(max_chars) else {
        return text.to_string();
    };

    let truncated = &text[..cut];
    match truncated.rfind(char::is_whitespace) {
        Some(last_space) if last_space > 0 => format!("{}...", truncated[..last_space].trim_end()),
        _ => format!("{}...", truncated),
    }
}
