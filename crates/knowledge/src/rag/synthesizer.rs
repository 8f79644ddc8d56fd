//! Cited answer synthesis.
//!
//! Turns the top passages into a French answer with a confidence score and
//! the set of sources it relies on. Never fails: an empty passage list or a
//! failed model call produce fixed zero-confidence answers.

use super::citation::context_label;
use crate::types::{CitedAnswer, FallbackReason, RetrievedPassage};
use droit_core::config::SynthesisSettings;
use droit_core::AppResult;
use droit_llm::{complete_validated, LlmClient, LlmRequest, ResponseSchema};
use droit_prompt::{build_prompt, PromptDefinition};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Answer returned when retrieval produced nothing.
pub const NO_PASSAGES_ANSWER: &str = "Aucune information disponible pour répondre à cette question.";

/// Answer returned when the model call fails.
pub const SYNTHESIS_FALLBACK_ANSWER: &str = "Je n'ai pas pu générer une réponse à cette question.";

const SYNTHESIS_MAX_TOKENS: u32 = 1000;

#[derive(Debug, Deserialize)]
struct RawSynthesis {
    answer: String,
    confidence: f64,
    #[serde(default)]
    citation_indices: Vec<Value>,
    #[serde(default)]
    reasoning: String,
}

/// Answer synthesizer.
pub struct AnswerSynthesizer {
    client: Arc<dyn LlmClient>,
    model: String,
    prompt: PromptDefinition,
    temperature: f32,
    max_passages: usize,
    timeout: Duration,
}

impl AnswerSynthesizer {
    pub fn new(
        client: Arc<dyn LlmClient>,
        model: impl Into<String>,
        prompt: PromptDefinition,
        settings: &SynthesisSettings,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            prompt,
            temperature: settings.temperature,
            max_passages: settings.max_passages,
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }

    /// Number of passages (N) handed to the model.
    pub fn max_passages(&self) -> usize {
        self.max_passages
    }

    /// Synthesize an answer from the first `max_passages` passages.
    ///
    /// Cited indices are 1-based positions into that prefix.
    pub async fn synthesize(&self, query: &str, passages: &[RetrievedPassage]) -> CitedAnswer {
        let used = &passages[..passages.len().min(self.max_passages)];

        if used.is_empty() {
            info!("No passages to synthesize from");
            return CitedAnswer {
                answer_text: NO_PASSAGES_ANSWER.to_string(),
                confidence: 0.0,
                cited_indices: BTreeSet::new(),
                synthesis_rationale: format!("fallback: {}", FallbackReason::NoPassages),
                fallback: Some(FallbackReason::NoPassages),
            };
        }

        let request = match self.build_request(query, used) {
            Ok(request) => request,
            Err(e) => {
                warn!("Synthesis prompt could not be built: {}", e);
                return synthesis_fallback(&format!("prompt_error: {}", e));
            }
        };

        let source_count = used.len();
        let outcome = complete_validated(
            self.client.as_ref(),
            &request,
            self.timeout,
            |raw: RawSynthesis| validate_synthesis(raw, source_count),
        )
        .await;

        match outcome {
            Ok(answer) => {
                info!(
                    confidence = answer.confidence,
                    cited = ?answer.cited_indices,
                    "Synthesis done"
                );
                answer
            }
            Err(failure) => {
                warn!(code = failure.code(), "Synthesis failed: {}", failure);
                synthesis_fallback(&format!("{}: {}", failure.code(), failure))
            }
        }
    }

    fn build_request(&self, query: &str, passages: &[RetrievedPassage]) -> AppResult<LlmRequest> {
        let context = json!({
            "query": query,
            "context": build_context(passages),
            "source_count": passages.len(),
        });
        let built = build_prompt(&self.prompt, &context)?;

        let mut request = LlmRequest::new(built.user, &self.model)
            .with_temperature(self.temperature)
            .with_max_tokens(SYNTHESIS_MAX_TOKENS)
            .with_response_schema(ResponseSchema::new("cited_answer", synthesis_schema()));
        if let Some(system) = built.system {
            request = request.with_system(system);
        }
        Ok(request)
    }
}

/// Numbered context block: `[Source i] label:\ntext`, blank-line separated.
pub fn build_context(passages: &[RetrievedPassage]) -> String {
    passages
        .iter()
        .enumerate()
        .map(|(i, p)| format!("[Source {}] {}:\n{}", i + 1, context_label(p), p.text.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Strict output schema for synthesis.
pub fn synthesis_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "answer": { "type": "string" },
            "confidence": { "type": "number" },
            "citation_indices": { "type": "array", "items": { "type": "integer" } },
            "reasoning": { "type": "string" }
        },
        "required": ["answer", "confidence", "citation_indices", "reasoning"],
        "additionalProperties": false
    })
}

fn validate_synthesis(raw: RawSynthesis, source_count: usize) -> Result<CitedAnswer, String> {
    let answer_text = raw.answer.trim().to_string();
    if answer_text.is_empty() {
        return Err("empty answer".to_string());
    }

    let confidence = if raw.confidence.is_finite() {
        raw.confidence.clamp(0.0, 1.0) as f32
    } else {
        0.0
    };

    let mut cited_indices = BTreeSet::new();
    let mut dropped = Vec::new();
    for value in raw.citation_indices {
        match citation_index(&value).filter(|i| (1..=source_count).contains(i)) {
            Some(index) => {
                cited_indices.insert(index);
            }
            None => dropped.push(value),
        }
    }
    if !dropped.is_empty() {
        debug!(?dropped, source_count, "Dropped out-of-range citation indices");
    }

    Ok(CitedAnswer {
        answer_text,
        confidence,
        cited_indices,
        synthesis_rationale: raw.reasoning.trim().to_string(),
        fallback: None,
    })
}

/// Integral JSON number as a position; `2.0` counts, `1.5` and `-1` do not.
fn citation_index(value: &Value) -> Option<usize> {
    if let Some(i) = value.as_u64() {
        return usize::try_from(i).ok();
    }
    value
        .as_f64()
        .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= usize::MAX as f64)
        .map(|f| f as usize)
}

fn synthesis_fallback(detail: &str) -> CitedAnswer {
    CitedAnswer {
        answer_text: SYNTHESIS_FALLBACK_ANSWER.to_string(),
        confidence: 0.0,
        cited_indices: BTreeSet::new(),
        synthesis_rationale: format!("fallback: {} ({})", FallbackReason::SynthesisError, detail),
        fallback: Some(FallbackReason::SynthesisError),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CollectionKind, PassageMetadata};

    fn raw(answer: &str, confidence: f64, indices: Value) -> RawSynthesis {
        RawSynthesis {
            answer: answer.to_string(),
            confidence,
            citation_indices: serde_json::from_value(indices).unwrap(),
            reasoning: "ok".to_string(),
        }
    }

    #[test]
    fn test_out_of_range_indices_are_dropped() {
        let answer = validate_synthesis(raw("Réponse", 0.8, json!([0, 1, 3, 4, -2])), 3).unwrap();
        assert_eq!(answer.cited_indices.into_iter().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(answer.confidence, 0.8);
    }

    #[test]
    fn test_all_invalid_indices_keep_answer_and_confidence() {
        let answer = validate_synthesis(raw("Réponse", 0.6, json!([7, 9])), 2).unwrap();
        assert!(answer.cited_indices.is_empty());
        assert_eq!(answer.answer_text, "Réponse");
        assert_eq!(answer.confidence, 0.6);
    }

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(validate_synthesis(raw("a", 1.7, json!([])), 1).unwrap().confidence, 1.0);
        assert_eq!(validate_synthesis(raw("a", -0.3, json!([])), 1).unwrap().confidence, 0.0);
    }

    #[test]
    fn test_integral_floats_count_as_indices() {
        let answer = validate_synthesis(raw("a", 0.5, json!([2.0, 1.5])), 3).unwrap();
        assert_eq!(answer.cited_indices.into_iter().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_empty_answer_is_rejected() {
        assert!(validate_synthesis(raw("   ", 0.9, json!([1])), 1).is_err());
    }

    #[test]
    fn test_context_block_numbering() {
        let passages: Vec<RetrievedPassage> = ["L1221-19", "L1221-20"]
            .iter()
            .map(|num| RetrievedPassage {
                source_collection: CollectionKind::General,
                passage_id: num.to_string(),
                text: format!("Texte de {}\n", num),
                similarity_score: 0.5,
                metadata: PassageMetadata {
                    article_num: Some(num.to_string()),
                    ..Default::default()
                },
                sector_id: None,
                sector_name: None,
            })
            .collect();

        let context = build_context(&passages);
        assert_eq!(
            context,
            "[Source 1] Article L1221-19 (Code du travail):\nTexte de L1221-19\n\n\
             [Source 2] Article L1221-20 (Code du travail):\nTexte de L1221-20"
        );
    }

    proptest::proptest! {
        #[test]
        fn validated_answers_stay_in_bounds(
            confidence in proptest::num::f64::ANY,
            indices in proptest::collection::vec(-5i64..20, 0..8),
            source_count in 1usize..6,
        ) {
            let raw = RawSynthesis {
                answer: "Réponse".to_string(),
                confidence,
                citation_indices: indices.into_iter().map(Value::from).collect(),
                reasoning: String::new(),
            };
            let answer = validate_synthesis(raw, source_count).unwrap();
            proptest::prop_assert!((0.0..=1.0).contains(&answer.confidence));
            proptest::prop_assert!(answer.cited_indices.iter().all(|i| (1..=source_count).contains(i)));
        }
    }

    #[test]
    fn test_fallback_marker() {
        let answer = synthesis_fallback("timeout: LLM call timed out");
        assert_eq!(answer.confidence, 0.0);
        assert!(answer.synthesis_rationale.starts_with("fallback: synthesis_error"));
        assert_eq!(answer.fallback, Some(FallbackReason::SynthesisError));
    }
}
