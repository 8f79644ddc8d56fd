//! Query routing.
//!
//! Decides which collections to search and, for sector strategies, which
//! collective agreement to filter on. The decision comes from one
//! schema-constrained LLM call at temperature 0, with two deterministic
//! layers around it:
//!
//! - a query that names a convention explicitly is routed to that convention
//!   without calling the model;
//! - when keyword evidence supports several conventions, the first one in
//!   catalog order wins.
//!
//! Any failure of the model call yields the `general_only` fallback.

use crate::catalog::{ConventionCatalog, SectorEvidence};
use crate::types::{RoutingDecision, RoutingStrategy};
use droit_core::{AppError, AppResult};
use droit_llm::{complete_validated, LlmClient, LlmRequest, ResponseSchema};
use droit_prompt::{build_prompt, PromptDefinition};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Keywords per convention shown to the model.
const PROMPT_KEYWORDS_PER_CONVENTION: usize = 5;

/// Upper bound on the routing answer; the rationale is one sentence.
const ROUTING_MAX_TOKENS: u32 = 300;

/// Decision as emitted by the model, before validation.
#[derive(Debug, Deserialize)]
struct RawRoutingDecision {
    strategy: String,
    #[serde(default)]
    sector_id: Option<String>,
    #[serde(default)]
    rationale: String,
}

/// Routing decision engine.
pub struct QueryRouter {
    client: Arc<dyn LlmClient>,
    model: String,
    prompt: PromptDefinition,
    catalog: Arc<ConventionCatalog>,
    timeout: Duration,
}

impl QueryRouter {
    pub fn new(
        client: Arc<dyn LlmClient>,
        model: impl Into<String>,
        prompt: PromptDefinition,
        catalog: Arc<ConventionCatalog>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            prompt,
            catalog,
            timeout,
        }
    }

    pub fn catalog(&self) -> &ConventionCatalog {
        &self.catalog
    }

    /// Route a query.
    ///
    /// Only an empty query is an error; every other failure is folded into
    /// [`RoutingDecision::fallback`].
    pub async fn route(&self, query: &str) -> AppResult<RoutingDecision> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::InvalidInput("Query is empty".to_string()));
        }

        if let Some(decision) = self.route_explicit_mention(query) {
            info!(
                strategy = %decision.strategy,
                sector_id = ?decision.sector_id,
                "Routed on explicit convention mention"
            );
            return Ok(decision);
        }

        let evidence = self.catalog.keyword_evidence(query);
        if !evidence.is_empty() {
            debug!(?evidence, "Keyword evidence");
        }

        let request = match self.build_request(query, &evidence) {
            Ok(request) => request,
            Err(e) => {
                warn!("Routing prompt could not be built: {}", e);
                return Ok(RoutingDecision::fallback(&format!("prompt_error: {}", e)));
            }
        };

        let catalog = self.catalog.as_ref();
        let outcome = complete_validated(
            self.client.as_ref(),
            &request,
            self.timeout,
            |raw: RawRoutingDecision| validate_decision(raw, catalog),
        )
        .await;

        let decision = match outcome {
            Ok(decision) => apply_tie_break(decision, &evidence),
            Err(failure) => {
                warn!(code = failure.code(), "Routing failed, using general_only: {}", failure);
                RoutingDecision::fallback(&format!("{}: {}", failure.code(), failure))
            }
        };

        info!(
            strategy = %decision.strategy,
            sector_id = ?decision.sector_id,
            fallback = decision.is_fallback(),
            "Routing decision"
        );

        Ok(decision)
    }

    /// First explicitly named convention, in catalog order.
    fn route_explicit_mention(&self, query: &str) -> Option<RoutingDecision> {
        let mentions = self.catalog.explicit_mentions(query);
        let first = mentions.first()?;

        let mut rationale = format!(
            "Query explicitly names convention {} (IDCC {})",
            first.name, first.idcc
        );
        if mentions.len() > 1 {
            let others: Vec<&str> = mentions[1..].iter().map(|c| c.idcc.as_str()).collect();
            rationale.push_str(&format!(
                "; ambiguous: also mentions IDCC {}, kept first in catalog order",
                others.join(", ")
            ));
        }

        Some(RoutingDecision {
            strategy: RoutingStrategy::SectorThenGeneral,
            sector_id: Some(first.idcc.clone()),
            confidence_rationale: rationale,
            fallback: None,
        })
    }

    fn build_request(&self, query: &str, evidence: &[SectorEvidence]) -> AppResult<LlmRequest> {
        let conventions: Vec<Value> = self
            .catalog
            .iter()
            .map(|c| {
                let keywords: Vec<&str> = c
                    .keywords
                    .iter()
                    .take(PROMPT_KEYWORDS_PER_CONVENTION)
                    .map(String::as_str)
                    .collect();
                json!({
                    "idcc": c.idcc,
                    "name": c.name,
                    "keywords": keywords.join(", "),
                })
            })
            .collect();

        let hints: Vec<Value> = evidence
            .iter()
            .map(|e| {
                json!({
                    "idcc": e.idcc,
                    "name": e.name,
                    "matched": e.matched.join(", "),
                })
            })
            .collect();

        let context = json!({
            "query": query,
            "conventions": conventions,
            "hints": hints,
        });

        let built = build_prompt(&self.prompt, &context)?;

        let mut request = LlmRequest::new(built.user, &self.model)
            .with_temperature(0.0)
            .with_max_tokens(ROUTING_MAX_TOKENS)
            .with_response_schema(ResponseSchema::new(
                "routing_decision",
                routing_schema(&self.catalog),
            ));
        if let Some(system) = built.system {
            request = request.with_system(system);
        }

        Ok(request)
    }
}

/// Strict output schema: one of four strategies, a catalog IDCC or null, a rationale.
pub fn routing_schema(catalog: &ConventionCatalog) -> Value {
    let strategies: Vec<&str> = RoutingStrategy::ALL.iter().map(|s| s.as_str()).collect();
    let idccs: Vec<&str> = catalog.iter().map(|c| c.idcc.as_str()).collect();

    json!({
        "type": "object",
        "properties": {
            "strategy": { "type": "string", "enum": strategies },
            "sector_id": {
                "anyOf": [
                    { "type": "string", "enum": idccs },
                    { "type": "null" }
                ]
            },
            "rationale": { "type": "string" }
        },
        "required": ["strategy", "sector_id", "rationale"],
        "additionalProperties": false
    })
}

fn validate_decision(
    raw: RawRoutingDecision,
    catalog: &ConventionCatalog,
) -> Result<RoutingDecision, String> {
    let strategy = RoutingStrategy::parse(raw.strategy.trim())
        .ok_or_else(|| format!("unknown strategy '{}'", raw.strategy))?;

    let sector_id = raw
        .sector_id
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let sector_id = if strategy.needs_sector() {
        let id = sector_id.ok_or_else(|| format!("strategy {} requires a sector_id", strategy))?;
        if !catalog.contains(&id) {
            return Err(format!("sector_id '{}' is not in the catalog", id));
        }
        Some(id)
    } else {
        if let Some(ref id) = sector_id {
            debug!("Dropping sector_id {} returned with general_only", id);
        }
        None
    };

    Ok(RoutingDecision {
        strategy,
        sector_id,
        confidence_rationale: raw.rationale.trim().to_string(),
        fallback: None,
    })
}

/// When several conventions have keyword support, keep the first in catalog
/// order and note the ambiguity.
fn apply_tie_break(mut decision: RoutingDecision, evidence: &[SectorEvidence]) -> RoutingDecision {
    if !decision.strategy.needs_sector() || evidence.len() < 2 {
        return decision;
    }
    let Some(chosen) = decision.sector_id.clone() else {
        return decision;
    };

    let supported: Vec<&str> = evidence.iter().map(|e| e.idcc.as_str()).collect();
    let first = supported[0];

    if supported.contains(&chosen.as_str()) && chosen != first {
        info!(chosen = %chosen, kept = %first, "Overriding sector choice by catalog order");
        decision.sector_id = Some(first.to_string());
    }

    let note = format!(
        "ambiguous sector evidence (IDCC {}), kept IDCC {}",
        supported.join(", "),
        decision.sector_id.as_deref().unwrap_or(first)
    );
    decision.confidence_rationale = if decision.confidence_rationale.is_empty() {
        note
    } else {
        format!("{}; {}", decision.confidence_rationale, note)
    };

    decision
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(strategy: &str, sector: Option<&str>) -> RawRoutingDecision {
        RawRoutingDecision {
            strategy: strategy.to_string(),
            sector_id: sector.map(str::to_string),
            rationale: "because".to_string(),
        }
    }

    fn evidence(idccs: &[&str]) -> Vec<SectorEvidence> {
        idccs
            .iter()
            .map(|id| SectorEvidence {
                idcc: id.to_string(),
                name: format!("CC {}", id),
                matched: vec!["kw".to_string()],
            })
            .collect()
    }

    #[test]
    fn test_schema_lists_catalog_idccs() {
        let schema = routing_schema(&ConventionCatalog::builtin());
        let idccs = &schema["properties"]["sector_id"]["anyOf"][0]["enum"];
        assert_eq!(idccs[0], "1486");
        assert_eq!(schema["properties"]["strategy"]["enum"].as_array().unwrap().len(), 4);
        assert_eq!(schema["additionalProperties"], false);
    }

    #[test]
    fn test_validate_accepts_catalog_sector() {
        let catalog = ConventionCatalog::builtin();
        let decision = validate_decision(raw("sector_only", Some("1486")), &catalog).unwrap();
        assert_eq!(decision.strategy, RoutingStrategy::SectorOnly);
        assert_eq!(decision.sector_id.as_deref(), Some("1486"));
    }

    #[test]
    fn test_validate_rejects_unknown_strategy() {
        let catalog = ConventionCatalog::builtin();
        let err = validate_decision(raw("both", None), &catalog).unwrap_err();
        assert!(err.contains("unknown strategy"));
    }

    #[test]
    fn test_validate_rejects_missing_or_unknown_sector() {
        let catalog = ConventionCatalog::builtin();
        assert!(validate_decision(raw("general_then_sector", None), &catalog).is_err());
        assert!(validate_decision(raw("sector_only", Some("  ")), &catalog).is_err());
        assert!(validate_decision(raw("sector_only", Some("9999")), &catalog).is_err());
    }

    #[test]
    fn test_validate_drops_sector_for_general_only() {
        let catalog = ConventionCatalog::builtin();
        let decision = validate_decision(raw("general_only", Some("1486")), &catalog).unwrap();
        assert_eq!(decision.sector_id, None);
    }

    #[test]
    fn test_tie_break_prefers_first_catalog_entry() {
        let decision = RoutingDecision {
            strategy: RoutingStrategy::GeneralThenSector,
            sector_id: Some("1979".to_string()),
            confidence_rationale: "chef de cuisine".to_string(),
            fallback: None,
        };
        let decision = apply_tie_break(decision, &evidence(&["1486", "1979"]));
        assert_eq!(decision.sector_id.as_deref(), Some("1486"));
        assert!(decision.confidence_rationale.contains("ambiguous"));
    }

    #[test]
    fn test_tie_break_ignores_single_evidence() {
        let decision = RoutingDecision {
            strategy: RoutingStrategy::SectorOnly,
            sector_id: Some("1979".to_string()),
            confidence_rationale: "HCR".to_string(),
            fallback: None,
        };
        let out = apply_tie_break(decision.clone(), &evidence(&["1486"]));
        assert_eq!(out, decision);
    }

    #[test]
    fn test_tie_break_keeps_general_only() {
        let decision = RoutingDecision {
            strategy: RoutingStrategy::GeneralOnly,
            sector_id: None,
            confidence_rationale: "general".to_string(),
            fallback: None,
        };
        let out = apply_tie_break(decision.clone(), &evidence(&["1486", "1979"]));
        assert_eq!(out, decision);
    }
}
