//! Routing → retrieval → synthesis.

use super::citation::{format_citation, source_url};
use super::retriever::{MultiCollectionRetriever, RetrievalOutcome};
use super::router::QueryRouter;
use super::synthesizer::AnswerSynthesizer;
use super::types::{truncate_snippet, AnswerReport, CitedPassage, SNIPPET_MAX_CHARS};
use crate::types::{Degradation, RetrievedPassage};
use droit_core::{AppError, AppResult};
use std::collections::BTreeSet;
use tracing::{info, info_span, Instrument};

/// One pipeline per process; each call to [`Pipeline::answer_query`] is independent.
pub struct Pipeline {
    router: QueryRouter,
    retriever: MultiCollectionRetriever,
    synthesizer: AnswerSynthesizer,
}

impl Pipeline {
    pub fn new(
        router: QueryRouter,
        retriever: MultiCollectionRetriever,
        synthesizer: AnswerSynthesizer,
    ) -> Self {
        Self {
            router,
            retriever,
            synthesizer,
        }
    }

    pub fn router(&self) -> &QueryRouter {
        &self.router
    }

    pub fn retriever(&self) -> &MultiCollectionRetriever {
        &self.retriever
    }

    /// Answer a question.
    ///
    /// Only `InvalidInput` (empty query) and `RetrievalUnavailable` (no
    /// collection could be searched) are returned as errors. Routing and
    /// synthesis failures show up in [`AnswerReport::degradations`].
    pub async fn answer_query(&self, query: &str) -> AppResult<AnswerReport> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let span = info_span!("answer_query", request_id = %request_id);
        self.run(request_id, query).instrument(span).await
    }

    async fn run(&self, request_id: String, query: &str) -> AppResult<AnswerReport> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::InvalidInput("Query is empty".to_string()));
        }

        info!("Answering query: {}", query);

        let routing = self.router.route(query).await?;
        let mut degradations = Vec::new();
        if let Some(reason) = routing.fallback {
            degradations.push(Degradation::new(reason, routing.confidence_rationale.clone()));
        }

        let retrieval = self.retriever.retrieve(query, &routing).await?;
        degradations.extend(retrieval.degradations());
        let RetrievalOutcome {
            results,
            collections,
        } = retrieval;
        let passages = results.into_passages();

        let answer = self.synthesizer.synthesize(query, &passages).await;
        if let Some(reason) = answer.fallback {
            degradations.push(Degradation::new(reason, answer.synthesis_rationale.clone()));
        }

        let cited_passages = cite(&answer.cited_indices, &passages);

        info!(
            strategy = %routing.strategy,
            sector_id = ?routing.sector_id,
            passages = passages.len(),
            cited = cited_passages.len(),
            confidence = answer.confidence,
            degraded = !degradations.is_empty(),
            "Query answered"
        );

        Ok(AnswerReport::new(
            request_id,
            query,
            routing,
            passages,
            collections,
            answer,
            cited_passages,
            degradations,
        ))
    }
}

/// Resolve 1-based indices against the passage list.
fn cite(indices: &BTreeSet<usize>, passages: &[RetrievedPassage]) -> Vec<CitedPassage> {
    indices
        .iter()
        .filter_map(|&index| {
            let passage = passages.get(index.checked_sub(1)?)?;
            Some(CitedPassage {
                index,
                citation: format_citation(passage),
                url: source_url(passage),
                snippet: truncate_snippet(&passage.text, SNIPPET_MAX_CHARS),
                passage: passage.clone(),
            })
        })
        .collect()
}
