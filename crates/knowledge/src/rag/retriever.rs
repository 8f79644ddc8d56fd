//! Multi-collection retrieval.
//!
//! Executes a routing strategy against the general and sector collections,
//! then merges the per-collection results into one [`RankedResultSet`].
//! Dual strategies query both collections concurrently; each call has its own
//! timeout and a failing call only removes its own contribution.

use crate::catalog::ConventionCatalog;
use crate::embeddings::EmbeddingProvider;
use crate::store::{MetadataFilter, ScoredPoint, VectorStore};
use crate::types::{
    CollectionKind, CollectionOutcome, Degradation, FallbackReason, RankedResultSet,
    RetrievedPassage, RoutingDecision,
};
use droit_core::config::RetrievalSettings;
use droit_core::{AppError, AppResult};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Collection names, filter field, K and per-call timeout.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrieverSettings {
    pub general_collection: String,
    pub sector_collection: String,
    pub sector_field: String,
    pub top_k: usize,
    pub timeout: Duration,
}

impl RetrieverSettings {
    pub fn from_config(settings: &RetrievalSettings) -> Self {
        Self {
            general_collection: settings.general_collection.clone(),
            sector_collection: settings.sector_collection.clone(),
            sector_field: settings.sector_field.clone(),
            top_k: settings.top_k,
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }
}

impl Default for RetrieverSettings {
    fn default() -> Self {
        Self::from_config(&RetrievalSettings::default())
    }
}

/// Merged passages plus what each collection call did.
#[derive(Debug, Clone)]
pub struct RetrievalOutcome {
    pub results: RankedResultSet,

    /// One entry per targeted collection, in call order
    pub collections: Vec<CollectionOutcome>,
}

impl RetrievalOutcome {
    /// A `collection_unavailable` entry for every failed call.
    pub fn degradations(&self) -> Vec<Degradation> {
        self.collections
            .iter()
            .filter_map(|c| {
                c.error.as_ref().map(|e| {
                    Degradation::new(
                        FallbackReason::CollectionUnavailable,
                        format!("{}: {}", c.collection, e),
                    )
                })
            })
            .collect()
    }
}

/// Retriever over the general and sector collections.
pub struct MultiCollectionRetriever {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    catalog: Arc<ConventionCatalog>,
    settings: RetrieverSettings,
}

impl MultiCollectionRetriever {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        catalog: Arc<ConventionCatalog>,
        settings: RetrieverSettings,
    ) -> Self {
        Self {
            store,
            embedder,
            catalog,
            settings,
        }
    }

    pub fn settings(&self) -> &RetrieverSettings {
        &self.settings
    }

    /// Run the decision's strategy and merge.
    ///
    /// Fails with `RetrievalUnavailable` when the query cannot be embedded or
    /// when every targeted collection fails.
    pub async fn retrieve(
        &self,
        query: &str,
        decision: &RoutingDecision,
    ) -> AppResult<RetrievalOutcome> {
        let embedding = self.embed_query(query).await?;
        let sector_id = decision.sector_id.as_deref();
        let kinds = decision.strategy.collections();

        if decision.strategy.needs_sector() && sector_id.is_none() {
            warn!(
                strategy = %decision.strategy,
                "Sector strategy without sector_id, searching sector collection unfiltered"
            );
        }

        let calls = kinds
            .iter()
            .map(|&kind| self.search_with_timeout(kind, &embedding, sector_id, self.settings.top_k));
        let results = join_all(calls).await;

        let mut batches = Vec::with_capacity(kinds.len());
        let mut collections = Vec::with_capacity(kinds.len());

        for (&kind, result) in kinds.iter().zip(results) {
            match result {
                Ok(passages) => {
                    debug!(collection = %kind, hits = passages.len(), "Collection search done");
                    collections.push(CollectionOutcome {
                        collection: kind,
                        returned: passages.len(),
                        error: None,
                    });
                    batches.push(passages);
                }
                Err(e) => {
                    warn!(collection = %kind, "Collection search failed: {}", e);
                    collections.push(CollectionOutcome {
                        collection: kind,
                        returned: 0,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        if collections.iter().all(CollectionOutcome::failed) {
            let details: Vec<String> = collections
                .iter()
                .filter_map(|c| c.error.as_ref().map(|e| format!("{}: {}", c.collection, e)))
                .collect();
            return Err(AppError::RetrievalUnavailable(format!(
                "all targeted collections failed ({})",
                details.join("; ")
            )));
        }

        let results = RankedResultSet::merge(batches, self.settings.top_k);

        info!(
            strategy = %decision.strategy,
            merged = results.len(),
            hits = ?collections.iter().map(|c| (c.collection.as_str(), c.returned)).collect::<Vec<_>>(),
            "Retrieval done"
        );

        Ok(RetrievalOutcome {
            results,
            collections,
        })
    }

    /// Search a single collection, bypassing routing.
    pub async fn search_collection(
        &self,
        kind: CollectionKind,
        query: &str,
        sector_id: Option<&str>,
        top_k: usize,
    ) -> AppResult<Vec<RetrievedPassage>> {
        if query.trim().is_empty() {
            return Err(AppError::InvalidInput("Query is empty".to_string()));
        }
        let embedding = self.embed_query(query).await?;
        self.search_with_timeout(kind, &embedding, sector_id, top_k)
            .await
    }

    async fn embed_query(&self, query: &str) -> AppResult<Vec<f32>> {
        let embedded = tokio::time::timeout(self.settings.timeout, self.embedder.embed(query)).await;
        match embedded {
            Err(_) => Err(AppError::RetrievalUnavailable(format!(
                "query embedding timed out after {:?}",
                self.settings.timeout
            ))),
            Ok(Err(e)) => Err(AppError::RetrievalUnavailable(format!(
                "query embedding failed: {}",
                e
            ))),
            Ok(Ok(embedding)) => Ok(embedding),
        }
    }

    async fn search_with_timeout(
        &self,
        kind: CollectionKind,
        embedding: &[f32],
        sector_id: Option<&str>,
        top_k: usize,
    ) -> AppResult<Vec<RetrievedPassage>> {
        let collection = self.collection_name(kind);
        let sector_id = match kind {
            CollectionKind::Sector => sector_id,
            CollectionKind::General => None,
        };
        let filter = sector_id.map(|id| MetadataFilter::equals(&self.settings.sector_field, id));

        let search = self
            .store
            .search(collection, embedding, top_k, filter.as_ref());
        let points = match tokio::time::timeout(self.settings.timeout, search).await {
            Err(_) => {
                return Err(AppError::RetrievalUnavailable(format!(
                    "{} search on '{}' timed out after {:?}",
                    self.store.backend_name(),
                    collection,
                    self.settings.timeout
                )))
            }
            Ok(result) => result?,
        };

        Ok(points
            .into_iter()
            .map(|point| self.to_passage(kind, sector_id, point))
            .collect())
    }

    fn collection_name(&self, kind: CollectionKind) -> &str {
        match kind {
            CollectionKind::General => &self.settings.general_collection,
            CollectionKind::Sector => &self.settings.sector_collection,
        }
    }

    fn to_passage(
        &self,
        kind: CollectionKind,
        sector_id: Option<&str>,
        point: ScoredPoint,
    ) -> RetrievedPassage {
        let score = if point.score.is_nan() {
            0.0
        } else {
            point.score.clamp(0.0, 1.0)
        };

        RetrievedPassage {
            source_collection: kind,
            passage_id: point.id,
            text: point.text,
            similarity_score: score,
            metadata: point.metadata,
            sector_id: sector_id.map(str::to_string),
            sector_name: sector_id
                .and_then(|id| self.catalog.get(id))
                .map(|c| c.name.clone()),
        }
    }
}
