//! Labor-law question answering over the Code du travail and the collective
//! agreements (KALI).
//!
//! A query is routed to one or both collections, the matching passages are
//! retrieved and merged, and an answer citing them is synthesized. The
//! `build_*` functions assemble each stage from an [`AppConfig`].

pub mod catalog;
pub mod embeddings;
pub mod rag;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use catalog::{Convention, ConventionCatalog, SectorEvidence};
pub use rag::{AnswerReport, CitedPassage, Pipeline};
pub use types::{
    CitedAnswer, CollectionKind, Degradation, FallbackReason, RankedResultSet, RetrievedPassage,
    RoutingDecision, RoutingStrategy,
};

use droit_core::{AppConfig, AppError, AppResult};
use droit_llm::{create_client, LlmClient};
use droit_prompt::{load_prompt, ROUTING_PROMPT_ID, SYNTHESIS_PROMPT_ID};
use embeddings::{create_provider, EmbeddingProvider};
use rag::{AnswerSynthesizer, MultiCollectionRetriever, QueryRouter, RetrieverSettings};
use std::sync::Arc;
use std::time::Duration;
use store::{MemoryStore, QdrantStore, VectorStore};

/// Convention catalog from the config override, or the built-in one.
pub fn build_catalog(config: &AppConfig) -> AppResult<Arc<ConventionCatalog>> {
    let catalog = ConventionCatalog::from_settings(config.conventions.as_deref())?;
    tracing::debug!("Convention catalog: {} entries", catalog.len());
    Ok(Arc::new(catalog))
}

/// Vector store selected by `retrieval.store`.
///
/// The in-memory store needs `retrieval.fixture`; relative paths resolve
/// against the workspace.
pub async fn build_store(
    config: &AppConfig,
    embedder: &dyn EmbeddingProvider,
) -> AppResult<Arc<dyn VectorStore>> {
    match config.retrieval.store.as_str() {
        "qdrant" => {
            let store = QdrantStore::new(&config.retrieval.url, config.resolve_store_api_key())?;
            Ok(Arc::new(store))
        }
        "memory" => {
            let fixture = config.retrieval.fixture.as_ref().ok_or_else(|| {
                AppError::Config("The memory store requires retrieval.fixture".to_string())
            })?;
            let path = if fixture.is_absolute() {
                fixture.clone()
            } else {
                config.workspace.join(fixture)
            };
            let store = MemoryStore::from_jsonl(&path, embedder).await?;
            Ok(Arc::new(store))
        }
        other => Err(AppError::Config(format!(
            "Unknown vector store: '{}'. Supported stores: qdrant, memory",
            other
        ))),
    }
}

/// LLM client for the active provider.
pub fn build_llm_client(config: &AppConfig) -> AppResult<Arc<dyn LlmClient>> {
    let api_key = config.resolve_api_key(&config.provider);
    create_client(&config.provider, config.provider_endpoint(), api_key.as_deref())
        .map_err(|e| AppError::Config(format!("Failed to create LLM client: {}", e)))
}

pub fn build_router(
    config: &AppConfig,
    client: Arc<dyn LlmClient>,
    catalog: Arc<ConventionCatalog>,
) -> AppResult<QueryRouter> {
    let (prompt, source) = load_prompt(&config.workspace, ROUTING_PROMPT_ID)?;
    tracing::debug!("Routing prompt loaded ({:?})", source);

    Ok(QueryRouter::new(
        client,
        config.routing_model(),
        prompt,
        catalog,
        Duration::from_secs(config.routing.timeout_secs),
    ))
}

pub async fn build_retriever(
    config: &AppConfig,
    catalog: Arc<ConventionCatalog>,
) -> AppResult<MultiCollectionRetriever> {
    let embedder = create_provider(&config.embedding)?;
    let store = build_store(config, embedder.as_ref()).await?;

    tracing::debug!(
        "Retriever: store={}, embedder={}/{}",
        store.backend_name(),
        embedder.provider_name(),
        embedder.model_name()
    );

    Ok(MultiCollectionRetriever::new(
        store,
        embedder,
        catalog,
        RetrieverSettings::from_config(&config.retrieval),
    ))
}

pub fn build_synthesizer(
    config: &AppConfig,
    client: Arc<dyn LlmClient>,
) -> AppResult<AnswerSynthesizer> {
    let (prompt, source) = load_prompt(&config.workspace, SYNTHESIS_PROMPT_ID)?;
    tracing::debug!("Synthesis prompt loaded ({:?})", source);

    Ok(AnswerSynthesizer::new(
        client,
        config.synthesis_model(),
        prompt,
        &config.synthesis,
    ))
}

/// Full pipeline from configuration.
pub async fn build_pipeline(config: &AppConfig) -> AppResult<Pipeline> {
    let catalog = build_catalog(config)?;
    let client = build_llm_client(config)?;

    let router = build_router(config, client.clone(), catalog.clone())?;
    let retriever = build_retriever(config, catalog).await?;
    let synthesizer = build_synthesizer(config, client)?;

    Ok(Pipeline::new(router, retriever, synthesizer))
}
