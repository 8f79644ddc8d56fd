//! Cross-module tests with in-crate fakes for the LLM and the vector store.

mod properties;

use crate::catalog::ConventionCatalog;
use crate::embeddings::providers::TrigramProvider;
use crate::embeddings::EmbeddingProvider;
use crate::rag::{AnswerSynthesizer, MultiCollectionRetriever, Pipeline, QueryRouter, RetrieverSettings};
use crate::store::{MemoryStore, MetadataFilter, ScoredPoint, VectorStore};
use droit_core::config::SynthesisSettings;
use droit_core::{AppError, AppResult};
use droit_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use droit_prompt::{builtin_prompt, ROUTING_PROMPT_ID, SYNTHESIS_PROMPT_ID};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub(crate) const DIMENSIONS: usize = 128;

/// What the fake LLM does on every call.
#[derive(Debug, Clone)]
pub(crate) enum Behavior {
    Reply(String),
    Fail,
    Hang,
}

/// LLM fake that records requests.
pub(crate) struct FakeLlm {
    behavior: Behavior,
    calls: AtomicUsize,
    requests: Mutex<Vec<LlmRequest>>,
}

impl FakeLlm {
    pub(crate) fn replying(value: serde_json::Value) -> Arc<Self> {
        Self::with(Behavior::Reply(value.to_string()))
    }

    pub(crate) fn with(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_request(&self) -> Option<LlmRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait::async_trait]
impl LlmClient for FakeLlm {
    fn provider_name(&self) -> &str {
        "fake"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        match &self.behavior {
            Behavior::Reply(content) => Ok(LlmResponse {
                content: content.clone(),
                model: request.model.clone(),
                usage: LlmUsage::default(),
                done: true,
            }),
            Behavior::Fail => Err(AppError::Llm("connection refused".to_string())),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Err(AppError::Llm("unreachable".to_string()))
            }
        }
    }
}

/// Store wrapper whose listed collections fail or never answer.
pub(crate) struct FlakyStore {
    inner: MemoryStore,
    failing: Vec<String>,
    hanging: Vec<String>,
}

impl FlakyStore {
    pub(crate) fn new(inner: MemoryStore, failing: &[&str]) -> Self {
        Self {
            inner,
            failing: failing.iter().map(|s| s.to_string()).collect(),
            hanging: Vec::new(),
        }
    }

    pub(crate) fn hanging(inner: MemoryStore, hanging: &[&str]) -> Self {
        Self {
            inner,
            failing: Vec::new(),
            hanging: hanging.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[async_trait::async_trait]
impl VectorStore for FlakyStore {
    fn backend_name(&self) -> &str {
        "flaky"
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> AppResult<Vec<ScoredPoint>> {
        if self.hanging.iter().any(|c| c == collection) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        if self.failing.iter().any(|c| c == collection) {
            return Err(AppError::RetrievalUnavailable(format!(
                "{} is down",
                collection
            )));
        }
        self.inner.search(collection, embedding, top_k, filter).await
    }
}

/// Embedder that errors or never answers.
#[derive(Debug)]
pub(crate) struct BrokenEmbedder {
    hang: bool,
}

impl BrokenEmbedder {
    pub(crate) fn failing() -> Arc<Self> {
        Arc::new(Self { hang: false })
    }

    pub(crate) fn hanging() -> Arc<Self> {
        Arc::new(Self { hang: true })
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for BrokenEmbedder {
    fn provider_name(&self) -> &str {
        "broken"
    }

    fn model_name(&self) -> &str {
        "broken"
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }

    async fn embed_batch(&self, _texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if self.hang {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        Err(AppError::Knowledge("embedding model not loaded".to_string()))
    }
}

/// (collection, id, text, metadata)
const FIXTURE: &[(&str, &str, &str, &str)] = &[
    (
        "code_travail",
        "L1221-19",
        "La période d'essai du salarié en contrat à durée indéterminée a une durée maximale de deux mois pour les ouvriers et employés.",
        r#"{"article_num": "L1221-19", "article_id": "LEGIARTI000019071188", "livre": "Livre II"}"#,
    ),
    (
        "code_travail",
        "L1237-1",
        "En cas de démission, l'existence et la durée du préavis sont fixées par la loi ou par convention collective.",
        r#"{"article_num": "L1237-1", "article_id": "LEGIARTI000006901174"}"#,
    ),
    (
        "code_travail",
        "L3141-3",
        "Le salarié a droit à un congé de deux jours et demi ouvrables par mois de travail effectif.",
        r#"{"article_num": "L3141-3"}"#,
    ),
    (
        "code_travail",
        "L1234-1",
        "Le préavis de licenciement dépend de l'ancienneté de services continus du salarié.",
        r#"{"article_num": "L1234-1"}"#,
    ),
    (
        "kali",
        "syntec-essai",
        "La période d'essai des ingénieurs et cadres est fixée à quatre mois, renouvelable une fois.",
        r#"{"article_num": "7", "idcc": "1486", "convention_name": "Syntec"}"#,
    ),
    (
        "kali",
        "syntec-conges",
        "Les congés payés des ingénieurs et cadres sont augmentés d'un jour après cinq ans d'ancienneté.",
        r#"{"article_num": "23", "idcc": "1486", "convention_name": "Syntec"}"#,
    ),
    (
        "kali",
        "hcr-essai",
        "La période d'essai des cuisiniers et serveurs est fixée à un mois.",
        r#"{"article_num": "13", "idcc": "1979", "convention_name": "HCR"}"#,
    ),
];

/// Text shared by both collections under the same id.
pub(crate) const SHARED_ID: &str = "shared-essai";
const SHARED_TEXT: &str =
    "La durée de la période d'essai pour un ingénieur informatique peut être prolongée par accord.";

/// Fixture store embedded with the trigram provider.
pub(crate) async fn seeded_store() -> MemoryStore {
    let embedder = TrigramProvider::new(DIMENSIONS);
    let mut store = MemoryStore::new();

    for (collection, id, text, meta) in FIXTURE {
        let vector = embedder.embed(text).await.unwrap();
        let meta: serde_json::Value = serde_json::from_str(meta).unwrap();
        store.upsert(collection, *id, vector, json!({"content": text, "meta": meta}));
    }

    let vector = embedder.embed(SHARED_TEXT).await.unwrap();
    store.upsert(
        "code_travail",
        SHARED_ID,
        vector.clone(),
        json!({"content": SHARED_TEXT, "meta": {"article_num": "L1221-21"}}),
    );
    store.upsert(
        "kali",
        SHARED_ID,
        vector,
        json!({"content": SHARED_TEXT, "meta": {"article_num": "7.1", "idcc": "1486"}}),
    );

    store
}

/// Test-sized settings: short timeouts, default collections.
pub(crate) fn retriever_settings() -> RetrieverSettings {
    RetrieverSettings {
        timeout: Duration::from_secs(2),
        ..RetrieverSettings::default()
    }
}

pub(crate) fn router(llm: Arc<FakeLlm>, timeout: Duration) -> QueryRouter {
    QueryRouter::new(
        llm,
        "fake-model",
        builtin_prompt(ROUTING_PROMPT_ID).unwrap(),
        Arc::new(ConventionCatalog::builtin()),
        timeout,
    )
}

pub(crate) fn retriever(store: Arc<dyn VectorStore>) -> MultiCollectionRetriever {
    retriever_with(
        store,
        Arc::new(TrigramProvider::new(DIMENSIONS)),
        retriever_settings(),
    )
}

pub(crate) fn retriever_with(
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    settings: RetrieverSettings,
) -> MultiCollectionRetriever {
    MultiCollectionRetriever::new(
        store,
        embedder,
        Arc::new(ConventionCatalog::builtin()),
        settings,
    )
}

pub(crate) fn synthesizer(llm: Arc<FakeLlm>, timeout_secs: u64) -> AnswerSynthesizer {
    AnswerSynthesizer::new(
        llm,
        "fake-model",
        builtin_prompt(SYNTHESIS_PROMPT_ID).unwrap(),
        &SynthesisSettings {
            timeout_secs,
            ..SynthesisSettings::default()
        },
    )
}

pub(crate) fn pipeline(
    router_llm: Arc<FakeLlm>,
    synthesis_llm: Arc<FakeLlm>,
    store: Arc<dyn VectorStore>,
) -> Pipeline {
    Pipeline::new(
        router(router_llm, Duration::from_secs(2)),
        retriever(store),
        synthesizer(synthesis_llm, 2),
    )
}

pub(crate) fn routing_reply(strategy: &str, sector_id: Option<&str>) -> Arc<FakeLlm> {
    FakeLlm::replying(json!({
        "strategy": strategy,
        "sector_id": sector_id,
        "rationale": "test decision",
    }))
}

pub(crate) fn synthesis_reply(answer: &str, confidence: f64, indices: &[i64]) -> Arc<FakeLlm> {
    FakeLlm::replying(json!({
        "answer": answer,
        "confidence": confidence,
        "citation_indices": indices,
        "reasoning": "test synthesis",
    }))
}
