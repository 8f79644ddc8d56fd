//! Qdrant vector store over the REST API.
//!
//! API: https://api.qdrant.tech/api-reference/search/points

use super::{split_payload, MetadataFilter, ScoredPoint, VectorStore};
use droit_core::{AppError, AppResult};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Default Qdrant REST endpoint
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6333";

/// Connect timeout; the per-call deadline is enforced by the retriever
const CONNECT_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    vector: &'a [f32],
    limit: usize,
    with_payload: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    result: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    /// Unsigned integer or UUID string
    id: Value,
    score: f32,
    #[serde(default)]
    payload: Option<Value>,
}

/// Qdrant REST client.
#[derive(Debug, Clone)]
pub struct QdrantStore {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl QdrantStore {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> AppResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Knowledge(format!("Failed to create HTTP client for Qdrant: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Qdrant filter body for an equality condition.
    fn filter_body(filter: &MetadataFilter) -> Value {
        json!({
            "must": [
                { "key": filter.field, "match": { "value": filter.value } }
            ]
        })
    }

    fn to_point(hit: SearchHit) -> ScoredPoint {
        let id = match hit.id {
            Value::String(s) => s,
            other => other.to_string(),
        };
        let (text, metadata) = hit
            .payload
            .as_ref()
            .map(split_payload)
            .unwrap_or_default();

        ScoredPoint {
            id,
            score: hit.score,
            text,
            metadata,
        }
    }
}

#[async_trait::async_trait]
impl VectorStore for QdrantStore {
    fn backend_name(&self) -> &str {
        "qdrant"
    }

    #[tracing::instrument(skip(self, embedding, filter))]
    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> AppResult<Vec<ScoredPoint>> {
        let url = format!("{}/collections/{}/points/search", self.base_url, collection);
        let body = SearchRequest {
            vector: embedding,
            limit: top_k,
            with_payload: true,
            filter: filter.map(Self::filter_body),
        };

        debug!("Searching Qdrant collection '{}' (filter: {:?})", collection, filter);

        let mut request = self.client.post(&url).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.header("api-key", key);
        }

        let response = request.send().await.map_err(|e| {
            AppError::RetrievalUnavailable(format!("Qdrant unreachable at {}: {}", self.base_url, e))
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(AppError::RetrievalUnavailable(format!(
                "Qdrant collection '{}' does not exist",
                collection
            )));
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::RetrievalUnavailable(format!(
                "Qdrant search error ({}): {}",
                status, error_text
            )));
        }

        let parsed: SearchResponse = response.json().await.map_err(|e| {
            AppError::RetrievalUnavailable(format!("Failed to parse Qdrant response: {}", e))
        })?;

        debug!("Qdrant returned {} points from '{}'", parsed.result.len(), collection);

        Ok(parsed.result.into_iter().map(Self::to_point).collect())
    }
}
