//! Vector store abstraction.
//!
//! A store searches a named collection by query embedding, optionally
//! restricted by an equality filter on one payload field. An unreachable
//! store or unknown collection is an error; zero hits is an empty `Vec`.

pub mod memory;
pub mod qdrant;

pub use memory::MemoryStore;
pub use qdrant::QdrantStore;

use crate::types::PassageMetadata;
use droit_core::AppResult;
use serde::{Deserialize, Serialize};

/// Equality condition on a payload field (dotted path, e.g. `meta.idcc`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataFilter {
    pub field: String,
    pub value: String,
}

impl MetadataFilter {
    pub fn equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether a JSON payload satisfies the filter.
    pub fn matches(&self, payload: &serde_json::Value) -> bool {
        let found = self
            .field
            .split('.')
            .try_fold(payload, |node, key| node.get(key));
        match found {
            Some(serde_json::Value::String(s)) => *s == self.value,
            Some(serde_json::Value::Number(n)) => n.to_string() == self.value,
            _ => false,
        }
    }
}

/// One search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPoint {
    pub id: String,

    /// Raw similarity as reported by the store
    pub score: f32,

    pub text: String,
    pub metadata: PassageMetadata,
}

/// Trait for vector store backends.
#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    /// Backend name for logs ("qdrant", "memory").
    fn backend_name(&self) -> &str;

    /// Top-k most similar points, ordered by descending score.
    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> AppResult<Vec<ScoredPoint>>;
}

/// Split a stored payload into passage text and metadata.
///
/// Accepts both the `{content, meta: {...}}` layout written by the ingestion
/// pipeline and a flat `{text, ...metadata}` layout.
pub(crate) fn split_payload(payload: &serde_json::Value) -> (String, PassageMetadata) {
    let text = payload
        .get("content")
        .or_else(|| payload.get("text"))
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let meta_node = payload.get("meta").unwrap_or(payload);
    let metadata = serde_json::from_value(meta_node.clone()).unwrap_or_else(|e| {
        tracing::debug!("Unreadable passage metadata, using defaults: {}", e);
        PassageMetadata::default()
    });

    (text, metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_matches_nested_field() {
        let filter = MetadataFilter::equals("meta.idcc", "1486");
        assert!(filter.matches(&json!({"meta": {"idcc": "1486"}})));
        assert!(filter.matches(&json!({"meta": {"idcc": 1486}})));
        assert!(!filter.matches(&json!({"meta": {"idcc": "1979"}})));
        assert!(!filter.matches(&json!({"idcc": "1486"})));
    }

    #[test]
    fn test_split_payload_layouts() {
        let (text, meta) = split_payload(&json!({
            "content": "Le contrat de travail...",
            "meta": {"article_num": "L1221-1", "livre": "Livre II"}
        }));
        assert_eq!(text, "Le contrat de travail...");
        assert_eq!(meta.article_num.as_deref(), Some("L1221-1"));

        let (text, meta) = split_payload(&json!({"text": "Article 2.3", "idcc": "1486"}));
        assert_eq!(text, "Article 2.3");
        assert_eq!(meta.idcc.as_deref(), Some("1486"));
    }
}
