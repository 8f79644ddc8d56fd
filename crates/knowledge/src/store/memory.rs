//! In-memory vector store.
//!
//! Brute-force cosine similarity over points loaded from a JSONL fixture.
//! Used for offline runs (`--store memory`) and tests.

use super::{split_payload, MetadataFilter, ScoredPoint, VectorStore};
use crate::embeddings::EmbeddingProvider;
use droit_core::{AppError, AppResult};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// One line of a JSONL fixture.
///
/// Lines without a `vector` are embedded at load time.
#[derive(Debug, Deserialize)]
struct FixtureLine {
    collection: String,
    id: String,
    #[serde(default)]
    vector: Option<Vec<f32>>,
    #[serde(flatten)]
    payload: serde_json::Value,
}

#[derive(Debug, Clone)]
struct StoredPoint {
    id: String,
    vector: Vec<f32>,
    payload: serde_json::Value,
}

/// In-memory store keyed by collection name.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    collections: HashMap<String, Vec<StoredPoint>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a collection so that searching it returns empty rather than an error.
    pub fn create_collection(&mut self, name: &str) {
        self.collections.entry(name.to_string()).or_default();
    }

    /// Insert or replace a point.
    pub fn upsert(
        &mut self,
        collection: &str,
        id: impl Into<String>,
        vector: Vec<f32>,
        payload: serde_json::Value,
    ) {
        let id = id.into();
        let points = self.collections.entry(collection.to_string()).or_default();
        points.retain(|p| p.id != id);
        points.push(StoredPoint {
            id,
            vector,
            payload,
        });
    }

    /// Number of points in a collection (`None` if it does not exist).
    pub fn count(&self, collection: &str) -> Option<usize> {
        self.collections.get(collection).map(Vec::len)
    }

    /// Load a JSONL fixture, embedding lines that carry no vector.
    pub async fn from_jsonl(path: &Path, embedder: &dyn EmbeddingProvider) -> AppResult<Self> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::Knowledge(format!("Failed to read fixture {:?}: {}", path, e))
        })?;

        let mut store = Self::new();
        let mut pending: Vec<FixtureLine> = Vec::new();

        for (line_no, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let entry: FixtureLine = serde_json::from_str(line).map_err(|e| {
                AppError::Knowledge(format!(
                    "Invalid fixture line {} in {:?}: {}",
                    line_no + 1,
                    path,
                    e
                ))
            })?;
            pending.push(entry);
        }

        let to_embed: Vec<String> = pending
            .iter()
            .filter(|e| e.vector.is_none())
            .map(|e| split_payload(&e.payload).0)
            .collect();
        let mut embedded = embedder.embed_batch(&to_embed).await?.into_iter();

        for entry in pending {
            let vector = match entry.vector {
                Some(v) => v,
                None => embedded.next().ok_or_else(|| {
                    AppError::Knowledge("Embedding provider returned too few vectors".to_string())
                })?,
            };
            store.upsert(&entry.collection, entry.id, vector, entry.payload);
        }

        tracing::info!(
            "Loaded fixture {:?}: {}",
            path,
            store
                .collections
                .iter()
                .map(|(name, points)| format!("{}={}", name, points.len()))
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(store)
    }
}

#[async_trait::async_trait]
impl VectorStore for MemoryStore {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> AppResult<Vec<ScoredPoint>> {
        let points = self.collections.get(collection).ok_or_else(|| {
            AppError::RetrievalUnavailable(format!("Collection '{}' does not exist", collection))
        })?;

        let mut scored: Vec<(&StoredPoint, f32)> = points
            .iter()
            .filter(|p| filter.map_or(true, |f| f.matches(&p.payload)))
            .map(|p| (p, cosine_similarity(embedding, &p.vector)))
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(p, score)| {
                let (text, metadata) = split_payload(&p.payload);
                ScoredPoint {
                    id: p.id.clone(),
                    score,
                    text,
                    metadata,
                }
            })
            .collect())
    }
}

/// Cosine similarity; 0.0 for mismatched or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::trigram::TrigramProvider;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn store() -> MemoryStore {
        let mut store = MemoryStore::new();
        store.upsert(
            "kali",
            "k1",
            vec![1.0, 0.0],
            json!({"content": "Syntec essai", "meta": {"idcc": "1486"}}),
        );
        store.upsert(
            "kali",
            "k2",
            vec![0.9, 0.1],
            json!({"content": "HCR essai", "meta": {"idcc": "1979"}}),
        );
        store.upsert("code_travail", "c1", vec![0.0, 1.0], json!({"content": "Code"}));
        store
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_search_orders_by_score() {
        let results = store().search("kali", &[1.0, 0.0], 10, None).await.unwrap();
        let ids: Vec<&str> = results.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["k1", "k2"]);
    }

    #[tokio::test]
    async fn test_search_applies_filter() {
        let filter = MetadataFilter::equals("meta.idcc", "1979");
        let results = store()
            .search("kali", &[1.0, 0.0], 10, Some(&filter))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].metadata.idcc.as_deref(), Some("1979"));
    }

    #[tokio::test]
    async fn test_filter_without_matches_is_empty() {
        let filter = MetadataFilter::equals("meta.idcc", "2120");
        let results = store()
            .search("kali", &[1.0, 0.0], 10, Some(&filter))
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_collection_is_unavailable() {
        let err = store().search("missing", &[1.0, 0.0], 10, None).await.unwrap_err();
        assert!(matches!(err, AppError::RetrievalUnavailable(_)));
    }

    #[tokio::test]
    async fn test_upsert_replaces_point() {
        let mut store = store();
        store.upsert("code_travail", "c1", vec![1.0, 0.0], json!({"content": "v2"}));
        assert_eq!(store.count("code_travail"), Some(1));
        assert_eq!(store.count("nope"), None);
    }

    #[tokio::test]
    async fn test_from_jsonl_embeds_missing_vectors() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"collection": "code_travail", "id": "L1221-19", "content": "La période d'essai du salarié", "meta": {{"article_num": "L1221-19"}}}}"#
        )
        .unwrap();
        writeln!(file).unwrap();
        writeln!(
            file,
            r#"{{"collection": "kali", "id": "k1", "vector": [0.0, 0.0, 1.0], "text": "Syntec", "idcc": "1486"}}"#
        )
        .unwrap();

        let provider = TrigramProvider::new(3);
        let store = MemoryStore::from_jsonl(file.path(), &provider).await.unwrap();
        assert_eq!(store.count("code_travail"), Some(1));
        assert_eq!(store.count("kali"), Some(1));

        let hits = store.search("code_travail", &[1.0, 1.0, 1.0], 1, None).await.unwrap();
        assert_eq!(hits[0].metadata.article_num.as_deref(), Some("L1221-19"));
    }

    #[tokio::test]
    async fn test_from_jsonl_reports_bad_line() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not json").unwrap();

        let provider = TrigramProvider::new(3);
        let err = MemoryStore::from_jsonl(file.path(), &provider).await.unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }
}
