//! Embedding provider trait and factory.

use super::providers::{OllamaProvider, TrigramProvider};
use droit_core::config::EmbeddingSettings;
use droit_core::{AppError, AppResult};
use std::sync::Arc;

/// Environment variable overriding the Ollama endpoint.
const OLLAMA_URL_ENV: &str = "OLLAMA_URL";

/// Trait for embedding providers.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "ollama", "trigram")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts in a batch.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate embedding for a single text (convenience method).
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::Knowledge("No embedding returned".to_string()))
    }
}

/// Create an embedding provider from settings.
///
/// The Ollama endpoint is taken from the settings, then `OLLAMA_URL`, then
/// the local default.
pub fn create_provider(settings: &EmbeddingSettings) -> AppResult<Arc<dyn EmbeddingProvider>> {
    match settings.provider.as_str() {
        "ollama" => {
            let endpoint = settings
                .endpoint
                .clone()
                .or_else(|| std::env::var(OLLAMA_URL_ENV).ok());
            let provider = OllamaProvider::new(endpoint, &settings.model, settings.dimensions)?;
            Ok(Arc::new(provider))
        }

        "trigram" => Ok(Arc::new(TrigramProvider::new(settings.dimensions))),

        _ => Err(AppError::Config(format!(
            "Unknown embedding provider: '{}'. Supported providers: ollama, trigram",
            settings.provider
        ))),
    }
}
