//! LLM integration crate.
//!
//! Provider-agnostic access to chat/completion models with schema-constrained
//! JSON output. Callers describe the expected shape with a [`ResponseSchema`]
//! and go through [`structured::complete_validated`], which turns every
//! failure (timeout, transport, malformed JSON, rejected value) into a typed
//! [`StructuredFailure`] instead of an error.
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (default)
//! - **OpenAI**: Chat Completions API with `json_schema` response format
//!
//! # Example
//! ```no_run
//! use droit_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("Bonjour", "llama3.2").with_temperature(0.0);
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod structured;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage, ResponseSchema};
pub use factory::create_client;
pub use providers::{OllamaClient, OpenAiClient};
pub use structured::{complete_validated, StructuredFailure};
pub use types::ProviderType;
