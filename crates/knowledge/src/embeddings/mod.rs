//! Query embedding.
//!
//! The vector collections are indexed with a fixed model; queries must be
//! embedded with the same model and dimensions.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};
