//! Question answering: routing, multi-collection retrieval and cited synthesis.

pub mod citation;
pub mod pipeline;
pub mod retriever;
pub mod router;
pub mod synthesizer;
pub mod types;

pub use citation::{format_citation, source_url};
pub use pipeline::Pipeline;
pub use retriever::{MultiCollectionRetriever, RetrievalOutcome, RetrieverSettings};
pub use router::QueryRouter;
pub use synthesizer::{AnswerSynthesizer, NO_PASSAGES_ANSWER, SYNTHESIS_FALLBACK_ANSWER};
pub use types::{AnswerReport, CitedPassage};
