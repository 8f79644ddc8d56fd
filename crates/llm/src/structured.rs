//! Schema-constrained completions with boundary validation.
//!
//! The provider is asked for JSON matching a [`ResponseSchema`]. Whatever comes
//! back is parsed into a typed value and run through a caller-supplied check,
//! so downstream code only ever sees validated values or a [`StructuredFailure`].

use crate::client::{LlmClient, LlmRequest};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

/// Why a structured completion could not produce a usable value.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StructuredFailure {
    #[error("LLM call timed out after {0:?}")]
    Timeout(Duration),

    #[error("LLM provider error: {0}")]
    Provider(String),

    #[error("LLM returned malformed JSON: {0}")]
    Malformed(String),

    #[error("LLM output rejected: {0}")]
    SchemaViolation(String),
}

impl StructuredFailure {
    /// Short machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::Provider(_) => "provider_error",
            Self::Malformed(_) => "malformed_output",
            Self::SchemaViolation(_) => "schema_violation",
        }
    }
}

/// Run `request` under `timeout`, parse the content as `T`, then `validate` it.
pub async fn complete_validated<T, U, F>(
    client: &dyn LlmClient,
    request: &LlmRequest,
    timeout: Duration,
    validate: F,
) -> Result<U, StructuredFailure>
where
    T: DeserializeOwned,
    F: FnOnce(T) -> Result<U, String>,
{
    let response = match tokio::time::timeout(timeout, client.complete(request)).await {
        Err(_) => return Err(StructuredFailure::Timeout(timeout)),
        Ok(Err(e)) => return Err(StructuredFailure::Provider(e.to_string())),
        Ok(Ok(response)) => response,
    };

    let payload = strip_code_fence(&response.content);
    let parsed: T = serde_json::from_str(payload).map_err(|e| {
        tracing::debug!(content = %response.content, "Unparseable structured output");
        StructuredFailure::Malformed(e.to_string())
    })?;

    validate(parsed).map_err(StructuredFailure::SchemaViolation)
}

/// Some local models wrap JSON in a markdown fence even in JSON mode.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
