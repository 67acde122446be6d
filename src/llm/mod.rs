pub mod claude;
pub mod json;
pub mod prompts;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::{AnalysisError, Result};
use crate::schema::{self, Validate};

/// The LLM collaborator. Returns the model's text, or `None` when the model
/// produced nothing usable.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &LlmRequest) -> Result<Option<String>>;
}

/// One structured prompt: a named flow, its system instructions and the
/// rendered user input.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub flow: &'static str,
    pub system: String,
    pub user: String,
}

/// Run a prompt and decode the structured output into `T`.
///
/// No text or no JSON object in the text is `OutputMissing`; JSON that does
/// not match `T` is a `Validation` failure.
pub async fn generate<T>(llm: &dyn LlmClient, request: &LlmRequest) -> Result<T>
where
    T: DeserializeOwned + Validate,
{
    let text = llm
        .complete(request)
        .await?
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AnalysisError::output_missing(request.flow))?;

    let json_str =
        json::extract_json(&text).ok_or_else(|| AnalysisError::output_missing(request.flow))?;

    schema::validate_str(&json_str, request.flow)
}
