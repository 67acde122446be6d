//! Claude API client, the production LLM collaborator.
//!
//! Sends structured prompts to Claude and tracks every API call cost.

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::config::LlmConfig;
use crate::error::{AnalysisError, Result};
use crate::llm::{LlmClient, LlmRequest};
use crate::store::sqlite::{ApiCostRecord, Store};

/// Claude API pricing (per token, as of 2025 for claude-sonnet-4-20250514).
const INPUT_PRICE_PER_MILLION: Decimal = dec!(3.00);
const OUTPUT_PRICE_PER_MILLION: Decimal = dec!(15.00);
const MILLION: Decimal = dec!(1_000_000);

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";

pub struct ClaudeClient {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    max_tokens: u32,
    endpoint: String,
    store: Option<Store>,
}

impl ClaudeClient {
    pub fn new(api_key: SecretString, config: &LlmConfig, store: Option<Store>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model: config.claude_model.clone(),
            max_tokens: config.max_tokens,
            endpoint: MESSAGES_URL.to_string(),
            store,
        })
    }

    /// Point the client at a different Messages endpoint (used by tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn track_cost(
        &self,
        flow: &str,
        input_tokens: i64,
        output_tokens: i64,
        cost: Decimal,
    ) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let record = ApiCostRecord {
            id: None,
            provider: "anthropic".to_string(),
            endpoint: Some("messages".to_string()),
            input_tokens: Some(input_tokens),
            output_tokens: Some(output_tokens),
            cost: cost.to_string(),
            flow: Some(flow.to_string()),
            created_at: None,
        };
        store.insert_api_cost(&record).await?;
        Ok(())
    }
}

#[async_trait]
impl LlmClient for ClaudeClient {
    #[instrument(skip(self, request), fields(flow = request.flow))]
    async fn complete(&self, request: &LlmRequest) -> Result<Option<String>> {
        let body = ClaudeRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: Some(request.system.clone()),
            messages: vec![ClaudeMessage {
                role: "user".to_string(),
                content: request.user.clone(),
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::UpstreamHttp {
                service: "anthropic".to_string(),
                status: status.as_u16(),
                body: error_body,
            });
        }

        let api_response: ClaudeApiResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::validation("anthropic", e))?;

        let text = api_response
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect::<Vec<&str>>()
            .join("");

        let input_tokens = api_response.usage.input_tokens;
        let output_tokens = api_response.usage.output_tokens;
        let cost = calculate_cost(input_tokens, output_tokens);

        info!(
            input_tokens,
            output_tokens,
            cost = %cost,
            model = %self.model,
            "Claude API call completed"
        );

        if let Err(e) = self
            .track_cost(request.flow, input_tokens, output_tokens, cost)
            .await
        {
            warn!(error = %e, "Failed to track API cost");
        }

        if text.trim().is_empty() {
            warn!(stop_reason = ?api_response.stop_reason, "Claude returned no text");
            return Ok(None);
        }

        Ok(Some(text))
    }
}

/// Calculate the dollar cost of a Claude API call.
pub fn calculate_cost(input_tokens: i64, output_tokens: i64) -> Decimal {
    let input_cost = Decimal::from(input_tokens) * INPUT_PRICE_PER_MILLION / MILLION;
    let output_cost = Decimal::from(output_tokens) * OUTPUT_PRICE_PER_MILLION / MILLION;
    input_cost + output_cost
}

// --- Request/Response Types ---

#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ClaudeMessage>,
}

#[derive(Debug, Serialize)]
struct ClaudeMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeApiResponse {
    content: Vec<ContentBlock>,
    usage: Usage,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: i64,
    output_tokens: i64,
}
