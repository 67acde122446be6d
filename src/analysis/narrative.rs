//! Final human-readable report for one analysis.
//!
//! The low-confidence warning and the EV arithmetic are instructions in the
//! prompt; this module only types the input and output.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::analysis::payload::AnalysisPayload;
use crate::betting::ev::ValueBet;
use crate::error::Result;
use crate::llm::{self, prompts, LlmClient};
use crate::schema::Validate;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrativeReport {
    pub report: String,
    #[serde(default)]
    pub value_bets: Vec<ValueBet>,
}

impl Validate for NarrativeReport {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.report.trim().is_empty() {
            return Err("report must not be empty".to_string());
        }
        self.value_bets.validate()
    }
}

pub struct NarrativeSynthesizer {
    llm: Arc<dyn LlmClient>,
}

impl NarrativeSynthesizer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    #[instrument(skip(self, payload), fields(fixture = %payload.match_info.title()))]
    pub async fn synthesize(
        &self,
        payload: &AnalysisPayload,
        confidence: u8,
    ) -> Result<NarrativeReport> {
        let request = prompts::narrative(payload, confidence)?;
        let report: NarrativeReport = llm::generate(self.llm.as_ref(), &request).await?;
        info!(value_bets = report.value_bets.len(), "Narrative synthesized");
        Ok(report)
    }
}
