//! One LLM call per match description.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::Result;
use crate::llm::{self, prompts, LlmClient};
use crate::schema::{check_decimal_odds, Validate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchOdds {
    #[serde(with = "rust_decimal::serde::float")]
    pub team_a: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub team_b: Decimal,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub draw: Option<Decimal>,
}

/// Structured result for a single match, as the model reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchAnalysis {
    pub team_a: String,
    pub team_b: String,
    pub odds: MatchOdds,
    pub analysis: String,
    pub value_bet_found: bool,
    #[serde(default)]
    pub recommendation: Option<String>,
}

impl Validate for MatchAnalysis {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.team_a.trim().is_empty() || self.team_b.trim().is_empty() {
            return Err("both team names are required".to_string());
        }
        check_decimal_odds("teamA", self.odds.team_a)?;
        check_decimal_odds("teamB", self.odds.team_b)?;
        if let Some(draw) = self.odds.draw {
            check_decimal_odds("draw", draw)?;
        }
        Ok(())
    }
}

pub struct SingleMatchAnalyzer {
    llm: Arc<dyn LlmClient>,
}

impl SingleMatchAnalyzer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    #[instrument(skip(self, description), fields(description_len = description.len()))]
    pub async fn analyze(&self, description: &str, sport_key: Option<&str>) -> Result<MatchAnalysis> {
        prompts::ensure_within_limit("match description", description, prompts::MAX_MATCH_CHARS)?;
        let request = prompts::analyze_match(description, sport_key);
        llm::generate(self.llm.as_ref(), &request).await
    }
}
