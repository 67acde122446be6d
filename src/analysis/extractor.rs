//! Splits freeform batch text into one description per match.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::Result;
use crate::llm::{self, prompts, LlmClient};
use crate::schema::Validate;

#[derive(Debug, Deserialize)]
struct ExtractedMatches {
    matches: Vec<String>,
}

impl Validate for ExtractedMatches {}

pub struct MatchExtractor {
    llm: Arc<dyn LlmClient>,
}

impl MatchExtractor {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Match descriptions in the order they appear in `text`. Blank entries
    /// the model returns are dropped.
    #[instrument(skip_all, fields(text_len = text.len()))]
    pub async fn extract(&self, text: &str) -> Result<Vec<String>> {
        let request = prompts::extract_matches(text);
        let extracted: ExtractedMatches = llm::generate(self.llm.as_ref(), &request).await?;

        let matches: Vec<String> = extracted
            .matches
            .into_iter()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();

        debug!(count = matches.len(), "Matches extracted");
        Ok(matches)
    }
}
