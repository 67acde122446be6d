//! Quantitative pass: model probabilities and the stats behind them.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::analysis::payload::{AnalysisPayload, QuantitativeAnalysis};
use crate::error::Result;
use crate::llm::{self, prompts, LlmClient};

pub struct QuantAnalyzer {
    llm: Arc<dyn LlmClient>,
    preferred_model: String,
}

impl QuantAnalyzer {
    pub fn new(llm: Arc<dyn LlmClient>, preferred_model: impl Into<String>) -> Self {
        Self {
            llm,
            preferred_model: preferred_model.into(),
        }
    }

    #[instrument(skip_all, fields(fixture = %payload.match_info.title()))]
    pub async fn analyze(&self, payload: &AnalysisPayload) -> Result<QuantitativeAnalysis> {
        let request = prompts::quantitative(payload, &self.preferred_model)?;
        let analysis: QuantitativeAnalysis = llm::generate(self.llm.as_ref(), &request).await?;
        info!(
            model = %analysis.model,
            has_stats = analysis.stats.is_some(),
            has_probabilities = analysis.probabilities.is_some(),
            "Quantitative analysis complete"
        );
        Ok(analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::payload::{MarketOdds, MatchIdentity};
    use crate::error::AnalysisError;
    use crate::llm::LlmRequest;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    struct Fixed(&'static str);

    #[async_trait]
    impl LlmClient for Fixed {
        async fn complete(&self, request: &LlmRequest) -> Result<Option<String>> {
            assert!(request.system.contains("dixon-coles"));
            Ok(Some(self.0.to_string()))
        }
    }

    fn payload() -> AnalysisPayload {
        AnalysisPayload::new(MatchIdentity {
            sport: "soccer_epl".to_string(),
            home_team: "Arsenal".to_string(),
            away_team: "Chelsea".to_string(),
            league: None,
            kickoff: None,
            odds: MarketOdds {
                home: dec!(2.10),
                draw: Some(dec!(3.40)),
                away: dec!(3.50),
            },
        })
    }

    #[tokio::test]
    async fn test_quant_output_decoded() {
        let analyzer = QuantAnalyzer::new(
            Arc::new(Fixed(
                r#"{"model": "Dixon-Coles",
                    "stats": {"source_url": "https://fbref.com/en/comps/9",
                              "home": {"xg_for": 1.9, "form": "WWDWL"},
                              "away": {"xg_for": 1.3}},
                    "probabilities": {"home": 0.52, "draw": 0.26, "away": 0.22}}"#,
            )),
            "dixon-coles",
        );
        let quant = analyzer.analyze(&payload()).await.unwrap();
        assert!(quant.stats.unwrap().has_xg_for_both());
        assert_eq!(quant.probabilities.unwrap().home, dec!(0.52));
    }

    #[tokio::test]
    async fn test_out_of_range_probability_rejected() {
        let analyzer = QuantAnalyzer::new(
            Arc::new(Fixed(
                r#"{"model": "poisson", "probabilities": {"home": 1.4, "away": 0.1}}"#,
            )),
            "dixon-coles",
        );
        let err = analyzer.analyze(&payload()).await.unwrap_err();
        assert!(matches!(err, AnalysisError::Validation { .. }));
    }
}
