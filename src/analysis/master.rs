//! Full single-match analysis: gather, score, narrate, price, record.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::analysis::confidence::{self, ConfidenceBreakdown};
use crate::analysis::narrative::NarrativeSynthesizer;
use crate::analysis::payload::{AnalysisPayload, MatchIdentity, QualitativeAnalysis};
use crate::analysis::quant::QuantAnalyzer;
use crate::auth::Session;
use crate::betting::ev::{self, ValueBet};
use crate::config::{BettingConfig, ScoringConfig};
use crate::data::odds::OddsClient;
use crate::error::{AnalysisError, Result};
use crate::llm::prompts;
use crate::schema::Validate;
use crate::store::sqlite::{HistoryRecord, Store};

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisRequest {
    pub match_info: MatchIdentity,
    /// The caller's own notes: injuries, lineups, weather.
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MasterReport {
    pub payload: AnalysisPayload,
    pub confidence: ConfidenceBreakdown,
    pub report: String,
    /// Value bets as the narrative reported them.
    pub narrative_value_bets: Vec<ValueBet>,
    /// Value bets recomputed locally from model probabilities and best odds.
    pub value_bets: Vec<ValueBet>,
    pub history_id: Option<String>,
}

pub struct MasterAnalysis {
    quant: QuantAnalyzer,
    narrative: NarrativeSynthesizer,
    odds: Option<Arc<OddsClient>>,
    history: Option<Store>,
    scoring: ScoringConfig,
    betting: BettingConfig,
}

impl MasterAnalysis {
    pub fn new(
        quant: QuantAnalyzer,
        narrative: NarrativeSynthesizer,
        scoring: ScoringConfig,
        betting: BettingConfig,
    ) -> Self {
        Self {
            quant,
            narrative,
            odds: None,
            history: None,
            scoring,
            betting,
        }
    }

    pub fn with_odds(mut self, odds: Arc<OddsClient>) -> Self {
        self.odds = Some(odds);
        self
    }

    pub fn with_history(mut self, store: Store) -> Self {
        self.history = Some(store);
        self
    }

    #[instrument(skip_all, fields(fixture = %request.match_info.title()))]
    pub async fn run(&self, session: &dyn Session, request: AnalysisRequest) -> Result<MasterReport> {
        request
            .match_info
            .validate()
            .map_err(AnalysisError::InvalidInput)?;
        if let Some(notes) = &request.notes {
            prompts::ensure_within_limit("notes", notes, prompts::MAX_NOTES_CHARS)?;
        }

        let mut payload = AnalysisPayload::new(request.match_info);

        // Gather: each source may fail on its own
        let info = &payload.match_info;
        let live_odds = async {
            match &self.odds {
                Some(client) => {
                    client
                        .fetch_event_odds(&info.sport, &info.home_team, &info.away_team)
                        .await
                }
                None => Ok(None),
            }
        };
        let (quantitative, live_odds) = tokio::join!(self.quant.analyze(&payload), live_odds);

        payload.quantitative = settle("quantitative", quantitative);
        payload.live_odds = settle("live_odds", live_odds).flatten();
        payload.qualitative = request
            .notes
            .filter(|n| !n.trim().is_empty())
            .map(|notes| QualitativeAnalysis {
                user_input: Some(notes),
                narrative: None,
            });

        let confidence = confidence::breakdown(&payload, &self.scoring);
        payload.confidence_score = Some(confidence.score);

        let narrative = self.narrative.synthesize(&payload, confidence.score).await?;
        let value_bets = ev::value_bets(&payload.priced_outcomes(), &self.betting);

        let history_id = match session.user_id() {
            Some(uid) => self.record(&uid, &payload, &narrative.report).await,
            None => None,
        };

        info!(
            confidence = confidence.score,
            value_bets = value_bets.len(),
            live_odds = payload.live_odds.is_some(),
            "Analysis complete"
        );

        Ok(MasterReport {
            payload,
            confidence,
            report: narrative.report,
            narrative_value_bets: narrative.value_bets,
            value_bets,
            history_id,
        })
    }

    /// Best effort: a failed save is logged and the analysis still returns.
    async fn record(&self, uid: &str, payload: &AnalysisPayload, report: &str) -> Option<String> {
        let store = self.history.as_ref()?;
        let payload_json = match serde_json::to_string(payload) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Failed to serialize payload for history");
                return None;
            }
        };
        let record = HistoryRecord {
            id: uuid::Uuid::new_v4().to_string(),
            uid: uid.to_string(),
            kind: "analysis".to_string(),
            title: payload.match_info.title(),
            confidence_score: payload.confidence_score.map(i64::from),
            payload: payload_json,
            report: report.to_string(),
            created_at: None,
        };
        match store.insert_history(&record).await {
            Ok(()) => Some(record.id),
            Err(e) => {
                warn!(uid, error = %e, "Failed to save analysis history");
                None
            }
        }
    }
}

fn settle<T>(source: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(source, error = %e, "Data source failed, continuing without it");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::payload::MarketOdds;
    use crate::auth::StaticSession;
    use crate::llm::{LlmClient, LlmRequest};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    /// Answers the narrative flow; the quantitative flow returns `quant`.
    struct ByFlow {
        quant: Option<&'static str>,
    }

    #[async_trait]
    impl LlmClient for ByFlow {
        async fn complete(&self, request: &LlmRequest) -> Result<Option<String>> {
            Ok(match request.flow {
                prompts::QUANT_FLOW => self.quant.map(str::to_string),
                prompts::NARRATIVE_FLOW => Some(r#"{"report": "Arsenal to win.", "valueBets": []}"#.to_string()),
                other => panic!("unexpected flow {other}"),
            })
        }
    }

    fn master(quant: Option<&'static str>) -> MasterAnalysis {
        let llm: Arc<dyn LlmClient> = Arc::new(ByFlow { quant });
        MasterAnalysis::new(
            QuantAnalyzer::new(llm.clone(), "dixon-coles"),
            NarrativeSynthesizer::new(llm),
            ScoringConfig::default(),
            BettingConfig::default(),
        )
    }

    fn request(notes: Option<&str>) -> AnalysisRequest {
        AnalysisRequest {
            match_info: MatchIdentity {
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
            },
            notes: notes.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_failed_quant_pass_still_reports() {
        let report = master(None)
            .run(&StaticSession::anonymous(), request(Some("Saka out")))
            .await
            .unwrap();
        assert!(report.payload.quantitative.is_none());
        // qualitative only: 40*0.3 + 40*0.4 + 30*0.2 + 60*0.1
        assert_eq!(report.confidence.score, 40);
        assert!(report.value_bets.is_empty());
        assert!(report.history_id.is_none());
    }

    #[tokio::test]
    async fn test_local_value_bets_and_history() {
        let store = Store::new(":memory:").await.unwrap();
        let quant = r#"{"model": "dixon-coles",
            "stats": {"source_url": "https://fbref.com/en/", "home": {"xg_for": 1.8}, "away": {"xg_for": 1.2}},
            "probabilities": {"home": 0.55, "draw": 0.25, "away": 0.20}}"#;
        let report = master(Some(quant))
            .with_history(store.clone())
            .run(&StaticSession::user("u1"), request(None))
            .await
            .unwrap();

        assert_eq!(report.confidence.score, 100);
        assert_eq!(report.payload.confidence_score, Some(100));
        // Only the home side is priced above its probability: 0.55 * 2.10 - 1
        assert_eq!(report.value_bets.len(), 1);
        assert_eq!(report.value_bets[0].expected_value, dec!(0.155));

        let history = store.get_history("u1", 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(Some(history[0].id.clone()), report.history_id);
        assert_eq!(history[0].title, "Arsenal vs Chelsea");
    }

    #[tokio::test]
    async fn test_invalid_match_rejected() {
        let mut bad = request(None);
        bad.match_info.odds.home = dec!(1.0);
        let err = master(None)
            .run(&StaticSession::anonymous(), bad)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_overlong_notes_rejected() {
        let store = Store::new(":memory:").await.unwrap();
        let notes = "n".repeat(prompts::MAX_NOTES_CHARS + 1);
        let err = master(None)
            .with_history(store.clone())
            .run(&StaticSession::user("u1"), request(Some(&notes)))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput(_)));
        assert!(store.get_history("u1", 10).await.unwrap().is_empty());
    }
}
