//! The data a single analysis carries from gathering through narrative.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::betting::ev::PricedOutcome;
use crate::schema::{check_decimal_odds, check_probability, Validate};

/// Decimal prices for a 1X2 (or two-way) market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketOdds {
    #[serde(with = "rust_decimal::serde::float")]
    pub home: Decimal,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub draw: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float")]
    pub away: Decimal,
}

impl Validate for MarketOdds {
    fn validate(&self) -> Result<(), String> {
        check_decimal_odds("home", self.home)?;
        if let Some(draw) = self.draw {
            check_decimal_odds("draw", draw)?;
        }
        check_decimal_odds("away", self.away)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchIdentity {
    pub sport: String,
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub league: Option<String>,
    #[serde(default)]
    pub kickoff: Option<DateTime<Utc>>,
    pub odds: MarketOdds,
}

impl MatchIdentity {
    pub fn title(&self) -> String {
        format!("{} vs {}", self.home_team, self.away_team)
    }
}

impl Validate for MatchIdentity {
    fn validate(&self) -> Result<(), String> {
        if self.home_team.trim().is_empty() || self.away_team.trim().is_empty() {
            return Err("both team names are required".to_string());
        }
        self.odds.validate()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeamStats {
    /// Expected goals for, per match.
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub xg_for: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub xg_against: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub goals_for: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub goals_against: Option<Decimal>,
    /// Recent results, most recent last (e.g. "WWDLW").
    #[serde(default)]
    pub form: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapedStats {
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub home: TeamStats,
    #[serde(default)]
    pub away: TeamStats,
}

impl ScrapedStats {
    pub fn has_xg_for_both(&self) -> bool {
        self.home.xg_for.is_some() && self.away.xg_for.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeProbabilities {
    #[serde(with = "rust_decimal::serde::float")]
    pub home: Decimal,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub draw: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float")]
    pub away: Decimal,
}

impl Validate for OutcomeProbabilities {
    fn validate(&self) -> Result<(), String> {
        check_probability("home", self.home)?;
        if let Some(draw) = self.draw {
            check_probability("draw", draw)?;
        }
        check_probability("away", self.away)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuantitativeAnalysis {
    pub model: String,
    #[serde(default)]
    pub stats: Option<ScrapedStats>,
    #[serde(default)]
    pub probabilities: Option<OutcomeProbabilities>,
}

impl Validate for QuantitativeAnalysis {
    fn validate(&self) -> Result<(), String> {
        self.probabilities.validate()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualitativeAnalysis {
    #[serde(default)]
    pub user_input: Option<String>,
    #[serde(default)]
    pub narrative: Option<String>,
}

impl QualitativeAnalysis {
    pub fn has_content(&self) -> bool {
        let filled = |s: &Option<String>| s.as_deref().is_some_and(|v| !v.trim().is_empty());
        filled(&self.user_input) || filled(&self.narrative)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveOddsSnapshot {
    pub bookmaker: String,
    pub fetched_at: DateTime<Utc>,
    pub odds: MarketOdds,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisPayload {
    pub match_info: MatchIdentity,
    #[serde(default)]
    pub quantitative: Option<QuantitativeAnalysis>,
    #[serde(default)]
    pub qualitative: Option<QualitativeAnalysis>,
    #[serde(default)]
    pub live_odds: Option<LiveOddsSnapshot>,
    #[serde(default)]
    pub confidence_score: Option<u8>,
}

impl Validate for AnalysisPayload {
    fn validate(&self) -> Result<(), String> {
        self.match_info.validate()?;
        self.quantitative.validate()?;
        if let Some(live) = &self.live_odds {
            live.odds.validate()?;
        }
        if self.confidence_score.is_some_and(|c| c > 100) {
            return Err("confidence_score must be within [0, 100]".to_string());
        }
        Ok(())
    }
}

impl AnalysisPayload {
    pub fn new(match_info: MatchIdentity) -> Self {
        Self {
            match_info,
            quantitative: None,
            qualitative: None,
            live_odds: None,
            confidence_score: None,
        }
    }

    /// Best available prices: the live snapshot when present, else the
    /// odds the match was submitted with.
    pub fn best_odds(&self) -> &MarketOdds {
        self.live_odds
            .as_ref()
            .map_or(&self.match_info.odds, |live| &live.odds)
    }

    /// Model probabilities paired with the best available prices.
    pub fn priced_outcomes(&self) -> Vec<PricedOutcome> {
        let Some(probabilities) = self
            .quantitative
            .as_ref()
            .and_then(|q| q.probabilities.as_ref())
        else {
            return Vec::new();
        };
        let odds = self.best_odds();
        let info = &self.match_info;

        let mut outcomes = vec![PricedOutcome {
            market: format!("{} win", info.home_team),
            probability: probabilities.home,
            odds: odds.home,
        }];
        if let (Some(p), Some(o)) = (probabilities.draw, odds.draw) {
            outcomes.push(PricedOutcome {
                market: "Draw".to_string(),
                probability: p,
                odds: o,
            });
        }
        outcomes.push(PricedOutcome {
            market: format!("{} win", info.away_team),
            probability: probabilities.away,
            odds: odds.away,
        });
        outcomes
    }
}
