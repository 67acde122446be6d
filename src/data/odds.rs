//! Live odds from The Odds API (v4).
//!
//! `GET {base}/sports/{sport_key}/odds?apiKey=..&regions=..&markets=h2h&oddsFormat=decimal`
//!
//! A single required fetch: a non-2xx status or a body that fails the schema
//! is returned as an error, never skipped.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::analysis::payload::{LiveOddsSnapshot, MarketOdds};
use crate::betting::ev::overround;
use crate::config::{OddsApiConfig, RateLimitConfig};
use crate::data::{create_rate_limiter, same_team, Limiter};
use crate::error::{AnalysisError, Result};
use crate::llm::json::truncate;
use crate::schema::{self, check_decimal_odds, Validate};

const SERVICE: &str = "the-odds-api";

#[derive(Debug, Clone, Deserialize)]
pub struct OddsEvent {
    #[serde(default)]
    pub id: Option<String>,
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub bookmakers: Vec<Bookmaker>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Bookmaker {
    #[serde(default)]
    pub key: String,
    pub title: String,
    #[serde(default)]
    pub markets: Vec<OddsMarket>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OddsMarket {
    pub key: String,
    #[serde(default)]
    pub outcomes: Vec<Outcome>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Outcome {
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

impl Validate for OddsEvent {
    fn validate(&self) -> std::result::Result<(), String> {
        for bookmaker in &self.bookmakers {
            for market in &bookmaker.markets {
                for outcome in &market.outcomes {
                    check_decimal_odds(&outcome.name, outcome.price)?;
                }
            }
        }
        Ok(())
    }
}

impl OddsEvent {
    fn is_fixture(&self, home: &str, away: &str) -> bool {
        same_team(&self.home_team, home) && same_team(&self.away_team, away)
    }

    /// The head-to-head prices of one bookmaker, if it quotes both sides.
    fn h2h_odds(&self, bookmaker: &Bookmaker) -> Option<MarketOdds> {
        let market = bookmaker.markets.iter().find(|m| m.key == "h2h")?;
        let price_of = |name: &str| {
            market
                .outcomes
                .iter()
                .find(|o| o.name.eq_ignore_ascii_case(name))
                .map(|o| o.price)
        };
        Some(MarketOdds {
            home: price_of(&self.home_team)?,
            draw: price_of("Draw"),
            away: price_of(&self.away_team)?,
        })
    }

    /// Prices from the bookmaker with the smallest margin.
    pub fn sharpest_odds(&self) -> Option<(String, MarketOdds)> {
        self.bookmakers
            .iter()
            .filter_map(|b| self.h2h_odds(b).map(|odds| (b.title.clone(), odds)))
            .min_by_key(|(_, odds)| {
                let prices: Vec<Decimal> = [Some(odds.home), odds.draw, Some(odds.away)]
                    .into_iter()
                    .flatten()
                    .collect();
                overround(&prices).unwrap_or(Decimal::MAX)
            })
    }
}

pub struct OddsClient {
    http: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    regions: String,
    markets: String,
    limiter: Arc<Limiter>,
}

impl OddsClient {
    pub fn new(
        api_key: SecretString,
        config: &OddsApiConfig,
        rate_limit: &RateLimitConfig,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            http,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            regions: config.regions.clone(),
            markets: config.markets.clone(),
            limiter: create_rate_limiter(rate_limit),
        })
    }

    #[instrument(skip(self))]
    pub async fn fetch_sport(&self, sport_key: &str) -> Result<Vec<OddsEvent>> {
        self.limiter.until_ready().await;

        let url = format!("{}/sports/{}/odds", self.base_url, sport_key);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("apiKey", self.api_key.expose_secret()),
                ("regions", self.regions.as_str()),
                ("markets", self.markets.as_str()),
                ("oddsFormat", "decimal"),
                ("dateFormat", "iso"),
            ])
            .send()
            .await?;

        let status = response.status();
        let remaining = response
            .headers()
            .get("x-requests-remaining")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u32>().ok());
        let body = response.text().await?;

        if !status.is_success() {
            return Err(AnalysisError::UpstreamHttp {
                service: SERVICE.to_string(),
                status: status.as_u16(),
                body: truncate(&body, 500),
            });
        }

        let events: Vec<OddsEvent> = schema::validate_str(&body, SERVICE)?;
        debug!(events = events.len(), ?remaining, "Odds fetched");
        Ok(events)
    }

    /// Live prices for one fixture; `None` when the provider has no event for
    /// these teams or no bookmaker quotes both sides.
    #[instrument(skip(self))]
    pub async fn fetch_event_odds(
        &self,
        sport_key: &str,
        home: &str,
        away: &str,
    ) -> Result<Option<LiveOddsSnapshot>> {
        let events = self.fetch_sport(sport_key).await?;
        let snapshot = events
            .iter()
            .find(|e| e.is_fixture(home, away))
            .and_then(OddsEvent::sharpest_odds)
            .map(|(bookmaker, odds)| LiveOddsSnapshot {
                bookmaker,
                fetched_at: Utc::now(),
                odds,
            });

        match &snapshot {
            Some(s) => info!(bookmaker = %s.bookmaker, "Live odds found"),
            None => info!("No live odds for fixture"),
        }
        Ok(snapshot)
    }
}
