//! Upcoming fixtures from football-data.org (v4).
//!
//! Best-effort: each day is fetched on its own and a day that fails (HTTP
//! error, bad status or schema mismatch) is logged and skipped.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, NaiveDate, Utc};
use futures::future::join_all;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::analysis::payload::MarketOdds;
use crate::config::{RateLimitConfig, ScheduleApiConfig};
use crate::data::{create_rate_limiter, Limiter};
use crate::error::{AnalysisError, Result};
use crate::llm::json::truncate;
use crate::schema::{self, check_decimal_odds, Validate};

const SERVICE: &str = "football-data";

/// A fixture for display. Not authoritative: nothing is persisted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub home_team: String,
    pub away_team: String,
    pub league: String,
    pub odds: Option<MarketOdds>,
    /// Largest expected value among the priced outcomes, once analyzed.
    #[serde(with = "rust_decimal::serde::float_option")]
    pub value_score: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MatchesResponse {
    #[serde(default)]
    matches: Vec<FdMatch>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FdMatch {
    id: i64,
    utc_date: DateTime<Utc>,
    home_team: FdTeam,
    away_team: FdTeam,
    #[serde(default)]
    competition: Option<FdCompetition>,
    #[serde(default)]
    odds: Option<FdOdds>,
}

#[derive(Debug, Deserialize)]
struct FdTeam {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FdCompetition {
    name: String,
}

/// Only present with the odds add-on; otherwise the object carries a `msg`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FdOdds {
    #[serde(default, with = "rust_decimal::serde::float_option")]
    home_win: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    draw: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    away_win: Option<Decimal>,
}

impl Validate for MatchesResponse {
    fn validate(&self) -> std::result::Result<(), String> {
        for m in &self.matches {
            if let Some(odds) = &m.odds {
                for price in [odds.home_win, odds.draw, odds.away_win].into_iter().flatten() {
                    check_decimal_odds("schedule", price)?;
                }
            }
        }
        Ok(())
    }
}

impl FdMatch {
    /// Fixtures whose teams are still undecided (cup draws) are dropped.
    fn into_match(self) -> Option<Match> {
        let odds = self.odds.and_then(|o| {
            Some(MarketOdds {
                home: o.home_win?,
                draw: o.draw,
                away: o.away_win?,
            })
        });
        Some(Match {
            id: self.id.to_string(),
            start_time: self.utc_date,
            home_team: self.home_team.name?,
            away_team: self.away_team.name?,
            league: self.competition.map(|c| c.name).unwrap_or_default(),
            odds,
            value_score: None,
        })
    }
}

pub struct ScheduleClient {
    http: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    limiter: Arc<Limiter>,
}

impl ScheduleClient {
    pub fn new(
        api_key: SecretString,
        config: &ScheduleApiConfig,
        rate_limit: &RateLimitConfig,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            http,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            limiter: create_rate_limiter(rate_limit),
        })
    }

    /// Fixtures from today through the next `days - 1` days, in day order.
    pub async fn fetch_upcoming(&self, days: u32) -> Vec<Match> {
        self.fetch_range(Utc::now().date_naive(), days).await
    }

    #[instrument(skip(self))]
    pub async fn fetch_range(&self, start: NaiveDate, days: u32) -> Vec<Match> {
        let dates: Vec<NaiveDate> = (0..days)
            .filter_map(|offset| start.checked_add_days(Days::new(u64::from(offset))))
            .collect();

        let results = join_all(dates.iter().map(|date| self.fetch_day(*date))).await;

        let mut matches = Vec::new();
        for (date, result) in dates.iter().zip(results) {
            match result {
                Ok(day) => matches.extend(day),
                Err(e) => warn!(%date, error = %e, "Skipping schedule day"),
            }
        }
        info!(count = matches.len(), days, "Schedule fetched");
        matches
    }

    async fn fetch_day(&self, date: NaiveDate) -> Result<Vec<Match>> {
        self.limiter.until_ready().await;

        let day = date.format("%Y-%m-%d").to_string();
        let response = self
            .http
            .get(format!("{}/matches", self.base_url))
            .header("X-Auth-Token", self.api_key.expose_secret())
            .query(&[("dateFrom", day.as_str()), ("dateTo", day.as_str())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AnalysisError::UpstreamHttp {
                service: SERVICE.to_string(),
                status: status.as_u16(),
                body: truncate(&body, 500),
            });
        }

        let parsed: MatchesResponse = schema::validate_str(&body, SERVICE)?;
        Ok(parsed
            .matches
            .into_iter()
            .filter_map(FdMatch::into_match)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base_url: &str) -> ScheduleClient {
        ScheduleClient::new(
            SecretString::from("fd-token"),
            &ScheduleApiConfig {
                base_url: base_url.to_string(),
                lookahead_days: 3,
                timeout_seconds: 5,
            },
            &RateLimitConfig {
                requests_per_second: 50,
                burst_size: 50,
            },
        )
        .unwrap()
    }

    fn day_json() -> serde_json::Value {
        serde_json::json!({
            "matches": [
                {
                    "id": 501,
                    "utcDate": "2026-10-17T19:00:00Z",
                    "status": "TIMED",
                    "competition": {"name": "Premier League"},
                    "homeTeam": {"name": "Arsenal FC"},
                    "awayTeam": {"name": "Chelsea FC"},
                    "odds": {"homeWin": 2.1, "draw": 3.4, "awayWin": 3.5}
                },
                {
                    "id": 502,
                    "utcDate": "2026-10-17T21:00:00Z",
                    "competition": {"name": "FA Cup"},
                    "homeTeam": {"name": null},
                    "awayTeam": {"name": "Everton FC"},
                    "odds": {"msg": "Activate Odds-Package in User-Panel to retrieve odds."}
                }
            ]
        })
    }

    #[tokio::test]
    async fn test_failed_day_is_skipped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/matches"))
            .and(header("X-Auth-Token", "fd-token"))
            .and(query_param("dateFrom", "2026-10-17"))
            .respond_with(ResponseTemplate::new(200).set_body_json(day_json()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/matches"))
            .and(query_param("dateFrom", "2026-10-18"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/matches"))
            .and(query_param("dateFrom", "2026-10-19"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let start = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
        let matches = client(&server.uri()).fetch_range(start, 3).await;

        // One usable fixture on day one; the undecided cup tie is dropped
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "501");
        assert_eq!(matches[0].league, "Premier League");
        assert_eq!(matches[0].odds.as_ref().unwrap().home, dec!(2.1));
    }

    #[tokio::test]
    async fn test_zero_days_fetches_nothing() {
        let server = MockServer::start().await;
        let start = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
        assert!(client(&server.uri()).fetch_range(start, 0).await.is_empty());
    }
}
