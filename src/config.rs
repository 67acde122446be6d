use std::path::Path;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub quota: QuotaConfig,
    pub scoring: ScoringConfig,
    pub betting: BettingConfig,
    pub odds_api: OddsApiConfig,
    pub schedule_api: ScheduleApiConfig,
    pub rate_limit: RateLimitConfig,
    pub monitoring: MonitoringConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub claude_model: String,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuotaConfig {
    /// Batch analyses granted to a freshly bootstrapped free profile.
    pub default_analysis_limit: i64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            default_analysis_limit: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    pub preferred_model: String,
    pub high_quality_domains: Vec<String>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            preferred_model: "dixon-coles".to_string(),
            high_quality_domains: vec![
                "fbref.com".to_string(),
                "understat.com".to_string(),
                "fotmob.com".to_string(),
                "sofascore.com".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BettingConfig {
    /// EV strictly above this marks a value bet.
    pub value_threshold: Decimal,
    pub kelly_fraction: Decimal,
    pub max_stake_pct: Decimal,
}

impl Default for BettingConfig {
    fn default() -> Self {
        Self {
            value_threshold: Decimal::ZERO,
            kelly_fraction: Decimal::new(25, 2),
            max_stake_pct: Decimal::new(5, 2),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OddsApiConfig {
    pub base_url: String,
    pub regions: String,
    pub markets: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleApiConfig {
    pub base_url: String,
    pub lookahead_days: u32,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_second: u32,
    pub burst_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

impl DatabaseConfig {
    pub fn url(&self) -> String {
        format!("sqlite:{}", self.path)
    }
}

/// Secrets loaded exclusively from environment variables.
/// Not serializable, not stored in config files.
pub struct Secrets {
    pub anthropic_api_key: Option<SecretString>,
    pub odds_api_key: Option<SecretString>,
    pub schedule_api_key: Option<SecretString>,
}

impl Secrets {
    pub fn from_env() -> Self {
        Self {
            anthropic_api_key: env_secret("ANTHROPIC_API_KEY"),
            odds_api_key: env_secret("ODDS_API_KEY"),
            schedule_api_key: env_secret("SCHEDULE_API_KEY"),
        }
    }
}

fn env_secret(name: &str) -> Option<SecretString> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(SecretString::from)
}

impl AppConfig {
    /// Load configuration from config/default.toml, overlaying environment variables for secrets.
    pub fn load() -> Result<(Self, Secrets)> {
        dotenvy::dotenv().ok();

        let config_path = Path::new("config/default.toml");
        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: AppConfig =
            toml::from_str(&contents).context("Failed to parse config/default.toml")?;

        let secrets = Secrets::from_env();

        Ok((config, secrets))
    }
}
