//! Programmatic confidence score for an analysis payload.
//!
//! Scores how much the narrative can be trusted from the shape of the data
//! behind it, not from the model's self-report.
//!
//! Axes and weights:
//! - Data source (30%): where the quantitative stats came from
//! - Completeness (40%): whether both sides carry expected-goals data
//! - Model applicability (20%): whether the preferred model produced the numbers
//! - Freshness (10%): whether a quantitative pass ran for this request

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::Serialize;
use url::Url;

use crate::analysis::payload::AnalysisPayload;
use crate::config::ScoringConfig;

const SOURCE_WEIGHT: Decimal = dec!(0.30);
const COMPLETENESS_WEIGHT: Decimal = dec!(0.40);
const MODEL_WEIGHT: Decimal = dec!(0.20);
const FRESHNESS_WEIGHT: Decimal = dec!(0.10);

/// Below this the narrative is prefixed with a low-confidence warning.
pub const LOW_CONFIDENCE_THRESHOLD: u8 = 60;

/// Per-axis tiers, kept for display next to the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConfidenceBreakdown {
    pub data_source: u8,
    pub completeness: u8,
    pub model_applicability: u8,
    pub freshness: u8,
    pub score: u8,
}

pub fn score(payload: &AnalysisPayload, config: &ScoringConfig) -> u8 {
    breakdown(payload, config).score
}

pub fn breakdown(payload: &AnalysisPayload, config: &ScoringConfig) -> ConfidenceBreakdown {
    let data_source = data_source_tier(payload, config);
    let completeness = completeness_tier(payload);
    let model_applicability = model_tier(payload, config);
    let freshness = freshness_tier(payload);

    let weighted = Decimal::from(data_source) * SOURCE_WEIGHT
        + Decimal::from(completeness) * COMPLETENESS_WEIGHT
        + Decimal::from(model_applicability) * MODEL_WEIGHT
        + Decimal::from(freshness) * FRESHNESS_WEIGHT;

    let score = weighted
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .clamp(Decimal::ZERO, dec!(100))
        .to_u8()
        .unwrap_or(0);

    ConfidenceBreakdown {
        data_source,
        completeness,
        model_applicability,
        freshness,
        score,
    }
}

fn data_source_tier(payload: &AnalysisPayload, config: &ScoringConfig) -> u8 {
    let stats = payload.quantitative.as_ref().and_then(|q| q.stats.as_ref());
    match stats {
        Some(stats) => {
            let trusted = stats
                .source_url
                .as_deref()
                .is_some_and(|url| is_high_quality_source(url, &config.high_quality_domains));
            if trusted {
                100
            } else {
                70
            }
        }
        None if payload.qualitative.as_ref().is_some_and(|q| q.has_content()) => 40,
        None => 0,
    }
}

fn completeness_tier(payload: &AnalysisPayload) -> u8 {
    match payload.quantitative.as_ref().and_then(|q| q.stats.as_ref()) {
        Some(stats) if stats.has_xg_for_both() => 100,
        Some(_) => 70,
        None => 40,
    }
}

fn model_tier(payload: &AnalysisPayload, config: &ScoringConfig) -> u8 {
    let preferred = payload
        .quantitative
        .as_ref()
        .is_some_and(|q| q.model.trim().eq_ignore_ascii_case(config.preferred_model.trim()));
    if preferred {
        100
    } else {
        30
    }
}

fn freshness_tier(payload: &AnalysisPayload) -> u8 {
    if payload.quantitative.is_some() {
        100
    } else {
        60
    }
}

/// Whether the URL's host is one of `domains` or a subdomain of one.
pub fn is_high_quality_source(url: &str, domains: &[String]) -> bool {
    let Some(host) = host_of(url) else {
        return false;
    };
    domains.iter().any(|domain| {
        let domain = domain.trim().to_ascii_lowercase();
        !domain.is_empty()
            && (host == domain
                || host
                    .strip_suffix(domain.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.')))
    })
}

fn host_of(url: &str) -> Option<String> {
    let url = url.trim();
    let parsed = if url.contains("://") {
        Url::parse(url).ok()?
    } else {
        Url::parse(&format!("https://{url}")).ok()?
    };
    parsed.host_str().map(|host| host.to_ascii_lowercase())
}
