//! Confidence scoring properties over generated payloads.

use rust_decimal_macros::dec;
use value_bet_analyst::analysis::confidence::{breakdown, score};
use value_bet_analyst::analysis::payload::{
    AnalysisPayload, MarketOdds, MatchIdentity, QualitativeAnalysis, QuantitativeAnalysis,
    ScrapedStats, TeamStats,
};
use value_bet_analyst::config::ScoringConfig;

const URLS: [Option<&str>; 4] = [
    None,
    Some("https://fbref.com/en/squads/18bb7c10/Arsenal-Stats"),
    Some("https://m.sofascore.com/team/42"),
    Some("https://randomtipster.blog/post"),
];
const MODELS: [&str; 3] = ["dixon-coles", "Poisson", ""];

fn identity() -> MatchIdentity {
    MatchIdentity {
        sport: "soccer_epl".to_string(),
        home_team: "Arsenal".to_string(),
        away_team: "Chelsea".to_string(),
        league: Some("Premier League".to_string()),
        kickoff: None,
        odds: MarketOdds {
            home: dec!(2.10),
            draw: Some(dec!(3.40)),
            away: dec!(3.50),
        },
    }
}

fn side(xg: bool) -> TeamStats {
    TeamStats {
        xg_for: xg.then_some(dec!(1.4)),
        goals_for: Some(dec!(1.7)),
        ..TeamStats::default()
    }
}

/// Every combination of quantitative, qualitative and xG presence.
fn payloads(xg_home: bool, xg_away: bool) -> Vec<AnalysisPayload> {
    let mut out = Vec::new();
    for notes in [false, true] {
        let qualitative = notes.then(|| QualitativeAnalysis {
            user_input: Some("Both keepers fit".to_string()),
            narrative: None,
        });

        let mut bare = AnalysisPayload::new(identity());
        bare.qualitative = qualitative.clone();
        out.push(bare);

        for url in URLS {
            for model in MODELS {
                let mut payload = AnalysisPayload::new(identity());
                payload.qualitative = qualitative.clone();
                payload.quantitative = Some(QuantitativeAnalysis {
                    model: model.to_string(),
                    stats: Some(ScrapedStats {
                        source_url: url.map(str::to_string),
                        home: side(xg_home),
                        away: side(xg_away),
                    }),
                    probabilities: None,
                });
                out.push(payload);
            }
        }
    }
    out
}

#[test]
fn score_is_deterministic_and_bounded() {
    let config = ScoringConfig::default();
    for (home, away) in [(false, false), (true, false), (true, true)] {
        for payload in payloads(home, away) {
            let first = breakdown(&payload, &config);
            assert_eq!(first, breakdown(&payload, &config));
            assert!(first.score <= 100);
        }
    }
}

#[test]
fn xg_on_both_sides_never_lowers_the_score() {
    let config = ScoringConfig::default();
    let without = payloads(false, false);
    let with = payloads(true, true);
    for (a, b) in without.iter().zip(&with) {
        assert!(score(b, &config) >= score(a, &config));
    }
}

#[test]
fn xg_on_one_side_counts_as_incomplete() {
    let config = ScoringConfig::default();
    for (a, b) in payloads(false, false).iter().zip(&payloads(true, false)) {
        assert_eq!(score(a, &config), score(b, &config));
    }
}

#[test]
fn configured_domains_and_model_are_respected() {
    let config = ScoringConfig {
        preferred_model: "poisson".to_string(),
        high_quality_domains: vec!["randomtipster.blog".to_string()],
    };
    let mut payload = AnalysisPayload::new(identity());
    payload.quantitative = Some(QuantitativeAnalysis {
        model: "Poisson".to_string(),
        stats: Some(ScrapedStats {
            source_url: Some("https://randomtipster.blog/post".to_string()),
            home: side(true),
            away: side(true),
        }),
        probabilities: None,
    });
    assert_eq!(score(&payload, &config), 100);
    // Default domains and model: 70*0.3 + 100*0.4 + 30*0.2 + 100*0.1
    assert_eq!(score(&payload, &ScoringConfig::default()), 77);
}
