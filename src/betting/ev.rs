//! Expected value of a bet at decimal odds.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::betting::kelly::kelly_stake;
use crate::config::BettingConfig;
use crate::schema::{check_decimal_odds, check_probability, Validate};

/// EV per unit staked: `probability × odds − 1`.
pub fn expected_value(probability: Decimal, odds: Decimal) -> Decimal {
    probability * odds - Decimal::ONE
}

pub fn is_value_bet(expected_value: Decimal, threshold: Decimal) -> bool {
    expected_value > threshold
}

/// Probability the bookmaker's price implies, margin included.
pub fn implied_probability(odds: Decimal) -> Option<Decimal> {
    (odds > Decimal::ZERO).then(|| Decimal::ONE / odds)
}

/// Bookmaker overround across a full set of outcome prices (0.05 = 5% margin).
pub fn overround(odds: &[Decimal]) -> Option<Decimal> {
    let implied: Option<Decimal> = odds.iter().map(|o| implied_probability(*o)).sum();
    implied.map(|total| total - Decimal::ONE)
}

/// A priced outcome with a model probability attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricedOutcome {
    pub market: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub probability: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub odds: Decimal,
}

impl Validate for PricedOutcome {
    fn validate(&self) -> Result<(), String> {
        check_probability(&self.market, self.probability)?;
        check_decimal_odds(&self.market, self.odds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueBet {
    pub market: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub odds: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub probability: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub expected_value: Decimal,
    /// Fractional-Kelly share of bankroll; absent on model-reported bets.
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub kelly_stake: Option<Decimal>,
}

impl Validate for ValueBet {
    fn validate(&self) -> Result<(), String> {
        check_probability(&self.market, self.probability)?;
        check_decimal_odds(&self.market, self.odds)
    }
}

impl ValueBet {
    pub fn price(outcome: &PricedOutcome, config: &BettingConfig) -> Self {
        let kelly = kelly_stake(outcome.probability, outcome.odds, config);
        Self {
            market: outcome.market.clone(),
            odds: outcome.odds,
            probability: outcome.probability,
            expected_value: expected_value(outcome.probability, outcome.odds),
            kelly_stake: Some(kelly.stake_fraction),
        }
    }

    pub fn is_value(&self, threshold: Decimal) -> bool {
        is_value_bet(self.expected_value, threshold)
    }
}

/// Price every outcome and keep those above the value threshold, best EV first.
pub fn value_bets(outcomes: &[PricedOutcome], config: &BettingConfig) -> Vec<ValueBet> {
    let mut bets: Vec<ValueBet> = outcomes
        .iter()
        .map(|o| ValueBet::price(o, config))
        .filter(|b| b.is_value(config.value_threshold))
        .collect();
    bets.sort_by(|a, b| b.expected_value.cmp(&a.expected_value));
    bets
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn outcome(market: &str, probability: Decimal, odds: Decimal) -> PricedOutcome {
        PricedOutcome {
            market: market.to_string(),
            probability,
            odds,
        }
    }

    #[test]
    fn test_expected_value_reference_case() {
        let ev = expected_value(dec!(0.55), dec!(2.10));
        assert_eq!(ev, dec!(0.155));
        assert!(is_value_bet(ev, Decimal::ZERO));
    }

    #[test]
    fn test_break_even_is_not_value() {
        let ev = expected_value(dec!(0.50), dec!(2.00));
        assert_eq!(ev, Decimal::ZERO);
        assert!(!is_value_bet(ev, Decimal::ZERO));
    }

    #[test]
    fn test_implied_probability_and_overround() {
        assert_eq!(implied_probability(dec!(2.00)), Some(dec!(0.5)));
        assert_eq!(implied_probability(Decimal::ZERO), None);
        // two-way market at 1.90 each → 5.26% margin
        let margin = overround(&[dec!(1.90), dec!(1.90)]).unwrap();
        assert_eq!(margin.round_dp(4), dec!(0.0526));
    }

    #[test]
    fn test_value_bets_filters_and_sorts() {
        let config = BettingConfig::default();
        let bets = value_bets(
            &[
                outcome("Home", dec!(0.55), dec!(2.10)),
                outcome("Draw", dec!(0.25), dec!(3.40)),
                outcome("Away", dec!(0.30), dec!(4.00)),
            ],
            &config,
        );
        // Home EV 0.155, Draw EV -0.15, Away EV 0.20
        assert_eq!(bets.len(), 2);
        assert_eq!(bets[0].market, "Away");
        assert_eq!(bets[0].expected_value, dec!(0.20));
        assert_eq!(bets[1].market, "Home");
        assert!(bets.iter().all(|b| b.kelly_stake.unwrap() > Decimal::ZERO));
    }

    #[test]
    fn test_value_bet_wire_format() {
        let json = serde_json::json!({
            "market": "Home",
            "odds": 2.1,
            "probability": 0.55,
            "expectedValue": 0.155
        });
        let bet: ValueBet = serde_json::from_value(json).unwrap();
        assert_eq!(bet.expected_value, dec!(0.155));
        assert!(bet.kelly_stake.is_none());
        assert!(bet.validate().is_ok());
    }
}
