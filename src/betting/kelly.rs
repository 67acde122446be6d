//! Kelly Criterion stake sizing for decimal odds.
//!
//! Computes the bankroll fraction to stake using fractional Kelly with a hard
//! cap. Plain arithmetic; no bankroll state is kept anywhere.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::config::BettingConfig;

/// Calculate the Kelly stake for a bet at decimal `odds` with win
/// probability `probability`.
///
/// # Formula
/// ```text
/// b = odds - 1                   (net odds)
/// kelly_raw = (p * b - q) / b    = (p * odds - 1) / (odds - 1)
/// adjusted = kelly_raw * kelly_fraction, capped at max_stake_pct
/// ```
pub fn kelly_stake(probability: Decimal, odds: Decimal, config: &BettingConfig) -> KellyResult {
    // Decimal odds of 1.0 or less return at most the stake
    if odds <= Decimal::ONE {
        return KellyResult::zero();
    }
    if probability <= Decimal::ZERO || probability >= Decimal::ONE {
        return KellyResult::zero();
    }

    let b = odds - Decimal::ONE;
    let p = probability;
    let q = Decimal::ONE - p;

    let kelly_raw = (p * b - q) / b;

    // Negative Kelly means no edge
    if kelly_raw <= Decimal::ZERO {
        return KellyResult {
            kelly_raw,
            stake_fraction: Decimal::ZERO,
            capped: false,
        };
    }

    let mut stake_fraction = kelly_raw * config.kelly_fraction;
    let mut capped = false;
    if stake_fraction > config.max_stake_pct {
        stake_fraction = config.max_stake_pct;
        capped = true;
    }

    KellyResult {
        kelly_raw,
        stake_fraction: stake_fraction.round_dp(4),
        capped,
    }
}

/// Stake in currency units for a given bankroll.
pub fn stake_amount(result: &KellyResult, bankroll: Decimal) -> Decimal {
    if bankroll <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (result.stake_fraction * bankroll).round_dp(2)
}

#[derive(Debug, Clone, PartialEq)]
pub struct KellyResult {
    /// Full Kelly fraction before scaling.
    pub kelly_raw: Decimal,
    /// Fraction of bankroll to stake after fractional scaling and the cap.
    pub stake_fraction: Decimal,
    /// Whether the stake was cut to max_stake_pct.
    pub capped: bool,
}

impl KellyResult {
    fn zero() -> Self {
        Self {
            kelly_raw: Decimal::ZERO,
            stake_fraction: Decimal::ZERO,
            capped: false,
        }
    }

    pub fn should_bet(&self) -> bool {
        self.stake_fraction > dec!(0)
    }
}
