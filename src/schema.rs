//! Validation of untyped external JSON.
//!
//! Every boundary that receives JSON from outside the process (LLM structured
//! output, odds and schedule providers) goes through [`validate`]: serde
//! checks the shape, then [`Validate`] checks value ranges serde can't express.
//! Nothing is repaired or retried.

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;

use crate::error::{AnalysisError, Result};

/// Range checks applied after a successful deserialize.
pub trait Validate {
    fn validate(&self) -> std::result::Result<(), String> {
        Ok(())
    }
}

/// Deserialize `value` into `T` and run its range checks.
pub fn validate<T>(value: serde_json::Value, origin: &str) -> Result<T>
where
    T: DeserializeOwned + Validate,
{
    let typed: T =
        serde_json::from_value(value).map_err(|e| AnalysisError::validation(origin, e))?;
    typed
        .validate()
        .map_err(|message| AnalysisError::validation(origin, message))?;
    Ok(typed)
}

/// Same as [`validate`] for a raw response body.
pub fn validate_str<T>(body: &str, origin: &str) -> Result<T>
where
    T: DeserializeOwned + Validate,
{
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| AnalysisError::validation(origin, e))?;
    validate(value, origin)
}

/// Decimal odds must pay out more than the stake.
pub fn check_decimal_odds(label: &str, odds: Decimal) -> std::result::Result<(), String> {
    if odds <= Decimal::ONE {
        return Err(format!("{label} odds must be greater than 1.0, got {odds}"));
    }
    Ok(())
}

pub fn check_probability(label: &str, p: Decimal) -> std::result::Result<(), String> {
    if p < Decimal::ZERO || p > Decimal::ONE {
        return Err(format!("{label} probability must be within [0, 1], got {p}"));
    }
    Ok(())
}

impl<T: Validate> Validate for Vec<T> {
    fn validate(&self) -> std::result::Result<(), String> {
        self.iter().try_for_each(Validate::validate)
    }
}

impl<T: Validate> Validate for Option<T> {
    fn validate(&self) -> std::result::Result<(), String> {
        self.as_ref().map_or(Ok(()), Validate::validate)
    }
}
