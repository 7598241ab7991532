//! Ledger configuration loaded from environment variables.
//!
//! - `LEDGER_MINIMUM_PAYOUT`: smallest payout a vendor may request (default `500`)
//! - `LEDGER_MATURATION_DAYS`: days an earning stays pending after delivery (default `7`)
//! - `LEDGER_DEFAULT_PLAN`: plan new vendors start on (default `free`)

use crate::domain::account::{Amount, Balance};
use crate::domain::plan::PlanId;
use crate::error::{LedgerError, Result};
use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const DEFAULT_MINIMUM_PAYOUT: Decimal = dec!(500);
const DEFAULT_MATURATION_DAYS: i64 = 7;
const DEFAULT_PLAN: &str = "free";

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    pub minimum_payout: Balance,
    /// How long an earning stays in the pending balance after delivery.
    pub maturation_delay: Duration,
    pub default_plan: PlanId,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            minimum_payout: Balance::new(DEFAULT_MINIMUM_PAYOUT),
            maturation_delay: Duration::days(DEFAULT_MATURATION_DAYS),
            default_plan: PlanId::new(DEFAULT_PLAN),
        }
    }
}

impl LedgerConfig {
    pub fn with_minimum_payout(mut self, minimum: Decimal) -> Result<Self> {
        self.minimum_payout = Amount::new(minimum)?.into();
        Ok(self)
    }

    pub fn with_maturation_days(mut self, days: i64) -> Result<Self> {
        if days < 0 {
            return Err(LedgerError::Validation(format!(
                "maturation delay must not be negative, got {days} days"
            )));
        }
        self.maturation_delay = Duration::days(days);
        Ok(self)
    }
}

/// Loads the ledger configuration from environment variables, falling back
/// to defaults for anything unset or empty.
///
/// # Errors
///
/// Returns [`LedgerError::Validation`] if a variable is set but malformed.
pub fn fetch_config() -> Result<LedgerConfig> {
    let mut config = LedgerConfig::default();

    if let Some(raw) = non_empty_var("LEDGER_MINIMUM_PAYOUT") {
        let minimum: Decimal = raw.parse().map_err(|_| {
            LedgerError::Validation(format!("LEDGER_MINIMUM_PAYOUT is not a number: {raw}"))
        })?;
        config = config.with_minimum_payout(minimum)?;
    }

    if let Some(raw) = non_empty_var("LEDGER_MATURATION_DAYS") {
        let days: i64 = raw.parse().map_err(|_| {
            LedgerError::Validation(format!("LEDGER_MATURATION_DAYS is not an integer: {raw}"))
        })?;
        config = config.with_maturation_days(days)?;
    }

    if let Some(plan) = non_empty_var("LEDGER_DEFAULT_PLAN") {
        config.default_plan = PlanId::new(plan);
    }

    Ok(config)
}

/// Returns the value of an environment variable if it exists and is non-empty.
fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LedgerConfig::default();
        assert_eq!(config.minimum_payout.value(), dec!(500));
        assert_eq!(config.maturation_delay, Duration::days(7));
        assert_eq!(config.default_plan.as_str(), "free");
    }

    #[test]
    fn test_builders_validate() {
        let config = LedgerConfig::default()
            .with_minimum_payout(dec!(100))
            .unwrap()
            .with_maturation_days(0)
            .unwrap();
        assert_eq!(config.minimum_payout.value(), dec!(100));
        assert_eq!(config.maturation_delay, Duration::zero());

        assert!(LedgerConfig::default().with_minimum_payout(dec!(0)).is_err());
        assert!(LedgerConfig::default().with_maturation_days(-1).is_err());
    }
}
