use super::account::Balance;
use crate::error::LedgerError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Percentage of an order subtotal retained by the platform, in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct CommissionRate(Decimal);

impl CommissionRate {
    pub fn new(percent: Decimal) -> Result<Self, LedgerError> {
        if percent < Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
            return Err(LedgerError::Validation(format!(
                "commission rate must be within 0..=100, got {percent}"
            )));
        }
        Ok(Self(percent))
    }

    /// For rates baked into the binary, which are known to be in range.
    pub(crate) const fn builtin(percent: Decimal) -> Self {
        Self(percent)
    }

    pub fn percent(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for CommissionRate {
    type Error = LedgerError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CommissionRate> for Decimal {
    fn from(rate: CommissionRate) -> Self {
        rate.0
    }
}

impl fmt::Display for CommissionRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How an order subtotal divides between the platform and the vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionSplit {
    pub platform_fee: Balance,
    pub vendor_net: Balance,
}

/// Splits `subtotal` at `rate`.
///
/// The fee is rounded to cents, halves away from zero; the vendor keeps the
/// exact remainder, so `platform_fee + vendor_net == subtotal` always holds.
pub fn split(subtotal: Balance, rate: CommissionRate) -> Result<CommissionSplit, LedgerError> {
    if subtotal.is_negative() {
        return Err(LedgerError::Validation(format!(
            "order subtotal must not be negative, got {subtotal}"
        )));
    }
    let fee = subtotal
        .value()
        .checked_mul(rate.percent())
        .and_then(|scaled| scaled.checked_div(Decimal::ONE_HUNDRED))
        .ok_or_else(|| {
            LedgerError::Validation(format!("commission on subtotal {subtotal} overflows"))
        })?;
    let platform_fee = Balance::new(fee).to_cents();
    Ok(CommissionSplit {
        platform_fee,
        vendor_net: subtotal - platform_fee,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn rate(percent: Decimal) -> CommissionRate {
        CommissionRate::new(percent).unwrap()
    }

    #[test]
    fn test_split_starter_plan() {
        let split = split(Balance::new(dec!(1000)), rate(dec!(15))).unwrap();
        assert_eq!(split.platform_fee, Balance::new(dec!(150)));
        assert_eq!(split.vendor_net, Balance::new(dec!(850)));
    }

    #[test]
    fn test_split_rounds_fee_to_cents() {
        // 33.33 * 15% = 4.9995
        let split = split(Balance::new(dec!(33.33)), rate(dec!(15))).unwrap();
        assert_eq!(split.platform_fee, Balance::new(dec!(5.00)));
        assert_eq!(split.vendor_net, Balance::new(dec!(28.33)));

        // 0.10 * 5% = 0.005, a midpoint
        let split = super::split(Balance::new(dec!(0.10)), rate(dec!(5))).unwrap();
        assert_eq!(split.platform_fee, Balance::new(dec!(0.01)));
        assert_eq!(split.vendor_net, Balance::new(dec!(0.09)));
    }

    #[test]
    fn test_split_rate_bounds() {
        let zero = split(Balance::new(dec!(250)), rate(dec!(0))).unwrap();
        assert_eq!(zero.platform_fee, Balance::ZERO);
        assert_eq!(zero.vendor_net, Balance::new(dec!(250)));

        let full = split(Balance::new(dec!(250)), rate(dec!(100))).unwrap();
        assert_eq!(full.platform_fee, Balance::new(dec!(250)));
        assert_eq!(full.vendor_net, Balance::ZERO);
    }

    #[test]
    fn test_split_rejects_negative_subtotal() {
        assert!(matches!(
            split(Balance::new(dec!(-1)), rate(dec!(10))),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn test_split_overflow_is_an_error() {
        assert!(matches!(
            split(Balance::new(Decimal::MAX), rate(dec!(20))),
            Err(LedgerError::Validation(_))
        ));
        let free = split(Balance::new(Decimal::MAX), rate(dec!(0))).unwrap();
        assert_eq!(free.vendor_net, Balance::new(Decimal::MAX));
    }

    #[test]
    fn test_rate_validation() {
        assert!(CommissionRate::new(dec!(100)).is_ok());
        assert!(CommissionRate::new(dec!(100.01)).is_err());
        assert!(CommissionRate::new(dec!(-0.5)).is_err());
    }
}
