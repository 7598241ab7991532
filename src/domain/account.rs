use super::VendorId;
use super::commission::CommissionRate;
use super::payout::PayoutId;
use super::transaction::BalanceBucket;
use crate::error::LedgerError;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// Number of decimal places money is kept at (cents).
pub const MONEY_SCALE: u32 = 2;

/// Represents a signed monetary value.
///
/// This is a wrapper around `rust_decimal::Decimal` to enforce domain-specific rules
/// and provide type safety for financial calculations. Used for running balances
/// and for the signed amount carried by every ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Balance(pub Decimal);

/// Represents a positive monetary amount for requests.
///
/// Ensures that requested amounts (payouts, adjustments) are always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, LedgerError> {
        if value > Decimal::ZERO {
            Balance::new(value).ensure_cents()?;
            Ok(Self(value))
        } else {
            Err(LedgerError::Validation(format!(
                "amount must be positive, got {value}"
            )))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = LedgerError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl From<Amount> for Balance {
    fn from(amount: Amount) -> Self {
        Self(amount.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    /// Rejects amounts carrying fractions of a cent.
    pub fn ensure_cents(self) -> Result<Self, LedgerError> {
        if self.0.normalize().scale() > MONEY_SCALE {
            return Err(LedgerError::Validation(format!(
                "amount {self} is finer than a cent"
            )));
        }
        Ok(self)
    }

    pub fn checked_add(self, rhs: Balance) -> Result<Self, LedgerError> {
        self.0
            .checked_add(rhs.0)
            .map(Self)
            .ok_or_else(|| LedgerError::Validation(format!("{self} + {rhs} overflows")))
    }

    /// Rounds to cents, halves away from zero.
    pub fn to_cents(&self) -> Self {
        Self(
            self.0
                .round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero),
        )
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Implement basic arithmetic for Balance to make it a usable Value Object
impl Add for Balance {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Balance {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Neg for Balance {
    type Output = Self;
    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl AddAssign for Balance {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Balance {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl std::iter::Sum for Balance {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Balance::ZERO, |acc, b| acc + b)
    }
}

/// The two running balances at one point in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub available: Balance,
    pub pending: Balance,
}

/// Represents the wallet state of a vendor.
///
/// Balances are a cache of the vendor's transaction log and are only ever
/// changed together with an appended transaction (see `WalletLedger`).
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct VendorAccount {
    /// The unique identifier for the vendor.
    pub vendor: VendorId,
    /// Commission rate in force, cached from the active plan.
    pub commission_rate: CommissionRate,
    /// Funds the vendor may request as payout.
    pub available: Balance,
    /// Earned funds still inside the return window.
    pub pending: Balance,
    /// Net earnings credited, less reversals.
    pub total_earnings: Balance,
    /// Platform fees recorded, less reversals.
    pub total_commission: Balance,
    /// Sequence number of the last appended transaction.
    pub last_sequence: u64,
    /// Number of payout requests ever created.
    pub payout_count: u64,
    /// The payout currently requested or processing, if any.
    pub in_flight_payout: Option<PayoutId>,
    /// Set once a refund has driven the available balance negative.
    pub needs_reconciliation: bool,
}

impl VendorAccount {
    pub fn new(vendor: VendorId, commission_rate: CommissionRate) -> Self {
        Self {
            vendor,
            commission_rate,
            available: Balance::ZERO,
            pending: Balance::ZERO,
            total_earnings: Balance::ZERO,
            total_commission: Balance::ZERO,
            last_sequence: 0,
            payout_count: 0,
            in_flight_payout: None,
            needs_reconciliation: false,
        }
    }

    pub fn snapshot(&self) -> BalanceSnapshot {
        BalanceSnapshot {
            available: self.available,
            pending: self.pending,
        }
    }

    pub fn balance(&self, bucket: BalanceBucket) -> Balance {
        match bucket {
            BalanceBucket::Available => self.available,
            BalanceBucket::Pending => self.pending,
        }
    }

    /// Applies a signed amount to one bucket.
    ///
    /// Fails if the result would be negative, unless `allow_overdraft` is set.
    pub fn apply(
        &mut self,
        bucket: BalanceBucket,
        amount: Balance,
        allow_overdraft: bool,
    ) -> Result<(), LedgerError> {
        let current = self.balance(bucket);
        let next = current.checked_add(amount)?;
        if next.is_negative() && !allow_overdraft {
            return Err(LedgerError::InsufficientFunds {
                vendor: self.vendor,
                requested: amount.abs(),
                available: current,
            });
        }
        match bucket {
            BalanceBucket::Available => self.available = next,
            BalanceBucket::Pending => self.pending = next,
        }
        Ok(())
    }

    pub fn next_sequence(&mut self) -> u64 {
        self.last_sequence += 1;
        self.last_sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn account() -> VendorAccount {
        VendorAccount::new(VendorId(1), CommissionRate::new(dec!(15)).unwrap())
    }

    #[test]
    fn test_balance_arithmetic() {
        let b1 = Balance::new(dec!(10.0));
        let b2 = Balance::new(dec!(5.0));
        assert_eq!(b1 + b2, Balance::new(dec!(15.0)));
        assert_eq!(b1 - b2, Balance::new(dec!(5.0)));
        assert_eq!(-b1, Balance::new(dec!(-10.0)));
    }

    #[test]
    fn test_balance_to_cents_rounds_half_away_from_zero() {
        assert_eq!(Balance::new(dec!(1.005)).to_cents(), Balance::new(dec!(1.01)));
        assert_eq!(Balance::new(dec!(1.015)).to_cents(), Balance::new(dec!(1.02)));
        assert_eq!(Balance::new(dec!(-1.005)).to_cents(), Balance::new(dec!(-1.01)));
    }

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(dec!(1.0)).is_ok());
        assert!(matches!(
            Amount::new(dec!(0.0)),
            Err(LedgerError::Validation(_))
        ));
        assert!(matches!(
            Amount::new(dec!(-1.0)),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn test_sub_cent_amounts_rejected() {
        assert!(Balance::new(dec!(10.01)).ensure_cents().is_ok());
        assert!(Balance::new(dec!(10.100)).ensure_cents().is_ok());
        assert!(Balance::new(dec!(10.005)).ensure_cents().is_err());
        assert!(matches!(
            Amount::new(dec!(500.001)),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn test_apply_overflow_leaves_balance() {
        let mut account = account();
        account
            .apply(BalanceBucket::Pending, Balance::new(Decimal::MAX), false)
            .unwrap();
        let result = account.apply(BalanceBucket::Pending, Balance::new(dec!(1)), false);
        assert!(matches!(result, Err(LedgerError::Validation(_))));
        assert_eq!(account.pending, Balance::new(Decimal::MAX));
    }

    #[test]
    fn test_apply_credit_and_debit() {
        let mut account = account();
        account
            .apply(BalanceBucket::Pending, Balance::new(dec!(850)), false)
            .unwrap();
        assert_eq!(account.pending, Balance::new(dec!(850)));

        account
            .apply(BalanceBucket::Pending, Balance::new(dec!(-850)), false)
            .unwrap();
        assert_eq!(account.pending, Balance::ZERO);
    }

    #[test]
    fn test_apply_insufficient_leaves_balance_untouched() {
        let mut account = account();
        account.available = Balance::new(dec!(300));

        let result = account.apply(BalanceBucket::Available, Balance::new(dec!(-500)), false);
        assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));
        assert_eq!(account.available, Balance::new(dec!(300)));
    }

    #[test]
    fn test_apply_overdraft_allowed() {
        let mut account = account();
        account
            .apply(BalanceBucket::Available, Balance::new(dec!(-20)), true)
            .unwrap();
        assert_eq!(account.available, Balance::new(dec!(-20)));
    }

    #[test]
    fn test_account_serde_round_trip() {
        let account = account();
        let json = serde_json::to_string(&account).unwrap();
        let back: VendorAccount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, account);
    }
}
