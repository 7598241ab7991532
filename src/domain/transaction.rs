use super::account::{Balance, BalanceSnapshot};
use super::payout::PayoutId;
use super::{OrderId, VendorId};
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The two balances a vendor wallet holds.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BalanceBucket {
    Available,
    Pending,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    OrderEarning,
    EarningMatured,
    Commission,
    Payout,
    RefundDebit,
    PendingCancelled,
    Adjustment,
}

/// How a transaction type is allowed to move vendor balances.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BalanceRule {
    /// Positive amounts only, into the given bucket.
    Credit(BalanceBucket),
    /// Negative amounts only, out of the given bucket.
    Debit(BalanceBucket),
    /// Negative amounts only, out of whichever bucket currently holds the funds.
    DebitHolding,
    /// One leg of a pending to available transfer: negative leaves pending,
    /// positive enters available.
    Transfer,
    /// Either sign, against the given bucket.
    Signed(BalanceBucket),
    /// Recorded in the feed for transparency, moves no vendor balance.
    Reporting,
}

impl TransactionType {
    pub const ALL: [TransactionType; 7] = [
        TransactionType::OrderEarning,
        TransactionType::EarningMatured,
        TransactionType::Commission,
        TransactionType::Payout,
        TransactionType::RefundDebit,
        TransactionType::PendingCancelled,
        TransactionType::Adjustment,
    ];

    pub fn rule(self) -> BalanceRule {
        match self {
            TransactionType::OrderEarning => BalanceRule::Credit(BalanceBucket::Pending),
            TransactionType::EarningMatured => BalanceRule::Transfer,
            TransactionType::Commission => BalanceRule::Reporting,
            TransactionType::Payout => BalanceRule::Debit(BalanceBucket::Available),
            TransactionType::RefundDebit | TransactionType::PendingCancelled => {
                BalanceRule::DebitHolding
            }
            TransactionType::Adjustment => BalanceRule::Signed(BalanceBucket::Available),
        }
    }

    /// Only refunds may push the available balance below zero.
    pub fn may_overdraw(self) -> bool {
        self == TransactionType::RefundDebit
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::OrderEarning => "order_earning",
            TransactionType::EarningMatured => "earning_matured",
            TransactionType::Commission => "commission",
            TransactionType::Payout => "payout",
            TransactionType::RefundDebit => "refund_debit",
            TransactionType::PendingCancelled => "pending_cancelled",
            TransactionType::Adjustment => "adjustment",
        }
    }

    /// Resolves which bucket a posting of `amount` lands in.
    ///
    /// `holding` names the bucket that currently holds the funds and is only
    /// consulted by reversal types; it defaults to `Available`.
    pub fn resolve_bucket(
        self,
        amount: Balance,
        holding: Option<BalanceBucket>,
    ) -> Result<Option<BalanceBucket>, LedgerError> {
        if amount.is_zero() {
            return Err(LedgerError::Validation(format!(
                "{self} posting must have a non-zero amount"
            )));
        }
        let wrong_sign = || {
            LedgerError::Validation(format!("{self} posting cannot carry amount {amount}"))
        };
        match self.rule() {
            BalanceRule::Credit(bucket) if amount.is_positive() => Ok(Some(bucket)),
            BalanceRule::Debit(bucket) if amount.is_negative() => Ok(Some(bucket)),
            BalanceRule::DebitHolding if amount.is_negative() => {
                Ok(Some(holding.unwrap_or(BalanceBucket::Available)))
            }
            BalanceRule::Transfer if amount.is_negative() => Ok(Some(BalanceBucket::Pending)),
            BalanceRule::Transfer => Ok(Some(BalanceBucket::Available)),
            BalanceRule::Signed(bucket) => Ok(Some(bucket)),
            BalanceRule::Reporting => Ok(None),
            _ => Err(wrong_sign()),
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransactionType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| LedgerError::Validation(format!("unknown transaction type: {s}")))
    }
}

/// What caused a transaction.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase", tag = "kind", content = "id")]
pub enum TransactionReference {
    Order(OrderId),
    Payout(PayoutId),
}

/// An immutable ledger entry.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct LedgerTransaction {
    pub vendor: VendorId,
    /// Position in the vendor's log, starting at 1.
    pub sequence: u64,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: Balance,
    /// The balance this entry moved, `None` for reporting entries.
    pub bucket: Option<BalanceBucket>,
    pub balance_after: BalanceSnapshot,
    pub reference: Option<TransactionReference>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_rule_table() {
        assert_eq!(
            TransactionType::OrderEarning.rule(),
            BalanceRule::Credit(BalanceBucket::Pending)
        );
        assert_eq!(TransactionType::Commission.rule(), BalanceRule::Reporting);
        assert_eq!(
            TransactionType::Payout.rule(),
            BalanceRule::Debit(BalanceBucket::Available)
        );
        assert_eq!(TransactionType::RefundDebit.rule(), BalanceRule::DebitHolding);
        assert_eq!(
            TransactionType::PendingCancelled.rule(),
            BalanceRule::DebitHolding
        );
    }

    #[test]
    fn test_resolve_bucket() {
        let credit = Balance::new(dec!(10));
        let debit = Balance::new(dec!(-10));

        assert_eq!(
            TransactionType::OrderEarning.resolve_bucket(credit, None).unwrap(),
            Some(BalanceBucket::Pending)
        );
        assert_eq!(
            TransactionType::EarningMatured.resolve_bucket(debit, None).unwrap(),
            Some(BalanceBucket::Pending)
        );
        assert_eq!(
            TransactionType::EarningMatured.resolve_bucket(credit, None).unwrap(),
            Some(BalanceBucket::Available)
        );
        assert_eq!(
            TransactionType::Commission.resolve_bucket(debit, None).unwrap(),
            None
        );
        assert_eq!(
            TransactionType::PendingCancelled
                .resolve_bucket(debit, Some(BalanceBucket::Pending))
                .unwrap(),
            Some(BalanceBucket::Pending)
        );
        assert_eq!(
            TransactionType::RefundDebit.resolve_bucket(debit, None).unwrap(),
            Some(BalanceBucket::Available)
        );
    }

    #[test]
    fn test_resolve_bucket_rejects_wrong_sign_and_zero() {
        assert!(
            TransactionType::OrderEarning
                .resolve_bucket(Balance::new(dec!(-1)), None)
                .is_err()
        );
        assert!(
            TransactionType::Payout
                .resolve_bucket(Balance::new(dec!(1)), None)
                .is_err()
        );
        assert!(
            TransactionType::Adjustment
                .resolve_bucket(Balance::ZERO, None)
                .is_err()
        );
    }

    #[test]
    fn test_type_names_round_trip_through_from_str() {
        for kind in TransactionType::ALL {
            assert_eq!(kind.as_str().parse::<TransactionType>().unwrap(), kind);
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
        assert!("deposit".parse::<TransactionType>().is_err());
    }
}
