use super::VendorId;
use super::account::Amount;
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Payouts are numbered per vendor, so the id carries the owning vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PayoutId {
    pub vendor: VendorId,
    pub number: u64,
}

impl fmt::Display for PayoutId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.vendor, self.number)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum PayoutStatus {
    Requested,
    Processing,
    Completed,
    Rejected,
}

impl PayoutStatus {
    pub fn is_in_flight(self) -> bool {
        matches!(self, PayoutStatus::Requested | PayoutStatus::Processing)
    }

    pub fn can_move_to(self, next: PayoutStatus) -> bool {
        matches!(
            (self, next),
            (PayoutStatus::Requested, PayoutStatus::Processing)
                | (PayoutStatus::Processing, PayoutStatus::Completed)
                | (PayoutStatus::Requested, PayoutStatus::Rejected)
                | (PayoutStatus::Processing, PayoutStatus::Rejected)
        )
    }
}

impl fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PayoutStatus::Requested => "requested",
            PayoutStatus::Processing => "processing",
            PayoutStatus::Completed => "completed",
            PayoutStatus::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

impl FromStr for PayoutStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "requested" => Ok(PayoutStatus::Requested),
            "processing" => Ok(PayoutStatus::Processing),
            "completed" => Ok(PayoutStatus::Completed),
            "rejected" => Ok(PayoutStatus::Rejected),
            other => Err(LedgerError::Validation(format!(
                "unknown payout status: {other}"
            ))),
        }
    }
}

/// A vendor withdrawal request. The amount never changes after creation.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PayoutRequest {
    pub id: PayoutId,
    pub amount: Amount,
    pub status: PayoutStatus,
    pub requested_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PayoutRequest {
    pub fn new(id: PayoutId, amount: Amount, at: DateTime<Utc>) -> Self {
        Self {
            id,
            amount,
            status: PayoutStatus::Requested,
            requested_at: at,
            updated_at: at,
        }
    }

    /// Moves the request to `next`, rejecting transitions outside the lifecycle.
    pub fn transition(&mut self, next: PayoutStatus, at: DateTime<Utc>) -> Result<(), LedgerError> {
        if !self.status.can_move_to(next) {
            return Err(LedgerError::InvalidPayoutTransition {
                payout: self.id,
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = at;
        Ok(())
    }
}
