use crate::domain::account::Balance;
use crate::domain::payout::{PayoutId, PayoutStatus};
use crate::domain::plan::PlanId;
use crate::domain::VendorId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("insufficient funds for vendor {vendor}: requested {requested}, available {available}")]
    InsufficientFunds {
        vendor: VendorId,
        requested: Balance,
        available: Balance,
    },
    #[error("payout of {requested} is below the minimum payout of {minimum}")]
    BelowMinimumPayout { requested: Balance, minimum: Balance },
    #[error("vendor {vendor} already has payout {payout} in flight")]
    PayoutInFlight { vendor: VendorId, payout: PayoutId },
    #[error("unknown plan: {0}")]
    UnknownPlan(PlanId),
    #[error("no account for vendor {0}")]
    AccountNotFound(VendorId),
    #[error("vendor {0} is already onboarded")]
    AccountExists(VendorId),
    #[error("no payout {0}")]
    PayoutNotFound(PayoutId),
    #[error("payout {payout} cannot move from {from} to {to}")]
    InvalidPayoutTransition {
        payout: PayoutId,
        from: PayoutStatus,
        to: PayoutStatus,
    },
    #[error("validation error: {0}")]
    Validation(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("storage error: {0}")]
    Storage(Box<dyn std::error::Error + Send + Sync>),
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for LedgerError {
    fn from(err: rocksdb::Error) -> Self {
        LedgerError::Storage(Box::new(err))
    }
}

impl LedgerError {
    /// Whether the error is something the vendor can act on (as opposed to an
    /// operator or infrastructure problem).
    pub fn is_actionable(&self) -> bool {
        matches!(
            self,
            LedgerError::InsufficientFunds { .. }
                | LedgerError::BelowMinimumPayout { .. }
                | LedgerError::PayoutInFlight { .. }
                | LedgerError::UnknownPlan(_)
        )
    }
}
