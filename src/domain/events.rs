use super::account::Balance;
use super::payout::{PayoutId, PayoutStatus};
use super::plan::PlanId;
use super::{OrderId, VendorId};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Facts the ledger publishes for the notification subsystem.
#[derive(Debug, Serialize, PartialEq, Clone)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    EarningPosted {
        vendor: VendorId,
        order: OrderId,
        vendor_net: Balance,
        platform_fee: Balance,
    },
    EarningReversed {
        vendor: VendorId,
        order: OrderId,
        amount: Balance,
    },
    EarningMatured {
        vendor: VendorId,
        order: OrderId,
        amount: Balance,
    },
    PayoutRequested {
        payout: PayoutId,
        amount: Balance,
    },
    PayoutStatusChanged {
        payout: PayoutId,
        status: PayoutStatus,
    },
    PlanChanged {
        vendor: VendorId,
        from: PlanId,
        to: PlanId,
    },
    PlanChangeScheduled {
        vendor: VendorId,
        to: PlanId,
        effective_at: DateTime<Utc>,
    },
    /// Operator-only: a refund overdrew the available balance.
    ReconciliationRequired {
        vendor: VendorId,
        order: OrderId,
        available: Balance,
    },
}

impl LedgerEvent {
    pub fn vendor(&self) -> VendorId {
        match self {
            LedgerEvent::EarningPosted { vendor, .. }
            | LedgerEvent::EarningReversed { vendor, .. }
            | LedgerEvent::EarningMatured { vendor, .. }
            | LedgerEvent::PlanChanged { vendor, .. }
            | LedgerEvent::PlanChangeScheduled { vendor, .. }
            | LedgerEvent::ReconciliationRequired { vendor, .. } => *vendor,
            LedgerEvent::PayoutRequested { payout, .. }
            | LedgerEvent::PayoutStatusChanged { payout, .. } => payout.vendor,
        }
    }
}
