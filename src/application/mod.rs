//! Application layer orchestrating the ledger.
//!
//! Every balance mutation runs inside a [`ledger::VendorSession`], which holds
//! the vendor's lock and commits its staged writes atomically. The services
//! here build on that: subscriptions and commission rates, the order
//! lifecycle, payouts, and the facade and background sweeper tying them
//! together.

pub mod ledger;
pub mod locks;
pub mod orders;
pub mod payouts;
pub mod service;
pub mod subscriptions;
pub mod sweeper;

/// Outcome of one batch sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub applied: usize,
    pub failed: usize,
}

impl SweepReport {
    pub fn combine(self, other: SweepReport) -> SweepReport {
        SweepReport {
            applied: self.applied + other.applied,
            failed: self.failed + other.failed,
        }
    }
}
