use super::account::VendorAccount;
use super::events::LedgerEvent;
use super::order::OrderRecord;
use super::payout::{PayoutId, PayoutRequest};
use super::subscription::Subscription;
use super::transaction::{LedgerTransaction, TransactionType};
use super::{OrderId, VendorId};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Everything one serialized vendor operation changes.
///
/// A store must apply a write set all-or-nothing: a reader never observes a
/// balance without the transactions that produced it.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct WriteSet {
    pub account: Option<VendorAccount>,
    pub transactions: Vec<LedgerTransaction>,
    pub subscription: Option<Subscription>,
    pub orders: Vec<OrderRecord>,
    pub payout: Option<PayoutRequest>,
}

impl WriteSet {
    pub fn is_empty(&self) -> bool {
        self.account.is_none()
            && self.transactions.is_empty()
            && self.subscription.is_none()
            && self.orders.is_empty()
            && self.payout.is_none()
    }
}

/// Selects a window of a vendor's transaction log, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionQuery {
    /// Only sequences strictly below this one.
    pub before: Option<u64>,
    pub kind: Option<TransactionType>,
    pub limit: usize,
}

impl TransactionQuery {
    pub fn matches(&self, tx: &LedgerTransaction) -> bool {
        self.before.is_none_or(|before| tx.sequence < before)
            && self.kind.is_none_or(|kind| tx.kind == kind)
    }
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn get_account(&self, vendor: VendorId) -> Result<Option<VendorAccount>>;
    async fn accounts(&self) -> Result<Vec<VendorAccount>>;
    async fn transactions(
        &self,
        vendor: VendorId,
        query: TransactionQuery,
    ) -> Result<Vec<LedgerTransaction>>;

    async fn get_subscription(&self, vendor: VendorId) -> Result<Option<Subscription>>;
    async fn subscriptions_due(&self, now: DateTime<Utc>) -> Result<Vec<Subscription>>;

    async fn get_order(&self, order: OrderId, vendor: VendorId) -> Result<Option<OrderRecord>>;
    /// Orders whose unreversed earning was delivered at or before `cutoff` and
    /// has not matured yet.
    async fn maturable_orders(&self, cutoff: DateTime<Utc>) -> Result<Vec<OrderRecord>>;

    async fn get_payout(&self, id: PayoutId) -> Result<Option<PayoutRequest>>;
    async fn payouts(&self, vendor: VendorId) -> Result<Vec<PayoutRequest>>;

    async fn commit(&self, writes: WriteSet) -> Result<()>;
}

pub type LedgerStoreRef = Arc<dyn LedgerStore>;

/// Receives ledger events. Delivery to vendors or operators happens elsewhere.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: LedgerEvent);
}

pub type EventSinkRef = Arc<dyn EventSink>;
