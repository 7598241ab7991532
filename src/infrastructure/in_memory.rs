use crate::domain::account::VendorAccount;
use crate::domain::order::OrderRecord;
use crate::domain::payout::{PayoutId, PayoutRequest};
use crate::domain::ports::{LedgerStore, TransactionQuery, WriteSet};
use crate::domain::subscription::Subscription;
use crate::domain::transaction::LedgerTransaction;
use crate::domain::{OrderId, VendorId};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    accounts: BTreeMap<VendorId, VendorAccount>,
    transactions: HashMap<VendorId, Vec<LedgerTransaction>>,
    subscriptions: BTreeMap<VendorId, Subscription>,
    orders: HashMap<(OrderId, VendorId), OrderRecord>,
    payouts: BTreeMap<PayoutId, PayoutRequest>,
}

/// A thread-safe in-memory ledger store.
///
/// Uses a single `Arc<RwLock<..>>` over all tables, so a commit is applied
/// under one write guard and every read sees a consistent snapshot.
/// Ideal for testing or small datasets where persistence is not required.
#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryLedgerStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn get_account(&self, vendor: VendorId) -> Result<Option<VendorAccount>> {
        let state = self.state.read().await;
        Ok(state.accounts.get(&vendor).cloned())
    }

    async fn accounts(&self) -> Result<Vec<VendorAccount>> {
        let state = self.state.read().await;
        Ok(state.accounts.values().cloned().collect())
    }

    async fn transactions(
        &self,
        vendor: VendorId,
        query: TransactionQuery,
    ) -> Result<Vec<LedgerTransaction>> {
        let state = self.state.read().await;
        Ok(state
            .transactions
            .get(&vendor)
            .map(|log| {
                log.iter()
                    .rev()
                    .filter(|tx| query.matches(tx))
                    .take(query.limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_subscription(&self, vendor: VendorId) -> Result<Option<Subscription>> {
        let state = self.state.read().await;
        Ok(state.subscriptions.get(&vendor).cloned())
    }

    async fn subscriptions_due(&self, now: DateTime<Utc>) -> Result<Vec<Subscription>> {
        let state = self.state.read().await;
        Ok(state
            .subscriptions
            .values()
            .filter(|sub| sub.is_due(now))
            .cloned()
            .collect())
    }

    async fn get_order(&self, order: OrderId, vendor: VendorId) -> Result<Option<OrderRecord>> {
        let state = self.state.read().await;
        Ok(state.orders.get(&(order, vendor)).cloned())
    }

    async fn maturable_orders(&self, cutoff: DateTime<Utc>) -> Result<Vec<OrderRecord>> {
        let state = self.state.read().await;
        let mut due: Vec<OrderRecord> = state
            .orders
            .values()
            .filter(|rec| {
                rec.maturable_earning()
                    .is_some_and(|earning| earning.delivered_at <= cutoff)
            })
            .cloned()
            .collect();
        due.sort_by_key(|rec| (rec.vendor, rec.order));
        Ok(due)
    }

    async fn get_payout(&self, id: PayoutId) -> Result<Option<PayoutRequest>> {
        let state = self.state.read().await;
        Ok(state.payouts.get(&id).cloned())
    }

    async fn payouts(&self, vendor: VendorId) -> Result<Vec<PayoutRequest>> {
        let state = self.state.read().await;
        Ok(state
            .payouts
            .values()
            .filter(|payout| payout.id.vendor == vendor)
            .cloned()
            .collect())
    }

    async fn commit(&self, writes: WriteSet) -> Result<()> {
        if writes.is_empty() {
            return Ok(());
        }
        let mut state = self.state.write().await;

        // Validate before touching anything so a bad batch leaves no trace.
        let mut next_sequence: HashMap<VendorId, u64> = HashMap::new();
        for tx in &writes.transactions {
            let expected = next_sequence.entry(tx.vendor).or_insert_with(|| {
                state
                    .transactions
                    .get(&tx.vendor)
                    .and_then(|log| log.last())
                    .map_or(1, |last| last.sequence + 1)
            });
            if tx.sequence != *expected {
                return Err(LedgerError::Storage(
                    format!(
                        "out of order append for vendor {}: expected sequence {}, got {}",
                        tx.vendor, expected, tx.sequence
                    )
                    .into(),
                ));
            }
            *expected += 1;
        }

        for tx in writes.transactions {
            state.transactions.entry(tx.vendor).or_default().push(tx);
        }
        if let Some(account) = writes.account {
            state.accounts.insert(account.vendor, account);
        }
        if let Some(subscription) = writes.subscription {
            state.subscriptions.insert(subscription.vendor, subscription);
        }
        for order in writes.orders {
            state.orders.insert((order.order, order.vendor), order);
        }
        if let Some(payout) = writes.payout {
            state.payouts.insert(payout.id, payout);
        }
        Ok(())
    }
}
