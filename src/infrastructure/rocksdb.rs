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
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;

/// Column Family for vendor wallet states.
pub const CF_ACCOUNTS: &str = "accounts";
/// Column Family for the append-only transaction log, keyed by vendor + sequence.
pub const CF_TRANSACTIONS: &str = "transactions";
/// Column Family for subscriptions, keyed by vendor.
pub const CF_SUBSCRIPTIONS: &str = "subscriptions";
/// Column Family for per (order, vendor) processing records.
pub const CF_ORDERS: &str = "orders";
/// Column Family for payout requests, keyed by vendor + payout number.
pub const CF_PAYOUTS: &str = "payouts";

const COLUMN_FAMILIES: [&str; 5] = [
    CF_ACCOUNTS,
    CF_TRANSACTIONS,
    CF_SUBSCRIPTIONS,
    CF_ORDERS,
    CF_PAYOUTS,
];

/// A persistent store implementation using RocksDB.
///
/// Each entity lives in its own Column Family. Keys are big-endian so that a
/// vendor's transactions sort by sequence, and a commit is a single
/// `WriteBatch` so the log and the cached balances land together.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbLedgerStore {
    db: Arc<DB>,
}

fn vendor_key(vendor: VendorId) -> [u8; 4] {
    vendor.0.to_be_bytes()
}

fn transaction_key(vendor: VendorId, sequence: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(12);
    key.extend_from_slice(&vendor.0.to_be_bytes());
    key.extend_from_slice(&sequence.to_be_bytes());
    key
}

fn order_key(order: OrderId, vendor: VendorId) -> Vec<u8> {
    let mut key = Vec::with_capacity(12);
    key.extend_from_slice(&order.0.to_be_bytes());
    key.extend_from_slice(&vendor.0.to_be_bytes());
    key
}

fn payout_key(id: PayoutId) -> Vec<u8> {
    let mut key = Vec::with_capacity(12);
    key.extend_from_slice(&id.vendor.0.to_be_bytes());
    key.extend_from_slice(&id.number.to_be_bytes());
    key
}

impl RocksDbLedgerStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that every required column family exists.
    ///
    /// # Arguments
    ///
    /// * `path` - The filesystem path where the database will be stored.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()));

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            LedgerError::Storage(format!("{name} column family not found").into())
        })
    }

    fn read<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_pinned_cf(cf, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(
        &self,
        cf_name: &str,
        mut keep: impl FnMut(&T) -> bool,
    ) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut items = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            let decoded: T = serde_json::from_slice(&value)?;
            if keep(&decoded) {
                items.push(decoded);
            }
        }
        Ok(items)
    }

    fn put<T: Serialize>(
        &self,
        batch: &mut WriteBatch,
        cf_name: &str,
        key: &[u8],
        value: &T,
    ) -> Result<()> {
        let cf = self.cf(cf_name)?;
        batch.put_cf(cf, key, serde_json::to_vec(value)?);
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for RocksDbLedgerStore {
    async fn get_account(&self, vendor: VendorId) -> Result<Option<VendorAccount>> {
        self.read(CF_ACCOUNTS, &vendor_key(vendor))
    }

    async fn accounts(&self) -> Result<Vec<VendorAccount>> {
        self.scan(CF_ACCOUNTS, |_: &VendorAccount| true)
    }

    async fn transactions(
        &self,
        vendor: VendorId,
        query: TransactionQuery,
    ) -> Result<Vec<LedgerTransaction>> {
        let cf = self.cf(CF_TRANSACTIONS)?;
        let start = match query.before {
            Some(0) => return Ok(Vec::new()),
            Some(before) => transaction_key(vendor, before - 1),
            None => transaction_key(vendor, u64::MAX),
        };
        let prefix = vendor_key(vendor);

        let mut items = Vec::new();
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&start, Direction::Reverse));
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(&prefix) || items.len() >= query.limit {
                break;
            }
            let tx: LedgerTransaction = serde_json::from_slice(&value)?;
            if query.matches(&tx) {
                items.push(tx);
            }
        }
        Ok(items)
    }

    async fn get_subscription(&self, vendor: VendorId) -> Result<Option<Subscription>> {
        self.read(CF_SUBSCRIPTIONS, &vendor_key(vendor))
    }

    async fn subscriptions_due(&self, now: DateTime<Utc>) -> Result<Vec<Subscription>> {
        self.scan(CF_SUBSCRIPTIONS, |sub: &Subscription| sub.is_due(now))
    }

    async fn get_order(&self, order: OrderId, vendor: VendorId) -> Result<Option<OrderRecord>> {
        self.read(CF_ORDERS, &order_key(order, vendor))
    }

    async fn maturable_orders(&self, cutoff: DateTime<Utc>) -> Result<Vec<OrderRecord>> {
        let mut due = self.scan(CF_ORDERS, |rec: &OrderRecord| {
            rec.maturable_earning()
                .is_some_and(|earning| earning.delivered_at <= cutoff)
        })?;
        due.sort_by_key(|rec| (rec.vendor, rec.order));
        Ok(due)
    }

    async fn get_payout(&self, id: PayoutId) -> Result<Option<PayoutRequest>> {
        self.read(CF_PAYOUTS, &payout_key(id))
    }

    async fn payouts(&self, vendor: VendorId) -> Result<Vec<PayoutRequest>> {
        let cf = self.cf(CF_PAYOUTS)?;
        let prefix = vendor_key(vendor);
        let mut items = Vec::new();
        for item in self.db.prefix_iterator_cf(cf, prefix) {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            items.push(serde_json::from_slice(&value)?);
        }
        Ok(items)
    }

    async fn commit(&self, writes: WriteSet) -> Result<()> {
        if writes.is_empty() {
            return Ok(());
        }
        let mut batch = WriteBatch::default();

        for tx in &writes.transactions {
            self.put(&mut batch, CF_TRANSACTIONS, &transaction_key(tx.vendor, tx.sequence), tx)?;
        }
        if let Some(account) = &writes.account {
            self.put(&mut batch, CF_ACCOUNTS, &vendor_key(account.vendor), account)?;
        }
        if let Some(subscription) = &writes.subscription {
            self.put(&mut batch, CF_SUBSCRIPTIONS, &vendor_key(subscription.vendor), subscription)?;
        }
        for order in &writes.orders {
            self.put(&mut batch, CF_ORDERS, &order_key(order.order, order.vendor), order)?;
        }
        if let Some(payout) = &writes.payout {
            self.put(&mut batch, CF_PAYOUTS, &payout_key(payout.id), payout)?;
        }

        self.db.write(batch)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::{Balance, BalanceSnapshot};
    use crate::domain::commission::CommissionRate;
    use crate::domain::transaction::{BalanceBucket, TransactionType};
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn entry(vendor: u32, sequence: u64) -> LedgerTransaction {
        LedgerTransaction {
            vendor: VendorId(vendor),
            sequence,
            kind: TransactionType::OrderEarning,
            amount: Balance::new(dec!(5)),
            bucket: Some(BalanceBucket::Pending),
            balance_after: BalanceSnapshot::default(),
            reference: None,
            description: "earning".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_rocksdb_open_cf() {
        let dir = tempdir().unwrap();
        let store = RocksDbLedgerStore::open(dir.path()).expect("Failed to open RocksDB");

        for name in COLUMN_FAMILIES {
            assert!(store.db.cf_handle(name).is_some());
        }
    }

    #[tokio::test]
    async fn test_rocksdb_account_commit() {
        let dir = tempdir().unwrap();
        let store = RocksDbLedgerStore::open(dir.path()).unwrap();

        let mut account = VendorAccount::new(VendorId(1), CommissionRate::new(dec!(15)).unwrap());
        account.pending = Balance::new(dec!(10));

        store
            .commit(WriteSet {
                account: Some(account.clone()),
                transactions: vec![entry(1, 1), entry(1, 2)],
                ..WriteSet::default()
            })
            .await
            .unwrap();

        let retrieved = store.get_account(VendorId(1)).await.unwrap().unwrap();
        assert_eq!(retrieved, account);
        assert_eq!(store.accounts().await.unwrap().len(), 1);
        assert!(store.get_account(VendorId(2)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rocksdb_transactions_stay_within_vendor() {
        let dir = tempdir().unwrap();
        let store = RocksDbLedgerStore::open(dir.path()).unwrap();

        store
            .commit(WriteSet {
                transactions: vec![entry(1, 1), entry(1, 2), entry(1, 3), entry(2, 1)],
                ..WriteSet::default()
            })
            .await
            .unwrap();

        let page = store
            .transactions(
                VendorId(1),
                TransactionQuery {
                    before: None,
                    kind: None,
                    limit: 2,
                },
            )
            .await
            .unwrap();
        let sequences: Vec<u64> = page.iter().map(|tx| tx.sequence).collect();
        assert_eq!(sequences, [3, 2]);

        let rest = store
            .transactions(
                VendorId(1),
                TransactionQuery {
                    before: Some(2),
                    kind: None,
                    limit: 10,
                },
            )
            .await
            .unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].sequence, 1);

        let other = store
            .transactions(
                VendorId(2),
                TransactionQuery {
                    before: None,
                    kind: None,
                    limit: 10,
                },
            )
            .await
            .unwrap();
        assert_eq!(other.len(), 1);
    }
}
