use super::locks::VendorLocks;
use crate::domain::VendorId;
use crate::domain::account::{Balance, BalanceSnapshot, VendorAccount};
use crate::domain::events::LedgerEvent;
use crate::domain::order::OrderRecord;
use crate::domain::payout::PayoutRequest;
use crate::domain::ports::{EventSinkRef, LedgerStoreRef, TransactionQuery, WriteSet};
use crate::domain::subscription::Subscription;
use crate::domain::transaction::{
    BalanceBucket, LedgerTransaction, TransactionReference, TransactionType,
};
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info};

/// Largest page `list_transactions` will return.
pub const MAX_PAGE_SIZE: usize = 100;

/// A request to append one entry to a vendor's log.
#[derive(Debug, Clone, PartialEq)]
pub struct Posting {
    pub kind: TransactionType,
    pub amount: Balance,
    /// Bucket currently holding the funds, for reversal types.
    pub holding: Option<BalanceBucket>,
    pub reference: Option<TransactionReference>,
    pub description: String,
}

impl Posting {
    pub fn new(kind: TransactionType, amount: Balance, description: impl Into<String>) -> Self {
        Self {
            kind,
            amount,
            holding: None,
            reference: None,
            description: description.into(),
        }
    }

    pub fn reference(mut self, reference: TransactionReference) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn from_bucket(mut self, bucket: BalanceBucket) -> Self {
        self.holding = Some(bucket);
        self
    }
}

/// Exclusive, staged access to one vendor's wallet.
///
/// Postings are applied to a private copy of the account and collected in a
/// write set; nothing is visible to readers until [`WalletLedger::commit`].
/// Dropping a session without committing discards everything it staged.
pub struct VendorSession {
    _guard: OwnedMutexGuard<()>,
    account: VendorAccount,
    subscription: Option<Subscription>,
    writes: WriteSet,
    events: Vec<LedgerEvent>,
}

impl VendorSession {
    pub fn vendor(&self) -> VendorId {
        self.account.vendor
    }

    pub fn account(&self) -> &VendorAccount {
        &self.account
    }

    pub fn account_mut(&mut self) -> &mut VendorAccount {
        &mut self.account
    }

    pub fn subscription(&self) -> Option<&Subscription> {
        self.subscription.as_ref()
    }

    pub fn stage_subscription(&mut self, subscription: Subscription) {
        self.subscription = Some(subscription.clone());
        self.writes.subscription = Some(subscription);
    }

    pub fn stage_order(&mut self, order: OrderRecord) {
        self.writes.orders.retain(|o| o.order != order.order);
        self.writes.orders.push(order);
    }

    pub fn stage_payout(&mut self, payout: PayoutRequest) {
        self.writes.payout = Some(payout);
    }

    pub fn emit(&mut self, event: LedgerEvent) {
        self.events.push(event);
    }

    /// Appends a transaction and applies its balance effect to the staged
    /// account. On error the session is left exactly as it was.
    pub fn post(&mut self, posting: Posting, at: DateTime<Utc>) -> Result<LedgerTransaction> {
        let Posting {
            kind,
            amount,
            holding,
            reference,
            description,
        } = posting;

        if kind == TransactionType::Adjustment && description.trim().is_empty() {
            return Err(LedgerError::Validation(
                "adjustments require an operator reason".to_string(),
            ));
        }

        let amount = amount.ensure_cents()?;
        let bucket = kind.resolve_bucket(amount, holding)?;

        let mut total_earnings = self.account.total_earnings;
        let mut total_commission = self.account.total_commission;
        match kind {
            TransactionType::OrderEarning
            | TransactionType::RefundDebit
            | TransactionType::PendingCancelled => {
                total_earnings = total_earnings.checked_add(amount)?;
            }
            TransactionType::Commission => {
                total_commission = total_commission.checked_add(-amount)?;
            }
            _ => {}
        }

        if let Some(bucket) = bucket {
            let overdraw = kind.may_overdraw() && bucket == BalanceBucket::Available;
            self.account.apply(bucket, amount, overdraw)?;
            if overdraw && self.account.available.is_negative() {
                self.account.needs_reconciliation = true;
            }
        }
        self.account.total_earnings = total_earnings;
        self.account.total_commission = total_commission;

        let tx = LedgerTransaction {
            vendor: self.account.vendor,
            sequence: self.account.next_sequence(),
            kind,
            amount,
            bucket,
            balance_after: self.account.snapshot(),
            reference,
            description,
            created_at: at,
        };
        debug!(
            vendor = %tx.vendor,
            sequence = tx.sequence,
            kind = %tx.kind,
            amount = %tx.amount,
            "Staged ledger posting"
        );
        self.writes.transactions.push(tx.clone());
        Ok(tx)
    }
}

/// One page of a vendor's transaction feed, newest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionPage {
    pub items: Vec<LedgerTransaction>,
    /// Token for the following page; `None` once the feed is exhausted.
    pub next: Option<PageToken>,
}

/// Opaque resume point in a transaction feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PageToken(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub token: Option<PageToken>,
    pub size: usize,
}

impl PageRequest {
    pub fn first(size: usize) -> Self {
        Self { token: None, size }
    }

    pub fn after(token: PageToken, size: usize) -> Self {
        Self {
            token: Some(token),
            size,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WalletSummary {
    pub vendor: VendorId,
    pub available: Balance,
    pub pending: Balance,
    pub total_earnings: Balance,
    pub total_commission_paid: Balance,
}

/// The serialization point for every balance mutation.
///
/// All writers go through a [`VendorSession`], which holds the vendor's lock
/// from the moment the account is loaded until its write set is committed.
pub struct WalletLedger {
    store: LedgerStoreRef,
    locks: VendorLocks,
    events: EventSinkRef,
}

impl WalletLedger {
    pub fn new(store: LedgerStoreRef, events: EventSinkRef) -> Self {
        Self {
            store,
            locks: VendorLocks::new(),
            events,
        }
    }

    pub fn store(&self) -> &LedgerStoreRef {
        &self.store
    }

    /// Locks `vendor` and loads its wallet for staged changes.
    pub async fn open(&self, vendor: VendorId) -> Result<VendorSession> {
        let guard = self.locks.acquire(vendor).await;
        let account = self
            .store
            .get_account(vendor)
            .await?
            .ok_or(LedgerError::AccountNotFound(vendor))?;
        let subscription = self.store.get_subscription(vendor).await?;
        Ok(VendorSession {
            _guard: guard,
            account,
            subscription,
            writes: WriteSet::default(),
            events: Vec::new(),
        })
    }

    /// Persists everything the session staged in one atomic write, then
    /// publishes its events and releases the vendor lock.
    pub async fn commit(&self, session: VendorSession) -> Result<()> {
        let VendorSession {
            _guard,
            account,
            mut writes,
            events,
            ..
        } = session;
        writes.account = Some(account);
        self.store.commit(writes).await?;
        for event in events {
            self.events.publish(event);
        }
        Ok(())
    }

    /// Creates the wallet and subscription of a newly onboarded vendor.
    pub async fn create_account(
        &self,
        account: VendorAccount,
        subscription: Subscription,
    ) -> Result<()> {
        let vendor = account.vendor;
        let _guard = self.locks.acquire(vendor).await;
        if self.store.get_account(vendor).await?.is_some() {
            return Err(LedgerError::AccountExists(vendor));
        }
        info!(%vendor, plan = %subscription.plan, "Opening vendor wallet");
        self.store
            .commit(WriteSet {
                account: Some(account),
                subscription: Some(subscription),
                ..WriteSet::default()
            })
            .await
    }

    /// Appends a single transaction for `vendor`.
    pub async fn post(
        &self,
        vendor: VendorId,
        posting: Posting,
        at: DateTime<Utc>,
    ) -> Result<LedgerTransaction> {
        let mut session = self.open(vendor).await?;
        let tx = session.post(posting, at)?;
        self.commit(session).await?;
        Ok(tx)
    }

    /// Operator correction. The sign of `amount` decides credit or debit and
    /// a reason is mandatory.
    pub async fn adjust(
        &self,
        vendor: VendorId,
        amount: Balance,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<LedgerTransaction> {
        let tx = self
            .post(
                vendor,
                Posting::new(TransactionType::Adjustment, amount, reason),
                at,
            )
            .await?;
        info!(%vendor, %amount, reason, "Posted manual adjustment");
        Ok(tx)
    }

    pub async fn account(&self, vendor: VendorId) -> Result<VendorAccount> {
        self.store
            .get_account(vendor)
            .await?
            .ok_or(LedgerError::AccountNotFound(vendor))
    }

    pub async fn get_balance(&self, vendor: VendorId) -> Result<BalanceSnapshot> {
        Ok(self.account(vendor).await?.snapshot())
    }

    pub async fn summary(&self, vendor: VendorId) -> Result<WalletSummary> {
        let account = self.account(vendor).await?;
        Ok(WalletSummary {
            vendor,
            available: account.available,
            pending: account.pending,
            total_earnings: account.total_earnings,
            total_commission_paid: account.total_commission,
        })
    }

    /// Returns one page of the vendor's feed, newest first, optionally
    /// restricted to one transaction type.
    pub async fn list_transactions(
        &self,
        vendor: VendorId,
        page: PageRequest,
        filter: Option<TransactionType>,
    ) -> Result<TransactionPage> {
        self.account(vendor).await?;
        let size = page.size.clamp(1, MAX_PAGE_SIZE);
        let query = TransactionQuery {
            before: page.token.map(|token| token.0),
            kind: filter,
            limit: size + 1,
        };
        let mut items = self.store.transactions(vendor, query).await?;
        let next = if items.len() > size {
            items.truncate(size);
            items.last().map(|tx| PageToken(tx.sequence))
        } else {
            None
        };
        Ok(TransactionPage { items, next })
    }

    /// Lazily walks the whole feed page by page.
    pub fn history(
        &self,
        vendor: VendorId,
        filter: Option<TransactionType>,
        page_size: usize,
    ) -> TransactionHistory<'_> {
        TransactionHistory {
            ledger: self,
            vendor,
            filter,
            page_size,
            next: Some(None),
        }
    }
}

/// Pull-based cursor over a vendor's feed. It fetches nothing until asked
/// and can be restarted from any [`PageToken`] it handed out.
pub struct TransactionHistory<'a> {
    ledger: &'a WalletLedger,
    vendor: VendorId,
    filter: Option<TransactionType>,
    page_size: usize,
    next: Option<Option<PageToken>>,
}

impl TransactionHistory<'_> {
    pub fn resume_from(mut self, token: PageToken) -> Self {
        self.next = Some(Some(token));
        self
    }

    pub async fn next_page(&mut self) -> Result<Option<TransactionPage>> {
        let Some(token) = self.next else {
            return Ok(None);
        };
        let page = self
            .ledger
            .list_transactions(
                self.vendor,
                PageRequest {
                    token,
                    size: self.page_size,
                },
                self.filter,
            )
            .await?;
        self.next = page.next.map(Some);
        Ok(Some(page))
    }
}
