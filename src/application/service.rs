use super::SweepReport;
use super::ledger::{PageRequest, TransactionPage, WalletLedger, WalletSummary};
use super::orders::{OrderLifecycleTrigger, TransitionOutcome};
use super::payouts::PayoutProcessor;
use super::subscriptions::{SubscriptionManager, SubscriptionView};
use crate::config::LedgerConfig;
use crate::domain::VendorId;
use crate::domain::account::{Balance, VendorAccount};
use crate::domain::commission::CommissionRate;
use crate::domain::order::OrderStatusChange;
use crate::domain::payout::{PayoutId, PayoutRequest};
use crate::domain::plan::{BillingCycle, PlanCatalog, PlanId};
use crate::domain::ports::{EventSinkRef, LedgerStoreRef};
use crate::domain::subscription::Subscription;
use crate::domain::transaction::{LedgerTransaction, TransactionType};
use crate::error::Result;
use crate::infrastructure::event_sink::TracingEventSink;
use crate::infrastructure::in_memory::InMemoryLedgerStore;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// One row of the end-of-run vendor report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VendorStatement {
    pub vendor: VendorId,
    pub plan: PlanId,
    pub commission_rate: CommissionRate,
    pub available: Balance,
    pub pending: Balance,
    pub total_earnings: Balance,
    pub total_commission: Balance,
}

/// Entry point for every ledger operation.
///
/// Cloning is cheap; all clones share the same store, locks and event sink.
#[derive(Clone)]
pub struct VendorLedgerService {
    catalog: Arc<PlanCatalog>,
    ledger: Arc<WalletLedger>,
    subscriptions: SubscriptionManager,
    orders: OrderLifecycleTrigger,
    payouts: PayoutProcessor,
    config: Arc<LedgerConfig>,
}

impl VendorLedgerService {
    pub fn new(
        store: LedgerStoreRef,
        events: EventSinkRef,
        catalog: PlanCatalog,
        config: LedgerConfig,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let ledger = Arc::new(WalletLedger::new(store, events));
        let subscriptions = SubscriptionManager::new(Arc::clone(&ledger), Arc::clone(&catalog));
        let orders = OrderLifecycleTrigger::new(
            Arc::clone(&ledger),
            subscriptions.clone(),
            config.maturation_delay,
        );
        let payouts = PayoutProcessor::new(Arc::clone(&ledger), config.minimum_payout);
        Self {
            catalog,
            ledger,
            subscriptions,
            orders,
            payouts,
            config: Arc::new(config),
        }
    }

    /// In-memory store, default catalog, events logged through `tracing`.
    pub fn in_memory(config: LedgerConfig) -> Self {
        Self::new(
            Arc::new(InMemoryLedgerStore::new()),
            Arc::new(TracingEventSink),
            PlanCatalog::default(),
            config,
        )
    }

    pub fn catalog(&self) -> &PlanCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Opens the vendor's wallet and starts a monthly subscription on the
    /// configured default plan.
    pub async fn onboard_vendor(
        &self,
        vendor: VendorId,
        at: DateTime<Utc>,
    ) -> Result<Subscription> {
        let plan = self.catalog.get_plan(&self.config.default_plan)?;
        let subscription = Subscription::start(vendor, plan.id.clone(), BillingCycle::Monthly, at);
        self.ledger
            .create_account(
                VendorAccount::new(vendor, plan.commission_rate),
                subscription.clone(),
            )
            .await?;
        Ok(subscription)
    }

    pub async fn on_order_status_changed(
        &self,
        change: OrderStatusChange,
    ) -> Result<TransitionOutcome> {
        self.orders.on_order_status_changed(change).await
    }

    pub async fn wallet_summary(&self, vendor: VendorId) -> Result<WalletSummary> {
        self.ledger.summary(vendor).await
    }

    pub async fn wallet_transactions(
        &self,
        vendor: VendorId,
        page: PageRequest,
        filter: Option<TransactionType>,
    ) -> Result<TransactionPage> {
        self.ledger.list_transactions(vendor, page, filter).await
    }

    pub async fn request_payout(
        &self,
        vendor: VendorId,
        amount: Decimal,
        at: DateTime<Utc>,
    ) -> Result<PayoutRequest> {
        self.payouts.request_payout(vendor, amount, at).await
    }

    pub async fn payouts(&self, vendor: VendorId) -> Result<Vec<PayoutRequest>> {
        self.payouts.payouts(vendor).await
    }

    pub async fn mark_processing(&self, id: PayoutId, at: DateTime<Utc>) -> Result<PayoutRequest> {
        self.payouts.mark_processing(id, at).await
    }

    pub async fn mark_completed(&self, id: PayoutId, at: DateTime<Utc>) -> Result<PayoutRequest> {
        self.payouts.mark_completed(id, at).await
    }

    pub async fn mark_rejected(&self, id: PayoutId, at: DateTime<Utc>) -> Result<PayoutRequest> {
        self.payouts.mark_rejected(id, at).await
    }

    pub async fn subscription(&self, vendor: VendorId) -> Result<SubscriptionView> {
        self.subscriptions.subscription(vendor).await
    }

    pub async fn select_plan(
        &self,
        vendor: VendorId,
        plan: &PlanId,
        cycle: BillingCycle,
        now: DateTime<Utc>,
    ) -> Result<Subscription> {
        self.subscriptions.select_plan(vendor, plan, cycle, now).await
    }

    pub async fn effective_rate(&self, vendor: VendorId) -> Result<CommissionRate> {
        self.subscriptions.effective_rate(vendor).await
    }

    pub async fn adjust(
        &self,
        vendor: VendorId,
        amount: Decimal,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<LedgerTransaction> {
        self.ledger.adjust(vendor, Balance::new(amount), reason, at).await
    }

    pub async fn mature_earnings(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        self.orders.mature_earnings(now).await
    }

    pub async fn materialize_scheduled_changes(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        self.subscriptions.materialize_scheduled_changes(now).await
    }

    /// Plan changes first, so renewals land before anything else runs.
    pub async fn run_sweeps(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let plans = self.materialize_scheduled_changes(now).await?;
        let earnings = self.mature_earnings(now).await?;
        let report = plans.combine(earnings);
        if report != SweepReport::default() {
            info!(
                plans_applied = plans.applied,
                earnings_matured = earnings.applied,
                failed = report.failed,
                "Sweep finished"
            );
        }
        Ok(report)
    }

    /// Every vendor's balances and current plan, ordered by vendor id.
    pub async fn statements(&self) -> Result<Vec<VendorStatement>> {
        let mut accounts = self.ledger.store().accounts().await?;
        accounts.sort_by_key(|account| account.vendor);

        let mut statements = Vec::with_capacity(accounts.len());
        for account in accounts {
            let plan = self
                .ledger
                .store()
                .get_subscription(account.vendor)
                .await?
                .map(|subscription| subscription.plan)
                .unwrap_or_else(|| self.config.default_plan.clone());
            statements.push(VendorStatement {
                vendor: account.vendor,
                plan,
                commission_rate: account.commission_rate,
                available: account.available,
                pending: account.pending,
                total_earnings: account.total_earnings,
                total_commission: account.total_commission,
            });
        }
        Ok(statements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OrderId;
    use crate::domain::order::OrderStatus;
    use crate::error::LedgerError;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_onboard_uses_default_plan() {
        let service = VendorLedgerService::in_memory(LedgerConfig::default());
        let sub = service.onboard_vendor(VendorId(3), at(1)).await.unwrap();
        assert_eq!(sub.plan.as_str(), "free");
        assert_eq!(service.effective_rate(VendorId(3)).await.unwrap().percent(), dec!(20));

        let again = service.onboard_vendor(VendorId(3), at(2)).await;
        assert!(matches!(again, Err(LedgerError::AccountExists(_))));
    }

    #[tokio::test]
    async fn test_onboard_with_unknown_default_plan() {
        let config = LedgerConfig {
            default_plan: PlanId::new("gold"),
            ..LedgerConfig::default()
        };
        let service = VendorLedgerService::in_memory(config);
        let result = service.onboard_vendor(VendorId(3), at(1)).await;
        assert!(matches!(result, Err(LedgerError::UnknownPlan(_))));
    }

    #[tokio::test]
    async fn test_run_sweeps_matures_after_delay() {
        let config = LedgerConfig::default().with_maturation_days(3).unwrap();
        let service = VendorLedgerService::in_memory(config);
        service.onboard_vendor(VendorId(1), at(1)).await.unwrap();
        for status in [OrderStatus::Shipped, OrderStatus::Delivered] {
            service
                .on_order_status_changed(OrderStatusChange {
                    order: OrderId(10),
                    vendor: VendorId(1),
                    status,
                    subtotal: Balance::new(dec!(100)),
                    at: at(2),
                })
                .await
                .unwrap();
        }

        let early = service.run_sweeps(at(2) + Duration::days(2)).await.unwrap();
        assert_eq!(early.applied, 0);

        let report = service.run_sweeps(at(2) + Duration::days(3)).await.unwrap();
        assert_eq!(report.applied, 1);
        let summary = service.wallet_summary(VendorId(1)).await.unwrap();
        assert_eq!(summary.available, Balance::new(dec!(80)));
        assert_eq!(summary.pending, Balance::ZERO);
    }

    #[tokio::test]
    async fn test_statements_sorted_by_vendor() {
        let service = VendorLedgerService::in_memory(LedgerConfig::default());
        for vendor in [5, 2, 9] {
            service.onboard_vendor(VendorId(vendor), at(1)).await.unwrap();
        }
        let vendors: Vec<u32> = service
            .statements()
            .await
            .unwrap()
            .iter()
            .map(|s| s.vendor.0)
            .collect();
        assert_eq!(vendors, [2, 5, 9]);
    }
}
