use super::ledger::{VendorSession, WalletLedger};
use super::SweepReport;
use crate::domain::VendorId;
use crate::domain::commission::CommissionRate;
use crate::domain::events::LedgerEvent;
use crate::domain::plan::{BillingCycle, Plan, PlanCatalog, PlanId};
use crate::domain::subscription::{Materialized, PlanChangeKind, Subscription, classify_change};
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

/// What the vendor-facing API shows about a subscription.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionView {
    pub subscription: Subscription,
    pub current_plan: Plan,
    pub upcoming_plan: Option<Plan>,
    pub commission_rate: CommissionRate,
    pub end_date: DateTime<Utc>,
}

/// Owns plan changes and keeps each vendor's cached commission rate in step
/// with the plan actually in force.
#[derive(Clone)]
pub struct SubscriptionManager {
    ledger: Arc<WalletLedger>,
    catalog: Arc<PlanCatalog>,
}

impl SubscriptionManager {
    pub fn new(ledger: Arc<WalletLedger>, catalog: Arc<PlanCatalog>) -> Self {
        Self { ledger, catalog }
    }

    fn subscription_of(session: &VendorSession) -> Result<Subscription> {
        session.subscription().cloned().ok_or_else(|| {
            LedgerError::Storage(format!("vendor {} has no subscription", session.vendor()).into())
        })
    }

    /// Selects `plan` for `vendor`.
    ///
    /// A plan at least as expensive as the current one applies immediately,
    /// including the commission rate. A cheaper plan is scheduled for the end
    /// of the current cycle and the rate stays as it is until then.
    pub async fn select_plan(
        &self,
        vendor: VendorId,
        plan: &PlanId,
        cycle: BillingCycle,
        now: DateTime<Utc>,
    ) -> Result<Subscription> {
        let requested = self.catalog.get_plan(plan)?.clone();

        let mut session = self.ledger.open(vendor).await?;
        self.apply_due(&mut session, now)?;
        let mut subscription = Self::subscription_of(&session)?;

        let kind = match self.catalog.get_plan(&subscription.plan) {
            Ok(current) => classify_change(current, &requested, cycle),
            // The current tier was withdrawn from sale; any choice is a move up.
            Err(_) => PlanChangeKind::Immediate,
        };

        match kind {
            PlanChangeKind::Immediate => {
                let from = subscription.plan.clone();
                subscription.switch_now(requested.id.clone(), cycle, now);
                session.account_mut().commission_rate = requested.commission_rate;
                info!(
                    %vendor,
                    %from,
                    to = %requested.id,
                    rate = %requested.commission_rate,
                    "Plan changed immediately"
                );
                session.emit(LedgerEvent::PlanChanged {
                    vendor,
                    from,
                    to: requested.id.clone(),
                });
            }
            PlanChangeKind::Deferred => {
                subscription.schedule(requested.id.clone(), cycle);
                info!(
                    %vendor,
                    to = %requested.id,
                    effective_at = %subscription.end_date,
                    "Plan downgrade scheduled"
                );
                session.emit(LedgerEvent::PlanChangeScheduled {
                    vendor,
                    to: requested.id.clone(),
                    effective_at: subscription.end_date,
                });
            }
        }

        session.stage_subscription(subscription.clone());
        self.ledger.commit(session).await?;
        Ok(subscription)
    }

    /// Applies a due scheduled change (and cycle renewal) to a vendor already
    /// held in `session`, refreshing the cached rate when the plan switches.
    pub fn apply_due(
        &self,
        session: &mut VendorSession,
        now: DateTime<Utc>,
    ) -> Result<Materialized> {
        let Some(mut subscription) = session.subscription().cloned() else {
            return Ok(Materialized::Unchanged);
        };
        if !subscription.is_due(now) {
            return Ok(Materialized::Unchanged);
        }

        let outcome = subscription.materialize(now);
        if let Materialized::Switched { from, to } = &outcome {
            let rate = self.catalog.get_plan(to)?.commission_rate;
            session.account_mut().commission_rate = rate;
            info!(
                vendor = %session.vendor(),
                %from,
                %to,
                %rate,
                "Scheduled plan change took effect"
            );
            session.emit(LedgerEvent::PlanChanged {
                vendor: session.vendor(),
                from: from.clone(),
                to: to.clone(),
            });
        }
        session.stage_subscription(subscription);
        Ok(outcome)
    }

    /// Promotes every scheduled change whose date has passed. Safe to rerun:
    /// already-materialized subscriptions are no longer due.
    pub async fn materialize_scheduled_changes(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let mut report = SweepReport::default();
        for due in self.ledger.store().subscriptions_due(now).await? {
            let vendor = due.vendor;
            match self.materialize_vendor(vendor, now).await {
                Ok(Materialized::Unchanged) => {}
                Ok(_) => report.applied += 1,
                Err(err) => {
                    error!(
                        %vendor,
                        error = %err,
                        "Subscription materialization failed, will retry"
                    );
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    async fn materialize_vendor(
        &self,
        vendor: VendorId,
        now: DateTime<Utc>,
    ) -> Result<Materialized> {
        let mut session = self.ledger.open(vendor).await?;
        let outcome = self.apply_due(&mut session, now)?;
        if outcome != Materialized::Unchanged {
            self.ledger.commit(session).await?;
        }
        Ok(outcome)
    }

    /// The cached rate, not a live catalog lookup, so in-flight orders see a
    /// stable value.
    pub async fn effective_rate(&self, vendor: VendorId) -> Result<CommissionRate> {
        Ok(self.ledger.account(vendor).await?.commission_rate)
    }

    pub async fn subscription(&self, vendor: VendorId) -> Result<SubscriptionView> {
        let account = self.ledger.account(vendor).await?;
        let subscription = self
            .ledger
            .store()
            .get_subscription(vendor)
            .await?
            .ok_or(LedgerError::AccountNotFound(vendor))?;
        let current_plan = self.catalog.get_plan(&subscription.plan)?.clone();
        let upcoming_plan = subscription
            .upcoming
            .as_ref()
            .map(|change| self.catalog.get_plan(&change.plan).cloned())
            .transpose()?;
        Ok(SubscriptionView {
            end_date: subscription.end_date,
            subscription,
            current_plan,
            upcoming_plan,
            commission_rate: account.commission_rate,
        })
    }
}
