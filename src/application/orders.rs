use super::SweepReport;
use super::ledger::{Posting, VendorSession, WalletLedger};
use super::subscriptions::SubscriptionManager;
use crate::domain::account::Balance;
use crate::domain::commission::{self, CommissionSplit};
use crate::domain::events::LedgerEvent;
use crate::domain::order::{
    OrderEffect, OrderRecord, OrderStatus, OrderStatusChange, RecordedEarning,
};
use crate::domain::transaction::{BalanceBucket, TransactionReference, TransactionType};
use crate::domain::{OrderId, VendorId};
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};

/// What an order status change did.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    /// The change is outside the lifecycle or a replay; nothing was written.
    Ignored { from: OrderStatus, to: OrderStatus },
    /// Status recorded, no money moved.
    Recorded { status: OrderStatus },
    /// Delivery credited the vendor's pending balance.
    Earned { split: CommissionSplit },
    /// A cancellation or return reversed the earning.
    Reversed {
        amount: Balance,
        from: BalanceBucket,
        reconciliation_required: bool,
    },
}

/// Turns order status changes into ledger postings, exactly once per
/// (order, vendor) transition, and matures earnings after the return window.
#[derive(Clone)]
pub struct OrderLifecycleTrigger {
    ledger: Arc<WalletLedger>,
    subscriptions: SubscriptionManager,
    maturation_delay: Duration,
}

impl OrderLifecycleTrigger {
    pub fn new(
        ledger: Arc<WalletLedger>,
        subscriptions: SubscriptionManager,
        maturation_delay: Duration,
    ) -> Self {
        Self {
            ledger,
            subscriptions,
            maturation_delay,
        }
    }

    pub async fn on_order_status_changed(
        &self,
        change: OrderStatusChange,
    ) -> Result<TransitionOutcome> {
        if change.subtotal.is_negative() {
            return Err(LedgerError::Validation(format!(
                "order {} has negative subtotal {}",
                change.order, change.subtotal
            )));
        }
        change.subtotal.ensure_cents()?;

        let mut session = self.ledger.open(change.vendor).await?;
        let existing = self
            .ledger
            .store()
            .get_order(change.order, change.vendor)
            .await?;
        let first_seen = existing.is_none();
        let mut record = existing.unwrap_or_else(|| OrderRecord::new(&change));

        let effect = if first_seen && change.status == OrderStatus::Pending {
            Some(OrderEffect::StatusOnly)
        } else {
            record.effect_of(change.status)
        };
        let Some(effect) = effect else {
            warn!(
                order = %change.order,
                vendor = %change.vendor,
                from = %record.status,
                to = %change.status,
                "Ignoring order transition outside the lifecycle"
            );
            return Ok(TransitionOutcome::Ignored {
                from: record.status,
                to: change.status,
            });
        };

        let outcome = match effect {
            OrderEffect::StatusOnly => TransitionOutcome::Recorded {
                status: change.status,
            },
            OrderEffect::Earn => self.earn(&mut session, &mut record, &change)?,
            OrderEffect::Reverse => self.reverse(&mut session, &mut record, &change)?,
        };

        record.status = change.status;
        record.updated_at = change.at;
        session.stage_order(record);
        self.ledger.commit(session).await?;
        Ok(outcome)
    }

    fn earn(
        &self,
        session: &mut VendorSession,
        record: &mut OrderRecord,
        change: &OrderStatusChange,
    ) -> Result<TransitionOutcome> {
        // A downgrade that fell due before delivery must already apply.
        self.subscriptions.apply_due(session, change.at)?;

        let rate = session.account().commission_rate;
        let split = commission::split(change.subtotal, rate)?;
        let reference = TransactionReference::Order(change.order);

        if split.vendor_net.is_positive() {
            session.post(
                Posting::new(
                    TransactionType::OrderEarning,
                    split.vendor_net,
                    format!("Earning for order {}", change.order),
                )
                .reference(reference),
                change.at,
            )?;
        }
        if split.platform_fee.is_positive() {
            session.post(
                Posting::new(
                    TransactionType::Commission,
                    -split.platform_fee,
                    format!("Commission at {rate}% on order {}", change.order),
                )
                .reference(reference),
                change.at,
            )?;
        }

        record.subtotal = change.subtotal;
        record.earning = Some(RecordedEarning {
            split,
            rate,
            delivered_at: change.at,
            matured: false,
            reversed: false,
        });

        info!(
            vendor = %change.vendor,
            order = %change.order,
            vendor_net = %split.vendor_net,
            platform_fee = %split.platform_fee,
            "Order delivered, earning posted"
        );
        session.emit(LedgerEvent::EarningPosted {
            vendor: change.vendor,
            order: change.order,
            vendor_net: split.vendor_net,
            platform_fee: split.platform_fee,
        });
        Ok(TransitionOutcome::Earned { split })
    }

    fn reverse(
        &self,
        session: &mut VendorSession,
        record: &mut OrderRecord,
        change: &OrderStatusChange,
    ) -> Result<TransitionOutcome> {
        let Some(earning) = record.earning.as_mut() else {
            return Ok(TransitionOutcome::Recorded {
                status: change.status,
            });
        };

        let (kind, bucket) = if earning.matured {
            (TransactionType::RefundDebit, BalanceBucket::Available)
        } else {
            (TransactionType::PendingCancelled, BalanceBucket::Pending)
        };
        let reference = TransactionReference::Order(change.order);
        let net = earning.split.vendor_net;
        let fee = earning.split.platform_fee;

        let mut reconciliation_required = false;
        if net.is_positive() {
            let tx = session.post(
                Posting::new(kind, -net, format!("Order {} {}", change.order, change.status))
                    .reference(reference)
                    .from_bucket(bucket),
                change.at,
            )?;
            reconciliation_required =
                kind.may_overdraw() && tx.balance_after.available.is_negative();
        }
        if fee.is_positive() {
            session.post(
                Posting::new(
                    TransactionType::Commission,
                    fee,
                    format!("Commission reversed for order {}", change.order),
                )
                .reference(reference),
                change.at,
            )?;
        }
        earning.reversed = true;

        if reconciliation_required {
            let available = session.account().available;
            warn!(
                vendor = %change.vendor,
                order = %change.order,
                %available,
                "Refund exceeded available balance, flagged for reconciliation"
            );
            session.emit(LedgerEvent::ReconciliationRequired {
                vendor: change.vendor,
                order: change.order,
                available,
            });
        }
        info!(
            vendor = %change.vendor,
            order = %change.order,
            amount = %net,
            kind = %kind,
            "Earning reversed"
        );
        session.emit(LedgerEvent::EarningReversed {
            vendor: change.vendor,
            order: change.order,
            amount: net,
        });

        Ok(TransitionOutcome::Reversed {
            amount: net,
            from: bucket,
            reconciliation_required,
        })
    }

    /// Moves every earning whose return window has closed from pending to
    /// available. Each earning matures at most once; failures are logged and
    /// picked up again by the next run.
    pub async fn mature_earnings(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let cutoff = now - self.maturation_delay;
        let mut report = SweepReport::default();
        for record in self.ledger.store().maturable_orders(cutoff).await? {
            match self.mature_one(record.order, record.vendor, cutoff, now).await {
                Ok(true) => report.applied += 1,
                Ok(false) => {}
                Err(err) => {
                    error!(
                        vendor = %record.vendor,
                        order = %record.order,
                        error = %err,
                        "Earning maturation failed, will retry"
                    );
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    async fn mature_one(
        &self,
        order: OrderId,
        vendor: VendorId,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut session = self.ledger.open(vendor).await?;
        // Re-read under the lock: a reversal may have won the race.
        let Some(mut record) = self.ledger.store().get_order(order, vendor).await? else {
            return Ok(false);
        };
        let amount = match record.maturable_earning() {
            Some(earning) if earning.delivered_at <= cutoff => earning.split.vendor_net,
            _ => return Ok(false),
        };

        if amount.is_positive() {
            let reference = TransactionReference::Order(order);
            session.post(
                Posting::new(
                    TransactionType::EarningMatured,
                    -amount,
                    format!("Order {order} earning released from pending"),
                )
                .reference(reference),
                now,
            )?;
            session.post(
                Posting::new(
                    TransactionType::EarningMatured,
                    amount,
                    format!("Order {order} earning now available"),
                )
                .reference(reference),
                now,
            )?;
        }
        if let Some(earning) = record.earning.as_mut() {
            earning.matured = true;
        }
        record.updated_at = now;
        session.stage_order(record);
        session.emit(LedgerEvent::EarningMatured {
            vendor,
            order,
            amount,
        });
        self.ledger.commit(session).await?;
        Ok(true)
    }
}
