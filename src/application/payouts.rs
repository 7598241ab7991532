use super::ledger::{Posting, WalletLedger};
use crate::domain::VendorId;
use crate::domain::account::{Amount, Balance};
use crate::domain::events::LedgerEvent;
use crate::domain::payout::{PayoutId, PayoutRequest, PayoutStatus};
use crate::domain::transaction::{TransactionReference, TransactionType};
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

/// Validates and records vendor withdrawals.
///
/// The in-flight check, the balance check and the debit all happen inside one
/// vendor session, so two racing requests cannot both pass against the same
/// balance.
#[derive(Clone)]
pub struct PayoutProcessor {
    ledger: Arc<WalletLedger>,
    minimum_payout: Balance,
}

impl PayoutProcessor {
    pub fn new(ledger: Arc<WalletLedger>, minimum_payout: Balance) -> Self {
        Self {
            ledger,
            minimum_payout,
        }
    }

    pub async fn request_payout(
        &self,
        vendor: VendorId,
        amount: Decimal,
        at: DateTime<Utc>,
    ) -> Result<PayoutRequest> {
        let amount = Amount::new(amount)?;
        let requested = Balance::from(amount);
        if requested < self.minimum_payout {
            return Err(LedgerError::BelowMinimumPayout {
                requested,
                minimum: self.minimum_payout,
            });
        }

        let mut session = self.ledger.open(vendor).await?;
        if let Some(payout) = session.account().in_flight_payout {
            return Err(LedgerError::PayoutInFlight { vendor, payout });
        }
        let available = session.account().available;
        if requested > available {
            return Err(LedgerError::InsufficientFunds {
                vendor,
                requested,
                available,
            });
        }

        let id = PayoutId {
            vendor,
            number: session.account().payout_count + 1,
        };
        session.post(
            Posting::new(
                TransactionType::Payout,
                -requested,
                format!("Payout request {id}"),
            )
            .reference(TransactionReference::Payout(id)),
            at,
        )?;

        let account = session.account_mut();
        account.payout_count = id.number;
        account.in_flight_payout = Some(id);

        let payout = PayoutRequest::new(id, amount, at);
        session.stage_payout(payout.clone());
        session.emit(LedgerEvent::PayoutRequested {
            payout: id,
            amount: requested,
        });
        self.ledger.commit(session).await?;

        info!(%vendor, payout = %id, amount = %requested, "Payout requested");
        Ok(payout)
    }

    pub async fn mark_processing(&self, id: PayoutId, at: DateTime<Utc>) -> Result<PayoutRequest> {
        self.transition(id, PayoutStatus::Processing, at).await
    }

    pub async fn mark_completed(&self, id: PayoutId, at: DateTime<Utc>) -> Result<PayoutRequest> {
        self.transition(id, PayoutStatus::Completed, at).await
    }

    /// Rejects the payout and credits the debited amount back to available.
    pub async fn mark_rejected(&self, id: PayoutId, at: DateTime<Utc>) -> Result<PayoutRequest> {
        self.transition(id, PayoutStatus::Rejected, at).await
    }

    async fn transition(
        &self,
        id: PayoutId,
        next: PayoutStatus,
        at: DateTime<Utc>,
    ) -> Result<PayoutRequest> {
        let mut session = self.ledger.open(id.vendor).await?;
        let mut payout = self
            .ledger
            .store()
            .get_payout(id)
            .await?
            .ok_or(LedgerError::PayoutNotFound(id))?;
        payout.transition(next, at)?;

        if next == PayoutStatus::Rejected {
            session.post(
                Posting::new(
                    TransactionType::Adjustment,
                    payout.amount.into(),
                    format!("Payout {id} rejected, funds returned"),
                )
                .reference(TransactionReference::Payout(id)),
                at,
            )?;
        }
        if !next.is_in_flight() && session.account().in_flight_payout == Some(id) {
            session.account_mut().in_flight_payout = None;
        }

        session.stage_payout(payout.clone());
        session.emit(LedgerEvent::PayoutStatusChanged {
            payout: id,
            status: next,
        });
        self.ledger.commit(session).await?;

        info!(vendor = %id.vendor, payout = %id, status = %next, "Payout status changed");
        Ok(payout)
    }

    pub async fn payouts(&self, vendor: VendorId) -> Result<Vec<PayoutRequest>> {
        self.ledger.account(vendor).await?;
        self.ledger.store().payouts(vendor).await
    }
}
