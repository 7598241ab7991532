use super::service::VendorLedgerService;
use chrono::Utc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Runs the maturation and plan-change sweeps periodically in the background.
pub struct Sweeper {
    service: VendorLedgerService,
    period: Duration,
}

impl Sweeper {
    pub fn new(service: VendorLedgerService, period: Duration) -> Self {
        Self { service, period }
    }

    /// Starts sweeping until `shutdown` carries `true` or its sender is
    /// dropped. The first sweep runs immediately.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(period = ?self.period, "Sweeper started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match self.service.run_sweeps(Utc::now()).await {
                            Ok(report) => debug!(
                                applied = report.applied,
                                failed = report.failed,
                                "Sweep tick"
                            ),
                            // Individual failures are retried on the next tick.
                            Err(err) => error!(error = %err, "Sweep failed"),
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("Sweeper stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::domain::account::Balance;
    use crate::domain::order::{OrderStatus, OrderStatusChange};
    use crate::domain::{OrderId, VendorId};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_sweeper_matures_and_stops() {
        let config = LedgerConfig::default().with_maturation_days(0).unwrap();
        let service = VendorLedgerService::in_memory(config);
        let now = Utc::now();
        service.onboard_vendor(VendorId(1), now).await.unwrap();
        for status in [OrderStatus::Shipped, OrderStatus::Delivered] {
            service
                .on_order_status_changed(OrderStatusChange {
                    order: OrderId(1),
                    vendor: VendorId(1),
                    status,
                    subtotal: Balance::new(dec!(50)),
                    at: now,
                })
                .await
                .unwrap();
        }

        let (tx, rx) = watch::channel(false);
        let handle = Sweeper::new(service.clone(), Duration::from_millis(10)).spawn(rx);

        let mut matured = false;
        for _ in 0..50 {
            if service.wallet_summary(VendorId(1)).await.unwrap().available.is_positive() {
                matured = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(matured);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
