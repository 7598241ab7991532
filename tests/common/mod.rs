#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use vendor_ledger::application::ledger::PageRequest;
use vendor_ledger::application::orders::TransitionOutcome;
use vendor_ledger::application::service::VendorLedgerService;
use vendor_ledger::config::LedgerConfig;
use vendor_ledger::domain::account::Balance;
use vendor_ledger::domain::order::{OrderStatus, OrderStatusChange};
use vendor_ledger::domain::plan::PlanCatalog;
use vendor_ledger::domain::transaction::{BalanceBucket, LedgerTransaction};
use vendor_ledger::domain::{OrderId, VendorId};
use vendor_ledger::infrastructure::event_sink::RecordingEventSink;
use vendor_ledger::infrastructure::in_memory::InMemoryLedgerStore;

pub fn at(month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, month, day, 12, 0, 0).unwrap()
}

pub fn service() -> (VendorLedgerService, RecordingEventSink) {
    service_with(LedgerConfig::default())
}

pub fn service_with(config: LedgerConfig) -> (VendorLedgerService, RecordingEventSink) {
    let events = RecordingEventSink::new();
    let service = VendorLedgerService::new(
        Arc::new(InMemoryLedgerStore::new()),
        Arc::new(events.clone()),
        PlanCatalog::default(),
        config,
    );
    (service, events)
}

pub fn change(
    order: u64,
    vendor: u32,
    status: OrderStatus,
    subtotal: Decimal,
    when: DateTime<Utc>,
) -> OrderStatusChange {
    OrderStatusChange {
        order: OrderId(order),
        vendor: VendorId(vendor),
        status,
        subtotal: Balance::new(subtotal),
        at: when,
    }
}

/// Walks an order from pending to delivered and returns the delivery outcome.
pub async fn deliver(
    service: &VendorLedgerService,
    order: u64,
    vendor: u32,
    subtotal: Decimal,
    when: DateTime<Utc>,
) -> TransitionOutcome {
    for status in [OrderStatus::Pending, OrderStatus::Confirmed, OrderStatus::Shipped] {
        service
            .on_order_status_changed(change(order, vendor, status, subtotal, when))
            .await
            .unwrap();
    }
    service
        .on_order_status_changed(change(order, vendor, OrderStatus::Delivered, subtotal, when))
        .await
        .unwrap()
}

/// Every transaction of `vendor`, newest first.
pub async fn all_transactions(
    service: &VendorLedgerService,
    vendor: u32,
) -> Vec<LedgerTransaction> {
    let mut items = Vec::new();
    let mut page = PageRequest::first(50);
    loop {
        let result = service
            .wallet_transactions(VendorId(vendor), page, None)
            .await
            .unwrap();
        items.extend(result.items);
        match result.next {
            Some(token) => page = PageRequest::after(token, 50),
            None => return items,
        }
    }
}

/// Balances must equal the sum of the amounts posted to each bucket.
pub async fn assert_balances_consistent(service: &VendorLedgerService, vendor: u32) {
    let txs = all_transactions(service, vendor).await;
    let sum = |bucket: BalanceBucket| -> Balance {
        txs.iter()
            .filter(|tx| tx.bucket == Some(bucket))
            .map(|tx| tx.amount)
            .sum()
    };
    let summary = service.wallet_summary(VendorId(vendor)).await.unwrap();
    assert_eq!(summary.available, sum(BalanceBucket::Available), "available drifted");
    assert_eq!(summary.pending, sum(BalanceBucket::Pending), "pending drifted");
}

pub fn write_commands(rows: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "command,vendor,reference,amount,detail,at").unwrap();
    for row in rows {
        writeln!(file, "{row}").unwrap();
    }
    file.flush().unwrap();
    file
}
