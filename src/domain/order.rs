use super::account::Balance;
use super::commission::{CommissionRate, CommissionSplit};
use super::{OrderId, VendorId};
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Returned,
}

impl OrderStatus {
    /// Position along the fulfilment path; terminal states have none.
    fn progress(self) -> Option<u8> {
        match self {
            OrderStatus::Pending => Some(0),
            OrderStatus::Confirmed => Some(1),
            OrderStatus::Processing => Some(2),
            OrderStatus::Shipped => Some(3),
            OrderStatus::Delivered => Some(4),
            OrderStatus::Cancelled | OrderStatus::Returned => None,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Returned => "returned",
        };
        f.write_str(name)
    }
}

impl FromStr for OrderStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" | "canceled" => Ok(OrderStatus::Cancelled),
            "returned" | "refunded" => Ok(OrderStatus::Returned),
            other => Err(LedgerError::Validation(format!(
                "unknown order status: {other}"
            ))),
        }
    }
}

/// An upstream notification that an order changed status for one vendor.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct OrderStatusChange {
    pub order: OrderId,
    pub vendor: VendorId,
    pub status: OrderStatus,
    /// The vendor's share of the order, before commission.
    pub subtotal: Balance,
    pub at: DateTime<Utc>,
}

/// The earning recorded when an order was delivered.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct RecordedEarning {
    pub split: CommissionSplit,
    pub rate: CommissionRate,
    pub delivered_at: DateTime<Utc>,
    pub matured: bool,
    pub reversed: bool,
}

/// Per (order, vendor) processing state. Its flags, not the ledger, decide
/// whether an event has already been applied.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct OrderRecord {
    pub order: OrderId,
    pub vendor: VendorId,
    pub status: OrderStatus,
    pub subtotal: Balance,
    pub earning: Option<RecordedEarning>,
    pub updated_at: DateTime<Utc>,
}

/// The ledger work a status change calls for.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum OrderEffect {
    /// Allowed, but moves no money.
    StatusOnly,
    /// Delivery: post the earning and commission.
    Earn,
    /// Cancellation or return after delivery: reverse the earning.
    Reverse,
}

impl OrderRecord {
    pub fn new(change: &OrderStatusChange) -> Self {
        Self {
            order: change.order,
            vendor: change.vendor,
            status: OrderStatus::Pending,
            subtotal: change.subtotal,
            earning: None,
            updated_at: change.at,
        }
    }

    /// Decides what moving to `next` requires, or `None` if the move is not
    /// part of the lifecycle (including replays of an applied transition).
    pub fn effect_of(&self, next: OrderStatus) -> Option<OrderEffect> {
        use OrderStatus::*;
        match (self.status, next) {
            (Shipped, Delivered) if self.earning.is_none() => Some(OrderEffect::Earn),
            (_, Delivered) => None,
            (Delivered, Cancelled | Returned) => match &self.earning {
                Some(earning) if !earning.reversed => Some(OrderEffect::Reverse),
                Some(_) => None,
                None => Some(OrderEffect::StatusOnly),
            },
            (_, Returned) => None,
            (Pending | Confirmed | Processing | Shipped, Cancelled) => {
                Some(OrderEffect::StatusOnly)
            }
            (current, next) => match (current.progress(), next.progress()) {
                (Some(from), Some(to)) if to > from => Some(OrderEffect::StatusOnly),
                _ => None,
            },
        }
    }

    /// The earning still waiting to mature, if any.
    pub fn maturable_earning(&self) -> Option<&RecordedEarning> {
        self.earning
            .as_ref()
            .filter(|earning| !earning.matured && !earning.reversed)
    }
}
