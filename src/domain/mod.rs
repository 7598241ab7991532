//! Domain layer: the vendor wallet types and the pure rules that govern them.
//!
//! Nothing in here performs I/O. Storage is reached through [`ports`], and the
//! orchestration that serializes per-vendor work lives in `application`.

pub mod account;
pub mod commission;
pub mod events;
pub mod order;
pub mod payout;
pub mod plan;
pub mod ports;
pub mod subscription;
pub mod transaction;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a vendor. Identity is verified upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VendorId(pub u32);

impl fmt::Display for VendorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies an order in the storefront.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
