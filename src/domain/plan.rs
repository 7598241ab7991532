//! Subscription tiers and the catalog they are looked up in.

use super::commission::CommissionRate;
use crate::error::LedgerError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanId(pub String);

impl PlanId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    Monthly,
    Yearly,
}

impl BillingCycle {
    pub fn months(self) -> u32 {
        match self {
            BillingCycle::Monthly => 1,
            BillingCycle::Yearly => 12,
        }
    }
}

impl FromStr for BillingCycle {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monthly" => Ok(BillingCycle::Monthly),
            "yearly" => Ok(BillingCycle::Yearly),
            other => Err(LedgerError::Validation(format!(
                "unknown billing cycle: {other}"
            ))),
        }
    }
}

/// Feature limits a tier grants. `None` means unlimited.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Default)]
pub struct PlanLimits {
    pub max_products: Option<u32>,
    pub max_featured_products: Option<u32>,
    pub analytics: bool,
    pub priority_support: bool,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Plan {
    pub id: PlanId,
    pub name: String,
    pub commission_rate: CommissionRate,
    pub price_monthly: Decimal,
    pub price_yearly: Decimal,
    pub limits: PlanLimits,
}

impl Plan {
    pub fn price(&self, cycle: BillingCycle) -> Decimal {
        match cycle {
            BillingCycle::Monthly => self.price_monthly,
            BillingCycle::Yearly => self.price_yearly,
        }
    }
}

/// Read-only lookup from plan id to its terms.
///
/// Past transactions and a vendor's cached rate never consult the catalog
/// again, so replacing a plan here does not rewrite history.
#[derive(Debug, Clone)]
pub struct PlanCatalog {
    plans: HashMap<PlanId, Plan>,
}

impl PlanCatalog {
    pub fn new(plans: impl IntoIterator<Item = Plan>) -> Self {
        Self {
            plans: plans.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }

    pub fn get_plan(&self, id: &PlanId) -> Result<&Plan, LedgerError> {
        self.plans
            .get(id)
            .ok_or_else(|| LedgerError::UnknownPlan(id.clone()))
    }

    pub fn contains(&self, id: &PlanId) -> bool {
        self.plans.contains_key(id)
    }

    /// All plans, cheapest first.
    pub fn plans(&self) -> Vec<&Plan> {
        let mut plans: Vec<&Plan> = self.plans.values().collect();
        plans.sort_by(|a, b| a.price_monthly.cmp(&b.price_monthly).then(a.id.cmp(&b.id)));
        plans
    }
}

fn tier(
    id: &str,
    name: &str,
    rate: Decimal,
    monthly: Decimal,
    yearly: Decimal,
    limits: PlanLimits,
) -> Plan {
    Plan {
        id: PlanId::new(id),
        name: name.to_string(),
        commission_rate: CommissionRate::builtin(rate),
        price_monthly: monthly,
        price_yearly: yearly,
        limits,
    }
}

impl Default for PlanCatalog {
    fn default() -> Self {
        Self::new([
            tier(
                "free",
                "Free",
                dec!(20),
                dec!(0),
                dec!(0),
                PlanLimits {
                    max_products: Some(10),
                    max_featured_products: Some(0),
                    ..PlanLimits::default()
                },
            ),
            tier(
                "starter",
                "Starter",
                dec!(15),
                dec!(999),
                dec!(9990),
                PlanLimits {
                    max_products: Some(100),
                    max_featured_products: Some(5),
                    analytics: true,
                    ..PlanLimits::default()
                },
            ),
            tier(
                "professional",
                "Professional",
                dec!(10),
                dec!(2499),
                dec!(24990),
                PlanLimits {
                    max_products: Some(1000),
                    max_featured_products: Some(25),
                    analytics: true,
                    priority_support: true,
                },
            ),
            tier(
                "enterprise",
                "Enterprise",
                dec!(5),
                dec!(4999),
                dec!(49990),
                PlanLimits {
                    max_products: None,
                    max_featured_products: None,
                    analytics: true,
                    priority_support: true,
                },
            ),
        ])
    }
}
