use super::VendorId;
use super::plan::{BillingCycle, Plan, PlanId};
use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

/// A downgrade waiting for the end of the current billing cycle.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct ScheduledChange {
    pub plan: PlanId,
    pub billing_cycle: BillingCycle,
    pub effective_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Subscription {
    pub vendor: VendorId,
    pub plan: PlanId,
    pub billing_cycle: BillingCycle,
    pub is_active: bool,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub upcoming: Option<ScheduledChange>,
}

/// Whether a plan selection applies now or at the cycle boundary.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PlanChangeKind {
    Immediate,
    Deferred,
}

/// Upgrades and lateral moves apply immediately; strictly cheaper plans wait.
pub fn classify_change(current: &Plan, requested: &Plan, cycle: BillingCycle) -> PlanChangeKind {
    if requested.price(cycle) >= current.price(cycle) {
        PlanChangeKind::Immediate
    } else {
        PlanChangeKind::Deferred
    }
}

/// What a materialization pass did to a subscription.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Materialized {
    Unchanged,
    Renewed,
    Switched { from: PlanId, to: PlanId },
}

pub fn cycle_end(start: DateTime<Utc>, cycle: BillingCycle) -> DateTime<Utc> {
    start
        .checked_add_months(Months::new(cycle.months()))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

impl Subscription {
    pub fn start(vendor: VendorId, plan: PlanId, cycle: BillingCycle, now: DateTime<Utc>) -> Self {
        Self {
            vendor,
            plan,
            billing_cycle: cycle,
            is_active: true,
            start_date: now,
            end_date: cycle_end(now, cycle),
            upcoming: None,
        }
    }

    /// Switches plan now, opening a fresh cycle and dropping any scheduled change.
    pub fn switch_now(&mut self, plan: PlanId, cycle: BillingCycle, now: DateTime<Utc>) {
        self.plan = plan;
        self.billing_cycle = cycle;
        self.is_active = true;
        self.start_date = now;
        self.end_date = cycle_end(now, cycle);
        self.upcoming = None;
    }

    /// Schedules `plan` for the end of the current cycle. A later selection
    /// replaces an earlier one.
    pub fn schedule(&mut self, plan: PlanId, cycle: BillingCycle) {
        self.upcoming = Some(ScheduledChange {
            plan,
            billing_cycle: cycle,
            effective_at: self.end_date,
        });
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.end_date <= now
            || self
                .upcoming
                .as_ref()
                .is_some_and(|change| change.effective_at <= now)
    }

    /// Applies any scheduled change whose date has passed and rolls the cycle
    /// window forward until it contains `now`.
    ///
    /// Running it twice with the same `now` leaves the subscription as the
    /// first run did.
    pub fn materialize(&mut self, now: DateTime<Utc>) -> Materialized {
        let mut outcome = Materialized::Unchanged;

        if let Some(change) = self.upcoming.take_if(|c| c.effective_at <= now) {
            let from = std::mem::replace(&mut self.plan, change.plan.clone());
            self.billing_cycle = change.billing_cycle;
            self.start_date = change.effective_at;
            self.end_date = cycle_end(change.effective_at, change.billing_cycle);
            outcome = Materialized::Switched {
                from,
                to: change.plan,
            };
        }

        while self.end_date <= now {
            let next = cycle_end(self.end_date, self.billing_cycle);
            // The calendar is exhausted; the last window stays open.
            if next == self.end_date {
                break;
            }
            self.start_date = self.end_date;
            self.end_date = next;
            if outcome == Materialized::Unchanged {
                outcome = Materialized::Renewed;
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, month, day, 0, 0, 0).unwrap()
    }

    fn subscription() -> Subscription {
        Subscription::start(
            VendorId(1),
            PlanId::new("professional"),
            BillingCycle::Monthly,
            at(1, 15),
        )
    }

    #[test]
    fn test_cycle_end() {
        assert_eq!(cycle_end(at(1, 15), BillingCycle::Monthly), at(2, 15));
        assert_eq!(
            cycle_end(at(1, 15), BillingCycle::Yearly),
            Utc.with_ymd_and_hms(2027, 1, 15, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_scheduled_change_waits_for_cycle_end() {
        let mut sub = subscription();
        sub.schedule(PlanId::new("starter"), BillingCycle::Monthly);

        assert!(!sub.is_due(at(2, 1)));
        assert_eq!(sub.materialize(at(2, 1)), Materialized::Unchanged);
        assert_eq!(sub.plan.as_str(), "professional");

        assert!(sub.is_due(at(2, 15)));
        assert_eq!(
            sub.materialize(at(2, 15)),
            Materialized::Switched {
                from: PlanId::new("professional"),
                to: PlanId::new("starter"),
            }
        );
        assert_eq!(sub.plan.as_str(), "starter");
        assert!(sub.upcoming.is_none());
        assert_eq!(sub.start_date, at(2, 15));
        assert_eq!(sub.end_date, at(3, 15));
    }

    #[test]
    fn test_materialize_is_idempotent() {
        let mut sub = subscription();
        sub.schedule(PlanId::new("starter"), BillingCycle::Monthly);
        sub.materialize(at(2, 20));
        let first = sub.clone();

        assert_eq!(sub.materialize(at(2, 20)), Materialized::Unchanged);
        assert_eq!(sub, first);
    }

    #[test]
    fn test_renewal_rolls_window_forward() {
        let mut sub = subscription();
        assert_eq!(sub.materialize(at(4, 20)), Materialized::Renewed);
        assert_eq!(sub.start_date, at(4, 15));
        assert_eq!(sub.end_date, at(5, 15));
    }

    #[test]
    fn test_switch_now_clears_schedule() {
        let mut sub = subscription();
        sub.schedule(PlanId::new("starter"), BillingCycle::Monthly);
        sub.switch_now(PlanId::new("enterprise"), BillingCycle::Yearly, at(1, 20));
        assert!(sub.upcoming.is_none());
        assert_eq!(sub.plan.as_str(), "enterprise");
        assert_eq!(sub.end_date, Utc.with_ymd_and_hms(2027, 1, 20, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_materialize_stops_at_end_of_calendar() {
        let last = DateTime::<Utc>::MAX_UTC;
        let near_end = last - chrono::Duration::days(20);
        let mut sub = Subscription::start(
            VendorId(1),
            PlanId::new("starter"),
            BillingCycle::Monthly,
            near_end,
        );
        assert_eq!(sub.end_date, last);
        sub.schedule(PlanId::new("free"), BillingCycle::Monthly);

        assert!(matches!(sub.materialize(last), Materialized::Switched { .. }));
        assert_eq!(sub.end_date, last);
        assert_eq!(sub.materialize(last), Materialized::Unchanged);
        assert_eq!(sub.plan.as_str(), "free");
    }
}
