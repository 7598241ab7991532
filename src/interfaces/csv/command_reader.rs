use crate::application::service::VendorLedgerService;
use crate::domain::account::Balance;
use crate::domain::order::{OrderStatus, OrderStatusChange};
use crate::domain::payout::{PayoutId, PayoutStatus};
use crate::domain::plan::{BillingCycle, PlanId};
use crate::domain::{OrderId, VendorId};
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;
use std::str::FromStr;

/// A CSV row as written, before validation.
#[derive(Debug, Deserialize)]
struct CommandRecord {
    command: String,
    vendor: Option<u32>,
    reference: Option<u64>,
    amount: Option<String>,
    detail: Option<String>,
    at: Option<DateTime<Utc>>,
}

/// One operation read from the input feed.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerCommand {
    Onboard {
        vendor: VendorId,
        at: DateTime<Utc>,
    },
    SelectPlan {
        vendor: VendorId,
        plan: PlanId,
        cycle: BillingCycle,
        at: DateTime<Utc>,
    },
    OrderStatus(OrderStatusChange),
    Payout {
        vendor: VendorId,
        amount: Decimal,
        at: DateTime<Utc>,
    },
    PayoutStatus {
        payout: PayoutId,
        status: PayoutStatus,
        at: DateTime<Utc>,
    },
    Adjust {
        vendor: VendorId,
        amount: Decimal,
        reason: String,
        at: DateTime<Utc>,
    },
    Sweep {
        at: DateTime<Utc>,
    },
}

fn missing(command: &str, field: &str) -> LedgerError {
    LedgerError::Validation(format!("{command} requires a {field}"))
}

impl CommandRecord {
    fn vendor(&self) -> Result<VendorId> {
        self.vendor
            .map(VendorId)
            .ok_or_else(|| missing(&self.command, "vendor"))
    }

    fn reference(&self) -> Result<u64> {
        self.reference
            .ok_or_else(|| missing(&self.command, "reference"))
    }

    fn amount(&self) -> Result<Decimal> {
        let raw = self
            .amount
            .as_deref()
            .filter(|raw| !raw.is_empty())
            .ok_or_else(|| missing(&self.command, "amount"))?;
        Decimal::from_str(raw)
            .map_err(|_| LedgerError::Validation(format!("invalid amount: {raw}")))
    }

    fn detail(&self) -> Result<&str> {
        self.detail
            .as_deref()
            .filter(|detail| !detail.is_empty())
            .ok_or_else(|| missing(&self.command, "detail"))
    }
}

impl TryFrom<CommandRecord> for LedgerCommand {
    type Error = LedgerError;

    fn try_from(record: CommandRecord) -> Result<Self> {
        // Rows without a timestamp happen now.
        let at = record.at.unwrap_or_else(Utc::now);
        let command = match record.command.as_str() {
            "onboard" => LedgerCommand::Onboard {
                vendor: record.vendor()?,
                at,
            },
            "select_plan" => {
                let detail = record.detail()?;
                let (plan, cycle) = match detail.split_once(':') {
                    Some((plan, cycle)) => (plan, cycle.parse()?),
                    None => (detail, BillingCycle::Monthly),
                };
                LedgerCommand::SelectPlan {
                    vendor: record.vendor()?,
                    plan: PlanId::new(plan),
                    cycle,
                    at,
                }
            }
            "order_status" => LedgerCommand::OrderStatus(OrderStatusChange {
                order: OrderId(record.reference()?),
                vendor: record.vendor()?,
                status: OrderStatus::from_str(record.detail()?)?,
                subtotal: Balance::new(record.amount()?),
                at,
            }),
            "payout" => LedgerCommand::Payout {
                vendor: record.vendor()?,
                amount: record.amount()?,
                at,
            },
            "payout_status" => LedgerCommand::PayoutStatus {
                payout: PayoutId {
                    vendor: record.vendor()?,
                    number: record.reference()?,
                },
                status: PayoutStatus::from_str(record.detail()?)?,
                at,
            },
            "adjust" => LedgerCommand::Adjust {
                vendor: record.vendor()?,
                amount: record.amount()?,
                reason: record.detail()?.to_string(),
                at,
            },
            "sweep" => LedgerCommand::Sweep { at },
            other => {
                return Err(LedgerError::Validation(format!("unknown command: {other}")));
            }
        };
        Ok(command)
    }
}

impl LedgerCommand {
    /// Runs the command against `service`.
    pub async fn execute(self, service: &VendorLedgerService) -> Result<()> {
        match self {
            LedgerCommand::Onboard { vendor, at } => {
                service.onboard_vendor(vendor, at).await?;
            }
            LedgerCommand::SelectPlan {
                vendor,
                plan,
                cycle,
                at,
            } => {
                service.select_plan(vendor, &plan, cycle, at).await?;
            }
            LedgerCommand::OrderStatus(change) => {
                service.on_order_status_changed(change).await?;
            }
            LedgerCommand::Payout { vendor, amount, at } => {
                service.request_payout(vendor, amount, at).await?;
            }
            LedgerCommand::PayoutStatus { payout, status, at } => match status {
                PayoutStatus::Processing => {
                    service.mark_processing(payout, at).await?;
                }
                PayoutStatus::Completed => {
                    service.mark_completed(payout, at).await?;
                }
                PayoutStatus::Rejected => {
                    service.mark_rejected(payout, at).await?;
                }
                PayoutStatus::Requested => {
                    return Err(LedgerError::Validation(format!(
                        "payout {payout} cannot be moved back to requested"
                    )));
                }
            },
            LedgerCommand::Adjust {
                vendor,
                amount,
                reason,
                at,
            } => {
                service.adjust(vendor, amount, &reason, at).await?;
            }
            LedgerCommand::Sweep { at } => {
                service.run_sweeps(at).await?;
            }
        }
        Ok(())
    }
}

/// Reads ledger commands from a CSV source.
///
/// Columns are `command, vendor, reference, amount, detail, at`. Whitespace
/// is trimmed and short rows are accepted; unused columns may be empty.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads and validates commands, one row at a time.
    pub fn commands(self) -> impl Iterator<Item = Result<LedgerCommand>> {
        self.reader.into_deserialize::<CommandRecord>().map(|result| {
            result
                .map_err(LedgerError::from)
                .and_then(LedgerCommand::try_from)
        })
    }
}
