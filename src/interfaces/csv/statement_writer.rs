use crate::application::service::VendorStatement;
use crate::domain::VendorId;
use crate::domain::plan::PlanId;
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct StatementRecord {
    vendor: VendorId,
    plan: PlanId,
    commission_rate: Decimal,
    available: Decimal,
    pending: Decimal,
    total_earnings: Decimal,
    total_commission: Decimal,
}

impl From<VendorStatement> for StatementRecord {
    fn from(statement: VendorStatement) -> Self {
        Self {
            vendor: statement.vendor,
            plan: statement.plan,
            commission_rate: statement.commission_rate.percent().normalize(),
            available: statement.available.value().normalize(),
            pending: statement.pending.value().normalize(),
            total_earnings: statement.total_earnings.value().normalize(),
            total_commission: statement.total_commission.value().normalize(),
        }
    }
}

/// Writes vendor statements as CSV, one row per vendor.
pub struct StatementWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> StatementWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_statements(
        &mut self,
        statements: impl IntoIterator<Item = VendorStatement>,
    ) -> Result<()> {
        for statement in statements {
            self.writer.serialize(StatementRecord::from(statement))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::Balance;
    use crate::domain::commission::CommissionRate;
    use rust_decimal_macros::dec;

    #[test]
    fn test_write_statements() {
        let mut out = Vec::new();
        StatementWriter::new(&mut out)
            .write_statements([VendorStatement {
                vendor: VendorId(1),
                plan: PlanId::new("starter"),
                commission_rate: CommissionRate::new(dec!(15.00)).unwrap(),
                available: Balance::new(dec!(850.00)),
                pending: Balance::ZERO,
                total_earnings: Balance::new(dec!(850.00)),
                total_commission: Balance::new(dec!(150.00)),
            }])
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "vendor,plan,commission_rate,available,pending,total_earnings,total_commission\n\
             1,starter,15,850,0,850,150\n"
        );
    }
}
