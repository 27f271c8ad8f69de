use crate::domain::ledger::Debt;
use crate::domain::EventId;
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct PlanRow<'a> {
    event: &'a str,
    from: &'a str,
    to: &'a str,
    amount: Decimal,
}

/// Writes the computed settlement plan as CSV.
pub struct PlanWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> PlanWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_plan(&mut self, event: &EventId, debts: &[Debt]) -> Result<()> {
        for debt in debts {
            self.writer.serialize(PlanRow {
                event: event.as_str(),
                from: debt.from.as_str(),
                to: debt.to.as_str(),
                amount: debt.amount,
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserId;
    use rust_decimal_macros::dec;

    #[test]
    fn test_write_plan_rows() {
        let mut buffer = Vec::new();
        {
            let mut writer = PlanWriter::new(&mut buffer);
            writer
                .write_plan(
                    &EventId::from("trip"),
                    &[Debt {
                        from: UserId::from("carol"),
                        to: UserId::from("alice"),
                        amount: dec!(200),
                    }],
                )
                .unwrap();
        }
        let output = String::from_utf8(buffer).unwrap();
        assert!(output.contains("event,from,to,amount"));
        assert!(output.contains("trip,carol,alice,200"));
    }
}
