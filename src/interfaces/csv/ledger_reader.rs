use crate::domain::ledger::LedgerEntry;
use crate::domain::money::Amount;
use crate::domain::{EventId, UserId};
use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
enum EntryKind {
    Deposit,
    Expense,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    kind: EntryKind,
    event: String,
    user: String,
    amount: Decimal,
}

/// Reads ledger entries (deposits and expense splits) from a CSV source.
///
/// Wraps `csv::Reader` with whitespace trimming and flexible record lengths,
/// yielding an iterator of validated `LedgerEntry` values.
pub struct LedgerReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> LedgerReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads and validates entries, so large files stream without
    /// loading the whole dataset.
    pub fn entries(self) -> impl Iterator<Item = Result<LedgerEntry>> {
        self.reader.into_deserialize().map(|result| {
            let raw: RawEntry = result.map_err(PaymentError::from)?;
            let amount = Amount::new(raw.amount)?;
            let event = EventId::from(raw.event);
            let user = UserId::from(raw.user);
            Ok(match raw.kind {
                EntryKind::Deposit => LedgerEntry::Deposit { event, user, amount },
                EntryKind::Expense => LedgerEntry::ExpenseSplit { event, user, amount },
            })
        })
    }
}
