use crate::domain::intent::IntentId;
use crate::domain::money::{Amount, Currency};
use crate::domain::{EventId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// One confirmed row from the expense-ledger collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerEntry {
    /// Funds a participant paid into the event pool.
    Deposit {
        event: EventId,
        user: UserId,
        amount: Amount,
    },
    /// The share of an expense attributed to a participant.
    ExpenseSplit {
        event: EventId,
        user: UserId,
        amount: Amount,
    },
}

impl LedgerEntry {
    pub fn event(&self) -> &EventId {
        match self {
            Self::Deposit { event, .. } | Self::ExpenseSplit { event, .. } => event,
        }
    }
}

/// Per-participant net balances (deposited − spent) for one event.
///
/// Participants keep their first-seen order so that debt computation is
/// deterministic for identical inputs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Balances {
    order: Vec<UserId>,
    amounts: HashMap<UserId, Decimal>,
}

impl Balances {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, user: &UserId, delta: Decimal) {
        if !self.amounts.contains_key(user) {
            self.order.push(user.clone());
        }
        *self.amounts.entry(user.clone()).or_insert(Decimal::ZERO) += delta;
    }

    pub fn get(&self, user: &UserId) -> Decimal {
        self.amounts.get(user).copied().unwrap_or(Decimal::ZERO)
    }

    /// Participants with their balances, in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&UserId, Decimal)> {
        self.order.iter().map(|user| (user, self.get(user)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// A derived transfer edge: `from` owes `to` the given (positive) amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Debt {
    pub from: UserId,
    pub to: UserId,
    pub amount: Decimal,
}

/// Side of a settlement transfer: a participant, or the event pool itself
/// (refunds flow pool → participant).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SettlementParty {
    User(UserId),
    Pool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementMethod {
    /// Executed through the settlement rail (a payment intent).
    Rail,
    /// Settled outside the rail and recorded here for the books.
    Direct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    Pending,
    Completed,
}

/// A persisted record of an executed transfer for an event. Created only by
/// an explicit settle action or by a refund confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub id: Uuid,
    pub event: EventId,
    pub from: SettlementParty,
    pub to: SettlementParty,
    pub amount: Amount,
    pub currency: Currency,
    pub method: SettlementMethod,
    pub status: SettlementStatus,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Pending,
    Processing,
    Completed,
}

impl RefundStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// A refund owed to a participant after event finalization.
///
/// At most one non-terminal refund may exist per (event, user).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refund {
    pub id: Uuid,
    pub event: EventId,
    pub user: UserId,
    pub amount: Amount,
    pub currency: Currency,
    pub status: RefundStatus,
    pub intent_id: Option<IntentId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Snapshot taken when an event is finalized: final balances plus the set of
/// participants whose strictly positive balance makes them refund-eligible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizedEvent {
    pub event: EventId,
    pub currency: Currency,
    pub finalized_at: DateTime<Utc>,
    pub balances: Vec<(UserId, Decimal)>,
    pub refund_eligible: Vec<UserId>,
}

impl FinalizedEvent {
    pub fn balance_of(&self, user: &UserId) -> Option<Decimal> {
        self.balances
            .iter()
            .find(|(candidate, _)| candidate == user)
            .map(|(_, balance)| *balance)
    }

    pub fn is_refund_eligible(&self, user: &UserId) -> bool {
        self.refund_eligible.contains(user)
    }
}
