use crate::domain::money::{Amount, Currency};
use crate::domain::{EventId, ExpenseId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Gateway-issued identifier of a payment intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntentId(Uuid);

impl IntentId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for IntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pi_{}", self.0.simple())
    }
}

/// Caller-supplied key for the duplicate-intent contract: at most one active
/// intent per (linkage, key).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

/// Lifecycle of a payment intent on the settlement rail.
///
/// The rail is the single writer of this status; the local record only
/// mirrors the freshest value it has seen. Valid paths walk the success chain
/// in order, and `Cancelled`/`Failed` are reachable from any non-terminal
/// state. Nothing ever leaves a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentStatus {
    Initiated,
    RequiresSignature,
    Processing,
    Succeeded,
    Settled,
    Final,
    Cancelled,
    Failed,
}

impl IntentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Final | Self::Cancelled | Self::Failed)
    }

    /// True once funds have moved (any status on the success chain at or
    /// past `Succeeded`).
    pub fn is_success(self) -> bool {
        matches!(self, Self::Succeeded | Self::Settled | Self::Final)
    }

    /// Next step along the success chain, if any.
    pub fn successor(self) -> Option<Self> {
        match self {
            Self::Initiated => Some(Self::RequiresSignature),
            Self::RequiresSignature => Some(Self::Processing),
            Self::Processing => Some(Self::Succeeded),
            Self::Succeeded => Some(Self::Settled),
            Self::Settled => Some(Self::Final),
            Self::Final | Self::Cancelled | Self::Failed => None,
        }
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            Self::Cancelled | Self::Failed => true,
            _ => self.successor() == Some(next),
        }
    }
}

impl fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initiated => "INITIATED",
            Self::RequiresSignature => "REQUIRES_SIGNATURE",
            Self::Processing => "PROCESSING",
            Self::Succeeded => "SUCCEEDED",
            Self::Settled => "SETTLED",
            Self::Final => "FINAL",
            Self::Cancelled => "CANCELLED",
            Self::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentType {
    /// Funds held in escrow pending a delivery proof.
    Conditional,
    /// Released immediately on settlement.
    DeliveryVsPayment,
}

/// What an intent pays for. Duplicate-intent dedup is enforced per linkage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Linkage {
    Expense {
        event: EventId,
        expense: ExpenseId,
        user: UserId,
    },
    Deposit {
        event: EventId,
        user: UserId,
    },
    Refund {
        event: EventId,
        user: UserId,
    },
}

/// The authoritative intent record, owned by the gateway and mirrored locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: IntentId,
    pub status: IntentStatus,
    pub amount: Amount,
    pub currency: Currency,
    pub kind: IntentType,
    pub description: String,
    /// Settlement destination on the rail.
    pub destination: String,
    pub signing_payload: Option<serde_json::Value>,
    pub transaction_hash: Option<String>,
    pub linkage: Linkage,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The system's own mirror of an intent.
///
/// The status here is a cache, never authoritative: it is overwritten by every
/// fresher gateway read and never written ahead of one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalPaymentRecord {
    pub id: Uuid,
    pub intent_id: IntentId,
    pub owner: UserId,
    pub linkage: Linkage,
    pub idempotency_key: IdempotencyKey,
    pub status: IntentStatus,
    pub kind: IntentType,
    pub amount: Amount,
    pub currency: Currency,
    pub signature: Option<String>,
    pub payer_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LocalPaymentRecord {
    pub fn mirror(owner: UserId, key: IdempotencyKey, intent: &PaymentIntent, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            intent_id: intent.id,
            owner,
            linkage: intent.linkage.clone(),
            idempotency_key: key,
            status: intent.status,
            kind: intent.kind,
            amount: intent.amount,
            currency: intent.currency,
            signature: None,
            payer_address: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrites the cached status with a fresher gateway read.
    pub fn absorb(&mut self, intent: &PaymentIntent, now: DateTime<Utc>) {
        self.status = intent.status;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [IntentStatus; 8] = [
        IntentStatus::Initiated,
        IntentStatus::RequiresSignature,
        IntentStatus::Processing,
        IntentStatus::Succeeded,
        IntentStatus::Settled,
        IntentStatus::Final,
        IntentStatus::Cancelled,
        IntentStatus::Failed,
    ];

    #[test]
    fn test_terminal_states_admit_no_transition() {
        for from in [IntentStatus::Final, IntentStatus::Cancelled, IntentStatus::Failed] {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to} must be rejected");
            }
        }
    }

    #[test]
    fn test_success_chain_is_linear() {
        let chain = [
            IntentStatus::Initiated,
            IntentStatus::RequiresSignature,
            IntentStatus::Processing,
            IntentStatus::Succeeded,
            IntentStatus::Settled,
            IntentStatus::Final,
        ];
        for pair in chain.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]));
        }
        // No skipping steps forward.
        assert!(!IntentStatus::Initiated.can_transition_to(IntentStatus::Processing));
        assert!(!IntentStatus::Processing.can_transition_to(IntentStatus::Settled));
    }

    #[test]
    fn test_cancel_and_fail_reachable_from_non_terminal() {
        for from in ALL.iter().filter(|s| !s.is_terminal()) {
            assert!(from.can_transition_to(IntentStatus::Cancelled));
            assert!(from.can_transition_to(IntentStatus::Failed));
        }
    }

    #[test]
    fn test_success_states() {
        assert!(IntentStatus::Succeeded.is_success());
        assert!(IntentStatus::Settled.is_success());
        assert!(IntentStatus::Final.is_success());
        assert!(!IntentStatus::Processing.is_success());
        assert!(!IntentStatus::Cancelled.is_success());
    }
}
