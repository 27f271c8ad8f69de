use crate::domain::escrow::Escrow;
use crate::domain::intent::{
    IdempotencyKey, IntentId, IntentType, Linkage, LocalPaymentRecord, PaymentIntent,
};
use crate::domain::ledger::{FinalizedEvent, Refund, Settlement};
use crate::domain::money::{Amount, Currency};
use crate::domain::{EventId, UserId};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Request body for intent creation on the rail.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateIntentRequest {
    pub amount: Amount,
    pub currency: Currency,
    pub kind: IntentType,
    pub description: String,
    pub destination: String,
    pub linkage: Linkage,
}

/// The external settlement rail. Sole writer of authoritative intent and
/// escrow state; everything local to this crate is a cache of its answers.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn create_intent(&self, request: CreateIntentRequest) -> Result<PaymentIntent>;
    async fn get_intent(&self, id: IntentId) -> Result<Option<PaymentIntent>>;
    async fn confirm_intent(
        &self,
        id: IntentId,
        signature: &str,
        payer_address: &str,
    ) -> Result<PaymentIntent>;
    async fn cancel_intent(&self, id: IntentId) -> Result<PaymentIntent>;
    async fn get_escrow(&self, id: IntentId) -> Result<Escrow>;
    /// The gateway stamps the submission time; callers supply only the
    /// evidence and the submitter.
    async fn submit_delivery_proof(
        &self,
        id: IntentId,
        hash: String,
        uri: Option<String>,
        submitted_by: UserId,
    ) -> Result<Escrow>;
    async fn raise_dispute(&self, id: IntentId, reason: String, raised_by: UserId)
        -> Result<Escrow>;
}

/// Store for local payment records (the non-authoritative mirror).
#[async_trait]
pub trait IntentStore: Send + Sync {
    async fn store(&self, record: LocalPaymentRecord) -> Result<()>;
    async fn get(&self, intent_id: IntentId) -> Result<Option<LocalPaymentRecord>>;
    async fn find_by_dedup(
        &self,
        linkage: &Linkage,
        key: &IdempotencyKey,
    ) -> Result<Option<LocalPaymentRecord>>;
}

#[async_trait]
pub trait RefundStore: Send + Sync {
    async fn store(&self, refund: Refund) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<Refund>>;
    async fn find_active(&self, event: &EventId, user: &UserId) -> Result<Option<Refund>>;
    async fn all_for_event(&self, event: &EventId) -> Result<Vec<Refund>>;
}

/// Persistence for event finalization snapshots and settlement records.
#[async_trait]
pub trait EventStateStore: Send + Sync {
    async fn store_finalized(&self, snapshot: FinalizedEvent) -> Result<()>;
    async fn get_finalized(&self, event: &EventId) -> Result<Option<FinalizedEvent>>;
    async fn append_settlement(&self, settlement: Settlement) -> Result<()>;
    async fn settlements_for(&self, event: &EventId) -> Result<Vec<Settlement>>;
}

/// Injected time source so tests can advance the clock without waiting.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
    async fn sleep(&self, duration: Duration);
}

pub type GatewayRef = Arc<dyn Gateway>;
pub type IntentStoreRef = Arc<dyn IntentStore>;
pub type RefundStoreRef = Arc<dyn RefundStore>;
pub type EventStateStoreRef = Arc<dyn EventStateStore>;
pub type ClockRef = Arc<dyn Clock>;
