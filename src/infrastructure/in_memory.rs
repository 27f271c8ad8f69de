use crate::domain::intent::{IdempotencyKey, IntentId, Linkage, LocalPaymentRecord};
use crate::domain::ledger::{FinalizedEvent, Refund, Settlement};
use crate::domain::ports::{EventStateStore, IntentStore, RefundStore};
use crate::domain::{EventId, UserId};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Thread-safe in-memory store for local payment records.
///
/// Uses `Arc<RwLock<HashMap>>` for shared concurrent access. The mirror has no
/// durability requirement, so this is the only provided implementation.
#[derive(Default, Clone)]
pub struct InMemoryIntentStore {
    records: Arc<RwLock<HashMap<IntentId, LocalPaymentRecord>>>,
}

impl InMemoryIntentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IntentStore for InMemoryIntentStore {
    async fn store(&self, record: LocalPaymentRecord) -> Result<()> {
        let mut records = self.records.write().await;
        records.insert(record.intent_id, record);
        Ok(())
    }

    async fn get(&self, intent_id: IntentId) -> Result<Option<LocalPaymentRecord>> {
        let records = self.records.read().await;
        Ok(records.get(&intent_id).cloned())
    }

    async fn find_by_dedup(
        &self,
        linkage: &Linkage,
        key: &IdempotencyKey,
    ) -> Result<Option<LocalPaymentRecord>> {
        let records = self.records.read().await;
        // A terminal record and its active replacement can share a dedup key;
        // the active one wins.
        let mut fallback = None;
        for record in records.values() {
            if record.linkage == *linkage && record.idempotency_key == *key {
                if !record.status.is_terminal() {
                    return Ok(Some(record.clone()));
                }
                fallback = Some(record.clone());
            }
        }
        Ok(fallback)
    }
}

/// Thread-safe in-memory store for refunds.
#[derive(Default, Clone)]
pub struct InMemoryRefundStore {
    refunds: Arc<RwLock<HashMap<Uuid, Refund>>>,
}

impl InMemoryRefundStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RefundStore for InMemoryRefundStore {
    async fn store(&self, refund: Refund) -> Result<()> {
        let mut refunds = self.refunds.write().await;
        refunds.insert(refund.id, refund);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Refund>> {
        let refunds = self.refunds.read().await;
        Ok(refunds.get(&id).cloned())
    }

    async fn find_active(&self, event: &EventId, user: &UserId) -> Result<Option<Refund>> {
        let refunds = self.refunds.read().await;
        Ok(refunds
            .values()
            .find(|refund| {
                refund.event == *event && refund.user == *user && !refund.status.is_terminal()
            })
            .cloned())
    }

    async fn all_for_event(&self, event: &EventId) -> Result<Vec<Refund>> {
        let refunds = self.refunds.read().await;
        Ok(refunds
            .values()
            .filter(|refund| refund.event == *event)
            .cloned()
            .collect())
    }
}

/// Thread-safe in-memory store for finalization snapshots and settlements.
#[derive(Default, Clone)]
pub struct InMemoryEventStateStore {
    finalized: Arc<RwLock<HashMap<EventId, FinalizedEvent>>>,
    settlements: Arc<RwLock<HashMap<EventId, Vec<Settlement>>>>,
}

impl InMemoryEventStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStateStore for InMemoryEventStateStore {
    async fn store_finalized(&self, snapshot: FinalizedEvent) -> Result<()> {
        let mut finalized = self.finalized.write().await;
        finalized.insert(snapshot.event.clone(), snapshot);
        Ok(())
    }

    async fn get_finalized(&self, event: &EventId) -> Result<Option<FinalizedEvent>> {
        let finalized = self.finalized.read().await;
        Ok(finalized.get(event).cloned())
    }

    async fn append_settlement(&self, settlement: Settlement) -> Result<()> {
        let mut settlements = self.settlements.write().await;
        settlements
            .entry(settlement.event.clone())
            .or_default()
            .push(settlement);
        Ok(())
    }

    async fn settlements_for(&self, event: &EventId) -> Result<Vec<Settlement>> {
        let settlements = self.settlements.read().await;
        Ok(settlements.get(event).cloned().unwrap_or_default())
    }
}
