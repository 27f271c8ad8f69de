use crate::domain::escrow::{DeliveryProof, Dispute, Escrow, ReleaseConditions};
use crate::domain::intent::{IntentId, IntentStatus, IntentType, PaymentIntent};
use crate::domain::ports::{ClockRef, CreateIntentRequest, Gateway};
use crate::domain::UserId;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

struct GatewayRecord {
    intent: PaymentIntent,
    escrow: Option<Escrow>,
}

/// In-process settlement rail used by the CLI demo and the test suites.
///
/// Holds the authoritative intent/escrow state and enforces the status graph
/// on every write, so no caller can ever observe a terminal-state transition.
/// Outages are simulated via `set_unavailable`; gateway-side progression past
/// `PROCESSING` is driven explicitly with `advance`/`force_status`.
pub struct SimGateway {
    records: Arc<RwLock<HashMap<IntentId, GatewayRecord>>>,
    unavailable: AtomicBool,
    conditions: ReleaseConditions,
    clock: ClockRef,
}

impl SimGateway {
    pub fn new(clock: ClockRef) -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            unavailable: AtomicBool::new(false),
            conditions: ReleaseConditions::default(),
            clock,
        }
    }

    pub fn with_conditions(mut self, conditions: ReleaseConditions) -> Self {
        self.conditions = conditions;
        self
    }

    /// Simulates a transport outage: every call fails with
    /// `GatewayUnavailable` until cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Moves an intent one step along the success chain.
    pub async fn advance(&self, id: IntentId) -> Result<IntentStatus> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&id)
            .ok_or_else(|| PaymentError::NotFound(format!("intent {id}")))?;
        let from = record.intent.status;
        let next = from
            .successor()
            .ok_or_else(|| PaymentError::illegal(from, "advance"))?;
        record.intent.status = next;
        record.intent.updated_at = self.clock.now();
        Ok(next)
    }

    /// Forces a status, still subject to the transition rules.
    pub async fn force_status(&self, id: IntentId, status: IntentStatus) -> Result<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&id)
            .ok_or_else(|| PaymentError::NotFound(format!("intent {id}")))?;
        let from = record.intent.status;
        if !from.can_transition_to(status) {
            return Err(PaymentError::illegal(from, format!("transition to {status}")));
        }
        record.intent.status = status;
        record.intent.updated_at = self.clock.now();
        Ok(())
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(PaymentError::GatewayUnavailable(
                "simulated outage".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Gateway for SimGateway {
    async fn create_intent(&self, request: CreateIntentRequest) -> Result<PaymentIntent> {
        self.check_available()?;
        let now = self.clock.now();
        let id = IntentId::generate();
        let signing_payload = json!({
            "intent": id.to_string(),
            "amount": request.amount.value(),
            "currency": request.currency,
            "destination": request.destination,
            "nonce": Uuid::new_v4(),
        });
        let intent = PaymentIntent {
            id,
            status: IntentStatus::RequiresSignature,
            amount: request.amount,
            currency: request.currency,
            kind: request.kind,
            description: request.description,
            destination: request.destination,
            signing_payload: Some(signing_payload),
            transaction_hash: None,
            linkage: request.linkage,
            created_at: now,
            updated_at: now,
        };
        let escrow = match request.kind {
            IntentType::Conditional => Some(Escrow::new(
                format!("esc_{}", Uuid::new_v4().simple()),
                self.conditions,
            )),
            IntentType::DeliveryVsPayment => None,
        };
        let mut records = self.records.write().await;
        records.insert(id, GatewayRecord { intent: intent.clone(), escrow });
        Ok(intent)
    }

    async fn get_intent(&self, id: IntentId) -> Result<Option<PaymentIntent>> {
        self.check_available()?;
        let records = self.records.read().await;
        Ok(records.get(&id).map(|record| record.intent.clone()))
    }

    async fn confirm_intent(
        &self,
        id: IntentId,
        _signature: &str,
        _payer_address: &str,
    ) -> Result<PaymentIntent> {
        self.check_available()?;
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&id)
            .ok_or_else(|| PaymentError::NotFound(format!("intent {id}")))?;
        match record.intent.status {
            IntentStatus::Initiated | IntentStatus::RequiresSignature => {
                record.intent.status = IntentStatus::Processing;
                record.intent.transaction_hash =
                    Some(format!("0x{}", Uuid::new_v4().simple()));
                record.intent.updated_at = self.clock.now();
                Ok(record.intent.clone())
            }
            // A re-submitted confirm on an already-processing intent is a
            // retry, not a new signature; report the current record.
            IntentStatus::Processing
            | IntentStatus::Succeeded
            | IntentStatus::Settled
            | IntentStatus::Final => Ok(record.intent.clone()),
            status @ (IntentStatus::Cancelled | IntentStatus::Failed) => {
                Err(PaymentError::illegal(status, "confirm"))
            }
        }
    }

    async fn cancel_intent(&self, id: IntentId) -> Result<PaymentIntent> {
        self.check_available()?;
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&id)
            .ok_or_else(|| PaymentError::NotFound(format!("intent {id}")))?;
        match record.intent.status {
            IntentStatus::Initiated | IntentStatus::RequiresSignature | IntentStatus::Processing => {
                record.intent.status = IntentStatus::Cancelled;
                record.intent.updated_at = self.clock.now();
                Ok(record.intent.clone())
            }
            // Past cancellability or already terminal: the caller must take
            // the authoritative status from a fresh read, never assume
            // CANCELLED locally.
            status => Err(PaymentError::illegal(status, "cancel")),
        }
    }

    async fn get_escrow(&self, id: IntentId) -> Result<Escrow> {
        self.check_available()?;
        let records = self.records.read().await;
        let record = records
            .get(&id)
            .ok_or_else(|| PaymentError::NotFound(format!("intent {id}")))?;
        record
            .escrow
            .clone()
            .ok_or_else(|| PaymentError::NotFound(format!("no escrow for intent {id}")))
    }

    async fn submit_delivery_proof(
        &self,
        id: IntentId,
        hash: String,
        uri: Option<String>,
        submitted_by: UserId,
    ) -> Result<Escrow> {
        self.check_available()?;
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&id)
            .ok_or_else(|| PaymentError::NotFound(format!("intent {id}")))?;
        let status = record.intent.status;
        if !matches!(status, IntentStatus::Processing | IntentStatus::Succeeded) {
            return Err(PaymentError::illegal(status, "submit delivery proof"));
        }
        let escrow = record
            .escrow
            .as_mut()
            .ok_or_else(|| PaymentError::NotFound(format!("no escrow for intent {id}")))?;
        if escrow.proof.is_some() {
            return Err(PaymentError::Validation(
                "delivery proof already submitted".to_string(),
            ));
        }
        escrow.proof = Some(DeliveryProof {
            hash,
            uri,
            submitted_at: self.clock.now(),
            submitted_by,
        });
        Ok(escrow.clone())
    }

    async fn raise_dispute(
        &self,
        id: IntentId,
        reason: String,
        raised_by: UserId,
    ) -> Result<Escrow> {
        self.check_available()?;
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&id)
            .ok_or_else(|| PaymentError::NotFound(format!("intent {id}")))?;
        let escrow = record
            .escrow
            .as_mut()
            .ok_or_else(|| PaymentError::NotFound(format!("no escrow for intent {id}")))?;
        let Some(deadline) = escrow.dispute_deadline() else {
            return Err(PaymentError::Validation(
                "no delivery proof to dispute".to_string(),
            ));
        };
        if escrow.dispute.is_some() {
            return Err(PaymentError::Validation(
                "dispute already raised".to_string(),
            ));
        }
        let now = self.clock.now();
        if now > deadline {
            return Err(PaymentError::DisputeWindowExpired { deadline });
        }
        escrow.dispute = Some(Dispute {
            reason,
            raised_at: now,
            raised_by,
        });
        escrow.release_suspended = true;
        Ok(escrow.clone())
    }
}
