use crate::application::intents::IntentManager;
use crate::domain::escrow::Escrow;
use crate::domain::intent::{IntentId, IntentStatus, IntentType};
use crate::domain::ports::{ClockRef, GatewayRef};
use crate::domain::UserId;
use crate::error::{PaymentError, Result};
use std::sync::Arc;

/// Drives the conditional-payment sub-flow (delivery proof, dispute) on top
/// of a confirmed escrow intent.
///
/// Only validates and forwards: the escrow record itself lives on the
/// gateway, which re-checks every write. Dispute adjudication is an external
/// responsibility; once a dispute is raised, release stays suspended.
pub struct EscrowCoordinator {
    gateway: GatewayRef,
    intents: Arc<IntentManager>,
    clock: ClockRef,
}

impl EscrowCoordinator {
    pub fn new(gateway: GatewayRef, intents: Arc<IntentManager>, clock: ClockRef) -> Self {
        Self {
            gateway,
            intents,
            clock,
        }
    }

    /// Read-only composite of escrow address, conditions, proof and dispute.
    pub async fn get_escrow(&self, id: IntentId) -> Result<Escrow> {
        self.require_conditional(id).await?;
        self.gateway.get_escrow(id).await
    }

    /// Records the delivery proof that opens the dispute window.
    ///
    /// Allowed only while the intent is in a pre-release state (`PROCESSING`
    /// or `SUCCEEDED`) and no proof exists yet.
    pub async fn submit_delivery_proof(
        &self,
        id: IntentId,
        hash: String,
        uri: Option<String>,
        submitted_by: UserId,
    ) -> Result<Escrow> {
        let status = self.require_conditional(id).await?;
        if !matches!(status, IntentStatus::Processing | IntentStatus::Succeeded) {
            return Err(PaymentError::illegal(status, "submit delivery proof"));
        }
        let escrow = self.gateway.get_escrow(id).await?;
        if escrow.proof.is_some() {
            return Err(PaymentError::Validation(
                "delivery proof already submitted".to_string(),
            ));
        }
        // The gateway owns the escrow record and stamps the submission time.
        let escrow = self
            .gateway
            .submit_delivery_proof(id, hash, uri, submitted_by)
            .await?;
        tracing::info!(intent = %id, "delivery proof submitted, dispute window open");
        Ok(escrow)
    }

    /// Raises a dispute against the submitted proof.
    ///
    /// Requires an existing proof, no prior dispute, and the current time to
    /// be within the dispute window of proof submission; outside the window
    /// this fails with `DisputeWindowExpired` regardless of the reason.
    pub async fn raise_dispute(
        &self,
        id: IntentId,
        reason: String,
        raised_by: UserId,
    ) -> Result<Escrow> {
        self.require_conditional(id).await?;
        let escrow = self.gateway.get_escrow(id).await?;
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
        if self.clock.now() > deadline {
            return Err(PaymentError::DisputeWindowExpired { deadline });
        }
        let escrow = self.gateway.raise_dispute(id, reason, raised_by).await?;
        tracing::warn!(intent = %id, "dispute raised, release suspended");
        Ok(escrow)
    }

    /// The sub-flow only applies to conditional intents.
    async fn require_conditional(&self, id: IntentId) -> Result<IntentStatus> {
        let view = self.intents.get_status(id).await?;
        if view.record.kind != IntentType::Conditional {
            return Err(PaymentError::Validation(format!(
                "intent {id} is not a conditional payment"
            )));
        }
        Ok(view.record.status)
    }
}
