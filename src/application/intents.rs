use crate::domain::intent::{
    IdempotencyKey, IntentId, IntentStatus, LocalPaymentRecord, PaymentIntent,
};
use crate::domain::ports::{ClockRef, CreateIntentRequest, GatewayRef, IntentStoreRef};
use crate::domain::UserId;
use crate::error::{PaymentError, Result};
use std::future::Future;
use std::time::Duration;

/// Bounded exponential backoff applied to `GatewayUnavailable` only;
/// validation and state errors are never retried.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

/// A status read merged with the local mirror.
///
/// `stale` is true when the gateway could not be reached and the record is the
/// last locally cached state; callers needing guaranteed freshness must check
/// it.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusView {
    pub record: LocalPaymentRecord,
    pub stale: bool,
}

/// Owns intent creation, status reconciliation, confirmation and
/// cancellation against the settlement rail.
///
/// The gateway is the single writer of intent state; this manager only
/// validates preconditions, forwards calls, and keeps the local mirror in
/// sync with the freshest gateway read. Local status is never advanced ahead
/// of the gateway.
pub struct IntentManager {
    gateway: GatewayRef,
    store: IntentStoreRef,
    clock: ClockRef,
    retry: RetryPolicy,
}

impl IntentManager {
    pub fn new(gateway: GatewayRef, store: IntentStoreRef, clock: ClockRef) -> Self {
        Self {
            gateway,
            store,
            clock,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Creates an intent on the rail and mirrors it locally.
    ///
    /// If an active (non-terminal) intent already exists for the same
    /// linkage and idempotency key, that intent is returned instead of
    /// creating a duplicate. This is the dedup contract for retried
    /// requests, not a conflict.
    pub async fn create_intent(
        &self,
        owner: UserId,
        request: CreateIntentRequest,
        key: IdempotencyKey,
    ) -> Result<(PaymentIntent, LocalPaymentRecord)> {
        if let Some(existing) = self.store.find_by_dedup(&request.linkage, &key).await?
            && !existing.status.is_terminal()
        {
            // The mirror may lag the gateway; only a fresh non-terminal read
            // counts as a dedup hit.
            if let Some(intent) = self
                .with_retry(|| self.gateway.get_intent(existing.intent_id))
                .await?
            {
                let record = self.absorb(&intent).await?;
                if !intent.status.is_terminal() {
                    tracing::debug!(intent = %intent.id, "dedup hit, returning existing intent");
                    return Ok((intent, record));
                }
                tracing::debug!(
                    intent = %intent.id,
                    status = %intent.status,
                    "dedup candidate terminated on gateway, creating a new intent"
                );
            }
        }

        let intent = self
            .with_retry(|| self.gateway.create_intent(request.clone()))
            .await?;
        let record = LocalPaymentRecord::mirror(owner, key, &intent, self.clock.now());
        self.store.store(record.clone()).await?;
        tracing::info!(intent = %intent.id, status = %intent.status, "intent created");
        Ok((intent, record))
    }

    /// Fetches the authoritative status and overwrites the mirror.
    ///
    /// When the gateway stays unreachable through the retry budget, the
    /// last cached record is returned with `stale = true` instead of
    /// failing the caller.
    pub async fn get_status(&self, id: IntentId) -> Result<StatusView> {
        match self.with_retry(|| self.gateway.get_intent(id)).await {
            Ok(Some(intent)) => {
                let record = self.absorb(&intent).await?;
                Ok(StatusView {
                    record,
                    stale: false,
                })
            }
            Ok(None) => Err(PaymentError::NotFound(format!("intent {id}"))),
            Err(PaymentError::GatewayUnavailable(reason)) => {
                let record = self
                    .store
                    .get(id)
                    .await?
                    .ok_or_else(|| PaymentError::NotFound(format!("intent {id}")))?;
                tracing::warn!(intent = %id, %reason, "gateway unreachable, serving cached status");
                Ok(StatusView {
                    record,
                    stale: true,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Submits the out-of-band signature for an intent.
    ///
    /// Requires the intent to be `INITIATED` or `REQUIRES_SIGNATURE`. A
    /// repeat confirm on an intent that is already `PROCESSING` or further
    /// along the success chain returns the current status without
    /// re-submitting the signature, so network retries cannot double-submit.
    pub async fn confirm(
        &self,
        id: IntentId,
        signature: &str,
        payer_address: &str,
    ) -> Result<StatusView> {
        let (current, fresh) = self.current_status(id).await?;
        match current {
            IntentStatus::Initiated | IntentStatus::RequiresSignature => {
                let intent = self
                    .with_retry(|| self.gateway.confirm_intent(id, signature, payer_address))
                    .await?;
                let mut record = self.absorb(&intent).await?;
                record.signature = Some(signature.to_string());
                record.payer_address = Some(payer_address.to_string());
                self.store.store(record.clone()).await?;
                tracing::info!(intent = %id, status = %record.status, "intent confirmed");
                Ok(StatusView {
                    record,
                    stale: false,
                })
            }
            IntentStatus::Processing
            | IntentStatus::Succeeded
            | IntentStatus::Settled
            | IntentStatus::Final => {
                let record = match &fresh {
                    Some(intent) => self.absorb(intent).await?,
                    None => self
                        .store
                        .get(id)
                        .await?
                        .ok_or_else(|| PaymentError::NotFound(format!("intent {id}")))?,
                };
                tracing::debug!(intent = %id, status = %current, "confirm retry, returning current status");
                Ok(StatusView {
                    record,
                    stale: fresh.is_none(),
                })
            }
            status @ (IntentStatus::Cancelled | IntentStatus::Failed) => {
                // Even a rejected confirm carries a fresher gateway read; the
                // mirror must reflect it before the error surfaces.
                if let Some(intent) = &fresh {
                    self.absorb(intent).await?;
                }
                Err(PaymentError::illegal(status, "confirm"))
            }
        }
    }

    /// Requests cancellation of a non-terminal intent.
    ///
    /// If the gateway reports the intent already progressed past
    /// cancellability, the mirror is refreshed with the gateway's
    /// authoritative status and the transition error is surfaced; the local
    /// record is never set to `CANCELLED` on assumption.
    pub async fn cancel(&self, id: IntentId) -> Result<StatusView> {
        let (current, _) = self.current_status(id).await?;
        if current.is_terminal() {
            return Err(PaymentError::illegal(current, "cancel"));
        }
        match self.with_retry(|| self.gateway.cancel_intent(id)).await {
            Ok(intent) => {
                let record = self.absorb(&intent).await?;
                tracing::info!(intent = %id, status = %record.status, "intent cancelled");
                Ok(StatusView {
                    record,
                    stale: false,
                })
            }
            Err(err @ PaymentError::IllegalTransition { .. }) => {
                // The rail refused: take its word for where the intent is.
                if let Ok(Some(intent)) = self.gateway.get_intent(id).await {
                    self.absorb(&intent).await?;
                }
                Err(err)
            }
            Err(e) => Err(e),
        }
    }

    /// Current status from a fresh read when obtainable, else from the
    /// mirror. The fresh intent is returned alongside when available.
    async fn current_status(
        &self,
        id: IntentId,
    ) -> Result<(IntentStatus, Option<PaymentIntent>)> {
        match self.with_retry(|| self.gateway.get_intent(id)).await {
            Ok(Some(intent)) => Ok((intent.status, Some(intent))),
            Ok(None) => Err(PaymentError::NotFound(format!("intent {id}"))),
            Err(PaymentError::GatewayUnavailable(_)) => {
                let record = self
                    .store
                    .get(id)
                    .await?
                    .ok_or_else(|| PaymentError::NotFound(format!("intent {id}")))?;
                Ok((record.status, None))
            }
            Err(e) => Err(e),
        }
    }

    /// Overwrites the mirror with a fresher gateway read.
    async fn absorb(&self, intent: &PaymentIntent) -> Result<LocalPaymentRecord> {
        let mut record = self.store.get(intent.id).await?.ok_or_else(|| {
            PaymentError::NotFound(format!("no local record for intent {}", intent.id))
        })?;
        if record.status != intent.status {
            tracing::info!(
                intent = %intent.id,
                from = %record.status,
                to = %intent.status,
                "mirroring status change"
            );
        }
        record.absorb(intent, self.clock.now());
        self.store.store(record.clone()).await?;
        Ok(record)
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        let mut delay = self.retry.base_delay;
        let mut attempt = 0;
        loop {
            match op().await {
                Err(PaymentError::GatewayUnavailable(reason)) if attempt < self.retry.max_retries => {
                    attempt += 1;
                    tracing::warn!(attempt, %reason, "gateway unavailable, backing off");
                    self.clock.sleep(delay).await;
                    delay *= 2;
                }
                other => return other,
            }
        }
    }
}
