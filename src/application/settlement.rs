use crate::application::intents::IntentManager;
use crate::application::poller::ReconciliationPoller;
use crate::domain::intent::{IdempotencyKey, IntentStatus, IntentType, Linkage};
use crate::domain::ledger::{
    Balances, Debt, FinalizedEvent, LedgerEntry, Refund, RefundStatus, Settlement,
    SettlementMethod, SettlementParty, SettlementStatus,
};
use crate::domain::money::{Amount, Currency};
use crate::domain::ports::{ClockRef, CreateIntentRequest, EventStateStoreRef, RefundStoreRef};
use crate::domain::{EventId, UserId};
use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::Notify;
use uuid::Uuid;

/// Balances closer to zero than this are treated as settled.
pub fn epsilon() -> Decimal {
    // 0.0001, matching the four-decimal money precision
    Decimal::new(1, 4)
}

/// Net balance per participant: total deposited minus total spend attributed,
/// over all confirmed entries for the event. Deterministic for identical
/// input order.
pub fn compute_balances(entries: &[LedgerEntry]) -> Balances {
    let mut balances = Balances::new();
    for entry in entries {
        match entry {
            LedgerEntry::Deposit { user, amount, .. } => {
                balances.apply(user, amount.value());
            }
            LedgerEntry::ExpenseSplit { user, amount, .. } => {
                balances.apply(user, -amount.value());
            }
        }
    }
    balances
}

/// Classic debt simplification: repeatedly match the largest debtor with the
/// largest creditor and transfer `min(|debtor|, creditor)` until every
/// balance is zero within epsilon. Ties break by insertion order so the
/// output is deterministic.
pub fn compute_debts(balances: &Balances) -> Vec<Debt> {
    let eps = epsilon();
    let mut remaining: Vec<(UserId, Decimal)> = balances
        .iter()
        .map(|(user, amount)| (user.clone(), amount))
        .collect();
    let mut debts = Vec::new();

    loop {
        let mut creditor: Option<usize> = None;
        let mut debtor: Option<usize> = None;
        for (i, (_, amount)) in remaining.iter().enumerate() {
            if *amount > eps && creditor.is_none_or(|best| *amount > remaining[best].1) {
                creditor = Some(i);
            }
            if *amount < -eps && debtor.is_none_or(|best| *amount < remaining[best].1) {
                debtor = Some(i);
            }
        }
        let (Some(creditor), Some(debtor)) = (creditor, debtor) else {
            break;
        };
        let transfer = remaining[creditor].1.min(-remaining[debtor].1);
        debts.push(Debt {
            from: remaining[debtor].0.clone(),
            to: remaining[creditor].0.clone(),
            amount: transfer,
        });
        remaining[creditor].1 -= transfer;
        remaining[debtor].1 += transfer;
    }
    debts
}

/// Computes balances and minimal-transfer debts for an event, finalizes the
/// event, and drives refunds through the intent manager.
pub struct SettlementEngine {
    intents: Arc<IntentManager>,
    poller: ReconciliationPoller,
    refunds: RefundStoreRef,
    events: EventStateStoreRef,
    clock: ClockRef,
}

impl SettlementEngine {
    pub fn new(
        intents: Arc<IntentManager>,
        poller: ReconciliationPoller,
        refunds: RefundStoreRef,
        events: EventStateStoreRef,
        clock: ClockRef,
    ) -> Self {
        Self {
            intents,
            poller,
            refunds,
            events,
            clock,
        }
    }

    /// Marks the event completed and snapshots final balances.
    ///
    /// Idempotent: finalizing an already-finalized event returns the existing
    /// snapshot unchanged so retried calls are harmless. Participants with a
    /// strictly positive remaining balance become refund-eligible.
    pub async fn finalize(
        &self,
        event: &EventId,
        currency: Currency,
        entries: &[LedgerEntry],
    ) -> Result<FinalizedEvent> {
        if let Some(existing) = self.events.get_finalized(event).await? {
            tracing::debug!(%event, "finalize retried, returning existing snapshot");
            return Ok(existing);
        }
        let balances = compute_balances(entries);
        let eps = epsilon();
        let snapshot = FinalizedEvent {
            event: event.clone(),
            currency,
            finalized_at: self.clock.now(),
            balances: balances
                .iter()
                .map(|(user, amount)| (user.clone(), amount))
                .collect(),
            refund_eligible: balances
                .iter()
                .filter(|(_, amount)| *amount > eps)
                .map(|(user, _)| user.clone())
                .collect(),
        };
        self.events.store_finalized(snapshot.clone()).await?;
        tracing::info!(
            %event,
            participants = snapshot.balances.len(),
            refund_eligible = snapshot.refund_eligible.len(),
            "event finalized"
        );
        Ok(snapshot)
    }

    /// Creates a pending refund and its payment intent for a refund-eligible
    /// participant of a finalized event.
    ///
    /// A previously reverted refund (its intent cancelled or failed) is
    /// reused and re-linked to a fresh intent rather than duplicated.
    pub async fn request_refund(
        &self,
        event: &EventId,
        user: &UserId,
        destination: &str,
    ) -> Result<Refund> {
        let snapshot = self
            .events
            .get_finalized(event)
            .await?
            .ok_or_else(|| PaymentError::Validation(format!("event {event} is not finalized")))?;
        if !snapshot.is_refund_eligible(user) {
            return Err(PaymentError::Validation(format!(
                "{user} is not refund-eligible for event {event}"
            )));
        }

        let mut refund = match self.refunds.find_active(event, user).await? {
            Some(existing) => {
                if let Some(intent_id) = existing.intent_id {
                    let view = self.intents.get_status(intent_id).await?;
                    if !view.record.status.is_terminal() {
                        return Err(PaymentError::Validation(format!(
                            "refund already in progress for {user} in event {event}"
                        )));
                    }
                }
                existing
            }
            None => {
                let balance = snapshot
                    .balance_of(user)
                    .ok_or_else(|| PaymentError::NotFound(format!("balance for {user}")))?;
                let now = self.clock.now();
                Refund {
                    id: Uuid::new_v4(),
                    event: event.clone(),
                    user: user.clone(),
                    amount: Amount::new(balance)?,
                    currency: snapshot.currency,
                    status: RefundStatus::Pending,
                    intent_id: None,
                    created_at: now,
                    updated_at: now,
                }
            }
        };
        self.refunds.store(refund.clone()).await?;

        let (intent, _) = self
            .intents
            .create_intent(
                user.clone(),
                CreateIntentRequest {
                    amount: refund.amount,
                    currency: refund.currency,
                    kind: IntentType::DeliveryVsPayment,
                    description: format!("refund for event {event}"),
                    destination: destination.to_string(),
                    linkage: Linkage::Refund {
                        event: event.clone(),
                        user: user.clone(),
                    },
                },
                IdempotencyKey::new(refund.id.to_string()),
            )
            .await?;

        refund.intent_id = Some(intent.id);
        refund.status = RefundStatus::Processing;
        refund.updated_at = self.clock.now();
        self.refunds.store(refund.clone()).await?;
        tracing::info!(%event, %user, refund = %refund.id, intent = %intent.id, "refund requested");
        Ok(refund)
    }

    /// Confirms the linked intent and reconciles the refund with the result.
    ///
    /// Completes the refund once the rail reports a success status; on
    /// `CANCELLED`/`FAILED` the refund reverts to pending so it may be
    /// retried rather than silently disappearing.
    pub async fn confirm_refund(
        &self,
        event: &EventId,
        refund_id: Uuid,
        signature: &str,
        payer_address: &str,
    ) -> Result<Refund> {
        let mut refund = self
            .refunds
            .get(refund_id)
            .await?
            .filter(|refund| refund.event == *event)
            .ok_or_else(|| {
                PaymentError::NotFound(format!("refund {refund_id} for event {event}"))
            })?;
        let intent_id = refund.intent_id.ok_or_else(|| {
            PaymentError::Validation(format!(
                "refund {refund_id} has no linked intent; request it again"
            ))
        })?;

        match self.intents.confirm(intent_id, signature, payer_address).await {
            Ok(_) => {}
            // The linked intent died before the confirm landed; revert the
            // refund so it can be retried instead of wedging.
            Err(PaymentError::IllegalTransition { from, .. })
                if matches!(from, IntentStatus::Cancelled | IntentStatus::Failed) =>
            {
                refund.status = RefundStatus::Pending;
                refund.intent_id = None;
                refund.updated_at = self.clock.now();
                self.refunds.store(refund.clone()).await?;
                tracing::warn!(refund = %refund.id, %from, "refund intent terminated, reverting to pending");
                return Ok(refund);
            }
            Err(e) => return Err(e),
        }
        let cancel = Notify::new();
        let outcome = self.poller.poll(intent_id, &cancel).await?;

        let status = outcome.status();
        refund.updated_at = self.clock.now();
        if status.is_success() {
            refund.status = RefundStatus::Completed;
            self.events
                .append_settlement(Settlement {
                    id: Uuid::new_v4(),
                    event: event.clone(),
                    from: SettlementParty::Pool,
                    to: SettlementParty::User(refund.user.clone()),
                    amount: refund.amount,
                    currency: refund.currency,
                    method: SettlementMethod::Rail,
                    status: SettlementStatus::Completed,
                    recorded_at: self.clock.now(),
                })
                .await?;
            tracing::info!(refund = %refund.id, "refund completed");
        } else if matches!(status, IntentStatus::Cancelled | IntentStatus::Failed) {
            refund.status = RefundStatus::Pending;
            refund.intent_id = None;
            tracing::warn!(refund = %refund.id, %status, "refund intent terminated, reverting to pending");
        } else {
            refund.status = RefundStatus::Processing;
        }
        self.refunds.store(refund.clone()).await?;
        Ok(refund)
    }

    /// Records an explicit settle action between two participants.
    pub async fn record_settlement(
        &self,
        event: &EventId,
        from: UserId,
        to: UserId,
        amount: Amount,
        currency: Currency,
        method: SettlementMethod,
    ) -> Result<Settlement> {
        let settlement = Settlement {
            id: Uuid::new_v4(),
            event: event.clone(),
            from: SettlementParty::User(from),
            to: SettlementParty::User(to),
            amount,
            currency,
            method,
            status: SettlementStatus::Completed,
            recorded_at: self.clock.now(),
        };
        self.events.append_settlement(settlement.clone()).await?;
        Ok(settlement)
    }

    pub async fn settlements_for(&self, event: &EventId) -> Result<Vec<Settlement>> {
        self.events.settlements_for(event).await
    }

    pub async fn refunds_for(&self, event: &EventId) -> Result<Vec<Refund>> {
        self.refunds.all_for_event(event).await
    }
}
