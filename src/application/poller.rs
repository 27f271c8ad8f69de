use crate::application::intents::IntentManager;
use crate::domain::intent::{IntentId, IntentStatus};
use crate::domain::ports::ClockRef;
use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_attempts: 30,
        }
    }
}

/// What a bounded poll run ended with. `StillProcessing` is an outcome, not a
/// failure: the intent simply had not reached a terminal status within the
/// attempt budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Terminal(IntentStatus),
    StillProcessing(IntentStatus),
    Cancelled(IntentStatus),
}

impl PollOutcome {
    pub fn status(self) -> IntentStatus {
        match self {
            Self::Terminal(status) | Self::StillProcessing(status) | Self::Cancelled(status) => {
                status
            }
        }
    }
}

/// Keeps a locally cached intent converging with the gateway after a confirm.
///
/// Sleeps through the injected clock so tests drive elapsed time manually,
/// and races every wait against the caller's cancel signal so an abandoned
/// poll never leaks.
pub struct ReconciliationPoller {
    intents: Arc<IntentManager>,
    clock: ClockRef,
    policy: PollPolicy,
}

impl ReconciliationPoller {
    pub fn new(intents: Arc<IntentManager>, clock: ClockRef) -> Self {
        Self {
            intents,
            clock,
            policy: PollPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Polls `get_status` at a fixed interval until the intent reaches a
    /// terminal status, the attempt budget runs out, or `cancel` fires.
    pub async fn poll(&self, id: IntentId, cancel: &Notify) -> Result<PollOutcome> {
        let mut last = self.intents.get_status(id).await?.record.status;
        if last.is_terminal() {
            return Ok(PollOutcome::Terminal(last));
        }
        for attempt in 1..=self.policy.max_attempts {
            tokio::select! {
                biased;
                _ = cancel.notified() => {
                    tracing::debug!(intent = %id, status = %last, "poll cancelled by caller");
                    return Ok(PollOutcome::Cancelled(last));
                }
                _ = self.clock.sleep(self.policy.interval) => {}
            }
            let view = self.intents.get_status(id).await?;
            last = view.record.status;
            tracing::debug!(
                intent = %id,
                status = %last,
                attempt,
                stale = view.stale,
                "reconciliation poll"
            );
            if last.is_terminal() {
                return Ok(PollOutcome::Terminal(last));
            }
        }
        Ok(PollOutcome::StillProcessing(last))
    }
}
