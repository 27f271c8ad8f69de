mod common;

use common::{deposit_request, stack};
use rust_decimal_macros::dec;
use splitrail::application::poller::{PollOutcome, PollPolicy, ReconciliationPoller};
use splitrail::domain::intent::{IdempotencyKey, IntentId, IntentStatus};
use splitrail::domain::UserId;
use splitrail::infrastructure::clock::ManualClock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

fn poller(stack: &common::TestStack, clock: &ManualClock, max_attempts: u32) -> ReconciliationPoller {
    ReconciliationPoller::new(stack.intents.clone(), Arc::new(clock.clone())).with_policy(
        PollPolicy {
            interval: Duration::from_millis(10),
            max_attempts,
        },
    )
}

async fn processing_intent(stack: &common::TestStack) -> IntentId {
    let (intent, _) = stack
        .intents
        .create_intent(
            UserId::from("alice"),
            deposit_request("trip", "alice", dec!(100)),
            IdempotencyKey::new("dep-1"),
        )
        .await
        .unwrap();
    stack.intents.confirm(intent.id, "sig", "addr1").await.unwrap();
    intent.id
}

#[tokio::test]
async fn test_poll_stops_immediately_on_terminal_status() {
    let stack = stack();
    let id = processing_intent(&stack).await;
    stack
        .gateway
        .force_status(id, IntentStatus::Failed)
        .await
        .unwrap();

    let outcome = poller(&stack, &stack.clock, 5)
        .poll(id, &Notify::new())
        .await
        .unwrap();
    assert_eq!(outcome, PollOutcome::Terminal(IntentStatus::Failed));
}

#[tokio::test]
async fn test_poll_reports_still_processing_after_budget() {
    let stack = stack();
    let id = processing_intent(&stack).await;

    let outcome = poller(&stack, &stack.clock, 3)
        .poll(id, &Notify::new())
        .await
        .unwrap();
    assert_eq!(outcome, PollOutcome::StillProcessing(IntentStatus::Processing));
}

#[tokio::test]
async fn test_poll_observes_terminal_transition_mid_loop() {
    let stack = stack();
    let id = processing_intent(&stack).await;

    // The rail finishes the payment while the poller is waiting.
    let gateway = stack.gateway.clone();
    let driver = tokio::spawn(async move {
        for _ in 0..3 {
            gateway.advance(id).await.unwrap();
            tokio::task::yield_now().await;
        }
    });

    let outcome = poller(&stack, &stack.clock, 20)
        .poll(id, &Notify::new())
        .await
        .unwrap();
    driver.await.unwrap();
    assert_eq!(outcome, PollOutcome::Terminal(IntentStatus::Final));

    let view = stack.intents.get_status(id).await.unwrap();
    assert_eq!(view.record.status, IntentStatus::Final);
}

#[tokio::test]
async fn test_poll_cancellable_by_caller() {
    let stack = stack();
    let id = processing_intent(&stack).await;

    let cancel = Notify::new();
    cancel.notify_one();
    let outcome = poller(&stack, &stack.clock, 5)
        .poll(id, &cancel)
        .await
        .unwrap();
    assert_eq!(outcome, PollOutcome::Cancelled(IntentStatus::Processing));
}
