mod common;

use common::stack;
use rust_decimal_macros::dec;
use splitrail::domain::intent::IntentStatus;
use splitrail::domain::ledger::{LedgerEntry, RefundStatus, SettlementParty};
use splitrail::domain::money::{Amount, Currency};
use splitrail::domain::{EventId, UserId};
use splitrail::error::PaymentError;

fn entries(event: &EventId) -> Vec<LedgerEntry> {
    vec![
        LedgerEntry::Deposit {
            event: event.clone(),
            user: UserId::from("alice"),
            amount: Amount::new(dec!(200)).unwrap(),
        },
        LedgerEntry::ExpenseSplit {
            event: event.clone(),
            user: UserId::from("alice"),
            amount: Amount::new(dec!(50)).unwrap(),
        },
        LedgerEntry::Deposit {
            event: event.clone(),
            user: UserId::from("bob"),
            amount: Amount::new(dec!(50)).unwrap(),
        },
        LedgerEntry::ExpenseSplit {
            event: event.clone(),
            user: UserId::from("bob"),
            amount: Amount::new(dec!(200)).unwrap(),
        },
    ]
}

#[tokio::test]
async fn test_refund_requires_finalized_event() {
    let stack = stack();
    let event = EventId::from("trip");
    let result = stack
        .engine
        .request_refund(&event, &UserId::from("alice"), "addr1")
        .await;
    assert!(matches!(result, Err(PaymentError::Validation(_))));
}

#[tokio::test]
async fn test_refund_requires_eligibility() {
    let stack = stack();
    let event = EventId::from("trip");
    stack
        .engine
        .finalize(&event, Currency::Usdc, &entries(&event))
        .await
        .unwrap();

    // bob's balance is negative, he owes the pool.
    let result = stack
        .engine
        .request_refund(&event, &UserId::from("bob"), "addr2")
        .await;
    assert!(matches!(result, Err(PaymentError::Validation(_))));
}

#[tokio::test]
async fn test_refund_completes_once_intent_succeeds() {
    let stack = stack();
    let event = EventId::from("trip");
    stack
        .engine
        .finalize(&event, Currency::Usdc, &entries(&event))
        .await
        .unwrap();

    let refund = stack
        .engine
        .request_refund(&event, &UserId::from("alice"), "addr1")
        .await
        .unwrap();
    assert_eq!(refund.status, RefundStatus::Processing);
    assert_eq!(refund.amount.value(), dec!(150));
    let intent_id = refund.intent_id.unwrap();

    // First confirm: the rail accepts the signature but is still processing
    // when the poll budget runs out.
    let refund = stack
        .engine
        .confirm_refund(&event, refund.id, "sig", "addr1")
        .await
        .unwrap();
    assert_eq!(refund.status, RefundStatus::Processing);

    for _ in 0..3 {
        stack.gateway.advance(intent_id).await.unwrap();
    }
    let refund = stack
        .engine
        .confirm_refund(&event, refund.id, "sig", "addr1")
        .await
        .unwrap();
    assert_eq!(refund.status, RefundStatus::Completed);

    let settlements = stack.engine.settlements_for(&event).await.unwrap();
    assert_eq!(settlements.len(), 1);
    assert_eq!(settlements[0].from, SettlementParty::Pool);
    assert_eq!(
        settlements[0].to,
        SettlementParty::User(UserId::from("alice"))
    );
    assert_eq!(settlements[0].amount.value(), dec!(150));
}

#[tokio::test]
async fn test_cancelled_refund_intent_reverts_to_pending() {
    let stack = stack();
    let event = EventId::from("trip");
    stack
        .engine
        .finalize(&event, Currency::Usdc, &entries(&event))
        .await
        .unwrap();

    let refund = stack
        .engine
        .request_refund(&event, &UserId::from("alice"), "addr1")
        .await
        .unwrap();
    let first_intent = refund.intent_id.unwrap();
    let refund = stack
        .engine
        .confirm_refund(&event, refund.id, "sig", "addr1")
        .await
        .unwrap();

    stack
        .gateway
        .force_status(first_intent, IntentStatus::Cancelled)
        .await
        .unwrap();
    let refund = stack
        .engine
        .confirm_refund(&event, refund.id, "sig", "addr1")
        .await
        .unwrap();
    assert_eq!(refund.status, RefundStatus::Pending);
    assert!(refund.intent_id.is_none());

    // The reverted refund is reused with a fresh intent, not duplicated.
    let retried = stack
        .engine
        .request_refund(&event, &UserId::from("alice"), "addr1")
        .await
        .unwrap();
    assert_eq!(retried.id, refund.id);
    assert_eq!(retried.status, RefundStatus::Processing);
    let second_intent = retried.intent_id.unwrap();
    assert_ne!(first_intent, second_intent);

    let refunds = stack.engine.refunds_for(&event).await.unwrap();
    assert_eq!(refunds.len(), 1);
}

#[tokio::test]
async fn test_at_most_one_active_refund_per_user() {
    let stack = stack();
    let event = EventId::from("trip");
    stack
        .engine
        .finalize(&event, Currency::Usdc, &entries(&event))
        .await
        .unwrap();

    stack
        .engine
        .request_refund(&event, &UserId::from("alice"), "addr1")
        .await
        .unwrap();
    let result = stack
        .engine
        .request_refund(&event, &UserId::from("alice"), "addr1")
        .await;
    assert!(matches!(result, Err(PaymentError::Validation(_))));
}
