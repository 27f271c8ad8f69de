#![allow(dead_code)]

use rust_decimal_macros::dec;
use splitrail::application::escrow::EscrowCoordinator;
use splitrail::application::intents::IntentManager;
use splitrail::application::poller::{PollPolicy, ReconciliationPoller};
use splitrail::application::settlement::SettlementEngine;
use splitrail::domain::escrow::ReleaseConditions;
use splitrail::domain::intent::{IntentType, Linkage};
use splitrail::domain::money::{Amount, Currency};
use splitrail::domain::ports::CreateIntentRequest;
use splitrail::domain::{EventId, UserId};
use splitrail::infrastructure::clock::ManualClock;
use splitrail::infrastructure::in_memory::{
    InMemoryEventStateStore, InMemoryIntentStore, InMemoryRefundStore,
};
use splitrail::infrastructure::sim_gateway::SimGateway;
use std::sync::Arc;
use std::time::Duration;

pub struct TestStack {
    pub clock: ManualClock,
    pub gateway: Arc<SimGateway>,
    pub intents: Arc<IntentManager>,
    pub escrow: EscrowCoordinator,
    pub engine: SettlementEngine,
}

/// Full stack on a manual clock: one-hour dispute window, fast poll budget.
pub fn stack() -> TestStack {
    let clock = ManualClock::default();
    let clock_ref: Arc<ManualClock> = Arc::new(clock.clone());
    let gateway = Arc::new(
        SimGateway::new(clock_ref.clone()).with_conditions(ReleaseConditions {
            delivery_proof_required: true,
            dispute_window_secs: 3600,
        }),
    );
    let intents = Arc::new(IntentManager::new(
        gateway.clone(),
        Arc::new(InMemoryIntentStore::new()),
        clock_ref.clone(),
    ));
    let poller = ReconciliationPoller::new(intents.clone(), clock_ref.clone()).with_policy(
        PollPolicy {
            interval: Duration::from_millis(10),
            max_attempts: 5,
        },
    );
    let escrow = EscrowCoordinator::new(gateway.clone(), intents.clone(), clock_ref.clone());
    let engine = SettlementEngine::new(
        intents.clone(),
        poller,
        Arc::new(InMemoryRefundStore::new()),
        Arc::new(InMemoryEventStateStore::new()),
        clock_ref,
    );
    TestStack {
        clock,
        gateway,
        intents,
        escrow,
        engine,
    }
}

pub fn deposit_request(event: &str, user: &str, amount: rust_decimal::Decimal) -> CreateIntentRequest {
    CreateIntentRequest {
        amount: Amount::new(amount).unwrap(),
        currency: Currency::Usdc,
        kind: IntentType::DeliveryVsPayment,
        description: format!("deposit by {user}"),
        destination: "pool".to_string(),
        linkage: Linkage::Deposit {
            event: EventId::from(event),
            user: UserId::from(user),
        },
    }
}

pub fn escrow_request(event: &str, expense: &str, user: &str) -> CreateIntentRequest {
    CreateIntentRequest {
        amount: Amount::new(dec!(120)).unwrap(),
        currency: Currency::Usdc,
        kind: IntentType::Conditional,
        description: format!("escrowed payment for {expense}"),
        destination: "vendor".to_string(),
        linkage: Linkage::Expense {
            event: EventId::from(event),
            expense: splitrail::domain::ExpenseId::from(expense),
            user: UserId::from(user),
        },
    }
}
