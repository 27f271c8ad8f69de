use clap::Parser;
use miette::{IntoDiagnostic, Result};
use splitrail::application::intents::IntentManager;
use splitrail::application::poller::ReconciliationPoller;
use splitrail::application::settlement::{compute_balances, compute_debts, SettlementEngine};
use splitrail::domain::ledger::LedgerEntry;
use splitrail::domain::money::Currency;
use splitrail::domain::ports::ClockRef;
use splitrail::domain::EventId;
use splitrail::infrastructure::clock::SystemClock;
use splitrail::infrastructure::in_memory::{
    InMemoryEventStateStore, InMemoryIntentStore, InMemoryRefundStore,
};
use splitrail::infrastructure::sim_gateway::SimGateway;
use splitrail::interfaces::csv::ledger_reader::LedgerReader;
use splitrail::interfaces::csv::plan_writer::PlanWriter;
use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input ledger CSV file (kind, event, user, amount)
    input: PathBuf,

    /// Also finalize each event and report refund-eligible participants.
    #[arg(long)]
    finalize: bool,

    /// Currency used when finalizing events.
    #[arg(long, default_value = "USDC")]
    currency: Currency,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();
    let cli = Cli::parse();

    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = LedgerReader::new(file);

    // Group entries per event, preserving first-seen event order.
    let mut events: Vec<EventId> = Vec::new();
    let mut entries: HashMap<EventId, Vec<LedgerEntry>> = HashMap::new();
    for entry_result in reader.entries() {
        match entry_result {
            Ok(entry) => {
                let event = entry.event().clone();
                if !entries.contains_key(&event) {
                    events.push(event.clone());
                }
                entries.entry(event).or_default().push(entry);
            }
            Err(e) => {
                eprintln!("Error reading ledger entry: {e}");
            }
        }
    }

    let stdout = io::stdout();
    let mut writer = PlanWriter::new(stdout.lock());
    for event in &events {
        let balances = compute_balances(&entries[event]);
        let debts = compute_debts(&balances);
        writer.write_plan(event, &debts).into_diagnostic()?;
    }
    drop(writer);

    if cli.finalize {
        let clock: ClockRef = Arc::new(SystemClock);
        let gateway = Arc::new(SimGateway::new(clock.clone()));
        let intents = Arc::new(IntentManager::new(
            gateway,
            Arc::new(InMemoryIntentStore::new()),
            clock.clone(),
        ));
        let poller = ReconciliationPoller::new(intents.clone(), clock.clone());
        let engine = SettlementEngine::new(
            intents,
            poller,
            Arc::new(InMemoryRefundStore::new()),
            Arc::new(InMemoryEventStateStore::new()),
            clock,
        );
        for event in &events {
            let snapshot = engine
                .finalize(event, cli.currency, &entries[event])
                .await
                .into_diagnostic()?;
            for user in &snapshot.refund_eligible {
                if let Some(balance) = snapshot.balance_of(user) {
                    println!("# refund-eligible {event} {user} {balance}");
                }
            }
        }
    }

    Ok(())
}
