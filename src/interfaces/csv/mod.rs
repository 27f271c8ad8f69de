pub mod ledger_reader;
pub mod plan_writer;
