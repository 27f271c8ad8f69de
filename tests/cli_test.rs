use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

fn trip_ledger() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "kind, event, user, amount").unwrap();
    writeln!(file, "deposit, trip, alice, 300").unwrap();
    writeln!(file, "deposit, trip, bob, 300").unwrap();
    writeln!(file, "expense, trip, alice, 150").unwrap();
    writeln!(file, "expense, trip, bob, 150").unwrap();
    writeln!(file, "expense, trip, carol, 300").unwrap();
    file
}

#[test]
fn test_settlement_plan_output() {
    let file = trip_ledger();

    let mut cmd = Command::new(cargo_bin!("splitrail"));
    cmd.arg(file.path());

    // carol owes the two depositors their surplus.
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("trip,carol,alice,150"))
        .stdout(predicate::str::contains("trip,carol,bob,150"));
}

#[test]
fn test_finalize_reports_refund_eligibility() {
    let file = trip_ledger();

    let mut cmd = Command::new(cargo_bin!("splitrail"));
    cmd.arg(file.path()).arg("--finalize");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("# refund-eligible trip alice 150"))
        .stdout(predicate::str::contains("# refund-eligible trip bob 150"));
}

#[test]
fn test_malformed_rows_are_reported_not_fatal() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "kind, event, user, amount").unwrap();
    writeln!(file, "deposit, trip, alice, 100").unwrap();
    writeln!(file, "transfer, trip, alice, 5").unwrap();
    writeln!(file, "expense, trip, alice, 40").unwrap();

    let mut cmd = Command::new(cargo_bin!("splitrail"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error reading ledger entry"));
}

#[test]
fn test_unknown_currency_rejected() {
    let file = trip_ledger();

    let mut cmd = Command::new(cargo_bin!("splitrail"));
    cmd.arg(file.path()).arg("--finalize").arg("--currency").arg("DOGE");

    cmd.assert().failure();
}
