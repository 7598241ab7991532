#![cfg(feature = "storage-rocksdb")]

use assert_cmd::cargo_bin;
use std::process::Command;
use tempfile::tempdir;

mod common;
use common::write_commands;

#[test]
fn test_rocksdb_persistence_recovery() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("ledger_db");

    // 1. First run: onboard and deliver an order
    let first = write_commands(&[
        "onboard,1,,,,2026-01-01T00:00:00Z",
        "order_status,1,10,500,shipped,2026-01-02T00:00:00Z",
        "order_status,1,10,500,delivered,2026-01-03T00:00:00Z",
    ]);
    let output1 = Command::new(cargo_bin!("vendor_ledger"))
        .arg(first.path())
        .arg("--db-path")
        .arg(&db_path)
        .output()
        .expect("Failed to execute command");
    assert!(output1.status.success());
    let stdout1 = String::from_utf8_lossy(&output1.stdout);
    assert!(stdout1.contains("1,free,20,0,400,400,100"));

    // 2. Second run: the earning matures and the replayed delivery is ignored
    let second = write_commands(&[
        "order_status,1,10,500,delivered,2026-01-04T00:00:00Z",
        "sweep,,,,,2026-01-11T00:00:00Z",
    ]);
    let output2 = Command::new(cargo_bin!("vendor_ledger"))
        .arg(second.path())
        .arg("--db-path")
        .arg(&db_path)
        .output()
        .expect("Failed to execute command");
    assert!(output2.status.success());
    let stdout2 = String::from_utf8_lossy(&output2.stdout);
    assert!(stdout2.contains("1,free,20,400,0,400,100"));
}
