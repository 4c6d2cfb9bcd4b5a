//! Cell Info Simulator
//!
//! Writes a rotating series of cell-info snapshots to a JSON file, the same
//! shape a telephony helper prints. Point a `kind = "file"` source at it to
//! exercise the monitor without a handset.
//!
//! Usage: cargo run --bin cell-sim [output_path] [interval_secs]

use std::env;
use std::path::PathBuf;

use serde_json::{json, Value};
use tokio::time::{sleep, Duration};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path: PathBuf = env::args()
        .nth(1)
        .unwrap_or_else(|| "cells.json".to_string())
        .into();
    let interval: u64 = env::args()
        .nth(2)
        .map(|s| s.parse::<u64>())
        .transpose()?
        .unwrap_or(15);

    println!("📶 TowerLink Cell Simulator");
    println!("  Output: {}", path.display());
    println!("  Interval: {}s", interval);
    println!();

    let scenarios = vec![
        ("Camped on LTE, one GSM neighbor", camped_on_lte()),
        ("Handover to a second LTE cell", handover()),
        ("NR non-standalone with wide NCI", nr_attached()),
        ("Neighbors with missing carrier codes", malformed_neighbors()),
        ("Legacy CDMA network", cdma_only()),
        ("No service", json!([])),
    ];

    loop {
        for (desc, snapshot) in &scenarios {
            let cells = snapshot.as_array().map(Vec::len).unwrap_or(0);
            println!("📡 Writing: {} ({} cell(s))", desc, cells);

            let data = serde_json::to_string_pretty(snapshot)?;
            let mut tmp = path.clone().into_os_string();
            tmp.push(".tmp");
            tokio::fs::write(&tmp, data).await?;
            tokio::fs::rename(&tmp, &path).await?;

            sleep(Duration::from_secs(interval)).await;
        }
        println!("🔁 Restarting scenario list");
        println!();
    }
}

fn camped_on_lte() -> Value {
    json!([
        {"type": "lte", "registered": true, "dbm": -97,
         "mcc": "310", "mnc": "260", "tac": 11801, "ci": 26744321},
        {"type": "gsm", "registered": false, "dbm": -83,
         "mcc": "310", "mnc": "260", "lac": 7010, "cid": 1042}
    ])
}

fn handover() -> Value {
    json!([
        {"type": "lte", "registered": true, "dbm": -88,
         "mcc": "310", "mnc": "260", "tac": 11801, "ci": 26744577},
        {"type": "lte", "registered": false, "dbm": -109,
         "mcc": "310", "mnc": "260", "tac": 11801, "ci": 26744321}
    ])
}

fn nr_attached() -> Value {
    // 0x1_0000_0001: only the low 32 bits survive normalization
    json!([
        {"type": "nr", "registered": true, "dbm": -91,
         "mcc": "310", "mnc": "260", "tac": 11801, "nci": 4294967297_i64},
        {"type": "lte", "registered": true, "dbm": -88,
         "mcc": "310", "mnc": "260", "tac": 11801, "ci": 26744577}
    ])
}

fn malformed_neighbors() -> Value {
    json!([
        {"type": "lte", "registered": true, "dbm": -88,
         "mcc": "310", "mnc": "260", "tac": 11801, "ci": 26744577},
        {"type": "lte", "registered": false, "dbm": -115,
         "tac": 2147483647, "ci": 2147483647},
        {"type": "wcdma", "registered": false,
         "mcc": "310", "lac": 5001, "cid": 90001}
    ])
}

fn cdma_only() -> Value {
    json!([
        {"type": "cdma", "registered": true, "dbm": -79,
         "system": 5, "network": 7, "basestation": 9},
        {"type": "cdma", "registered": false, "dbm": -101,
         "system": 2147483647, "network": 7, "basestation": 12}
    ])
}
