//! Tower monitor: the fixed-interval polling loop
//!
//! Each cycle scans the source, normalizes every reading, folds the tower
//! keys into the persisted unique set, diffs the registered towers against
//! the previous cycle and writes connect/disconnect lines to the activity
//! log. The monitor exclusively owns the previous registered set.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tracing::{debug, error, info, warn};

use crate::cell::{self, NormalizedCellRecord};
use crate::diff::{self, RegisteredSet, SnapshotDiff};
use crate::error::ScanError;
use crate::source::CellInfoSource;
use crate::store::activity::NO_ENTRIES_YET;
use crate::store::{ActivityLog, KeyValueStore};

/// Status shown before the first cycle completes
pub const MONITORING_STARTED: &str = "Monitoring started...";

/// Result of a single polling cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Scan succeeded
    Scanned { cells: usize, diff: SnapshotDiff },
    /// Transient failure; try again next cycle
    Skipped,
    /// Permission revoked; the monitor must stop
    Stop,
}

/// Why [`Monitor::run`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Requested,
    PermissionRevoked,
}

pub struct Monitor<S, K> {
    source: S,
    log: ActivityLog<K>,
    api_level: u32,
    interval: Duration,
    last_known_registered: RegisteredSet,
}

impl<S: CellInfoSource, K: KeyValueStore> Monitor<S, K> {
    pub fn new(source: S, log: ActivityLog<K>, api_level: u32, interval: Duration) -> Self {
        Self {
            source,
            log,
            api_level,
            interval,
            last_known_registered: RegisteredSet::new(),
        }
    }

    pub fn activity(&self) -> &ActivityLog<K> {
        &self.log
    }

    pub fn last_known_registered(&self) -> &RegisteredSet {
        &self.last_known_registered
    }

    /// Run one scan-normalize-diff-log cycle
    pub async fn scan_cycle(&mut self) -> CycleOutcome {
        let readings = match self.source.all_cell_info().await {
            Ok(readings) => readings,
            Err(ScanError::PermissionRevoked(msg)) => {
                error!("Cell info permission revoked: {}", msg);
                self.record(&format!(
                    "🚨 SECURITY ERROR: {}. Service cannot continue. Check location permission or device settings.",
                    msg
                ));
                return CycleOutcome::Stop;
            }
            Err(ScanError::Transient(msg)) => {
                warn!("Cell scan failed: {}", msg);
                self.record(&format!("🚨 SCAN ERROR: {}", msg));
                return CycleOutcome::Skipped;
            }
        };

        let records = cell::normalize_all(&readings, self.api_level);
        debug!(
            "Scan returned {} readings, {} valid",
            readings.len(),
            records.len()
        );

        if !records.is_empty() {
            match self.log.add_towers(records.iter().map(|r| r.composite_key())) {
                Ok(added) if added > 0 => info!("{} new tower(s) seen", added),
                Ok(_) => {}
                Err(e) => warn!("Failed to update unique tower set: {}", e),
            }
        }

        let current = RegisteredSet::from_records(&records);
        let changes = diff::diff(&self.last_known_registered, &current);

        for tower in &changes.connected {
            info!("Connected: {}", tower);
            self.record(&format!(
                "✅ SIM CONNECT: {} | {} | {}",
                tower.composite_key(),
                tower.technology,
                format_signal(tower)
            ));
        }
        for key in &changes.disconnected {
            info!("Disconnected: {}", key);
            self.record(&format!("🔻 SIM DISCONNECT: {}", key));
        }

        let summary = if current.is_empty() {
            "None".to_string()
        } else {
            current.keys().collect::<Vec<_>>().join(", ")
        };
        self.last_known_registered = current;

        self.record(&format!(
            "SCAN: Found {} cells. Registered: {}",
            records.len(),
            summary
        ));

        CycleOutcome::Scanned {
            cells: records.len(),
            diff: changes,
        }
    }

    /// Poll until `stop` flips to `true` or the permission is revoked
    ///
    /// `refresh` cuts the current wait short and scans immediately. The stop
    /// signal is only observed between cycles.
    pub async fn run(&mut self, mut stop: watch::Receiver<bool>, refresh: Arc<Notify>) -> StopReason {
        info!(
            "Monitoring every {}s (API level {})",
            self.interval.as_secs(),
            self.api_level
        );
        info!("Status: {}", MONITORING_STARTED);

        let reason = loop {
            if *stop.borrow() {
                break StopReason::Requested;
            }

            if self.scan_cycle().await == CycleOutcome::Stop {
                break StopReason::PermissionRevoked;
            }
            self.publish_status();

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = refresh.notified() => {
                    debug!("Manual refresh requested");
                }
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break StopReason::Requested;
                    }
                }
            }
        };

        self.record("⏹️ SERVICE STOPPED.");
        info!("Monitor stopped ({:?})", reason);
        reason
    }

    /// Surface the latest log line, the console stand-in for the
    /// persistent notification
    fn publish_status(&self) {
        let last = match self.log.last() {
            Ok(Some(line)) => line,
            Ok(None) => NO_ENTRIES_YET.to_string(),
            Err(e) => {
                warn!("Failed to read last log line: {}", e);
                return;
            }
        };
        info!("Status: {}", last);
    }

    fn record(&mut self, line: &str) {
        if let Err(e) = self.log.append(line) {
            warn!("Failed to write activity log: {}", e);
        }
    }
}

fn format_signal(tower: &NormalizedCellRecord) -> String {
    match tower.signal_dbm {
        Some(dbm) => format!("{}dBm", dbm),
        None => "n/a".to_string(),
    }
}
