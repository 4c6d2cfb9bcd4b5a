//! One-shot tower probe
//!
//! Scans once and groups the distinct towers by carrier network, for display.

use serde::Serialize;
use tracing::warn;

use crate::cell::{self, NormalizedCellRecord};
use crate::error::ScanError;
use crate::source::CellInfoSource;

/// Towers heard on one carrier network (`mcc-mnc`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimInfo {
    pub network_identifier: String,
    pub towers: Vec<NormalizedCellRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProbeState {
    pub sims: Vec<SimInfo>,
    pub error: Option<String>,
}

impl ProbeState {
    fn failed(error: String) -> Self {
        Self {
            sims: Vec::new(),
            error: Some(error),
        }
    }
}

pub async fn probe<S: CellInfoSource>(source: &mut S, api_level: u32) -> ProbeState {
    let readings = match source.all_cell_info().await {
        Ok(readings) => readings,
        Err(ScanError::PermissionRevoked(msg)) => {
            warn!("Probe denied: {}", msg);
            return ProbeState::failed(format!("SecurityException: {}", msg));
        }
        Err(ScanError::Transient(msg)) => {
            warn!("Probe failed: {}", msg);
            return ProbeState::failed(format!("An unexpected error occurred: {}", msg));
        }
    };

    if readings.is_empty() {
        return ProbeState::failed("No cell info available.".to_string());
    }

    let records = cell::normalize_all(&readings, api_level);
    ProbeState {
        sims: group_by_network(dedupe(records)),
        error: None,
    }
}

/// Drop repeated towers, keeping the first occurrence
fn dedupe(records: Vec<NormalizedCellRecord>) -> Vec<NormalizedCellRecord> {
    let mut seen = std::collections::HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert(r.composite_key()))
        .collect()
}

/// Group by `mcc-mnc` in first-seen order
fn group_by_network(records: Vec<NormalizedCellRecord>) -> Vec<SimInfo> {
    let mut sims: Vec<SimInfo> = Vec::new();
    for record in records {
        let network = record.network_identifier();
        match sims.iter_mut().find(|s| s.network_identifier == network) {
            Some(sim) => sim.towers.push(record),
            None => sims.push(SimInfo {
                network_identifier: network,
                towers: vec![record],
            }),
        }
    }
    sims
}
