//! Registered-tower snapshots and the connect/disconnect diff between them
//!
//! Towers are compared by composite key only. Iteration follows the order in
//! which keys were first inserted, so log output mirrors scan order.

use crate::cell::NormalizedCellRecord;

/// Registered towers from one polling cycle, keyed by composite key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisteredSet {
    entries: Vec<(String, NormalizedCellRecord)>,
}

impl RegisteredSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only registered records. A repeated key replaces the earlier
    /// record but keeps its original position.
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a NormalizedCellRecord>,
    {
        let mut set = Self::new();
        for record in records.into_iter().filter(|r| r.is_registered()) {
            set.insert(record.clone());
        }
        set
    }

    pub fn insert(&mut self, record: NormalizedCellRecord) {
        let key = record.composite_key();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = record,
            None => self.entries.push((key, record)),
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn get(&self, key: &str) -> Option<&NormalizedCellRecord> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, record)| record)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Towers gained and lost between two consecutive snapshots
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotDiff {
    /// Present now, absent before (in current-snapshot order)
    pub connected: Vec<NormalizedCellRecord>,
    /// Present before, absent now (in previous-snapshot order)
    pub disconnected: Vec<String>,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.connected.is_empty() && self.disconnected.is_empty()
    }
}

pub fn diff(previous: &RegisteredSet, current: &RegisteredSet) -> SnapshotDiff {
    let connected = current
        .entries
        .iter()
        .filter(|(key, _)| !previous.contains_key(key))
        .map(|(_, record)| record.clone())
        .collect();

    let disconnected = previous
        .keys()
        .filter(|key| !current.contains_key(key))
        .map(str::to_string)
        .collect();

    SnapshotDiff {
        connected,
        disconnected,
    }
}
