//! Rolling activity log and unique-tower accumulation on top of a store

use std::collections::BTreeSet;

use chrono::Local;

use super::{KeyValueStore, StoreValue, KEY_ALL_LOGS, KEY_LAST_LOG, KEY_UNIQUE_TOWERS};
use crate::error::StoreError;

/// Default cap on retained log lines
pub const DEFAULT_MAX_LINES: usize = 15_000;

/// Shown before the first entry has been written
pub const NO_ENTRIES_YET: &str = "Waiting for first scan...";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Timestamped log lines, newest first, plus the set of every tower seen
pub struct ActivityLog<S> {
    store: S,
    max_lines: usize,
}

impl<S: KeyValueStore> ActivityLog<S> {
    pub fn new(store: S, max_lines: usize) -> Self {
        Self {
            store,
            max_lines: max_lines.max(1),
        }
    }

    /// Prepend a timestamped entry, trim to the line cap, and record it as
    /// the latest line in one store write. Returns the full entry as written.
    pub fn append(&mut self, data: &str) -> Result<String, StoreError> {
        let entry = format!("{}: {}", Local::now().format(TIMESTAMP_FORMAT), data);

        let existing = self.store.get_string(KEY_ALL_LOGS)?.unwrap_or_default();
        let lines: Vec<&str> = std::iter::once(entry.as_str())
            .chain(existing.split('\n').filter(|line| !line.is_empty()))
            .take(self.max_lines)
            .collect();

        let all = lines.join("\n");
        self.store.put_many(vec![
            (KEY_ALL_LOGS, StoreValue::String(all)),
            (KEY_LAST_LOG, StoreValue::String(entry.clone())),
        ])?;
        Ok(entry)
    }

    /// All retained entries, newest first
    pub fn entries(&self) -> Result<Vec<String>, StoreError> {
        Ok(self
            .store
            .get_string(KEY_ALL_LOGS)?
            .map(|all| {
                all.split('\n')
                    .filter(|line| !line.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    pub fn last(&self) -> Result<Option<String>, StoreError> {
        self.store.get_string(KEY_LAST_LOG)
    }

    /// Merge tower keys into the persisted unique set; returns how many were new
    pub fn add_towers<I, K>(&mut self, keys: I) -> Result<usize, StoreError>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let mut towers = self.store.get_string_set(KEY_UNIQUE_TOWERS)?;
        let before = towers.len();
        towers.extend(keys.into_iter().map(Into::into));
        let added = towers.len() - before;
        if added > 0 {
            self.store.set_string_set(KEY_UNIQUE_TOWERS, towers)?;
        }
        Ok(added)
    }

    pub fn towers(&self) -> Result<BTreeSet<String>, StoreError> {
        self.store.get_string_set(KEY_UNIQUE_TOWERS)
    }

    /// Drop the log, the latest line and the unique set
    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.store.remove(KEY_ALL_LOGS)?;
        self.store.remove(KEY_LAST_LOG)?;
        self.store.remove(KEY_UNIQUE_TOWERS)
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}
