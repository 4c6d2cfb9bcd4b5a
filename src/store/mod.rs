//! Flat key-value persistence
//!
//! Holds three entries: the rolling activity log, its latest line, and the
//! set of every tower key ever seen. Values are either a string or a set of
//! strings; there is no schema beyond that.

pub mod activity;

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StoreError;

pub use activity::ActivityLog;

pub const KEY_ALL_LOGS: &str = "all_logs";
pub const KEY_LAST_LOG: &str = "last_log";
pub const KEY_UNIQUE_TOWERS: &str = "unique_towers";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoreValue {
    String(String),
    Set(BTreeSet<String>),
}

/// Named string and string-set values
///
/// Each single write (`put`, `put_many`, `remove`) is atomic;
/// read-modify-write sequences are not.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<&StoreValue>;

    fn put(&mut self, key: &str, value: StoreValue) -> Result<(), StoreError>;

    /// Write several entries at once
    fn put_many(&mut self, entries: Vec<(&str, StoreValue)>) -> Result<(), StoreError> {
        for (key, value) in entries {
            self.put(key, value)?;
        }
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError>;

    fn get_string(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.get(key) {
            None => Ok(None),
            Some(StoreValue::String(s)) => Ok(Some(s.clone())),
            Some(StoreValue::Set(_)) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    fn set_string(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.put(key, StoreValue::String(value.to_string()))
    }

    fn get_string_set(&self, key: &str) -> Result<BTreeSet<String>, StoreError> {
        match self.get(key) {
            None => Ok(BTreeSet::new()),
            Some(StoreValue::Set(set)) => Ok(set.clone()),
            Some(StoreValue::String(_)) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    fn set_string_set(&mut self, key: &str, value: BTreeSet<String>) -> Result<(), StoreError> {
        self.put(key, StoreValue::Set(value))
    }
}

/// Store kept in memory only; nothing survives the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, StoreValue>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<&StoreValue> {
        self.entries.get(key)
    }

    fn put(&mut self, key: &str, value: StoreValue) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Store persisted as one JSON object on disk
///
/// Every write rewrites the whole document through a sibling temp file and
/// a rename, so readers never see a half-written file. The in-memory copy
/// only changes once the file has been replaced.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, StoreValue>,
}

impl JsonFileStore {
    /// Open the store at `path`, starting empty if the file does not exist
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => {
                serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
                    path: path.display().to_string(),
                    source,
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Store file {:?} not found, starting empty", path);
                BTreeMap::new()
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist `entries` and adopt them as the current state
    fn commit(&mut self, entries: BTreeMap<String, StoreValue>) -> Result<(), StoreError> {
        self.flush(&entries)?;
        self.entries = entries;
        Ok(())
    }

    fn flush(&self, entries: &BTreeMap<String, StoreValue>) -> Result<(), StoreError> {
        let io_err = |source: std::io::Error| StoreError::Io {
            path: self.path.display().to_string(),
            source,
        };

        let data = serde_json::to_string_pretty(entries).map_err(|source| {
            StoreError::Corrupt {
                path: self.path.display().to_string(),
                source,
            }
        })?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(&tmp, data).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<&StoreValue> {
        self.entries.get(key)
    }

    fn put(&mut self, key: &str, value: StoreValue) -> Result<(), StoreError> {
        self.put_many(vec![(key, value)])
    }

    fn put_many(&mut self, entries: Vec<(&str, StoreValue)>) -> Result<(), StoreError> {
        let mut next = self.entries.clone();
        for (key, value) in entries {
            next.insert(key.to_string(), value);
        }
        self.commit(next)
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        if !self.entries.contains_key(key) {
            return Ok(());
        }
        let mut next = self.entries.clone();
        next.remove(key);
        self.commit(next)
    }
}
