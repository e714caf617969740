//! Progress ledger: which parts of which item have been uploaded.
//!
//! The ledger is the single source of truth for upload progress. It is a
//! small JSON document keyed by item id, loaded once per run and rewritten
//! atomically after every mutation so a crash can only ever lose the commit
//! that was in flight, never an earlier one.

mod persist;
#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("read ledger {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("ledger {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("write ledger {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Completed parts per item (1-based indexes).
pub type Entries = BTreeMap<String, BTreeSet<u32>>;

#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    entries: Entries,
}

impl Ledger {
    /// Loads the ledger at `path`. A missing file is an empty ledger.
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        let entries = persist::read_entries(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &Entries {
        &self.entries
    }

    /// Parts of `item_id` already uploaded.
    pub fn completed(&self, item_id: &str) -> Option<&BTreeSet<u32>> {
        self.entries.get(item_id)
    }

    /// Highest part index recorded for `item_id`.
    pub fn highest_completed(&self, item_id: &str) -> Option<u32> {
        self.entries.get(item_id).and_then(|d| d.last().copied())
    }

    /// First index in `1..=total` not yet committed for `item_id`.
    pub fn first_incomplete(&self, item_id: &str, total: u32) -> Option<u32> {
        let done = self.entries.get(item_id);
        (1..=total).find(|i| !done.is_some_and(|d| d.contains(i)))
    }

    /// Records part `index` of `item_id` as uploaded and persists the ledger.
    ///
    /// On a write failure the in-memory state is rolled back so it keeps
    /// matching what is on disk.
    pub fn commit(&mut self, item_id: &str, index: u32) -> Result<(), LedgerError> {
        let set = self.entries.entry(item_id.to_string()).or_default();
        if !set.insert(index) {
            return Ok(());
        }
        if let Err(e) = persist::write_entries(&self.path, &self.entries) {
            if let Some(set) = self.entries.get_mut(item_id) {
                set.remove(&index);
                if set.is_empty() {
                    self.entries.remove(item_id);
                }
            }
            return Err(e);
        }
        tracing::debug!(item = item_id, part = index, "ledger commit");
        Ok(())
    }

    /// Drops the entry for `item_id` and persists. Returns whether it existed.
    pub fn remove(&mut self, item_id: &str) -> Result<bool, LedgerError> {
        let Some(old) = self.entries.remove(item_id) else {
            return Ok(false);
        };
        if let Err(e) = persist::write_entries(&self.path, &self.entries) {
            self.entries.insert(item_id.to_string(), old);
            return Err(e);
        }
        tracing::debug!(item = item_id, "ledger entry removed");
        Ok(true)
    }
}
