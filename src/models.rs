//! Core data structures for snapshot tracking
//!
//! A [`Snapshot`] is the in-memory view of a Notion database: one
//! [`SnapshotEntry`] per page id. The watcher keeps one held snapshot for the
//! lifetime of the process and diffs every freshly fetched snapshot against it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::hash_map;
use std::collections::HashMap;

/// Status label recorded when a page has no usable status property
pub const NO_STATUS: &str = "No Status";

/// Observable fields of a single database record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// Resolved status label (including the [`NO_STATUS`] fallback)
    pub status: Option<String>,

    /// Plain-text title, if the page has one
    pub title: Option<String>,
}

impl SnapshotEntry {
    /// Create an entry with both fields
    pub fn new(status: impl Into<String>, title: Option<String>) -> Self {
        Self {
            status: Some(status.into()),
            title,
        }
    }

    /// Create an entry that only tracks status
    ///
    /// This is the shape the held snapshot stores: titles are not retained
    /// once a record has been observed.
    pub fn status_only(status: Option<String>) -> Self {
        Self {
            status,
            title: None,
        }
    }
}

/// Mapping from record id to its last observed fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    entries: HashMap<String, SnapshotEntry>,
}

impl Snapshot {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the snapshot holds no records
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a record by id
    pub fn get(&self, id: &str) -> Option<&SnapshotEntry> {
        self.entries.get(id)
    }

    /// Check if a record id is present
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Insert or replace a record, returning the previous entry
    pub fn insert(&mut self, id: impl Into<String>, entry: SnapshotEntry) -> Option<SnapshotEntry> {
        self.entries.insert(id.into(), entry)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut SnapshotEntry> {
        self.entries.get_mut(id)
    }

    /// Iterate over record ids
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Iterate over `(id, entry)` pairs
    pub fn iter(&self) -> hash_map::Iter<'_, String, SnapshotEntry> {
        self.entries.iter()
    }
}

impl IntoIterator for Snapshot {
    type Item = (String, SnapshotEntry);
    type IntoIter = hash_map::IntoIter<String, SnapshotEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = (&'a String, &'a SnapshotEntry);
    type IntoIter = hash_map::Iter<'a, String, SnapshotEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl<K: Into<String>> FromIterator<(K, SnapshotEntry)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (K, SnapshotEntry)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl<K: Into<String>> Extend<(K, SnapshotEntry)> for Snapshot {
    fn extend<I: IntoIterator<Item = (K, SnapshotEntry)>>(&mut self, iter: I) {
        self.entries
            .extend(iter.into_iter().map(|(k, v)| (k.into(), v)));
    }
}

/// A detected status change on a single record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    /// Page id
    pub id: String,

    /// Title from the fresh fetch
    pub title: Option<String>,

    /// Status held before this cycle
    pub previous: Option<String>,

    /// Status observed in this cycle
    pub current: Option<String>,
}

/// Summary of one detection cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    /// Records returned by the fetch
    pub fetched: usize,

    /// Records seen for the first time
    pub added: usize,

    /// Status changes, one notification each
    pub changes: Vec<StatusChange>,

    /// When the cycle started
    pub started_at: DateTime<Utc>,

    /// When the cycle finished
    pub finished_at: DateTime<Utc>,
}

impl CycleReport {
    /// Check if the cycle produced no notifications
    pub fn is_quiet(&self) -> bool {
        self.changes.is_empty()
    }

    /// Wall time spent in the cycle
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
