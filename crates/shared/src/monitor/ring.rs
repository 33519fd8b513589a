//! Bounded most-recent-first log of observed competitor transactions.

use crate::explorer_api::ExplorerTx;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{collections::VecDeque, sync::RwLock};

pub const DEFAULT_CAPACITY: usize = 2000;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub reseller: String,
    pub affiliate: String,
    pub tx: ExplorerTx,
    pub fee_usd: f64,
    pub posted_at: DateTime<Utc>,
}

/// Inserts prepend; the excess tail beyond the capacity is discarded.
pub struct EventRing {
    capacity: usize,
    entries: RwLock<VecDeque<LogEntry>>,
}

impl EventRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: RwLock::new(VecDeque::new()),
        }
    }

    pub fn add(&self, entry: LogEntry) {
        let mut entries = self.entries.write().unwrap();
        entries.push_front(entry);
        entries.truncate(self.capacity);
    }

    /// Up to `limit` entries passing the filter, newest first.
    pub fn snapshot(&self, limit: usize, filter: impl Fn(&LogEntry) -> bool) -> Vec<LogEntry> {
        self.entries
            .read()
            .unwrap()
            .iter()
            .filter(|entry| filter(entry))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }
}

impl Default for EventRing {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
