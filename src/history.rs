use crate::storage::{self, KeyValueStore, KEY_HISTORY};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::rc::Rc;

pub const DEFAULT_HISTORY_CAPACITY: usize = 20;

/// Resume metadata for one document, keyed by its name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingRecord {
    pub document_name: String,
    pub token_count: usize,
    pub last_index: usize,
    pub last_access_time: DateTime<Utc>,
    pub pace_tokens_per_minute: u32,
}

impl ReadingRecord {
    /// How far through the document the reader got, 0-100.
    pub fn percent(&self) -> u8 {
        if self.token_count <= 1 {
            return 0;
        }
        let ratio = self.last_index as f64 / (self.token_count - 1) as f64;
        (ratio * 100.0).round().min(100.0) as u8
    }
}

/// Most-recently-updated-first list of reading records, persisted as a JSON
/// array on every change.
pub struct HistoryLedger {
    records: Vec<ReadingRecord>,
    capacity: usize,
    store: Rc<dyn KeyValueStore>,
}

impl HistoryLedger {
    pub fn load(store: Rc<dyn KeyValueStore>, capacity: usize) -> Self {
        let records = match storage::read_or_warn(store.as_ref(), KEY_HISTORY) {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                log::warn!("ignoring unreadable reading history: {err}");
                Vec::new()
            }),
            None => Vec::new(),
        };

        let mut ledger = Self {
            records,
            capacity,
            store,
        };
        ledger.records.truncate(capacity);
        ledger
    }

    pub fn list(&self) -> &[ReadingRecord] {
        &self.records
    }

    pub fn find(&self, document_name: &str) -> Option<&ReadingRecord> {
        self.records
            .iter()
            .find(|record| record.document_name == document_name)
    }

    /// Insert or replace the record for its document and make it the most
    /// recent; the oldest records beyond the capacity are evicted.
    pub fn upsert(&mut self, record: ReadingRecord) {
        self.records
            .retain(|existing| existing.document_name != record.document_name);
        self.records.insert(0, record);
        self.records.truncate(self.capacity);
        self.persist();
    }

    pub fn delete(&mut self, document_name: &str) {
        self.records
            .retain(|record| record.document_name != document_name);
        self.persist();
    }

    fn persist(&self) {
        match serde_json::to_string(&self.records) {
            Ok(json) => storage::write_or_warn(self.store.as_ref(), KEY_HISTORY, &json),
            Err(err) => log::warn!("failed to serialise reading history: {err}"),
        }
    }
}
