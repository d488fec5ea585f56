// History ledger - remembers what you asked for and what the model heard
// Bounded log of (query, emotion) pairs, persisted across sessions,
// aggregated into the emotion frequency chart.

pub mod store;

pub use store::{FileHistoryStore, HistoryStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Fixed key the serialized ledger is persisted under.
pub const STORAGE_KEY: &str = "auris-history";

/// The ledger never holds more than this many entries; recording past the
/// bound evicts the oldest.
pub const HISTORY_CAPACITY: usize = 10;

/// One past query and the emotion the model predicted for it. Entries are
/// never mutated after creation; recency is their position in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub query_text: String,
    pub emotion: String,
    pub recorded_at: DateTime<Utc>,
}

/// One bar of the emotion frequency chart. This is the whole data contract
/// handed to the rendering side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmotionCount {
    pub label: String,
    pub count: u64,
}

/// Most-recent-first log of queries, bounded at [`HISTORY_CAPACITY`].
///
/// Every successful `record` re-serializes the whole ledger through the
/// store; persistence failures are logged and otherwise ignored so they can
/// never corrupt the in-memory state.
pub struct HistoryLedger<S: HistoryStore> {
    entries: Vec<HistoryEntry>,
    store: S,
}

impl<S: HistoryStore> HistoryLedger<S> {
    /// Reconstructs the ledger from the store. Missing or malformed persisted
    /// data degrades to an empty ledger; this never fails.
    pub fn load(store: S) -> Self {
        let entries = match store.read() {
            Ok(Some(payload)) => match serde_json::from_str::<Vec<HistoryEntry>>(&payload) {
                Ok(mut entries) => {
                    entries.truncate(HISTORY_CAPACITY);
                    debug!("Loaded {} history entries", entries.len());
                    entries
                }
                Err(e) => {
                    warn!("Ignoring malformed history payload: {}", e);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("Could not read history store: {}", e);
                Vec::new()
            }
        };

        Self { entries, store }
    }

    /// Prepends a new entry and evicts beyond the capacity bound. The emotion
    /// is treated as an opaque label; the recommendation response is trusted.
    pub fn record(&mut self, query_text: &str, emotion: &str) {
        self.entries.insert(
            0,
            HistoryEntry {
                query_text: query_text.to_string(),
                emotion: emotion.to_string(),
                recorded_at: Utc::now(),
            },
        );
        self.entries.truncate(HISTORY_CAPACITY);

        // Fire-and-forget persistence; in-memory state is already correct.
        match serde_json::to_string_pretty(&self.entries) {
            Ok(payload) => {
                if let Err(e) = self.store.write(&payload) {
                    warn!("Failed to persist history: {}", e);
                }
            }
            Err(e) => warn!("Failed to serialize history: {}", e),
        }
    }

    /// Emotion -> occurrence count over the current ledger, one entry per
    /// distinct label, ordered by first appearance in the scan. Pure.
    pub fn aggregate(&self) -> Vec<EmotionCount> {
        let mut counts: Vec<EmotionCount> = Vec::new();

        for entry in &self.entries {
            match counts.iter_mut().find(|c| c.label == entry.emotion) {
                Some(existing) => existing.count += 1,
                None => counts.push(EmotionCount {
                    label: entry.emotion.clone(),
                    count: 1,
                }),
            }
        }

        counts
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Store stand-in so ledger behavior is testable without a filesystem.
    #[derive(Default)]
    struct MemoryStore {
        payload: RefCell<Option<String>>,
        fail_writes: bool,
    }

    impl HistoryStore for MemoryStore {
        fn read(&self) -> anyhow::Result<Option<String>> {
            Ok(self.payload.borrow().clone())
        }

        fn write(&self, payload: &str) -> anyhow::Result<()> {
            if self.fail_writes {
                anyhow::bail!("disk on fire");
            }
            *self.payload.borrow_mut() = Some(payload.to_string());
            Ok(())
        }
    }

    fn seeded(payload: &str) -> MemoryStore {
        MemoryStore {
            payload: RefCell::new(Some(payload.to_string())),
            fail_writes: false,
        }
    }

    #[test]
    fn record_is_most_recent_first() {
        let mut ledger = HistoryLedger::load(MemoryStore::default());
        ledger.record("feeling great", "joy");
        ledger.record("a bit down", "sadness");

        assert_eq!(ledger.entries()[0].query_text, "a bit down");
        assert_eq!(ledger.entries()[1].query_text, "feeling great");
    }

    #[test]
    fn ledger_never_exceeds_capacity() {
        let mut ledger = HistoryLedger::load(MemoryStore::default());
        for i in 0..25 {
            ledger.record(&format!("query {}", i), "joy");
        }

        assert_eq!(ledger.len(), HISTORY_CAPACITY);
        // The newest survives, the oldest were evicted
        assert_eq!(ledger.entries()[0].query_text, "query 24");
        assert_eq!(ledger.entries()[9].query_text, "query 15");
    }

    #[test]
    fn aggregate_counts_in_first_appearance_order() {
        let mut ledger = HistoryLedger::load(MemoryStore::default());
        // Recorded oldest-first; ledger scan sees most-recent-first
        ledger.record("e3", "sad");
        ledger.record("e2", "joy");
        ledger.record("e1", "joy");

        let counts = ledger.aggregate();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0].label, "joy");
        assert_eq!(counts[0].count, 2);
        assert_eq!(counts[1].label, "sad");
        assert_eq!(counts[1].count, 1);

        let total: u64 = counts.iter().map(|c| c.count).sum();
        assert_eq!(total as usize, ledger.len());
    }

    #[test]
    fn aggregate_of_empty_ledger_is_empty() {
        let ledger = HistoryLedger::load(MemoryStore::default());
        assert!(ledger.aggregate().is_empty());
    }

    #[test]
    fn malformed_payload_degrades_to_empty() {
        let ledger = HistoryLedger::load(seeded("{not json"));
        assert!(ledger.is_empty());

        let ledger = HistoryLedger::load(seeded(r#"{"wrong": "shape"}"#));
        assert!(ledger.is_empty());
    }

    #[test]
    fn oversized_payload_is_clamped_on_load() {
        let mut entries = Vec::new();
        for i in 0..20 {
            entries.push(HistoryEntry {
                query_text: format!("query {}", i),
                emotion: "joy".to_string(),
                recorded_at: Utc::now(),
            });
        }
        let ledger = HistoryLedger::load(seeded(&serde_json::to_string(&entries).unwrap()));
        assert_eq!(ledger.len(), HISTORY_CAPACITY);
    }

    #[test]
    fn persistence_failure_keeps_memory_state() {
        let store = MemoryStore {
            payload: RefCell::new(None),
            fail_writes: true,
        };
        let mut ledger = HistoryLedger::load(store);
        ledger.record("still here", "joy");

        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.entries()[0].emotion, "joy");
    }

    #[test]
    fn round_trips_through_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let queries = ["one", "two", "three", "four", "five"];

        let mut ledger = HistoryLedger::load(FileHistoryStore::new(dir.path()));
        for q in queries {
            ledger.record(q, "neutral");
        }
        let saved = ledger.entries().to_vec();

        let reloaded = HistoryLedger::load(FileHistoryStore::new(dir.path()));
        assert_eq!(reloaded.entries(), saved.as_slice());
    }
}
