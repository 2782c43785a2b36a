//! Persisted snapshots of unsaved form input.
//!
//! Drafts are a convenience: every storage or serialization failure is logged
//! and swallowed so the form keeps working in memory.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::records::{FieldValue, Record};
use crate::storage::KeyValueStore;

const DRAFT_PREFIX: &str = "draft:";

/// Storage key of a draft, derived from record identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DraftKey {
    /// Shared by every new-record session
    Create,
    Edit(i64),
}

impl DraftKey {
    pub fn for_record(record: &Record) -> Self {
        match record.id {
            Some(id) => DraftKey::Edit(id),
            None => DraftKey::Create,
        }
    }
}

impl fmt::Display for DraftKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DraftKey::Create => write!(f, "{}create", DRAFT_PREFIX),
            DraftKey::Edit(id) => write!(f, "{}edit:{}", DRAFT_PREFIX, id),
        }
    }
}

/// Field values as saved in a draft
pub type Snapshot = BTreeMap<String, FieldValue>;

#[derive(Clone)]
pub struct DraftStore {
    store: Arc<dyn KeyValueStore>,
}

impl DraftStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Overwrite the draft under `key`; returns whether it was written
    pub fn save(&self, key: DraftKey, values: &Snapshot) -> bool {
        let json = match serde_json::to_string(values) {
            Ok(json) => json,
            Err(err) => {
                warn!(%key, error = %err, "could not serialize draft");
                return false;
            }
        };

        match self.store.set(&key.to_string(), &json) {
            Ok(()) => {
                debug!(%key, fields = values.len(), "draft saved");
                true
            }
            Err(err) => {
                warn!(%key, error = %err, "could not save draft");
                false
            }
        }
    }

    pub fn load(&self, key: DraftKey) -> Option<Snapshot> {
        let raw = match self.store.get(&key.to_string()) {
            Ok(raw) => raw?,
            Err(err) => {
                warn!(%key, error = %err, "could not read draft");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(values) => Some(values),
            Err(err) => {
                warn!(%key, error = %err, "ignoring unreadable draft");
                None
            }
        }
    }

    pub fn discard(&self, key: DraftKey) {
        match self.store.remove(&key.to_string()) {
            Ok(()) => debug!(%key, "draft discarded"),
            Err(err) => warn!(%key, error = %err, "could not discard draft"),
        }
    }

    /// Remove every stored draft; returns how many were removed
    pub fn clear_all(&self) -> usize {
        let keys = match self.store.keys() {
            Ok(keys) => keys,
            Err(err) => {
                warn!(error = %err, "could not list drafts");
                return 0;
            }
        };

        keys.iter()
            .filter(|k| k.starts_with(DRAFT_PREFIX))
            .filter(|k| self.store.remove(k).is_ok())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn snapshot(name: &str) -> Snapshot {
        let mut values = Snapshot::new();
        values.insert("nombres".to_string(), FieldValue::text(name));
        values
    }

    #[test]
    fn test_key_format() {
        assert_eq!(DraftKey::Create.to_string(), "draft:create");
        assert_eq!(DraftKey::Edit(7).to_string(), "draft:edit:7");
        assert_eq!(DraftKey::for_record(&Record::with_id(3)), DraftKey::Edit(3));
        assert_eq!(DraftKey::for_record(&Record::new()), DraftKey::Create);
    }

    #[test]
    fn test_keys_are_isolated() {
        let drafts = DraftStore::new(Arc::new(MemoryStore::new()));
        assert!(drafts.save(DraftKey::Edit(7), &snapshot("Siete")));

        assert_eq!(drafts.load(DraftKey::Edit(9)), None);
        assert_eq!(drafts.load(DraftKey::Create), None);
        assert_eq!(drafts.load(DraftKey::Edit(7)), Some(snapshot("Siete")));
    }

    #[test]
    fn test_last_write_wins() {
        let drafts = DraftStore::new(Arc::new(MemoryStore::new()));
        drafts.save(DraftKey::Create, &snapshot("Uno"));
        drafts.save(DraftKey::Create, &snapshot("Dos"));
        assert_eq!(drafts.load(DraftKey::Create), Some(snapshot("Dos")));
    }

    #[test]
    fn test_storage_failures_are_swallowed() {
        let store = Arc::new(MemoryStore::new());
        let drafts = DraftStore::new(store.clone());
        store.set_failing(true);

        assert!(!drafts.save(DraftKey::Create, &snapshot("Ana")));
        assert_eq!(drafts.load(DraftKey::Create), None);
        drafts.discard(DraftKey::Create);
        assert_eq!(drafts.clear_all(), 0);
    }

    #[test]
    fn test_corrupt_draft_is_ignored() {
        let store = Arc::new(MemoryStore::new());
        store.set("draft:create", "{not json").unwrap();
        assert_eq!(DraftStore::new(store).load(DraftKey::Create), None);
    }

    #[test]
    fn test_clear_all_leaves_tokens() {
        let store = Arc::new(MemoryStore::new());
        store.set("access_token", "t").unwrap();
        let drafts = DraftStore::new(store.clone());
        drafts.save(DraftKey::Create, &snapshot("a"));
        drafts.save(DraftKey::Edit(2), &snapshot("b"));

        assert_eq!(drafts.clear_all(), 2);
        assert_eq!(store.keys().unwrap(), vec!["access_token"]);
    }
}
