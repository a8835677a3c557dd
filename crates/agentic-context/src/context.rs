//! The shared context store handed to every handler.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::StateStore;
use crate::types::{Record, Slot};

/// Process-wide state: entity records plus named context slots.
pub struct ContextStore {
    pub records: StateStore<Record>,
    pub slots: StateStore<Slot>,
    created_at: DateTime<Utc>,
}

/// Counts reported by `stats`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub records: usize,
    pub slots: usize,
    pub by_kind: BTreeMap<String, usize>,
}

/// Point-in-time copy of a `ContextStore`, as written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub records: Vec<Record>,
    pub slots: Vec<Slot>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self {
            records: StateStore::new(),
            slots: StateStore::new(),
            created_at: Utc::now(),
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Records of one kind, oldest first.
    pub fn records_of(&self, kind: &str) -> Vec<Record> {
        let mut records = self.records.list(|r| r.kind == kind);
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        records
    }

    pub fn stats(&self) -> StoreStats {
        let mut by_kind = BTreeMap::new();
        for record in self.records.list(|_| true) {
            *by_kind.entry(record.kind).or_insert(0) += 1;
        }
        StoreStats {
            records: self.records.len(),
            slots: self.slots.len(),
            by_kind,
        }
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            records: self.records.snapshot().into_iter().map(|(_, r)| r).collect(),
            slots: self.slots.snapshot().into_iter().map(|(_, s)| s).collect(),
            created_at: self.created_at,
            updated_at: Utc::now(),
        }
    }

    pub fn from_snapshot(snapshot: ContextSnapshot) -> Self {
        Self {
            records: StateStore::from_entries(
                snapshot.records.into_iter().map(|r| (r.key(), r)),
            ),
            slots: StateStore::from_entries(
                snapshot.slots.into_iter().map(|s| (s.name.clone(), s)),
            ),
            created_at: snapshot.created_at,
        }
    }
}

impl Default for ContextStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SlotRole;

    #[test]
    fn test_stats_by_kind() {
        let store = ContextStore::new();
        for id in ["a", "b"] {
            let r = Record::new("task", id, "open");
            store.records.create(r.key(), r).unwrap();
        }
        let r = Record::new("ticket", "t1", "open");
        store.records.create(r.key(), r).unwrap();
        store
            .slots
            .put("greeting", Slot::new("greeting", SlotRole::System, "hi"));

        let stats = store.stats();
        assert_eq!(stats.records, 3);
        assert_eq!(stats.slots, 1);
        assert_eq!(stats.by_kind.get("task"), Some(&2));
        assert_eq!(stats.by_kind.get("ticket"), Some(&1));
    }

    #[test]
    fn test_snapshot_restore_keys() {
        let store = ContextStore::new();
        let r = Record::new("task", "ORD-1", "RAW_MATERIAL");
        store.records.create(r.key(), r).unwrap();
        store
            .slots
            .put("user_query", Slot::new("user_query", SlotRole::User, "hello"));

        let restored = ContextStore::from_snapshot(store.snapshot());
        assert_eq!(restored.records.get("task:ORD-1").unwrap().status, "RAW_MATERIAL");
        assert_eq!(restored.slots.get("user_query").unwrap().content, "hello");
        assert_eq!(restored.created_at(), store.created_at());
    }
}
