//! Concurrent keyed store with per-key atomic read-modify-write.
//!
//! Each key owns its own mutex cell; the sharded map only guards membership.
//! Callers never receive references into the store, only clones.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::types::{ContextError, ContextResult};

/// Generic keyed store shared by every handler of a server process.
pub struct StateStore<V> {
    cells: DashMap<String, Arc<Mutex<V>>>,
}

impl<V: Clone> StateStore<V> {
    pub fn new() -> Self {
        Self {
            cells: DashMap::new(),
        }
    }

    /// Build a store from existing entries. Later duplicates win.
    pub fn from_entries(entries: impl IntoIterator<Item = (String, V)>) -> Self {
        let cells = DashMap::new();
        for (key, value) in entries {
            cells.insert(key, Arc::new(Mutex::new(value)));
        }
        Self { cells }
    }

    /// Insert a new record. Fails with `AlreadyExists` if the key is taken.
    pub fn create(&self, key: impl Into<String>, value: V) -> ContextResult<V> {
        match self.cells.entry(key.into()) {
            Entry::Occupied(entry) => Err(ContextError::AlreadyExists(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(Mutex::new(value.clone())));
                Ok(value)
            }
        }
    }

    /// Insert or replace a record, returning the previous value if any.
    pub fn put(&self, key: impl Into<String>, value: V) -> Option<V> {
        let cell = match self.cells.entry(key.into()) {
            Entry::Occupied(entry) => Arc::clone(entry.get()),
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(Mutex::new(value)));
                return None;
            }
        };
        let mut guard = cell.lock();
        Some(std::mem::replace(&mut *guard, value))
    }

    /// Clone of the current value for `key`.
    pub fn get(&self, key: &str) -> ContextResult<V> {
        let cell = self.cell(key)?;
        let value = cell.lock().clone();
        Ok(value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.cells.contains_key(key)
    }

    /// Apply `update` to the record under its lock and return the new value.
    ///
    /// The update works on a copy; if it returns an error the stored record is
    /// left untouched. `update` must not call back into this store.
    pub fn mutate<F>(&self, key: &str, update: F) -> ContextResult<V>
    where
        F: FnOnce(&mut V) -> ContextResult<()>,
    {
        let cell = self.cell(key)?;
        let mut guard = cell.lock();
        let mut next = guard.clone();
        update(&mut next)?;
        *guard = next.clone();
        Ok(next)
    }

    /// Clones of every record matching `predicate`, in no particular order.
    pub fn list<P>(&self, predicate: P) -> Vec<V>
    where
        P: Fn(&V) -> bool,
    {
        // Collect the cells first so no shard lock is held while records are locked.
        let cells: Vec<Arc<Mutex<V>>> = self
            .cells
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        cells
            .iter()
            .filter_map(|cell| {
                let value = cell.lock();
                predicate(&*value).then(|| value.clone())
            })
            .collect()
    }

    /// All entries, sorted by key.
    pub fn snapshot(&self) -> Vec<(String, V)> {
        let cells: Vec<(String, Arc<Mutex<V>>)> = self
            .cells
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        let mut entries: Vec<(String, V)> = cells
            .into_iter()
            .map(|(key, cell)| {
                let value = cell.lock().clone();
                (key, value)
            })
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn cell(&self, key: &str) -> ContextResult<Arc<Mutex<V>>> {
        self.cells
            .get(key)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ContextError::NotFound(key.to_string()))
    }
}

impl<V: Clone> Default for StateStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Counter {
        value: u64,
        status: &'static str,
    }

    fn counter() -> Counter {
        Counter {
            value: 0,
            status: "open",
        }
    }

    #[test]
    fn test_create_conflict() {
        let store = StateStore::new();
        store.create("a", counter()).unwrap();
        let err = store.create("a", counter()).unwrap_err();
        assert!(matches!(err, ContextError::AlreadyExists(ref k) if k == "a"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_get_missing() {
        let store: StateStore<Counter> = StateStore::new();
        assert!(matches!(store.get("nope"), Err(ContextError::NotFound(_))));
        assert!(matches!(
            store.mutate("nope", |_| Ok(())),
            Err(ContextError::NotFound(_))
        ));
    }

    #[test]
    fn test_mutate_returns_new_value() {
        let store = StateStore::new();
        store.create("a", counter()).unwrap();
        let next = store
            .mutate("a", |c| {
                c.value += 5;
                Ok(())
            })
            .unwrap();
        assert_eq!(next.value, 5);
        assert_eq!(store.get("a").unwrap().value, 5);
    }

    #[test]
    fn test_failed_mutate_leaves_record_unchanged() {
        let store = StateStore::new();
        store.create("a", counter()).unwrap();
        let result = store.mutate("a", |c| {
            c.value = 99;
            c.status = "closed";
            Err(ContextError::Rejected("nope".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(store.get("a").unwrap(), counter());
    }

    #[test]
    fn test_put_replaces() {
        let store = StateStore::new();
        assert!(store.put("a", counter()).is_none());
        let previous = store.put(
            "a",
            Counter {
                value: 3,
                status: "open",
            },
        );
        assert_eq!(previous, Some(counter()));
        assert_eq!(store.get("a").unwrap().value, 3);
    }

    #[test]
    fn test_list_with_predicate() {
        let store = StateStore::new();
        for i in 0..10u64 {
            store
                .create(
                    format!("k{i}"),
                    Counter {
                        value: i,
                        status: if i % 2 == 0 { "open" } else { "closed" },
                    },
                )
                .unwrap();
        }
        let open = store.list(|c| c.status == "open");
        assert_eq!(open.len(), 5);
        assert!(open.iter().all(|c| c.value % 2 == 0));
        assert_eq!(store.list(|_| true).len(), 10);
    }

    #[test]
    fn test_snapshot_sorted() {
        let store = StateStore::new();
        store.create("b", counter()).unwrap();
        store.create("a", counter()).unwrap();
        store.create("c", counter()).unwrap();
        let keys: Vec<String> = store.snapshot().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);

        let restored = StateStore::from_entries(store.snapshot());
        assert_eq!(restored.len(), 3);
    }

    #[test]
    fn test_concurrent_increments_no_lost_update() {
        const THREADS: u64 = 16;
        const PER_THREAD: u64 = 250;

        let store = StateStore::new();
        store.create("counter", counter()).unwrap();

        std::thread::scope(|scope| {
            for _ in 0..THREADS {
                scope.spawn(|| {
                    for _ in 0..PER_THREAD {
                        store
                            .mutate("counter", |c| {
                                let seen = c.value;
                                std::thread::yield_now();
                                c.value = seen + 1;
                                Ok(())
                            })
                            .unwrap();
                    }
                });
            }
        });

        assert_eq!(store.get("counter").unwrap().value, THREADS * PER_THREAD);
    }

    #[test]
    fn test_concurrent_create_single_winner() {
        let store = StateStore::new();
        let wins = std::sync::atomic::AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    if store.create("same", counter()).is_ok() {
                        wins.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(wins.into_inner(), 1);
        assert_eq!(store.len(), 1);
    }
}
