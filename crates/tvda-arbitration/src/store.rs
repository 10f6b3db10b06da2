//! # In-Memory Keyed Store
//!
//! Thread-safe, cloneable key-value store used for disputes, cases and the
//! transaction ledger. Locks are `parking_lot` and are never held across an
//! `.await`, so the store is safe to share with async handlers.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;

/// Thread-safe, cloneable in-memory key-value store.
#[derive(Debug)]
pub struct Store<K, T> {
    data: Arc<RwLock<HashMap<K, T>>>,
}

impl<K, T> Clone for Store<K, T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<K, T> Default for Store<K, T>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> Store<K, T>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a record, returning the previous value if the key existed.
    pub fn insert(&self, key: K, value: T) -> Option<T> {
        self.data.write().insert(key, value)
    }

    /// Retrieve a record by key.
    pub fn get(&self, key: &K) -> Option<T> {
        self.data.read().get(key).cloned()
    }

    /// All records, in unspecified order.
    pub fn list(&self) -> Vec<T> {
        self.data.read().values().cloned().collect()
    }

    /// All keys, in unspecified order.
    pub fn keys(&self) -> Vec<K> {
        self.data.read().keys().cloned().collect()
    }

    /// Atomically read-validate-update a record under one write lock.
    ///
    /// Returns `None` if the record doesn't exist.
    pub fn try_update<R, E>(
        &self,
        key: &K,
        f: impl FnOnce(&mut T) -> Result<R, E>,
    ) -> Option<Result<R, E>> {
        self.data.write().get_mut(key).map(f)
    }

    /// Insert the record produced by `create` if absent, then apply `f`,
    /// all under one write lock.
    pub fn upsert<R>(&self, key: K, create: impl FnOnce() -> T, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.data.write();
        let entry = guard.entry(key).or_insert_with(create);
        f(entry)
    }

    /// Whether a record exists.
    pub fn contains(&self, key: &K) -> bool {
        self.data.read().contains_key(key)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
