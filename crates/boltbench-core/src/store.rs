//! Observable key-value stores.
//!
//! A [`MapStore`] is a `String -> V` map behind a `tokio::sync::watch`
//! channel. Every mutation that changes the map notifies subscribers, who
//! always see a consistent snapshot; this is how the UI side follows action
//! and artifact state without polling.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// Snapshot type held by a [`MapStore`].
pub type StoreMap<V> = HashMap<String, V>;

/// A cloneable, observable map. Clones share the same data.
pub struct MapStore<V> {
    tx: Arc<watch::Sender<StoreMap<V>>>,
}

impl<V> Clone for MapStore<V> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<V> Default for MapStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for MapStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapStore")
            .field("len", &self.tx.borrow().len())
            .finish()
    }
}

impl<V> MapStore<V> {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(HashMap::new());
        Self { tx: Arc::new(tx) }
    }

    /// Receive every future change. The receiver starts at the current value.
    pub fn subscribe(&self) -> watch::Receiver<StoreMap<V>> {
        self.tx.subscribe()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.tx.borrow().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.tx.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.borrow().is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.tx.borrow().keys().cloned().collect()
    }

    /// Insert or replace a value.
    pub fn insert(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        self.tx.send_modify(|map| {
            map.insert(key, value);
        });
    }

    /// Insert only if `key` is absent. Returns whether the value was stored.
    pub fn insert_if_absent(&self, key: impl Into<String>, value: V) -> bool {
        let key = key.into();
        self.tx.send_if_modified(|map| {
            if map.contains_key(&key) {
                return false;
            }
            map.insert(key, value);
            true
        })
    }

    /// Mutate an existing value in place. Returns whether `key` existed.
    pub fn update(&self, key: &str, f: impl FnOnce(&mut V)) -> bool {
        self.tx.send_if_modified(|map| match map.get_mut(key) {
            Some(value) => {
                f(value);
                true
            }
            None => false,
        })
    }

    pub fn remove(&self, key: &str) -> bool {
        self.tx.send_if_modified(|map| map.remove(key).is_some())
    }

    pub fn clear(&self) {
        self.tx.send_if_modified(|map| {
            let changed = !map.is_empty();
            map.clear();
            changed
        });
    }
}

impl<V: Clone> MapStore<V> {
    pub fn get(&self, key: &str) -> Option<V> {
        self.tx.borrow().get(key).cloned()
    }

    pub fn values(&self) -> Vec<V> {
        self.tx.borrow().values().cloned().collect()
    }

    pub fn snapshot(&self) -> StoreMap<V> {
        self.tx.borrow().clone()
    }
}
