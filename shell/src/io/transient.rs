//! Tick-scoped scratch store handed to the module.
//!
//! The store is replaced with a fresh empty instance before every periodic
//! invocation and emptied again once the invocation returns. It is never
//! persisted and has no relation to the host's durable
//! raw store, which the module reconstructs its view from on its own.

use std::collections::HashMap;

use serde_json::Value;
use tracing::trace;

/// Mapping from string keys to arbitrary values, valid for one invocation.
#[derive(Debug, Default, PartialEq)]
pub struct TransientStore {
    generation: u64,
    entries: HashMap<String, Value>,
}

impl TransientStore {
    fn fresh(generation: u64) -> Self {
        Self {
            generation,
            entries: HashMap::new(),
        }
    }

    /// Identity of this instance. Strictly increases across resets.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.entries.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Owns the current transient store and swaps it out between invocations.
#[derive(Debug, Default)]
pub struct TransientBridge {
    current: TransientStore,
}

impl TransientBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard the current store and install a new empty one.
    pub fn reset_transient_store(&mut self) -> &mut TransientStore {
        let generation = self.current.generation + 1;
        trace!(
            generation,
            discarded = self.current.len(),
            "resetting transient store"
        );
        self.current = TransientStore::fresh(generation);
        &mut self.current
    }

    /// Drop everything written during the invocation that just ended.
    ///
    /// The generation is kept; only [`reset_transient_store`](Self::reset_transient_store)
    /// hands out a new identity.
    pub fn discard(&mut self) {
        if !self.current.is_empty() {
            trace!(
                generation = self.current.generation,
                discarded = self.current.len(),
                "discarding transient store at tick end"
            );
        }
        self.current.entries.clear();
    }

    pub fn current(&self) -> &TransientStore {
        &self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reset_drops_entries_and_bumps_generation() {
        let mut bridge = TransientBridge::new();
        let store = bridge.reset_transient_store();
        store.insert("creeps", json!({"harvester": 3}));
        let first = store.generation();

        let store = bridge.reset_transient_store();
        assert!(store.is_empty());
        assert!(!store.contains_key("creeps"));
        assert!(store.generation() > first);
    }

    #[test]
    fn discard_empties_without_new_generation() {
        let mut bridge = TransientBridge::new();
        let store = bridge.reset_transient_store();
        store.insert("path", json!([1, 2]));
        let generation = store.generation();

        bridge.discard();

        assert!(bridge.current().is_empty());
        assert_eq!(bridge.current().generation(), generation);
        assert!(bridge.reset_transient_store().generation() > generation);
    }

    #[test]
    fn store_tracks_inserted_values() {
        let mut bridge = TransientBridge::new();
        let store = bridge.reset_transient_store();
        assert_eq!(store.insert("a", json!(1)), None);
        assert_eq!(store.insert("a", json!(2)), Some(json!(1)));
        assert_eq!(store.get("a"), Some(&json!(2)));
        assert_eq!(store.remove("a"), Some(json!(2)));
        assert_eq!(store.len(), 0);
    }
}
