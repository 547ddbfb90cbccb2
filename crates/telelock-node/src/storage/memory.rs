//! Shared in-memory store.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use super::{Namespace, Store, StoreError};

/// In-memory store for tests and simulation
///
/// All state is wrapped in Arc<Mutex<>> so clones share one store, the way
/// every component of a node shares one flash. Uses `lock().expect()`, which
/// panics if the mutex is poisoned; acceptable for test code.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<HashMap<Namespace, HashMap<String, Vec<u8>>>>>,
}

impl MemoryStore {
    /// Create a new empty `MemoryStore`
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of values in a namespace.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn len(&self, namespace: Namespace) -> usize {
        self.inner.lock().expect("Mutex poisoned").get(&namespace).map_or(0, HashMap::len)
    }

    /// Whether a namespace holds no values.
    pub fn is_empty(&self, namespace: Namespace) -> bool {
        self.len(namespace) == 0
    }
}

impl Store for MemoryStore {
    #[allow(clippy::expect_used)]
    fn get(&self, namespace: Namespace, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        Ok(inner.get(&namespace).and_then(|values| values.get(key)).cloned())
    }

    #[allow(clippy::expect_used)]
    fn put_batch(&self, namespace: Namespace, entries: &[(&str, &[u8])]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        let values = inner.entry(namespace).or_default();

        for (key, value) in entries {
            values.insert((*key).to_string(), value.to_vec());
        }

        Ok(())
    }

    #[allow(clippy::expect_used)]
    fn clear(&self, namespaces: &[Namespace]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        for namespace in namespaces {
            inner.remove(namespace);
        }
        Ok(())
    }
}
