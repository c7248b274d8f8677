use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Keyed record storage used by the library service.
pub trait RecordStore<V>: Send + Sync {
    fn get(&self, id: &str) -> Option<V>;

    fn list(&self) -> Vec<V>;

    /// Inserts the record only if `id` is free. Returns `false` when taken.
    fn put(&self, id: &str, record: V) -> bool;

    fn delete(&self, id: &str) -> Option<V>;
}

/// Process-local store; contents are lost on restart.
#[derive(Debug)]
pub struct MemoryStore<V> {
    records: Arc<Mutex<BTreeMap<String, V>>>,
}

impl<V> MemoryStore<V> {
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    fn records(&self) -> MutexGuard<'_, BTreeMap<String, V>> {
        // Every critical section is a single map operation, so a poisoned
        // guard still holds a consistent map.
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<V> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for MemoryStore<V> {
    fn clone(&self) -> Self {
        Self {
            records: self.records.clone(),
        }
    }
}

impl<V> RecordStore<V> for MemoryStore<V>
where
    V: Clone + Send,
{
    fn get(&self, id: &str) -> Option<V> {
        self.records().get(id).cloned()
    }

    fn list(&self) -> Vec<V> {
        self.records().values().cloned().collect()
    }

    fn put(&self, id: &str, record: V) -> bool {
        let mut records = self.records();
        if records.contains_key(id) {
            return false;
        }
        records.insert(id.to_string(), record);
        true
    }

    fn delete(&self, id: &str) -> Option<V> {
        self.records().remove(id)
    }
}
