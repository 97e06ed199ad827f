// # Memory State Store
//
// In-memory implementation of StateStore.
//
// ## Crash Behavior
//
// - All records are lost when the process exits
// - The next apply treats every resource as unmanaged and creates it again
//
// ## When to Use
//
// - Tests
// - One-shot `read` of a data source, which never persists anything

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::state_store::{StateRecord, StateStore};

/// In-memory state store implementation
///
/// # Example
///
/// ```rust,no_run
/// use vmaas_core::state::MemoryStateStore;
/// use vmaas_core::traits::state_store::StateStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryStateStore::new();
///     assert!(store.get_record("instance.web-1").await?.is_none());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<RwLock<HashMap<String, StateRecord>>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of records in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get_record(&self, key: &str) -> Result<Option<StateRecord>, Error> {
        Ok(self.inner.read().await.get(key).cloned())
    }

    async fn set_record(&self, key: &str, record: &StateRecord) -> Result<(), Error> {
        self.inner
            .write()
            .await
            .insert(key.to_string(), record.clone());
        Ok(())
    }

    async fn delete_record(&self, key: &str) -> Result<(), Error> {
        self.inner.write().await.remove(key);
        Ok(())
    }

    async fn list_records(&self) -> Result<Vec<String>, Error> {
        let mut keys: Vec<String> = self.inner.read().await.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    async fn flush(&self) -> Result<(), Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: i64) -> StateRecord {
        StateRecord::new(
            "instance",
            Some(id),
            json!({ "name": "web-1" }),
            json!({ "name": "web-1", "status": "running" }),
        )
    }

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryStateStore::new();
        assert!(store.is_empty().await);

        store.set_record("instance.web-1", &record(42)).await.unwrap();
        assert_eq!(store.len().await, 1);

        let stored = store.get_record("instance.web-1").await.unwrap().unwrap();
        assert_eq!(stored.id, Some(42));
        assert_eq!(stored.observed["status"], "running");

        store.delete_record("instance.web-1").await.unwrap();
        assert!(store.is_empty().await);

        // Deleting again is not an error
        store.delete_record("instance.web-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_store_list_is_sorted() {
        let store = MemoryStateStore::new();
        store.set_record("instance.b", &record(2)).await.unwrap();
        store.set_record("instance.a", &record(1)).await.unwrap();

        let keys = store.list_records().await.unwrap();
        assert_eq!(keys, vec!["instance.a".to_string(), "instance.b".to_string()]);
    }
}
