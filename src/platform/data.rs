//! Data facet: namespaced key-value stores
//!
//! Values are JSON documents. Each store is an independent namespace;
//! operations on different stores never wait on each other.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};

use crate::error::{TrustError, TrustResult};

/// Namespaced key-value storage
#[async_trait]
pub trait Data: Send + Sync {
    /// Read one entry
    async fn get(&self, store: &str, key: &str) -> TrustResult<Option<Value>>;

    /// Write one entry; the store must exist
    async fn set(&self, store: &str, key: &str, value: Value) -> TrustResult<()>;

    /// List the keys of a store
    async fn keys(&self, store: &str) -> TrustResult<Vec<String>>;

    /// Create a store seeded from the entries of `init` (a JSON object)
    ///
    /// Returns `false` when the store already exists; it is left untouched.
    async fn create_store(&self, store: &str, init: Value) -> TrustResult<bool>;

    /// Delete a store and everything in it; `false` if it did not exist
    async fn delete_store(&self, store: &str) -> TrustResult<bool>;

    /// Remove one entry; `false` if it did not exist
    async fn drop_key(&self, store: &str, key: &str) -> TrustResult<bool>;
}

type Store = Arc<Mutex<BTreeMap<String, Value>>>;

/// In-process [`Data`] facet
///
/// The registry lock is held only long enough to find a store; each store
/// then has its own mutex.
#[derive(Default)]
pub struct MemoryData {
    stores: RwLock<HashMap<String, Store>>,
}

impl MemoryData {
    /// Create an empty data facet
    pub fn new() -> Self {
        Self::default()
    }

    async fn store(&self, name: &str) -> TrustResult<Store> {
        self.stores
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| TrustError::Storage(format!("unknown store `{name}`")))
    }
}

#[async_trait]
impl Data for MemoryData {
    async fn get(&self, store: &str, key: &str) -> TrustResult<Option<Value>> {
        let store = self.store(store).await?;
        let entries = store.lock().await;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, store: &str, key: &str, value: Value) -> TrustResult<()> {
        let store = self.store(store).await?;
        store.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn keys(&self, store: &str) -> TrustResult<Vec<String>> {
        let store = self.store(store).await?;
        let entries = store.lock().await;
        Ok(entries.keys().cloned().collect())
    }

    async fn create_store(&self, store: &str, init: Value) -> TrustResult<bool> {
        let entries = match init {
            Value::Object(map) => map.into_iter().collect::<BTreeMap<_, _>>(),
            Value::Null => BTreeMap::new(),
            other => {
                return Err(TrustError::Storage(format!(
                    "store `{store}` must be initialized from an object, got {other}"
                )))
            }
        };

        let mut stores = self.stores.write().await;
        if stores.contains_key(store) {
            return Ok(false);
        }
        stores.insert(store.to_string(), Arc::new(Mutex::new(entries)));
        Ok(true)
    }

    async fn delete_store(&self, store: &str) -> TrustResult<bool> {
        Ok(self.stores.write().await.remove(store).is_some())
    }

    async fn drop_key(&self, store: &str, key: &str) -> TrustResult<bool> {
        let store = self.store(store).await?;
        let removed = store.lock().await.remove(key).is_some();
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_store_lifecycle() {
        let data = MemoryData::new();

        assert!(data
            .create_store("settings", json!({"a": 1}))
            .await
            .unwrap());
        assert!(!data.create_store("settings", json!({})).await.unwrap());

        assert_eq!(data.get("settings", "a").await.unwrap(), Some(json!(1)));
        data.set("settings", "b", json!("two")).await.unwrap();
        assert_eq!(data.keys("settings").await.unwrap(), vec!["a", "b"]);

        assert!(data.drop_key("settings", "a").await.unwrap());
        assert!(!data.drop_key("settings", "a").await.unwrap());
        assert_eq!(data.get("settings", "a").await.unwrap(), None);

        assert!(data.delete_store("settings").await.unwrap());
        assert!(!data.delete_store("settings").await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_store_is_error() {
        let data = MemoryData::new();
        assert!(matches!(
            data.set("missing", "k", json!(null)).await,
            Err(TrustError::Storage(_))
        ));
        assert!(data.get("missing", "k").await.is_err());
    }

    #[tokio::test]
    async fn test_init_must_be_object() {
        let data = MemoryData::new();
        assert!(data.create_store("bad", json!([1, 2])).await.is_err());
        assert!(data.create_store("empty", Value::Null).await.unwrap());
    }

    #[tokio::test]
    async fn test_distinct_stores_do_not_block() {
        let data = Arc::new(MemoryData::new());
        data.create_store("one", json!({})).await.unwrap();
        data.create_store("two", json!({})).await.unwrap();

        // Hold store "one" while writing to "two"
        let held = data.store("one").await.unwrap();
        let _guard = held.lock().await;

        tokio::time::timeout(
            std::time::Duration::from_millis(200),
            data.set("two", "k", json!(true)),
        )
        .await
        .expect("store two should not wait on store one")
        .unwrap();
    }
}
