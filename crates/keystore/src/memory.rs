//! In-memory storage backend implementation.
//!
//! This module provides [`MemoryBackend`], an in-memory implementation of
//! [`ItemBackend`] suitable for testing and development.
//!
//! # Features
//!
//! - **Thread-safe**: Uses [`parking_lot::RwLock`] for concurrent access
//! - **Atomic conditions**: Every conditional mutation evaluates its predicate and applies the
//!   change under a single write lock
//! - **Projection**: Reads honour the requested attribute projection
//!
//! # Example
//!
//! ```
//! use keystore::{GetItem, Item, ItemBackend, MemoryBackend, PrimaryKey, PutItem, ReadConsistency};
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = MemoryBackend::new();
//!     let key = PrimaryKey::new("keyspace", "users", "key", "alice");
//!
//!     backend
//!         .put_item(PutItem {
//!             key: key.clone(),
//!             item: Item::new().with_string("value", "hello"),
//!             condition: Default::default(),
//!         })
//!         .await
//!         .unwrap();
//!
//!     let item = backend
//!         .get_item(GetItem { key, consistency: ReadConsistency::Strong, projection: None })
//!         .await
//!         .unwrap();
//!     assert_eq!(item.unwrap().string("value"), Some("hello"));
//! }
//! ```
//!
//! # Limitations
//!
//! - Data is not persisted; all data is lost when the process exits
//! - Both consistency modes observe the latest state

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use fail::fail_point;
use parking_lot::RwLock;

use crate::{
    backend::{DeleteItem, GetItem, ItemBackend, PutItem, ReturnValues, UpdateItem},
    error::{StorageError, StorageResult},
    types::{Item, PrimaryKey},
};

/// Storage slot: (partition value, sort value).
type Slot = (String, String);

fn slot(key: &PrimaryKey) -> Slot {
    (key.partition.value.clone(), key.sort.value.clone())
}

/// In-memory storage backend using [`BTreeMap`].
///
/// # Cloning
///
/// `MemoryBackend` is cheaply cloneable via [`Arc`]. All clones share the
/// same underlying data store.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    items: Arc<RwLock<BTreeMap<Slot, Item>>>,
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend").field("items", &self.len()).finish()
    }
}

impl MemoryBackend {
    /// Creates a new, empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored items across all partitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Returns `true` if no items are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

#[async_trait]
impl ItemBackend for MemoryBackend {
    async fn put_item(&self, request: PutItem) -> StorageResult<()> {
        fail_point!("memory-put-item", |_| {
            Err(StorageError::internal("injected failure in put_item"))
        });

        let PutItem { key, item, condition } = request;
        let slot = slot(&key);
        let mut items = self.items.write();

        if !condition.evaluate(items.get(&slot)) {
            return Err(StorageError::ConditionFailed);
        }

        items.insert(slot, key.apply_to(item));
        Ok(())
    }

    async fn update_item(&self, request: UpdateItem) -> StorageResult<Option<Item>> {
        fail_point!("memory-update-item", |_| {
            Err(StorageError::internal("injected failure in update_item"))
        });

        let UpdateItem { key, updates, condition, return_values } = request;
        let slot = slot(&key);
        let mut items = self.items.write();

        let existing = items.get(&slot);
        if !condition.evaluate(existing) {
            return Err(StorageError::ConditionFailed);
        }

        let old = existing.cloned();
        let mut updated = old.clone().unwrap_or_else(|| key.apply_to(Item::new()));
        for (name, value) in updates.iter() {
            updated.insert(name, value.clone());
        }
        items.insert(slot, updated);

        Ok(match return_values {
            ReturnValues::AllOld => old,
            ReturnValues::None => None,
        })
    }

    async fn delete_item(&self, request: DeleteItem) -> StorageResult<Option<Item>> {
        fail_point!("memory-delete-item", |_| {
            Err(StorageError::internal("injected failure in delete_item"))
        });

        let DeleteItem { key, condition, return_values } = request;
        let slot = slot(&key);
        let mut items = self.items.write();

        if !condition.evaluate(items.get(&slot)) {
            return Err(StorageError::ConditionFailed);
        }

        let removed = items.remove(&slot);
        Ok(match return_values {
            ReturnValues::AllOld => removed,
            ReturnValues::None => None,
        })
    }

    async fn get_item(&self, request: GetItem) -> StorageResult<Option<Item>> {
        fail_point!("memory-get-item", |_| {
            Err(StorageError::connection("injected failure in get_item"))
        });

        let items = self.items.read();
        let item = items.get(&slot(&request.key));

        Ok(match (item, &request.projection) {
            (None, _) => None,
            (Some(item), None) => Some(item.clone()),
            (Some(item), Some(names)) => Some(item.project(names)),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::backend::{Condition, ReadConsistency};

    fn pk(sort: &str) -> PrimaryKey {
        PrimaryKey::new("keyspace", "ks", "key", sort)
    }

    fn put(sort: &str, value: &str, condition: Condition) -> PutItem {
        PutItem {
            key: pk(sort),
            item: Item::new().with_string("value", value).with_number("version", 1),
            condition,
        }
    }

    fn get(sort: &str) -> GetItem {
        GetItem { key: pk(sort), consistency: ReadConsistency::Strong, projection: None }
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let backend = MemoryBackend::new();
        backend.put_item(put("a", "1", Condition::None)).await.unwrap();

        let item = backend.get_item(get("a")).await.unwrap().unwrap();
        assert_eq!(item.string("keyspace"), Some("ks"));
        assert_eq!(item.string("key"), Some("a"));
        assert_eq!(item.string("value"), Some("1"));
        assert_eq!(item.number("version"), Some(1));
    }

    #[tokio::test]
    async fn test_put_replaces_whole_item() {
        let backend = MemoryBackend::new();
        backend
            .put_item(PutItem {
                key: pk("a"),
                item: Item::new().with_string("extra", "x").with_string("value", "1"),
                condition: Condition::None,
            })
            .await
            .unwrap();
        backend.put_item(put("a", "2", Condition::None)).await.unwrap();

        let item = backend.get_item(get("a")).await.unwrap().unwrap();
        assert!(!item.contains("extra"));
        assert_eq!(item.string("value"), Some("2"));
    }

    #[tokio::test]
    async fn test_conditional_put_conflict_leaves_item() {
        let backend = MemoryBackend::new();
        backend.put_item(put("a", "1", Condition::None)).await.unwrap();

        let result =
            backend.put_item(put("a", "2", Condition::AttributeNotExists("key".into()))).await;
        assert!(matches!(result, Err(StorageError::ConditionFailed)));

        let item = backend.get_item(get("a")).await.unwrap().unwrap();
        assert_eq!(item.string("value"), Some("1"));
    }

    #[tokio::test]
    async fn test_update_merges_and_returns_old() {
        let backend = MemoryBackend::new();
        backend
            .put_item(PutItem {
                key: pk("a"),
                item: Item::new().with_string("extra", "x").with_string("value", "1"),
                condition: Condition::None,
            })
            .await
            .unwrap();

        let old = backend
            .update_item(UpdateItem {
                key: pk("a"),
                updates: Item::new().with_string("value", "2"),
                condition: Condition::AttributeExists("key".into()),
                return_values: ReturnValues::AllOld,
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(old.string("value"), Some("1"));

        let item = backend.get_item(get("a")).await.unwrap().unwrap();
        assert_eq!(item.string("extra"), Some("x"));
        assert_eq!(item.string("value"), Some("2"));
    }

    #[tokio::test]
    async fn test_unconditional_update_creates_item() {
        let backend = MemoryBackend::new();
        let old = backend
            .update_item(UpdateItem {
                key: pk("new"),
                updates: Item::new().with_string("value", "v"),
                condition: Condition::None,
                return_values: ReturnValues::AllOld,
            })
            .await
            .unwrap();
        assert!(old.is_none());

        let item = backend.get_item(get("new")).await.unwrap().unwrap();
        assert_eq!(item.string("key"), Some("new"));
        assert_eq!(item.string("value"), Some("v"));
    }

    #[tokio::test]
    async fn test_update_without_return_values_returns_none() {
        let backend = MemoryBackend::new();
        backend.put_item(put("a", "1", Condition::None)).await.unwrap();

        let old = backend
            .update_item(UpdateItem {
                key: pk("a"),
                updates: Item::new().with_string("value", "2"),
                condition: Condition::None,
                return_values: ReturnValues::None,
            })
            .await
            .unwrap();
        assert!(old.is_none());
    }

    #[tokio::test]
    async fn test_delete_returns_removed_item() {
        let backend = MemoryBackend::new();
        backend.put_item(put("a", "1", Condition::None)).await.unwrap();

        let removed = backend
            .delete_item(DeleteItem {
                key: pk("a"),
                condition: Condition::None,
                return_values: ReturnValues::AllOld,
            })
            .await
            .unwrap();
        assert_eq!(removed.and_then(|i| i.string("value").map(str::to_owned)), Some("1".into()));
        assert!(backend.is_empty());

        let again = backend
            .delete_item(DeleteItem {
                key: pk("a"),
                condition: Condition::None,
                return_values: ReturnValues::AllOld,
            })
            .await
            .unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn test_conditional_delete_conflict() {
        let backend = MemoryBackend::new();
        backend.put_item(put("a", "1", Condition::None)).await.unwrap();

        let result = backend
            .delete_item(DeleteItem {
                key: pk("a"),
                condition: Condition::NumberEquals { attribute: "version".into(), value: 2 },
                return_values: ReturnValues::AllOld,
            })
            .await;
        assert!(matches!(result, Err(StorageError::ConditionFailed)));
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn test_projection() {
        let backend = MemoryBackend::new();
        backend.put_item(put("a", "1", Condition::None)).await.unwrap();

        let item = backend
            .get_item(GetItem {
                key: pk("a"),
                consistency: ReadConsistency::Eventual,
                projection: Some(vec!["key".into()]),
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.len(), 1);
        assert_eq!(item.string("key"), Some("a"));
    }

    #[tokio::test]
    async fn test_partitions_are_isolated() {
        let backend = MemoryBackend::new();
        backend.put_item(put("a", "1", Condition::None)).await.unwrap();

        let other = GetItem {
            key: PrimaryKey::new("keyspace", "other", "key", "a"),
            consistency: ReadConsistency::Strong,
            projection: None,
        };
        assert!(backend.get_item(other).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clone_shares_data() {
        let backend1 = MemoryBackend::new();
        let backend2 = backend1.clone();

        backend1.put_item(put("a", "1", Condition::None)).await.unwrap();
        assert!(backend2.get_item(get("a")).await.unwrap().is_some());
    }

    #[test]
    fn test_debug_reports_item_count() {
        let backend = MemoryBackend::new();
        assert_eq!(format!("{backend:?}"), "MemoryBackend { items: 0 }");
    }
}
