//! Conformance test suite for [`ItemBackend`] implementations.
//!
//! This module provides async test functions that validate whether an
//! [`ItemBackend`] implementation satisfies the trait contract a
//! [`Keyspace`](crate::Keyspace) relies on. Every backend (in-memory or
//! backed by a real table) can run the same suite.
//!
//! # Usage
//!
//! Enable the `testutil` feature and call each conformance function with
//! a fresh backend instance:
//!
//! ```no_run
//! use keystore::conformance;
//! use keystore::MemoryBackend;
//!
//! #[tokio::test]
//! async fn get_missing_returns_none() {
//!     conformance::get_missing_returns_none(&MemoryBackend::new()).await;
//! }
//! ```
//!
//! # Test Categories
//!
//! | Category | Functions | Contract aspect |
//! |----------|-----------|-----------------|
//! | Put | 4 tests | Whole-item writes and the absent/present predicates |
//! | Update | 5 tests | Upsert, merge, version predicate, prior-item return |
//! | Delete | 4 tests | Removed-item return and version predicate |
//! | Get | 4 tests | Missing items, projection, consistency modes, partition isolation |
//! | Concurrent | 3 tests | Atomicity of conditional mutations under contention |
//!
//! Every function uses its own keys, so the whole suite can share one
//! backend (see [`run_all`]).

use std::sync::Arc;

use tokio::task::JoinSet;

use crate::{
    assert_condition_failed,
    backend::{
        Condition, DeleteItem, GetItem, ItemBackend, PutItem, ReadConsistency, ReturnValues,
        UpdateItem,
    },
    error::StorageError,
    types::{Item, PrimaryKey},
};

const PARTITION: &str = "conformance";

fn pk(key: &str) -> PrimaryKey {
    PrimaryKey::new("keyspace", PARTITION, "key", key)
}

fn record(value: &str, version: i64) -> Item {
    Item::new().with_string("value", value).with_number("version", version)
}

fn put(key: &str, value: &str, version: i64, condition: Condition) -> PutItem {
    PutItem { key: pk(key), item: record(value, version), condition }
}

fn update(key: &str, value: &str, version: i64, condition: Condition) -> UpdateItem {
    UpdateItem {
        key: pk(key),
        updates: record(value, version),
        condition,
        return_values: ReturnValues::AllOld,
    }
}

fn delete(key: &str, condition: Condition) -> DeleteItem {
    DeleteItem { key: pk(key), condition, return_values: ReturnValues::AllOld }
}

fn get(key: &str) -> GetItem {
    GetItem { key: pk(key), consistency: ReadConsistency::Strong, projection: None }
}

fn version_equals(value: i64) -> Condition {
    Condition::NumberEquals { attribute: "version".into(), value }
}

async fn read<B: ItemBackend + ?Sized>(backend: &B, key: &str) -> Option<Item> {
    backend.get_item(get(key)).await.expect("get_item should succeed")
}

// ============================================================================
// Put: whole-item writes (4 tests)
// ============================================================================

/// An unconditional put stores the item together with both key attributes.
pub async fn put_then_get_returns_item<B: ItemBackend + ?Sized>(backend: &B) {
    backend.put_item(put("put:1", "v1", 1, Condition::None)).await.expect("put");

    let item = read(backend, "put:1").await.expect("item should exist");
    assert_eq!(PrimaryKey::from_item(&item, "keyspace", "key"), Some(pk("put:1")));
    assert_eq!(item.string("value"), Some("v1"));
    assert_eq!(item.number("version"), Some(1));
}

/// An unconditional put overwrites an existing item.
pub async fn put_overwrites_existing<B: ItemBackend + ?Sized>(backend: &B) {
    backend.put_item(put("put:2", "old", 1, Condition::None)).await.expect("first put");
    backend.put_item(put("put:2", "new", 2, Condition::None)).await.expect("second put");

    let item = read(backend, "put:2").await.expect("item should exist");
    assert_eq!(item.string("value"), Some("new"));
    assert_eq!(item.number("version"), Some(2));
}

/// `AttributeNotExists` on the key attribute succeeds for a new item only.
pub async fn put_if_absent_rejects_existing<B: ItemBackend + ?Sized>(backend: &B) {
    let absent = || Condition::AttributeNotExists("key".into());

    backend.put_item(put("put:3", "first", 1, absent())).await.expect("first put");
    let result = backend.put_item(put("put:3", "second", 2, absent())).await;
    assert_condition_failed!(result, "second conditional put");

    let item = read(backend, "put:3").await.expect("item should exist");
    assert_eq!(item.string("value"), Some("first"), "rejected put must not modify the item");
}

/// `AttributeExists` on a missing item fails without creating it.
pub async fn put_if_present_rejects_missing<B: ItemBackend + ?Sized>(backend: &B) {
    let result =
        backend.put_item(put("put:4", "v", 1, Condition::AttributeExists("key".into()))).await;
    assert_condition_failed!(result);
    assert!(read(backend, "put:4").await.is_none(), "rejected put must not create the item");
}

// ============================================================================
// Update: conditional attribute updates (5 tests)
// ============================================================================

/// An unconditional update of a missing item creates it and reports no prior item.
pub async fn update_missing_creates_item<B: ItemBackend + ?Sized>(backend: &B) {
    let prior = backend.update_item(update("upd:1", "v", 1, Condition::None)).await.expect("update");
    assert!(prior.is_none(), "no prior item expected, got {prior:?}");

    let item = read(backend, "upd:1").await.expect("item should exist");
    assert_eq!(
        PrimaryKey::from_item(&item, "keyspace", "key"),
        Some(pk("upd:1")),
        "an upserted item carries both key attributes"
    );
    assert_eq!(item.string("value"), Some("v"));
}

/// An update returns the complete prior item when asked.
pub async fn update_returns_all_old<B: ItemBackend + ?Sized>(backend: &B) {
    backend.put_item(put("upd:2", "old", 1, Condition::None)).await.expect("put");

    let prior = backend
        .update_item(update("upd:2", "new", 2, Condition::AttributeExists("key".into())))
        .await
        .expect("update")
        .expect("prior item should be returned");
    assert_eq!(prior.string("value"), Some("old"));
    assert_eq!(prior.number("version"), Some(1));
    assert_eq!(prior.string("key"), Some("upd:2"));

    let item = read(backend, "upd:2").await.expect("item should exist");
    assert_eq!(item.string("value"), Some("new"));
}

/// An update without `AllOld` returns nothing.
pub async fn update_without_return_values_returns_none<B: ItemBackend + ?Sized>(backend: &B) {
    backend.put_item(put("upd:3", "old", 1, Condition::None)).await.expect("put");

    let mut request = update("upd:3", "new", 2, Condition::None);
    request.return_values = ReturnValues::None;
    let prior = backend.update_item(request).await.expect("update");
    assert!(prior.is_none(), "nothing should be returned, got {prior:?}");
}

/// A version predicate succeeds on a match and fails on a mismatch.
pub async fn update_version_predicate<B: ItemBackend + ?Sized>(backend: &B) {
    backend.put_item(put("upd:4", "v1", 10, Condition::None)).await.expect("put");

    let stale = backend.update_item(update("upd:4", "v2", 20, version_equals(11))).await;
    assert_condition_failed!(stale, "stale version");
    assert_eq!(read(backend, "upd:4").await.and_then(|i| i.number("version")), Some(10));

    backend.update_item(update("upd:4", "v2", 20, version_equals(10))).await.expect("cas");
    assert_eq!(read(backend, "upd:4").await.and_then(|i| i.number("version")), Some(20));
}

/// A version predicate on a missing item fails without creating it.
pub async fn update_version_predicate_on_missing<B: ItemBackend + ?Sized>(backend: &B) {
    let result = backend.update_item(update("upd:5", "v", 1, version_equals(0))).await;
    assert_condition_failed!(result);
    assert!(read(backend, "upd:5").await.is_none());
}

// ============================================================================
// Delete: conditional removal (4 tests)
// ============================================================================

/// Deleting returns the removed item, and a second delete returns nothing.
pub async fn delete_returns_removed_item<B: ItemBackend + ?Sized>(backend: &B) {
    backend.put_item(put("del:1", "v", 1, Condition::None)).await.expect("put");

    let removed = backend.delete_item(delete("del:1", Condition::None)).await.expect("delete");
    assert_eq!(removed.as_ref().and_then(|i| i.string("value")), Some("v"));
    assert!(read(backend, "del:1").await.is_none());

    let again = backend.delete_item(delete("del:1", Condition::None)).await.expect("delete");
    assert!(again.is_none(), "second delete should report nothing removed");
}

/// Deleting a missing item is not an error.
pub async fn delete_missing_is_noop<B: ItemBackend + ?Sized>(backend: &B) {
    let removed = backend.delete_item(delete("del:2", Condition::None)).await.expect("delete");
    assert!(removed.is_none());
}

/// A version-conditioned delete with a stale version leaves the item.
pub async fn delete_version_mismatch_keeps_item<B: ItemBackend + ?Sized>(backend: &B) {
    backend.put_item(put("del:3", "v", 5, Condition::None)).await.expect("put");

    let result = backend.delete_item(delete("del:3", version_equals(6))).await;
    assert_condition_failed!(result);
    assert!(read(backend, "del:3").await.is_some(), "item should survive a failed delete");

    let removed = backend.delete_item(delete("del:3", version_equals(5))).await.expect("delete");
    assert!(removed.is_some());
}

/// A version-conditioned delete of a missing item fails.
pub async fn delete_version_predicate_on_missing<B: ItemBackend + ?Sized>(backend: &B) {
    let result = backend.delete_item(delete("del:4", version_equals(0))).await;
    assert_condition_failed!(result);
}

// ============================================================================
// Get: point reads (4 tests)
// ============================================================================

/// Reading a missing item returns `Ok(None)`.
pub async fn get_missing_returns_none<B: ItemBackend + ?Sized>(backend: &B) {
    let result = backend.get_item(get("get:missing")).await;
    assert!(result.is_ok(), "get should not error on missing item: {result:?}");
    assert!(result.expect("checked above").is_none());
}

/// A projection returns only the named attributes.
pub async fn get_projection_limits_attributes<B: ItemBackend + ?Sized>(backend: &B) {
    backend.put_item(put("get:1", "v", 1, Condition::None)).await.expect("put");

    let item = backend
        .get_item(GetItem { projection: Some(vec!["key".into()]), ..get("get:1") })
        .await
        .expect("get")
        .expect("item should exist");
    assert_eq!(item.string("key"), Some("get:1"));
    assert!(!item.contains("value"), "projection leaked value: {item:?}");
    assert!(!item.contains("version"), "projection leaked version: {item:?}");
}

/// An eventually consistent read of a settled item returns it.
pub async fn get_eventual_consistency_reads_item<B: ItemBackend + ?Sized>(backend: &B) {
    backend.put_item(put("get:2", "v", 1, Condition::None)).await.expect("put");

    let item = backend
        .get_item(GetItem { consistency: ReadConsistency::Eventual, ..get("get:2") })
        .await
        .expect("get");
    assert_eq!(item.as_ref().and_then(|i| i.string("value")), Some("v"));
}

/// Equal sort keys in different partitions are different items.
pub async fn get_partitions_are_isolated<B: ItemBackend + ?Sized>(backend: &B) {
    backend.put_item(put("get:3", "here", 1, Condition::None)).await.expect("put");

    let elsewhere = GetItem {
        key: PrimaryKey::new("keyspace", "conformance-other", "key", "get:3"),
        consistency: ReadConsistency::Strong,
        projection: None,
    };
    let item = backend.get_item(elsewhere).await.expect("get");
    assert!(item.is_none(), "item leaked across partitions: {item:?}");
}

// ============================================================================
// Concurrent: atomicity under contention (3 tests)
// ============================================================================

/// Concurrent puts-if-absent on one key: exactly one writer wins.
///
/// Requires `B: 'static` so the backend can be shared across spawned tasks
/// via `Arc`.
pub async fn concurrent_put_if_absent_one_winner<B: ItemBackend + 'static>(backend: Arc<B>) {
    let mut tasks = JoinSet::new();
    for i in 0..16 {
        let backend = Arc::clone(&backend);
        tasks.spawn(async move {
            let condition = Condition::AttributeNotExists("key".into());
            backend.put_item(put("conc:add", &format!("writer-{i}"), i, condition)).await
        });
    }

    let (mut wins, mut conflicts) = (0, 0);
    while let Some(joined) = tasks.join_next().await {
        match joined.expect("task join") {
            Ok(()) => wins += 1,
            Err(StorageError::ConditionFailed) => conflicts += 1,
            Err(e) => panic!("unexpected error: {e:?}"),
        }
    }
    assert_eq!(wins, 1, "exactly one add should win");
    assert_eq!(conflicts, 15);
}

/// Concurrent version-conditioned updates from one version: exactly one wins.
pub async fn concurrent_version_update_one_winner<B: ItemBackend + 'static>(backend: Arc<B>) {
    backend.put_item(put("conc:cas", "v0", 0, Condition::None)).await.expect("put");

    let mut tasks = JoinSet::new();
    for i in 1..=16 {
        let backend = Arc::clone(&backend);
        tasks.spawn(async move {
            backend.update_item(update("conc:cas", &format!("v{i}"), i, version_equals(0))).await
        });
    }

    let mut wins = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined.expect("task join") {
            Ok(_) => wins += 1,
            Err(StorageError::ConditionFailed) => {},
            Err(e) => panic!("unexpected error: {e:?}"),
        }
    }
    assert_eq!(wins, 1, "exactly one compare-and-swap should win");

    let version = read(backend.as_ref(), "conc:cas").await.and_then(|i| i.number("version"));
    assert!(matches!(version, Some(1..=16)), "winner's version should be stored: {version:?}");
}

/// Concurrent deletes of one item: exactly one reports the removed item.
pub async fn concurrent_delete_one_remover<B: ItemBackend + 'static>(backend: Arc<B>) {
    backend.put_item(put("conc:del", "v", 1, Condition::None)).await.expect("put");

    let mut tasks = JoinSet::new();
    for _ in 0..16 {
        let backend = Arc::clone(&backend);
        tasks.spawn(async move { backend.delete_item(delete("conc:del", Condition::None)).await });
    }

    let mut removed = 0;
    while let Some(joined) = tasks.join_next().await {
        if joined.expect("task join").expect("delete").is_some() {
            removed += 1;
        }
    }
    assert_eq!(removed, 1, "exactly one delete should observe the item");
}

/// Run the entire conformance suite against a single backend instance.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use keystore::{MemoryBackend, conformance};
///
/// #[tokio::test]
/// async fn full_conformance() {
///     conformance::run_all(Arc::new(MemoryBackend::new())).await;
/// }
/// ```
pub async fn run_all<B: ItemBackend + 'static>(backend: Arc<B>) {
    // Put
    put_then_get_returns_item(backend.as_ref()).await;
    put_overwrites_existing(backend.as_ref()).await;
    put_if_absent_rejects_existing(backend.as_ref()).await;
    put_if_present_rejects_missing(backend.as_ref()).await;

    // Update
    update_missing_creates_item(backend.as_ref()).await;
    update_returns_all_old(backend.as_ref()).await;
    update_without_return_values_returns_none(backend.as_ref()).await;
    update_version_predicate(backend.as_ref()).await;
    update_version_predicate_on_missing(backend.as_ref()).await;

    // Delete
    delete_returns_removed_item(backend.as_ref()).await;
    delete_missing_is_noop(backend.as_ref()).await;
    delete_version_mismatch_keeps_item(backend.as_ref()).await;
    delete_version_predicate_on_missing(backend.as_ref()).await;

    // Get
    get_missing_returns_none(backend.as_ref()).await;
    get_projection_limits_attributes(backend.as_ref()).await;
    get_eventual_consistency_reads_item(backend.as_ref()).await;
    get_partitions_are_isolated(backend.as_ref()).await;

    // Concurrent
    concurrent_put_if_absent_one_winner(Arc::clone(&backend)).await;
    concurrent_version_update_one_winner(Arc::clone(&backend)).await;
    concurrent_delete_one_remover(backend).await;
}
