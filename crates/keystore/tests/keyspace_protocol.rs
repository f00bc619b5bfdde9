//! Behavioural tests for the versioned-write protocol of `Keyspace`.
//!
//! Covers the outcome of every operation on present and absent keys, the
//! compare-and-swap walkthrough, argument validation, and property tests over
//! arbitrary keys and values.

#![allow(clippy::expect_used, clippy::panic, clippy::unwrap_used)]

use async_trait::async_trait;
use keystore::{
    DeleteItem, GetItem, Item, ItemBackend, Keystore, KeystoreConfig, MemoryBackend, PutItem,
    ReadConsistency, SizeLimits, StorageResult, TableSchema, UpdateItem, Version,
    assert_invalid_argument,
    testutil::{make_key, make_value, memory_keyspace},
};
use proptest::prelude::*;
use rstest::rstest;

// ---------------------------------------------------------------------------
// add
// ---------------------------------------------------------------------------

#[tokio::test]
async fn add_succeeds_once_per_key() {
    let ks = memory_keyspace("ks");

    assert!(ks.add("k", "first").await.unwrap());
    assert!(!ks.add("k", "second").await.unwrap());
    assert_eq!(ks.get("k").await.unwrap().as_deref(), Some("first"));
}

#[tokio::test]
async fn add_after_delete_succeeds_again() {
    let ks = memory_keyspace("ks");

    assert!(ks.add("k", "a").await.unwrap());
    assert!(ks.delete("k").await.unwrap());
    assert!(ks.add("k", "b").await.unwrap());
    assert_eq!(ks.get("k").await.unwrap().as_deref(), Some("b"));
}

// ---------------------------------------------------------------------------
// set
// ---------------------------------------------------------------------------

#[tokio::test]
async fn set_overwrites_value_and_version() {
    let ks = memory_keyspace("ks");

    assert!(ks.set("k", "a").await.unwrap());
    assert!(ks.set("k", "b").await.unwrap());

    let entry = ks.gets("k").await.unwrap().expect("entry");
    assert_eq!(entry.value(), "b");
    assert_eq!(entry.version(), Version::of("b"));
}

#[tokio::test]
async fn empty_value_is_allowed() {
    let ks = memory_keyspace("ks");

    assert!(ks.set("k", "").await.unwrap());
    let entry = ks.gets("k").await.unwrap().expect("entry");
    assert_eq!(entry.value(), "");
    assert_eq!(entry.version(), Version(0));
}

// ---------------------------------------------------------------------------
// check_and_set
// ---------------------------------------------------------------------------

#[tokio::test]
async fn check_and_set_requires_matching_version() {
    let ks = memory_keyspace("ks");
    ks.set("k", "v1").await.unwrap();

    assert!(!ks.check_and_set("k", "v2", Version::of("other")).await.unwrap());
    assert_eq!(ks.get("k").await.unwrap().as_deref(), Some("v1"));

    assert!(ks.check_and_set("k", "v2", Version::of("v1")).await.unwrap());
    let entry = ks.gets("k").await.unwrap().expect("entry");
    assert_eq!(entry.value(), "v2");
    assert_eq!(entry.version(), Version::of("v2"));
}

#[tokio::test]
async fn check_and_set_on_missing_key_fails_without_creating() {
    let ks = memory_keyspace("ks");

    assert!(!ks.check_and_set("k", "v", Version::of("")).await.unwrap());
    assert!(!ks.exists("k").await.unwrap());
}

#[tokio::test]
async fn check_and_set_with_version_from_gets() {
    let ks = memory_keyspace("ks");
    ks.set("counter", "1").await.unwrap();

    let entry = ks.gets("counter").await.unwrap().expect("entry");
    assert!(ks.check_and_set("counter", "2", entry.version()).await.unwrap());
    // The snapshot is now stale.
    assert!(!ks.check_and_set("counter", "3", entry.version()).await.unwrap());
}

/// Versions are content fingerprints: a colliding value passes the check.
#[tokio::test]
async fn check_and_set_accepts_colliding_version() {
    let ks = memory_keyspace("ks");
    ks.set("k", "Aa").await.unwrap();

    assert_eq!(Version::of("Aa"), Version::of("BB"));
    assert!(ks.check_and_set("k", "new", Version::of("BB")).await.unwrap());
}

// ---------------------------------------------------------------------------
// replace
// ---------------------------------------------------------------------------

#[rstest]
#[case::missing_key(None, "v", false)]
#[case::same_value(Some("v"), "v", false)]
#[case::different_value(Some("old"), "new", true)]
#[case::to_empty(Some("old"), "", true)]
#[tokio::test]
async fn replace_outcomes(
    #[case] existing: Option<&str>,
    #[case] value: &str,
    #[case] expected: bool,
) {
    let ks = memory_keyspace("ks");
    if let Some(existing) = existing {
        ks.set("k", existing).await.unwrap();
    }

    assert_eq!(ks.replace("k", value).await.unwrap(), expected);
    assert_eq!(ks.get("k").await.unwrap().as_deref(), existing.map(|_| value));
}

#[tokio::test]
async fn replace_updates_version() {
    let ks = memory_keyspace("ks");
    ks.set("k", "old").await.unwrap();

    assert!(ks.replace("k", "new").await.unwrap());
    assert_eq!(ks.gets("k").await.unwrap().map(|e| e.version()), Some(Version::of("new")));
}

/// Backend that applies updates but never reports the prior item.
struct ForgetfulBackend(MemoryBackend);

#[async_trait]
impl ItemBackend for ForgetfulBackend {
    async fn put_item(&self, request: PutItem) -> StorageResult<()> {
        self.0.put_item(request).await
    }

    async fn update_item(&self, request: UpdateItem) -> StorageResult<Option<Item>> {
        self.0.update_item(request).await.map(|_| None)
    }

    async fn delete_item(&self, request: DeleteItem) -> StorageResult<Option<Item>> {
        self.0.delete_item(request).await
    }

    async fn get_item(&self, request: GetItem) -> StorageResult<Option<Item>> {
        self.0.get_item(request).await
    }
}

#[tokio::test]
async fn replace_without_reported_prior_item_counts_as_change() {
    let ks = Keystore::new(ForgetfulBackend(MemoryBackend::new())).keyspace("ks").unwrap();
    ks.set("k", "v").await.unwrap();

    assert!(ks.replace("k", "v").await.unwrap());
}

// ---------------------------------------------------------------------------
// delete / deletes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_reports_removal_once() {
    let ks = memory_keyspace("ks");
    ks.set("k", "v").await.unwrap();

    assert!(ks.delete("k").await.unwrap());
    assert!(!ks.delete("k").await.unwrap());
    assert_eq!(ks.get("k").await.unwrap(), None);
}

#[tokio::test]
async fn delete_missing_key_returns_false() {
    let ks = memory_keyspace("ks");
    assert!(!ks.delete("never-written").await.unwrap());
}

#[tokio::test]
async fn deletes_with_stale_version_keeps_item() {
    let ks = memory_keyspace("ks");
    ks.set("k", "current").await.unwrap();

    assert!(!ks.deletes("k", Version::of("stale")).await.unwrap());
    assert_eq!(ks.get("k").await.unwrap().as_deref(), Some("current"));

    assert!(ks.deletes("k", Version::of("current")).await.unwrap());
    assert!(!ks.exists("k").await.unwrap());
}

#[tokio::test]
async fn deletes_on_missing_key_returns_false() {
    let ks = memory_keyspace("ks");
    assert!(!ks.deletes("k", Version::of("anything")).await.unwrap());
}

// ---------------------------------------------------------------------------
// reads
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reads_of_missing_key() {
    let ks = memory_keyspace("ks");

    assert!(!ks.exists("k").await.unwrap());
    assert_eq!(ks.get("k").await.unwrap(), None);
    assert_eq!(ks.gets("k").await.unwrap(), None);
}

#[tokio::test]
async fn gets_returns_key_value_and_version() {
    let ks = memory_keyspace("ks");
    ks.set("greeting", "hello").await.unwrap();

    let entry = ks.gets("greeting").await.unwrap().expect("entry");
    assert_eq!(entry.key(), "greeting");
    assert_eq!(entry.value(), "hello");
    assert_eq!(entry.version(), Version(99_162_322));
}

#[tokio::test]
async fn keyspaces_do_not_see_each_other() {
    let store = Keystore::new(MemoryBackend::new());
    let left = store.keyspace("left").unwrap();
    let right = store.keyspace("right").unwrap();

    assert!(left.add("k", "l").await.unwrap());
    assert!(right.add("k", "r").await.unwrap());
    assert!(left.delete("k").await.unwrap());

    assert!(!left.exists("k").await.unwrap());
    assert_eq!(right.get("k").await.unwrap().as_deref(), Some("r"));
}

// ---------------------------------------------------------------------------
// walkthrough
// ---------------------------------------------------------------------------

#[tokio::test]
async fn compare_and_swap_walkthrough() {
    let ks = memory_keyspace("ks");

    assert!(ks.set("k", "a").await.unwrap());
    assert_eq!(ks.get("k").await.unwrap().as_deref(), Some("a"));
    assert!(ks.check_and_set("k", "b", Version::of("a")).await.unwrap());
    assert_eq!(ks.get("k").await.unwrap().as_deref(), Some("b"));
    assert!(!ks.check_and_set("k", "c", Version::of("a")).await.unwrap());
    assert_eq!(ks.get("k").await.unwrap().as_deref(), Some("b"));
}

// ---------------------------------------------------------------------------
// configuration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn custom_attribute_names_are_used() {
    let backend = MemoryBackend::new();
    let config = KeystoreConfig::builder()
        .schema(
            TableSchema::builder()
                .partition_attribute("it_keyspace")
                .key_attribute("it_key")
                .value_attribute("it_value")
                .version_attribute("it_version")
                .build(),
        )
        .build()
        .unwrap();
    let ks = Keystore::with_config(backend.clone(), config).keyspace("custom").unwrap();

    ks.set("k", "v").await.unwrap();
    assert!(!ks.add("k", "other").await.unwrap());
    assert!(ks.replace("k", "w").await.unwrap());
    assert!(ks.check_and_set("k", "x", Version::of("w")).await.unwrap());

    let item = backend
        .get_item(GetItem {
            key: keystore::PrimaryKey::new("it_keyspace", "custom", "it_key", "k"),
            consistency: ReadConsistency::Strong,
            projection: None,
        })
        .await
        .unwrap()
        .expect("item stored under custom attributes");
    assert_eq!(item.string("it_value"), Some("x"));
    assert_eq!(item.number("it_version"), Some(Version::of("x").0));
    assert!(!item.contains("value"));

    assert_eq!(ks.gets("k").await.unwrap().map(|e| e.into_value()), Some("x".to_owned()));
    assert!(ks.deletes("k", Version::of("x")).await.unwrap());
}

// ---------------------------------------------------------------------------
// argument validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_key_is_rejected_by_every_operation() {
    let ks = memory_keyspace("ks");
    let v = Version::of("v");

    assert_invalid_argument!(ks.add("", "v").await);
    assert_invalid_argument!(ks.set("", "v").await);
    assert_invalid_argument!(ks.check_and_set("", "v", v).await);
    assert_invalid_argument!(ks.replace("", "v").await);
    assert_invalid_argument!(ks.delete("").await);
    assert_invalid_argument!(ks.deletes("", v).await);
    assert_invalid_argument!(ks.exists("").await);
    assert_invalid_argument!(ks.get("").await);
    assert_invalid_argument!(ks.gets("").await);
}

#[tokio::test]
async fn oversized_arguments_are_rejected() {
    let limits = SizeLimits::new(8, 16).unwrap();
    let config = KeystoreConfig::builder().size_limits(limits).build().unwrap();
    let ks = Keystore::with_config(MemoryBackend::new(), config).keyspace("ks").unwrap();

    let long_key = "k".repeat(9);
    assert_invalid_argument!(ks.set(&long_key, "v").await, "key over limit");
    assert_invalid_argument!(ks.get(&long_key).await, "key over limit on read");
    assert_invalid_argument!(ks.set("k", &make_value(17)).await, "value over limit");
    assert_invalid_argument!(ks.replace("k", &make_value(17)).await, "value over limit");

    assert!(ks.set(&"k".repeat(8), &make_value(16)).await.unwrap(), "values at the limit fit");
}

#[tokio::test]
async fn many_keys_round_trip() {
    let ks = memory_keyspace("bulk");
    for i in 0..100 {
        assert!(ks.add(&make_key("item", i), &i.to_string()).await.unwrap());
    }
    for i in 0..100 {
        let entry = ks.gets(&make_key("item", i)).await.unwrap().expect("entry");
        assert_eq!(entry.version(), Version::of(&i.to_string()));
    }
}

// ---------------------------------------------------------------------------
// properties
// ---------------------------------------------------------------------------

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().enable_all().build().expect("runtime")
}

// Key strategies start at one character: the empty key is always an
// `InvalidArgument`, so these laws range over non-empty keys only.
proptest! {
    /// A second `add` of the same key is always rejected.
    #[test]
    fn add_twice_is_true_then_false(key in "[a-z0-9:]{1,32}", value in ".{0,64}") {
        runtime().block_on(async {
            let ks = memory_keyspace("prop");
            prop_assert!(ks.add(&key, &value).await.unwrap());
            prop_assert!(!ks.add(&key, &value).await.unwrap());
            Ok(())
        })?;
    }

    /// `set` always succeeds and is read back verbatim with its version.
    #[test]
    fn set_then_gets_round_trips(key in "\\PC{1,32}", value in "\\PC{0,128}") {
        runtime().block_on(async {
            let ks = memory_keyspace("prop");
            prop_assert!(ks.set(&key, &value).await.unwrap());
            prop_assert_eq!(ks.get(&key).await.unwrap(), Some(value.clone()));

            let entry = ks.gets(&key).await.unwrap().expect("entry");
            prop_assert_eq!(entry.key(), key.as_str());
            prop_assert_eq!(entry.value(), value.as_str());
            prop_assert_eq!(entry.version(), Version::of(&value));
            Ok(())
        })?;
    }

    /// `check_and_set` succeeds exactly when the expected version matches.
    #[test]
    fn check_and_set_matches_version(v1 in ".{0,16}", v2 in ".{0,16}", guess in ".{0,16}") {
        runtime().block_on(async {
            let ks = memory_keyspace("prop");
            ks.set("k", &v1).await.unwrap();

            let expected = Version::of(&guess);
            let swapped = ks.check_and_set("k", &v2, expected).await.unwrap();
            prop_assert_eq!(swapped, expected == Version::of(&v1));

            let stored = ks.gets("k").await.unwrap().expect("entry");
            let winner = if swapped { &v2 } else { &v1 };
            prop_assert_eq!(stored.value(), winner.as_str());
            prop_assert_eq!(stored.version(), Version::of(winner));
            Ok(())
        })?;
    }

    /// `delete` reports removal exactly once per stored item.
    #[test]
    fn delete_is_true_exactly_once(key in "[a-z]{1,16}", value in ".{0,16}") {
        runtime().block_on(async {
            let ks = memory_keyspace("prop");
            ks.set(&key, &value).await.unwrap();
            prop_assert!(ks.delete(&key).await.unwrap());
            prop_assert!(!ks.delete(&key).await.unwrap());
            Ok(())
        })?;
    }
}
