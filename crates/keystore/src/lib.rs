//! Versioned key-value keyspaces over pluggable conditional-write storage.
//!
//! A [`Keystore`] wraps one shared table and hands out [`Keyspace`]s: named
//! partitions of that table exposing `add`, `set`, `check_and_set`,
//! `replace`, `delete`, `deletes`, `exists`, `get` and `gets`. Each stored
//! value carries a [`Version`] token derived from its content, which callers
//! pass back to the compare-and-swap operations.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Application code                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Keystore ──keyspace(name)──▶ Keyspace                      │
//! │    (config, shared backend)   (versioned-write protocol)    │
//! ├─────────────────────────────────────────────────────────────┤
//! │                      ItemBackend trait                      │
//! │       (put_item, update_item, delete_item, get_item)        │
//! ├──────────────┬──────────────────────────────────────────────┤
//! │ MemoryBackend│     any engine with single-item conditional  │
//! │   (testing)  │     writes and point reads                   │
//! └──────────────┴──────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use keystore::{Keystore, MemoryBackend, Version};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Keystore::new(MemoryBackend::new());
//!     let ks = store.keyspace("config")?;
//!
//!     ks.set("k", "a").await?;
//!     assert_eq!(ks.get("k").await?.as_deref(), Some("a"));
//!
//!     // Compare-and-swap against the version of "a".
//!     assert!(ks.check_and_set("k", "b", Version::of("a")).await?);
//!     assert!(!ks.check_and_set("k", "c", Version::of("a")).await?);
//!     assert_eq!(ks.get("k").await?.as_deref(), Some("b"));
//!
//!     Ok(())
//! }
//! ```
//!
//! # Error Handling
//!
//! Keyspace operations return [`KeystoreResult<T>`]. A conditional predicate
//! that does not hold is never an error; the operation returns `false`.
//! Bad arguments produce [`KeystoreError::InvalidArgument`] before any
//! backend call, and every other backend failure is passed through as
//! [`KeystoreError::Backend`].
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `conformance` suite for [`ItemBackend`] implementations and the
//!   `testutil` module (request-recording backend, key/value generators, assertion macros).
//! - **`failpoints`**: Activates the fail points compiled into [`MemoryBackend`].

#![deny(unsafe_code)]

pub mod backend;
pub mod config;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used, clippy::panic)]
pub mod conformance;
pub mod error;
pub mod keyspace;
pub mod memory;
pub mod size_limits;
pub mod store;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;
pub mod types;

// Re-export primary types at crate root for convenience
pub use backend::{
    Condition, DeleteItem, GetItem, ItemBackend, PutItem, ReadConsistency, ReturnValues,
    UpdateItem,
};
pub use config::{
    DEFAULT_KEY_ATTRIBUTE, DEFAULT_PARTITION_ATTRIBUTE, DEFAULT_VALUE_ATTRIBUTE,
    DEFAULT_VERSION_ATTRIBUTE, KeystoreConfig, TableSchema,
};
pub use error::{BoxError, ConfigError, KeystoreError, KeystoreResult, StorageError, StorageResult};
pub use keyspace::Keyspace;
pub use memory::MemoryBackend;
pub use size_limits::{
    DEFAULT_MAX_KEY_SIZE, DEFAULT_MAX_VALUE_SIZE, SizeLimits, validate_entry, validate_key,
};
pub use store::Keystore;
pub use types::{AttributeValue, Item, KeyAttribute, KeyValue, PrimaryKey, Version};
