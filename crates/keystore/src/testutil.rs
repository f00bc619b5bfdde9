//! Shared test utilities for keyspace and backend testing.
//!
//! This module provides backend wrappers for observing or breaking the
//! request stream, helpers for generating test data, and assertion macros for
//! [`KeystoreResult`] values. It is feature-gated behind `testutil` to prevent
//! leaking into production builds.
//!
//! # Usage
//!
//! In integration tests, enable the feature in `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! keystore = { path = "../keystore", features = ["testutil"] }
//! ```
//!
//! Then import helpers:
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use keystore::testutil::{RecordingBackend, make_key, make_value};
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    backend::{DeleteItem, GetItem, ItemBackend, PutItem, UpdateItem},
    error::{KeystoreError, KeystoreResult, StorageError, StorageResult},
    keyspace::Keyspace,
    memory::MemoryBackend,
    store::Keystore,
    types::Item,
};

/// Create a deterministic test key from a prefix and index.
///
/// Produces keys like `"prefix:000042"` (zero-padded to 6 digits).
#[must_use]
pub fn make_key(prefix: &str, idx: usize) -> String {
    format!("{prefix}:{idx:06}")
}

/// Create a test value of `size` bytes.
#[must_use]
pub fn make_value(size: usize) -> String {
    "v".repeat(size)
}

/// Create a test value tagged with a task ID and sequence number.
///
/// Produces values like `"task3-val42"`. Useful for concurrent tests where
/// you need to identify which task wrote which value.
#[must_use]
pub fn make_tagged_value(task: usize, seq: usize) -> String {
    format!("task{task}-val{seq}")
}

/// Create a keyspace named `name` over a fresh [`MemoryBackend`].
///
/// # Panics
///
/// Panics if `name` is empty.
#[must_use]
pub fn memory_keyspace(name: &str) -> Keyspace<MemoryBackend> {
    Keystore::new(MemoryBackend::new()).keyspace(name).expect("keyspace name must be non-empty")
}

/// Create a keyspace pre-populated with `count` keys.
///
/// Keys are formatted as `"{prefix}:{idx:06}"` and values as
/// [`make_tagged_value`]`(0, idx)`.
///
/// # Panics
///
/// Panics if any `set` fails (should not happen with `MemoryBackend`).
pub async fn populated_keyspace(name: &str, prefix: &str, count: usize) -> Keyspace<MemoryBackend> {
    let ks = memory_keyspace(name);
    for i in 0..count {
        ks.set(&make_key(prefix, i), &make_tagged_value(0, i)).await.expect("populate set failed");
    }
    ks
}

/// One request observed by a [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// A `put_item` call.
    Put(PutItem),
    /// An `update_item` call.
    Update(UpdateItem),
    /// A `delete_item` call.
    Delete(DeleteItem),
    /// A `get_item` call.
    Get(GetItem),
}

/// Backend wrapper that records every request before forwarding it.
///
/// Clones share the same log.
#[derive(Debug, Clone)]
pub struct RecordingBackend<B> {
    inner: B,
    requests: Arc<Mutex<Vec<Request>>>,
}

impl<B: ItemBackend> RecordingBackend<B> {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(inner: B) -> Self {
        Self { inner, requests: Arc::new(Mutex::new(Vec::new())) }
    }

    /// Returns a copy of every request recorded so far, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }

    /// Returns the most recent request, if any.
    #[must_use]
    pub fn last_request(&self) -> Option<Request> {
        self.requests.lock().last().cloned()
    }

    /// Returns the number of requests recorded so far.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Forgets every recorded request.
    pub fn clear(&self) {
        self.requests.lock().clear();
    }

    /// Returns the wrapped backend.
    #[must_use]
    pub fn inner(&self) -> &B {
        &self.inner
    }
}

#[async_trait]
impl<B: ItemBackend> ItemBackend for RecordingBackend<B> {
    async fn put_item(&self, request: PutItem) -> StorageResult<()> {
        self.requests.lock().push(Request::Put(request.clone()));
        self.inner.put_item(request).await
    }

    async fn update_item(&self, request: UpdateItem) -> StorageResult<Option<Item>> {
        self.requests.lock().push(Request::Update(request.clone()));
        self.inner.update_item(request).await
    }

    async fn delete_item(&self, request: DeleteItem) -> StorageResult<Option<Item>> {
        self.requests.lock().push(Request::Delete(request.clone()));
        self.inner.delete_item(request).await
    }

    async fn get_item(&self, request: GetItem) -> StorageResult<Option<Item>> {
        self.requests.lock().push(Request::Get(request.clone()));
        self.inner.get_item(request).await
    }
}

type ErrorFactory = Box<dyn Fn() -> StorageError + Send + Sync>;

/// Backend whose every operation fails with an error built by a factory.
///
/// Counts the calls it receives, so tests can assert that a request was (or
/// was not) issued.
pub struct FailingBackend {
    make_error: ErrorFactory,
    calls: AtomicUsize,
}

impl std::fmt::Debug for FailingBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailingBackend").field("calls", &self.calls()).finish_non_exhaustive()
    }
}

impl FailingBackend {
    /// Creates a backend that fails every call with `make_error()`.
    #[must_use]
    pub fn new(make_error: impl Fn() -> StorageError + Send + Sync + 'static) -> Self {
        Self { make_error: Box::new(make_error), calls: AtomicUsize::new(0) }
    }

    /// Number of calls received so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> StorageResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err((self.make_error)())
    }
}

#[async_trait]
impl ItemBackend for FailingBackend {
    async fn put_item(&self, _request: PutItem) -> StorageResult<()> {
        self.fail()
    }

    async fn update_item(&self, _request: UpdateItem) -> StorageResult<Option<Item>> {
        self.fail()
    }

    async fn delete_item(&self, _request: DeleteItem) -> StorageResult<Option<Item>> {
        self.fail()
    }

    async fn get_item(&self, _request: GetItem) -> StorageResult<Option<Item>> {
        self.fail()
    }
}

/// Assert that a [`KeystoreResult`] is a [`KeystoreError::InvalidArgument`].
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use keystore::assert_invalid_argument;
/// use keystore::error::{KeystoreError, KeystoreResult};
///
/// let result: KeystoreResult<bool> = Err(KeystoreError::invalid_argument("empty key"));
/// assert_invalid_argument!(result);
/// ```
#[macro_export]
macro_rules! assert_invalid_argument {
    ($result:expr) => {
        assert!(
            matches!($result, Err($crate::error::KeystoreError::InvalidArgument { .. })),
            "expected KeystoreError::InvalidArgument, got: {:?}",
            $result,
        );
    };
    ($result:expr, $msg:expr) => {
        assert!(
            matches!($result, Err($crate::error::KeystoreError::InvalidArgument { .. })),
            "{}: expected KeystoreError::InvalidArgument, got: {:?}",
            $msg,
            $result,
        );
    };
}

/// Assert that a [`StorageResult`] is a [`StorageError::ConditionFailed`].
#[macro_export]
macro_rules! assert_condition_failed {
    ($result:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::ConditionFailed)),
            "expected StorageError::ConditionFailed, got: {:?}",
            $result,
        );
    };
    ($result:expr, $msg:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::ConditionFailed)),
            "{}: expected StorageError::ConditionFailed, got: {:?}",
            $msg,
            $result,
        );
    };
}

/// Assert that a [`KeystoreResult`] is a backend error matching a
/// [`StorageError`] pattern.
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use keystore::assert_backend_error;
/// use keystore::error::{KeystoreError, KeystoreResult, StorageError};
///
/// let result: KeystoreResult<bool> = Err(StorageError::timeout().into());
/// assert_backend_error!(result, StorageError::Timeout);
/// ```
#[macro_export]
macro_rules! assert_backend_error {
    ($result:expr, $pattern:pat) => {
        assert!(
            matches!($result, Err($crate::error::KeystoreError::Backend($pattern))),
            "expected KeystoreError::Backend({}), got: {:?}",
            stringify!($pattern),
            $result,
        );
    };
}

/// Assert that a [`KeystoreResult`] is `Ok`.
///
/// Returns the inner value on success, panics with a descriptive message
/// on failure.
#[macro_export]
macro_rules! assert_keystore_ok {
    ($result:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("expected Ok, got KeystoreError: {e:?}"),
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("{}: expected Ok, got KeystoreError: {e:?}", $msg),
        }
    };
}

/// Helper to verify that a result is an `InvalidArgument` error.
pub fn is_invalid_argument<T>(result: &KeystoreResult<T>) -> bool {
    matches!(result, Err(KeystoreError::InvalidArgument { .. }))
}

/// Helper to verify that a result is a `ConditionFailed` error.
pub fn is_condition_failed<T>(result: &StorageResult<T>) -> bool {
    matches!(result, Err(StorageError::ConditionFailed))
}
