//! Versioned key-value operations over one partition of a shared table.
//!
//! A [`Keyspace`] is a view: it owns no data and holds no mutable state. Each
//! operation validates its arguments, issues exactly one request to the
//! [`ItemBackend`], and interprets the outcome.
//!
//! | Operation | Condition | Result |
//! |-----------|-----------|--------|
//! | [`add`](Keyspace::add) | key attribute absent | `false` if the key exists |
//! | [`set`](Keyspace::set) | none | always `true` |
//! | [`check_and_set`](Keyspace::check_and_set) | version equals expected | `false` on mismatch or absence |
//! | [`replace`](Keyspace::replace) | key attribute present | `false` if absent or value unchanged |
//! | [`delete`](Keyspace::delete) | none | `true` if an item was removed |
//! | [`deletes`](Keyspace::deletes) | version equals expected | `true` if an item was removed |
//! | [`exists`](Keyspace::exists) | | key-only projection |
//! | [`get`](Keyspace::get) / [`gets`](Keyspace::gets) | | value, or value and version |
//!
//! Atomicity of the compare-and-swap style operations comes entirely from the
//! backend's single-item conditional primitives. Nothing is retried.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    backend::{
        Condition, DeleteItem, GetItem, ItemBackend, PutItem, ReadConsistency, ReturnValues,
        UpdateItem,
    },
    config::{KeystoreConfig, TableSchema},
    error::{KeystoreResult, StorageError, StorageResult},
    size_limits::{validate_entry, validate_key},
    types::{AttributeValue, Item, KeyValue, PrimaryKey, Version},
};

/// How a write reaches the backend.
#[derive(Debug, Clone, Copy)]
enum WriteKind {
    /// Whole-item put.
    Put,
    /// Attribute update that may return the prior item.
    Update(ReturnValues),
}

/// Interpreted result of a conditional mutation.
#[derive(Debug)]
enum Outcome {
    /// The mutation was applied. Carries the prior item when requested and present.
    Applied(Option<Item>),
    /// The condition did not hold.
    Rejected,
}

impl Outcome {
    fn from_result(result: StorageResult<Option<Item>>) -> KeystoreResult<Self> {
        match result {
            Ok(prior) => Ok(Self::Applied(prior)),
            Err(StorageError::ConditionFailed) => Ok(Self::Rejected),
            Err(err) => Err(err.into()),
        }
    }

    fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// A named partition of a shared table exposing versioned key-value operations.
///
/// Obtain one from [`Keystore::keyspace`](crate::Keystore::keyspace). Keyspaces
/// are cheap to clone and safe to share between tasks.
pub struct Keyspace<B> {
    name: Arc<str>,
    config: Arc<KeystoreConfig>,
    backend: Arc<B>,
}

impl<B> Clone for Keyspace<B> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            config: Arc::clone(&self.config),
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B> std::fmt::Debug for Keyspace<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keyspace")
            .field("name", &self.name)
            .field("schema", self.config.schema())
            .field("read_consistency", &self.config.read_consistency())
            .finish_non_exhaustive()
    }
}

impl<B: ItemBackend> Keyspace<B> {
    pub(crate) fn new(name: Arc<str>, config: Arc<KeystoreConfig>, backend: Arc<B>) -> Self {
        Self { name, config, backend }
    }

    /// Returns the keyspace (partition) name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the attribute names items are stored under.
    #[must_use]
    pub fn schema(&self) -> &TableSchema {
        self.config.schema()
    }

    /// Returns the consistency mode used by every read.
    #[must_use]
    pub fn read_consistency(&self) -> ReadConsistency {
        self.config.read_consistency()
    }

    /// Stores `value` under `key` only if the key does not exist yet.
    ///
    /// Returns `false` if an item with this key already exists.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoreError::InvalidArgument`](crate::KeystoreError::InvalidArgument) for an
    /// empty or oversized key or value, or
    /// [`KeystoreError::Backend`](crate::KeystoreError::Backend) if the backend fails.
    #[tracing::instrument(skip(self, value), fields(keyspace = %self.name))]
    pub async fn add(&self, key: &str, value: &str) -> KeystoreResult<bool> {
        let condition = Condition::AttributeNotExists(self.schema().key_attribute().to_owned());
        let added = self.write(key, value, condition, WriteKind::Put).await?.is_applied();
        debug!(added, "add finished");
        Ok(added)
    }

    /// Stores `value` under `key` unconditionally, overwriting value and version.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoreError::InvalidArgument`](crate::KeystoreError::InvalidArgument) for an
    /// empty or oversized key or value, or
    /// [`KeystoreError::Backend`](crate::KeystoreError::Backend) if the backend fails.
    #[tracing::instrument(skip(self, value), fields(keyspace = %self.name))]
    pub async fn set(&self, key: &str, value: &str) -> KeystoreResult<bool> {
        let stored = self.write(key, value, Condition::None, WriteKind::Put).await?.is_applied();
        debug!(stored, "set finished");
        Ok(stored)
    }

    /// Stores `value` under `key` only if the stored version equals `expected`.
    ///
    /// `expected` normally comes from an earlier [`gets`](Self::gets). Returns
    /// `false` if the version differs or the key does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoreError::InvalidArgument`](crate::KeystoreError::InvalidArgument) for an
    /// empty or oversized key or value, or
    /// [`KeystoreError::Backend`](crate::KeystoreError::Backend) if the backend fails.
    #[tracing::instrument(skip(self, value), fields(keyspace = %self.name))]
    pub async fn check_and_set(
        &self,
        key: &str,
        value: &str,
        expected: Version,
    ) -> KeystoreResult<bool> {
        let condition = self.version_equals(expected);
        let swapped = self
            .write(key, value, condition, WriteKind::Update(ReturnValues::None))
            .await?
            .is_applied();
        debug!(swapped, "check_and_set finished");
        Ok(swapped)
    }

    /// Stores `value` under `key` only if the key already exists.
    ///
    /// Returns `true` when the stored value changed, and `false` when the key
    /// does not exist or already held `value`. A backend that applies the
    /// update without reporting a prior item counts as a change.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoreError::InvalidArgument`](crate::KeystoreError::InvalidArgument) for an
    /// empty or oversized key or value, or
    /// [`KeystoreError::Backend`](crate::KeystoreError::Backend) if the backend fails.
    #[tracing::instrument(skip(self, value), fields(keyspace = %self.name))]
    pub async fn replace(&self, key: &str, value: &str) -> KeystoreResult<bool> {
        let condition = Condition::AttributeExists(self.schema().key_attribute().to_owned());
        let outcome =
            self.write(key, value, condition, WriteKind::Update(ReturnValues::AllOld)).await?;

        let replaced = match outcome {
            Outcome::Rejected => false,
            Outcome::Applied(None) => true,
            Outcome::Applied(Some(prior)) => {
                prior.string(self.schema().value_attribute()) != Some(value)
            },
        };
        debug!(replaced, "replace finished");
        Ok(replaced)
    }

    /// Removes `key`.
    ///
    /// Returns `true` if an item was removed, `false` if there was nothing to
    /// remove.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoreError::InvalidArgument`](crate::KeystoreError::InvalidArgument) for an
    /// empty or oversized key, or [`KeystoreError::Backend`](crate::KeystoreError::Backend) if
    /// the backend fails.
    #[tracing::instrument(skip(self), fields(keyspace = %self.name))]
    pub async fn delete(&self, key: &str) -> KeystoreResult<bool> {
        let deleted = self.remove(key, Condition::None).await?;
        debug!(deleted, "delete finished");
        Ok(deleted)
    }

    /// Removes `key` only if the stored version equals `expected`.
    ///
    /// Returns `false` without removing anything if the version differs or
    /// the key does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoreError::InvalidArgument`](crate::KeystoreError::InvalidArgument) for an
    /// empty or oversized key, or [`KeystoreError::Backend`](crate::KeystoreError::Backend) if
    /// the backend fails.
    #[tracing::instrument(skip(self), fields(keyspace = %self.name))]
    pub async fn deletes(&self, key: &str, expected: Version) -> KeystoreResult<bool> {
        let deleted = self.remove(key, self.version_equals(expected)).await?;
        debug!(deleted, "deletes finished");
        Ok(deleted)
    }

    /// Returns `true` if `key` exists.
    ///
    /// Only the key attribute is fetched.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoreError::InvalidArgument`](crate::KeystoreError::InvalidArgument) for an
    /// empty or oversized key, or [`KeystoreError::Backend`](crate::KeystoreError::Backend) if
    /// the backend fails.
    #[tracing::instrument(skip(self), fields(keyspace = %self.name))]
    pub async fn exists(&self, key: &str) -> KeystoreResult<bool> {
        let projection = vec![self.schema().key_attribute().to_owned()];
        let exists = self.read(key, Some(projection)).await?.is_some();
        debug!(exists, "exists finished");
        Ok(exists)
    }

    /// Returns the value stored under `key`, if any.
    ///
    /// An item without a value attribute reads as absent. A numeric value
    /// attribute is returned as its decimal text.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoreError::InvalidArgument`](crate::KeystoreError::InvalidArgument) for an
    /// empty or oversized key, or [`KeystoreError::Backend`](crate::KeystoreError::Backend) if
    /// the backend fails.
    #[tracing::instrument(skip(self), fields(keyspace = %self.name))]
    pub async fn get(&self, key: &str) -> KeystoreResult<Option<String>> {
        let value = self.read(key, None).await?.and_then(|item| {
            match item.get(self.schema().value_attribute())? {
                AttributeValue::S(s) => Some(s.clone()),
                AttributeValue::N(n) => Some(n.to_string()),
            }
        });
        debug!(found = value.is_some(), "get finished");
        Ok(value)
    }

    /// Returns the value and version stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoreError::InvalidArgument`](crate::KeystoreError::InvalidArgument) for an
    /// empty or oversized key, or [`KeystoreError::Backend`](crate::KeystoreError::Backend) if
    /// the backend fails or the stored item lacks a well-typed value or version attribute.
    #[tracing::instrument(skip(self), fields(keyspace = %self.name))]
    pub async fn gets(&self, key: &str) -> KeystoreResult<Option<KeyValue>> {
        let entry = match self.read(key, None).await? {
            Some(item) => Some(self.decode(key, &item)?),
            None => None,
        };
        debug!(
            found = entry.is_some(),
            version = ?entry.as_ref().map(KeyValue::version),
            "gets finished"
        );
        Ok(entry)
    }

    fn primary_key(&self, key: &str) -> PrimaryKey {
        let schema = self.schema();
        PrimaryKey::new(schema.partition_attribute(), &*self.name, schema.key_attribute(), key)
    }

    fn version_equals(&self, expected: Version) -> Condition {
        Condition::NumberEquals {
            attribute: self.schema().version_attribute().to_owned(),
            value: expected.into(),
        }
    }

    /// Shared conditional write behind `add`, `set`, `check_and_set` and `replace`.
    async fn write(
        &self,
        key: &str,
        value: &str,
        condition: Condition,
        kind: WriteKind,
    ) -> KeystoreResult<Outcome> {
        validate_entry(key, value, self.config.size_limits())?;

        let schema = self.schema();
        let attributes = Item::new()
            .with_string(schema.value_attribute(), value)
            .with_number(schema.version_attribute(), Version::of(value).into());
        let primary_key = self.primary_key(key);

        let result = match kind {
            WriteKind::Put => self
                .backend
                .put_item(PutItem { key: primary_key, item: attributes, condition })
                .await
                .map(|()| None),
            WriteKind::Update(return_values) => {
                self.backend
                    .update_item(UpdateItem {
                        key: primary_key,
                        updates: attributes,
                        condition,
                        return_values,
                    })
                    .await
            },
        };
        Outcome::from_result(result)
    }

    /// Shared conditional delete behind `delete` and `deletes`.
    async fn remove(&self, key: &str, condition: Condition) -> KeystoreResult<bool> {
        validate_key(key, self.config.size_limits())?;

        let result = self
            .backend
            .delete_item(DeleteItem {
                key: self.primary_key(key),
                condition,
                return_values: ReturnValues::AllOld,
            })
            .await;
        Ok(matches!(Outcome::from_result(result)?, Outcome::Applied(Some(_))))
    }

    async fn read(&self, key: &str, projection: Option<Vec<String>>) -> KeystoreResult<Option<Item>> {
        validate_key(key, self.config.size_limits())?;

        let item = self
            .backend
            .get_item(GetItem {
                key: self.primary_key(key),
                consistency: self.config.read_consistency(),
                projection,
            })
            .await?;
        Ok(item)
    }

    fn decode(&self, key: &str, item: &Item) -> StorageResult<KeyValue> {
        let schema = self.schema();
        let value = item.string(schema.value_attribute()).ok_or_else(|| {
            warn!(
                keyspace = %self.name,
                key,
                attribute = schema.value_attribute(),
                "stored item has no string value"
            );
            StorageError::serialization(format!(
                "item '{key}' in keyspace '{}' has no string attribute '{}'",
                self.name,
                schema.value_attribute()
            ))
        })?;
        let version = item.number(schema.version_attribute()).ok_or_else(|| {
            warn!(
                keyspace = %self.name,
                key,
                attribute = schema.version_attribute(),
                "stored item has no numeric version"
            );
            StorageError::serialization(format!(
                "item '{key}' in keyspace '{}' has no numeric attribute '{}'",
                self.name,
                schema.version_attribute()
            ))
        })?;
        Ok(KeyValue::new(key, value, Version(version)))
    }
}
