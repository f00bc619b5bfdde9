//! Storage backend capability trait.
//!
//! This module defines [`ItemBackend`], the four operations a keyspace needs
//! from a storage engine:
//!
//! | Method | Capability |
//! |--------|------------|
//! | [`put_item`](ItemBackend::put_item) | Conditional write of a whole item |
//! | [`update_item`](ItemBackend::update_item) | Conditional attribute update, optionally returning the prior item |
//! | [`delete_item`](ItemBackend::delete_item) | Conditional delete, optionally returning the removed item |
//! | [`get_item`](ItemBackend::get_item) | Point read with a consistency mode and optional projection |
//!
//! Items are addressed by a two-part [`PrimaryKey`]. Each mutation carries a
//! [`Condition`] that the backend evaluates against the current item and
//! applies atomically with the mutation. When the condition does not hold the
//! backend returns [`StorageError::ConditionFailed`] and leaves the item
//! untouched; every other failure maps to another [`StorageError`] variant.
//!
//! # Implementing a Backend
//!
//! 1. Implement the four methods of [`ItemBackend`]
//! 2. Evaluate conditions with [`Condition::evaluate`] (or an equivalent native predicate) in the
//!    same atomic step as the mutation
//! 3. Map backend-specific errors to [`StorageError`]
//!
//! See [`MemoryBackend`](crate::MemoryBackend) for a reference implementation,
//! and the `conformance` module (behind the `testutil` feature) for a
//! reusable contract test suite.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    error::StorageResult,
    types::{Item, PrimaryKey},
};

/// Consistency mode for point reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadConsistency {
    /// Read the latest committed state.
    #[default]
    Strong,
    /// Read from any replica; may observe slightly stale state.
    Eventual,
}

/// Predicate a backend evaluates against the existing item before mutating it.
///
/// A condition over a missing item sees every attribute as absent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Condition {
    /// Always holds.
    #[default]
    None,
    /// Holds when the named attribute is absent, i.e. no such item exists.
    AttributeNotExists(String),
    /// Holds when the named attribute is present, i.e. the item exists.
    AttributeExists(String),
    /// Holds when the named attribute is a number equal to `value`.
    NumberEquals {
        /// Attribute to compare.
        attribute: String,
        /// Expected number.
        value: i64,
    },
}

impl Condition {
    /// Evaluates the condition against the item currently stored, if any.
    #[must_use]
    pub fn evaluate(&self, existing: Option<&Item>) -> bool {
        match self {
            Self::None => true,
            Self::AttributeNotExists(name) => !existing.is_some_and(|item| item.contains(name)),
            Self::AttributeExists(name) => existing.is_some_and(|item| item.contains(name)),
            Self::NumberEquals { attribute, value } => {
                existing.and_then(|item| item.number(attribute)) == Some(*value)
            },
        }
    }

    /// Returns `true` if this is [`Condition::None`].
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// Whether a mutation returns the item as it was before the mutation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReturnValues {
    /// Return nothing.
    #[default]
    None,
    /// Return every attribute of the prior item, if one existed.
    AllOld,
}

/// Request to write a whole item, replacing any existing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutItem {
    /// Primary key of the item.
    pub key: PrimaryKey,
    /// Non-key attributes to store; the key attributes are added by the backend.
    pub item: Item,
    /// Predicate over the existing item.
    pub condition: Condition,
}

/// Request to set attributes on an item, creating it when absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateItem {
    /// Primary key of the item.
    pub key: PrimaryKey,
    /// Attributes to overwrite.
    pub updates: Item,
    /// Predicate over the existing item.
    pub condition: Condition,
    /// Whether to return the prior item.
    pub return_values: ReturnValues,
}

/// Request to remove an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteItem {
    /// Primary key of the item.
    pub key: PrimaryKey,
    /// Predicate over the existing item.
    pub condition: Condition,
    /// Whether to return the removed item.
    pub return_values: ReturnValues,
}

/// Request to read one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetItem {
    /// Primary key of the item.
    pub key: PrimaryKey,
    /// Consistency of the read.
    pub consistency: ReadConsistency,
    /// Attributes to return; `None` returns all of them.
    pub projection: Option<Vec<String>>,
}

/// Storage engine capability consumed by [`Keyspace`](crate::Keyspace).
///
/// Backends must be thread-safe (`Send + Sync`). Each method is a single
/// request/response exchange; conditional mutations must evaluate their
/// predicate and apply the change as one indivisible step.
#[async_trait]
pub trait ItemBackend: Send + Sync {
    /// Writes `request.item` under `request.key` if the condition holds.
    ///
    /// # Errors
    ///
    /// - [`StorageError::ConditionFailed`](crate::StorageError::ConditionFailed) if the predicate
    ///   does not hold.
    /// - Any other [`StorageError`](crate::StorageError) on backend failure.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn put_item(&self, request: PutItem) -> StorageResult<()>;

    /// Sets `request.updates` on the item if the condition holds.
    ///
    /// A missing item is created from its key plus the updates. Returns the
    /// prior item when `return_values` is [`ReturnValues::AllOld`] and one
    /// existed.
    ///
    /// # Errors
    ///
    /// - [`StorageError::ConditionFailed`](crate::StorageError::ConditionFailed) if the predicate
    ///   does not hold.
    /// - Any other [`StorageError`](crate::StorageError) on backend failure.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn update_item(&self, request: UpdateItem) -> StorageResult<Option<Item>>;

    /// Removes the item if the condition holds.
    ///
    /// Deleting a missing item is not an error. Returns the removed item when
    /// `return_values` is [`ReturnValues::AllOld`] and one existed.
    ///
    /// # Errors
    ///
    /// - [`StorageError::ConditionFailed`](crate::StorageError::ConditionFailed) if the predicate
    ///   does not hold.
    /// - Any other [`StorageError`](crate::StorageError) on backend failure.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn delete_item(&self, request: DeleteItem) -> StorageResult<Option<Item>>;

    /// Reads the item, returning `Ok(None)` if it does not exist.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn get_item(&self, request: GetItem) -> StorageResult<Option<Item>>;
}

#[async_trait]
impl<B: ItemBackend + ?Sized> ItemBackend for Arc<B> {
    async fn put_item(&self, request: PutItem) -> StorageResult<()> {
        (**self).put_item(request).await
    }

    async fn update_item(&self, request: UpdateItem) -> StorageResult<Option<Item>> {
        (**self).update_item(request).await
    }

    async fn delete_item(&self, request: DeleteItem) -> StorageResult<Option<Item>> {
        (**self).delete_item(request).await
    }

    async fn get_item(&self, request: GetItem) -> StorageResult<Option<Item>> {
        (**self).get_item(request).await
    }
}

#[async_trait]
impl<'a, B: ItemBackend + ?Sized> ItemBackend for &'a B {
    async fn put_item(&self, request: PutItem) -> StorageResult<()> {
        (**self).put_item(request).await
    }

    async fn update_item(&self, request: UpdateItem) -> StorageResult<Option<Item>> {
        (**self).update_item(request).await
    }

    async fn delete_item(&self, request: DeleteItem) -> StorageResult<Option<Item>> {
        (**self).delete_item(request).await
    }

    async fn get_item(&self, request: GetItem) -> StorageResult<Option<Item>> {
        (**self).get_item(request).await
    }
}
