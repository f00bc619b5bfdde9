//! Common types shared by keyspaces and backends.
//!
//! The item model is deliberately small: an [`Item`] is an ordered map of
//! named attributes, each holding either a string or a 64-bit number. A
//! [`PrimaryKey`] names the two attributes (partition and sort) that identify
//! an item inside a table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Version token attached to every stored value.
///
/// The token is a fingerprint of the value's content, computed by
/// [`Version::of`]. Two writes of identical values always produce the same
/// token. Distinct values may also collide, so a matching version proves the
/// stored value *probably* did not change, not that it certainly did not.
///
/// # Examples
///
/// ```
/// use keystore::Version;
///
/// assert_eq!(Version::of(""), Version::from(0));
/// assert_eq!(Version::of("a"), Version::from(97));
/// assert_eq!(i64::from(Version::of("hello")), 99_162_322);
/// ```
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(pub i64);

impl Version {
    /// Computes the version token for `value`.
    ///
    /// The token is the 32-bit polynomial hash `h = 31 * h + unit` folded over
    /// the UTF-16 code units of `value` with wrapping arithmetic, then
    /// sign-extended to 64 bits. Items written by other clients of the same
    /// table use the same scheme, so their versions interoperate.
    #[must_use]
    pub fn of(value: &str) -> Self {
        let hash = value
            .encode_utf16()
            .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)));
        Self(i64::from(hash))
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Version> for i64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable snapshot of one stored entry, as returned by
/// [`Keyspace::gets`](crate::Keyspace::gets).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyValue {
    key: String,
    value: String,
    version: Version,
}

impl KeyValue {
    /// Creates a new snapshot.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>, version: Version) -> Self {
        Self { key: key.into(), value: value.into(), version }
    }

    /// The key, unique within its keyspace.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The stored value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// The version token stored alongside the value.
    #[must_use]
    pub fn version(&self) -> Version {
        self.version
    }

    /// Consumes the snapshot, returning the value.
    #[must_use]
    pub fn into_value(self) -> String {
        self.value
    }
}

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeValue {
    /// String attribute.
    S(String),
    /// Numeric attribute.
    N(i64),
}

impl AttributeValue {
    /// Returns the string payload, if this is a string attribute.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::S(s) => Some(s),
            Self::N(_) => None,
        }
    }

    /// Returns the numeric payload, if this is a numeric attribute.
    #[must_use]
    pub fn as_number(&self) -> Option<i64> {
        match self {
            Self::N(n) => Some(*n),
            Self::S(_) => None,
        }
    }
}

/// A stored item: named attributes in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    attributes: BTreeMap<String, AttributeValue>,
}

impl Item {
    /// Creates an empty item.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a string attribute, returning the item.
    #[must_use]
    pub fn with_string(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), AttributeValue::S(value.into()));
        self
    }

    /// Sets a numeric attribute, returning the item.
    #[must_use]
    pub fn with_number(mut self, name: impl Into<String>, value: i64) -> Self {
        self.attributes.insert(name.into(), AttributeValue::N(value));
        self
    }

    /// Sets an attribute in place, returning any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: AttributeValue) -> Option<AttributeValue> {
        self.attributes.insert(name.into(), value)
    }

    /// Returns the raw attribute, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// Returns the attribute as a string, if present and of string type.
    #[must_use]
    pub fn string(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(AttributeValue::as_str)
    }

    /// Returns the attribute as a number, if present and of numeric type.
    #[must_use]
    pub fn number(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(AttributeValue::as_number)
    }

    /// Returns `true` if the attribute is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Returns a copy holding only the named attributes.
    #[must_use]
    pub fn project<S: AsRef<str>>(&self, names: &[S]) -> Self {
        let attributes = names
            .iter()
            .filter_map(|name| {
                let name = name.as_ref();
                self.attributes.get(name).map(|v| (name.to_owned(), v.clone()))
            })
            .collect();
        Self { attributes }
    }

    /// Iterates attributes in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Returns `true` if the item has no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// One named component of a [`PrimaryKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyAttribute {
    /// Attribute name.
    pub name: String,
    /// Attribute value.
    pub value: String,
}

/// Two-part primary key: a partition attribute plus a sort attribute.
///
/// The pair of values is unique within a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrimaryKey {
    /// The partition component (the keyspace name).
    pub partition: KeyAttribute,
    /// The sort component (the caller's key).
    pub sort: KeyAttribute,
}

impl PrimaryKey {
    /// Creates a primary key from attribute names and values.
    #[must_use]
    pub fn new(
        partition_name: impl Into<String>,
        partition_value: impl Into<String>,
        sort_name: impl Into<String>,
        sort_value: impl Into<String>,
    ) -> Self {
        Self {
            partition: KeyAttribute { name: partition_name.into(), value: partition_value.into() },
            sort: KeyAttribute { name: sort_name.into(), value: sort_value.into() },
        }
    }

    /// Writes both key attributes into `item`.
    #[must_use]
    pub fn apply_to(&self, item: Item) -> Item {
        item.with_string(self.partition.name.clone(), self.partition.value.clone())
            .with_string(self.sort.name.clone(), self.sort.value.clone())
    }

    /// Reads a primary key out of `item` using the given attribute names.
    ///
    /// Returns `None` if either key attribute is missing or not a string.
    #[must_use]
    pub fn from_item(item: &Item, partition_name: &str, sort_name: &str) -> Option<Self> {
        let partition = item.string(partition_name)?;
        let sort = item.string(sort_name)?;
        Some(Self::new(partition_name, partition, sort_name, sort))
    }
}
