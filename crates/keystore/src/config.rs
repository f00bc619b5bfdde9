//! Configuration for keystores and their keyspaces.
//!
//! [`TableSchema`] names the four attributes items are stored under.
//! [`KeystoreConfig`] bundles the schema with the read consistency used by
//! every keyspace read and the argument [`SizeLimits`].
//!
//! Both types deserialize from any serde format and validate themselves on
//! construction.
//!
//! # Example
//!
//! ```
//! use keystore::{KeystoreConfig, ReadConsistency, TableSchema};
//!
//! let schema = TableSchema::builder().key_attribute("item_key").build();
//! let config = KeystoreConfig::builder()
//!     .schema(schema)
//!     .read_consistency(ReadConsistency::Eventual)
//!     .build()?;
//!
//! assert_eq!(config.schema().key_attribute(), "item_key");
//! assert_eq!(config.schema().value_attribute(), "value");
//! # Ok::<(), keystore::ConfigError>(())
//! ```

use serde::{Deserialize, Serialize};

use crate::{backend::ReadConsistency, error::ConfigError, size_limits::SizeLimits};

/// Default partition (keyspace) attribute name.
pub const DEFAULT_PARTITION_ATTRIBUTE: &str = "keyspace";

/// Default key attribute name.
pub const DEFAULT_KEY_ATTRIBUTE: &str = "key";

/// Default value attribute name.
pub const DEFAULT_VALUE_ATTRIBUTE: &str = "value";

/// Default version attribute name.
pub const DEFAULT_VERSION_ATTRIBUTE: &str = "version";

fn default_partition_attribute() -> String {
    DEFAULT_PARTITION_ATTRIBUTE.to_owned()
}

fn default_key_attribute() -> String {
    DEFAULT_KEY_ATTRIBUTE.to_owned()
}

fn default_value_attribute() -> String {
    DEFAULT_VALUE_ATTRIBUTE.to_owned()
}

fn default_version_attribute() -> String {
    DEFAULT_VERSION_ATTRIBUTE.to_owned()
}

/// Attribute names under which items are stored.
///
/// The partition and key attributes together form the table's primary key
/// and hold strings. The value attribute holds a string and the version
/// attribute holds a number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[serde(deny_unknown_fields)]
pub struct TableSchema {
    /// Partition attribute; holds the keyspace name.
    #[serde(default = "default_partition_attribute")]
    #[builder(into, default = default_partition_attribute())]
    partition_attribute: String,

    /// Sort attribute; holds the caller's key.
    #[serde(default = "default_key_attribute")]
    #[builder(into, default = default_key_attribute())]
    key_attribute: String,

    /// Value attribute.
    #[serde(default = "default_value_attribute")]
    #[builder(into, default = default_value_attribute())]
    value_attribute: String,

    /// Version attribute.
    #[serde(default = "default_version_attribute")]
    #[builder(into, default = default_version_attribute())]
    version_attribute: String,
}

impl Default for TableSchema {
    fn default() -> Self {
        Self {
            partition_attribute: default_partition_attribute(),
            key_attribute: default_key_attribute(),
            value_attribute: default_value_attribute(),
            version_attribute: default_version_attribute(),
        }
    }
}

impl TableSchema {
    /// Returns the partition attribute name.
    #[must_use]
    pub fn partition_attribute(&self) -> &str {
        &self.partition_attribute
    }

    /// Returns the key attribute name.
    #[must_use]
    pub fn key_attribute(&self) -> &str {
        &self.key_attribute
    }

    /// Returns the value attribute name.
    #[must_use]
    pub fn value_attribute(&self) -> &str {
        &self.value_attribute
    }

    /// Returns the version attribute name.
    #[must_use]
    pub fn version_attribute(&self) -> &str {
        &self.version_attribute
    }

    /// Checks that every attribute name is non-empty and distinct.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let names = [
            ("partition_attribute", &self.partition_attribute),
            ("key_attribute", &self.key_attribute),
            ("value_attribute", &self.value_attribute),
            ("version_attribute", &self.version_attribute),
        ];

        for (i, &(field, name)) in names.iter().enumerate() {
            if name.is_empty() {
                return Err(ConfigError::Invalid { field, reason: "must not be empty".into() });
            }
            if let Some((other, _)) = names[..i].iter().find(|(_, n)| *n == name) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("'{name}' is already used by {other}"),
                });
            }
        }
        Ok(())
    }
}

/// Configuration shared by every keyspace handed out by a
/// [`Keystore`](crate::Keystore).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawKeystoreConfig")]
pub struct KeystoreConfig {
    schema: TableSchema,
    read_consistency: ReadConsistency,
    size_limits: SizeLimits,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawKeystoreConfig {
    #[serde(default)]
    schema: TableSchema,
    #[serde(default)]
    read_consistency: ReadConsistency,
    #[serde(default)]
    size_limits: SizeLimits,
}

impl TryFrom<RawKeystoreConfig> for KeystoreConfig {
    type Error = ConfigError;

    fn try_from(raw: RawKeystoreConfig) -> Result<Self, Self::Error> {
        Self::builder()
            .schema(raw.schema)
            .read_consistency(raw.read_consistency)
            .size_limits(raw.size_limits)
            .build()
    }
}

#[bon::bon]
impl KeystoreConfig {
    /// Creates a new configuration, validating the schema.
    ///
    /// # Optional Fields
    ///
    /// * `schema` - Attribute names (default: [`TableSchema::default`]).
    /// * `read_consistency` - Consistency of every read (default: [`ReadConsistency::Strong`]).
    /// * `size_limits` - Argument limits (default: [`SizeLimits::default`]).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the schema has empty or duplicate
    /// attribute names.
    #[builder]
    pub fn new(
        #[builder(default)] schema: TableSchema,
        #[builder(default)] read_consistency: ReadConsistency,
        #[builder(default)] size_limits: SizeLimits,
    ) -> Result<Self, ConfigError> {
        schema.validate()?;
        Ok(Self { schema, read_consistency, size_limits })
    }

    /// Re-checks the configuration.
    ///
    /// Configurations built through [`KeystoreConfig::builder`] or
    /// deserialized are already valid; this is for callers that assemble a
    /// schema separately and want the error early.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the schema has empty or duplicate
    /// attribute names.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.schema.validate()
    }

    /// Returns the table schema.
    #[must_use]
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Returns the read consistency used by keyspace reads.
    #[must_use]
    pub fn read_consistency(&self) -> ReadConsistency {
        self.read_consistency
    }

    /// Returns the argument size limits.
    #[must_use]
    pub fn size_limits(&self) -> &SizeLimits {
        &self.size_limits
    }
}
