//! Entry point owning a backend and handing out keyspaces.

use std::sync::Arc;

use tracing::debug;

use crate::{
    backend::ItemBackend,
    config::KeystoreConfig,
    error::{KeystoreError, KeystoreResult},
    keyspace::Keyspace,
};

/// A shared table, viewed as a set of named keyspaces.
///
/// Every keyspace obtained from the same `Keystore` shares its backend and
/// configuration.
///
/// # Example
///
/// ```
/// use keystore::{Keystore, MemoryBackend, Version};
///
/// #[tokio::main]
/// async fn main() -> Result<(), keystore::KeystoreError> {
///     let store = Keystore::new(MemoryBackend::new());
///     let sessions = store.keyspace("sessions")?;
///
///     assert!(sessions.add("abc", "alice").await?);
///     assert!(!sessions.add("abc", "bob").await?);
///
///     let entry = sessions.gets("abc").await?.expect("entry was just added");
///     assert_eq!(entry.version(), Version::of("alice"));
///     assert!(sessions.check_and_set("abc", "bob", entry.version()).await?);
///     Ok(())
/// }
/// ```
pub struct Keystore<B> {
    backend: Arc<B>,
    config: Arc<KeystoreConfig>,
}

impl<B> Clone for Keystore<B> {
    fn clone(&self) -> Self {
        Self { backend: Arc::clone(&self.backend), config: Arc::clone(&self.config) }
    }
}

impl<B> std::fmt::Debug for Keystore<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keystore").field("config", &self.config).finish_non_exhaustive()
    }
}

impl<B: ItemBackend> Keystore<B> {
    /// Creates a keystore with the default configuration.
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, KeystoreConfig::default())
    }

    /// Creates a keystore with an explicit configuration.
    #[must_use]
    pub fn with_config(backend: B, config: KeystoreConfig) -> Self {
        Self::from_shared(Arc::new(backend), config)
    }

    /// Creates a keystore over a backend that is already shared.
    #[must_use]
    pub fn from_shared(backend: Arc<B>, config: KeystoreConfig) -> Self {
        Self { backend, config: Arc::new(config) }
    }

    /// Returns a view of the partition called `name`.
    ///
    /// Keyspaces are not provisioned: any non-empty name is valid and a
    /// keyspace with no items is simply empty.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoreError::InvalidArgument`] if `name` is empty.
    pub fn keyspace(&self, name: &str) -> KeystoreResult<Keyspace<B>> {
        if name.is_empty() {
            return Err(KeystoreError::invalid_argument("keyspace name must not be empty"));
        }
        debug!(keyspace = name, "opening keyspace");
        Ok(Keyspace::new(Arc::from(name), Arc::clone(&self.config), Arc::clone(&self.backend)))
    }

    /// Returns the configuration shared by every keyspace.
    #[must_use]
    pub fn config(&self) -> &KeystoreConfig {
        &self.config
    }

    /// Returns the underlying backend.
    #[must_use]
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Returns the partition attribute name.
    #[must_use]
    pub fn partition_attribute(&self) -> &str {
        self.config.schema().partition_attribute()
    }

    /// Returns the key attribute name.
    #[must_use]
    pub fn key_attribute(&self) -> &str {
        self.config.schema().key_attribute()
    }

    /// Returns the value attribute name.
    #[must_use]
    pub fn value_attribute(&self) -> &str {
        self.config.schema().value_attribute()
    }

    /// Returns the version attribute name.
    #[must_use]
    pub fn version_attribute(&self) -> &str {
        self.config.schema().version_attribute()
    }
}
