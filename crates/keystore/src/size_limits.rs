//! Key and value validation.
//!
//! Every keyspace operation checks its arguments against a [`SizeLimits`]
//! before issuing a backend request. A violation is an
//! [`InvalidArgument`](crate::KeystoreError::InvalidArgument) error and no
//! request is sent.
//!
//! # Defaults
//!
//! | Limit | Default |
//! |-------|---------|
//! | `max_key_size` | 1024 bytes |
//! | `max_value_size` | 409 600 bytes (400 KiB) |

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, KeystoreError, KeystoreResult};

/// Default maximum key size in bytes (1 KiB).
pub const DEFAULT_MAX_KEY_SIZE: usize = 1024;

/// Default maximum value size in bytes (400 KiB).
pub const DEFAULT_MAX_VALUE_SIZE: usize = 400 * 1024;

/// Configurable size limits for keys and values.
///
/// Both limits must be at least 1. Use [`SizeLimits::default`] for the
/// standard limits, or construct with custom values.
///
/// # Example
///
/// ```
/// use keystore::SizeLimits;
///
/// let limits = SizeLimits::new(256, 1024 * 1024).unwrap();
/// assert_eq!(limits.max_key_size(), 256);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSizeLimits")]
pub struct SizeLimits {
    max_key_size: usize,
    max_value_size: usize,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSizeLimits {
    #[serde(default = "default_max_key_size")]
    max_key_size: usize,
    #[serde(default = "default_max_value_size")]
    max_value_size: usize,
}

fn default_max_key_size() -> usize {
    DEFAULT_MAX_KEY_SIZE
}

fn default_max_value_size() -> usize {
    DEFAULT_MAX_VALUE_SIZE
}

impl TryFrom<RawSizeLimits> for SizeLimits {
    type Error = ConfigError;

    fn try_from(raw: RawSizeLimits) -> Result<Self, Self::Error> {
        Self::new(raw.max_key_size, raw.max_value_size)
    }
}

impl SizeLimits {
    /// Creates size limits with the given bounds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BelowMinimum`] if either limit is zero.
    pub fn new(max_key_size: usize, max_value_size: usize) -> Result<Self, ConfigError> {
        if max_key_size == 0 {
            return Err(ConfigError::BelowMinimum {
                field: "max_key_size",
                min: "1".into(),
                value: "0".into(),
            });
        }
        if max_value_size == 0 {
            return Err(ConfigError::BelowMinimum {
                field: "max_value_size",
                min: "1".into(),
                value: "0".into(),
            });
        }
        Ok(Self { max_key_size, max_value_size })
    }

    /// Returns the maximum allowed key size in bytes.
    #[must_use]
    pub fn max_key_size(&self) -> usize {
        self.max_key_size
    }

    /// Returns the maximum allowed value size in bytes.
    #[must_use]
    pub fn max_value_size(&self) -> usize {
        self.max_value_size
    }
}

impl Default for SizeLimits {
    fn default() -> Self {
        Self { max_key_size: DEFAULT_MAX_KEY_SIZE, max_value_size: DEFAULT_MAX_VALUE_SIZE }
    }
}

/// Validates a key: it must be non-empty and within `max_key_size` bytes.
///
/// The empty key is refused even though a keyspace could otherwise store
/// it, so every keyspace operation (including an unconditional `set`) fails
/// with `InvalidArgument` for `""`. Tables keyed by a composite primary key
/// reject empty sort key values as well.
///
/// # Errors
///
/// Returns [`KeystoreError::InvalidArgument`] naming the violated rule.
pub fn validate_key(key: &str, limits: &SizeLimits) -> KeystoreResult<()> {
    if key.is_empty() {
        return Err(KeystoreError::invalid_argument("key must not be empty"));
    }
    if key.len() > limits.max_key_size {
        return Err(KeystoreError::invalid_argument(format!(
            "key is {} bytes, limit is {}",
            key.len(),
            limits.max_key_size
        )));
    }
    Ok(())
}

/// Validates a key/value pair for a write.
///
/// Empty values are allowed.
///
/// # Errors
///
/// Returns [`KeystoreError::InvalidArgument`] naming the violated rule.
pub fn validate_entry(key: &str, value: &str, limits: &SizeLimits) -> KeystoreResult<()> {
    validate_key(key, limits)?;
    if value.len() > limits.max_value_size {
        return Err(KeystoreError::invalid_argument(format!(
            "value is {} bytes, limit is {}",
            value.len(),
            limits.max_value_size
        )));
    }
    Ok(())
}
