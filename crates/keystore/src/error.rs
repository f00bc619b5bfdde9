//! Error types and result aliases.
//!
//! Two layers of errors exist:
//!
//! - [`StorageError`] is what an [`ItemBackend`](crate::ItemBackend) reports. Backends map their
//!   native failures onto these variants. A failed conditional predicate is reported as
//!   [`StorageError::ConditionFailed`] and nothing else.
//! - [`KeystoreError`] is what a [`Keyspace`](crate::Keyspace) operation returns. It carries
//!   either a contract violation ([`KeystoreError::InvalidArgument`]) or a backend failure that is
//!   passed through unchanged.
//!
//! A keyspace never surfaces `ConditionFailed`: compare-and-swap style operations turn it into a
//! `false` return.
//!
//! # Example
//!
//! ```
//! use keystore::{KeystoreError, StorageError};
//!
//! let err = KeystoreError::from(StorageError::timeout());
//! assert!(err.is_transient());
//! ```

use std::sync::Arc;

use thiserror::Error;

/// A boxed error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for backend operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for keyspace operations.
pub type KeystoreResult<T> = Result<T, KeystoreError>;

/// Errors that a storage backend can produce.
///
/// Backend implementations map their internal error types to these variants.
/// Errors preserve their source chain via `#[source]`.
///
/// # Non-exhaustive
///
/// New variants may be added in minor releases. Downstream match expressions
/// must include a wildcard arm.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// The conditional predicate attached to a write or delete did not hold.
    ///
    /// The item was left untouched.
    #[error("Conditional check failed")]
    ConditionFailed,

    /// Connection or network error.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
        /// The underlying error that caused this connection failure.
        #[source]
        source: Option<BoxError>,
    },

    /// The backend rejected the request because of rate or capacity limits.
    #[error("Request throttled: {message}")]
    Throttled {
        /// Description supplied by the backend.
        message: String,
    },

    /// A stored item could not be decoded, or a request could not be encoded.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the serialization error.
        message: String,
        /// The underlying error that caused serialization to fail.
        #[source]
        source: Option<BoxError>,
    },

    /// Internal storage backend error.
    ///
    /// Catch-all for backend-specific errors that don't fit other categories.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
        /// The underlying error that caused this internal failure.
        #[source]
        source: Option<BoxError>,
    },

    /// Operation timed out.
    #[error("Operation timeout")]
    Timeout,
}

impl StorageError {
    /// Creates a new `ConditionFailed` error.
    #[must_use]
    pub fn condition_failed() -> Self {
        Self::ConditionFailed
    }

    /// Creates a new `Connection` error with the given message.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection { message: message.into(), source: None }
    }

    /// Creates a new `Connection` error with a message and source error.
    #[must_use]
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Throttled` error.
    #[must_use]
    pub fn throttled(message: impl Into<String>) -> Self {
        Self::Throttled { message: message.into() }
    }

    /// Creates a new `Serialization` error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization { message: message.into(), source: None }
    }

    /// Creates a new `Serialization` error with a message and source error.
    #[must_use]
    pub fn serialization_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Serialization { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Internal` error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    /// Creates a new `Internal` error with a message and source error.
    #[must_use]
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Internal { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Timeout` error.
    #[must_use]
    pub fn timeout() -> Self {
        Self::Timeout
    }

    /// Returns `true` if retrying the same request might succeed.
    ///
    /// `ConditionFailed` is never transient: the stored state must change
    /// before the same predicate can hold.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Throttled { .. } | Self::Timeout)
    }
}

/// Errors returned by [`Keyspace`](crate::Keyspace) operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KeystoreError {
    /// The caller broke the operation's argument contract.
    ///
    /// Raised before any backend request is issued.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// What was wrong with the argument.
        message: String,
    },

    /// The backend failed for a reason other than a conditional predicate.
    #[error(transparent)]
    Backend(#[from] StorageError),
}

impl KeystoreError {
    /// Creates a new `InvalidArgument` error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument { message: message.into() }
    }

    /// Returns `true` if the underlying backend failure is transient.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::InvalidArgument { .. } => false,
            Self::Backend(err) => err.is_transient(),
        }
    }
}

/// Errors raised while building or validating configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// A numeric setting is below its allowed minimum.
    #[error("{field} must be at least {min}, got {value}")]
    BelowMinimum {
        /// Name of the offending field.
        field: &'static str,
        /// Minimum accepted value.
        min: String,
        /// Value that was supplied.
        value: String,
    },

    /// A setting is malformed.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}
