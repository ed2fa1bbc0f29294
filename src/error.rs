//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// A null key, or a null value where null values are disallowed
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The store could not set up its internals (e.g. the sweep thread)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    pub(crate) fn null_key() -> Self {
        CacheError::InvalidArgument("key must not be null".to_string())
    }

    pub(crate) fn null_value() -> Self {
        CacheError::InvalidArgument(
            "value must not be null when null values are not allowed".to_string(),
        )
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
