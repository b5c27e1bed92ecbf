//! Routing error types

use crate::key::Key;
use thiserror::Error;

/// Routing-specific errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    #[error("Key length mismatch for {key}: expected {expected} bytes, got {actual}")]
    KeyLength {
        key: Key,
        expected: usize,
        actual: usize,
    },

    #[error("Key too long: {key} exceeds {max} bytes")]
    KeyTooLong { key: Key, max: usize },

    #[error("Key not found: {key} (longest matched prefix {matched:?})")]
    KeyNotFound { key: Key, matched: Key },

    #[error("No nearest entry for key {key}")]
    NoNearest { key: Key },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),
}

impl RoutingError {
    /// Whether this error means the key is simply absent
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RoutingError::KeyNotFound { .. } | RoutingError::NoNearest { .. }
        )
    }
}

/// Result type for routing operations
pub type Result<T> = std::result::Result<T, RoutingError>;
