//! Overlay construction parameters

use crate::error::{Result, RoutingError};
use crate::{DEFAULT_HASH_LEN, DEFAULT_LEAF_CAPACITY, DEFAULT_ROUTE_LIMIT};
use serde::{Deserialize, Serialize};

/// Parameters fixed when an overlay is built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Key length in bytes (trie depth)
    pub hash_len: usize,

    /// Maximum number of peers held in the leaf set
    pub leaf_capacity: usize,

    /// Default number of candidates returned by `route`
    pub route_limit: usize,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        OverlayConfig {
            hash_len: DEFAULT_HASH_LEN,
            leaf_capacity: DEFAULT_LEAF_CAPACITY,
            route_limit: DEFAULT_ROUTE_LIMIT,
        }
    }
}

impl OverlayConfig {
    /// Config with a custom key length and default capacities
    pub fn with_hash_len(hash_len: usize) -> Self {
        OverlayConfig {
            hash_len,
            ..Default::default()
        }
    }

    /// Check that every parameter is usable
    pub fn validate(&self) -> Result<()> {
        if self.hash_len == 0 {
            return Err(RoutingError::InvalidConfig(
                "hash_len must be at least 1".to_string(),
            ));
        }
        if self.leaf_capacity == 0 {
            return Err(RoutingError::InvalidConfig(
                "leaf_capacity must be at least 1".to_string(),
            ));
        }
        if self.route_limit == 0 {
            return Err(RoutingError::InvalidConfig(
                "route_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
