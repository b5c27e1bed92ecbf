//! Overlay behind a single async read-write lock
//!
//! Writers hold the lock across both substructures, so readers never see a
//! peer present in one and missing from the other.

use crate::error::Result;
use crate::key::Key;
use crate::overlay::Overlay;
use crate::peer::Peer;
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Cloneable handle to an overlay shared between tasks
#[derive(Debug)]
pub struct SharedOverlay<V> {
    inner: Arc<RwLock<Overlay<V>>>,
}

impl<V> Clone for SharedOverlay<V> {
    fn clone(&self) -> Self {
        SharedOverlay {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: Clone> SharedOverlay<V> {
    /// Wrap an overlay
    pub fn new(overlay: Overlay<V>) -> Self {
        SharedOverlay {
            inner: Arc::new(RwLock::new(overlay)),
        }
    }

    /// Shared access for several reads against one consistent state
    pub async fn read(&self) -> RwLockReadGuard<'_, Overlay<V>> {
        self.inner.read().await
    }

    /// Exclusive access for compound updates
    pub async fn write(&self) -> RwLockWriteGuard<'_, Overlay<V>> {
        self.inner.write().await
    }

    /// Store a peer
    pub async fn insert(&self, key: &[u8], value: V) -> Result<Option<V>> {
        self.inner.write().await.set(key, value)
    }

    /// Store many peers
    pub async fn update(&self, peers: Vec<(Key, V)>) -> Result<()> {
        self.inner.write().await.update(peers)
    }

    /// Remove a peer
    pub async fn remove(&self, key: &[u8]) -> Result<V> {
        self.inner.write().await.delete(key)
    }

    /// Exact lookup, leaf set first
    pub async fn lookup(&self, key: &[u8]) -> Result<V> {
        self.inner.read().await.lookup(key).cloned()
    }

    /// Nearest entry in the routing table
    pub async fn nearest(&self, key: &[u8]) -> Result<V> {
        self.inner.read().await.nearest(key).cloned()
    }

    /// Up to `n` ranked forwarding candidates
    pub async fn route(&self, key: &[u8], n: usize) -> Result<Vec<V>> {
        let overlay = self.inner.read().await;
        let candidates = overlay.route(key, n)?;
        Ok(candidates.into_iter().cloned().collect())
    }

    /// Check whether `key` is known
    pub async fn contains(&self, key: &[u8]) -> bool {
        self.inner.read().await.contains(key)
    }

    /// Number of known peers
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if no peer is known
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

impl<E: Clone> SharedOverlay<Peer<E>> {
    /// Feed an operation outcome back into a stored peer
    pub async fn rate(&self, key: &[u8], delta: i64) -> Result<f64> {
        self.inner.write().await.rate(key, delta)
    }
}
