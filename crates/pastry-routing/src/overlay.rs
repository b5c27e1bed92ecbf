//! Overlay façade combining the leaf set and the routing table

use crate::config::OverlayConfig;
use crate::error::{Result, RoutingError};
use crate::key::Key;
use crate::leaf_set::LeafSet;
use crate::peer::Peer;
use crate::routing_table::RoutingTable;
use tracing::debug;

/// Routing state of one overlay node.
///
/// Every entry is written to both the routing table and the leaf set; the
/// leaf set may then evict it if it is not among the closest to the local
/// key. Lookups try the leaf set first, `route` uses the routing table only.
#[derive(Debug, Clone)]
pub struct Overlay<V> {
    config: OverlayConfig,
    routing_table: RoutingTable<V>,
    leaf_set: LeafSet<V>,
}

impl<V: Clone> Overlay<V> {
    /// Create an empty overlay around `local_key`
    pub fn new(local_key: impl Into<Key>, config: OverlayConfig) -> Result<Self> {
        config.validate()?;

        let local_key = local_key.into();
        if local_key.len() != config.hash_len {
            return Err(RoutingError::KeyLength {
                expected: config.hash_len,
                actual: local_key.len(),
                key: local_key,
            });
        }

        Ok(Overlay {
            routing_table: RoutingTable::new(config.hash_len),
            leaf_set: LeafSet::new(local_key, config.leaf_capacity),
            config,
        })
    }

    /// Create an overlay pre-loaded with peers
    pub fn with_peers<K, I>(
        local_key: impl Into<Key>,
        config: OverlayConfig,
        peers: I,
    ) -> Result<Self>
    where
        K: AsRef<[u8]>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut overlay = Self::new(local_key, config)?;
        overlay.update(peers)?;
        Ok(overlay)
    }

    /// Construction parameters
    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    /// Our local key
    pub fn local_key(&self) -> &Key {
        self.leaf_set.local_key()
    }

    /// The prefix-trie routing table
    pub fn routing_table(&self) -> &RoutingTable<V> {
        &self.routing_table
    }

    /// The leaf set
    pub fn leaf_set(&self) -> &LeafSet<V> {
        &self.leaf_set
    }

    /// Number of known peers
    pub fn len(&self) -> usize {
        self.routing_table.len()
    }

    /// Check if no peer is known
    pub fn is_empty(&self) -> bool {
        self.routing_table.is_empty()
    }

    /// Check whether `key` is known
    pub fn contains(&self, key: &[u8]) -> bool {
        self.routing_table.contains(key)
    }

    fn check_len(&self, key: &[u8]) -> Result<()> {
        if key.len() != self.config.hash_len {
            return Err(RoutingError::KeyLength {
                key: Key::from(key),
                expected: self.config.hash_len,
                actual: key.len(),
            });
        }
        Ok(())
    }

    /// Store `value` under `key` in both structures.
    ///
    /// Returns the value the routing table held before.
    pub fn set(&mut self, key: &[u8], value: V) -> Result<Option<V>> {
        self.check_len(key)?;

        let previous = self.routing_table.set(key, value.clone())?;
        self.leaf_set.insert(key, value)?;
        debug!(
            key = %hex::encode(key),
            in_leaf_set = self.leaf_set.contains(key),
            "Stored peer"
        );
        Ok(previous)
    }

    /// Store every peer in `peers`.
    ///
    /// All keys are checked first, so a bad key leaves the overlay untouched.
    pub fn update<K, I>(&mut self, peers: I) -> Result<()>
    where
        K: AsRef<[u8]>,
        I: IntoIterator<Item = (K, V)>,
    {
        // Buffered whole: the routing table keeps every entry anyway, and the
        // leaf set still stages and trims its copy in bounded batches.
        let peers: Vec<(K, V)> = peers.into_iter().collect();
        for (key, _) in &peers {
            self.check_len(key.as_ref())?;
        }

        self.routing_table.update(peers.iter().map(|(key, value)| {
            let key: &[u8] = key.as_ref();
            (key, value.clone())
        }))?;
        self.leaf_set.update(peers)?;
        debug!(
            peers = self.routing_table.len(),
            leaf_set = self.leaf_set.len(),
            "Merged peers"
        );
        Ok(())
    }

    /// Find the value stored at exactly `key`, leaf set first
    pub fn lookup(&self, key: &[u8]) -> Result<&V> {
        if let Some(value) = self.leaf_set.get(key) {
            return Ok(value);
        }
        self.routing_table.get(key)
    }

    /// Value nearest to `key` in the routing table
    pub fn nearest(&self, key: &[u8]) -> Result<&V> {
        self.routing_table.nearest(key)
    }

    /// Remove `key` from both structures.
    ///
    /// Fails without touching the leaf set when the routing table does not
    /// hold `key`.
    pub fn delete(&mut self, key: &[u8]) -> Result<V> {
        let value = self.routing_table.delete(key)?;
        let was_leaf = self.leaf_set.remove(key).is_some();
        debug!(key = %hex::encode(key), was_leaf, "Removed peer");
        Ok(value)
    }

    /// Up to `n` forwarding candidates for `key`, best first
    pub fn route(&self, key: &[u8], n: usize) -> Result<Vec<&V>> {
        Ok(self.routing_table.route(key)?.take(n).collect())
    }

    /// Forwarding candidates for `key`, limited by the configured route limit
    pub fn next_hops(&self, key: &[u8]) -> Result<Vec<&V>> {
        self.route(key, self.config.route_limit)
    }

    /// Forget every peer
    pub fn clear(&mut self) {
        self.routing_table.clear();
        self.leaf_set.clear();
    }
}

impl<E: Clone> Overlay<Peer<E>> {
    /// Feed an operation outcome back into the peer stored at `key`.
    ///
    /// Both stored copies are updated. Returns the new score.
    pub fn rate(&mut self, key: &[u8], delta: i64) -> Result<f64> {
        let peer = self.routing_table.get_mut(key)?;
        peer.rate(delta);
        let score = peer.score();

        if let Some(peer) = self.leaf_set.get_mut(key) {
            peer.rate(delta);
        }
        Ok(score)
    }
}
