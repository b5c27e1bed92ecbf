//! Remote peer identity and reliability scoring

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use tracing::debug;

/// A remote endpoint together with its observed reliability.
///
/// Equality and hashing look only at the endpoint. Use [`Peer::cmp_score`]
/// to order peers by reliability.
#[derive(Clone, Serialize, Deserialize)]
pub struct Peer<E> {
    /// Opaque endpoint (address/port or similar), fixed for the entry's lifetime
    endpoint: E,

    /// Operations recorded so far
    operations: u64,

    /// Failed operations among `operations`
    failures: u64,
}

impl<E> Peer<E> {
    /// Score reported until enough operations have been observed
    pub const NEUTRAL_SCORE: f64 = 0.85;

    /// Operations needed before the score reflects history
    pub const MIN_RATED_OPERATIONS: u64 = 10;

    /// Counters are rescaled once operations exceed this
    pub const RESCALE_THRESHOLD: u64 = 10_000;

    /// Operation count after rescaling
    pub const RESCALE_BASE: u64 = 100;

    /// Create a peer with no history
    pub fn new(endpoint: E) -> Self {
        Self::with_operations(endpoint, 0)
    }

    /// Create a peer credited with `operations` successful operations
    pub fn with_operations(endpoint: E, operations: u64) -> Self {
        Peer {
            endpoint,
            operations,
            failures: 0,
        }
    }

    /// The endpoint this peer is reached at
    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    /// Operations recorded (after any rescaling)
    pub fn operations(&self) -> u64 {
        self.operations
    }

    /// Failures recorded (after any rescaling)
    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Reliability in [0, 1]
    pub fn score(&self) -> f64 {
        if self.operations < Self::MIN_RATED_OPERATIONS {
            return Self::NEUTRAL_SCORE;
        }
        1.0 - self.failures as f64 / self.operations as f64
    }

    /// Record `|delta|` operations; negative deltas count as failures.
    pub fn rate(&mut self, delta: i64) {
        let magnitude = delta.unsigned_abs();
        self.operations = self.operations.saturating_add(magnitude);
        if delta < 0 {
            self.failures = self.failures.saturating_add(magnitude);
        }

        if self.operations > Self::RESCALE_THRESHOLD {
            let ratio = self.failures as f64 / self.operations as f64;
            let failures = (ratio * Self::RESCALE_BASE as f64).round() as u64;
            debug!(
                operations = self.operations,
                failures = self.failures,
                rescaled_failures = failures,
                "Rescaling peer history"
            );
            self.failures = failures;
            self.operations = Self::RESCALE_BASE;
        }
    }

    /// Compare two peers by score
    pub fn cmp_score(&self, other: &Self) -> Ordering {
        self.score().total_cmp(&other.score())
    }

    /// Consume the peer, returning its endpoint
    pub fn into_endpoint(self) -> E {
        self.endpoint
    }
}

impl<E: PartialEq> PartialEq for Peer<E> {
    fn eq(&self, other: &Self) -> bool {
        self.endpoint == other.endpoint
    }
}

impl<E: Eq> Eq for Peer<E> {}

impl<E: Hash> Hash for Peer<E> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.endpoint.hash(state);
    }
}

impl<E: fmt::Debug> fmt::Debug for Peer<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Peer({:?})", self.endpoint)
    }
}
