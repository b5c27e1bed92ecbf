//! Leaf set: the peers numerically closest to the local key
//!
//! Entries are ordered by XOR distance to the local key, read as a
//! big-endian unsigned integer. The set never holds more than `capacity`
//! entries; inserts that overflow it evict the farthest entries first.

use crate::error::{Result, RoutingError};
use crate::key::{xor_distance, Key};
use crate::UPDATE_BATCH_SIZE;
use std::collections::BTreeMap;
use tracing::trace;

/// Bounded, distance-ordered set of entries around a local key
#[derive(Debug, Clone)]
pub struct LeafSet<V> {
    /// Our local key, fixed for the lifetime of the set
    local_key: Key,

    /// Maximum number of entries
    capacity: usize,

    /// Entries keyed by XOR distance to `local_key`.
    ///
    /// XOR against a fixed key is a bijection, so the distance identifies
    /// the entry as uniquely as the key does.
    entries: BTreeMap<Vec<u8>, (Key, V)>,
}

impl<V> LeafSet<V> {
    /// Create an empty leaf set
    pub fn new(local_key: impl Into<Key>, capacity: usize) -> Self {
        LeafSet {
            local_key: local_key.into(),
            capacity,
            entries: BTreeMap::new(),
        }
    }

    /// Create a leaf set holding the `capacity` entries closest to `local_key`
    pub fn with_entries<K, I>(
        local_key: impl Into<Key>,
        capacity: usize,
        entries: I,
    ) -> Result<Self>
    where
        K: AsRef<[u8]>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut set = Self::new(local_key, capacity);
        for (key, value) in entries {
            set.insert_unpruned(key.as_ref(), value)?;
        }
        set.prune();
        Ok(set)
    }

    /// Our local key
    pub fn local_key(&self) -> &Key {
        &self.local_key
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the set is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check if the set is at capacity
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// XOR distance from the local key, or `None` for a key of the wrong length
    pub fn distance_to(&self, key: &[u8]) -> Option<Vec<u8>> {
        (key.len() == self.local_key.len())
            .then(|| xor_distance(self.local_key.as_bytes(), key))
    }

    fn check_len(&self, key: &[u8]) -> Result<()> {
        if key.len() != self.local_key.len() {
            return Err(RoutingError::KeyLength {
                key: Key::from(key),
                expected: self.local_key.len(),
                actual: key.len(),
            });
        }
        Ok(())
    }

    fn insert_unpruned(&mut self, key: &[u8], value: V) -> Result<Option<V>> {
        self.check_len(key)?;
        let distance = xor_distance(self.local_key.as_bytes(), key);
        Ok(self
            .entries
            .insert(distance, (Key::from(key), value))
            .map(|(_, previous)| previous))
    }

    /// Evict the farthest entries until the set fits its capacity
    fn prune(&mut self) {
        while self.entries.len() > self.capacity {
            if let Some((_, (key, _))) = self.entries.pop_last() {
                trace!(key = %key, capacity = self.capacity, "Evicting leaf set entry");
            }
        }
    }

    /// Insert or overwrite `key`, then evict down to capacity.
    ///
    /// Returns the replaced value. The new entry itself may be evicted when
    /// it is farther away than everything already held.
    pub fn insert(&mut self, key: &[u8], value: V) -> Result<Option<V>> {
        let previous = self.insert_unpruned(key, value)?;
        self.prune();
        Ok(previous)
    }

    /// Merge `entries`, keeping only the closest `capacity` overall.
    ///
    /// Entries are staged outside the set and the staging area is cut back
    /// to `capacity` after every batch of `UPDATE_BATCH_SIZE`, so memory stays
    /// bounded however long the input is. A key with the wrong length aborts
    /// the merge before the set is touched.
    pub fn update<K, I>(&mut self, entries: I) -> Result<()>
    where
        K: AsRef<[u8]>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut staged: BTreeMap<Vec<u8>, (Key, V)> = BTreeMap::new();
        let mut pending = 0;
        for (key, value) in entries {
            let key = key.as_ref();
            self.check_len(key)?;
            let distance = xor_distance(self.local_key.as_bytes(), key);
            staged.insert(distance, (Key::from(key), value));

            pending += 1;
            if pending == UPDATE_BATCH_SIZE {
                trace!(batch = pending, staged = staged.len(), "Staged leaf set batch");
                // Anything beyond the closest `capacity` staged entries can
                // never make the final cut
                while staged.len() > self.capacity {
                    staged.pop_last();
                }
                pending = 0;
            }
        }

        // Staged values overwrite held ones at the same distance
        self.entries.append(&mut staged);
        self.prune();
        Ok(())
    }

    /// Get the value at `key`
    pub fn get(&self, key: &[u8]) -> Option<&V> {
        let distance = self.distance_to(key)?;
        self.entries.get(&distance).map(|(_, value)| value)
    }

    /// Get a mutable reference to the value at `key`
    pub fn get_mut(&mut self, key: &[u8]) -> Option<&mut V> {
        let distance = self.distance_to(key)?;
        self.entries.get_mut(&distance).map(|(_, value)| value)
    }

    /// Check whether `key` is held
    pub fn contains(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Remove `key`, returning its value if it was held
    pub fn remove(&mut self, key: &[u8]) -> Option<V> {
        let distance = self.distance_to(key)?;
        self.entries.remove(&distance).map(|(_, value)| value)
    }

    /// Closest entry to the local key
    pub fn closest(&self) -> Option<(&Key, &V)> {
        self.entries.values().next().map(|(key, value)| (key, value))
    }

    /// Farthest entry from the local key
    pub fn farthest(&self) -> Option<(&Key, &V)> {
        self.entries.values().next_back().map(|(key, value)| (key, value))
    }

    /// Remove and return the farthest entry
    pub fn pop_farthest(&mut self) -> Option<(Key, V)> {
        self.entries.pop_last().map(|(_, entry)| entry)
    }

    /// Entries from closest to farthest; `.rev()` walks them farthest first
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&Key, &V)> + ExactSizeIterator + '_ {
        self.entries.values().map(|(key, value)| (key, value))
    }

    /// Keys from closest to farthest
    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &Key> + ExactSizeIterator + '_ {
        self.entries.values().map(|(key, _)| key)
    }

    /// Values from closest to farthest
    pub fn values(&self) -> impl DoubleEndedIterator<Item = &V> + ExactSizeIterator + '_ {
        self.entries.values().map(|(_, value)| value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const LOCAL: [u8; 2] = [0x80, 0x00];

    fn create_test_set(capacity: usize) -> LeafSet<u32> {
        LeafSet::new(&LOCAL, capacity)
    }

    #[test]
    fn test_empty_set() {
        let set = create_test_set(8);
        assert!(set.is_empty());
        assert!(!set.is_full());
        assert_eq!(set.len(), 0);
        assert_eq!(set.capacity(), 8);
        assert_eq!(set.local_key(), &Key::from(&LOCAL));
        assert!(set.closest().is_none());
    }

    #[test]
    fn test_insert_and_get() {
        let mut set = create_test_set(8);
        assert_eq!(set.insert(&[0x80, 0x01], 1).unwrap(), None);
        assert_eq!(set.insert(&[0x80, 0x01], 2).unwrap(), Some(1));

        assert_eq!(set.get(&[0x80, 0x01]), Some(&2));
        assert!(set.contains(&[0x80, 0x01]));
        assert!(!set.contains(&[0x80, 0x02]));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_wrong_length() {
        let mut set = create_test_set(8);
        let err = set.insert(&[0x80], 1).unwrap_err();
        assert_eq!(
            err,
            RoutingError::KeyLength {
                key: Key::from(&[0x80u8]),
                expected: 2,
                actual: 1,
            }
        );
        assert!(set.is_empty());
        assert_eq!(set.get(&[0x80, 0x00, 0x00]), None);
        assert_eq!(set.remove(&[0x80]), None);
    }

    #[test]
    fn test_orders_by_xor_distance() {
        let mut set = create_test_set(8);
        set.insert(&[0x00, 0x00], 3).unwrap(); // distance 0x8000
        set.insert(&[0x80, 0xff], 2).unwrap(); // distance 0x00ff
        set.insert(&[0x80, 0x01], 1).unwrap(); // distance 0x0001
        set.insert(&[0xff, 0xff], 4).unwrap(); // distance 0x7fff

        let values: Vec<u32> = set.values().copied().collect();
        assert_eq!(values, vec![1, 2, 4, 3]);

        let reversed: Vec<u32> = set.values().rev().copied().collect();
        assert_eq!(reversed, vec![3, 4, 2, 1]);

        assert_eq!(set.closest().map(|(_, v)| *v), Some(1));
        assert_eq!(set.farthest().map(|(_, v)| *v), Some(3));
        assert_eq!(set.distance_to(&[0x80, 0xff]), Some(vec![0x00, 0xff]));
    }

    #[test]
    fn test_evicts_farthest() {
        let mut set = create_test_set(2);
        set.insert(&[0x80, 0x10], 1).unwrap();
        set.insert(&[0x80, 0x20], 2).unwrap();
        assert!(set.is_full());

        // Closer than both: pushes out the farthest
        set.insert(&[0x80, 0x01], 3).unwrap();
        assert_eq!(set.len(), 2);
        assert!(!set.contains(&[0x80, 0x20]));

        // Farther than both: evicted immediately
        set.insert(&[0x00, 0x00], 4).unwrap();
        assert_eq!(set.len(), 2);
        assert!(!set.contains(&[0x00, 0x00]));

        let keys: Vec<Key> = set.keys().cloned().collect();
        assert_eq!(keys, vec![Key::from(&[0x80u8, 0x01]), Key::from(&[0x80u8, 0x10])]);
    }

    #[test]
    fn test_with_entries_keeps_closest() {
        let entries = (0u8..20).map(|i| ([0x80, i], u32::from(i)));
        let set = LeafSet::with_entries(&LOCAL, 4, entries).unwrap();

        assert_eq!(set.len(), 4);
        let values: Vec<u32> = set.values().copied().collect();
        assert_eq!(values, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_update_in_batches() {
        let mut set = create_test_set(8);
        let entries = (0..2000u32).map(|i| {
            let bytes = (i as u16).to_be_bytes();
            (bytes, i)
        });
        set.update(entries).unwrap();

        assert_eq!(set.len(), 8);
        // Every offered key has the top bit clear, so distance grows with the key
        let closest = set.closest().map(|(k, _)| k.clone()).unwrap();
        let farthest = set.farthest().map(|(k, _)| k.clone()).unwrap();
        assert_eq!(closest, Key::from(&[0x00u8, 0x00]));
        assert_eq!(farthest, Key::from(&[0x00u8, 0x07]));
    }

    #[test]
    fn test_update_bad_key_leaves_set_untouched() {
        let mut set = create_test_set(1);
        let entries: Vec<(Vec<u8>, u32)> = vec![(vec![0x80, 0x01], 1), (vec![0x80], 2)];
        assert!(matches!(
            set.update(entries),
            Err(RoutingError::KeyLength { expected: 2, actual: 1, .. })
        ));
        assert!(set.is_empty());

        set.insert(&[0x80, 0x04], 4).unwrap();
        let entries: Vec<(Vec<u8>, u32)> = vec![
            (vec![0x80, 0x01], 1),
            (vec![0x80, 0x02], 2),
            (vec![0x80], 3),
        ];
        assert!(set.update(entries).is_err());
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(&[0x80, 0x04]), Some(&4));
    }

    #[test]
    fn test_update_bad_key_in_later_batch() {
        let mut set = create_test_set(4);
        let mut entries: Vec<(Vec<u8>, u32)> = (0..UPDATE_BATCH_SIZE as u32 + 10)
            .map(|i| ((i as u16).to_be_bytes().to_vec(), i))
            .collect();
        entries.push((vec![0x00], 0));

        assert!(set.update(entries).is_err());
        assert!(set.is_empty());
    }

    #[test]
    fn test_update_overwrites_held_value() {
        let mut set = create_test_set(2);
        set.insert(&[0x80, 0x01], 1).unwrap();
        set.insert(&[0x80, 0x02], 2).unwrap();

        set.update(vec![([0x80, 0x01], 10), ([0x80, 0x03], 30)]).unwrap();
        let held: Vec<(Key, u32)> = set.iter().map(|(k, v)| (k.clone(), *v)).collect();
        assert_eq!(
            held,
            vec![(Key::from(&[0x80u8, 0x01]), 10), (Key::from(&[0x80u8, 0x02]), 2)]
        );
    }

    #[test]
    fn test_remove_and_pop() {
        let mut set = create_test_set(8);
        set.insert(&[0x80, 0x01], 1).unwrap();
        set.insert(&[0x80, 0x02], 2).unwrap();

        assert_eq!(set.remove(&[0x80, 0x01]), Some(1));
        assert_eq!(set.remove(&[0x80, 0x01]), None);

        assert_eq!(set.pop_farthest(), Some((Key::from(&[0x80u8, 0x02]), 2)));
        assert!(set.is_empty());
    }

    #[test]
    fn test_get_mut_and_clear() {
        let mut set = create_test_set(8);
        set.insert(&[0x80, 0x01], 1).unwrap();
        if let Some(value) = set.get_mut(&[0x80, 0x01]) {
            *value = 10;
        }
        assert_eq!(set.get(&[0x80, 0x01]), Some(&10));

        set.clear();
        assert!(set.is_empty());
    }

    proptest! {
        #[test]
        fn prop_holds_closest_entries(
            capacity in 1usize..8,
            keys in proptest::collection::vec(any::<[u8; 2]>(), 0..64),
        ) {
            let mut set = LeafSet::new(&LOCAL, capacity);
            let mut model = std::collections::BTreeSet::new();

            for key in &keys {
                set.insert(key, ()).unwrap();
                model.insert(xor_distance(&LOCAL, key));
                prop_assert!(set.len() <= capacity);
            }

            let expected: Vec<Vec<u8>> = model.into_iter().take(capacity).collect();
            let held: Vec<Vec<u8>> = set
                .keys()
                .map(|key| xor_distance(&LOCAL, key.as_bytes()))
                .collect();
            prop_assert_eq!(held, expected);
        }
    }
}
