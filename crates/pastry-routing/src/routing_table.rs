//! Prefix-trie routing table
//!
//! Keys are fixed-length byte strings read one digit (byte) per level, so
//! the trie is 256-ary and every populated leaf sits at depth `hash_len`.
//! Branches that lose their last child are pruned in the same call, and a
//! side index of leaf keys is updated alongside the trie so membership
//! checks never walk it.
//!
//! Nearest-key lookups and `route` use a greedy per-digit search: at each
//! level the child equal to the target digit wins, then `d-1`, `d+1`,
//! `d-2`, `d+2` and so on. This is a prefix heuristic, not the global
//! minimum of integer distance over the whole key.

use crate::error::{Result, RoutingError};
use crate::key::{pad_key, Key};
use std::collections::btree_map::{self, BTreeMap};
use std::collections::HashSet;
use std::iter::{Peekable, Rev};
use std::ops::Bound;

type Children<V> = BTreeMap<u8, Node<V>>;

#[derive(Debug, Clone)]
enum Node<V> {
    Branch(Children<V>),
    Leaf(V),
}

/// Where a descent through the trie stopped
enum Position<'a, V> {
    Branch(&'a Children<V>),
    Leaf(&'a V),
}

impl<V> Clone for Position<'_, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V> Copy for Position<'_, V> {}

impl<'a, V> Position<'a, V> {
    fn from_node(node: &'a Node<V>) -> Self {
        match node {
            Node::Branch(children) => Position::Branch(children),
            Node::Leaf(value) => Position::Leaf(value),
        }
    }
}

/// Children of one branch in greedy nearest-digit order.
///
/// Walks outward from the target digit, preferring the smaller digit when
/// two candidates are equally far away.
struct NearestFirst<'a, V> {
    digit: u8,
    below: Peekable<Rev<btree_map::Range<'a, u8, Node<V>>>>,
    above: Peekable<btree_map::Range<'a, u8, Node<V>>>,
}

impl<'a, V> NearestFirst<'a, V> {
    fn new(children: &'a Children<V>, digit: u8) -> Self {
        NearestFirst {
            digit,
            below: children.range(..=digit).rev().peekable(),
            above: children
                .range((Bound::Excluded(digit), Bound::Unbounded))
                .peekable(),
        }
    }
}

impl<'a, V> Iterator for NearestFirst<'a, V> {
    type Item = (u8, &'a Node<V>);

    fn next(&mut self) -> Option<Self::Item> {
        let take_below = match (self.below.peek(), self.above.peek()) {
            (Some((&lo, _)), Some((&hi, _))) => self.digit - lo <= hi - self.digit,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => return None,
        };

        let next = if take_below {
            self.below.next()
        } else {
            self.above.next()
        };
        next.map(|(&digit, node)| (digit, node))
    }
}

/// Prefix-trie routing table over fixed-length keys
#[derive(Debug, Clone)]
pub struct RoutingTable<V> {
    /// Key length in bytes
    hash_len: usize,

    /// Children of the trie root
    root: Children<V>,

    /// Every key with a leaf in the trie
    keys: HashSet<Key>,
}

impl<V> RoutingTable<V> {
    /// Create an empty routing table for `hash_len`-byte keys
    pub fn new(hash_len: usize) -> Self {
        RoutingTable {
            hash_len,
            root: BTreeMap::new(),
            keys: HashSet::new(),
        }
    }

    /// Create a routing table pre-loaded with entries
    pub fn with_entries<K, I>(hash_len: usize, entries: I) -> Result<Self>
    where
        K: AsRef<[u8]>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut table = Self::new(hash_len);
        table.update(entries)?;
        Ok(table)
    }

    /// Key length in bytes
    pub fn hash_len(&self) -> usize {
        self.hash_len
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.root.clear();
        self.keys.clear();
    }

    fn check_len(&self, key: &[u8]) -> Result<()> {
        // A zero-length table cannot hold a leaf, so it accepts no key at all
        if key.len() != self.hash_len || key.is_empty() {
            return Err(RoutingError::KeyLength {
                key: Key::from(key),
                expected: self.hash_len,
                actual: key.len(),
            });
        }
        Ok(())
    }

    /// Follow `key` as far as the trie allows.
    ///
    /// Returns the number of digits matched and where the descent stopped.
    fn longest_prefix(&self, key: &[u8]) -> (usize, Position<'_, V>) {
        let mut position = Position::Branch(&self.root);
        for (depth, digit) in key.iter().enumerate() {
            let Position::Branch(children) = position else {
                return (depth, position);
            };
            match children.get(digit) {
                Some(next) => position = Position::from_node(next),
                None => return (depth, position),
            }
        }
        (key.len(), position)
    }

    /// Get the value stored at exactly `key`
    pub fn get(&self, key: &[u8]) -> Result<&V> {
        self.check_len(key)?;

        match self.longest_prefix(key) {
            (depth, Position::Leaf(value)) if depth == key.len() => Ok(value),
            (depth, _) => Err(RoutingError::KeyNotFound {
                key: Key::from(key),
                matched: Key::from(&key[..depth]),
            }),
        }
    }

    /// Get the value at `key`, or `default` when it is absent
    pub fn get_or<'a>(&'a self, key: &[u8], default: &'a V) -> Result<&'a V> {
        match self.get(key) {
            Err(RoutingError::KeyNotFound { .. }) => Ok(default),
            other => other,
        }
    }

    /// Get a mutable reference to the value at exactly `key`
    pub fn get_mut(&mut self, key: &[u8]) -> Result<&mut V> {
        self.check_len(key)?;

        let last = key.len() - 1;
        let mut children = &mut self.root;
        for (depth, digit) in key.iter().enumerate() {
            match children.get_mut(digit) {
                Some(Node::Branch(next)) if depth < last => children = next,
                Some(Node::Leaf(value)) if depth == last => return Ok(value),
                _ => {
                    return Err(RoutingError::KeyNotFound {
                        key: Key::from(key),
                        matched: Key::from(&key[..depth]),
                    })
                }
            }
        }

        Err(RoutingError::KeyNotFound {
            key: Key::from(key),
            matched: Key::from(key),
        })
    }

    /// Check whether `key` is stored
    pub fn contains(&self, key: &[u8]) -> bool {
        self.keys.contains(key)
    }

    /// Store `value` at `key`, replacing any previous value.
    ///
    /// Returns the replaced value.
    pub fn set(&mut self, key: &[u8], value: V) -> Result<Option<V>> {
        self.check_len(key)?;

        let previous = insert_at(&mut self.root, key, value);
        self.keys.insert(Key::from(key));
        Ok(previous)
    }

    /// Store every entry of `entries`.
    ///
    /// Every key is checked before the first write, so a key with the wrong
    /// length leaves the table untouched.
    pub fn update<K, I>(&mut self, entries: I) -> Result<()>
    where
        K: AsRef<[u8]>,
        I: IntoIterator<Item = (K, V)>,
    {
        let entries: Vec<(K, V)> = entries.into_iter().collect();
        for (key, _) in &entries {
            self.check_len(key.as_ref())?;
        }

        for (key, value) in entries {
            let key = key.as_ref();
            insert_at(&mut self.root, key, value);
            self.keys.insert(Key::from(key));
        }
        Ok(())
    }

    /// Remove `key` and prune every branch left empty
    pub fn delete(&mut self, key: &[u8]) -> Result<V> {
        self.check_len(key)?;

        match remove_at(&mut self.root, key, 0) {
            Ok(value) => {
                self.keys.remove(key);
                Ok(value)
            }
            Err(depth) => Err(RoutingError::KeyNotFound {
                key: Key::from(key),
                matched: Key::from(&key[..depth]),
            }),
        }
    }

    /// Iterate over stored keys (unordered)
    pub fn keys(&self) -> impl Iterator<Item = &Key> + '_ {
        self.keys.iter()
    }

    /// Iterate over stored values, in the same order as `keys`
    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, value)| value)
    }

    /// Iterate over `(key, value)` pairs (unordered)
    pub fn iter(&self) -> impl Iterator<Item = (&Key, &V)> + '_ {
        self.keys
            .iter()
            .filter_map(move |key| self.get(key.as_bytes()).ok().map(|value| (key, value)))
    }

    /// Value whose key is nearest to `key` under the greedy digit search.
    ///
    /// Shorter keys are zero-padded on the right.
    pub fn nearest(&self, key: &[u8]) -> Result<&V> {
        let padded = pad_key(key, self.hash_len)?;
        let (depth, mut position) = self.longest_prefix(&padded);

        for digit in &padded[depth..] {
            let Position::Branch(children) = position else {
                break;
            };
            position = NearestFirst::new(children, *digit)
                .next()
                .map(|(_, child)| Position::from_node(child))
                .ok_or_else(|| RoutingError::NoNearest {
                    key: Key::from(key),
                })?;
        }

        match position {
            Position::Leaf(value) => Ok(value),
            Position::Branch(_) => Err(RoutingError::NoNearest {
                key: Key::from(key),
            }),
        }
    }

    /// Like `nearest`, but yields `None` when the table is empty
    pub fn get_nearest(&self, key: &[u8]) -> Result<Option<&V>> {
        match self.nearest(key) {
            Ok(value) => Ok(Some(value)),
            Err(RoutingError::NoNearest { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Every stored value, ranked for forwarding towards `key`.
    ///
    /// Children are visited in greedy nearest-digit order at each level and
    /// each subtree is exhausted before the next sibling, so every leaf is
    /// produced exactly once. Shorter keys are zero-padded on the right.
    pub fn route(&self, key: &[u8]) -> Result<Route<'_, V>> {
        let target = pad_key(key, self.hash_len)?;
        let mut stack = Vec::with_capacity(self.hash_len);
        if let Some(&digit) = target.first() {
            stack.push(NearestFirst::new(&self.root, digit));
        }
        Ok(Route { target, stack })
    }
}

/// Ranked walk over the routing table, produced by [`RoutingTable::route`]
pub struct Route<'a, V> {
    target: Vec<u8>,
    stack: Vec<NearestFirst<'a, V>>,
}

impl<'a, V> Iterator for Route<'a, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let depth = self.stack.len();
            let level = self.stack.last_mut()?;
            match level.next() {
                None => {
                    self.stack.pop();
                }
                Some((_, Node::Leaf(value))) => return Some(value),
                Some((_, Node::Branch(children))) => {
                    // A branch at depth hash_len cannot exist; stop descending if it did.
                    if let Some(&digit) = self.target.get(depth) {
                        self.stack.push(NearestFirst::new(children, digit));
                    }
                }
            }
        }
    }
}

fn insert_at<V>(children: &mut Children<V>, key: &[u8], value: V) -> Option<V> {
    let Some((&digit, rest)) = key.split_first() else {
        return None;
    };

    if rest.is_empty() {
        return match children.insert(digit, Node::Leaf(value)) {
            Some(Node::Leaf(previous)) => Some(previous),
            _ => None,
        };
    }

    let child = children
        .entry(digit)
        .or_insert_with(|| Node::Branch(BTreeMap::new()));
    if matches!(*child, Node::Leaf(_)) {
        *child = Node::Branch(BTreeMap::new());
    }
    match child {
        Node::Branch(next) => insert_at(next, rest, value),
        Node::Leaf(_) => None,
    }
}

/// Remove the leaf at `key`, pruning emptied branches on the way back up.
///
/// On failure returns how many digits matched.
fn remove_at<V>(
    children: &mut Children<V>,
    key: &[u8],
    depth: usize,
) -> std::result::Result<V, usize> {
    let Some((&digit, rest)) = key.split_first() else {
        return Err(depth);
    };

    if rest.is_empty() {
        return match children.remove(&digit) {
            Some(Node::Leaf(value)) => Ok(value),
            Some(other) => {
                children.insert(digit, other);
                Err(depth)
            }
            None => Err(depth),
        };
    }

    let Some(Node::Branch(next)) = children.get_mut(&digit) else {
        return Err(depth);
    };
    let value = remove_at(next, rest, depth + 1)?;
    if next.is_empty() {
        children.remove(&digit);
    }
    Ok(value)
}

#[cfg(test)]
impl<V> RoutingTable<V> {
    /// Keys of every leaf, found by walking the trie.
    ///
    /// Panics on a leaf above depth `hash_len` or a branch at it.
    fn leaf_keys(&self) -> HashSet<Key> {
        fn walk<V>(
            node: &Node<V>,
            hash_len: usize,
            prefix: &mut Vec<u8>,
            out: &mut HashSet<Key>,
        ) {
            match node {
                Node::Leaf(_) => {
                    assert_eq!(prefix.len(), hash_len, "leaf at depth {}", prefix.len());
                    out.insert(Key::from(prefix.as_slice()));
                }
                Node::Branch(children) => {
                    assert!(prefix.len() < hash_len, "branch at depth {}", prefix.len());
                    for (&digit, child) in children {
                        prefix.push(digit);
                        walk(child, hash_len, prefix, out);
                        prefix.pop();
                    }
                }
            }
        }

        let mut out = HashSet::new();
        let mut prefix = Vec::with_capacity(self.hash_len);
        for (&digit, child) in &self.root {
            prefix.push(digit);
            walk(child, self.hash_len, &mut prefix, &mut out);
            prefix.pop();
        }
        out
    }

    /// Whether any branch below the root has no children
    fn has_empty_branch(&self) -> bool {
        fn walk<V>(node: &Node<V>) -> bool {
            match node {
                Node::Leaf(_) => false,
                Node::Branch(children) => children.is_empty() || children.values().any(walk),
            }
        }
        self.root.values().any(walk)
    }

    fn root_len(&self) -> usize {
        self.root.len()
    }
}
