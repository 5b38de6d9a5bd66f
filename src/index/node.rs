//! Arena node representation for the B+Tree
//!
//! Nodes never own each other directly. Internal nodes hold `NodeId`
//! handles into the tree's arena, and leaves carry a forward link to the
//! next leaf in key order. The forward link is a same-level cross reference,
//! not an ownership edge.

use crate::index::SeparatorPolicy;

/// Handle to a node slot in the tree arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(pub(crate) usize);

impl NodeId {
    /// Position of the node in the arena
    pub(crate) fn index(self) -> usize {
        self.0
    }
}

/// A tree node: either a leaf holding entries or an internal routing node
#[derive(Debug, Clone)]
pub(crate) enum Node<K, V> {
    Leaf(LeafNode<K, V>),
    Internal(InternalNode<K>),
}

impl<K: Ord + Clone, V: Clone> Node<K, V> {
    /// Number of entries (leaf) or separator keys (internal)
    pub fn len(&self) -> usize {
        match self {
            Node::Leaf(leaf) => leaf.entries.len(),
            Node::Internal(node) => node.keys.len(),
        }
    }
}

/// Leaf node: sorted (key, value) pairs plus the forward link
#[derive(Debug, Clone)]
pub(crate) struct LeafNode<K, V> {
    pub entries: Vec<(K, V)>,
    pub next: Option<NodeId>,
}

impl<K: Ord + Clone, V: Clone> LeafNode<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            next: None,
        }
    }

    /// Insert after any entries with an equal key so duplicates keep
    /// insertion order.
    pub fn insert(&mut self, key: K, value: V) {
        let pos = self.entries.partition_point(|(k, _)| *k <= key);
        self.entries.insert(pos, (key, value));
    }

    /// Index of the first entry with key >= `key`
    pub fn lower_bound(&self, key: &K) -> usize {
        self.entries.partition_point(|(k, _)| k < key)
    }

    /// Index one past the last entry with key <= `key`
    pub fn upper_bound(&self, key: &K) -> usize {
        self.entries.partition_point(|(k, _)| k <= key)
    }

    /// Split at `m = len / 2`, keeping `[0, m)` in `self`.
    ///
    /// Returns the separator key and the right half. The right half inherits
    /// the old forward link; the caller links `self` to the right half once
    /// it has a slot in the arena.
    pub fn split(&mut self, policy: SeparatorPolicy) -> (K, Self) {
        let mid = self.entries.len() / 2;
        let mut right_entries = self.entries.split_off(mid);

        let separator = match policy {
            SeparatorPolicy::Retain => right_entries[0].0.clone(),
            SeparatorPolicy::Discard => right_entries.remove(0).0,
        };

        let right = Self {
            entries: right_entries,
            next: self.next,
        };

        (separator, right)
    }

    pub fn min_key(&self) -> Option<&K> {
        self.entries.first().map(|(k, _)| k)
    }

    pub fn max_key(&self) -> Option<&K> {
        self.entries.last().map(|(k, _)| k)
    }
}

/// Internal node: separators and child handles
#[derive(Debug, Clone)]
pub(crate) struct InternalNode<K> {
    pub keys: Vec<K>,
    pub children: Vec<NodeId>,
}

impl<K: Ord + Clone> InternalNode<K> {
    /// Fresh root above a single child, used when the old root overflows
    pub fn above(child: NodeId) -> Self {
        Self {
            keys: Vec::new(),
            children: vec![child],
        }
    }

    /// First index `i` with `key <= keys[i]`, or `keys.len()` if none.
    /// A key equal to a separator routes left.
    pub fn route(&self, key: &K) -> usize {
        self.keys.partition_point(|k| k < key)
    }

    /// Split at `m = len / 2`. The key at `m` moves up to the parent; it is
    /// kept in neither half.
    pub fn split(&mut self) -> (K, Self) {
        let mid = self.keys.len() / 2;
        let mut right_keys = self.keys.split_off(mid);
        let separator = right_keys.remove(0);
        let right_children = self.children.split_off(mid + 1);

        let right = Self {
            keys: right_keys,
            children: right_children,
        };

        (separator, right)
    }

    /// Record a finished child split: `separator` goes to `idx`, the new
    /// right sibling sits just after the left half.
    pub fn adopt(&mut self, idx: usize, separator: K, right: NodeId) {
        self.keys.insert(idx, separator);
        self.children.insert(idx + 1, right);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf_of(keys: &[i64]) -> LeafNode<i64, u32> {
        let mut leaf = LeafNode::new(keys.len());
        for (i, k) in keys.iter().enumerate() {
            leaf.insert(*k, i as u32);
        }
        leaf
    }

    #[test]
    fn test_leaf_insert_keeps_order() {
        let leaf = leaf_of(&[5, 1, 3, 9]);
        let keys: Vec<i64> = leaf.entries.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec![1, 3, 5, 9]);
    }

    #[test]
    fn test_leaf_duplicates_in_insertion_order() {
        let mut leaf: LeafNode<i64, &str> = LeafNode::new(4);
        leaf.insert(5, "first");
        leaf.insert(5, "second");
        leaf.insert(1, "other");
        leaf.insert(5, "third");

        let values: Vec<&str> = leaf.entries.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec!["other", "first", "second", "third"]);
    }

    #[test]
    fn test_leaf_split_retain() {
        let mut leaf = leaf_of(&[1, 3, 5, 9]);
        leaf.next = Some(NodeId(42));

        let (separator, right) = leaf.split(SeparatorPolicy::Retain);

        assert_eq!(separator, 5);
        assert_eq!(leaf.entries.len(), 2);
        assert_eq!(right.min_key(), Some(&5));
        assert_eq!(right.entries.len(), 2);
        assert_eq!(right.next, Some(NodeId(42)));
    }

    #[test]
    fn test_leaf_split_discard_drops_separator_entry() {
        let mut leaf = leaf_of(&[1, 3, 5, 9]);

        let (separator, right) = leaf.split(SeparatorPolicy::Discard);

        assert_eq!(separator, 5);
        assert_eq!(leaf.max_key(), Some(&3));
        assert_eq!(right.entries.len(), 1);
        assert_eq!(right.min_key(), Some(&9));
    }

    #[test]
    fn test_internal_split_partitions_children() {
        let mut node = InternalNode {
            keys: vec![10, 20, 30, 40],
            children: (0..5).map(NodeId).collect(),
        };

        let (separator, right) = node.split();

        assert_eq!(separator, 30);
        assert_eq!(node.keys, vec![10, 20]);
        assert_eq!(node.children, vec![NodeId(0), NodeId(1), NodeId(2)]);
        assert_eq!(right.keys, vec![40]);
        assert_eq!(right.children, vec![NodeId(3), NodeId(4)]);
    }

    #[test]
    fn test_route_ties_go_left() {
        let node = InternalNode {
            keys: vec![10, 20],
            children: (0..3).map(NodeId).collect(),
        };

        assert_eq!(node.route(&5), 0);
        assert_eq!(node.route(&10), 0);
        assert_eq!(node.route(&11), 1);
        assert_eq!(node.route(&20), 1);
        assert_eq!(node.route(&21), 2);
    }
}
