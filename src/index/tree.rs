//! In-memory B+Tree keyed by timestamp
//!
//! Nodes live in an arena (`Vec<Node>`) and reference each other by
//! `NodeId`. Insertion splits full nodes on the way down, so a descent never
//! has to walk back up to a parent.
//!
//! # Performance
//! - Insert: O(order * log n)
//! - Range query: O(log n + k) where k = results

use crate::index::error::{invariant_violation, IndexError, IndexResult, MIN_ORDER};
use crate::index::node::{InternalNode, LeafNode, Node, NodeId};
use crate::index::{IndexStats, SeparatorPolicy};

/// Order used by [`BPlusTree::default`]
pub const DEFAULT_ORDER: usize = 4;

#[derive(Debug, Clone, Copy, Default)]
struct SplitCounters {
    leaf: u64,
    internal: u64,
    root: u64,
}

/// Balanced multi-way search tree mapping keys to record identifiers
#[derive(Debug, Clone)]
pub struct BPlusTree<K, V> {
    /// Node arena; slots are never freed while the tree is alive
    nodes: Vec<Node<K, V>>,
    /// Sole entry point for every traversal
    root: NodeId,
    /// Maximum entries per node before the next insertion splits it
    order: usize,
    /// What happens to a leaf separator's payload on split
    policy: SeparatorPolicy,
    /// Number of (key, value) entries stored in leaves
    len: usize,
    splits: SplitCounters,
}

impl<K: Ord + Clone, V: Clone> Default for BPlusTree<K, V> {
    fn default() -> Self {
        Self::build(DEFAULT_ORDER, SeparatorPolicy::default())
    }
}

impl<K: Ord + Clone, V: Clone> BPlusTree<K, V> {
    /// Create an empty tree with the default separator policy
    pub fn new(order: usize) -> IndexResult<Self> {
        Self::with_policy(order, SeparatorPolicy::default())
    }

    /// Create an empty tree with an explicit separator policy
    pub fn with_policy(order: usize, policy: SeparatorPolicy) -> IndexResult<Self> {
        if order < MIN_ORDER {
            return Err(IndexError::InvalidOrder(order));
        }
        Ok(Self::build(order, policy))
    }

    fn build(order: usize, policy: SeparatorPolicy) -> Self {
        Self {
            nodes: vec![Node::Leaf(LeafNode::new(order))],
            root: NodeId(0),
            order,
            policy,
            len: 0,
            splits: SplitCounters::default(),
        }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn policy(&self) -> SeparatorPolicy {
        self.policy
    }

    /// Number of entries held in leaves
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of levels from the root down to the leaves (1 = root is a leaf)
    pub fn height(&self) -> usize {
        let mut height = 1;
        let mut current = self.root;
        while let Node::Internal(node) = self.node(current) {
            current = node.children[0];
            height += 1;
        }
        height
    }

    /// Drop every entry and start over with an empty root leaf
    pub fn clear(&mut self) {
        *self = Self::build(self.order, self.policy);
    }

    fn node(&self, id: NodeId) -> &Node<K, V> {
        &self.nodes[id.index()]
    }

    fn alloc(&mut self, node: Node<K, V>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    fn is_full(&self, id: NodeId) -> bool {
        self.node(id).len() >= self.order
    }

    // ==================== Insertion ====================

    /// Insert a (key, value) pair. Keys need not be unique.
    ///
    /// Full nodes met on the way down are split before the descent enters
    /// them, so the target leaf always has room.
    pub fn insert(&mut self, key: K, value: V) -> IndexResult<()> {
        if self.is_full(self.root) {
            let old_root = self.root;
            let new_root = self.alloc(Node::Internal(InternalNode::above(old_root)));
            self.root = new_root;
            self.split_child(new_root, 0)?;
            self.splits.root += 1;
            tracing::debug!(height = self.height(), "B+Tree root split");
        }

        let mut current = self.root;
        while let Some((idx, child)) = self.route(current, &key) {
            if self.is_full(child) {
                // The new separator at idx may send the key to the right half
                self.split_child(current, idx)?;
                continue;
            }
            current = child;
        }

        match &mut self.nodes[current.index()] {
            Node::Leaf(leaf) => leaf.insert(key, value),
            Node::Internal(_) => {
                return Err(invariant_violation("descent stopped at an internal node"));
            }
        }
        self.len += 1;

        Ok(())
    }

    /// Child of an internal node that `key` descends into. `None` at a leaf.
    fn route(&self, id: NodeId, key: &K) -> Option<(usize, NodeId)> {
        match self.node(id) {
            Node::Leaf(_) => None,
            Node::Internal(node) => {
                let idx = node.route(key);
                Some((idx, node.children[idx]))
            }
        }
    }

    /// Split the full child at `parent.children[idx]` into two nodes.
    ///
    /// The left half stays in the child's slot, the right half gets a new
    /// slot, and the separator is inserted into the parent at `idx`.
    fn split_child(&mut self, parent: NodeId, idx: usize) -> IndexResult<()> {
        let child = match self.node(parent) {
            Node::Internal(node) => node.children[idx],
            Node::Leaf(_) => return Err(invariant_violation("split requested under a leaf")),
        };

        let right_id = NodeId(self.nodes.len());
        let policy = self.policy;

        let (separator, right) = match &mut self.nodes[child.index()] {
            Node::Leaf(leaf) => {
                let (separator, right) = leaf.split(policy);
                leaf.next = Some(right_id);
                self.splits.leaf += 1;
                if policy == SeparatorPolicy::Discard {
                    // The separator entry now exists only as a routing key
                    self.len -= 1;
                }
                (separator, Node::Leaf(right))
            }
            Node::Internal(node) => {
                let (separator, right) = node.split();
                self.splits.internal += 1;
                (separator, Node::Internal(right))
            }
        };
        self.alloc(right);

        match &mut self.nodes[parent.index()] {
            Node::Internal(node) => node.adopt(idx, separator, right_id),
            Node::Leaf(_) => return Err(invariant_violation("split parent became a leaf")),
        }

        tracing::trace!(
            parent = parent.index(),
            left = child.index(),
            right = right_id.index(),
            "split node"
        );

        self.check_split(parent, idx)
    }

    /// Cheap local check of the nodes touched by a split
    fn check_split(&self, parent: NodeId, idx: usize) -> IndexResult<()> {
        let Node::Internal(node) = self.node(parent) else {
            return Err(invariant_violation("split parent is not internal"));
        };
        if node.children.len() != node.keys.len() + 1 {
            return Err(invariant_violation(format!(
                "node {} has {} children for {} keys",
                parent.index(),
                node.children.len(),
                node.keys.len()
            )));
        }

        let separator = &node.keys[idx];
        let left = node.children[idx];
        let right = node.children[idx + 1];

        match (self.node(left), self.node(right)) {
            (Node::Leaf(l), Node::Leaf(r)) => {
                if l.next != Some(right) {
                    return Err(invariant_violation("left leaf not linked to its right half"));
                }
                if l.max_key().is_some_and(|k| k > separator)
                    || r.min_key().is_some_and(|k| k < separator)
                {
                    return Err(invariant_violation("leaf split halves straddle separator"));
                }
            }
            (Node::Internal(l), Node::Internal(r)) => {
                if l.children.len() != l.keys.len() + 1 || r.children.len() != r.keys.len() + 1 {
                    return Err(invariant_violation("internal split broke child count"));
                }
            }
            _ => return Err(invariant_violation("split produced mixed node kinds")),
        }

        Ok(())
    }

    // ==================== Range Queries ====================

    /// All entries with `start <= key <= end`, in ascending key order.
    ///
    /// Depth-first descent that only enters children whose key span can
    /// overlap the range. `start > end` yields an empty result.
    pub fn range_query(&self, start: &K, end: &K) -> Vec<(K, V)> {
        let mut results = Vec::new();
        if start > end {
            return results;
        }
        self.collect_range(self.root, start, end, &mut results);
        results
    }

    fn collect_range(&self, id: NodeId, start: &K, end: &K, results: &mut Vec<(K, V)>) {
        match self.node(id) {
            Node::Leaf(leaf) => {
                let from = leaf.lower_bound(start);
                let to = leaf.upper_bound(end);
                if from < to {
                    results.extend_from_slice(&leaf.entries[from..to]);
                }
            }
            Node::Internal(node) => {
                for (i, &child) in node.children.iter().enumerate() {
                    // Separators are inclusive on both sides: a retained
                    // separator entry or a duplicate may sit to either side.
                    if i > 0 && end < &node.keys[i - 1] {
                        break;
                    }
                    if node.keys.get(i).map_or(true, |sep| start <= sep) {
                        self.collect_range(child, start, end, results);
                    }
                }
            }
        }
    }

    /// Lazy range scan over the leaf chain.
    ///
    /// Descends once to the leftmost leaf that can hold `start`, then follows
    /// forward links until a key exceeds `end`. Yields the same entries in
    /// the same order as [`range_query`](Self::range_query).
    pub fn range_scan(&self, start: &K, end: &K) -> RangeScan<'_, K, V> {
        if start > end {
            return RangeScan::exhausted(self);
        }

        let mut current = self.root;
        while let Some((_, child)) = self.route(current, start) {
            current = child;
        }
        let pos = match self.node(current) {
            Node::Leaf(leaf) => leaf.lower_bound(start),
            Node::Internal(_) => 0,
        };

        RangeScan {
            tree: self,
            leaf: Some(current),
            pos,
            end: Some(end.clone()),
        }
    }

    /// Every entry in key order, following the leaf chain
    pub fn iter(&self) -> RangeScan<'_, K, V> {
        RangeScan {
            tree: self,
            leaf: Some(self.leftmost_leaf()),
            pos: 0,
            end: None,
        }
    }

    /// Values stored under exactly `key`.
    ///
    /// Internal separators are routing aids only and are never consulted as
    /// evidence that a key exists.
    pub fn get(&self, key: &K) -> Vec<V> {
        self.range_scan(key, key).map(|(_, v)| v.clone()).collect()
    }

    /// Smallest stored key
    pub fn first_key(&self) -> Option<&K> {
        self.iter().next().map(|(k, _)| k)
    }

    /// Largest stored key
    pub fn last_key(&self) -> Option<&K> {
        let mut current = self.root;
        while let Node::Internal(node) = self.node(current) {
            current = node.children[node.children.len() - 1];
        }
        match self.node(current) {
            Node::Leaf(leaf) if !leaf.entries.is_empty() => leaf.max_key(),
            // Removals can leave the rightmost leaf empty
            _ => self.iter().last().map(|(k, _)| k),
        }
    }

    fn leftmost_leaf(&self) -> NodeId {
        let mut current = self.root;
        while let Node::Internal(node) = self.node(current) {
            current = node.children[0];
        }
        current
    }

    // ==================== Validation & Stats ====================

    /// Full structural check of the tree.
    ///
    /// Verifies child counts, key order, separator bounds, uniform leaf
    /// depth, and that the leaf chain visits exactly the leaves reachable
    /// from the root, in order, holding exactly `len` entries.
    pub fn validate(&self) -> IndexResult<()> {
        let mut leaves = Vec::new();
        let mut leaf_depth = None;
        self.validate_node(self.root, None, None, 1, &mut leaf_depth, &mut leaves)?;

        let mut chain = Vec::new();
        let mut cursor = Some(self.leftmost_leaf());
        while let Some(id) = cursor {
            if chain.len() > leaves.len() {
                return Err(violation("leaf chain is longer than the tree (cycle?)"));
            }
            chain.push(id);
            cursor = match self.node(id) {
                Node::Leaf(leaf) => leaf.next,
                Node::Internal(_) => return Err(violation("leaf chain reaches an internal node")),
            };
        }
        if chain != leaves {
            return Err(violation("leaf chain order differs from tree order"));
        }

        let mut count = 0usize;
        let mut previous: Option<&K> = None;
        for (key, _) in self.iter() {
            if previous.is_some_and(|p| p > key) {
                return Err(violation("leaf chain keys are not sorted"));
            }
            previous = Some(key);
            count += 1;
        }
        if count != self.len {
            return Err(violation(format!(
                "leaf chain holds {} entries, expected {}",
                count, self.len
            )));
        }

        Ok(())
    }

    fn validate_node<'a>(
        &'a self,
        id: NodeId,
        lower: Option<&'a K>,
        upper: Option<&'a K>,
        depth: usize,
        leaf_depth: &mut Option<usize>,
        leaves: &mut Vec<NodeId>,
    ) -> IndexResult<()> {
        let in_bounds =
            |k: &K| lower.map_or(true, |lo| k >= lo) && upper.map_or(true, |hi| k <= hi);

        match self.node(id) {
            Node::Leaf(leaf) => {
                if leaf.entries.windows(2).any(|w| w[0].0 > w[1].0) {
                    return Err(violation(format!("leaf {} is not sorted", id.index())));
                }
                if !leaf.entries.iter().all(|(k, _)| in_bounds(k)) {
                    return Err(violation(format!(
                        "leaf {} holds a key outside its separators",
                        id.index()
                    )));
                }
                match *leaf_depth {
                    None => *leaf_depth = Some(depth),
                    Some(d) if d != depth => {
                        return Err(violation("leaves are not all at the same depth"));
                    }
                    Some(_) => {}
                }
                leaves.push(id);
            }
            Node::Internal(node) => {
                if node.children.len() != node.keys.len() + 1 {
                    return Err(violation(format!(
                        "node {} has {} children for {} keys",
                        id.index(),
                        node.children.len(),
                        node.keys.len()
                    )));
                }
                if node.keys.len() > self.order {
                    return Err(violation(format!("node {} exceeds order", id.index())));
                }
                if node.keys.windows(2).any(|w| w[0] > w[1]) {
                    return Err(violation(format!("node {} keys not sorted", id.index())));
                }
                if !node.keys.iter().all(|k| in_bounds(k)) {
                    return Err(violation(format!(
                        "node {} separator outside parent bounds",
                        id.index()
                    )));
                }
                for (i, &child) in node.children.iter().enumerate() {
                    let lo = if i == 0 { lower } else { Some(&node.keys[i - 1]) };
                    let hi = node.keys.get(i).or(upper);
                    self.validate_node(child, lo, hi, depth + 1, leaf_depth, leaves)?;
                }
            }
        }

        Ok(())
    }

    /// Shape and split counters
    pub fn stats(&self) -> IndexStats {
        let mut leaf_nodes = 0;
        let mut internal_nodes = 0;
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            match self.node(id) {
                Node::Leaf(_) => leaf_nodes += 1,
                Node::Internal(node) => {
                    internal_nodes += 1;
                    stack.extend(node.children.iter().copied());
                }
            }
        }

        IndexStats {
            entries: self.len as u64,
            order: self.order,
            height: self.height(),
            leaf_nodes,
            internal_nodes,
            leaf_splits: self.splits.leaf,
            internal_splits: self.splits.internal,
            root_splits: self.splits.root,
        }
    }
}

impl<K: Ord + Clone, V: Clone + PartialEq> BPlusTree<K, V> {
    /// Remove one entry matching both `key` and `value`.
    ///
    /// Leaves are not merged or rebalanced; a leaf may become empty and stay
    /// in the chain. Separators are left untouched.
    pub fn remove(&mut self, key: &K, value: &V) -> bool {
        let mut current = self.root;
        while let Some((_, child)) = self.route(current, key) {
            current = child;
        }

        let mut cursor = Some(current);
        while let Some(id) = cursor {
            let Node::Leaf(leaf) = &mut self.nodes[id.index()] else {
                return false;
            };
            let from = leaf.lower_bound(key);
            let to = leaf.upper_bound(key);
            if let Some(offset) = leaf.entries[from..to].iter().position(|(_, v)| v == value) {
                leaf.entries.remove(from + offset);
                self.len -= 1;
                return true;
            }
            if to < leaf.entries.len() {
                // Found a key past the target; no later leaf can match
                return false;
            }
            cursor = leaf.next;
        }

        false
    }
}

fn violation(message: impl Into<String>) -> IndexError {
    IndexError::StructuralInvariantViolation(message.into())
}

/// Iterator over leaf entries following forward links
pub struct RangeScan<'a, K, V> {
    tree: &'a BPlusTree<K, V>,
    leaf: Option<NodeId>,
    pos: usize,
    /// Inclusive upper bound; `None` scans to the end of the chain
    end: Option<K>,
}

impl<'a, K, V> RangeScan<'a, K, V> {
    fn exhausted(tree: &'a BPlusTree<K, V>) -> Self {
        Self {
            tree,
            leaf: None,
            pos: 0,
            end: None,
        }
    }
}

impl<'a, K: Ord, V> Iterator for RangeScan<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let id = self.leaf?;
            let Node::Leaf(leaf) = &self.tree.nodes[id.index()] else {
                self.leaf = None;
                return None;
            };

            if let Some((key, value)) = leaf.entries.get(self.pos) {
                if self.end.as_ref().is_some_and(|end| key > end) {
                    self.leaf = None;
                    return None;
                }
                self.pos += 1;
                return Some((key, value));
            }

            self.leaf = leaf.next;
            self.pos = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    fn tree_with(order: usize, keys: &[i64]) -> BPlusTree<i64, u64> {
        let mut tree = BPlusTree::new(order).unwrap();
        for (i, k) in keys.iter().enumerate() {
            tree.insert(*k, i as u64).unwrap();
        }
        tree
    }

    fn oracle(entries: &[(i64, u64)], start: i64, end: i64) -> Vec<(i64, u64)> {
        let mut expected: Vec<(i64, u64)> = entries
            .iter()
            .copied()
            .filter(|(k, _)| start <= *k && *k <= end)
            .collect();
        expected.sort();
        expected
    }

    fn sorted(mut entries: Vec<(i64, u64)>) -> Vec<(i64, u64)> {
        entries.sort();
        entries
    }

    fn scan(tree: &BPlusTree<i64, u64>, start: i64, end: i64) -> Vec<(i64, u64)> {
        tree.range_scan(&start, &end).map(|(k, v)| (*k, *v)).collect()
    }

    #[test]
    fn test_empty_tree() {
        let tree: BPlusTree<i64, u64> = BPlusTree::new(4).unwrap();
        assert!(tree.is_empty());
        assert_eq!(tree.height(), 1);
        assert!(tree.range_query(&0, &100).is_empty());
        assert_eq!(tree.first_key(), None);
        assert_eq!(tree.last_key(), None);
        tree.validate().unwrap();
    }

    #[test]
    fn test_invalid_order() {
        let result: IndexResult<BPlusTree<i64, u64>> = BPlusTree::new(2);
        assert_eq!(result.unwrap_err(), IndexError::InvalidOrder(2));
        assert!(BPlusTree::<i64, u64>::new(3).is_ok());
    }

    #[test]
    fn test_end_to_end_scenario() {
        let mut tree: BPlusTree<i64, char> = BPlusTree::new(4).unwrap();
        for (t, id) in [(1, 'A'), (5, 'B'), (3, 'C'), (9, 'D'), (7, 'E')] {
            tree.insert(t, id).unwrap();
        }

        let expected = vec![(3, 'C'), (5, 'B'), (7, 'E')];
        assert_eq!(tree.range_query(&2, &8), expected);

        // The fifth insert split the root leaf: [1 3] | [5 7 9]
        let before = tree.stats();
        assert_eq!(before.root_splits, 1);
        assert_eq!(before.leaf_splits, 1);
        assert_eq!(before.height, 2);
        assert_eq!(root_keys(&tree), vec![5]);

        tree.insert(10, 'F').unwrap();
        tree.insert(11, 'G').unwrap();

        // [5 7 9 10] split on the way to 11: [1 3] | [5 7] | [9 10 11]
        let after = tree.stats();
        assert_eq!(after.root_splits, 1);
        assert_eq!(after.leaf_splits, 2);
        assert_eq!(after.height, 2);
        assert_eq!(after.leaf_nodes, 3);
        assert_eq!(root_keys(&tree), vec![5, 9]);
        assert_eq!(leaf_bounds(&tree), vec![(1, 3), (5, 7), (9, 11)]);
        assert_eq!(tree.range_query(&2, &8), expected);
        assert_eq!(scan_chars(&tree, 2, 8), expected);
        tree.validate().unwrap();
    }

    fn root_keys<V: Clone>(tree: &BPlusTree<i64, V>) -> Vec<i64> {
        match tree.node(tree.root) {
            Node::Internal(node) => node.keys.clone(),
            Node::Leaf(_) => Vec::new(),
        }
    }

    /// Leaves in chain order, as (min, max) key pairs of non-empty leaves
    fn leaf_bounds<V: Clone>(tree: &BPlusTree<i64, V>) -> Vec<(i64, i64)> {
        let mut bounds = Vec::new();
        let mut cursor = Some(tree.leftmost_leaf());
        while let Some(id) = cursor {
            let Node::Leaf(leaf) = tree.node(id) else {
                panic!("chain reached internal node");
            };
            if let (Some(min), Some(max)) = (leaf.min_key(), leaf.max_key()) {
                bounds.push((*min, *max));
            }
            cursor = leaf.next;
        }
        bounds
    }

    fn scan_chars(tree: &BPlusTree<i64, char>, start: i64, end: i64) -> Vec<(i64, char)> {
        tree.range_scan(&start, &end).map(|(k, v)| (*k, *v)).collect()
    }

    #[test]
    fn test_root_split_builds_internal_root() {
        let tree = tree_with(4, &[1, 5, 3, 9, 7]);
        let stats = tree.stats();

        assert_eq!(stats.root_splits, 1);
        assert_eq!(stats.height, 2);
        assert_eq!(stats.leaf_nodes, 2);
        assert_eq!(stats.internal_nodes, 1);
        assert_eq!(tree.len(), 5);
    }

    #[test]
    fn test_sortedness_of_leaf_chain() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut tree = BPlusTree::new(5).unwrap();
        for i in 0..2_000u64 {
            tree.insert(rng.random_range(-500..500i64), i).unwrap();
        }

        let keys: Vec<i64> = tree.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys.len(), 2_000);
        assert!(keys.windows(2).all(|w| w[0] <= w[1]));
        tree.validate().unwrap();
    }

    #[test]
    fn test_completeness_point_queries() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut tree = BPlusTree::new(4).unwrap();
        let mut inserted = Vec::new();

        for id in 0..500u64 {
            let key = rng.random_range(0..200i64);
            tree.insert(key, id).unwrap();
            inserted.push((key, id));
        }

        for (key, id) in &inserted {
            let hits = tree.range_query(key, key);
            assert!(hits.contains(&(*key, *id)), "missing ({key}, {id})");
            assert!(tree.get(key).contains(id));
        }
    }

    #[test]
    fn test_range_matches_linear_oracle() {
        for (seed, order) in [(1u64, 3usize), (2, 4), (3, 7), (4, 16)] {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut entries: Vec<(i64, u64)> = (0..800u64)
                .map(|id| (rng.random_range(0..1_000i64), id))
                .collect();
            entries.shuffle(&mut rng);

            let mut tree = BPlusTree::new(order).unwrap();
            for (k, v) in &entries {
                tree.insert(*k, *v).unwrap();
            }
            tree.validate().unwrap();

            let mut ranges: Vec<(i64, i64)> = (0..200)
                .map(|_| {
                    let a = rng.random_range(-100..1_100i64);
                    let b = rng.random_range(-100..1_100i64);
                    (a.min(b), a.max(b))
                })
                .collect();
            // Empty, inverted, and out-of-span ranges
            ranges.extend([(-50, -1), (1_001, 5_000), (500, 499), (0, 999), (-10, 2_000)]);

            for (start, end) in ranges {
                let expected = oracle(&entries, start, end);
                let got = tree.range_query(&start, &end);
                assert_eq!(sorted(got.clone()), expected, "order={order} [{start}, {end}]");
                assert!(got.windows(2).all(|w| w[0].0 <= w[1].0));
                assert_eq!(scan(&tree, start, end), got);
            }
        }
    }

    #[test]
    fn test_inverted_range_is_empty() {
        let tree = tree_with(4, &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert!(tree.range_query(&6, &2).is_empty());
        assert_eq!(tree.range_scan(&6, &2).count(), 0);
    }

    #[test]
    fn test_split_invariants_on_every_insert() {
        let mut rng = StdRng::seed_from_u64(99);
        let mut tree = BPlusTree::new(4).unwrap();

        for id in 0..300u64 {
            let before = tree.stats();
            tree.insert(rng.random_range(0..100i64), id).unwrap();
            let after = tree.stats();

            if after.leaf_splits + after.internal_splits > before.leaf_splits + before.internal_splits
            {
                tree.validate().unwrap();
                let bounds = leaf_bounds(&tree);
                assert!(bounds.windows(2).all(|w| w[1].0 >= w[0].1));
            }
        }
    }

    #[test]
    fn test_idempotent_query() {
        let tree = tree_with(4, &[10, 20, 30, 40, 50, 60, 70, 80, 90]);
        let first = tree.range_query(&25, &75);
        let second = tree.range_query(&25, &75);
        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
    }

    #[test]
    fn test_duplicate_keys_across_splits() {
        let mut tree = BPlusTree::new(4).unwrap();
        for id in 0..40u64 {
            tree.insert(5i64, id).unwrap();
        }
        tree.insert(1, 100).unwrap();
        tree.insert(9, 200).unwrap();
        tree.validate().unwrap();

        let hits = tree.range_query(&5, &5);
        assert_eq!(hits.len(), 40);
        assert_eq!(scan(&tree, 5, 5), hits);
        assert_eq!(tree.range_query(&0, &10).len(), 42);
    }

    #[test]
    fn test_sequential_inserts_grow_height() {
        let mut tree = BPlusTree::new(4).unwrap();
        for t in 0..1_000i64 {
            tree.insert(t, t as u64).unwrap();
        }

        tree.validate().unwrap();
        assert!(tree.height() >= 4);
        assert_eq!(tree.first_key(), Some(&0));
        assert_eq!(tree.last_key(), Some(&999));
        assert_eq!(tree.range_query(&250, &260).len(), 11);
    }

    #[test]
    fn test_discard_policy_loses_separator_payload() {
        let mut tree = BPlusTree::with_policy(4, SeparatorPolicy::Discard).unwrap();
        for (t, id) in [(1i64, 1u64), (5, 2), (3, 3), (9, 4), (7, 5)] {
            tree.insert(t, id).unwrap();
        }

        // 5 was promoted as separator on the root split and its entry dropped
        assert_eq!(tree.range_query(&2, &8), vec![(3, 3), (7, 5)]);
        assert!(tree.get(&5).is_empty());
        assert_eq!(tree.len(), 4);
        tree.validate().unwrap();
    }

    #[test]
    fn test_retain_policy_keeps_separator_payload() {
        let tree = tree_with(4, &[1, 5, 3, 9, 7]);
        assert_eq!(tree.get(&5), vec![1]);
        assert_eq!(tree.policy(), SeparatorPolicy::Retain);
    }

    #[test]
    fn test_remove_entry() {
        let mut tree = tree_with(4, &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        assert!(tree.remove(&5, &4));
        assert!(!tree.remove(&5, &4));
        assert!(!tree.remove(&42, &0));

        assert_eq!(tree.len(), 9);
        assert!(tree.get(&5).is_empty());
        assert_eq!(tree.range_query(&4, &6), vec![(4, 3), (6, 5)]);
        tree.validate().unwrap();
    }

    #[test]
    fn test_remove_everything_then_reinsert() {
        let keys: Vec<i64> = (0..50).collect();
        let mut tree = tree_with(4, &keys);
        for (i, k) in keys.iter().enumerate() {
            assert!(tree.remove(k, &(i as u64)));
        }

        assert!(tree.is_empty());
        assert_eq!(tree.last_key(), None);
        assert!(tree.range_query(&0, &100).is_empty());
        tree.validate().unwrap();

        tree.insert(25, 1).unwrap();
        assert_eq!(tree.range_query(&0, &100), vec![(25, 1)]);
    }

    #[test]
    fn test_clear() {
        let mut tree = tree_with(4, &[3, 1, 2, 8, 9, 10]);
        tree.clear();
        assert!(tree.is_empty());
        assert_eq!(tree.height(), 1);
        assert_eq!(tree.stats().root_splits, 0);
        assert_eq!(tree.order(), 4);
    }
}
