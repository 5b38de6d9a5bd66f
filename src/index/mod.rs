//! tsindex Index Engine
//!
//! An in-memory B+Tree keyed by timestamp, mapping each key to an opaque
//! record identifier:
//!
//! - **node**: arena node representation (leaves, internal nodes, handles)
//! - **tree**: insertion with top-down splitting, range traversal, validation
//! - **error**: index error types
//!
//! # Architecture
//!
//! ```text
//!                 [ 5 | 9 ]                 internal: routing keys only
//!               /     |     \
//!        [1 3] -> [5 7 8] -> [9 12]         leaves: (key, id) + forward links
//! ```
//!
//! A range query either descends depth-first into every child whose span
//! overlaps `[start, end]` ([`BPlusTree::range_query`]) or descends once and
//! walks the leaf chain ([`BPlusTree::range_scan`]). Both yield the same
//! entries in the same order.
//!
//! Node handles stay internal to the tree; callers only see keys and values:
//!
//! ```compile_fail
//! use tsindex::index::NodeId;
//! ```
//!
//! The index has no persistence of its own. Owners rebuild it from the record
//! store on startup (see [`crate::db::TimeSeriesDb::open`]).

mod error;
mod node;
mod tree;

pub use error::{IndexError, IndexResult, MIN_ORDER};
pub use tree::{BPlusTree, RangeScan, DEFAULT_ORDER};

use serde::{Deserialize, Serialize};

/// What a leaf split does with the entry at the split point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeparatorPolicy {
    /// Promote a copy of the key and keep the entry in the right leaf
    #[default]
    Retain,
    /// Promote the key and drop the entry's value (legacy behavior; a key
    /// that only existed as that entry becomes unreachable)
    Discard,
}

impl std::fmt::Display for SeparatorPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeparatorPolicy::Retain => write!(f, "retain"),
            SeparatorPolicy::Discard => write!(f, "discard"),
        }
    }
}

impl std::str::FromStr for SeparatorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "retain" => Ok(SeparatorPolicy::Retain),
            "discard" => Ok(SeparatorPolicy::Discard),
            other => Err(format!("unknown separator policy: {}", other)),
        }
    }
}

/// Statistics about index shape and growth
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    /// Number of (key, id) entries in leaves
    pub entries: u64,
    /// Node capacity
    pub order: usize,
    /// Levels from root to leaves
    pub height: usize,
    pub leaf_nodes: usize,
    pub internal_nodes: usize,
    pub leaf_splits: u64,
    pub internal_splits: u64,
    /// Times the root overflowed and a new root was grown
    pub root_splits: u64,
}

impl std::fmt::Display for IndexStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Entries: {}, Order: {}, Height: {}, Leaves: {}, Internal: {}, Splits: {} leaf / {} internal / {} root",
            self.entries,
            self.order,
            self.height,
            self.leaf_nodes,
            self.internal_nodes,
            self.leaf_splits,
            self.internal_splits,
            self.root_splits
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_separator_policy_parse() {
        assert_eq!("retain".parse::<SeparatorPolicy>(), Ok(SeparatorPolicy::Retain));
        assert_eq!("DISCARD".parse::<SeparatorPolicy>(), Ok(SeparatorPolicy::Discard));
        assert!("keep".parse::<SeparatorPolicy>().is_err());
        assert_eq!(SeparatorPolicy::default(), SeparatorPolicy::Retain);
    }

    #[test]
    fn test_stats_display() {
        let stats = IndexStats {
            entries: 7,
            order: 4,
            height: 2,
            ..Default::default()
        };
        let text = stats.to_string();
        assert!(text.contains("Entries: 7"));
        assert!(text.contains("Height: 2"));
    }
}
