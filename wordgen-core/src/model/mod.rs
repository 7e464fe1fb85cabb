//! Variable-order character model.
//!
//! Training flows through the modules in this order:
//! - `char_trail`: bounded window of alphabet indices used as a trie key
//! - `prob_trie`: mutable trie accumulating raw counts (`ProbabilityTrie`)
//! - `prob_tree`: immutable normalized tree and its persistence (`ProbabilityTree`)
//! - `generation`: word generation over a `ProbabilityTree`

/// Bounded sliding window of alphabet indices.
pub mod char_trail;

/// Trainable probability trie.
///
/// Counts character occurrences for every context up to the model order,
/// records word ends per backtrack depth and normalizes into a tree.
pub mod prob_trie;

/// Immutable probability tree.
///
/// Context lookups, weighted sampling and serialization.
pub mod prob_tree;

/// Word generation options and algorithm.
pub mod generation;
