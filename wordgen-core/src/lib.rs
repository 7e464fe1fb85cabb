//! Pseudo-word generation from a variable-order character Markov model.
//!
//! This crate provides:
//! - Alphabets (character sets per language) and char-trail encoding
//! - A trainable probability trie counting every context up to a fixed order
//! - Normalization into an immutable probability tree
//! - Random-walk word generation with context backoff and a tunable
//!   stopping rule
//! - Compact persistence of the tree (minified JSON or `postcard`)
//!
//! ```no_run
//! use wordgen_core::{Alphabet, GenerateOptions, ProbabilityTrie};
//!
//! # fn main() -> Result<(), wordgen_core::ModelError> {
//! let mut trie = ProbabilityTrie::new(Alphabet::from_id("enEN")?, 3)?;
//! trie.parse_text_lines(["Hello wonderful world"], false);
//! let tree = trie.normalize();
//! let word = tree.generate_word(&GenerateOptions::new(4, 9)?)?;
//! # Ok(())
//! # }
//! ```

/// Error type shared by every fallible operation.
pub mod error;

/// Alphabet registry: built-in language character sets and custom ones.
pub mod language;

/// Training trie, runtime tree and word generation.
pub mod model;

/// I/O utilities (corpus loading, path helpers).
///
/// Not exposed
pub(crate) mod io;

pub use error::ModelError;
pub use language::Alphabet;
pub use model::char_trail::CharTrail;
pub use model::generation::{EndFactor, GenerateOptions, WeightedEndFactor};
pub use model::prob_tree::{Entry, ProbabilityTree, TreeNode};
pub use model::prob_trie::{MAX_LEVELS, ProbabilityTrie, TrieNode};
