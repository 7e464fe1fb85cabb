use std::path::Path;

use log::info;

use crate::error::ModelError;
use crate::io::read_file;
use crate::language::Alphabet;
use super::char_trail::CharTrail;
use super::prob_tree::{Entry, ProbabilityTree, TreeNode};

/// Highest order a model can be trained with.
///
/// Keeps every persisted model within the nesting the decoders accept, so
/// anything that can be saved can be loaded back.
pub const MAX_LEVELS: usize = 32;

/// One context of the trainable trie.
///
/// A node stores, for every alphabet position, how many times that character
/// followed the context leading to this node, plus how many words ended here
/// for each backtrack depth.
///
/// ## Invariants
/// - `counts` and `children` are sized to the alphabet length
/// - `end_counts` is sized to the trie order (`levels`)
/// - a child exists at position `i` as soon as `counts[i]` has been incremented
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrieNode {
	counts: Vec<u64>,
	end_counts: Vec<u64>,
	children: Vec<Option<Box<TrieNode>>>,
}

impl TrieNode {
	fn new(alphabet_len: usize, levels: usize) -> Self {
		Self {
			counts: vec![0; alphabet_len],
			end_counts: vec![0; levels],
			children: vec![None; alphabet_len],
		}
	}

	/// Raw occurrence count of the character at `index`.
	pub fn count(&self, index: usize) -> u64 {
		self.counts.get(index).copied().unwrap_or(0)
	}

	/// Sum of all raw counts, computed on demand.
	pub fn total(&self) -> u64 {
		self.counts.iter().sum()
	}

	/// End-of-word count recorded for backtrack depth `depth`.
	pub fn end_count(&self, depth: usize) -> u64 {
		self.end_counts.get(depth).copied().unwrap_or(0)
	}

	pub fn end_counts(&self) -> &[u64] {
		&self.end_counts
	}

	pub fn child(&self, index: usize) -> Option<&TrieNode> {
		self.children.get(index)?.as_deref()
	}

	/// Walks `trail` from this node, counting each step and creating
	/// missing children on the way.
	fn increment_trail(&mut self, trail: &[usize], alphabet_len: usize, levels: usize) {
		if let Some((&index, rest)) = trail.split_first() {
			self.counts[index] += 1;
			self.children[index]
				.get_or_insert_with(|| Box::new(TrieNode::new(alphabet_len, levels)))
				.increment_trail(rest, alphabet_len, levels);
		}
	}

	/// Follows `trail` while children exist, then bumps the first `depths`
	/// end counts of the node reached. Never creates nodes.
	fn increment_end(&mut self, trail: &[usize], depths: usize) {
		if let Some((&index, rest)) = trail.split_first() {
			if let Some(child) = self.children[index].as_deref_mut() {
				return child.increment_end(rest, depths);
			}
		}
		for count in self.end_counts.iter_mut().take(depths) {
			*count += 1;
		}
	}

	fn merge(&mut self, other: &Self) {
		for (count, add) in self.counts.iter_mut().zip(&other.counts) {
			*count += add;
		}
		for (count, add) in self.end_counts.iter_mut().zip(&other.end_counts) {
			*count += add;
		}
		for (child, other_child) in self.children.iter_mut().zip(&other.children) {
			let Some(added) = other_child else { continue };
			match child {
				Some(existing) => existing.merge(added),
				None => *child = Some(added.clone()),
			}
		}
	}

	/// Converts raw counts into a runtime node, recursively.
	///
	/// # Behavior
	/// - `end_probability[i] = end[i] / (total + end[i])`, `0.0` when both are zero
	/// - one `(char, count / total)` entry per nonzero count, in alphabet order
	/// - children share the index of their entry
	///
	/// A node whose counts are all zero yields a node without entries.
	fn normalize(&self, alphabet: &Alphabet) -> TreeNode {
		let total = self.total();
		let levels = self.end_counts.len();

		let end_probability = self
			.end_counts
			.iter()
			.map(|&end| {
				let denominator = total + end;
				if denominator == 0 { 0.0 } else { end as f64 / denominator as f64 }
			})
			.collect();

		let mut entries = Vec::new();
		let mut next = Vec::new();
		for (index, &count) in self.counts.iter().enumerate() {
			if count == 0 {
				continue;
			}
			let Some(c) = alphabet.char_at(index) else { continue };
			entries.push(Entry::new(c, count as f64 / total as f64));
			next.push(match self.child(index) {
				Some(child) => child.normalize(alphabet),
				None => TreeNode::empty(levels),
			});
		}

		TreeNode::new(entries, end_probability, next)
	}
}

/// Trainable, mutable probability trie.
///
/// The trie accumulates raw character counts for every context of length
/// `0..levels` found in a corpus, along with word-end counts. Once training
/// is over, [`ProbabilityTrie::normalize`] freezes it into a
/// [`ProbabilityTree`] used for generation.
///
/// # Invariants
/// - `levels >= 1`
/// - the trie depth from the root never exceeds `levels`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbabilityTrie {
	alphabet: Alphabet,
	levels: usize,
	root: TrieNode,
}

impl ProbabilityTrie {
	/// Creates an empty trie for `alphabet` conditioning on up to `levels`
	/// characters.
	///
	/// # Errors
	/// `InvalidLevels` unless `1 <= levels <= MAX_LEVELS`.
	pub fn new(alphabet: Alphabet, levels: usize) -> Result<Self, ModelError> {
		if levels == 0 || levels > MAX_LEVELS {
			return Err(ModelError::InvalidLevels(levels));
		}
		let root = TrieNode::new(alphabet.len(), levels);
		Ok(Self { alphabet, levels, root })
	}

	pub fn alphabet(&self) -> &Alphabet {
		&self.alphabet
	}

	pub fn levels(&self) -> usize {
		self.levels
	}

	/// The empty context (unconditional letter distribution).
	pub fn root(&self) -> &TrieNode {
		&self.root
	}

	/// Node reached by following `trail` from the root, if it exists.
	pub fn node(&self, trail: &[usize]) -> Option<&TrieNode> {
		trail.iter().try_fold(&self.root, |node, &index| node.child(index))
	}

	/// Encodes `text` with this trie's alphabet and order.
	pub fn char_trail(&self, text: &str) -> Result<CharTrail, ModelError> {
		CharTrail::from_text(text, &self.alphabet, self.levels)
	}

	fn check_trail(&self, trail: &CharTrail) -> Result<(), ModelError> {
		if trail.len() > self.levels {
			return Err(ModelError::TrailMismatch(format!(
				"trail of length {} exceeds {} levels",
				trail.len(),
				self.levels
			)));
		}
		if let Some(index) = trail.indices().iter().find(|&&i| i >= self.alphabet.len()) {
			return Err(ModelError::TrailMismatch(format!(
				"index {index} is outside alphabet '{}'",
				self.alphabet
			)));
		}
		Ok(())
	}

	/// Counts one occurrence of every prefix of `trail`.
	///
	/// Walks the trie from the root; at each index the count of that
	/// position is incremented in the current node, the child is created if
	/// absent and becomes the current node.
	///
	/// # Errors
	/// `TrailMismatch` if the trail is longer than `levels` or holds an index
	/// outside the alphabet.
	pub fn increment_char_trail(&mut self, trail: &CharTrail) -> Result<(), ModelError> {
		self.check_trail(trail)?;
		self.root.increment_trail(trail.indices(), self.alphabet.len(), self.levels);
		Ok(())
	}

	/// Records the end of a word whose last characters are `trail`.
	///
	/// # Parameters
	/// - `trail`: the last (up to `levels`) characters of the word.
	/// - `back_track`: backtrack depth already consumed, `0` for the full word.
	///
	/// # Behavior
	/// - Descends along `trail` as far as existing children allow; missing
	///   nodes are not created, the deepest existing node is used.
	/// - Increments `end_counts[0 .. levels - back_track]` of that node.
	/// - Repeats with the trail minus its first character and a backtrack
	///   depth of `trail.len() - 2`, so every shorter suffix context also
	///   carries an end-of-word signal.
	pub fn increment_end_word(&mut self, trail: &CharTrail, back_track: usize) -> Result<(), ModelError> {
		self.check_trail(trail)?;
		self.increment_end_suffixes(trail.indices(), back_track);
		Ok(())
	}

	fn increment_end_suffixes(&mut self, trail: &[usize], back_track: usize) {
		self.root.increment_end(trail, self.levels.saturating_sub(back_track));
		if trail.len() > 1 {
			self.increment_end_suffixes(&trail[1..], trail.len() - 2);
		}
	}

	/// Learns every word found in `lines`.
	///
	/// # Parameters
	/// - `lines`: corpus lines.
	/// - `capitals_only`: only learn words whose first character is uppercase.
	///
	/// # Returns
	/// The number of words learned.
	///
	/// # Behavior
	/// - A word is a maximal run of characters valid in the alphabet
	///   (case-insensitive); anything else, and the end of a line, separates
	///   words.
	/// - Each accepted character is pushed on a sliding trail of `levels`
	///   characters and the whole trail is counted.
	/// - At the end of a word, the trail is recorded as a word end.
	/// - With `capitals_only`, a run whose first character differs from its
	///   own uppercase form is skipped entirely.
	pub fn parse_text_lines<I, S>(&mut self, lines: I, capitals_only: bool) -> usize
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let alphabet_len = self.alphabet.len();
		let mut trail = CharTrail::new(self.levels);
		let mut words = 0;

		for line in lines {
			// Some(false) while skipping a lowercase-initial word
			let mut accepting: Option<bool> = None;
			for c in line.as_ref().chars() {
				let Some(index) = self.alphabet.index_of(c) else {
					if !trail.is_empty() {
						self.increment_end_suffixes(trail.indices(), 0);
						trail.clear();
						words += 1;
					}
					accepting = None;
					continue;
				};

				let accept = *accepting.get_or_insert(!capitals_only || is_capital(c));
				if accept {
					trail.push(index);
					self.root.increment_trail(trail.indices(), alphabet_len, self.levels);
				}
			}
			if !trail.is_empty() {
				self.increment_end_suffixes(trail.indices(), 0);
				trail.clear();
				words += 1;
			}
		}

		info!("Learned {words} words");
		words
	}

	/// Reads a corpus file and learns every word it contains.
	///
	/// See [`ProbabilityTrie::parse_text_lines`].
	pub fn parse_text_file<P: AsRef<Path>>(&mut self, path: P, capitals_only: bool) -> Result<usize, ModelError> {
		let lines = read_file(path)?;
		Ok(self.parse_text_lines(&lines, capitals_only))
	}

	/// Merges another trie into this one.
	///
	/// Counts are additive: merging the tries of two corpora gives the trie
	/// of their concatenation.
	///
	/// # Errors
	/// `IncompatibleModels` if alphabets or orders differ.
	pub fn merge(&mut self, other: &Self) -> Result<(), ModelError> {
		if self.alphabet != other.alphabet || self.levels != other.levels {
			return Err(ModelError::IncompatibleModels(format!(
				"self=({}, {} levels), other=({}, {} levels)",
				self.alphabet, self.levels, other.alphabet, other.levels
			)));
		}
		self.root.merge(&other.root);
		Ok(())
	}

	/// Freezes the raw counts into an immutable [`ProbabilityTree`].
	pub fn normalize(&self) -> ProbabilityTree {
		ProbabilityTree::from_parts(self.alphabet.clone(), self.levels, self.root.normalize(&self.alphabet))
	}
}

/// `true` when `c` is its own uppercase form (caseless characters included).
fn is_capital(c: char) -> bool {
	let mut upper = c.to_uppercase();
	upper.next() == Some(c) && upper.next().is_none()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn abc_trie(levels: usize) -> ProbabilityTrie {
		ProbabilityTrie::new(Alphabet::custom("abc").unwrap(), levels).unwrap()
	}

	#[test]
	fn zero_levels_is_rejected() {
		let result = ProbabilityTrie::new(Alphabet::default(), 0);
		assert!(matches!(result, Err(ModelError::InvalidLevels(0))));
	}

	#[test]
	fn levels_above_the_cap_are_rejected() {
		assert!(ProbabilityTrie::new(Alphabet::default(), MAX_LEVELS).is_ok());
		let result = ProbabilityTrie::new(Alphabet::default(), MAX_LEVELS + 1);
		assert!(matches!(result, Err(ModelError::InvalidLevels(33))));
	}

	#[test]
	fn increment_char_trail_counts_every_prefix() {
		let mut trie = abc_trie(3);
		let trail = trie.char_trail("abc").unwrap();
		trie.increment_char_trail(&trail).unwrap();

		assert_eq!(trie.root().count(0), 1);
		assert_eq!(trie.node(&[0]).unwrap().count(1), 1);
		assert_eq!(trie.node(&[0, 1]).unwrap().count(2), 1);
		// leaf exists but holds no counts
		assert_eq!(trie.node(&[0, 1, 2]).unwrap().total(), 0);
		assert!(trie.node(&[1]).is_none());
	}

	#[test]
	fn increment_end_word_does_not_create_nodes() {
		let mut trie = abc_trie(2);
		let trail = trie.char_trail("ab").unwrap();
		trie.increment_end_word(&trail, 0).unwrap();

		// nothing was counted: both the full and the shortened context fall
		// back to the root
		assert!(trie.node(&[0]).is_none());
		assert_eq!(trie.root().end_counts(), [2, 2]);
	}

	#[test]
	fn increment_end_word_records_suffix_contexts() {
		let mut trie = abc_trie(3);
		for text in ["a", "ab", "abc", "b", "bc", "c"] {
			let trail = trie.char_trail(text).unwrap();
			trie.increment_char_trail(&trail).unwrap();
		}
		let trail = trie.char_trail("abc").unwrap();
		trie.increment_end_word(&trail, 0).unwrap();

		assert_eq!(trie.node(&[0, 1, 2]).unwrap().end_counts(), [1, 1, 1]);
		// "bc" with backtrack depth 1
		assert_eq!(trie.node(&[1, 2]).unwrap().end_counts(), [1, 1, 0]);
		// "c" with backtrack depth 0
		assert_eq!(trie.node(&[2]).unwrap().end_counts(), [1, 1, 1]);
		assert_eq!(trie.root().end_counts(), [0, 0, 0]);
	}

	#[test]
	fn oversized_trails_are_rejected() {
		let mut trie = abc_trie(2);
		let trail = CharTrail::from_text("abc", trie.alphabet(), 3).unwrap();
		assert!(matches!(trie.increment_char_trail(&trail), Err(ModelError::TrailMismatch(_))));

		let mut trail = CharTrail::new(2);
		trail.push(7);
		assert!(matches!(trie.increment_end_word(&trail, 0), Err(ModelError::TrailMismatch(_))));
	}

	#[test]
	fn two_short_words_fill_the_first_letter_context() {
		let mut trie = abc_trie(2);
		let words = trie.parse_text_lines(["ab ac"], false);
		assert_eq!(words, 2);

		let root = trie.root();
		assert_eq!((root.count(0), root.count(1), root.count(2)), (4, 0, 0));
		assert_eq!(root.total(), 4);

		let a = trie.node(&[0]).unwrap();
		assert_eq!((a.count(1), a.count(2)), (1, 1));
		assert_eq!(a.total(), 2);

		assert_eq!(trie.node(&[0, 1]).unwrap().end_counts(), [1, 1]);
		assert_eq!(trie.node(&[0, 2]).unwrap().end_counts(), [1, 1]);
		// the shortened contexts "b" and "c" do not exist and land on the root
		assert_eq!(root.end_counts(), [2, 2]);
	}

	#[test]
	fn parse_text_lines_slides_the_window() {
		let mut trie = abc_trie(2);
		trie.parse_text_lines(["abc"], false);

		// windows: "a", "ab", "bc"
		assert_eq!(trie.root().count(0), 2);
		assert_eq!(trie.root().count(1), 1);
		assert_eq!(trie.node(&[1]).unwrap().count(2), 1);
	}

	#[test]
	fn words_do_not_span_lines() {
		let mut joined = abc_trie(2);
		joined.parse_text_lines(["ab", "ca"], false);
		let mut split = abc_trie(2);
		split.parse_text_lines(["ab ca"], false);
		assert_eq!(joined, split);
	}

	#[test]
	fn capitals_only_skips_lowercase_words() {
		let mut trie = abc_trie(2);
		let words = trie.parse_text_lines(["abc Bca cAb"], true);
		assert_eq!(words, 1);
		assert_eq!(trie.root().count(1), 2);
		assert_eq!(trie.root().count(0), 0);
		assert_eq!(trie.root().count(2), 1);
	}

	#[test]
	fn word_order_within_a_line_does_not_matter() {
		let mut forward = abc_trie(3);
		forward.parse_text_lines(["abc cab ba"], false);
		let mut backward = abc_trie(3);
		backward.parse_text_lines(["ba cab abc"], false);
		assert_eq!(forward, backward);
	}

	#[test]
	fn merge_equals_training_on_both_corpora() {
		let mut left = abc_trie(2);
		left.parse_text_lines(["abc cab"], false);
		let mut right = abc_trie(2);
		right.parse_text_lines(["bca", "cc"], false);

		let mut both = abc_trie(2);
		both.parse_text_lines(["abc cab", "bca", "cc"], false);

		left.merge(&right).unwrap();
		assert_eq!(left, both);
	}

	#[test]
	fn merge_rejects_other_orders() {
		let mut left = abc_trie(2);
		let right = abc_trie(3);
		assert!(matches!(left.merge(&right), Err(ModelError::IncompatibleModels(_))));
	}

	#[test]
	fn normalize_handles_all_zero_nodes() {
		let trie = abc_trie(2);
		let tree = trie.normalize();
		assert!(tree.root().entries().is_empty());
		assert_eq!(tree.root().end_probability(), [0.0, 0.0]);
	}

	#[test]
	fn normalize_divides_by_sibling_total() {
		let mut trie = abc_trie(2);
		trie.parse_text_lines(["ab ac"], false);
		let tree = trie.normalize();

		let root = tree.root();
		assert_eq!(root.entries().len(), 1);
		assert_eq!(root.entries()[0].char(), 'a');
		assert_eq!(root.entries()[0].probability(), 1.0);
		// 2 word ends against 4 continuations
		assert_eq!(root.end_probability(), [2.0 / 6.0, 2.0 / 6.0]);

		let a = root.child_by_char('a').unwrap();
		let probabilities: Vec<(char, f64)> = a.entries().iter().map(|e| (e.char(), e.probability())).collect();
		assert_eq!(probabilities, vec![('b', 0.5), ('c', 0.5)]);
		assert_eq!(a.children().len(), 2);
	}
}
