use std::fmt;
use std::fs;
use std::path::Path;

use log::{info, warn};
use serde::de::{self, DeserializeSeed, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ModelError;
use crate::io::{build_output_path, read_file};
use crate::language::Alphabet;
use super::prob_trie::{MAX_LEVELS, ProbabilityTrie};

/// Extension of the model cached next to a corpus file.
pub const MODEL_EXTENSION: &str = "json";

/// Extension of the cache of a model trained with `capitals_only`.
pub const CAPITALS_MODEL_EXTENSION: &str = "capitals.json";

/// One `(character, probability)` pair of a runtime node.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Entry {
	#[serde(rename = "c")]
	ch: char,
	#[serde(rename = "v")]
	probability: f64,
}

impl Entry {
	pub(crate) fn new(ch: char, probability: f64) -> Self {
		Self { ch, probability }
	}

	pub fn char(&self) -> char {
		self.ch
	}

	pub fn probability(&self) -> f64 {
		self.probability
	}
}

/// Immutable node of a [`ProbabilityTree`].
///
/// `entries` lists the characters observed after this context with their
/// probability (summing to 1), `next` holds the child context of each entry at
/// the same position, and `end_probability` holds one word-end probability per
/// backtrack depth.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct TreeNode {
	#[serde(rename = "p")]
	entries: Vec<Entry>,
	#[serde(rename = "e")]
	end_probability: Vec<f64>,
	#[serde(rename = "n")]
	next: Vec<TreeNode>,
}

impl TreeNode {
	pub(crate) fn new(entries: Vec<Entry>, end_probability: Vec<f64>, next: Vec<TreeNode>) -> Self {
		Self { entries, end_probability, next }
	}

	pub(crate) fn empty(levels: usize) -> Self {
		Self::new(Vec::new(), vec![0.0; levels], Vec::new())
	}

	pub fn entries(&self) -> &[Entry] {
		&self.entries
	}

	pub fn end_probability(&self) -> &[f64] {
		&self.end_probability
	}

	pub fn children(&self) -> &[TreeNode] {
		&self.next
	}

	/// Child context reached by `c`, `None` if `c` was never observed here.
	pub fn child_by_char(&self, c: char) -> Option<&TreeNode> {
		let position = self.entries.iter().position(|entry| entry.ch == c)?;
		self.next.get(position)
	}

	/// Resolves `trail` one character at a time.
	///
	/// An empty trail resolves to the node itself.
	pub fn child_by_trail(&self, trail: &[char]) -> Option<&TreeNode> {
		match trail.split_first() {
			None => Some(self),
			Some((&c, rest)) => self.child_by_char(c)?.child_by_trail(rest),
		}
	}

	/// Weighted sampling of a character.
	///
	/// Walks the entries in stored order accumulating their probability and
	/// returns the first character whose cumulative mass reaches `prob`. The
	/// last entry absorbs rounding errors.
	///
	/// # Errors
	/// `EmptyDistribution` if the node has no entries.
	pub fn char_from_prob(&self, prob: f64) -> Result<char, ModelError> {
		let mut cumulative = 0.0;
		for entry in &self.entries {
			cumulative += entry.probability;
			if prob <= cumulative {
				return Ok(entry.ch);
			}
		}
		self.entries.last().map(|entry| entry.ch).ok_or(ModelError::EmptyDistribution)
	}

	fn validate(&self, alphabet: &Alphabet, levels: usize, depth: usize) -> Result<(), ModelError> {
		let malformed = |reason: String| Err(ModelError::MalformedSerializedInput(reason));

		if depth > levels {
			return malformed(format!("node depth {depth} exceeds {levels} levels"));
		}
		if self.end_probability.len() != levels {
			return malformed(format!(
				"node at depth {depth} has {} end probabilities, expected {levels}",
				self.end_probability.len()
			));
		}
		if self.entries.len() != self.next.len() {
			return malformed(format!(
				"node at depth {depth} has {} entries but {} children",
				self.entries.len(),
				self.next.len()
			));
		}
		if let Some(p) = self.end_probability.iter().find(|p| !(0.0..=1.0).contains(*p)) {
			return malformed(format!("end probability {p} is out of range"));
		}
		for entry in &self.entries {
			if !alphabet.chars().contains(&entry.ch) {
				return malformed(format!("character {:?} is not part of alphabet '{alphabet}'", entry.ch));
			}
			if !(0.0..=1.0).contains(&entry.probability) {
				return malformed(format!("probability {} of {:?} is out of range", entry.probability, entry.ch));
			}
		}
		self.next.iter().try_for_each(|child| child.validate(alphabet, levels, depth + 1))
	}
}

impl<'de> Deserialize<'de> for TreeNode {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		NodeSeed { depth: 0 }.deserialize(deserializer)
	}
}

#[derive(Deserialize)]
#[serde(field_identifier)]
enum NodeField {
	#[serde(rename = "p")]
	Entries,
	#[serde(rename = "e")]
	EndProbability,
	#[serde(rename = "n")]
	Next,
	#[serde(other)]
	Other,
}

const NODE_FIELDS: &[&str] = &["p", "e", "n"];

/// Decodes a node found `depth` levels below the root.
///
/// Nesting stops with an error past `MAX_LEVELS`, before the decoder recurses
/// any further.
#[derive(Clone, Copy)]
struct NodeSeed {
	depth: usize,
}

impl<'de> DeserializeSeed<'de> for NodeSeed {
	type Value = TreeNode;

	fn deserialize<D>(self, deserializer: D) -> Result<TreeNode, D::Error>
	where
		D: Deserializer<'de>,
	{
		if self.depth > MAX_LEVELS {
			return Err(de::Error::custom(format_args!("node nesting exceeds {MAX_LEVELS} levels")));
		}
		deserializer.deserialize_struct("TreeNode", NODE_FIELDS, self)
	}
}

impl<'de> Visitor<'de> for NodeSeed {
	type Value = TreeNode;

	fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
		formatter.write_str("a tree node as {p, e, n}")
	}

	fn visit_seq<A>(self, mut seq: A) -> Result<TreeNode, A::Error>
	where
		A: SeqAccess<'de>,
	{
		let entries = seq.next_element()?.ok_or_else(|| de::Error::invalid_length(0, &self))?;
		let end_probability = seq.next_element()?.ok_or_else(|| de::Error::invalid_length(1, &self))?;
		let next = seq
			.next_element_seed(ChildrenSeed { depth: self.depth + 1 })?
			.ok_or_else(|| de::Error::invalid_length(2, &self))?;
		Ok(TreeNode::new(entries, end_probability, next))
	}

	fn visit_map<A>(self, mut map: A) -> Result<TreeNode, A::Error>
	where
		A: MapAccess<'de>,
	{
		let mut entries = None;
		let mut end_probability = None;
		let mut next = None;
		while let Some(field) = map.next_key()? {
			match field {
				NodeField::Entries => entries = Some(map.next_value()?),
				NodeField::EndProbability => end_probability = Some(map.next_value()?),
				NodeField::Next => next = Some(map.next_value_seed(ChildrenSeed { depth: self.depth + 1 })?),
				NodeField::Other => {
					map.next_value::<IgnoredAny>()?;
				}
			}
		}
		Ok(TreeNode::new(
			entries.ok_or_else(|| de::Error::missing_field("p"))?,
			end_probability.ok_or_else(|| de::Error::missing_field("e"))?,
			next.ok_or_else(|| de::Error::missing_field("n"))?,
		))
	}
}

/// Decodes the children list of a node, each child one level deeper.
struct ChildrenSeed {
	depth: usize,
}

impl<'de> DeserializeSeed<'de> for ChildrenSeed {
	type Value = Vec<TreeNode>;

	fn deserialize<D>(self, deserializer: D) -> Result<Vec<TreeNode>, D::Error>
	where
		D: Deserializer<'de>,
	{
		deserializer.deserialize_seq(self)
	}
}

impl<'de> Visitor<'de> for ChildrenSeed {
	type Value = Vec<TreeNode>;

	fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
		formatter.write_str("a list of tree nodes")
	}

	fn visit_seq<A>(self, mut seq: A) -> Result<Vec<TreeNode>, A::Error>
	where
		A: SeqAccess<'de>,
	{
		let mut children = Vec::new();
		while let Some(child) = seq.next_element_seed(NodeSeed { depth: self.depth })? {
			children.push(child);
		}
		Ok(children)
	}
}

/// Immutable runtime probability tree.
///
/// Produced by [`ProbabilityTrie::normalize`] or loaded from disk. It never
/// changes afterwards, so a single tree can serve any number of concurrent
/// generation calls.
///
/// # Serialized form
/// Field names are reduced to one letter: `g` (language), `l` (levels),
/// `r` (root), and per node `p` (entries, each `{c, v}`), `e` (end
/// probabilities), `n` (children).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ProbabilityTree {
	#[serde(rename = "g")]
	alphabet: Alphabet,
	#[serde(rename = "l")]
	levels: usize,
	#[serde(rename = "r")]
	root: TreeNode,
}

impl ProbabilityTree {
	pub(crate) fn from_parts(alphabet: Alphabet, levels: usize, root: TreeNode) -> Self {
		Self { alphabet, levels, root }
	}

	pub fn alphabet(&self) -> &Alphabet {
		&self.alphabet
	}

	/// Order the tree was trained with.
	pub fn levels(&self) -> usize {
		self.levels
	}

	pub fn root(&self) -> &TreeNode {
		&self.root
	}

	/// Node for the context `trail`, starting at the root.
	pub fn child_by_trail(&self, trail: &[char]) -> Option<&TreeNode> {
		self.root.child_by_trail(trail)
	}

	/// Checks the structural invariants of a tree read from outside.
	fn validate(self) -> Result<Self, ModelError> {
		if self.levels == 0 || self.levels > MAX_LEVELS {
			return Err(ModelError::MalformedSerializedInput(format!(
				"levels must be within 1..={MAX_LEVELS}, got {}",
				self.levels
			)));
		}
		self.root.validate(&self.alphabet, self.levels, 0)?;
		Ok(self)
	}

	/// Serializes the tree to its key-minified JSON form.
	pub fn to_json(&self) -> Result<String, ModelError> {
		Ok(serde_json::to_string(self).map_err(std::io::Error::from)?)
	}

	/// Parses and validates a key-minified JSON tree.
	///
	/// # Errors
	/// `MalformedSerializedInput` on missing keys, unknown language or any
	/// structural inconsistency.
	pub fn from_json(json: &str) -> Result<Self, ModelError> {
		let tree: Self = serde_json::from_str(json)
			.map_err(|e| ModelError::MalformedSerializedInput(e.to_string()))?;
		tree.validate()
	}

	/// Serializes the tree with `postcard`.
	pub fn to_bytes(&self) -> Result<Vec<u8>, ModelError> {
		postcard::to_stdvec(self).map_err(|e| ModelError::Io(std::io::Error::other(e)))
	}

	/// Decodes and validates a `postcard` tree.
	///
	/// # Errors
	/// `MalformedSerializedInput` on truncated input or nodes nested deeper
	/// than `MAX_LEVELS`, which is rejected while decoding.
	pub fn from_bytes(bytes: &[u8]) -> Result<Self, ModelError> {
		let tree: Self = postcard::from_bytes(bytes)
			.map_err(|e| ModelError::MalformedSerializedInput(e.to_string()))?;
		tree.validate()
	}

	pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ModelError> {
		fs::write(&path, self.to_json()?)?;
		info!("Saved model to {}", path.as_ref().display());
		Ok(())
	}

	pub async fn save_async<P: AsRef<Path>>(&self, path: P) -> Result<(), ModelError> {
		tokio::fs::write(&path, self.to_json()?).await?;
		info!("Saved model to {}", path.as_ref().display());
		Ok(())
	}

	pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
		let json = fs::read_to_string(&path)?;
		let tree = Self::from_json(&json)?;
		info!("Loaded model from {}", path.as_ref().display());
		Ok(tree)
	}

	pub async fn load_async<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
		let json = tokio::fs::read_to_string(&path).await?;
		let tree = Self::from_json(&json)?;
		info!("Loaded model from {}", path.as_ref().display());
		Ok(tree)
	}

	pub fn save_binary<P: AsRef<Path>>(&self, path: P) -> Result<(), ModelError> {
		fs::write(&path, self.to_bytes()?)?;
		info!("Saved binary model to {}", path.as_ref().display());
		Ok(())
	}

	pub fn load_binary<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
		let bytes = fs::read(&path)?;
		Self::from_bytes(&bytes)
	}

	/// Builds a tree from a corpus file, reusing the cached model if any.
	///
	/// # Parameters
	/// - `corpus`: text file, one or more words per line.
	/// - `alphabet`, `levels`, `capitals_only`: training settings.
	///
	/// # Behavior
	/// - Looks for `<corpus stem>.json` next to the corpus, or
	///   `<corpus stem>.capitals.json` when `capitals_only` is set.
	/// - If it exists and was trained with the same alphabet and levels, it
	///   is loaded as is.
	/// - Otherwise the corpus is learned, normalized, and the result is
	///   written to that path for the next call.
	pub fn from_corpus<P: AsRef<Path>>(
		corpus: P,
		alphabet: Alphabet,
		levels: usize,
		capitals_only: bool,
	) -> Result<Self, ModelError> {
		let extension = if capitals_only { CAPITALS_MODEL_EXTENSION } else { MODEL_EXTENSION };
		let model_path = build_output_path(&corpus, extension)?;
		if model_path.exists() {
			let cached = Self::load(&model_path)?;
			if cached.alphabet == alphabet && cached.levels == levels {
				return Ok(cached);
			}
			warn!(
				"Cached model {} was trained with ({}, {} levels), retraining",
				model_path.display(),
				cached.alphabet,
				cached.levels
			);
		}

		let mut trie = ProbabilityTrie::new(alphabet, levels)?;
		trie.parse_text_lines(read_file(&corpus)?, capitals_only);
		let tree = trie.normalize();
		tree.save(&model_path)?;
		Ok(tree)
	}
}
