use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;

use log::trace;
use rand::Rng;

use crate::error::ModelError;
use super::prob_tree::{ProbabilityTree, TreeNode};

/// Decides whether a word stops at its current length.
///
/// Called with the end probability of the current context, the random draw
/// of the step, the current length and the length bounds. Any
/// `Fn(f64, f64, usize, usize, usize) -> bool` is an end factor.
pub trait EndFactor: Send + Sync {
	fn should_end(&self, end_probability: f64, value: f64, length: usize, min_length: usize, max_length: usize) -> bool;
}

impl<F> EndFactor for F
where
	F: Fn(f64, f64, usize, usize, usize) -> bool + Send + Sync,
{
	fn should_end(&self, end_probability: f64, value: f64, length: usize, min_length: usize, max_length: usize) -> bool {
		self(end_probability, value, length, min_length, max_length)
	}
}

/// Cosine-shaped end factor.
///
/// A word may stop when its context has a positive end probability and the
/// draw exceeds `(1 + cos(pi * (length - min) / (max - min))) * weight`.
/// The threshold is `2 * weight` at the minimum length and decays to 0 at the
/// maximum length, so stopping gets likelier as the word grows.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WeightedEndFactor {
	weight: f64,
}

impl WeightedEndFactor {
	pub fn new(weight: f64) -> Self {
		Self { weight }
	}

	pub fn weight(&self) -> f64 {
		self.weight
	}

	/// Value the draw has to exceed at `length`.
	///
	/// When `min_length == max_length` the threshold is NaN and no draw
	/// exceeds it; the word then simply runs to its maximum length.
	pub fn threshold(&self, length: usize, min_length: usize, max_length: usize) -> f64 {
		let span = max_length as f64 - min_length as f64;
		let position = length as f64 - min_length as f64;
		(1.0 + (PI / span * position).cos()) * self.weight
	}
}

impl Default for WeightedEndFactor {
	fn default() -> Self {
		Self::new(1.0)
	}
}

impl EndFactor for WeightedEndFactor {
	fn should_end(&self, end_probability: f64, value: f64, length: usize, min_length: usize, max_length: usize) -> bool {
		end_probability > 0.0 && value > self.threshold(length, min_length, max_length)
	}
}

/// Parameters of one word generation.
///
/// # Responsibilities
/// - Hold the required length bounds (`0 < min_length <= max_length`)
/// - Hold the stopping rule and the optional context/backtrack overrides
///
/// # Fields
/// - `levels`: cap on the context length, at most the tree's order
/// - `end_backtrack`: extra backtrack depth added to the default end slot
///   when `levels` is below the tree's order
/// - `end_prob_index`: explicit end slot, takes precedence over `end_backtrack`
/// - `decouple_draws`: sample the next character with its own random draw
///   instead of reusing the draw of the stop decision
#[derive(Clone)]
pub struct GenerateOptions {
	min_length: usize,
	max_length: usize,
	end_factor: Arc<dyn EndFactor>,

	pub levels: Option<usize>,
	pub end_backtrack: Option<usize>,
	pub end_prob_index: Option<usize>,
	pub decouple_draws: bool,
}

impl GenerateOptions {
	/// Creates options with the default cosine end factor (weight 1).
	///
	/// # Errors
	/// `InvalidOptions` unless `0 < min_length <= max_length`.
	pub fn new(min_length: usize, max_length: usize) -> Result<Self, ModelError> {
		Self::check_lengths(min_length, max_length)?;
		Ok(Self {
			min_length,
			max_length,
			end_factor: Arc::new(WeightedEndFactor::default()),
			levels: None,
			end_backtrack: None,
			end_prob_index: None,
			decouple_draws: false,
		})
	}

	fn check_lengths(min_length: usize, max_length: usize) -> Result<(), ModelError> {
		if min_length == 0 || min_length > max_length {
			return Err(ModelError::InvalidOptions(format!(
				"expected 0 < min_length <= max_length, got {min_length} and {max_length}"
			)));
		}
		Ok(())
	}

	pub fn min_length(&self) -> usize {
		self.min_length
	}

	pub fn max_length(&self) -> usize {
		self.max_length
	}

	pub fn set_lengths(&mut self, min_length: usize, max_length: usize) -> Result<(), ModelError> {
		Self::check_lengths(min_length, max_length)?;
		self.min_length = min_length;
		self.max_length = max_length;
		Ok(())
	}

	pub fn end_factor(&self) -> &dyn EndFactor {
		self.end_factor.as_ref()
	}

	pub fn set_end_factor<E: EndFactor + 'static>(&mut self, end_factor: E) {
		self.end_factor = Arc::new(end_factor);
	}

	pub fn with_end_factor<E: EndFactor + 'static>(mut self, end_factor: E) -> Self {
		self.set_end_factor(end_factor);
		self
	}

	pub fn with_levels(mut self, levels: usize) -> Self {
		self.levels = Some(levels);
		self
	}

	pub fn with_end_backtrack(mut self, end_backtrack: usize) -> Self {
		self.end_backtrack = Some(end_backtrack);
		self
	}

	pub fn with_end_prob_index(mut self, end_prob_index: usize) -> Self {
		self.end_prob_index = Some(end_prob_index);
		self
	}

	pub fn with_decoupled_draws(mut self, decouple_draws: bool) -> Self {
		self.decouple_draws = decouple_draws;
		self
	}
}

impl fmt::Debug for GenerateOptions {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("GenerateOptions")
			.field("min_length", &self.min_length)
			.field("max_length", &self.max_length)
			.field("levels", &self.levels)
			.field("end_backtrack", &self.end_backtrack)
			.field("end_prob_index", &self.end_prob_index)
			.field("decouple_draws", &self.decouple_draws)
			.finish_non_exhaustive()
	}
}

impl ProbabilityTree {
	/// Generates one word using the thread-local random generator.
	///
	/// See [`ProbabilityTree::generate_word_with_rng`].
	pub fn generate_word(&self, options: &GenerateOptions) -> Result<String, ModelError> {
		self.generate_word_with_rng(options, &mut rand::rng())
	}

	/// Generates one word by a random walk over the tree.
	///
	/// # Behavior
	/// - The first character is sampled from the root distribution.
	/// - At each step the character is appended to the word and to a trail of
	///   the last `levels` characters, then a fresh value is drawn.
	/// - The node of the trail is looked up; while it is missing or has no
	///   entries, the oldest trail character is dropped (the root always
	///   matches).
	/// - From `min_length` on, the end factor decides with the node's end
	///   probability whether the word stops.
	/// - Otherwise the next character is sampled from that node, with the
	///   same draw unless `decouple_draws` is set.
	/// - The word never exceeds `max_length` characters; its first character
	///   is uppercased.
	///
	/// # Errors
	/// - `InvalidOptions` if `levels` or `end_prob_index` do not fit the tree.
	/// - `EmptyDistribution` if the root has no entries (untrained model).
	pub fn generate_word_with_rng<R: Rng + ?Sized>(
		&self,
		options: &GenerateOptions,
		rng: &mut R,
	) -> Result<String, ModelError> {
		let levels = self.resolve_levels(options)?;
		let end_index = self.resolve_end_index(options, levels)?;
		let (min_length, max_length) = (options.min_length, options.max_length);

		let mut rnd: f64 = rng.random();
		let mut next_char = self.root().char_from_prob(rnd)?;
		let mut word: Vec<char> = Vec::new();
		let mut trail: Vec<char> = Vec::with_capacity(levels + 1);

		for _ in 0..max_length {
			word.push(next_char);
			trail.push(next_char);
			if trail.len() > levels {
				trail.remove(0);
			}

			rnd = rng.random();
			let node = self.resolve_context(&mut trail)?;

			if word.len() >= min_length {
				let end_probability = node.end_probability().get(end_index).copied().unwrap_or(0.0);
				if options.end_factor.should_end(end_probability, rnd, word.len(), min_length, max_length) {
					break;
				}
			}

			let draw = if options.decouple_draws { rng.random() } else { rnd };
			next_char = node.char_from_prob(draw)?;
		}

		Ok(capitalize(&word))
	}

	/// Deepest node with entries for `trail`, shortening it from the front
	/// until one is found.
	fn resolve_context(&self, trail: &mut Vec<char>) -> Result<&TreeNode, ModelError> {
		loop {
			match self.child_by_trail(trail) {
				Some(node) if !node.entries().is_empty() => return Ok(node),
				_ if trail.is_empty() => return Err(ModelError::EmptyDistribution),
				_ => {
					trace!("No data for context {:?}, backing off", trail);
					trail.remove(0);
				}
			}
		}
	}

	fn resolve_levels(&self, options: &GenerateOptions) -> Result<usize, ModelError> {
		match options.levels {
			None => Ok(self.levels()),
			Some(levels) if levels == 0 || levels > self.levels() => Err(ModelError::InvalidOptions(format!(
				"levels must be within 1..={}, got {levels}",
				self.levels()
			))),
			Some(levels) => Ok(levels),
		}
	}

	/// Slot of the end probability array consulted by the stopping rule.
	///
	/// Defaults to `levels - 1`; `end_backtrack` is added when it stays within
	/// the slots left unused by a reduced `levels`; `end_prob_index` overrides
	/// both.
	fn resolve_end_index(&self, options: &GenerateOptions, levels: usize) -> Result<usize, ModelError> {
		let mut index = levels - 1;
		if let Some(extra) = options.end_backtrack {
			if extra > 0 && extra < self.levels() - levels {
				index += extra;
			}
		}
		if let Some(explicit) = options.end_prob_index {
			index = explicit;
		}
		if index >= self.levels() {
			return Err(ModelError::InvalidOptions(format!(
				"end probability index {index} is outside 0..{}",
				self.levels()
			)));
		}
		Ok(index)
	}
}

/// Uppercases the first character, leaves the others as they are.
///
/// A character whose uppercase form is longer than one character (`ß`) is
/// kept as is so the word length does not change.
fn capitalize(word: &[char]) -> String {
	let mut chars = word.iter().copied();
	let Some(first) = chars.next() else {
		return String::new();
	};
	let mut upper = first.to_uppercase();
	let first = match (upper.next(), upper.next()) {
		(Some(single), None) => single,
		_ => first,
	};
	std::iter::once(first).chain(chars).collect()
}
