use crate::error::ModelError;
use crate::language::Alphabet;

/// Bounded window over the most recent alphabet indices.
///
/// Holds at most `levels` indices; pushing onto a full trail drops the
/// oldest one. A trail is the key used to walk a `ProbabilityTrie`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CharTrail {
	levels: usize,
	indices: Vec<usize>,
}

impl CharTrail {
	/// Creates an empty trail bounded to `levels` indices.
	pub fn new(levels: usize) -> Self {
		Self { levels, indices: Vec::with_capacity(levels + 1) }
	}

	/// Encodes `text` with `alphabet`, keeping only the last `levels` indices.
	///
	/// # Errors
	/// `InvalidCharacter` on the first character (lowercased) that is not
	/// part of the alphabet.
	pub fn from_text(text: &str, alphabet: &Alphabet, levels: usize) -> Result<Self, ModelError> {
		let mut trail = Self::new(levels);
		for c in text.chars() {
			let index = alphabet.index_of(c).ok_or_else(|| ModelError::InvalidCharacter {
				character: c,
				alphabet: alphabet.id().to_owned(),
			})?;
			trail.push(index);
		}
		Ok(trail)
	}

	/// Appends an index, trimming the front once `levels` is exceeded.
	pub fn push(&mut self, index: usize) {
		self.indices.push(index);
		if self.indices.len() > self.levels {
			self.indices.remove(0);
		}
	}

	pub fn clear(&mut self) {
		self.indices.clear();
	}

	pub fn len(&self) -> usize {
		self.indices.len()
	}

	pub fn is_empty(&self) -> bool {
		self.indices.is_empty()
	}

	pub fn levels(&self) -> usize {
		self.levels
	}

	/// Indices from oldest to newest.
	pub fn indices(&self) -> &[usize] {
		&self.indices
	}
}
