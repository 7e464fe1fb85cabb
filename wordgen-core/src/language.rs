use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Identifier of the alphabet used when none is given.
pub const DEFAULT_LANGUAGE: &str = "enEN";

/// Prefix of inline alphabet identifiers (`custom:abc`).
const CUSTOM_PREFIX: &str = "custom:";

const BUILTIN: &[(&str, &str)] = &[
	("enEN", "abcdefghijklmnopqrstuvwxyz"),
	("enEN_dashed", "abcdefghijklmnopqrstuvwxyz-"),
	("deDE", "abcdefghijklmnopqrstuvwxyzäöüß"),
	("deDE_dashed", "abcdefghijklmnopqrstuvwxyzäöüß-"),
	("frFR", "abcdefghijklmnopqrstuvwxyz'àéèìòùçâêîôûäëïüœ"),
	("frFR_dashed", "abcdefghijklmnopqrstuvwxyz'àéèìòùçâêîôûäëïüœ-"),
];

/// Ordered character set of one language.
///
/// The position of a character in the set is its index in every trie node.
/// Lookups are case-insensitive: the queried character is lowercased first,
/// the stored characters are all lowercase.
///
/// An alphabet is identified by a string: one of the built-in language ids
/// (`enEN`, `deDE`, `frFR` and their `_dashed` variants) or an inline
/// `custom:<characters>` id. The id is what gets persisted with a model.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(try_from = "String", into = "String")]
pub struct Alphabet {
	id: String,
	chars: Vec<char>,
}

impl Alphabet {
	/// Resolves a language identifier.
	///
	/// # Errors
	/// - `UnknownLanguage` if the id is neither built-in nor `custom:`.
	/// - `InvalidAlphabet` if a custom character set is empty, contains
	///   duplicates or uppercase characters.
	pub fn from_id(id: &str) -> Result<Self, ModelError> {
		if let Some((_, chars)) = BUILTIN.iter().find(|(name, _)| *name == id) {
			return Ok(Self { id: id.to_owned(), chars: chars.chars().collect() });
		}
		match id.strip_prefix(CUSTOM_PREFIX) {
			Some(chars) => Self::custom(chars),
			None => Err(ModelError::UnknownLanguage(id.to_owned())),
		}
	}

	/// Builds an alphabet from an explicit character sequence.
	pub fn custom(chars: &str) -> Result<Self, ModelError> {
		let chars: Vec<char> = chars.chars().collect();
		if chars.is_empty() {
			return Err(ModelError::InvalidAlphabet("alphabet is empty".to_owned()));
		}
		for (i, c) in chars.iter().enumerate() {
			if lowercase(*c) != *c {
				return Err(ModelError::InvalidAlphabet(format!("{c:?} is not lowercase")));
			}
			if chars[..i].contains(c) {
				return Err(ModelError::InvalidAlphabet(format!("{c:?} appears twice")));
			}
		}
		let id = format!("{CUSTOM_PREFIX}{}", chars.iter().collect::<String>());
		Ok(Self { id, chars })
	}

	/// Identifier this alphabet was resolved from.
	pub fn id(&self) -> &str {
		&self.id
	}

	/// Number of characters.
	pub fn len(&self) -> usize {
		self.chars.len()
	}

	pub fn is_empty(&self) -> bool {
		self.chars.is_empty()
	}

	pub fn chars(&self) -> &[char] {
		&self.chars
	}

	/// Index of `c` once lowercased, `None` if it is not part of the alphabet.
	pub fn index_of(&self, c: char) -> Option<usize> {
		let c = lowercase(c);
		self.chars.iter().position(|&known| known == c)
	}

	/// Character stored at `index`.
	pub fn char_at(&self, index: usize) -> Option<char> {
		self.chars.get(index).copied()
	}

	pub fn is_valid(&self, c: char) -> bool {
		self.index_of(c).is_some()
	}
}

impl Default for Alphabet {
	fn default() -> Self {
		Self {
			id: DEFAULT_LANGUAGE.to_owned(),
			chars: BUILTIN[0].1.chars().collect(),
		}
	}
}

impl FromStr for Alphabet {
	type Err = ModelError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::from_id(s)
	}
}

impl TryFrom<String> for Alphabet {
	type Error = ModelError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::from_id(&value)
	}
}

impl From<Alphabet> for String {
	fn from(value: Alphabet) -> Self {
		value.id
	}
}

impl fmt::Display for Alphabet {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.id)
	}
}

/// Single-character lowercase form of `c`.
///
/// Characters whose lowercase form expands to several code points are kept
/// as they are; they never match a stored alphabet character.
pub(crate) fn lowercase(c: char) -> char {
	let mut lower = c.to_lowercase();
	match (lower.next(), lower.next()) {
		(Some(l), None) => l,
		_ => c,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn builtin_alphabets_have_distinct_characters() {
		for (id, _) in BUILTIN {
			let alphabet = Alphabet::from_id(id).unwrap();
			for (i, c) in alphabet.chars().iter().enumerate() {
				assert_eq!(alphabet.index_of(*c), Some(i), "{id}: {c}");
			}
		}
	}

	#[test]
	fn lookup_is_case_insensitive() {
		let alphabet = Alphabet::from_id("deDE").unwrap();
		assert_eq!(alphabet.index_of('Ä'), alphabet.index_of('ä'));
		assert!(alphabet.is_valid('Q'));
		assert!(!alphabet.is_valid('-'));
		assert!(Alphabet::from_id("deDE_dashed").unwrap().is_valid('-'));
	}

	#[test]
	fn unknown_language_is_rejected() {
		assert!(matches!(Alphabet::from_id("xxXX"), Err(ModelError::UnknownLanguage(_))));
	}

	#[test]
	fn custom_alphabet_round_trips_through_its_id() {
		let alphabet = Alphabet::custom("abc").unwrap();
		assert_eq!(alphabet.id(), "custom:abc");
		assert_eq!("custom:abc".parse::<Alphabet>().unwrap(), alphabet);
		assert_eq!(alphabet.char_at(2), Some('c'));
		assert_eq!(alphabet.char_at(3), None);
	}

	#[test]
	fn custom_alphabet_must_be_lowercase_and_distinct() {
		assert!(matches!(Alphabet::custom(""), Err(ModelError::InvalidAlphabet(_))));
		assert!(matches!(Alphabet::custom("aba"), Err(ModelError::InvalidAlphabet(_))));
		assert!(matches!(Alphabet::custom("aB"), Err(ModelError::InvalidAlphabet(_))));
	}

	#[test]
	fn default_is_english() {
		assert_eq!(Alphabet::default(), Alphabet::from_id("enEN").unwrap());
	}
}
