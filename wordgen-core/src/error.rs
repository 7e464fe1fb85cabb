use thiserror::Error;

/// Errors produced while training, loading or sampling a model.
#[derive(Debug, Error)]
pub enum ModelError {
	/// A character outside the alphabet reached the char-trail codec.
	#[error("character {character:?} is not part of alphabet '{alphabet}'")]
	InvalidCharacter { character: char, alphabet: String },

	/// Sampling was requested on a node without any probability entry.
	#[error("cannot sample from an empty distribution")]
	EmptyDistribution,

	/// A persisted model is missing keys or is structurally inconsistent.
	#[error("malformed serialized model: {0}")]
	MalformedSerializedInput(String),

	#[error("unknown language '{0}'")]
	UnknownLanguage(String),

	#[error("invalid alphabet: {0}")]
	InvalidAlphabet(String),

	/// A char trail built for another alphabet or order was fed to a trie.
	#[error("char trail does not fit the trie: {0}")]
	TrailMismatch(String),

	#[error("levels must be within 1..={max}, got {0}", max = crate::model::prob_trie::MAX_LEVELS)]
	InvalidLevels(usize),

	#[error("invalid generation options: {0}")]
	InvalidOptions(String),

	/// Two tries with different alphabets or orders cannot be merged.
	#[error("incompatible models: {0}")]
	IncompatibleModels(String),

	#[error(transparent)]
	Io(#[from] std::io::Error),
}
