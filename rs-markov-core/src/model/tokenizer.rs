use crate::config::TokenizerKind;
use crate::error::Result;

use super::dictionary::Vocabulary;

/// Punctuation removed during normalization.
///
/// `-`, `'` and whitespace are kept on purpose: they are part of names.
pub const PUNCTUATION: &str = "!\"#$%&()*+,./:;<=>?@[\\]^_`{|}~";

/// Character-level tokenizer.
///
/// Lower-cases the input, drops [`PUNCTUATION`], and emits one token per
/// remaining character (spaces included).
#[derive(Debug, Clone, Default)]
pub struct CharTokenizer {
	vocabulary: Vocabulary,
}

impl CharTokenizer {
	pub fn new() -> Self {
		Self::default()
	}

	/// Splits a raw string into normalized character tokens.
	pub fn normalize(text: &str) -> Vec<String> {
		text.chars()
			.flat_map(char::to_lowercase)
			.filter(|c| !PUNCTUATION.contains(*c))
			.map(String::from)
			.collect()
	}

	/// Builds a fresh vocabulary from `sequences`.
	pub fn fit<S: AsRef<str>>(&mut self, sequences: &[S]) {
		let normalized: Vec<Vec<String>> = sequences.iter().map(|s| Self::normalize(s.as_ref())).collect();
		self.vocabulary = Vocabulary::new();
		self.vocabulary.fit(&normalized);
	}

	/// Normalizes then maps every string to ids.
	pub fn tokenize<S: AsRef<str>>(&self, sequences: &[S]) -> Result<Vec<Vec<usize>>> {
		let normalized: Vec<Vec<String>> = sequences.iter().map(|s| Self::normalize(s.as_ref())).collect();
		self.vocabulary.transform(&normalized)
	}

	/// Concatenates the tokens of `ids`.
	pub fn detokenize(&self, ids: &[usize]) -> Result<String> {
		ids.iter().map(|id| self.vocabulary.id_to_token(*id)).collect()
	}

	pub fn vocabulary(&self) -> &Vocabulary {
		&self.vocabulary
	}
}

/// Tokenizer variants.
///
/// Closed set, chosen from [`TokenizerKind`]. A subword variant would be
/// added here together with its configuration name.
#[derive(Debug, Clone)]
pub enum Tokenizer {
	Char(CharTokenizer),
}

impl Tokenizer {
	/// Creates an unfitted tokenizer of the requested kind.
	pub fn new(kind: TokenizerKind) -> Self {
		match kind {
			TokenizerKind::Char => Self::Char(CharTokenizer::new()),
		}
	}

	/// Normalizes `sequences` and fits the vocabulary on them.
	pub fn fit<S: AsRef<str>>(&mut self, sequences: &[S]) {
		match self {
			Self::Char(tokenizer) => tokenizer.fit(sequences),
		}
	}

	/// Converts raw strings to id sequences.
	///
	/// # Errors
	/// - [`MarkovError::Unfit`](crate::error::MarkovError::Unfit) before `fit`
	/// - [`MarkovError::TokenNotFound`](crate::error::MarkovError::TokenNotFound)
	///   for a token never seen during `fit`
	pub fn tokenize<S: AsRef<str>>(&self, sequences: &[S]) -> Result<Vec<Vec<usize>>> {
		match self {
			Self::Char(tokenizer) => tokenizer.tokenize(sequences),
		}
	}

	/// Converts ids back to text.
	pub fn detokenize(&self, ids: &[usize]) -> Result<String> {
		match self {
			Self::Char(tokenizer) => tokenizer.detokenize(ids),
		}
	}

	pub fn vocabulary(&self) -> &Vocabulary {
		match self {
			Self::Char(tokenizer) => tokenizer.vocabulary(),
		}
	}

	pub fn kind(&self) -> TokenizerKind {
		match self {
			Self::Char(_) => TokenizerKind::Char,
		}
	}
}
