use std::collections::{BTreeSet, HashMap};

use crate::error::{MarkovError, Result};

/// Start-of-sequence token.
pub const SOS_TOKEN: &str = "<sos>";
/// End-of-sequence token.
pub const EOS_TOKEN: &str = "<eos>";
/// Left padding token.
pub const PAD_TOKEN: &str = "<pad>";

/// Reserved tokens, in the order they occupy the lowest ids.
pub const SPECIAL_TOKENS: [&str; 3] = [SOS_TOKEN, EOS_TOKEN, PAD_TOKEN];

/// Bidirectional mapping between tokens and dense ids.
///
/// # Invariants
/// - ids are `0..size()`, the position of the token in `tokens`
/// - `<sos>`, `<eos>` and `<pad>` always hold ids 0, 1 and 2
/// - corpus tokens follow in lexicographic order
/// - empty means "not fitted": every accessor fails with [`MarkovError::Unfit`]
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
	/// id → token
	tokens: Vec<String>,
	/// token → id
	ids: HashMap<String, usize>,
}

impl Vocabulary {
	/// Creates an empty, unfitted vocabulary.
	pub fn new() -> Self {
		Self::default()
	}

	fn fit_check(&self) -> Result<()> {
		if self.tokens.is_empty() {
			return Err(MarkovError::Unfit("vocabulary"));
		}
		Ok(())
	}

	/// Whether `fit` has been called.
	pub fn is_fitted(&self) -> bool {
		!self.tokens.is_empty()
	}

	/// Fills the vocabulary with every token of `sequences`.
	///
	/// Any previous content is discarded.
	pub fn fit<S, T>(&mut self, sequences: &[S])
	where
		S: AsRef<[T]>,
		T: AsRef<str>,
	{
		let unique_tokens: BTreeSet<&str> = sequences
			.iter()
			.flat_map(|sequence| sequence.as_ref().iter().map(AsRef::as_ref))
			.collect();

		self.tokens = SPECIAL_TOKENS
			.iter()
			.copied()
			.chain(unique_tokens)
			.map(str::to_owned)
			.collect();
		self.ids = self
			.tokens
			.iter()
			.enumerate()
			.map(|(id, token)| (token.clone(), id))
			.collect();
	}

	/// Returns the id of `token`.
	pub fn token_to_id(&self, token: &str) -> Result<usize> {
		self.fit_check()?;
		self.ids
			.get(token)
			.copied()
			.ok_or_else(|| MarkovError::TokenNotFound(token.to_owned()))
	}

	/// Returns the token of `id`.
	pub fn id_to_token(&self, id: usize) -> Result<&str> {
		self.fit_check()?;
		self.tokens.get(id).map(String::as_str).ok_or(MarkovError::UnknownId(id))
	}

	/// All tokens ordered by id.
	pub fn tokens(&self) -> Result<&[String]> {
		self.fit_check()?;
		Ok(&self.tokens)
	}

	/// Maps every token of every sequence to its id.
	///
	/// # Errors
	/// Fails on the first token outside the vocabulary.
	pub fn transform<S, T>(&self, sequences: &[S]) -> Result<Vec<Vec<usize>>>
	where
		S: AsRef<[T]>,
		T: AsRef<str>,
	{
		self.fit_check()?;
		sequences
			.iter()
			.map(|sequence| {
				sequence
					.as_ref()
					.iter()
					.map(|token| self.token_to_id(token.as_ref()))
					.collect::<Result<Vec<_>>>()
			})
			.collect()
	}

	/// Number of distinct ids.
	pub fn size(&self) -> Result<usize> {
		self.fit_check()?;
		Ok(self.tokens.len())
	}
}
