use std::collections::HashMap;
use std::thread;

use log::{debug, info, warn};

use super::dictionary::{EOS_TOKEN, PAD_TOKEN, SOS_TOKEN, Vocabulary};
use super::state::State;
use super::tokenizer::Tokenizer;
use crate::error::{MarkovError, Result};

/// Fixed-order Markov chain over token ids.
///
/// The chain owns its tokenizer (and through it the vocabulary) and a
/// transition table mapping each `order`-long condition to a probability
/// vector over the whole vocabulary.
///
/// # Responsibilities
/// - Pad training sequences with `<sos>`, `<eos>` and `<pad>`
/// - Count transitions for every condition (in parallel) and normalize them
/// - Answer next-token distribution queries, including unseen conditions
///
/// # Invariants
/// - `order` is always >= 1
/// - Every stored vector has `vocabulary.size()` entries and sums to 1.0
/// - Stored vectors are never handed out by reference
#[derive(Debug, Clone)]
pub struct MarkovChain {
	order: usize,
	tokenizer: Tokenizer,
	/// condition => next-id probabilities
	states: HashMap<Vec<usize>, Vec<f64>>,
	fitted: bool,
}

impl MarkovChain {
	/// Creates an empty chain of order `order`.
	///
	/// The tokenizer is expected to be fitted before [`MarkovChain::fit`].
	///
	/// # Errors
	/// Returns an error if `order == 0`.
	pub fn new(tokenizer: Tokenizer, order: usize) -> Result<Self> {
		if order == 0 {
			return Err(MarkovError::InvalidConfig("order must be >= 1".into()));
		}
		Ok(Self {
			order,
			tokenizer,
			states: HashMap::new(),
			fitted: false,
		})
	}

	pub fn order(&self) -> usize {
		self.order
	}

	pub fn tokenizer(&self) -> &Tokenizer {
		&self.tokenizer
	}

	pub fn vocabulary(&self) -> &Vocabulary {
		self.tokenizer.vocabulary()
	}

	/// Whether `fit` has completed.
	pub fn is_fitted(&self) -> bool {
		self.fitted
	}

	/// Iterates over the learned conditions and their distributions.
	pub fn conditions(&self) -> impl Iterator<Item = (&[usize], &[f64])> {
		self.states.iter().map(|(condition, probs)| (condition.as_slice(), probs.as_slice()))
	}

	/// Adds `<sos>`/`<eos>` around `sequence` and left-pads it with
	/// `order - 1` `<pad>` so every window of `order` ids is defined.
	fn preprocess(&self, sequence: &[usize]) -> Result<Vec<usize>> {
		let vocabulary = self.vocabulary();
		let sos = vocabulary.token_to_id(SOS_TOKEN)?;
		let eos = vocabulary.token_to_id(EOS_TOKEN)?;
		let pad = vocabulary.token_to_id(PAD_TOKEN)?;

		let mut padded = Vec::with_capacity(sequence.len() + self.order + 1);
		padded.resize(self.order - 1, pad);
		padded.push(sos);
		padded.extend_from_slice(sequence);
		padded.push(eos);
		Ok(padded)
	}

	/// Counts transitions of already padded sequences.
	fn count_transitions(&self, sequences: &[Vec<usize>]) -> HashMap<Vec<usize>, State> {
		let mut states: HashMap<Vec<usize>, State> = HashMap::new();
		for sequence in sequences {
			for window in sequence.windows(self.order + 1) {
				let (condition, next) = window.split_at(self.order);
				states
					.entry(condition.to_vec())
					.or_insert_with(|| State::new(condition))
					.add_transition(next[0]);
			}
		}
		states
	}

	/// Learns the transition table from tokenized sequences.
	///
	/// Any previously learned table is dropped.
	///
	/// # Behavior
	/// - Pads every sequence (see `preprocess`).
	/// - Splits the corpus into chunks (CPU cores * factor) and counts each
	///   chunk on its own scoped thread.
	/// - Merges all partial counts, then converts them to probabilities.
	///
	/// # Errors
	/// - The tokenizer was not fitted.
	/// - A sequence holds an id outside the vocabulary.
	pub fn fit(&mut self, sequences: &[Vec<usize>]) -> Result<()> {
		let size = self.vocabulary().size()?;
		let padded = sequences
			.iter()
			.map(|sequence| self.preprocess(sequence))
			.collect::<Result<Vec<_>>>()?;

		self.states.clear();
		self.fitted = false;

		if padded.is_empty() {
			warn!("fitting an order-{} chain on an empty corpus", self.order);
		}

		let cpus = num_cpus::get();
		let factor = 8;
		let chunks = cpus * factor;
		let chunk_size = padded.len().div_ceil(chunks).max(1);

		let chain: &Self = self;
		let partial_counts = thread::scope(|scope| {
			let handles: Vec<_> = padded
				.chunks(chunk_size)
				.map(|chunk| scope.spawn(move || chain.count_transitions(chunk)))
				.collect();

			handles
				.into_iter()
				.map(|handle| {
					handle
						.join()
						.map_err(|_| MarkovError::Internal("transition counting thread panicked".into()))
				})
				.collect::<Result<Vec<_>>>()
		})?;
		debug!("merging {} partial transition tables", partial_counts.len());

		let mut counts: HashMap<Vec<usize>, State> = HashMap::new();
		for partial in partial_counts {
			for (condition, state) in partial {
				if let Some(existing) = counts.get_mut(&condition) {
					existing.merge(&state)?;
				} else {
					counts.insert(condition, state);
				}
			}
		}

		let mut states = HashMap::with_capacity(counts.len());
		for (condition, state) in counts {
			states.insert(condition, state.distribution(size)?);
		}
		self.states = states;
		self.fitted = true;

		info!(
			"fitted order-{} chain: {} sequences, {} conditions, {} tokens",
			self.order,
			sequences.len(),
			self.states.len(),
			size
		);
		Ok(())
	}

	/// Returns the distribution of the id following `sequence`.
	///
	/// - Sequences shorter than `order` are padded the same way as during
	///   `fit` (without the trailing `<eos>`) before the condition is taken.
	/// - A known condition yields a copy of its learned distribution.
	/// - An unknown condition yields `1 / size` for every id.
	///
	/// # Errors
	/// - [`MarkovError::Unfit`] if the chain was not fitted
	/// - [`MarkovError::UnknownId`] if `sequence` holds an id outside the vocabulary
	pub fn generate_next_token_distribution(&self, sequence: &[usize]) -> Result<Vec<f64>> {
		if !self.fitted {
			return Err(MarkovError::Unfit("markov chain"));
		}
		let size = self.vocabulary().size()?;
		if let Some(&id) = sequence.iter().find(|&&id| id >= size) {
			return Err(MarkovError::UnknownId(id));
		}

		let padded;
		let mut context = sequence;
		if context.len() < self.order {
			padded = self.preprocess(sequence)?;
			context = &padded[..padded.len() - 1];
		}
		let condition = &context[context.len() - self.order..];

		match self.states.get(condition) {
			Some(probs) => Ok(probs.clone()),
			None => Ok(vec![1.0 / size as f64; size]),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::TokenizerKind;

	const TOLERANCE: f64 = 1e-9;

	fn chain(corpus: &[&str], order: usize) -> MarkovChain {
		let mut tokenizer = Tokenizer::new(TokenizerKind::Char);
		tokenizer.fit(corpus);
		let tokenized = tokenizer.tokenize(corpus).unwrap();
		let mut chain = MarkovChain::new(tokenizer, order).unwrap();
		chain.fit(&tokenized).unwrap();
		chain
	}

	fn id(chain: &MarkovChain, token: &str) -> usize {
		chain.vocabulary().token_to_id(token).unwrap()
	}

	#[test]
	fn zero_order_is_rejected() {
		let tokenizer = Tokenizer::new(TokenizerKind::Char);
		assert!(matches!(MarkovChain::new(tokenizer, 0), Err(MarkovError::InvalidConfig(_))));
	}

	#[test]
	fn condition_c_puts_all_mass_on_a() {
		let chain = chain(&["cat", "can", "car"], 1);
		let probs = chain.generate_next_token_distribution(&[id(&chain, "c")]).unwrap();

		let a = id(&chain, "a");
		for (next_id, p) in probs.iter().enumerate() {
			assert_eq!(*p, if next_id == a { 1.0 } else { 0.0 });
		}
	}

	#[test]
	fn learned_distributions_sum_to_one() {
		let corpus = ["hello world", "help me", "hollow", "yellow fellow", "a", ""];
		for order in 1..=4 {
			let chain = chain(&corpus, order);
			assert!(chain.conditions().count() > 0);
			for (condition, probs) in chain.conditions() {
				assert_eq!(condition.len(), order);
				assert_eq!(probs.len(), chain.vocabulary().size().unwrap());
				let sum: f64 = probs.iter().sum();
				assert!((sum - 1.0).abs() < TOLERANCE, "{condition:?} sums to {sum}");
			}
		}
	}

	#[test]
	fn empty_prompt_uses_start_condition() {
		let chain = chain(&["cat", "can", "car"], 2);
		let probs = chain.generate_next_token_distribution(&[]).unwrap();
		assert_eq!(probs[id(&chain, "c")], 1.0);

		let probs = chain.generate_next_token_distribution(&[id(&chain, "c")]).unwrap();
		assert_eq!(probs[id(&chain, "a")], 1.0);
	}

	#[test]
	fn short_sequences_get_learned_or_uniform_distributions() {
		let chain = chain(&["abc", "abd", "bca"], 3);
		let size = chain.vocabulary().size().unwrap();
		let candidates = [vec![], vec![id(&chain, "a")], vec![id(&chain, "b"), id(&chain, "a")]];

		for sequence in candidates {
			let probs = chain.generate_next_token_distribution(&sequence).unwrap();
			let sum: f64 = probs.iter().sum();
			let uniform = probs.iter().all(|p| *p == 1.0 / size as f64);
			assert!(uniform || (sum - 1.0).abs() < TOLERANCE);
		}
	}

	#[test]
	fn unseen_condition_is_uniform_over_vocabulary() {
		let chain = chain(&["cat", "can", "car"], 1);
		let probs = chain.generate_next_token_distribution(&[id(&chain, "<pad>")]).unwrap();
		assert_eq!(probs, vec![1.0 / 8.0; 8]);
	}

	#[test]
	fn returned_distribution_is_an_independent_copy() {
		let chain = chain(&["cat", "can", "car"], 1);
		let sequence = [id(&chain, "c"), id(&chain, "a")];

		let mut first = chain.generate_next_token_distribution(&sequence).unwrap();
		let second = chain.generate_next_token_distribution(&sequence).unwrap();
		assert_eq!(first, second);

		first.iter_mut().for_each(|p| *p = 42.0);
		assert_eq!(chain.generate_next_token_distribution(&sequence).unwrap(), second);
	}

	#[test]
	fn refit_replaces_previous_table() {
		let mut chain = chain(&["cat", "can", "car"], 1);
		let c = id(&chain, "c");
		let t = id(&chain, "t");
		chain.fit(&[vec![c, t]]).unwrap();

		assert_eq!(chain.generate_next_token_distribution(&[c]).unwrap()[t], 1.0);
		assert_eq!(chain.conditions().count(), 3);
	}

	#[test]
	fn parallel_counting_matches_frequencies() {
		let words = ["cat", "can", "car"];
		let corpus: Vec<&str> = words.iter().cycle().take(words.len() * 500).copied().collect();
		let big = chain(&corpus, 2);
		let small = chain(&words, 2);

		let mut expected: Vec<_> = small.conditions().collect();
		let mut actual: Vec<_> = big.conditions().collect();
		expected.sort_by(|a, b| a.0.cmp(b.0));
		actual.sort_by(|a, b| a.0.cmp(b.0));
		assert_eq!(expected.len(), actual.len());
		for ((ec, ep), (ac, ap)) in expected.iter().zip(&actual) {
			assert_eq!(ec, ac);
			for (e, a) in ep.iter().zip(ap.iter()) {
				assert!((e - a).abs() < TOLERANCE);
			}
		}
	}

	#[test]
	fn query_before_fit_fails() {
		let mut tokenizer = Tokenizer::new(TokenizerKind::Char);
		tokenizer.fit(&["cat"]);
		let chain = MarkovChain::new(tokenizer, 1).unwrap();
		assert!(!chain.is_fitted());
		assert!(matches!(chain.generate_next_token_distribution(&[]), Err(MarkovError::Unfit(_))));
	}

	#[test]
	fn ids_outside_vocabulary_are_rejected() {
		let chain = chain(&["cat", "can", "car"], 2);
		let c = id(&chain, "c");

		assert!(matches!(chain.generate_next_token_distribution(&[99]), Err(MarkovError::UnknownId(99))));
		assert!(matches!(chain.generate_next_token_distribution(&[c, 8]), Err(MarkovError::UnknownId(8))));
		assert!(chain.generate_next_token_distribution(&[c, 7]).is_ok());
	}

	#[test]
	fn fit_with_unfitted_tokenizer_fails() {
		let tokenizer = Tokenizer::new(TokenizerKind::Char);
		let mut chain = MarkovChain::new(tokenizer, 1).unwrap();
		assert!(matches!(chain.fit(&[vec![3]]), Err(MarkovError::Unfit(_))));
	}
}
