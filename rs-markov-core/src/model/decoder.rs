use log::debug;
use rand::Rng;

use super::dictionary::EOS_TOKEN;
use super::markov_chain::MarkovChain;
use crate::config::{DecoderConfig, DecoderKind};
use crate::error::{MarkovError, Result};

/// Keeps `len / 2` away from zero when reducing k.
const REDUCE_K_EPSILON: f64 = 1e-10;

/// Top-k decoder.
///
/// Generates token after token, sampling uniformly among the `k` most
/// probable candidates once the raw distribution has been penalized for
/// length (the end token becomes likelier as the sequence grows) and for
/// immediate repetitions.
#[derive(Debug, Clone)]
pub struct TopKDecoder<'a> {
	chain: &'a MarkovChain,
	k: usize,
	max_len: usize,
	len_penalization: f64,
	reps_penalization: f64,
	initial_eos: f64,
	reduce_k: bool,
	eos_id: usize,
}

impl<'a> TopKDecoder<'a> {
	/// Creates a decoder reading from a trained `chain`.
	///
	/// # Errors
	/// - [`MarkovError::Untrained`] if the chain was never fitted
	/// - [`MarkovError::InvalidConfig`] if `config` is out of range
	pub fn new(chain: &'a MarkovChain, config: &DecoderConfig) -> Result<Self> {
		if !chain.is_fitted() {
			return Err(MarkovError::Untrained);
		}
		config.validate()?;

		Ok(Self {
			chain,
			k: config.k,
			max_len: config.max_len,
			len_penalization: config.len_penalization,
			reps_penalization: config.reps_penalization,
			initial_eos: config.initial_eos,
			reduce_k: config.reduce_k,
			eos_id: chain.vocabulary().token_to_id(EOS_TOKEN)?,
		})
	}

	/// Overwrites the end-token probability with a linear schedule.
	///
	/// The value is not renormalized and may exceed 1.0; only the ranking of
	/// candidates matters afterwards.
	fn penalize_for_length(&self, probs: &mut [f64], sequence: &[usize]) {
		probs[self.eos_id] = self.initial_eos + self.len_penalization * sequence.len() as f64 / self.max_len as f64;
	}

	fn penalize_for_repetitions(&self, probs: &mut [f64], sequence: &[usize]) {
		if let Some(&last) = sequence.last() {
			probs[last] *= 1.0 - self.reps_penalization;
		}
	}

	/// Number of candidates for a sequence of `len` ids.
	///
	/// With `reduce_k`, k decreases as `k / (len / 2)`, but never below 2.
	fn effective_k(&self, len: usize) -> usize {
		if !self.reduce_k {
			return self.k;
		}
		let k = self.k as f64;
		let reduced = (k / (len as f64 / 2.0 + REDUCE_K_EPSILON)).min(k);
		reduced.max(2.0) as usize
	}

	/// The `k` most probable ids, least probable first.
	///
	/// Ids are ranked with a stable ascending sort, so among equal
	/// probabilities the higher id ranks later.
	fn top_k(probs: &[f64], k: usize) -> Vec<usize> {
		let mut ids: Vec<usize> = (0..probs.len()).collect();
		ids.sort_by(|a, b| probs[*a].total_cmp(&probs[*b]));
		ids.split_off(ids.len().saturating_sub(k))
	}

	/// Extends `prompt` until the end token is drawn or `max_len` is reached.
	///
	/// The end token itself is never appended.
	pub fn decode_ids_with<R: Rng>(&self, prompt: &[usize], rng: &mut R) -> Result<Vec<usize>> {
		let mut sequence = prompt.to_vec();

		while sequence.len() < self.max_len {
			let mut probs = self.chain.generate_next_token_distribution(&sequence)?;

			self.penalize_for_length(&mut probs, &sequence);
			self.penalize_for_repetitions(&mut probs, &sequence);

			let candidates = Self::top_k(&probs, self.effective_k(sequence.len()));
			let next_id = candidates[rng.random_range(0..candidates.len())];
			debug!("step {}: candidates {:?}, picked {}", sequence.len(), candidates, next_id);

			if next_id == self.eos_id {
				break;
			}
			sequence.push(next_id);
		}

		Ok(sequence)
	}

	/// Decodes and maps the ids back to text.
	pub fn decode_with<R: Rng>(&self, prompt: &[usize], rng: &mut R) -> Result<String> {
		let ids = self.decode_ids_with(prompt, rng)?;
		self.chain.tokenizer().detokenize(&ids)
	}

	/// Same as [`TopKDecoder::decode_with`] with the thread-local generator.
	pub fn decode(&self, prompt: &[usize]) -> Result<String> {
		self.decode_with(prompt, &mut rand::rng())
	}
}

/// Decoding strategies.
///
/// Closed set, chosen from [`DecoderKind`]. Beam search would be added here.
#[derive(Debug, Clone)]
pub enum Decoder<'a> {
	TopK(TopKDecoder<'a>),
}

impl<'a> Decoder<'a> {
	/// Builds the decoder selected by `config.strategy`.
	pub fn new(chain: &'a MarkovChain, config: &DecoderConfig) -> Result<Self> {
		match config.strategy {
			DecoderKind::TopK => Ok(Self::TopK(TopKDecoder::new(chain, config)?)),
		}
	}

	pub fn decode_ids_with<R: Rng>(&self, prompt: &[usize], rng: &mut R) -> Result<Vec<usize>> {
		match self {
			Self::TopK(decoder) => decoder.decode_ids_with(prompt, rng),
		}
	}

	pub fn decode_with<R: Rng>(&self, prompt: &[usize], rng: &mut R) -> Result<String> {
		match self {
			Self::TopK(decoder) => decoder.decode_with(prompt, rng),
		}
	}

	pub fn decode(&self, prompt: &[usize]) -> Result<String> {
		match self {
			Self::TopK(decoder) => decoder.decode(prompt),
		}
	}
}

#[cfg(test)]
mod tests {
	use rand::SeedableRng;
	use rand::rngs::StdRng;

	use super::*;
	use crate::config::TokenizerKind;
	use crate::model::tokenizer::Tokenizer;

	fn chain(corpus: &[&str], order: usize) -> MarkovChain {
		let mut tokenizer = Tokenizer::new(TokenizerKind::Char);
		tokenizer.fit(corpus);
		let tokenized = tokenizer.tokenize(corpus).unwrap();
		let mut chain = MarkovChain::new(tokenizer, order).unwrap();
		chain.fit(&tokenized).unwrap();
		chain
	}

	fn greedy() -> DecoderConfig {
		DecoderConfig {
			k: 1,
			reps_penalization: 0.0,
			..DecoderConfig::default()
		}
	}

	#[test]
	fn greedy_decoding_is_deterministic() {
		let chain = chain(&["cat", "can", "car"], 1);
		let decoder = TopKDecoder::new(&chain, &greedy()).unwrap();

		// After "ca", n/r/t tie and the highest id (t) wins.
		for seed in 0..5 {
			let mut rng = StdRng::seed_from_u64(seed);
			assert_eq!(decoder.decode_with(&[], &mut rng).unwrap(), "cat");
		}
	}

	#[test]
	fn eos_overwrite_is_not_a_blend() {
		let chain = chain(&["cat", "can", "car"], 1);
		let config = DecoderConfig {
			len_penalization: 0.0,
			..greedy()
		};
		let decoder = TopKDecoder::new(&chain, &config).unwrap();

		// The learned "t -> <eos>" transition is replaced by 0.0, so the
		// greedy pick falls back to the highest id among the zero entries.
		let mut rng = StdRng::seed_from_u64(7);
		assert_eq!(decoder.decode_with(&[], &mut rng).unwrap(), format!("ca{}", "t".repeat(8)));
	}

	#[test]
	fn max_len_equal_to_prompt_skips_the_loop() {
		let chain = chain(&["cat", "can", "car"], 1);
		let config = DecoderConfig {
			max_len: 2,
			..DecoderConfig::default()
		};
		let decoder = TopKDecoder::new(&chain, &config).unwrap();
		let prompt = chain.tokenizer().tokenize(&["ca"]).unwrap().remove(0);

		let mut rng = StdRng::seed_from_u64(0);
		assert_eq!(decoder.decode_ids_with(&prompt, &mut rng).unwrap(), prompt);
	}

	#[test]
	fn output_is_bounded_and_never_contains_eos() {
		let corpus = ["alice", "bob", "charlie", "dave", "eve", "mallory", "trent"];
		for order in 1..=3 {
			let chain = chain(&corpus, order);
			let eos = chain.vocabulary().token_to_id(EOS_TOKEN).unwrap();
			for max_len in [0, 1, 5, 12] {
				let config = DecoderConfig {
					k: 4,
					max_len,
					reduce_k: max_len % 2 == 0,
					..DecoderConfig::default()
				};
				let decoder = Decoder::new(&chain, &config).unwrap();
				let mut rng = StdRng::seed_from_u64(max_len as u64);
				for _ in 0..50 {
					let ids = decoder.decode_ids_with(&[], &mut rng).unwrap();
					assert!(ids.len() <= max_len);
					assert!(!ids.contains(&eos));
				}
			}
		}
	}

	#[test]
	fn decode_does_not_mutate_the_chain() {
		let chain = chain(&["cat", "can", "car"], 1);
		let before = chain.generate_next_token_distribution(&[]).unwrap();
		let decoder = Decoder::new(&chain, &DecoderConfig::default()).unwrap();
		for _ in 0..20 {
			decoder.decode(&[]).unwrap();
		}
		assert_eq!(chain.generate_next_token_distribution(&[]).unwrap(), before);
	}

	#[test]
	fn reduce_k_shrinks_towards_two() {
		let chain = chain(&["cat"], 1);
		let config = DecoderConfig {
			k: 6,
			reduce_k: true,
			..DecoderConfig::default()
		};
		let decoder = TopKDecoder::new(&chain, &config).unwrap();

		assert_eq!(decoder.effective_k(0), 6);
		assert_eq!(decoder.effective_k(1), 6);
		// 6 / (1 + 1e-10) and 6 / (1.5 + 1e-10) are truncated
		assert_eq!(decoder.effective_k(2), 5);
		assert_eq!(decoder.effective_k(3), 3);
		assert_eq!(decoder.effective_k(6), 2);
		assert_eq!(decoder.effective_k(40), 2);

		let config = DecoderConfig { k: 1, ..config };
		let decoder = TopKDecoder::new(&chain, &config).unwrap();
		assert_eq!(decoder.effective_k(10), 2);
	}

	#[test]
	fn top_k_prefers_higher_ids_on_ties() {
		let probs = [0.1, 0.3, 0.3, 0.0, 0.3];
		assert_eq!(TopKDecoder::top_k(&probs, 2), vec![2, 4]);
		assert_eq!(TopKDecoder::top_k(&probs, 4), vec![0, 1, 2, 4]);
		assert_eq!(TopKDecoder::top_k(&probs, 10), vec![3, 0, 1, 2, 4]);
	}

	#[test]
	fn penalties_update_eos_and_last_token() {
		let chain = chain(&["cat", "can", "car"], 1);
		let config = DecoderConfig {
			initial_eos: 0.5,
			len_penalization: 1.0,
			reps_penalization: 0.5,
			max_len: 4,
			..DecoderConfig::default()
		};
		let decoder = TopKDecoder::new(&chain, &config).unwrap();
		let sequence = [4, 3];
		let mut probs = vec![0.5; 8];

		decoder.penalize_for_length(&mut probs, &sequence);
		decoder.penalize_for_repetitions(&mut probs, &sequence);
		assert_eq!(probs[1], 1.0);
		assert_eq!(probs[3], 0.25);
		assert_eq!(probs[4], 0.5);
	}

	#[test]
	fn prompt_with_unknown_id_is_an_error() {
		let chain = chain(&["cat", "can", "car"], 1);
		let decoder = Decoder::new(&chain, &DecoderConfig::default()).unwrap();

		assert!(matches!(decoder.decode(&[99]), Err(MarkovError::UnknownId(99))));
		let mut rng = StdRng::seed_from_u64(3);
		assert!(matches!(decoder.decode_ids_with(&[4, 8], &mut rng), Err(MarkovError::UnknownId(8))));
	}

	#[test]
	fn untrained_chain_is_rejected() {
		let mut tokenizer = Tokenizer::new(TokenizerKind::Char);
		tokenizer.fit(&["cat"]);
		let chain = MarkovChain::new(tokenizer, 1).unwrap();
		assert!(matches!(
			Decoder::new(&chain, &DecoderConfig::default()),
			Err(MarkovError::Untrained)
		));
	}
}
