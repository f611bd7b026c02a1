use std::path::Path;

use log::info;
use rand::Rng;

use super::decoder::Decoder;
use super::markov_chain::MarkovChain;
use super::tokenizer::Tokenizer;
use crate::config::{DecoderConfig, PipelineConfig};
use crate::error::{MarkovError, Result};
use crate::io;

/// High-level interface wiring tokenizer, chain and decoder together.
///
/// # Responsibilities
/// - Build every component from a [`PipelineConfig`]
/// - Train on raw strings or on a corpus file
/// - Answer "prompt + repeat count" generation requests
#[derive(Debug, Clone)]
pub struct Pipeline {
	config: PipelineConfig,
	chain: Option<MarkovChain>,
}

impl Pipeline {
	/// Creates an untrained pipeline.
	///
	/// # Errors
	/// Returns an error if the configuration does not validate.
	pub fn new(config: PipelineConfig) -> Result<Self> {
		config.validate()?;
		Ok(Self { config, chain: None })
	}

	pub fn config(&self) -> &PipelineConfig {
		&self.config
	}

	/// The trained chain, if any.
	pub fn chain(&self) -> Option<&MarkovChain> {
		self.chain.as_ref()
	}

	pub fn is_trained(&self) -> bool {
		self.chain.is_some()
	}

	/// Fits the tokenizer and the chain on `data`.
	///
	/// Replaces any previously trained chain.
	pub fn train<S: AsRef<str>>(&mut self, data: &[S]) -> Result<()> {
		let mut tokenizer = Tokenizer::new(self.config.tokenizer);
		tokenizer.fit(data);
		let tokenized = tokenizer.tokenize(data)?;

		info!(
			"training {:?} tokenizer with an order-{} chain on {} examples",
			tokenizer.kind(),
			self.config.chain.order,
			tokenized.len()
		);
		let mut chain = MarkovChain::new(tokenizer, self.config.chain.order)?;
		chain.fit(&tokenized)?;
		self.chain = Some(chain);
		Ok(())
	}

	/// Reads a corpus (one example per line) and trains on it.
	pub fn train_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
		let data = io::read_file(&path)?;
		info!("training on {} lines from {}", data.len(), path.as_ref().display());
		self.train(&data)
	}

	/// Generates `count` sequences starting with `prompt`.
	///
	/// # Notes
	/// - The prompt is normalized like the training data; a character never
	///   seen during training is an error.
	/// - Every result is capitalized.
	pub fn generate_with<R: Rng>(
		&self,
		prompt: &str,
		decoder_config: &DecoderConfig,
		count: usize,
		rng: &mut R,
	) -> Result<Vec<String>> {
		let chain = self.chain.as_ref().ok_or(MarkovError::Untrained)?;
		let prompt = chain.tokenizer().tokenize(&[prompt])?.remove(0);
		let decoder = Decoder::new(chain, decoder_config)?;

		(0..count)
			.map(|_| decoder.decode_with(&prompt, rng).map(|text| capitalize(&text)))
			.collect()
	}

	/// Generates `count` sequences with the configured decoder.
	pub fn generate_many(&self, prompt: &str, count: usize) -> Result<Vec<String>> {
		self.generate_with(prompt, &self.config.decoder, count, &mut rand::rng())
	}

	/// Generates one sequence with the configured decoder.
	pub fn generate(&self, prompt: &str) -> Result<String> {
		let mut generated = self.generate_many(prompt, 1)?;
		Ok(generated.remove(0))
	}
}

/// Upper-cases the first character and lower-cases the rest.
pub fn capitalize(text: &str) -> String {
	let mut chars = text.chars();
	match chars.next() {
		Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
		None => String::new(),
	}
}
