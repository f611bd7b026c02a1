//! Configuration consumed by the pipeline.
//!
//! Every section and every option is optional; missing values fall back to
//! their defaults. Unknown tokenizer or decoder names are rejected when the
//! JSON is parsed, and numeric ranges are checked by [`PipelineConfig::validate`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MarkovError, Result};

/// Tokenizer variant selected by the `tokenizer` key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerKind {
	/// One token per normalized character.
	#[default]
	Char,
}

/// Decoding strategy selected by the `decoder.strategy` key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecoderKind {
	/// Stochastic top-k sampling with length and repetition penalties.
	#[default]
	TopK,
}

/// `chain` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
	/// Number of preceding tokens a prediction is conditioned on.
	pub order: usize,
}

impl Default for ChainConfig {
	fn default() -> Self {
		Self { order: 1 }
	}
}

/// `decoder` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
	pub strategy: DecoderKind,
	/// Number of most probable candidates sampled from at each step.
	pub k: usize,
	/// Expected length of a generated sequence, prompt included.
	/// Generation never goes past it.
	pub max_len: usize,
	/// Slope of the end-token schedule (0 = no penalization).
	pub len_penalization: f64,
	/// Factor by which the previous token is made less likely.
	pub reps_penalization: f64,
	/// End-token probability before any length penalization.
	pub initial_eos: f64,
	/// Lower k as the sequence grows.
	pub reduce_k: bool,
}

impl Default for DecoderConfig {
	fn default() -> Self {
		Self {
			strategy: DecoderKind::TopK,
			k: 3,
			max_len: 10,
			len_penalization: 0.2,
			reps_penalization: 0.2,
			initial_eos: 0.0,
			reduce_k: false,
		}
	}
}

impl DecoderConfig {
	/// Checks option ranges.
	///
	/// # Errors
	/// Returns [`MarkovError::InvalidConfig`] if `k` is zero or a penalization
	/// factor is outside `[0, 1]`.
	pub fn validate(&self) -> Result<()> {
		if self.k == 0 {
			return Err(MarkovError::InvalidConfig("k must be greater than zero".into()));
		}
		if !(0.0..=1.0).contains(&self.len_penalization) {
			return Err(MarkovError::InvalidConfig(format!(
				"len_penalization must be between 0.0 and 1.0, got {}",
				self.len_penalization
			)));
		}
		if !(0.0..=1.0).contains(&self.reps_penalization) {
			return Err(MarkovError::InvalidConfig(format!(
				"reps_penalization must be between 0.0 and 1.0, got {}",
				self.reps_penalization
			)));
		}
		Ok(())
	}
}

/// Full pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
	/// Training corpus file name, relative to the data folder.
	pub data: Option<String>,
	pub tokenizer: TokenizerKind,
	pub chain: ChainConfig,
	pub decoder: DecoderConfig,
}

impl PipelineConfig {
	/// Parses a configuration from a JSON document.
	pub fn from_json(json: &str) -> Result<Self> {
		let config: Self = serde_json::from_str(json)?;
		config.validate()?;
		Ok(config)
	}

	/// Loads and validates a JSON configuration file.
	pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
		let path = path.as_ref();
		let json = std::fs::read_to_string(path)
			.map_err(|err| MarkovError::io(err, Some(path.to_path_buf())))?;
		Self::from_json(&json)
	}

	/// Checks every section.
	pub fn validate(&self) -> Result<()> {
		if self.chain.order == 0 {
			return Err(MarkovError::InvalidConfig("chain.order must be >= 1".into()));
		}
		self.decoder.validate()
	}
}
