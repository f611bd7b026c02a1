//! Error type shared by every component of the crate.

use std::path::PathBuf;

use thiserror::Error;

/// Convenient result type used throughout the crate.
pub type Result<T, E = MarkovError> = std::result::Result<T, E>;

/// Failures raised while fitting, querying or decoding.
///
/// None of these are transient: every variant is propagated unchanged to the
/// caller and there is no retry anywhere in the crate.
#[derive(Debug, Error)]
pub enum MarkovError {
	/// A component was queried before its `fit` call.
	#[error("{0} is not fitted yet")]
	Unfit(&'static str),
	/// A token outside the fitted vocabulary.
	#[error("token {0:?} not found in vocabulary")]
	TokenNotFound(String),
	/// An id past the end of the vocabulary.
	#[error("id {0} not found in vocabulary")]
	UnknownId(usize),
	/// Generation requested on a chain that was never trained.
	#[error("chain is not trained")]
	Untrained,
	/// Configuration failed validation.
	#[error("invalid configuration: {0}")]
	InvalidConfig(String),
	/// Two transition counters for different conditions were merged.
	#[error("condition mismatch: {left:?} != {right:?}")]
	StateMismatch {
		left: Vec<usize>,
		right: Vec<usize>,
	},
	/// Filesystem error with the path being processed.
	#[error("io error while processing {path:?}: {source}")]
	Io {
		source: std::io::Error,
		path: Option<PathBuf>,
	},
	/// Configuration could not be parsed.
	#[error("serialization error: {0}")]
	Serialization(String),
	/// Invariant broken inside the crate (worker thread panicked, ...).
	#[error("internal error: {0}")]
	Internal(String),
}

impl From<serde_json::Error> for MarkovError {
	fn from(err: serde_json::Error) -> Self {
		Self::Serialization(err.to_string())
	}
}

impl MarkovError {
	/// Wraps an IO error with an optional path.
	pub fn io(source: std::io::Error, path: Option<PathBuf>) -> Self {
		Self::Io { source, path }
	}
}
