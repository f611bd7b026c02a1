use std::collections::HashMap;

use crate::error::{MarkovError, Result};

/// Transition counter for one condition of a Markov chain.
///
/// A `State` corresponds to a fixed `order`-long id tuple (`condition`) and
/// stores every id observed right after it during training.
///
/// Conceptually, this is a node in a Markov chain where outgoing edges
/// are weighted by their number of observations.
///
/// ## Responsibilities:
/// - Accumulate transition occurrences during learning
/// - Merge with another state having the same condition (parallel learning)
/// - Turn the occurrences into a dense probability vector
///
/// ## Invariants
/// - All transitions belong to the same `condition`
/// - Each transition occurrence count is strictly positive
#[derive(Clone, Debug)]
pub(crate) struct State {
	condition: Vec<usize>,
	/// Next id => number of observations.
	transitions: HashMap<usize, usize>,
}

impl State {
	/// Creates a new empty state for the given condition.
	pub fn new(condition: &[usize]) -> Self {
		Self {
			condition: condition.to_vec(),
			transitions: HashMap::new(),
		}
	}

	/// Records an occurrence of a transition toward `next_id`.
	pub fn add_transition(&mut self, next_id: usize) {
		*self.transitions.entry(next_id).or_insert(0) += 1;
	}

	/// Total number of observed transitions.
	pub fn total(&self) -> usize {
		self.transitions.values().sum()
	}

	/// Empirical next-id distribution over a vocabulary of `size` ids.
	///
	/// Observed ids get `count / total`, every other id `0.0`.
	pub fn distribution(&self, size: usize) -> Result<Vec<f64>> {
		let total = self.total() as f64;
		let mut probs = vec![0.0; size];
		for (next_id, occurrence) in &self.transitions {
			let slot = probs.get_mut(*next_id).ok_or(MarkovError::UnknownId(*next_id))?;
			*slot = *occurrence as f64 / total;
		}
		Ok(probs)
	}

	/// Merges another state into this one.
	///
	/// Both states must represent the same condition.
	/// Transition occurrence counts are summed.
	///
	/// # Errors
	/// Returns an error if the conditions do not match.
	pub fn merge(&mut self, other: &Self) -> Result<()> {
		if self.condition != other.condition {
			return Err(MarkovError::StateMismatch {
				left: self.condition.clone(),
				right: other.condition.clone(),
			});
		}

		for (next_id, occurrence) in &other.transitions {
			*self.transitions.entry(*next_id).or_insert(0) += *occurrence;
		}

		Ok(())
	}
}
