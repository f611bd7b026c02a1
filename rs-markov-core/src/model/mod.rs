//! Top-level module for the Markov generation system.
//!
//! This module provides:
//! - A token/id vocabulary with reserved tokens (`Vocabulary`)
//! - Tokenizers turning raw text into id sequences (`Tokenizer`)
//! - Internal transition counters (`State`)
//! - The fixed-order chain itself (`MarkovChain`)
//! - Decoding strategies (`Decoder`)
//! - A high-level, configuration-driven interface (`Pipeline`)

/// Bidirectional token/id mapping seeded with `<sos>`, `<eos>`, `<pad>`.
pub mod dictionary;

/// Text normalization and tokenization.
///
/// Only the character-level variant exists.
pub mod tokenizer;

/// Internal transition counter for a single condition.
///
/// Used while fitting, merged across worker threads.
/// This module is not exposed publicly.
mod state;

/// Fixed-order Markov chain (`order >= 1`).
///
/// Handles padding, parallel transition counting and
/// next-token distribution queries.
pub mod markov_chain;

/// Penalized top-k sampling.
pub mod decoder;

/// Configuration-driven training and generation.
pub mod pipeline;
