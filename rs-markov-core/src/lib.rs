//! Markov-chain text generation library.
//!
//! This crate provides an order-k Markov text generator including:
//! - Character-level tokenization over a closed vocabulary
//! - Transition table estimation with parallel counting
//! - Penalized top-k decoding with length and repetition heuristics
//! - JSON configuration and corpus I/O helpers
//!
//! Transition counters are kept internal; everything needed to train and
//! generate is reachable from [`model::pipeline::Pipeline`].

/// Markov chain, tokenizer, decoder and pipeline.
pub mod model;

/// Configuration structures (JSON, serde).
pub mod config;

/// Crate-wide error and result types.
pub mod error;

/// I/O utilities (corpus loading, file listing).
pub mod io;

pub use config::{ChainConfig, DecoderConfig, DecoderKind, PipelineConfig, TokenizerKind};
pub use error::{MarkovError, Result};
pub use model::pipeline::Pipeline;
