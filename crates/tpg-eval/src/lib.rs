//! Evaluation for tangled program graphs.
//!
//! Produces decisions from a graph built with `tpg-core`:
//!
//! - [`EvalCache`] memoizes program bids keyed by the backend's 64-bit input
//!   hash, in one of three modes (off, unbounded per-input, bounded LRU).
//! - [`GraphEvaluator`] runs programs (lazy decode), teams (highest bid
//!   wins, ties to the lowest program ID), and whole graphs (action map
//!   traversal with loop detection), returning a [`GraphOutcome`] with the
//!   visited path.
//! - [`warmup_cache`] pre-populates the cache concurrently over a batch,
//!   the only multi-threaded surface of the engine.

pub mod cache;
pub mod error;
pub mod eval;
pub mod trace;
pub mod warmup;

pub use cache::{CacheMode, CacheStats, EvalCache, DEFAULT_LRU_CAPACITY};
pub use error::EvalError;
pub use eval::{GraphEvaluator, GraphOutcome, GraphOutput, TeamEvaluation};
pub use trace::EvalStep;
pub use warmup::{warmup_cache, WarmupReport};
