//! Evaluation error types.

use thiserror::Error;

use tpg_core::{GraphError, TeamId};

use crate::cache::CacheMode;

/// Errors produced while evaluating programs, teams, or graphs.
#[derive(Debug, Error)]
pub enum EvalError {
    /// A structural lookup failed in the underlying graph.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// The team given as the evaluation entry point does not exist.
    #[error("evaluation root not found: {id}")]
    RootNotFound { id: TeamId },

    /// A team with no programs cannot produce a winner.
    #[error("team {id} has no programs to evaluate")]
    EmptyTeam { id: TeamId },

    /// Concurrent warmup requires the bounded LRU cache mode.
    #[error("cache mode {mode:?} is not safe for concurrent warmup; use lru")]
    CacheNotWarmupSafe { mode: CacheMode },
}
