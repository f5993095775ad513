//! Evolution error types.

use thiserror::Error;

use tpg_core::{GraphError, TeamId};
use tpg_eval::EvalError;

/// Errors produced by mutation operators and the generational harness.
#[derive(Debug, Error)]
pub enum EvolveError {
    /// A structural operation failed in the underlying graph.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// An evaluation failed while scoring roots.
    #[error(transparent)]
    Eval(#[from] EvalError),

    /// A mutation probability falls outside the unit interval.
    #[error("mutation rate {name} = {rate} is outside [0, 1]")]
    RateOutOfRange { name: &'static str, rate: f64 },

    /// The mutation parent must be a current root team.
    #[error("mutation parent {id} is not a root team")]
    ParentNotRoot { id: TeamId },

    /// The harness configuration is unusable.
    #[error("invalid evolution config: {reason}")]
    InvalidConfig { reason: String },

    /// The verifier found residual mismatches after garbage collection.
    /// Terminal for the generational loop.
    #[error("graph integrity check failed with {mismatches} mismatch(es) after generation {generation}")]
    IntegrityFailure {
        generation: usize,
        mismatches: usize,
    },
}
