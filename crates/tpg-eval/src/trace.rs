//! Traversal path recording for graph evaluation.
//!
//! Every graph evaluation returns the sequence of [`EvalStep`] entries
//! visited in order, capturing which team was evaluated, which program won
//! it, and the winning bid.

use serde::{Deserialize, Serialize};

use tpg_core::{ProgramId, TeamId};

/// A single entry in the evaluation path, recording one team decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalStep {
    /// The team that was evaluated.
    pub team: TeamId,
    /// The program whose bid won the team.
    pub winner: ProgramId,
    /// The winning bid.
    pub bid: f64,
}
