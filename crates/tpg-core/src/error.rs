//! Core error types for tpg-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering the
//! failure modes of the graph data model. All public graph operations fail
//! loudly on invalid input; a failed precondition leaves the graph untouched.

use thiserror::Error;

use crate::action::Action;
use crate::id::{ProgramId, TeamId};

/// Errors produced by the tpg-core graph operations.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A team ID was not found in the graph.
    #[error("team not found: {id}")]
    TeamNotFound { id: TeamId },

    /// A program ID was not found in the graph.
    #[error("program not found: {id}")]
    ProgramNotFound { id: ProgramId },

    /// The same program was listed twice when constructing a team.
    #[error("duplicate program {id} in team member list")]
    DuplicateProgram { id: ProgramId },

    /// The program is already a member of the team.
    #[error("program {program} is already in team {team}")]
    ProgramAlreadyInTeam { team: TeamId, program: ProgramId },

    /// The operation requires the program to be a member of the team.
    #[error("program {program} is not in team {team}")]
    ProgramNotInTeam { team: TeamId, program: ProgramId },

    /// An action map key refers to a program outside the team member list.
    #[error("action map key {program} is not a member of the team")]
    MapKeyNotMember { program: ProgramId },

    /// An action map entry may not point a team at itself.
    #[error("action map of team {team} may not target itself")]
    SelfLoop { team: TeamId },

    /// An explicit action is not a member of the graph's action set.
    #[error("action '{action}' is not in the graph's action set")]
    ActionNotInSet { action: Action },

    /// Refusing to remove a team that other teams still point at.
    #[error("team {id} still has {count} incoming edge(s); pass force to remove")]
    TeamHasInEdges { id: TeamId, count: usize },

    /// Orphan cleanup made no progress while orphans remain. This indicates
    /// a defect in the edge maintenance machinery, not in the caller.
    #[error(
        "orphan cleanup stalled with {orphan_teams} team(s) and {orphan_programs} program(s) remaining"
    )]
    CleanupStalled {
        orphan_teams: usize,
        orphan_programs: usize,
    },
}
