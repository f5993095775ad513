//! Copy-on-write mutation operators.
//!
//! The root-clone strategy never edits a live individual: it clones the
//! parent root team, then applies membership, program, and action map edits
//! to the clone. Program edits likewise clone the target program first, so
//! the parent team and its programs stay bit-identical and the elite from
//! the previous generation survives selection untouched.
//!
//! Every edit flows through the graph's membership operations and the edge
//! primitive, so the edge invariants hold at every intermediate step.

use std::collections::BTreeSet;

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use tpg_core::{Action, GraphError, ProgramBackend, ProgramId, TangledProgramGraph, TeamId};
use tpg_eval::EvalCache;

use crate::config::MutationConfig;
use crate::error::EvolveError;

/// The three action map sub-operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionMapOp {
    /// Map an unmapped program to a random other team.
    Add,
    /// Redirect an existing mapping to a different team.
    Change,
    /// Clear an existing mapping.
    Remove,
}

/// Clones a parent root and applies one round of mutations to the clone.
///
/// Returns the new root's ID. The parent remains a root and is untouched.
pub fn mutate_root_clone<B: ProgramBackend>(
    graph: &mut TangledProgramGraph<B>,
    backend: &B,
    cache: &EvalCache,
    parent: TeamId,
    config: &MutationConfig,
    rng: &mut ChaCha8Rng,
) -> Result<TeamId, EvolveError> {
    config.validate()?;
    if graph.team(parent).is_none() {
        return Err(GraphError::TeamNotFound { id: parent }.into());
    }
    if !graph.is_root(parent) {
        return Err(EvolveError::ParentNotRoot { id: parent });
    }

    let clone = graph.copy_team(parent)?;
    graph.add_root(clone)?;

    if rng.gen_bool(config.remove_program_rate) {
        let members = member_snapshot(graph, clone);
        if members.len() > 1 {
            let victim = members[rng.gen_range(0..members.len())];
            graph.remove_program_from_team(clone, victim)?;
        }
    }

    if rng.gen_bool(config.add_program_rate) {
        let members: BTreeSet<ProgramId> = member_snapshot(graph, clone).into_iter().collect();
        let candidates: Vec<ProgramId> = graph
            .sorted_program_ids()
            .into_iter()
            .filter(|p| !members.contains(p))
            .collect();
        if !candidates.is_empty() {
            let chosen = candidates[rng.gen_range(0..candidates.len())];
            graph.add_program_to_team(clone, chosen)?;
        }
    }

    for program in member_snapshot(graph, clone) {
        let live = if rng.gen_bool(config.program_mutation_rate) {
            mutate_program_genome(graph, backend, clone, program, rng)?
        } else {
            program
        };
        if rng.gen_bool(config.program_action_rate) {
            mutate_program_action(graph, backend, cache, clone, live, rng)?;
        }
    }

    if rng.gen_bool(config.action_map_rate) {
        let op = match rng.gen_range(0..3) {
            0 => ActionMapOp::Add,
            1 => ActionMapOp::Change,
            _ => ActionMapOp::Remove,
        };
        mutate_action_map(graph, clone, op, rng)?;
    }

    Ok(clone)
}

/// Copy-on-write genome mutation: clones the program, mutates the clone's
/// genome through the backend, and swaps the clone into the team (keeping
/// the member slot and any action map entry). Returns the clone's ID.
pub fn mutate_program_genome<B: ProgramBackend>(
    graph: &mut TangledProgramGraph<B>,
    backend: &B,
    team: TeamId,
    program: ProgramId,
    rng: &mut ChaCha8Rng,
) -> Result<ProgramId, EvolveError> {
    require_member(graph, team, program)?;

    let copy = graph.copy_program(program, backend)?;
    graph.mutate_genome(copy, backend, rng)?;
    graph.replace_program_in_team(team, program, copy)?;
    Ok(copy)
}

/// Copy-on-write action reassignment: clones the program, gives the clone a
/// different action from the alphabet when one exists, carries the parent's
/// memoized bids over (the genome is unchanged, so the bids are identical),
/// and swaps the clone into the team. Returns the clone's ID.
pub fn mutate_program_action<B: ProgramBackend>(
    graph: &mut TangledProgramGraph<B>,
    backend: &B,
    cache: &EvalCache,
    team: TeamId,
    program: ProgramId,
    rng: &mut ChaCha8Rng,
) -> Result<ProgramId, EvolveError> {
    require_member(graph, team, program)?;

    let current = graph.program(program).and_then(|p| p.action().cloned());
    let preferred: Vec<Action> = graph
        .actions()
        .iter()
        .filter(|a| Some(*a) != current.as_ref())
        .cloned()
        .collect();

    let copy = graph.copy_program(program, backend)?;
    if !preferred.is_empty() {
        let action = preferred[rng.gen_range(0..preferred.len())].clone();
        graph.set_program_action(copy, Some(action))?;
    }
    cache.copy_program_entries(program, copy);
    graph.replace_program_in_team(team, program, copy)?;
    Ok(copy)
}

/// Applies one action map sub-operator to a team. Returns `false` when the
/// sub-operator's precondition fails (nothing to add, change, or remove),
/// which is a deliberate no-op.
pub fn mutate_action_map<B: ProgramBackend>(
    graph: &mut TangledProgramGraph<B>,
    team: TeamId,
    op: ActionMapOp,
    rng: &mut ChaCha8Rng,
) -> Result<bool, EvolveError> {
    let record = graph
        .team(team)
        .ok_or(GraphError::TeamNotFound { id: team })?;

    match op {
        ActionMapOp::Add => {
            let unmapped: Vec<ProgramId> = record
                .programs()
                .iter()
                .copied()
                .filter(|&p| record.destination_of(p).is_none())
                .collect();
            let destinations: Vec<TeamId> = graph
                .sorted_team_ids()
                .into_iter()
                .filter(|&t| t != team)
                .collect();
            if unmapped.is_empty() || destinations.is_empty() {
                return Ok(false);
            }
            let program = unmapped[rng.gen_range(0..unmapped.len())];
            let dest = destinations[rng.gen_range(0..destinations.len())];
            graph.set_team_action(team, program, Some(dest))?;
            Ok(true)
        }
        ActionMapOp::Change => {
            let entries: Vec<(ProgramId, TeamId)> = record
                .action_map()
                .iter()
                .map(|(&p, &d)| (p, d))
                .collect();
            if entries.is_empty() {
                return Ok(false);
            }
            let (program, current) = entries[rng.gen_range(0..entries.len())];
            let destinations: Vec<TeamId> = graph
                .sorted_team_ids()
                .into_iter()
                .filter(|&t| t != team && t != current)
                .collect();
            if destinations.is_empty() {
                return Ok(false);
            }
            let dest = destinations[rng.gen_range(0..destinations.len())];
            graph.set_team_action(team, program, Some(dest))?;
            Ok(true)
        }
        ActionMapOp::Remove => {
            let mapped: Vec<ProgramId> = record.action_map().keys().copied().collect();
            if mapped.is_empty() {
                return Ok(false);
            }
            let program = mapped[rng.gen_range(0..mapped.len())];
            graph.set_team_action(team, program, None)?;
            Ok(true)
        }
    }
}

fn member_snapshot<B: ProgramBackend>(
    graph: &TangledProgramGraph<B>,
    team: TeamId,
) -> Vec<ProgramId> {
    graph
        .team(team)
        .map(|t| t.programs().to_vec())
        .unwrap_or_default()
}

fn require_member<B: ProgramBackend>(
    graph: &TangledProgramGraph<B>,
    team: TeamId,
    program: ProgramId,
) -> Result<(), EvolveError> {
    let record = graph
        .team(team)
        .ok_or(GraphError::TeamNotFound { id: team })?;
    if !record.contains(program) {
        return Err(GraphError::ProgramNotInTeam { team, program }.into());
    }
    Ok(())
}
