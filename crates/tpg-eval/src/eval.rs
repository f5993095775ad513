//! Team and graph evaluators.
//!
//! A team is evaluated by running every member program on the input and
//! selecting the strictly greatest bid (ties resolve to the lowest program
//! ID). A graph is evaluated by following winning programs' action map
//! entries from a root team until a winner has no successor, the successor
//! no longer exists, or a team repeats (loop detection). The output is the
//! final winner's action when it has one, otherwise its bid.
//!
//! Executables are decoded lazily and cached on the program record, so the
//! evaluator holds a mutable borrow of the graph for the duration of a call.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use tpg_core::{Action, GraphError, ProgramBackend, ProgramId, TangledProgramGraph, TeamId};

use crate::cache::EvalCache;
use crate::error::EvalError;
use crate::trace::EvalStep;

/// Result of evaluating one team on one input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TeamEvaluation {
    /// The program with the winning bid.
    pub winner: ProgramId,
    /// The winning bid; the team's output value.
    pub bid: f64,
    /// Successor team from the winner's action map entry, if any.
    pub next: Option<TeamId>,
}

/// The user-facing value a graph evaluation produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GraphOutput {
    /// The final winning program's assigned action.
    Action(Action),
    /// The final winning bid, when the winner has no action.
    Bid(f64),
}

/// Full result of one graph evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphOutcome {
    pub output: GraphOutput,
    /// Teams visited in order, with each team's winner and bid.
    pub path: Vec<EvalStep>,
    /// Whether traversal terminated by revisiting a team.
    pub looped: bool,
}

/// Evaluates programs, teams, and whole graphs against one backend and one
/// cache.
pub struct GraphEvaluator<'g, B: ProgramBackend> {
    graph: &'g mut TangledProgramGraph<B>,
    backend: &'g B,
    cache: &'g EvalCache,
}

impl<'g, B: ProgramBackend> GraphEvaluator<'g, B> {
    pub fn new(
        graph: &'g mut TangledProgramGraph<B>,
        backend: &'g B,
        cache: &'g EvalCache,
    ) -> Self {
        GraphEvaluator {
            graph,
            backend,
            cache,
        }
    }

    /// Produces one program's bid on an input, consulting the cache first
    /// and decoding the genome on first use.
    pub fn program_bid(&mut self, program: ProgramId, input: &B::Input) -> Result<f64, EvalError> {
        let input_hash = self.backend.hash_input(input);
        if let Some(bid) = self.cache.lookup(program, input_hash) {
            return Ok(bid);
        }

        let backend = self.backend;
        let record = self
            .graph
            .program_mut(program)
            .ok_or(GraphError::ProgramNotFound { id: program })?;
        let executable = record.ensure_decoded(backend);
        backend.reset(executable);
        let bid = backend.evaluate(executable, input);

        self.cache.store(program, input_hash, bid);
        Ok(bid)
    }

    /// Evaluates every program in a team and selects the winner.
    ///
    /// The winner is the strictly greatest bid; equal bids resolve to the
    /// lowest program ID. A NaN bid is unexpected: it is reported with a
    /// warning and the first program in team order is chosen.
    pub fn evaluate_team(
        &mut self,
        team: TeamId,
        input: &B::Input,
    ) -> Result<TeamEvaluation, EvalError> {
        let members: Vec<ProgramId> = self
            .graph
            .team(team)
            .ok_or(GraphError::TeamNotFound { id: team })?
            .programs()
            .to_vec();
        if members.is_empty() {
            return Err(EvalError::EmptyTeam { id: team });
        }

        let mut bids = Vec::with_capacity(members.len());
        for &pid in &members {
            bids.push((pid, self.program_bid(pid, input)?));
        }

        let (winner, bid) = if bids.iter().any(|&(_, b)| b.is_nan()) {
            warn!(team = %team, "non-numeric bid during team evaluation; choosing first program");
            bids[0]
        } else {
            let mut best = bids[0];
            for &(pid, bid) in &bids[1..] {
                if bid > best.1 || (bid == best.1 && pid < best.0) {
                    best = (pid, bid);
                }
            }
            best
        };

        let next = self.graph.team(team).and_then(|t| t.destination_of(winner));
        Ok(TeamEvaluation { winner, bid, next })
    }

    /// Evaluates the graph from a root team.
    ///
    /// Follows winners' action map entries until the winner has no mapping,
    /// the mapped team no longer exists, or a team would be revisited. The
    /// revisit case is ordinary loop termination, reported at debug level.
    pub fn evaluate(&mut self, root: TeamId, input: &B::Input) -> Result<GraphOutcome, EvalError> {
        if self.graph.team(root).is_none() {
            return Err(EvalError::RootNotFound { id: root });
        }

        let mut visited: HashSet<TeamId> = HashSet::new();
        let mut path = Vec::new();
        let mut looped = false;
        let mut current = root;

        let (final_winner, final_bid) = loop {
            let team_eval = self.evaluate_team(current, input)?;
            path.push(EvalStep {
                team: current,
                winner: team_eval.winner,
                bid: team_eval.bid,
            });
            visited.insert(current);

            match team_eval.next {
                Some(next) if self.graph.team(next).is_some() => {
                    if visited.contains(&next) {
                        debug!(team = %next, "loop detected during graph evaluation");
                        looped = true;
                        break (team_eval.winner, team_eval.bid);
                    }
                    current = next;
                }
                _ => break (team_eval.winner, team_eval.bid),
            }
        };

        let output = match self.graph.program(final_winner).and_then(|p| p.action().cloned()) {
            Some(action) => GraphOutput::Action(action),
            None => GraphOutput::Bid(final_bid),
        };
        Ok(GraphOutcome {
            output,
            path,
            looped,
        })
    }
}
