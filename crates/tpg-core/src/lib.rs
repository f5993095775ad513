//! Core data model for tangled program graphs.
//!
//! A tangled program graph organizes small numeric programs ("bidders") into
//! teams and links teams into a directed graph via per-program action maps.
//! This crate owns the data model and its structural guarantees:
//!
//! - [`ProgramId`] / [`TeamId`] newtypes minted monotonically by the graph.
//! - [`Program`] and [`Team`] records held in central ID-keyed tables on
//!   [`TangledProgramGraph`]; every cross-reference is an ID lookup.
//! - A single edge primitive,
//!   [`TangledProgramGraph::set_team_action`], through which every action
//!   map change and all derived edge-set bookkeeping flows.
//! - Breadth-first [`Reachability`] from one or many roots.
//! - An [`IntegrityReport`]-producing verifier and an iterative orphan
//!   garbage collector.
//! - DOT rendering of the team graph.
//!
//! Evaluation and caching live in `tpg-eval`; mutation operators and the
//! evolutionary harness live in `tpg-evolve`. The bidder substrate is
//! abstract behind [`ProgramBackend`].

pub mod action;
pub mod backend;
pub mod error;
pub mod graph;
pub mod id;
pub mod program;
pub mod team;
pub mod traversal;
pub mod verify;
pub mod viz;

// Re-export commonly used types
pub use action::Action;
pub use backend::ProgramBackend;
pub use error::GraphError;
pub use graph::TangledProgramGraph;
pub use id::{ProgramId, TeamId};
pub use program::Program;
pub use team::Team;
pub use traversal::Reachability;
pub use verify::{CleanupOutcome, EdgeMismatch, IntegrityReport, PathStats};
