//! Evolution for tangled program graphs.
//!
//! Builds on `tpg-core` (data model) and `tpg-eval` (evaluation) to evolve
//! decision graphs generationally:
//!
//! - [`mutate_root_clone`] implements the copy-on-write root-clone strategy:
//!   clone the parent root, then optionally drop a member, pull in an
//!   outside program, mutate program genomes and actions behind fresh
//!   copies, and edit the action map — all through the core edge primitive.
//! - [`Evolution`] runs the outer loop: offspring, batch evaluation,
//!   fitness ranking, demotion, garbage collection, integrity check, epoch
//!   callbacks, and cooperative early stop.
//!
//! A fixed [`EvolutionConfig::seed`] makes a whole run reproducible.

pub mod config;
pub mod error;
pub mod harness;
pub mod mutate;

pub use config::{EvolutionConfig, MutationConfig};
pub use error::EvolveError;
pub use harness::{EpochContext, Evolution, RootScore};
pub use mutate::{
    mutate_action_map, mutate_program_action, mutate_program_genome, mutate_root_clone,
    ActionMapOp,
};
