//! Configuration for mutation operators and the generational harness.

use serde::{Deserialize, Serialize};

use crate::error::EvolveError;

/// Probabilities for the root-clone mutation operator. All five are
/// independent gates in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MutationConfig {
    /// Chance of dropping one random program from the clone (only when more
    /// than one remains).
    pub remove_program_rate: f64,
    /// Chance of inserting one random program from elsewhere in the graph.
    pub add_program_rate: f64,
    /// Per-program chance of a copy-on-write genome mutation.
    pub program_mutation_rate: f64,
    /// Per-program chance of a copy-on-write action reassignment.
    pub program_action_rate: f64,
    /// Chance of one action map edit (add, change, or remove, chosen
    /// uniformly).
    pub action_map_rate: f64,
}

impl Default for MutationConfig {
    fn default() -> Self {
        MutationConfig {
            remove_program_rate: 0.5,
            add_program_rate: 0.5,
            program_mutation_rate: 0.3,
            program_action_rate: 0.1,
            action_map_rate: 0.25,
        }
    }
}

impl MutationConfig {
    /// Checks every rate is a probability.
    pub fn validate(&self) -> Result<(), EvolveError> {
        let rates = [
            ("remove_program_rate", self.remove_program_rate),
            ("add_program_rate", self.add_program_rate),
            ("program_mutation_rate", self.program_mutation_rate),
            ("program_action_rate", self.program_action_rate),
            ("action_map_rate", self.action_map_rate),
        ];
        for (name, rate) in rates {
            if !(0.0..=1.0).contains(&rate) {
                return Err(EvolveError::RateOutOfRange { name, rate });
            }
        }
        Ok(())
    }
}

/// Outer-loop configuration for [`Evolution`](crate::harness::Evolution).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Population size: the number of root teams kept per generation.
    pub num_initial_teams: usize,
    /// Programs in each seed team.
    pub programs_per_initial_team: usize,
    /// Generations to run.
    pub generations: usize,
    /// New roots produced per generation before selection.
    pub num_offspring_per_gen: usize,
    /// Validation roots reported per generation.
    pub k: usize,
    /// PRNG seed; a fixed seed reproduces the full run.
    pub seed: u64,
    pub mutation: MutationConfig,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        EvolutionConfig {
            num_initial_teams: 10,
            programs_per_initial_team: 3,
            generations: 50,
            num_offspring_per_gen: 10,
            k: 3,
            seed: 42,
            mutation: MutationConfig::default(),
        }
    }
}

impl EvolutionConfig {
    pub fn validate(&self) -> Result<(), EvolveError> {
        if self.num_initial_teams == 0 {
            return Err(EvolveError::InvalidConfig {
                reason: "num_initial_teams must be at least 1".to_string(),
            });
        }
        if self.programs_per_initial_team == 0 {
            return Err(EvolveError::InvalidConfig {
                reason: "programs_per_initial_team must be at least 1".to_string(),
            });
        }
        self.mutation.validate()
    }
}
