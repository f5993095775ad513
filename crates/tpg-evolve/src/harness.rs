//! The generational evolutionary loop.
//!
//! [`Evolution`] owns the graph, the backend, the cache, and a seeded PRNG.
//! Each generation it: clones and mutates offspring from random parent
//! roots, scores every root over the input batch with a caller-supplied
//! fitness function, demotes everything below the elite population size,
//! garbage-collects the unreachable subgraph, and asserts integrity. Epoch
//! callbacks observe an [`EpochContext`] after every generation; an optional
//! early-stop callback is consulted between generations (cancellation is
//! cooperative at this level only; within a generation, operations run to
//! completion).
//!
//! Residual verifier mismatches after garbage collection are terminal: the
//! loop stops with an error rather than evolving a corrupted graph.

use std::cmp::Ordering;

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::info;

use tpg_core::{Action, ProgramBackend, TangledProgramGraph, TeamId};
use tpg_eval::{
    warmup_cache, CacheMode, CacheStats, EvalCache, GraphEvaluator, GraphOutcome, WarmupReport,
};

use crate::config::EvolutionConfig;
use crate::error::EvolveError;
use crate::mutate::mutate_root_clone;

/// One root's fitness for a generation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RootScore {
    pub team: TeamId,
    pub fitness: f64,
}

/// Snapshot handed to epoch callbacks after each generation.
#[derive(Debug, Clone, Serialize)]
pub struct EpochContext {
    pub generation: usize,
    pub team_count: usize,
    pub program_count: usize,
    pub root_count: usize,
    /// Top-`k` roots of this generation, best first.
    pub best: Vec<RootScore>,
    pub cache: CacheStats,
    /// Entities swept by this generation's garbage collection.
    pub removed_teams: usize,
    pub removed_programs: usize,
}

/// Callback invoked after each generation.
pub type EpochCallback = Box<dyn FnMut(&EpochContext)>;

/// The evolutionary harness.
pub struct Evolution<B: ProgramBackend> {
    graph: TangledProgramGraph<B>,
    backend: B,
    cache: EvalCache,
    config: EvolutionConfig,
    rng: ChaCha8Rng,
    epoch_callbacks: Vec<EpochCallback>,
    early_stop: Option<Box<dyn FnMut() -> bool>>,
}

impl<B: ProgramBackend> Evolution<B> {
    /// Seeds the initial population: `num_initial_teams` root teams, each
    /// with `programs_per_initial_team` fresh random programs.
    pub fn new(
        backend: B,
        actions: Vec<Action>,
        config: EvolutionConfig,
        cache_mode: CacheMode,
    ) -> Result<Self, EvolveError> {
        config.validate()?;
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let mut graph = TangledProgramGraph::new(actions);

        for _ in 0..config.num_initial_teams {
            let mut members = Vec::with_capacity(config.programs_per_initial_team);
            for _ in 0..config.programs_per_initial_team {
                members.push(graph.add_random_program(&backend, None, &mut rng)?);
            }
            let team = graph.add_team(&members, None)?;
            graph.add_root(team)?;
        }

        Ok(Evolution {
            graph,
            backend,
            cache: EvalCache::new(cache_mode),
            config,
            rng,
            epoch_callbacks: Vec::new(),
            early_stop: None,
        })
    }

    pub fn graph(&self) -> &TangledProgramGraph<B> {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut TangledProgramGraph<B> {
        &mut self.graph
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn cache(&self) -> &EvalCache {
        &self.cache
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    /// Registers a callback invoked after every generation.
    pub fn add_epoch_callback(&mut self, callback: impl FnMut(&EpochContext) + 'static) {
        self.epoch_callbacks.push(Box::new(callback));
    }

    /// Registers the early-stop callback, consulted between generations.
    pub fn set_early_stop(&mut self, callback: impl FnMut() -> bool + 'static) {
        self.early_stop = Some(Box::new(callback));
    }

    /// Pre-populates the cache concurrently over the batch. Requires the
    /// LRU cache mode and a `Sync` backend.
    pub fn warmup(&self, inputs: &[B::Input]) -> Result<WarmupReport, EvolveError>
    where
        B: Sync,
        B::Genome: Sync,
        B::Executable: Sync,
        B::Input: Sized + Sync,
    {
        Ok(warmup_cache(&self.graph, &self.backend, &self.cache, inputs)?)
    }

    /// Runs the generational loop and returns the final elite ranking.
    ///
    /// `fitness` maps one root's outcomes over the whole batch to a score;
    /// higher is better. NaN scores rank below every finite score.
    pub fn run<F>(&mut self, inputs: &[B::Input], fitness: F) -> Result<Vec<RootScore>, EvolveError>
    where
        B::Input: Sized,
        F: Fn(&[GraphOutcome]) -> f64,
    {
        let mut elites = Vec::new();

        for generation in 0..self.config.generations {
            let parents: Vec<TeamId> = self.graph.root_teams().iter().copied().collect();
            if parents.is_empty() {
                return Err(EvolveError::InvalidConfig {
                    reason: "no root teams to evolve".to_string(),
                });
            }
            for _ in 0..self.config.num_offspring_per_gen {
                let parent = parents[self.rng.gen_range(0..parents.len())];
                mutate_root_clone(
                    &mut self.graph,
                    &self.backend,
                    &self.cache,
                    parent,
                    &self.config.mutation,
                    &mut self.rng,
                )?;
            }

            let roots: Vec<TeamId> = self.graph.root_teams().iter().copied().collect();
            let mut scores = Vec::with_capacity(roots.len());
            {
                let mut evaluator =
                    GraphEvaluator::new(&mut self.graph, &self.backend, &self.cache);
                for &root in &roots {
                    let mut outcomes = Vec::with_capacity(inputs.len());
                    for input in inputs {
                        outcomes.push(evaluator.evaluate(root, input)?);
                    }
                    scores.push(RootScore {
                        team: root,
                        fitness: fitness(&outcomes),
                    });
                }
            }
            scores.sort_by(|a, b| {
                b.fitness
                    .partial_cmp(&a.fitness)
                    .unwrap_or(Ordering::Equal)
                    .then(a.team.cmp(&b.team))
            });

            for demoted in scores.iter().skip(self.config.num_initial_teams) {
                self.graph.remove_root(demoted.team);
            }

            let swept = self.graph.cleanup_orphans()?;
            for &pid in &swept.removed_programs {
                self.cache.purge_program(pid);
            }
            if !swept.report.is_consistent() {
                return Err(EvolveError::IntegrityFailure {
                    generation,
                    mismatches: swept.report.mismatches.len(),
                });
            }

            scores.truncate(self.config.num_initial_teams);
            elites = scores;

            let context = EpochContext {
                generation,
                team_count: self.graph.team_count(),
                program_count: self.graph.program_count(),
                root_count: self.graph.root_count(),
                best: elites.iter().take(self.config.k).copied().collect(),
                cache: self.cache.stats(),
                removed_teams: swept.removed_teams.len(),
                removed_programs: swept.removed_programs.len(),
            };
            info!(
                generation,
                roots = context.root_count,
                teams = context.team_count,
                programs = context.program_count,
                best = ?context.best.first().map(|s| s.fitness),
                "generation complete"
            );
            for callback in &mut self.epoch_callbacks {
                callback(&context);
            }

            if let Some(stop) = &mut self.early_stop {
                if stop() {
                    info!(generation, "early stop requested");
                    break;
                }
            }
        }

        Ok(elites)
    }
}
