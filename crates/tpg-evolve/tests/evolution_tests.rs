//! End-to-end tests for the evolutionary harness.
//!
//! Uses a small linear-scoring backend: a genome is a weight vector and a
//! program's bid is the dot product with the input. The task is a toy
//! threshold classification so fitness has a real gradient for selection to
//! climb, but these tests assert engine properties (reproducibility,
//! integrity under mutation pressure, callback wiring), not learning
//! quality.

use std::cell::Cell;
use std::rc::Rc;

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use tpg_core::{Action, ProgramBackend, TangledProgramGraph};
use tpg_eval::{CacheMode, EvalCache, GraphOutcome, GraphOutput};
use tpg_evolve::{
    mutate_root_clone, Evolution, EvolutionConfig, MutationConfig,
};

#[derive(Debug, Clone)]
struct Weights([f64; 3]);

struct LinearBackend;

impl ProgramBackend for LinearBackend {
    type Genome = Weights;
    type Executable = Weights;
    type Input = [f64; 3];

    fn make_random_genome(&self, rng: &mut ChaCha8Rng) -> Weights {
        Weights([
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        ])
    }

    fn decode(&self, genome: &Weights) -> Weights {
        genome.clone()
    }

    fn evaluate(&self, executable: &mut Weights, input: &[f64; 3]) -> f64 {
        executable
            .0
            .iter()
            .zip(input.iter())
            .map(|(w, x)| w * x)
            .sum()
    }

    fn mutate(&self, genome: &mut Weights, rng: &mut ChaCha8Rng) {
        let slot = rng.gen_range(0..3);
        genome.0[slot] += rng.gen_range(-0.5..0.5);
    }

    fn reset(&self, _executable: &mut Weights) {}

    fn hash_input(&self, input: &[f64; 3]) -> u64 {
        input.iter().fold(0u64, |acc, v| {
            acc.wrapping_mul(0x100000001b3).wrapping_add(v.to_bits())
        })
    }
}

fn batch() -> Vec<[f64; 3]> {
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    (0..16)
        .map(|_| {
            [
                rng.gen_range(-2.0..2.0),
                rng.gen_range(-2.0..2.0),
                rng.gen_range(-2.0..2.0),
            ]
        })
        .collect()
}

/// Fraction of batch items where the emitted action matches the threshold
/// label of the input.
fn accuracy(inputs: &[[f64; 3]], outcomes: &[GraphOutcome]) -> f64 {
    let correct = inputs
        .iter()
        .zip(outcomes.iter())
        .filter(|(input, outcome)| {
            let label = if input[0] + input[1] > input[2] { 1 } else { 0 };
            outcome.output == GraphOutput::Action(Action::Int(label))
        })
        .count();
    correct as f64 / inputs.len() as f64
}

fn config() -> EvolutionConfig {
    EvolutionConfig {
        num_initial_teams: 5,
        programs_per_initial_team: 2,
        generations: 6,
        num_offspring_per_gen: 5,
        k: 3,
        seed: 1234,
        mutation: MutationConfig::default(),
    }
}

#[test]
fn full_run_keeps_population_and_integrity() {
    let inputs = batch();
    let mut evolution = Evolution::new(
        LinearBackend,
        vec![Action::Int(0), Action::Int(1)],
        config(),
        CacheMode::PerInput,
    )
    .unwrap();

    let scored_inputs = inputs.clone();
    let elites = evolution
        .run(&inputs, move |outcomes| accuracy(&scored_inputs, outcomes))
        .unwrap();

    assert_eq!(elites.len(), 5);
    for elite in &elites {
        assert!(evolution.graph().is_root(elite.team));
        assert!((0.0..=1.0).contains(&elite.fitness));
    }
    // Ranking is best-first.
    for pair in elites.windows(2) {
        assert!(pair[0].fitness >= pair[1].fitness);
    }

    assert_eq!(evolution.graph().root_count(), 5);
    let report = evolution.graph().verify_integrity();
    assert!(report.is_consistent(), "{:?}", report.mismatches);
    assert!(!report.has_orphans());
}

#[test]
fn identical_seeds_reproduce_identical_runs() {
    let inputs = batch();

    let mut runs = Vec::new();
    for _ in 0..2 {
        let mut evolution = Evolution::new(
            LinearBackend,
            vec![Action::Int(0), Action::Int(1)],
            config(),
            CacheMode::Off,
        )
        .unwrap();
        let scored_inputs = inputs.clone();
        let elites = evolution
            .run(&inputs, move |outcomes| accuracy(&scored_inputs, outcomes))
            .unwrap();
        runs.push(elites);
    }

    assert_eq!(runs[0], runs[1]);
}

#[test]
fn epoch_callbacks_and_early_stop_are_honored() {
    let inputs = batch();
    let mut evolution = Evolution::new(
        LinearBackend,
        vec![Action::Int(0), Action::Int(1)],
        config(),
        CacheMode::Lru { max_size: 64 },
    )
    .unwrap();
    evolution.warmup(&inputs).unwrap();

    let epochs = Rc::new(Cell::new(0usize));
    let seen_best = Rc::new(Cell::new(0usize));
    {
        let epochs = Rc::clone(&epochs);
        let seen_best = Rc::clone(&seen_best);
        evolution.add_epoch_callback(move |context| {
            epochs.set(epochs.get() + 1);
            seen_best.set(seen_best.get().max(context.best.len()));
            assert_eq!(context.root_count, 5);
        });
    }
    {
        let epochs = Rc::clone(&epochs);
        evolution.set_early_stop(move || epochs.get() >= 2);
    }

    let scored_inputs = inputs.clone();
    evolution
        .run(&inputs, move |outcomes| accuracy(&scored_inputs, outcomes))
        .unwrap();

    // Stopped after the second generation, not the configured sixth.
    assert_eq!(epochs.get(), 2);
    // k = 3 top roots reported.
    assert_eq!(seen_best.get(), 3);
}

#[test]
fn sustained_mutation_pressure_preserves_invariants() {
    let mut graph = TangledProgramGraph::new(vec![Action::Int(0), Action::Int(1)]);
    let backend = LinearBackend;
    let cache = EvalCache::per_input();
    let mut rng = ChaCha8Rng::seed_from_u64(2024);

    for _ in 0..3 {
        let mut members = Vec::new();
        for _ in 0..3 {
            let genome = backend.make_random_genome(&mut rng);
            members.push(graph.add_program(genome, None, &mut rng).unwrap());
        }
        let team = graph.add_team(&members, None).unwrap();
        graph.add_root(team).unwrap();
    }

    let config = MutationConfig {
        remove_program_rate: 0.4,
        add_program_rate: 0.6,
        program_mutation_rate: 0.5,
        program_action_rate: 0.3,
        action_map_rate: 0.8,
    };

    for round in 0..200 {
        let roots: Vec<_> = graph.root_teams().iter().copied().collect();
        let parent = roots[rng.gen_range(0..roots.len())];
        mutate_root_clone(&mut graph, &backend, &cache, parent, &config, &mut rng).unwrap();

        let report = graph.verify_integrity();
        assert!(
            report.is_consistent(),
            "round {}: {:?}",
            round,
            report.mismatches
        );

        // Keep the root set bounded the way a harness would.
        if graph.root_count() > 8 {
            let roots: Vec<_> = graph.root_teams().iter().copied().collect();
            for &surplus in &roots[3..] {
                graph.remove_root(surplus);
            }
            let swept = graph.cleanup_orphans().unwrap();
            for pid in swept.removed_programs {
                cache.purge_program(pid);
            }
            assert!(swept.report.is_consistent());
            assert!(!swept.report.has_orphans());
        }
    }
}
