//! The capability seam between the graph engine and the bidder substrate.
//!
//! The graph never looks inside a genome: it stores genomes, asks the backend
//! to decode them into executables, and asks the backend to produce a numeric
//! bid for an input. Everything substrate-specific (instruction library,
//! register architecture, shared inputs) lives inside the backend
//! implementation.
//!
//! Reproducibility: every randomized operation takes `&mut ChaCha8Rng`, so a
//! fixed seed reproduces genome creation and mutation exactly.

use std::fmt;

use rand_chacha::ChaCha8Rng;

/// Contract with the inner numeric-program substrate.
///
/// Implementations decide what a genome is, how it decodes into an
/// executable, and how an executable bids on an input. The engine only
/// requires that decoding is a pure function of the genome and that
/// evaluation is deterministic for a given `(executable, input)` pair.
pub trait ProgramBackend {
    /// Opaque heritable payload. Cloning must be a deep copy unless
    /// [`deep_copy`](Self::deep_copy) is overridden.
    type Genome: Clone + fmt::Debug;

    /// Decoded, runnable form of a genome. May carry per-evaluation scratch
    /// state; [`reset`](Self::reset) clears it.
    type Executable;

    /// The input vector type programs bid on.
    type Input: ?Sized;

    /// Creates a fresh random genome.
    fn make_random_genome(&self, rng: &mut ChaCha8Rng) -> Self::Genome;

    /// Decodes a genome into an executable. Pure: the result depends only on
    /// the genome.
    fn decode(&self, genome: &Self::Genome) -> Self::Executable;

    /// Produces the numeric bid of an executable on an input.
    fn evaluate(&self, executable: &mut Self::Executable, input: &Self::Input) -> f64;

    /// Mutates a genome in place. The caller is responsible for invalidating
    /// any executable previously decoded from it.
    fn mutate(&self, genome: &mut Self::Genome, rng: &mut ChaCha8Rng);

    /// Clears per-evaluation scratch state inside an executable.
    fn reset(&self, executable: &mut Self::Executable);

    /// Hashes an input to the 64-bit key used by the evaluation cache.
    fn hash_input(&self, input: &Self::Input) -> u64;

    /// Deep-copies a genome. Defaults to `Clone`.
    fn deep_copy(&self, genome: &Self::Genome) -> Self::Genome {
        genome.clone()
    }
}
