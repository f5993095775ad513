//! Concurrent cache warmup.
//!
//! During the harness warmup phase, every program is evaluated independently
//! over a batch of inputs to pre-populate the cache before the sequential
//! evaluation phase. Work is partitioned by program across scoped worker
//! threads; each worker decodes its own private executable, so the scratch
//! state inside an executable is never shared. Results are idempotent and
//! completion order is irrelevant.
//!
//! Only the bounded LRU cache mode is guaranteed safe here; warmup refuses
//! other modes instead of silently degrading.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use tracing::info;

use tpg_core::{ProgramBackend, TangledProgramGraph};

use crate::cache::EvalCache;
use crate::error::EvalError;

/// Accounting for one warmup run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarmupReport {
    /// Programs visited.
    pub programs: usize,
    /// Batch items per program.
    pub inputs: usize,
    /// Evaluations actually performed (cache hits are skipped).
    pub evaluations: u64,
}

/// Pre-populates the cache with every program's bid on every batch input.
pub fn warmup_cache<B>(
    graph: &TangledProgramGraph<B>,
    backend: &B,
    cache: &EvalCache,
    inputs: &[B::Input],
) -> Result<WarmupReport, EvalError>
where
    B: ProgramBackend + Sync,
    B::Genome: Sync,
    B::Executable: Sync,
    B::Input: Sized + Sync,
{
    if !cache.is_warmup_safe() {
        return Err(EvalError::CacheNotWarmupSafe { mode: cache.mode() });
    }

    let ids = graph.sorted_program_ids();
    if ids.is_empty() || inputs.is_empty() {
        return Ok(WarmupReport {
            programs: ids.len(),
            inputs: inputs.len(),
            evaluations: 0,
        });
    }

    let workers = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(ids.len());
    let chunk_size = (ids.len() + workers - 1) / workers;
    let evaluations = AtomicU64::new(0);

    thread::scope(|scope| {
        for chunk in ids.chunks(chunk_size) {
            let evaluations = &evaluations;
            scope.spawn(move || {
                for &pid in chunk {
                    let Some(program) = graph.program(pid) else {
                        continue;
                    };
                    // Private executable per worker thread.
                    let mut executable = backend.decode(program.genome());
                    for input in inputs {
                        let hash = backend.hash_input(input);
                        if cache.lookup(pid, hash).is_some() {
                            continue;
                        }
                        backend.reset(&mut executable);
                        let bid = backend.evaluate(&mut executable, input);
                        cache.store(pid, hash, bid);
                        evaluations.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }
    });

    let report = WarmupReport {
        programs: ids.len(),
        inputs: inputs.len(),
        evaluations: evaluations.load(Ordering::Relaxed),
    };
    info!(
        programs = report.programs,
        inputs = report.inputs,
        evaluations = report.evaluations,
        "cache warmup complete"
    );
    Ok(report)
}
