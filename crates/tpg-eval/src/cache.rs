//! Per-program bid memoization.
//!
//! The cache is logically a mapping `ProgramId -> (input_hash -> bid)` with
//! three modes: disabled, unbounded per-input, and bounded LRU. The outer
//! level is a concurrent map so the warmup phase can get-or-create shards
//! atomically from worker threads; each shard sits behind its own mutex.
//!
//! The LRU shard keeps entries in an [`IndexMap`] whose insertion order
//! doubles as recency order: a hit re-inserts the entry at the back, and
//! eviction pops the front.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use dashmap::DashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use tpg_core::ProgramId;

/// Default bound for the LRU mode's per-program entry count.
pub const DEFAULT_LRU_CAPACITY: usize = 1000;

/// Cache behavior selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    /// No storage; every evaluation recomputes.
    Off,
    /// Unbounded per-input memoization; grows until cleared.
    PerInput,
    /// Bounded per-program memoization with least-recently-used eviction.
    Lru { max_size: usize },
}

impl Default for CacheMode {
    fn default() -> Self {
        CacheMode::Lru {
            max_size: DEFAULT_LRU_CAPACITY,
        }
    }
}

/// Hit/miss counters and the current entry total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

#[derive(Debug, Clone)]
enum ProgramShard {
    PerInput(HashMap<u64, f64>),
    Lru(LruShard),
}

impl ProgramShard {
    fn get(&mut self, input_hash: u64) -> Option<f64> {
        match self {
            ProgramShard::PerInput(map) => map.get(&input_hash).copied(),
            ProgramShard::Lru(lru) => lru.get(input_hash),
        }
    }

    fn insert(&mut self, input_hash: u64, bid: f64) {
        match self {
            ProgramShard::PerInput(map) => {
                map.insert(input_hash, bid);
            }
            ProgramShard::Lru(lru) => lru.insert(input_hash, bid),
        }
    }

    fn len(&self) -> usize {
        match self {
            ProgramShard::PerInput(map) => map.len(),
            ProgramShard::Lru(lru) => lru.entries.len(),
        }
    }
}

#[derive(Debug, Clone)]
struct LruShard {
    cap: usize,
    entries: IndexMap<u64, f64>,
}

impl LruShard {
    fn new(cap: usize) -> Self {
        LruShard {
            cap: cap.max(1),
            entries: IndexMap::new(),
        }
    }

    fn get(&mut self, key: u64) -> Option<f64> {
        let value = self.entries.shift_remove(&key)?;
        self.entries.insert(key, value);
        Some(value)
    }

    fn insert(&mut self, key: u64, value: f64) {
        if self.entries.shift_remove(&key).is_none() && self.entries.len() >= self.cap {
            self.entries.shift_remove_index(0);
        }
        self.entries.insert(key, value);
    }
}

/// The evaluation cache shared by the sequential evaluator and the warmup
/// workers.
#[derive(Debug)]
pub struct EvalCache {
    mode: CacheMode,
    shards: DashMap<ProgramId, Mutex<ProgramShard>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl EvalCache {
    pub fn new(mode: CacheMode) -> Self {
        EvalCache {
            mode,
            shards: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// A cache that never stores anything.
    pub fn off() -> Self {
        Self::new(CacheMode::Off)
    }

    /// An unbounded per-input cache.
    pub fn per_input() -> Self {
        Self::new(CacheMode::PerInput)
    }

    /// A bounded LRU cache with the given per-program capacity.
    pub fn lru(max_size: usize) -> Self {
        Self::new(CacheMode::Lru { max_size })
    }

    pub fn mode(&self) -> CacheMode {
        self.mode
    }

    /// Whether any storage happens at all.
    pub fn is_enabled(&self) -> bool {
        !matches!(self.mode, CacheMode::Off)
    }

    /// Whether concurrent warmup may use this cache. Only the bounded LRU
    /// mode is guaranteed safe for the warmup phase.
    pub fn is_warmup_safe(&self) -> bool {
        matches!(self.mode, CacheMode::Lru { .. })
    }

    /// Returns the memoized bid for `(program, input_hash)`, updating hit or
    /// miss counters. Always `None` when the cache is off (without counting).
    pub fn lookup(&self, program: ProgramId, input_hash: u64) -> Option<f64> {
        if !self.is_enabled() {
            return None;
        }
        let found = self.shards.get(&program).and_then(|shard| {
            let mut guard = shard.lock().unwrap_or_else(PoisonError::into_inner);
            guard.get(input_hash)
        });
        match found {
            Some(bid) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(bid)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Memoizes a bid. No-op when the cache is off.
    pub fn store(&self, program: ProgramId, input_hash: u64, bid: f64) {
        let fresh = match self.mode {
            CacheMode::Off => return,
            CacheMode::PerInput => ProgramShard::PerInput(HashMap::new()),
            CacheMode::Lru { max_size } => ProgramShard::Lru(LruShard::new(max_size)),
        };
        let shard = self.shards.entry(program).or_insert_with(|| Mutex::new(fresh));
        let mut guard = shard.lock().unwrap_or_else(PoisonError::into_inner);
        guard.insert(input_hash, bid);
    }

    /// Duplicates one program's entries under another ID. Used when a
    /// program's action is mutated: the clone bids identically, so its
    /// memoized bids carry over.
    pub fn copy_program_entries(&self, from: ProgramId, to: ProgramId) {
        if from == to {
            return;
        }
        let cloned = self.shards.get(&from).map(|shard| {
            let guard = shard.lock().unwrap_or_else(PoisonError::into_inner);
            guard.clone()
        });
        if let Some(inner) = cloned {
            self.shards.insert(to, Mutex::new(inner));
        }
    }

    /// Drops all entries for a program. Called when the program record is
    /// deleted by garbage collection.
    pub fn purge_program(&self, program: ProgramId) {
        self.shards.remove(&program);
    }

    /// Drops every entry, keeping the counters.
    pub fn clear(&self) {
        self.shards.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self
            .shards
            .iter()
            .map(|shard| shard.lock().unwrap_or_else(PoisonError::into_inner).len())
            .sum();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries,
        }
    }
}
