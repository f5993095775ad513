//! Stable ID newtypes for graph entities.
//!
//! `ProgramId` and `TeamId` are distinct newtype wrappers over `u64`,
//! providing type safety so that a program identifier cannot be accidentally
//! used where a team identifier is expected. IDs are minted from per-graph
//! monotonic counters and are never reused, even after the entity is
//! garbage-collected.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable program (bidder) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProgramId(pub u64);

/// Stable team identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TeamId(pub u64);

// Display implementations -- the conventional short forms used in reports
// and DOT output.

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}
