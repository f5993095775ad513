//! Breadth-first reachability over the team graph.
//!
//! Traversal follows team out-edges (the values of each action map) from one
//! or many starting teams, producing the reachable team set, the union of
//! their programs, and the shortest hop distance of each reachable team from
//! any start. Cycles are handled by only re-enqueuing a team when a strictly
//! shorter path to it is discovered.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::backend::ProgramBackend;
use crate::graph::TangledProgramGraph;
use crate::id::{ProgramId, TeamId};

/// Result of a reachability sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reachability {
    /// Teams reachable from the starting set.
    pub teams: BTreeSet<TeamId>,
    /// Union of `programs` over all reachable teams.
    pub programs: BTreeSet<ProgramId>,
    /// Shortest distance (in team hops) from any starting team.
    pub distances: BTreeMap<TeamId, usize>,
}

impl<B: ProgramBackend> TangledProgramGraph<B> {
    /// Breadth-first reachability from the given starting teams.
    ///
    /// Starting IDs that do not exist are ignored. Dangling action map
    /// destinations (teams force-removed while still referenced) are skipped.
    pub fn reachable_from<I>(&self, starts: I) -> Reachability
    where
        I: IntoIterator<Item = TeamId>,
    {
        let mut reach = Reachability::default();
        let mut queue = VecDeque::new();

        for start in starts {
            if self.team(start).is_some() {
                reach.distances.insert(start, 0);
                queue.push_back(start);
            }
        }

        while let Some(current) = queue.pop_front() {
            let depth = reach.distances[&current];
            let team = match self.team(current) {
                Some(t) => t,
                None => continue,
            };
            reach.teams.insert(current);
            reach.programs.extend(team.programs().iter().copied());

            for &next in team.out_edges() {
                if self.team(next).is_none() {
                    continue;
                }
                match reach.distances.get(&next) {
                    Some(&known) if known <= depth + 1 => {}
                    _ => {
                        reach.distances.insert(next, depth + 1);
                        queue.push_back(next);
                    }
                }
            }
        }

        reach
    }

    /// Reachability from every current root team.
    pub fn reachable_from_roots(&self) -> Reachability {
        self.reachable_from(self.root_teams().iter().copied())
    }
}
