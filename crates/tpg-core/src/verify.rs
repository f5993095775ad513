//! Integrity verification and reachability-based garbage collection.
//!
//! The verifier cross-checks every stored edge set against the same set
//! recomputed from the action maps (the single source of truth), reports
//! orphaned teams and programs, and summarizes shortest-path statistics over
//! the reachable subgraph.
//!
//! Garbage collection iteratively force-removes orphaned teams and deletes
//! program records no team owns, repeating until a pass removes nothing. A
//! pass that removes nothing while orphans remain indicates a defect in the
//! edge maintenance machinery and aborts with an error rather than looping.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::backend::ProgramBackend;
use crate::error::GraphError;
use crate::graph::TangledProgramGraph;
use crate::id::{ProgramId, TeamId};

/// One stored-versus-recomputed discrepancy found by the verifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeMismatch {
    /// An action map key is not a member of its team.
    MapKeyNotMember { team: TeamId, program: ProgramId },
    /// An action map entry routes to a team that no longer exists.
    DanglingMapDestination {
        team: TeamId,
        program: ProgramId,
        dest: TeamId,
    },
    /// A team's stored out-edges differ from the values of its action map.
    TeamOutEdges {
        team: TeamId,
        stored: Vec<TeamId>,
        computed: Vec<TeamId>,
    },
    /// A team's stored in-edges differ from the set of teams routing to it.
    TeamInEdges {
        team: TeamId,
        stored: Vec<TeamId>,
        computed: Vec<TeamId>,
    },
    /// A program's stored in-edges differ from the teams containing it.
    ProgramInEdges {
        program: ProgramId,
        stored: Vec<TeamId>,
        computed: Vec<TeamId>,
    },
    /// A program's stored out-edges differ from the destinations its owning
    /// teams route it to.
    ProgramOutEdges {
        program: ProgramId,
        stored: Vec<TeamId>,
        computed: Vec<TeamId>,
    },
    /// A root team that does not exist in the team table.
    DanglingRoot { team: TeamId },
}

/// Shortest-path statistics over reachable teams, in team hops.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathStats {
    pub min: usize,
    pub max: usize,
    pub mean: f64,
    pub stddev: f64,
}

/// Full verifier output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub total_teams: usize,
    pub total_programs: usize,
    pub reachable_teams: usize,
    pub reachable_programs: usize,
    /// Percentage of teams reachable from the root set.
    pub team_coverage: f64,
    /// Percentage of programs included in some reachable team.
    pub program_coverage: f64,
    /// Teams not reachable from any root.
    pub orphan_teams: Vec<TeamId>,
    /// Programs not included in any reachable team.
    pub orphan_programs: Vec<ProgramId>,
    pub mismatches: Vec<EdgeMismatch>,
    /// Present when at least one team is reachable.
    pub path_stats: Option<PathStats>,
}

impl IntegrityReport {
    /// True when no stored edge set disagrees with the recomputed structure.
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty()
    }

    /// True when any team or program is unreachable from the root set.
    pub fn has_orphans(&self) -> bool {
        !self.orphan_teams.is_empty() || !self.orphan_programs.is_empty()
    }
}

impl fmt::Display for IntegrityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "teams: {}/{} reachable ({:.1}%), programs: {}/{} reachable ({:.1}%)",
            self.reachable_teams,
            self.total_teams,
            self.team_coverage,
            self.reachable_programs,
            self.total_programs,
            self.program_coverage,
        )?;
        writeln!(
            f,
            "orphans: {} team(s), {} program(s); mismatches: {}",
            self.orphan_teams.len(),
            self.orphan_programs.len(),
            self.mismatches.len(),
        )?;
        if let Some(stats) = &self.path_stats {
            writeln!(
                f,
                "path length: min {} max {} mean {:.2} stddev {:.2}",
                stats.min, stats.max, stats.mean, stats.stddev,
            )?;
        }
        Ok(())
    }
}

/// What a garbage collection run removed, plus the post-cleanup report.
#[derive(Debug, Clone)]
pub struct CleanupOutcome {
    /// Force-removed orphan teams, in removal order.
    pub removed_teams: Vec<TeamId>,
    /// Deleted program records. The caller is responsible for purging any
    /// evaluation cache entries keyed by these IDs.
    pub removed_programs: Vec<ProgramId>,
    /// Number of remove passes performed.
    pub passes: usize,
    /// Verifier report taken after the final pass.
    pub report: IntegrityReport,
}

impl<B: ProgramBackend> TangledProgramGraph<B> {
    /// Cross-checks all stored edges against the structure recomputed from
    /// the action maps and reports orphans and path statistics.
    ///
    /// Edge checks run over the reachable subgraph; in/out sets are compared
    /// against structure computed over the entire table, so edges from
    /// orphans into reachable entities are accounted for.
    pub fn verify_integrity(&self) -> IntegrityReport {
        let reach = self.reachable_from_roots();
        let mut mismatches = Vec::new();

        // Recomputed team in-edges: sources per destination, over all teams.
        let mut routed_from: BTreeMap<TeamId, BTreeSet<TeamId>> = BTreeMap::new();
        for tid in self.sorted_team_ids() {
            if let Some(team) = self.team(tid) {
                for &dest in team.action_map().values() {
                    routed_from.entry(dest).or_default().insert(tid);
                }
            }
        }

        for &tid in &reach.teams {
            let team = match self.team(tid) {
                Some(t) => t,
                None => continue,
            };

            for (&pid, &dest) in team.action_map() {
                if !team.contains(pid) {
                    mismatches.push(EdgeMismatch::MapKeyNotMember { team: tid, program: pid });
                }
                if self.team(dest).is_none() {
                    mismatches.push(EdgeMismatch::DanglingMapDestination {
                        team: tid,
                        program: pid,
                        dest,
                    });
                }
            }

            let computed_out: BTreeSet<TeamId> = team.action_map().values().copied().collect();
            if &computed_out != team.out_edges() {
                mismatches.push(EdgeMismatch::TeamOutEdges {
                    team: tid,
                    stored: team.out_edges().iter().copied().collect(),
                    computed: computed_out.into_iter().collect(),
                });
            }

            let computed_in = routed_from.remove(&tid).unwrap_or_default();
            if &computed_in != team.in_edges() {
                mismatches.push(EdgeMismatch::TeamInEdges {
                    team: tid,
                    stored: team.in_edges().iter().copied().collect(),
                    computed: computed_in.into_iter().collect(),
                });
            }
        }

        for &pid in &reach.programs {
            let program = match self.program(pid) {
                Some(p) => p,
                None => continue,
            };

            let mut computed_in = BTreeSet::new();
            let mut computed_out = BTreeSet::new();
            for tid in self.sorted_team_ids() {
                if let Some(team) = self.team(tid) {
                    if team.contains(pid) {
                        computed_in.insert(tid);
                        if let Some(dest) = team.destination_of(pid) {
                            computed_out.insert(dest);
                        }
                    }
                }
            }

            if &computed_in != program.in_edges() {
                mismatches.push(EdgeMismatch::ProgramInEdges {
                    program: pid,
                    stored: program.in_edges().iter().copied().collect(),
                    computed: computed_in.into_iter().collect(),
                });
            }
            if &computed_out != program.out_edges() {
                mismatches.push(EdgeMismatch::ProgramOutEdges {
                    program: pid,
                    stored: program.out_edges().iter().copied().collect(),
                    computed: computed_out.into_iter().collect(),
                });
            }
        }

        for &root in self.root_teams() {
            if self.team(root).is_none() {
                mismatches.push(EdgeMismatch::DanglingRoot { team: root });
            }
        }

        let orphan_teams: Vec<TeamId> = self
            .sorted_team_ids()
            .into_iter()
            .filter(|t| !reach.teams.contains(t))
            .collect();
        let orphan_programs: Vec<ProgramId> = self
            .sorted_program_ids()
            .into_iter()
            .filter(|p| !reach.programs.contains(p))
            .collect();

        let path_stats = compute_path_stats(reach.distances.values().copied());

        IntegrityReport {
            total_teams: self.team_count(),
            total_programs: self.program_count(),
            reachable_teams: reach.teams.len(),
            reachable_programs: reach.programs.len(),
            team_coverage: percentage(reach.teams.len(), self.team_count()),
            program_coverage: percentage(reach.programs.len(), self.program_count()),
            orphan_teams,
            orphan_programs,
            mismatches,
            path_stats,
        }
    }

    /// Iteratively removes everything unreachable from the root set.
    ///
    /// Each pass force-removes orphaned teams, then deletes program records
    /// with no remaining owner. Errors with
    /// [`GraphError::CleanupStalled`] if a pass removes nothing while orphans
    /// remain.
    pub fn cleanup_orphans(&mut self) -> Result<CleanupOutcome, GraphError> {
        let mut removed_teams = Vec::new();
        let mut removed_programs = Vec::new();
        let mut passes = 0usize;

        loop {
            let reach = self.reachable_from_roots();
            let orphan_teams: Vec<TeamId> = self
                .sorted_team_ids()
                .into_iter()
                .filter(|t| !reach.teams.contains(t))
                .collect();
            let orphan_programs: Vec<ProgramId> = self
                .sorted_program_ids()
                .into_iter()
                .filter(|p| !reach.programs.contains(p))
                .collect();

            if orphan_teams.is_empty() && orphan_programs.is_empty() {
                break;
            }
            passes += 1;
            let mut removed_this_pass = 0usize;

            for &tid in &orphan_teams {
                self.remove_team(tid, true)?;
                removed_teams.push(tid);
                removed_this_pass += 1;
            }
            for &pid in &orphan_programs {
                let unowned = self.program(pid).map_or(false, |p| p.in_edges().is_empty());
                if unowned {
                    self.delete_program(pid);
                    removed_programs.push(pid);
                    removed_this_pass += 1;
                }
            }

            if removed_this_pass == 0 {
                return Err(GraphError::CleanupStalled {
                    orphan_teams: orphan_teams.len(),
                    orphan_programs: orphan_programs.len(),
                });
            }
        }

        if passes > 0 {
            info!(
                passes,
                teams = removed_teams.len(),
                programs = removed_programs.len(),
                "orphan cleanup complete"
            );
        }

        let report = self.verify_integrity();
        Ok(CleanupOutcome {
            removed_teams,
            removed_programs,
            passes,
            report,
        })
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        100.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn compute_path_stats(distances: impl Iterator<Item = usize>) -> Option<PathStats> {
    let lengths: Vec<usize> = distances.collect();
    if lengths.is_empty() {
        return None;
    }
    let min = *lengths.iter().min().unwrap_or(&0);
    let max = *lengths.iter().max().unwrap_or(&0);
    let mean = lengths.iter().sum::<usize>() as f64 / lengths.len() as f64;
    let variance = lengths
        .iter()
        .map(|&l| {
            let d = l as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / lengths.len() as f64;
    Some(PathStats {
        min,
        max,
        mean,
        stddev: variance.sqrt(),
    })
}
