//! The tangled program graph container.
//!
//! [`TangledProgramGraph`] owns every program and team in central ID-keyed
//! tables and is the only place identifiers are minted. All references
//! between entities are IDs resolved through the tables, and the four edge
//! sets (team in/out, program in/out) are derived state kept coherent with
//! each team's `action_map` by a single chokepoint,
//! [`set_team_action`](TangledProgramGraph::set_team_action). Nothing else
//! writes to an action map or an action-derived edge set.
//!
//! Membership (a program belonging to a team) is maintained by the
//! add/remove/replace member operations, which keep `Team::programs` and
//! `Program::in_edges` in lockstep.
//!
//! All operations validate before mutating: a failed precondition leaves the
//! graph untouched.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::warn;

use crate::action::Action;
use crate::backend::ProgramBackend;
use crate::error::GraphError;
use crate::id::{ProgramId, TeamId};
use crate::program::Program;
use crate::team::Team;

/// The top-level graph: programs, teams, root set, ID counters, and the
/// action alphabet.
pub struct TangledProgramGraph<B: ProgramBackend> {
    programs: HashMap<ProgramId, Program<B>>,
    teams: HashMap<TeamId, Team>,
    root_teams: BTreeSet<TeamId>,
    actions: Vec<Action>,
    next_program_id: u64,
    next_team_id: u64,
}

impl<B: ProgramBackend> TangledProgramGraph<B> {
    /// Creates an empty graph over the given action alphabet.
    pub fn new(actions: Vec<Action>) -> Self {
        TangledProgramGraph {
            programs: HashMap::new(),
            teams: HashMap::new(),
            root_teams: BTreeSet::new(),
            actions,
            next_program_id: 1,
            next_team_id: 1,
        }
    }

    // -----------------------------------------------------------------------
    // Read-only accessors
    // -----------------------------------------------------------------------

    /// Looks up a program by ID.
    pub fn program(&self, id: ProgramId) -> Option<&Program<B>> {
        self.programs.get(&id)
    }

    /// Looks up a program by ID (mutable, e.g. for lazy decoding).
    pub fn program_mut(&mut self, id: ProgramId) -> Option<&mut Program<B>> {
        self.programs.get_mut(&id)
    }

    /// Looks up a team by ID.
    pub fn team(&self, id: TeamId) -> Option<&Team> {
        self.teams.get(&id)
    }

    /// Returns the full program table.
    pub fn programs(&self) -> &HashMap<ProgramId, Program<B>> {
        &self.programs
    }

    /// Returns the full team table.
    pub fn teams(&self) -> &HashMap<TeamId, Team> {
        &self.teams
    }

    /// All program IDs in ascending order.
    pub fn sorted_program_ids(&self) -> Vec<ProgramId> {
        let mut ids: Vec<ProgramId> = self.programs.keys().copied().collect();
        ids.sort();
        ids
    }

    /// All team IDs in ascending order.
    pub fn sorted_team_ids(&self) -> Vec<TeamId> {
        let mut ids: Vec<TeamId> = self.teams.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Number of programs in the graph.
    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    /// Number of teams in the graph.
    pub fn team_count(&self) -> usize {
        self.teams.len()
    }

    /// Number of root teams.
    pub fn root_count(&self) -> usize {
        self.root_teams.len()
    }

    /// The designated evaluation entry points.
    pub fn root_teams(&self) -> &BTreeSet<TeamId> {
        &self.root_teams
    }

    /// Whether the team is currently a root.
    pub fn is_root(&self, id: TeamId) -> bool {
        self.root_teams.contains(&id)
    }

    /// The action alphabet.
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    // -----------------------------------------------------------------------
    // Action alphabet and root management
    // -----------------------------------------------------------------------

    /// Replaces the action alphabet.
    ///
    /// Programs whose assigned action falls outside the new set keep it; a
    /// warning reports how many are affected.
    pub fn update_actions(&mut self, actions: Vec<Action>) {
        let stale = self
            .programs
            .values()
            .filter(|p| p.action.as_ref().map_or(false, |a| !actions.contains(a)))
            .count();
        if stale > 0 {
            warn!(
                stale,
                "updating action set leaves programs holding actions outside the new set"
            );
        }
        self.actions = actions;
    }

    /// Declares an existing team a root.
    pub fn add_root(&mut self, id: TeamId) -> Result<(), GraphError> {
        if !self.teams.contains_key(&id) {
            return Err(GraphError::TeamNotFound { id });
        }
        self.root_teams.insert(id);
        Ok(())
    }

    /// Demotes a team from root status. Does not delete the team; garbage
    /// collection does, if it becomes unreachable. Returns whether the team
    /// was a root.
    pub fn remove_root(&mut self, id: TeamId) -> bool {
        self.root_teams.remove(&id)
    }

    // -----------------------------------------------------------------------
    // Program lifecycle
    // -----------------------------------------------------------------------

    /// Registers a new program with the given genome.
    ///
    /// If `action` is given it must be a member of the action alphabet. If it
    /// is `None` and the alphabet is non-empty, one is drawn uniformly at
    /// random; an empty alphabet yields a program with no action.
    pub fn add_program(
        &mut self,
        genome: B::Genome,
        action: Option<Action>,
        rng: &mut ChaCha8Rng,
    ) -> Result<ProgramId, GraphError> {
        let action = match action {
            Some(a) => {
                if !self.actions.contains(&a) {
                    return Err(GraphError::ActionNotInSet { action: a });
                }
                Some(a)
            }
            None if !self.actions.is_empty() => {
                Some(self.actions[rng.gen_range(0..self.actions.len())].clone())
            }
            None => None,
        };

        let id = self.mint_program_id();
        self.programs.insert(id, Program::new(id, genome, action));
        Ok(id)
    }

    /// Registers a program with a fresh random genome from the backend.
    pub fn add_random_program(
        &mut self,
        backend: &B,
        action: Option<Action>,
        rng: &mut ChaCha8Rng,
    ) -> Result<ProgramId, GraphError> {
        let genome = backend.make_random_genome(rng);
        self.add_program(genome, action, rng)
    }

    /// Deep-copies a program: fresh ID, copied genome, same action, empty
    /// edge sets. The decoded executable is not copied; the clone re-derives
    /// it on first evaluation.
    pub fn copy_program(&mut self, id: ProgramId, backend: &B) -> Result<ProgramId, GraphError> {
        let source = self
            .programs
            .get(&id)
            .ok_or(GraphError::ProgramNotFound { id })?;
        let genome = backend.deep_copy(&source.genome);
        let action = source.action.clone();

        let new_id = self.mint_program_id();
        self.programs
            .insert(new_id, Program::new(new_id, genome, action));
        Ok(new_id)
    }

    /// Reassigns a program's action. `Some` values must belong to the action
    /// alphabet.
    pub fn set_program_action(
        &mut self,
        id: ProgramId,
        action: Option<Action>,
    ) -> Result<(), GraphError> {
        if !self.programs.contains_key(&id) {
            return Err(GraphError::ProgramNotFound { id });
        }
        if let Some(a) = &action {
            if !self.actions.contains(a) {
                return Err(GraphError::ActionNotInSet { action: a.clone() });
            }
        }
        self.program_entry_mut(id)?.action = action;
        Ok(())
    }

    /// Mutates a program's genome through the backend and drops its cached
    /// executable.
    pub fn mutate_genome(
        &mut self,
        id: ProgramId,
        backend: &B,
        rng: &mut ChaCha8Rng,
    ) -> Result<(), GraphError> {
        let program = self.program_entry_mut(id)?;
        backend.mutate(&mut program.genome, rng);
        program.invalidate_decoded();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Team lifecycle
    // -----------------------------------------------------------------------

    /// Constructs a team from existing programs and an optional action map.
    ///
    /// Duplicate program IDs are rejected. Every action map key must appear
    /// in `program_ids` and every destination must exist. The map is applied
    /// through the edge primitive so all edge sets are consistent from the
    /// moment of creation.
    pub fn add_team(
        &mut self,
        program_ids: &[ProgramId],
        action_map: Option<&BTreeMap<ProgramId, TeamId>>,
    ) -> Result<TeamId, GraphError> {
        let mut seen = BTreeSet::new();
        for &pid in program_ids {
            if !self.programs.contains_key(&pid) {
                return Err(GraphError::ProgramNotFound { id: pid });
            }
            if !seen.insert(pid) {
                return Err(GraphError::DuplicateProgram { id: pid });
            }
        }
        if let Some(map) = action_map {
            for (&pid, &dest) in map {
                if !seen.contains(&pid) {
                    return Err(GraphError::MapKeyNotMember { program: pid });
                }
                if !self.teams.contains_key(&dest) {
                    return Err(GraphError::TeamNotFound { id: dest });
                }
            }
        }

        let id = self.mint_team_id();
        let mut team = Team::new(id);
        team.programs = program_ids.to_vec();
        self.teams.insert(id, team);

        for &pid in program_ids {
            self.program_entry_mut(pid)?.in_edges.insert(id);
        }
        if let Some(map) = action_map {
            for (&pid, &dest) in map {
                self.set_team_action(id, pid, Some(dest))?;
            }
        }
        Ok(id)
    }

    /// Clones a team: new ID, same program references, copied action map.
    ///
    /// Edge bookkeeping is re-applied through [`add_team`](Self::add_team),
    /// so the clone's edges and the member programs' edge sets are updated
    /// while the original team is untouched.
    pub fn copy_team(&mut self, id: TeamId) -> Result<TeamId, GraphError> {
        let source = self.teams.get(&id).ok_or(GraphError::TeamNotFound { id })?;
        let programs = source.programs.clone();
        let action_map = source.action_map.clone();
        self.add_team(&programs, Some(&action_map))
    }

    /// Removes a team from the graph.
    ///
    /// Refused (with a warning) if other teams still route into it, unless
    /// `force` is set. Clears back-references in destination teams, removes
    /// every member program, and drops root status.
    pub fn remove_team(&mut self, id: TeamId, force: bool) -> Result<(), GraphError> {
        let team = self.teams.get(&id).ok_or(GraphError::TeamNotFound { id })?;
        let incoming = team.in_edges.len();
        if incoming > 0 && !force {
            warn!(team = %id, incoming, "refusing to remove team with incoming edges");
            return Err(GraphError::TeamHasInEdges { id, count: incoming });
        }

        let out: Vec<TeamId> = team.out_edges.iter().copied().collect();
        for dest in out {
            if let Some(dest_team) = self.teams.get_mut(&dest) {
                dest_team.in_edges.remove(&id);
            }
        }

        let members: Vec<ProgramId> = self
            .teams
            .get(&id)
            .map(|t| t.programs.clone())
            .unwrap_or_default();
        for program in members {
            self.remove_program_from_team(id, program)?;
        }

        self.root_teams.remove(&id);
        self.teams.remove(&id);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Team membership
    // -----------------------------------------------------------------------

    /// Adds an existing program to a team with no action map entry.
    pub fn add_program_to_team(
        &mut self,
        team_id: TeamId,
        program_id: ProgramId,
    ) -> Result<(), GraphError> {
        if !self.programs.contains_key(&program_id) {
            return Err(GraphError::ProgramNotFound { id: program_id });
        }
        let team = self
            .teams
            .get(&team_id)
            .ok_or(GraphError::TeamNotFound { id: team_id })?;
        if team.contains(program_id) {
            return Err(GraphError::ProgramAlreadyInTeam {
                team: team_id,
                program: program_id,
            });
        }

        self.team_entry_mut(team_id)?.programs.push(program_id);
        self.program_entry_mut(program_id)?.in_edges.insert(team_id);
        Ok(())
    }

    /// Drops a program from a team, clearing any action map entry first.
    ///
    /// The program record itself survives; garbage collection deletes it
    /// once no team owns it and it is unreachable.
    pub fn remove_program_from_team(
        &mut self,
        team_id: TeamId,
        program_id: ProgramId,
    ) -> Result<(), GraphError> {
        // Validates team existence and membership, and unwinds the mapping's
        // edges if one exists.
        self.set_team_action(team_id, program_id, None)?;

        self.team_entry_mut(team_id)?
            .programs
            .retain(|&p| p != program_id);
        self.program_entry_mut(program_id)?
            .in_edges
            .remove(&team_id);
        Ok(())
    }

    /// Swaps `old` for `new` in a team, preserving the member slot and any
    /// action map entry (the mapping and its edges move to `new`).
    pub fn replace_program_in_team(
        &mut self,
        team_id: TeamId,
        old: ProgramId,
        new: ProgramId,
    ) -> Result<(), GraphError> {
        if !self.programs.contains_key(&new) {
            return Err(GraphError::ProgramNotFound { id: new });
        }
        let team = self
            .teams
            .get(&team_id)
            .ok_or(GraphError::TeamNotFound { id: team_id })?;
        if !team.contains(old) {
            return Err(GraphError::ProgramNotInTeam {
                team: team_id,
                program: old,
            });
        }
        if team.contains(new) {
            return Err(GraphError::ProgramAlreadyInTeam {
                team: team_id,
                program: new,
            });
        }
        let dest = team.destination_of(old);

        self.set_team_action(team_id, old, None)?;
        {
            let team = self.team_entry_mut(team_id)?;
            if let Some(slot) = team.programs.iter_mut().find(|p| **p == old) {
                *slot = new;
            }
        }
        self.program_entry_mut(old)?.in_edges.remove(&team_id);
        self.program_entry_mut(new)?.in_edges.insert(team_id);

        if let Some(d) = dest {
            self.set_team_action(team_id, new, Some(d))?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Edge primitive
    // -----------------------------------------------------------------------

    /// Sets or clears a team's action map entry for a program.
    ///
    /// This is the only routine that writes to `action_map`, `out_edges`, or
    /// the action-derived `in_edges`; every edge change in the graph flows
    /// through it. `dest = None` removes the mapping. Setting the current
    /// value is a no-op. A team may not route to itself.
    pub fn set_team_action(
        &mut self,
        team_id: TeamId,
        program_id: ProgramId,
        dest: Option<TeamId>,
    ) -> Result<(), GraphError> {
        let team = self
            .teams
            .get(&team_id)
            .ok_or(GraphError::TeamNotFound { id: team_id })?;
        if !team.contains(program_id) {
            return Err(GraphError::ProgramNotInTeam {
                team: team_id,
                program: program_id,
            });
        }
        if !self.programs.contains_key(&program_id) {
            return Err(GraphError::ProgramNotFound { id: program_id });
        }
        if let Some(d) = dest {
            if d == team_id {
                return Err(GraphError::SelfLoop { team: team_id });
            }
            if !self.teams.contains_key(&d) {
                return Err(GraphError::TeamNotFound { id: d });
            }
        }

        let old = team.destination_of(program_id);
        if old == dest {
            return Ok(());
        }

        // The action map is the source of truth; update it first.
        {
            let team = self.team_entry_mut(team_id)?;
            match dest {
                Some(d) => {
                    team.action_map.insert(program_id, d);
                }
                None => {
                    team.action_map.remove(&program_id);
                }
            }
        }

        // Retire edges to the old destination that nothing references now.
        if let Some(old_dest) = old {
            let still_mapped = self
                .teams
                .get(&team_id)
                .map_or(false, |t| t.action_map.values().any(|&v| v == old_dest));
            if !still_mapped {
                self.team_entry_mut(team_id)?.out_edges.remove(&old_dest);
                if let Some(dest_team) = self.teams.get_mut(&old_dest) {
                    dest_team.in_edges.remove(&team_id);
                }
            }

            let owners: Vec<TeamId> = self
                .programs
                .get(&program_id)
                .map(|p| p.in_edges.iter().copied().collect())
                .unwrap_or_default();
            let still_routed = owners.iter().any(|t| {
                self.teams.get(t).and_then(|tm| tm.destination_of(program_id)) == Some(old_dest)
            });
            if !still_routed {
                self.program_entry_mut(program_id)?
                    .out_edges
                    .remove(&old_dest);
            }
        }

        // Wire the new destination.
        if let Some(d) = dest {
            self.team_entry_mut(team_id)?.out_edges.insert(d);
            self.team_entry_mut(d)?.in_edges.insert(team_id);
            self.program_entry_mut(program_id)?.out_edges.insert(d);
        }

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    fn mint_program_id(&mut self) -> ProgramId {
        let id = ProgramId(self.next_program_id);
        self.next_program_id += 1;
        id
    }

    fn mint_team_id(&mut self) -> TeamId {
        let id = TeamId(self.next_team_id);
        self.next_team_id += 1;
        id
    }

    fn team_entry_mut(&mut self, id: TeamId) -> Result<&mut Team, GraphError> {
        self.teams.get_mut(&id).ok_or(GraphError::TeamNotFound { id })
    }

    fn program_entry_mut(&mut self, id: ProgramId) -> Result<&mut Program<B>, GraphError> {
        self.programs
            .get_mut(&id)
            .ok_or(GraphError::ProgramNotFound { id })
    }

    /// Deletes a program record outright. Internal: only orphan cleanup may
    /// delete programs, and only when no team owns them.
    pub(crate) fn delete_program(&mut self, id: ProgramId) -> Option<Program<B>> {
        self.programs.remove(&id)
    }
}

impl<B: ProgramBackend> fmt::Debug for TangledProgramGraph<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TangledProgramGraph")
            .field("programs", &self.programs.len())
            .field("teams", &self.teams.len())
            .field("roots", &self.root_teams)
            .field("actions", &self.actions)
            .field("next_program_id", &self.next_program_id)
            .field("next_team_id", &self.next_team_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    /// Minimal backend for structural tests: the genome is a bare integer
    /// and the bid is its value.
    struct StubBackend;

    impl ProgramBackend for StubBackend {
        type Genome = i64;
        type Executable = i64;
        type Input = [f64];

        fn make_random_genome(&self, rng: &mut ChaCha8Rng) -> i64 {
            rng.gen_range(0..100)
        }

        fn decode(&self, genome: &i64) -> i64 {
            *genome
        }

        fn evaluate(&self, executable: &mut i64, _input: &[f64]) -> f64 {
            *executable as f64
        }

        fn mutate(&self, genome: &mut i64, rng: &mut ChaCha8Rng) {
            *genome = rng.gen_range(0..100);
        }

        fn reset(&self, _executable: &mut i64) {}

        fn hash_input(&self, input: &[f64]) -> u64 {
            input.iter().fold(0u64, |acc, v| {
                acc.wrapping_mul(31).wrapping_add(v.to_bits())
            })
        }
    }

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(7)
    }

    fn graph() -> TangledProgramGraph<StubBackend> {
        TangledProgramGraph::new(vec![Action::Int(1), Action::Int(2)])
    }

    #[test]
    fn ids_are_minted_from_one_and_never_reused() {
        let mut g = graph();
        let mut r = rng();
        let p1 = g.add_program(10, None, &mut r).unwrap();
        let p2 = g.add_program(20, None, &mut r).unwrap();
        assert_eq!(p1, ProgramId(1));
        assert_eq!(p2, ProgramId(2));

        let t1 = g.add_team(&[p1], None).unwrap();
        assert_eq!(t1, TeamId(1));
        g.remove_team(t1, false).unwrap();

        let t2 = g.add_team(&[p2], None).unwrap();
        assert_eq!(t2, TeamId(2));
    }

    #[test]
    fn add_program_rejects_action_outside_alphabet() {
        let mut g = graph();
        let mut r = rng();
        let result = g.add_program(1, Some(Action::Int(99)), &mut r);
        assert!(matches!(result, Err(GraphError::ActionNotInSet { .. })));
        assert_eq!(g.program_count(), 0);
    }

    #[test]
    fn add_program_draws_random_action_from_alphabet() {
        let mut g = graph();
        let mut r = rng();
        let p = g.add_program(1, None, &mut r).unwrap();
        let action = g.program(p).unwrap().action().unwrap().clone();
        assert!(g.actions().contains(&action));
    }

    #[test]
    fn add_program_without_alphabet_has_no_action() {
        let mut g: TangledProgramGraph<StubBackend> = TangledProgramGraph::new(Vec::new());
        let mut r = rng();
        let p = g.add_program(1, None, &mut r).unwrap();
        assert!(g.program(p).unwrap().action().is_none());
    }

    #[test]
    fn add_team_rejects_duplicates() {
        let mut g = graph();
        let mut r = rng();
        let p = g.add_program(1, None, &mut r).unwrap();
        let result = g.add_team(&[p, p], None);
        assert!(matches!(result, Err(GraphError::DuplicateProgram { .. })));
        assert_eq!(g.team_count(), 0);
    }

    #[test]
    fn add_team_links_member_in_edges() {
        let mut g = graph();
        let mut r = rng();
        let p1 = g.add_program(1, None, &mut r).unwrap();
        let p2 = g.add_program(2, None, &mut r).unwrap();
        let t = g.add_team(&[p1, p2], None).unwrap();

        assert_eq!(g.team(t).unwrap().programs(), &[p1, p2]);
        assert!(g.program(p1).unwrap().in_edges().contains(&t));
        assert!(g.program(p2).unwrap().in_edges().contains(&t));
    }

    #[test]
    fn add_team_applies_action_map_through_primitive() {
        let mut g = graph();
        let mut r = rng();
        let p = g.add_program(1, None, &mut r).unwrap();
        let leaf = g.add_team(&[p], None).unwrap();

        let mut map = BTreeMap::new();
        map.insert(p, leaf);
        let root = g.add_team(&[p], Some(&map)).unwrap();

        assert_eq!(g.team(root).unwrap().destination_of(p), Some(leaf));
        assert!(g.team(root).unwrap().out_edges().contains(&leaf));
        assert!(g.team(leaf).unwrap().in_edges().contains(&root));
        assert!(g.program(p).unwrap().out_edges().contains(&leaf));
    }

    #[test]
    fn set_team_action_rejects_self_loop() {
        let mut g = graph();
        let mut r = rng();
        let p = g.add_program(1, None, &mut r).unwrap();
        let t = g.add_team(&[p], None).unwrap();
        let result = g.set_team_action(t, p, Some(t));
        assert!(matches!(result, Err(GraphError::SelfLoop { .. })));
        assert!(g.team(t).unwrap().action_map().is_empty());
    }

    #[test]
    fn set_team_action_rejects_nonmember_program() {
        let mut g = graph();
        let mut r = rng();
        let p1 = g.add_program(1, None, &mut r).unwrap();
        let p2 = g.add_program(2, None, &mut r).unwrap();
        let t = g.add_team(&[p1], None).unwrap();
        let dest = g.add_team(&[p2], None).unwrap();
        let result = g.set_team_action(t, p2, Some(dest));
        assert!(matches!(result, Err(GraphError::ProgramNotInTeam { .. })));
    }

    #[test]
    fn set_team_action_same_value_is_noop() {
        let mut g = graph();
        let mut r = rng();
        let p = g.add_program(1, None, &mut r).unwrap();
        let dest = g.add_team(&[p], None).unwrap();
        let t = g.add_team(&[p], None).unwrap();

        g.set_team_action(t, p, Some(dest)).unwrap();
        let before = g.team(t).unwrap().clone();
        g.set_team_action(t, p, Some(dest)).unwrap();
        assert_eq!(g.team(t).unwrap(), &before);
    }

    #[test]
    fn redirect_retires_old_destination_edges() {
        let mut g = graph();
        let mut r = rng();
        let p = g.add_program(1, None, &mut r).unwrap();
        let d1 = g.add_team(&[p], None).unwrap();
        let d2 = g.add_team(&[p], None).unwrap();
        let t = g.add_team(&[p], None).unwrap();

        g.set_team_action(t, p, Some(d1)).unwrap();
        g.set_team_action(t, p, Some(d2)).unwrap();

        assert!(!g.team(t).unwrap().out_edges().contains(&d1));
        assert!(g.team(t).unwrap().out_edges().contains(&d2));
        assert!(!g.team(d1).unwrap().in_edges().contains(&t));
        assert!(g.team(d2).unwrap().in_edges().contains(&t));
        assert!(!g.program(p).unwrap().out_edges().contains(&d1));
        assert!(g.program(p).unwrap().out_edges().contains(&d2));
    }

    #[test]
    fn shared_destination_edge_survives_partial_clear() {
        // Two programs in one team both map to the same destination; clearing
        // one mapping must keep the team-level edge alive.
        let mut g = graph();
        let mut r = rng();
        let p1 = g.add_program(1, None, &mut r).unwrap();
        let p2 = g.add_program(2, None, &mut r).unwrap();
        let dest = g.add_team(&[p1], None).unwrap();
        let t = g.add_team(&[p1, p2], None).unwrap();

        g.set_team_action(t, p1, Some(dest)).unwrap();
        g.set_team_action(t, p2, Some(dest)).unwrap();
        g.set_team_action(t, p1, None).unwrap();

        assert!(g.team(t).unwrap().out_edges().contains(&dest));
        assert!(g.team(dest).unwrap().in_edges().contains(&t));
        // p1 no longer routes anywhere, p2 still does.
        assert!(!g.program(p1).unwrap().out_edges().contains(&dest));
        assert!(g.program(p2).unwrap().out_edges().contains(&dest));
    }

    #[test]
    fn program_out_edge_survives_across_owning_teams() {
        // The same program maps to the same destination from two different
        // teams; clearing one mapping keeps the program-level edge.
        let mut g = graph();
        let mut r = rng();
        let p = g.add_program(1, None, &mut r).unwrap();
        let dest = g.add_team(&[p], None).unwrap();
        let t1 = g.add_team(&[p], None).unwrap();
        let t2 = g.add_team(&[p], None).unwrap();

        g.set_team_action(t1, p, Some(dest)).unwrap();
        g.set_team_action(t2, p, Some(dest)).unwrap();
        g.set_team_action(t1, p, None).unwrap();

        assert!(g.program(p).unwrap().out_edges().contains(&dest));
        g.set_team_action(t2, p, None).unwrap();
        assert!(!g.program(p).unwrap().out_edges().contains(&dest));
    }

    #[test]
    fn remove_program_from_team_clears_mapping_and_membership() {
        let mut g = graph();
        let mut r = rng();
        let p1 = g.add_program(1, None, &mut r).unwrap();
        let p2 = g.add_program(2, None, &mut r).unwrap();
        let dest = g.add_team(&[p2], None).unwrap();
        let t = g.add_team(&[p1, p2], None).unwrap();
        g.set_team_action(t, p1, Some(dest)).unwrap();

        g.remove_program_from_team(t, p1).unwrap();

        assert!(!g.team(t).unwrap().contains(p1));
        assert!(g.team(t).unwrap().action_map().is_empty());
        assert!(!g.program(p1).unwrap().in_edges().contains(&t));
        assert!(!g.team(dest).unwrap().in_edges().contains(&t));
        // The program record itself survives for GC to collect.
        assert!(g.program(p1).is_some());
    }

    #[test]
    fn remove_team_refuses_with_incoming_edges() {
        let mut g = graph();
        let mut r = rng();
        let p = g.add_program(1, None, &mut r).unwrap();
        let dest = g.add_team(&[p], None).unwrap();
        let t = g.add_team(&[p], None).unwrap();
        g.set_team_action(t, p, Some(dest)).unwrap();

        let result = g.remove_team(dest, false);
        assert!(matches!(result, Err(GraphError::TeamHasInEdges { .. })));
        assert!(g.team(dest).is_some());

        g.remove_team(dest, true).unwrap();
        assert!(g.team(dest).is_none());
    }

    #[test]
    fn remove_team_unlinks_destinations_and_members() {
        let mut g = graph();
        let mut r = rng();
        let p = g.add_program(1, None, &mut r).unwrap();
        let dest = g.add_team(&[p], None).unwrap();
        let t = g.add_team(&[p], None).unwrap();
        g.set_team_action(t, p, Some(dest)).unwrap();
        g.add_root(t).unwrap();

        g.remove_team(t, false).unwrap();

        assert!(g.team(t).is_none());
        assert!(!g.team(dest).unwrap().in_edges().contains(&t));
        assert!(!g.program(p).unwrap().in_edges().contains(&t));
        assert!(!g.program(p).unwrap().out_edges().contains(&dest));
        assert!(!g.is_root(t));
    }

    #[test]
    fn copy_team_leaves_parent_untouched() {
        let mut g = graph();
        let mut r = rng();
        let p1 = g.add_program(1, None, &mut r).unwrap();
        let p2 = g.add_program(2, None, &mut r).unwrap();
        let leaf = g.add_team(&[p2], None).unwrap();
        let mut map = BTreeMap::new();
        map.insert(p1, leaf);
        let parent = g.add_team(&[p1, p2], Some(&map)).unwrap();

        let snapshot = g.team(parent).unwrap().clone();
        let clone = g.copy_team(parent).unwrap();

        assert_eq!(g.team(parent).unwrap(), &snapshot);
        let clone_team = g.team(clone).unwrap();
        assert_eq!(clone_team.programs(), snapshot.programs());
        assert_eq!(clone_team.action_map(), snapshot.action_map());
        assert!(g.team(leaf).unwrap().in_edges().contains(&parent));
        assert!(g.team(leaf).unwrap().in_edges().contains(&clone));
        assert!(g.program(p1).unwrap().in_edges().contains(&clone));
    }

    #[test]
    fn copy_program_gets_fresh_id_and_empty_edges() {
        let mut g = graph();
        let mut r = rng();
        let p = g
            .add_program(42, Some(Action::Int(1)), &mut r)
            .unwrap();
        let t = g.add_team(&[p], None).unwrap();

        let copy = g.copy_program(p, &StubBackend).unwrap();
        assert_ne!(copy, p);
        let copied = g.program(copy).unwrap();
        assert_eq!(copied.genome(), &42);
        assert_eq!(copied.action(), Some(&Action::Int(1)));
        assert!(copied.in_edges().is_empty());
        assert!(copied.out_edges().is_empty());
        assert!(!copied.is_decoded());
        assert!(g.program(p).unwrap().in_edges().contains(&t));
    }

    #[test]
    fn replace_program_preserves_slot_and_mapping() {
        let mut g = graph();
        let mut r = rng();
        let p1 = g.add_program(1, None, &mut r).unwrap();
        let p2 = g.add_program(2, None, &mut r).unwrap();
        let dest = g.add_team(&[p2], None).unwrap();
        let t = g.add_team(&[p1, p2], None).unwrap();
        g.set_team_action(t, p1, Some(dest)).unwrap();

        let fresh = g.copy_program(p1, &StubBackend).unwrap();
        g.replace_program_in_team(t, p1, fresh).unwrap();

        assert_eq!(g.team(t).unwrap().programs(), &[fresh, p2]);
        assert_eq!(g.team(t).unwrap().destination_of(fresh), Some(dest));
        assert_eq!(g.team(t).unwrap().destination_of(p1), None);
        assert!(!g.program(p1).unwrap().in_edges().contains(&t));
        assert!(g.program(fresh).unwrap().in_edges().contains(&t));
        assert!(g.program(fresh).unwrap().out_edges().contains(&dest));
        assert!(!g.program(p1).unwrap().out_edges().contains(&dest));
    }

    #[test]
    fn mutate_genome_invalidates_decoded() {
        let mut g = graph();
        let mut r = rng();
        let p = g.add_program(5, None, &mut r).unwrap();
        g.program_mut(p).unwrap().ensure_decoded(&StubBackend);
        assert!(g.program(p).unwrap().is_decoded());

        g.mutate_genome(p, &StubBackend, &mut r).unwrap();
        assert!(!g.program(p).unwrap().is_decoded());
    }

    #[test]
    fn root_management() {
        let mut g = graph();
        let mut r = rng();
        let p = g.add_program(1, None, &mut r).unwrap();
        let t = g.add_team(&[p], None).unwrap();

        assert!(matches!(
            g.add_root(TeamId(99)),
            Err(GraphError::TeamNotFound { .. })
        ));
        g.add_root(t).unwrap();
        assert!(g.is_root(t));
        assert!(g.remove_root(t));
        assert!(!g.remove_root(t));
        assert!(g.team(t).is_some());
    }

    #[test]
    fn update_actions_keeps_stale_assignments() {
        let mut g = graph();
        let mut r = rng();
        let p = g.add_program(1, Some(Action::Int(2)), &mut r).unwrap();
        g.update_actions(vec![Action::Int(3)]);
        assert_eq!(g.program(p).unwrap().action(), Some(&Action::Int(2)));
        assert_eq!(g.actions(), &[Action::Int(3)]);
    }
}
