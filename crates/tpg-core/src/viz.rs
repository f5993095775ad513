//! DOT rendering of the team graph.
//!
//! Teams become nodes labeled with their program IDs and actions; root teams
//! are drawn with a double outline. Each action map entry becomes a directed
//! edge labeled with the program that triggers the transition. The output is
//! plain GraphViz and deterministic (teams and edges in ID order).

use std::fmt::Write as _;

use crate::backend::ProgramBackend;
use crate::graph::TangledProgramGraph;

impl<B: ProgramBackend> TangledProgramGraph<B> {
    /// Renders the graph as a GraphViz `digraph`.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph tpg {\n");
        out.push_str("    node [shape=box];\n");

        for tid in self.sorted_team_ids() {
            let team = match self.team(tid) {
                Some(t) => t,
                None => continue,
            };
            let mut label = tid.to_string();
            for &pid in team.programs() {
                let action = self
                    .program(pid)
                    .and_then(|p| p.action().map(|a| a.to_string()))
                    .unwrap_or_else(|| "-".to_string());
                let _ = write!(label, "\\n{}: {}", pid, action);
            }
            let style = if self.is_root(tid) {
                ", peripheries=2"
            } else {
                ""
            };
            let _ = writeln!(out, "    \"{}\" [label=\"{}\"{}];", tid, label, style);
        }

        for tid in self.sorted_team_ids() {
            let team = match self.team(tid) {
                Some(t) => t,
                None => continue,
            };
            for (&pid, &dest) in team.action_map() {
                let _ = writeln!(out, "    \"{}\" -> \"{}\" [label=\"{}\"];", tid, dest, pid);
            }
        }

        out.push_str("}\n");
        out
    }
}
