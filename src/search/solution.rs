//! Solutions
//!
//! Raw mappings become [`Solution`] records. Two solutions are similar when
//! they bind the same set of system nodes, which is the deduplication key.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

use crate::graph::{Feedback, NodeId, RelationId};

/// One mapping of system entities onto a pattern
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    pub pattern_name: String,
    pub pattern_family: String,
    /// (system node, pattern node) pairs
    pub nodes: Vec<(NodeId, NodeId)>,
    /// (system relation, pattern relation) pairs
    pub relations: Vec<(RelationId, RelationId)>,
}

impl Solution {
    /// Bound system nodes as an unordered set
    pub fn system_nodes(&self) -> BTreeSet<&str> {
        self.nodes.iter().map(|(system, _)| system.as_str()).collect()
    }

    pub fn system_relations(&self) -> BTreeSet<&str> {
        self.relations.iter().map(|(system, _)| system.as_str()).collect()
    }

    pub fn is_similar(&self, other: &Solution) -> bool {
        self.system_nodes() == other.system_nodes()
    }

    /// System nodes bound to a pattern role
    pub fn nodes_for_role(&self, pattern_node: &str) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|(_, role)| role == pattern_node)
            .map(|(system, _)| system.as_str())
            .collect()
    }

    /// Pattern role a system node is bound to
    pub fn role_of(&self, system_node: &str) -> Option<&str> {
        self.nodes
            .iter()
            .find(|(system, _)| system == system_node)
            .map(|(_, role)| role.as_str())
    }
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({})", self.pattern_name, self.pattern_family)?;
        for (system, role) in &self.nodes {
            writeln!(f, "  {} -> {}", system, role)?;
        }
        for (system, role) in &self.relations {
            writeln!(f, "  {} => {}", system, role)?;
        }
        Ok(())
    }
}

/// Keep the first solution of every distinct bound system-node set
pub fn deduplicate(solutions: &[Solution]) -> Vec<Solution> {
    let mut seen: HashSet<BTreeSet<&str>> = HashSet::new();
    let mut unique = Vec::new();
    for solution in solutions {
        if seen.insert(solution.system_nodes()) {
            unique.push(solution.clone());
        }
    }
    unique
}

/// Solutions of one search together with the consolidated feedback
#[derive(Debug, Clone, Serialize)]
pub struct MatchingResult {
    pub solutions: Vec<Solution>,
    pub feedback: Feedback,
}

impl MatchingResult {
    pub fn len(&self) -> usize {
        self.solutions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.solutions.is_empty()
    }
}
