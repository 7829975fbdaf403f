//! Graph Loading
//!
//! Reads system and pattern graph definitions from JSON files. Pattern
//! directories are walked recursively and loaded in path order so results are
//! stable across platforms.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::{derive_relations, Node, PatternGraph, Relation, SystemGraph};
use crate::compare::RuleSpec;
use crate::error::Result;

/// On-disk form of a system graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemDefinition {
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub relations: Vec<Relation>,
    /// Run the derived-relations pass after building
    #[serde(default)]
    pub derive: bool,
}

impl SystemDefinition {
    pub fn into_graph(self) -> Result<SystemGraph> {
        let mut system = SystemGraph::new(self.name);
        for node in self.nodes {
            system.add_node(node)?;
        }
        for relation in self.relations {
            system.add_relation(relation)?;
        }
        if self.derive {
            derive_relations(system.graph_mut())?;
        }
        Ok(system)
    }
}

/// On-disk form of a pattern template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternDefinition {
    pub name: String,
    #[serde(default)]
    pub family: String,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub relations: Vec<Relation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    /// Rules appended to the default comparator chains
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<RuleSpec>,
}

impl PatternDefinition {
    /// Build the template with default chains, then the definition's own
    /// rules, then `extra_rules`
    pub fn into_pattern(self, extra_rules: &[RuleSpec]) -> Result<PatternGraph> {
        let mut pattern = PatternGraph::new(self.name, self.family);
        for node in self.nodes {
            pattern.add_node(node)?;
        }
        for relation in self.relations {
            pattern.add_relation(relation)?;
        }
        for rule in self.rules.iter().chain(extra_rules) {
            pattern.add_rule(rule)?;
        }
        for note in self.notes {
            pattern.add_note(note);
        }
        if pattern.graph().relation_count() == 0 {
            warn!(pattern = %pattern.name, "pattern has no relations");
        }
        Ok(pattern)
    }
}

/// Load a system graph from a JSON file
pub fn load_system(path: &Path) -> Result<SystemGraph> {
    let content = fs::read_to_string(path)?;
    let definition: SystemDefinition = serde_json::from_str(&content)?;
    debug!(path = %path.display(), nodes = definition.nodes.len(), "loaded system definition");
    definition.into_graph()
}

/// Load one pattern template from a JSON file
pub fn load_pattern(path: &Path, extra_rules: &[RuleSpec]) -> Result<PatternGraph> {
    let content = fs::read_to_string(path)?;
    let definition: PatternDefinition = serde_json::from_str(&content)?;
    debug!(path = %path.display(), pattern = %definition.name, "loaded pattern definition");
    definition.into_pattern(extra_rules)
}

/// Load a single pattern file, or every pattern under a directory
pub fn load_patterns(path: &Path, extra_rules: &[RuleSpec]) -> Result<Vec<PatternGraph>> {
    if path.is_dir() {
        load_patterns_from_directory(path, extra_rules)
    } else {
        Ok(vec![load_pattern(path, extra_rules)?])
    }
}

/// Load every `*.json` pattern under `dir`, sorted by path
pub fn load_patterns_from_directory(dir: &Path, extra_rules: &[RuleSpec]) -> Result<Vec<PatternGraph>> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file() && p.extension().map(|ext| ext == "json").unwrap_or(false))
        .collect();
    files.sort();

    files.iter().map(|path| load_pattern(path, extra_rules)).collect()
}
