//! Isomorphism Search
//!
//! Enumerates every mapping of a subgraph of the system graph onto the whole
//! pattern graph. The search is edge-driven depth-first backtracking: each
//! level binds one pattern edge to a system edge whose endpoints agree with the
//! nodes bound so far and which passes the pattern's comparator chains.
//! Multi-child inheritance siblings are only absorbed into a mapping that is
//! already complete, so they never hide nodes from other pattern roles.
//!
//! Nothing bounds depth or time; the pool of unbound pattern edges shrinks by
//! one per level, so the recursion always terminates.

pub mod locks;
pub mod solution;

pub use locks::{EdgeLease, EdgeLocks};
pub use solution::{deduplicate, MatchingResult, Solution};

use petgraph::graph::{EdgeIndex, NodeIndex};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, trace};

use crate::compare::{Comparator, Verdict};
use crate::error::{DetectError, Result};
use crate::graph::{
    EntityRef, Feedback, ModelGraph, PatternGraph, Relation, RelationType, SystemGraph,
};

/// Knobs for one search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    /// `matching_result` returns the deduplicated view when set
    pub deduplicate: bool,
    /// Once a mapping is complete, a multi-child inheritance pattern edge also
    /// takes every other free compatible child edge into the same parent
    pub absorb_inheritance_siblings: bool,
    /// Copy the pattern's free-form notes into the feedback
    pub include_pattern_notes: bool,
    /// Record a MATCH naming the bound role for every entity of a solution
    pub record_bindings: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            deduplicate: true,
            absorb_inheritance_siblings: true,
            include_pattern_notes: true,
            record_bindings: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct SearchOutcome {
    mappings: Vec<Solution>,
    feedback: Feedback,
}

/// Subgraph-isomorphism search of one pattern over one system graph.
///
/// The search runs on first query and its outcome is reused by later queries.
pub struct IsomorphismSearch<'g> {
    system: &'g SystemGraph,
    pattern: &'g PatternGraph,
    options: SearchOptions,
    outcome: Option<SearchOutcome>,
}

impl<'g> IsomorphismSearch<'g> {
    pub fn new(system: &'g SystemGraph, pattern: &'g PatternGraph) -> Self {
        Self::with_options(system, pattern, SearchOptions::default())
    }

    pub fn with_options(system: &'g SystemGraph, pattern: &'g PatternGraph, options: SearchOptions) -> Self {
        Self {
            system,
            pattern,
            options,
            outcome: None,
        }
    }

    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    /// Whether at least one mapping exists
    pub fn isomorphism_exists(&mut self) -> Result<bool> {
        Ok(!self.outcome()?.mappings.is_empty())
    }

    /// The configured view: deduplicated unless `deduplicate` is off
    pub fn matching_result(&mut self) -> Result<MatchingResult> {
        if self.options.deduplicate {
            self.deduplicated()
        } else {
            self.all_mappings()
        }
    }

    /// One solution per distinct bound system-node set
    pub fn deduplicated(&mut self) -> Result<MatchingResult> {
        let outcome = self.outcome()?;
        Ok(MatchingResult {
            solutions: deduplicate(&outcome.mappings),
            feedback: outcome.feedback.clone(),
        })
    }

    /// Every mapping found, including symmetric duplicates
    pub fn all_mappings(&mut self) -> Result<MatchingResult> {
        let outcome = self.outcome()?;
        Ok(MatchingResult {
            solutions: outcome.mappings.clone(),
            feedback: outcome.feedback.clone(),
        })
    }

    fn outcome(&mut self) -> Result<&SearchOutcome> {
        let outcome = match self.outcome.take() {
            Some(outcome) => outcome,
            None => self.run()?,
        };
        Ok(self.outcome.insert(outcome))
    }

    fn run(&self) -> Result<SearchOutcome> {
        let pattern_graph = self.pattern.graph();
        if pattern_graph.node_count() == 0 {
            return Err(DetectError::malformed(&self.pattern.name, "pattern has no nodes"));
        }

        info!(
            pattern = %self.pattern.name,
            system = %self.system.name,
            pattern_edges = pattern_graph.relation_count(),
            system_edges = self.system.graph().relation_count(),
            "starting isomorphism search"
        );

        let mut feedback = Feedback::new();
        feedback.seed_graph(self.system.graph());

        let mut mappings = Vec::new();
        let plan = SearchPlan::new(pattern_graph);
        let mut locks = EdgeLocks::new(self.system.graph().relation_count());

        let mut walk = Walk {
            system: self.system.graph(),
            pattern: self.pattern,
            plan: &plan,
            options: &self.options,
            bindings: Bindings::default(),
            feedback: &mut feedback,
            mappings: &mut mappings,
        };
        walk.extend(0, &mut locks)?;

        if self.options.include_pattern_notes {
            for note in self.pattern.notes() {
                feedback.add_note(note.clone());
            }
        }

        info!(
            pattern = %self.pattern.name,
            mappings = mappings.len(),
            "isomorphism search finished"
        );

        Ok(SearchOutcome { mappings, feedback })
    }
}

/// Run every pattern against one system graph
pub fn detect_all(
    system: &SystemGraph,
    patterns: &[PatternGraph],
    options: SearchOptions,
) -> Result<Vec<(String, MatchingResult)>> {
    patterns
        .iter()
        .map(|pattern| {
            let mut search = IsomorphismSearch::with_options(system, pattern, options);
            Ok((pattern.name.clone(), search.matching_result()?))
        })
        .collect()
}

// =============================================================================
// Search Plan
// =============================================================================

/// Pattern edges in binding order, plus pattern nodes no edge touches
#[derive(Debug, Default)]
struct SearchPlan {
    edges: Vec<EdgeIndex>,
    isolated: Vec<NodeIndex>,
}

impl SearchPlan {
    /// Prefer edges touching an already planned node, so candidates come
    /// from adjacency lists instead of the whole edge set
    fn new(pattern: &ModelGraph) -> Self {
        let mut remaining: Vec<EdgeIndex> = pattern.edge_indices().collect();
        let mut covered: HashSet<NodeIndex> = HashSet::new();
        let mut edges = Vec::with_capacity(remaining.len());

        while !remaining.is_empty() {
            let next = remaining
                .iter()
                .position(|edge| {
                    pattern
                        .endpoints(*edge)
                        .map(|(s, t)| covered.contains(&s) || covered.contains(&t))
                        .unwrap_or(false)
                })
                .unwrap_or(0);
            let edge = remaining.remove(next);
            if let Some((s, t)) = pattern.endpoints(edge) {
                covered.insert(s);
                covered.insert(t);
            }
            edges.push(edge);
        }

        let isolated = pattern.node_indices().filter(|n| !covered.contains(n)).collect();
        Self { edges, isolated }
    }
}

// =============================================================================
// Backtracking
// =============================================================================

#[derive(Debug, Default)]
struct Bindings {
    /// pattern node -> system node
    primary: HashMap<NodeIndex, NodeIndex>,
    /// system node -> pattern node, absorbed siblings included
    owner: HashMap<NodeIndex, NodeIndex>,
    /// extra (system, pattern) images from multi-child inheritance
    siblings: Vec<(NodeIndex, NodeIndex)>,
    /// (pattern edge, system edge)
    edges: Vec<(EdgeIndex, EdgeIndex)>,
}

struct Walk<'w> {
    system: &'w ModelGraph,
    pattern: &'w PatternGraph,
    plan: &'w SearchPlan,
    options: &'w SearchOptions,
    bindings: Bindings,
    feedback: &'w mut Feedback,
    mappings: &'w mut Vec<Solution>,
}

impl<'w> Walk<'w> {
    fn extend(&mut self, depth: usize, locks: &mut EdgeLocks) -> Result<()> {
        let Some(&pattern_edge) = self.plan.edges.get(depth) else {
            return self.extend_isolated(0, locks);
        };
        let pattern: &'w PatternGraph = self.pattern;
        let system: &'w ModelGraph = self.system;

        let (p_src, p_tgt) = pattern
            .graph()
            .endpoints(pattern_edge)
            .ok_or_else(|| DetectError::RelationNotFound(format!("pattern edge {}", pattern_edge.index())))?;

        for candidate in self.candidates(p_src, p_tgt) {
            if locks.is_locked(candidate) {
                continue;
            }
            let Some((s_src, s_tgt)) = system.endpoints(candidate) else {
                continue;
            };
            if !self.structurally_consistent((p_src, p_tgt), (s_src, s_tgt)) {
                continue;
            }

            let verdict = self.compare_candidate(candidate, pattern_edge, (p_src, p_tgt), (s_src, s_tgt))?;
            if !verdict.is_compatible() {
                trace!(depth, candidate = candidate.index(), "candidate pruned");
                continue;
            }

            let Some(mut lease) = locks.acquire(candidate) else {
                continue;
            };
            let bound_src = self.bind(p_src, s_src);
            let bound_tgt = p_tgt != p_src && self.bind(p_tgt, s_tgt);
            self.bindings.edges.push((pattern_edge, candidate));

            let outcome = self.extend(depth + 1, &mut lease);

            self.bindings.edges.pop();
            if bound_tgt {
                self.unbind(p_tgt, s_tgt);
            }
            if bound_src {
                self.unbind(p_src, s_src);
            }
            outcome?;
        }

        Ok(())
    }

    /// Bind pattern nodes that no pattern edge touches
    fn extend_isolated(&mut self, index: usize, locks: &mut EdgeLocks) -> Result<()> {
        let Some(&pattern_node) = self.plan.isolated.get(index) else {
            return self.complete(locks);
        };
        let system: &'w ModelGraph = self.system;

        for candidate in system.node_indices() {
            if self.bindings.owner.contains_key(&candidate) {
                continue;
            }
            if !self.compare_nodes(candidate, pattern_node)?.is_compatible() {
                continue;
            }
            self.bind(pattern_node, candidate);
            let outcome = self.extend_isolated(index + 1, locks);
            self.unbind(pattern_node, candidate);
            outcome?;
        }

        Ok(())
    }

    /// System edges that could carry the pattern edge given current bindings
    fn candidates(&self, p_src: NodeIndex, p_tgt: NodeIndex) -> Vec<EdgeIndex> {
        if let Some(&s) = self.bindings.primary.get(&p_src) {
            return self.system.outgoing(s);
        }
        if let Some(&t) = self.bindings.primary.get(&p_tgt) {
            return self.system.incoming(t);
        }
        self.system.edge_indices().collect()
    }

    fn structurally_consistent(
        &self,
        (p_src, p_tgt): (NodeIndex, NodeIndex),
        (s_src, s_tgt): (NodeIndex, NodeIndex),
    ) -> bool {
        if (p_src == p_tgt) != (s_src == s_tgt) {
            return false;
        }
        self.fits(p_src, s_src) && self.fits(p_tgt, s_tgt)
    }

    /// `s` is the image of `p`, or `p` is unbound and `s` is free
    fn fits(&self, p: NodeIndex, s: NodeIndex) -> bool {
        match self.bindings.primary.get(&p) {
            Some(&bound) => bound == s,
            None => !self.bindings.owner.contains_key(&s),
        }
    }

    /// Runs the node comparator on newly bound endpoints and the relation
    /// comparator on the edge. All three run so each logs its feedback.
    fn compare_candidate(
        &mut self,
        candidate: EdgeIndex,
        pattern_edge: EdgeIndex,
        (p_src, p_tgt): (NodeIndex, NodeIndex),
        (s_src, s_tgt): (NodeIndex, NodeIndex),
    ) -> Result<Verdict> {
        let mut verdict = Verdict::Compatible;
        if !self.bindings.primary.contains_key(&p_src) {
            verdict = verdict.and(self.compare_nodes(s_src, p_src)?);
        }
        if p_tgt != p_src && !self.bindings.primary.contains_key(&p_tgt) {
            verdict = verdict.and(self.compare_nodes(s_tgt, p_tgt)?);
        }
        verdict = verdict.and(self.compare_relations(candidate, pattern_edge)?);
        Ok(verdict)
    }

    fn compare_nodes(&mut self, system_node: NodeIndex, pattern_node: NodeIndex) -> Result<Verdict> {
        let system: &'w ModelGraph = self.system;
        let pattern: &'w PatternGraph = self.pattern;
        let (Some(candidate), Some(template)) = (system.node_at(system_node), pattern.graph().node_at(pattern_node))
        else {
            return Ok(Verdict::Incompatible);
        };
        pattern.node_comparator().compare(candidate, template, self.feedback)
    }

    fn compare_relations(&mut self, system_edge: EdgeIndex, pattern_edge: EdgeIndex) -> Result<Verdict> {
        let system: &'w ModelGraph = self.system;
        let pattern: &'w PatternGraph = self.pattern;
        let Some(candidate) = system.relation_at(system_edge) else {
            return Ok(Verdict::Incompatible);
        };
        let template = pattern_relation(pattern, pattern_edge)?;
        pattern.relation_comparator().compare(candidate, template, self.feedback)
    }

    /// Every pattern node and edge is bound. Multi-child inheritance edges
    /// take the still free sibling children of their parent, then the mapping
    /// is recorded and the siblings are released again.
    fn complete(&mut self, locks: &mut EdgeLocks) -> Result<()> {
        if !self.options.absorb_inheritance_siblings {
            self.record_solution();
            return Ok(());
        }
        let system: &'w ModelGraph = self.system;
        let pattern: &'w PatternGraph = self.pattern;

        let mut multi = Vec::new();
        for &(pattern_edge, system_edge) in &self.bindings.edges {
            if !pattern_relation(pattern, pattern_edge)?.has_type(RelationType::InheritanceMulti) {
                continue;
            }
            if let (Some((p_child, _)), Some((_, s_parent))) =
                (pattern.graph().endpoints(pattern_edge), system.endpoints(system_edge))
            {
                multi.push((pattern_edge, p_child, s_parent));
            }
        }

        let mut lease = locks.lease();
        let mut absorbed = 0;
        for (pattern_edge, p_child, s_parent) in multi {
            absorbed += self.absorb_siblings(pattern_edge, p_child, s_parent, &mut lease)?;
        }

        self.record_solution();

        for _ in 0..absorbed {
            if let Some((sibling, _)) = self.bindings.siblings.pop() {
                self.bindings.owner.remove(&sibling);
            }
            self.bindings.edges.pop();
        }
        Ok(())
    }

    /// Take every free child edge into the bound parent as an extra image of
    /// the same pattern edge. Returns how many were absorbed.
    fn absorb_siblings(
        &mut self,
        pattern_edge: EdgeIndex,
        p_child: NodeIndex,
        s_parent: NodeIndex,
        lease: &mut EdgeLease<'_>,
    ) -> Result<usize> {
        let system: &'w ModelGraph = self.system;
        let mut absorbed = 0;

        for sibling in system.incoming(s_parent) {
            if lease.is_locked(sibling) {
                continue;
            }
            let Some((child, _)) = system.endpoints(sibling) else {
                continue;
            };
            if self.bindings.owner.contains_key(&child) {
                continue;
            }
            let node_verdict = self.compare_nodes(child, p_child)?;
            let relation_verdict = self.compare_relations(sibling, pattern_edge)?;
            if !node_verdict.and(relation_verdict).is_compatible() {
                continue;
            }
            if !lease.acquire_more(sibling) {
                continue;
            }
            self.bindings.owner.insert(child, p_child);
            self.bindings.siblings.push((child, p_child));
            self.bindings.edges.push((pattern_edge, sibling));
            absorbed += 1;
        }

        if absorbed > 0 {
            debug!(parent = s_parent.index(), absorbed, "absorbed inheritance siblings");
        }
        Ok(absorbed)
    }

    fn bind(&mut self, p: NodeIndex, s: NodeIndex) -> bool {
        if self.bindings.primary.contains_key(&p) {
            return false;
        }
        self.bindings.primary.insert(p, s);
        self.bindings.owner.insert(s, p);
        true
    }

    fn unbind(&mut self, p: NodeIndex, s: NodeIndex) {
        self.bindings.primary.remove(&p);
        self.bindings.owner.remove(&s);
    }

    fn record_solution(&mut self) {
        let system: &'w ModelGraph = self.system;
        let pattern: &'w PatternGraph = self.pattern;

        let mut nodes = Vec::with_capacity(self.bindings.owner.len());
        for p in pattern.graph().node_indices() {
            let Some(&s) = self.bindings.primary.get(&p) else {
                continue;
            };
            let (Some(image), Some(role)) = (system.node_at(s), pattern.graph().node_at(p)) else {
                continue;
            };
            nodes.push((image, role));
            for (sibling, owner) in &self.bindings.siblings {
                if *owner == p {
                    if let Some(extra) = system.node_at(*sibling) {
                        nodes.push((extra, role));
                    }
                }
            }
        }

        let relations: Vec<(&Relation, &Relation)> = self
            .bindings
            .edges
            .iter()
            .filter_map(|(pe, se)| Some((system.relation_at(*se)?, pattern.graph().relation_at(*pe)?)))
            .collect();

        if self.options.record_bindings {
            for (image, role) in &nodes {
                self.feedback.matched(
                    EntityRef::node(image.id.clone()),
                    format!("Bound to role '{}' of pattern '{}'", role.label(), pattern.name),
                );
            }
            for (image, role) in &relations {
                self.feedback.matched(
                    EntityRef::relation(image.id.clone()),
                    format!("Bound to relation '{}' of pattern '{}'", role.label(), pattern.name),
                );
            }
        }

        debug!(
            pattern = %pattern.name,
            nodes = nodes.len(),
            relations = relations.len(),
            "mapping found"
        );

        self.mappings.push(Solution {
            pattern_name: pattern.name.clone(),
            pattern_family: pattern.family.clone(),
            nodes: nodes.iter().map(|(s, p)| (s.id.clone(), p.id.clone())).collect(),
            relations: relations.iter().map(|(s, p)| (s.id.clone(), p.id.clone())).collect(),
        });
    }
}

fn pattern_relation(pattern: &PatternGraph, edge: EdgeIndex) -> Result<&Relation> {
    pattern
        .graph()
        .relation_at(edge)
        .ok_or_else(|| DetectError::RelationNotFound(format!("pattern edge {}", edge.index())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Node, NodeType};

    fn chain_pattern() -> PatternGraph {
        let mut pattern = PatternGraph::new("Chain", "test");
        pattern.add_node(Node::new("A", "A").with_type(NodeType::ConcreteClass)).unwrap();
        pattern.add_node(Node::new("B", "B").with_type(NodeType::ConcreteClass)).unwrap();
        pattern.add_node(Node::new("C", "C").with_type(NodeType::ConcreteClass)).unwrap();
        pattern
            .add_relation(Relation::new("bc", "B", "C").with_type(RelationType::Association))
            .unwrap();
        pattern
            .add_relation(Relation::new("ab", "A", "B").with_type(RelationType::Association))
            .unwrap();
        pattern
    }

    #[test]
    fn test_plan_orders_connected_edges() {
        let pattern = chain_pattern();
        let plan = SearchPlan::new(pattern.graph());
        assert_eq!(plan.edges.len(), 2);
        assert!(plan.isolated.is_empty());
    }

    #[test]
    fn test_plan_collects_isolated_nodes() {
        let mut pattern = chain_pattern();
        pattern.add_node(Node::new("D", "D")).unwrap();
        let plan = SearchPlan::new(pattern.graph());
        assert_eq!(plan.isolated.len(), 1);
    }

    #[test]
    fn test_directed_chain_match() {
        let mut system = SystemGraph::new("sys");
        for id in ["x", "y", "z"] {
            system.add_node(Node::new(id, id).with_type(NodeType::ConcreteClass)).unwrap();
        }
        system
            .add_relation(Relation::new("xy", "x", "y").with_type(RelationType::Association))
            .unwrap();
        system
            .add_relation(Relation::new("yz", "y", "z").with_type(RelationType::Association))
            .unwrap();

        let pattern = chain_pattern();
        let mut search = IsomorphismSearch::new(&system, &pattern);
        let result = search.matching_result().unwrap();
        assert_eq!(result.len(), 1);
        let solution = &result.solutions[0];
        assert_eq!(solution.role_of("x"), Some("A"));
        assert_eq!(solution.role_of("z"), Some("C"));
        assert_eq!(solution.relations.len(), 2);
    }

    #[test]
    fn test_reversed_edge_is_not_a_match() {
        let mut system = SystemGraph::new("sys");
        for id in ["x", "y", "z"] {
            system.add_node(Node::new(id, id).with_type(NodeType::ConcreteClass)).unwrap();
        }
        system
            .add_relation(Relation::new("xy", "x", "y").with_type(RelationType::Association))
            .unwrap();
        system
            .add_relation(Relation::new("zy", "z", "y").with_type(RelationType::Association))
            .unwrap();

        let pattern = chain_pattern();
        let mut search = IsomorphismSearch::new(&system, &pattern);
        assert!(!search.isomorphism_exists().unwrap());
    }

    #[test]
    fn test_empty_pattern_is_rejected() {
        let system = SystemGraph::new("sys");
        let pattern = PatternGraph::new("Empty", "test");
        let mut search = IsomorphismSearch::new(&system, &pattern);
        assert!(matches!(search.isomorphism_exists(), Err(DetectError::MalformedPattern { .. })));
    }

    #[test]
    fn test_comparator_error_aborts_search() {
        let mut system = SystemGraph::new("sys");
        system.add_node(Node::new("x", "x")).unwrap();
        system.add_node(Node::new("y", "y")).unwrap();
        system
            .add_relation(Relation::new("xy", "x", "y").with_type(RelationType::Association))
            .unwrap();

        let mut pattern = PatternGraph::new("Broken", "test");
        pattern.add_node(Node::new("A", "A")).unwrap();
        pattern.add_node(Node::new("B", "B")).unwrap();
        // No relation type on the template relation
        pattern.add_relation(Relation::new("ab", "A", "B")).unwrap();

        let mut search = IsomorphismSearch::new(&system, &pattern);
        assert!(matches!(search.matching_result(), Err(DetectError::MalformedPattern { .. })));
    }

    #[test]
    fn test_isolated_pattern_node_binds_distinct_system_node() {
        let mut system = SystemGraph::new("sys");
        system.add_node(Node::new("only", "Only").with_type(NodeType::Interface)).unwrap();
        system.add_node(Node::new("other", "Other").with_type(NodeType::ConcreteClass)).unwrap();

        let mut pattern = PatternGraph::new("Single", "test");
        pattern.add_node(Node::new("I", "I").with_type(NodeType::Interface)).unwrap();

        let mut search = IsomorphismSearch::new(&system, &pattern);
        let result = search.matching_result().unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.solutions[0].role_of("only"), Some("I"));
    }

    #[test]
    fn test_detect_all_keeps_pattern_order() {
        let mut system = SystemGraph::new("sys");
        for id in ["x", "y", "z"] {
            system.add_node(Node::new(id, id).with_type(NodeType::ConcreteClass)).unwrap();
        }
        system
            .add_relation(Relation::new("xy", "x", "y").with_type(RelationType::Association))
            .unwrap();
        system
            .add_relation(Relation::new("yz", "y", "z").with_type(RelationType::Association))
            .unwrap();

        let mut lone = PatternGraph::new("Lone", "test");
        lone.add_node(Node::new("I", "I").with_type(NodeType::Interface)).unwrap();

        let results = detect_all(&system, &[chain_pattern(), lone], SearchOptions::default()).unwrap();
        let names: Vec<&str> = results.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["Chain", "Lone"]);
        assert_eq!(results[0].1.len(), 1);
        assert!(results[1].1.is_empty());
    }
}
