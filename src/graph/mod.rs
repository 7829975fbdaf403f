//! Class-Model Graph
//!
//! Primary data structure using petgraph for the classes/interfaces of a software
//! system and the typed relations between them. Provides fast lookup via HashMap
//! indexes keyed by node and relation identity.
//!
//! This module is shared between:
//! - System graphs (the model under analysis)
//! - Pattern graphs (design-pattern templates with attached comparators)
//!
//! Both are built on the same ModelGraph so the search walks one representation.

pub mod derive;
pub mod feedback;
pub mod loader;

pub use derive::derive_relations;
pub use feedback::{EntityRef, Feedback, FeedbackCategory, FeedbackRecord};
pub use loader::{
    load_pattern, load_patterns, load_patterns_from_directory, load_system, PatternDefinition,
    SystemDefinition,
};

use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::compare::{
    default_node_comparator, default_relation_comparator, resolve, CompoundComparator, NodeRule,
    RelationRule, ResolvedRule, RuleSpec,
};
use crate::error::{DetectError, Result};

/// Canonical node identifier
pub type NodeId = String;

/// Canonical relation identifier
pub type RelationId = String;

// =============================================================================
// Node
// =============================================================================

/// Role tag carried by a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    ConcreteClass,
    AbstractClass,
    Interface,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConcreteClass => "concrete_class",
            Self::AbstractClass => "abstract_class",
            Self::Interface => "interface",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared visibility of a class or interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Protected,
    Private,
    Package,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Protected => write!(f, "protected"),
            Self::Private => write!(f, "private"),
            Self::Package => write!(f, "package"),
        }
    }
}

/// Boolean modifier selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifierKind {
    Root,
    Leaf,
    Abstract,
    Active,
}

impl ModifierKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "root" => Some(Self::Root),
            "leaf" => Some(Self::Leaf),
            "abstract" => Some(Self::Abstract),
            "active" => Some(Self::Active),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Leaf => "leaf",
            Self::Abstract => "abstract",
            Self::Active => "active",
        }
    }
}

/// Optional boolean modifiers. `None` means the model did not state the modifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leaf: Option<bool>,
    #[serde(default, rename = "abstract", skip_serializing_if = "Option::is_none")]
    pub is_abstract: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

impl Modifiers {
    pub fn get(&self, kind: ModifierKind) -> Option<bool> {
        match kind {
            ModifierKind::Root => self.root,
            ModifierKind::Leaf => self.leaf,
            ModifierKind::Abstract => self.is_abstract,
            ModifierKind::Active => self.active,
        }
    }

    pub fn set(&mut self, kind: ModifierKind, value: bool) {
        let slot = match kind {
            ModifierKind::Root => &mut self.root,
            ModifierKind::Leaf => &mut self.leaf,
            ModifierKind::Abstract => &mut self.is_abstract,
            ModifierKind::Active => &mut self.active,
        };
        *slot = Some(value);
    }
}

/// A typed attribute of a class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    /// Node id of the attribute's type, when the type is part of the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_ref: Option<NodeId>,
}

/// An operation of a class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub name: String,
    /// Node id of the return type, when the type is part of the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<NodeId>,
}

/// A class or interface. Equality and hashing use `id` only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub types: BTreeSet<NodeType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(default)]
    pub modifiers: Modifiers,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<Attribute>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operations: Vec<Operation>,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            types: BTreeSet::new(),
            visibility: None,
            modifiers: Modifiers::default(),
            attributes: Vec::new(),
            operations: Vec::new(),
        }
    }

    pub fn with_type(mut self, node_type: NodeType) -> Self {
        self.types.insert(node_type);
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = Some(visibility);
        self
    }

    pub fn with_modifier(mut self, kind: ModifierKind, value: bool) -> Self {
        self.modifiers.set(kind, value);
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, type_ref: Option<&str>) -> Self {
        self.attributes.push(Attribute {
            name: name.into(),
            type_ref: type_ref.map(String::from),
        });
        self
    }

    pub fn with_operation(mut self, name: impl Into<String>, return_type: Option<&str>) -> Self {
        self.operations.push(Operation {
            name: name.into(),
            return_type: return_type.map(String::from),
        });
        self
    }

    pub fn has_type(&self, node_type: NodeType) -> bool {
        self.types.contains(&node_type)
    }

    /// Name for messages; falls back to the id for unnamed nodes
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

// =============================================================================
// Relation
// =============================================================================

/// Semantic role of a relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    /// Child extends parent
    Inheritance,
    /// Pattern-side only in practice: several children extend one parent
    InheritanceMulti,
    /// Class implements interface
    Realization,
    Association,
    Aggregation,
    Composition,
    Dependency,
    HasAttribute,
    CallsMethod,
    CreatesInstance,
    OverridesMethod,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inheritance => "inheritance",
            Self::InheritanceMulti => "inheritance_multi",
            Self::Realization => "realization",
            Self::Association => "association",
            Self::Aggregation => "aggregation",
            Self::Composition => "composition",
            Self::Dependency => "dependency",
            Self::HasAttribute => "has_attribute",
            Self::CallsMethod => "calls_method",
            Self::CreatesInstance => "creates_instance",
            Self::OverridesMethod => "overrides_method",
        }
    }

    /// Whether a pattern relation of type `self` accepts a system relation of
    /// type `system`. Multi-child inheritance accepts plain inheritance; the
    /// reverse never holds.
    pub fn accepts(self, system: RelationType) -> bool {
        self == system
            || (self == RelationType::InheritanceMulti && system == RelationType::Inheritance)
    }

    pub fn is_inheritance(&self) -> bool {
        matches!(self, Self::Inheritance | Self::InheritanceMulti)
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Multiplicity range; `upper == None` is unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cardinality {
    pub lower: u32,
    #[serde(default)]
    pub upper: Option<u32>,
}

impl Cardinality {
    pub fn exactly(n: u32) -> Self {
        Self {
            lower: n,
            upper: Some(n),
        }
    }

    pub fn range(lower: u32, upper: u32) -> Self {
        Self {
            lower,
            upper: Some(upper),
        }
    }

    pub fn at_least(lower: u32) -> Self {
        Self { lower, upper: None }
    }
}

impl Default for Cardinality {
    fn default() -> Self {
        Self::exactly(1)
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upper {
            Some(upper) if upper == self.lower => write!(f, "{}", upper),
            Some(upper) => write!(f, "{}..{}", self.lower, upper),
            None => write!(f, "{}..*", self.lower),
        }
    }
}

/// One semantic role a relation carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationProperty {
    #[serde(rename = "type")]
    pub relation_type: RelationType,
    #[serde(default)]
    pub left: Cardinality,
    #[serde(default)]
    pub right: Cardinality,
}

impl RelationProperty {
    pub fn new(relation_type: RelationType) -> Self {
        Self {
            relation_type,
            left: Cardinality::default(),
            right: Cardinality::default(),
        }
    }

    pub fn with_cardinalities(mut self, left: Cardinality, right: Cardinality) -> Self {
        self.left = left;
        self.right = right;
        self
    }

    pub fn cardinalities(&self) -> (Cardinality, Cardinality) {
        (self.left, self.right)
    }

    /// "(left,right)" rendering used in feedback
    pub fn cardinality_label(&self) -> String {
        format!("({},{})", self.left, self.right)
    }
}

impl fmt::Display for RelationProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.relation_type, self.cardinality_label())
    }
}

/// A directed relation from `source` to `target` carrying a set of properties
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    pub id: RelationId,
    #[serde(default)]
    pub name: String,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default)]
    pub properties: Vec<RelationProperty>,
}

impl Relation {
    pub fn new(id: impl Into<RelationId>, source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            source: source.into(),
            target: target.into(),
            properties: Vec::new(),
        }
    }

    pub fn with_property(mut self, property: RelationProperty) -> Self {
        self.add_property(property);
        self
    }

    pub fn with_type(self, relation_type: RelationType) -> Self {
        self.with_property(RelationProperty::new(relation_type))
    }

    /// Add a property. A relation holds at most one property per type; returns
    /// false when the type is already present.
    pub fn add_property(&mut self, property: RelationProperty) -> bool {
        if self.has_type(property.relation_type) {
            return false;
        }
        self.properties.push(property);
        true
    }

    pub fn has_type(&self, relation_type: RelationType) -> bool {
        self.properties.iter().any(|p| p.relation_type == relation_type)
    }

    pub fn property(&self, relation_type: RelationType) -> Option<&RelationProperty> {
        self.properties.iter().find(|p| p.relation_type == relation_type)
    }

    pub fn types(&self) -> impl Iterator<Item = RelationType> + '_ {
        self.properties.iter().map(|p| p.relation_type)
    }

    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    /// Comma-separated type list for messages
    pub fn type_list(&self) -> String {
        let types: Vec<&str> = self.types().map(|t| t.as_str()).collect();
        if types.is_empty() {
            String::from("<none>")
        } else {
            types.join(", ")
        }
    }
}

impl PartialEq for Relation {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Relation {}

// =============================================================================
// Model Graph
// =============================================================================

/// Directed multigraph of nodes and relations
#[derive(Debug, Clone, Default)]
pub struct ModelGraph {
    /// Primary graph structure; weights are the ids
    pub(crate) graph: DiGraph<NodeId, RelationId>,

    /// Node data indexed by id
    pub(crate) nodes: HashMap<NodeId, Node>,

    /// Relation data indexed by id
    pub(crate) relations: HashMap<RelationId, Relation>,

    /// Node index lookup: id -> NodeIndex
    pub(crate) node_indices: HashMap<NodeId, NodeIndex>,

    /// Edge index lookup: id -> EdgeIndex
    pub(crate) edge_indices: HashMap<RelationId, EdgeIndex>,
}

impl ModelGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node; ids must be unique
    pub fn add_node(&mut self, node: Node) -> Result<NodeIndex> {
        if self.nodes.contains_key(&node.id) {
            return Err(DetectError::DuplicateNode(node.id));
        }
        let idx = self.graph.add_node(node.id.clone());
        self.node_indices.insert(node.id.clone(), idx);
        self.nodes.insert(node.id.clone(), node);
        Ok(idx)
    }

    /// Add a relation between two existing nodes; ids must be unique and each
    /// relation type may appear once among its properties
    pub fn add_relation(&mut self, relation: Relation) -> Result<EdgeIndex> {
        if self.relations.contains_key(&relation.id) {
            return Err(DetectError::DuplicateRelation(relation.id));
        }
        let mut seen = BTreeSet::new();
        let repeated = relation.types().find(|t| !seen.insert(*t));
        if let Some(repeated) = repeated {
            return Err(DetectError::DuplicateProperty {
                relation: relation.id,
                relation_type: repeated.to_string(),
            });
        }
        let source = self.require_index(&relation.source)?;
        let target = self.require_index(&relation.target)?;
        let idx = self.graph.add_edge(source, target, relation.id.clone());
        self.edge_indices.insert(relation.id.clone(), idx);
        self.relations.insert(relation.id.clone(), relation);
        Ok(idx)
    }

    // ========== Editing (before matching starts) ==========

    /// Add a property to an existing relation; false when the type is present
    pub fn add_relation_property(&mut self, id: &str, property: RelationProperty) -> Result<bool> {
        let relation = self
            .relations
            .get_mut(id)
            .ok_or_else(|| DetectError::RelationNotFound(id.to_string()))?;
        Ok(relation.add_property(property))
    }

    pub fn add_attribute(&mut self, node: &str, attribute: Attribute) -> Result<()> {
        self.require_node(node)?.attributes.push(attribute);
        Ok(())
    }

    pub fn add_operation(&mut self, node: &str, operation: Operation) -> Result<()> {
        self.require_node(node)?.operations.push(operation);
        Ok(())
    }

    fn require_node(&mut self, id: &str) -> Result<&mut Node> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| DetectError::NodeNotFound(id.to_string()))
    }

    fn require_index(&self, id: &str) -> Result<NodeIndex> {
        self.node_indices
            .get(id)
            .copied()
            .ok_or_else(|| DetectError::NodeNotFound(id.to_string()))
    }

    // ========== Lookup ==========

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn relation(&self, id: &str) -> Option<&Relation> {
        self.relations.get(id)
    }

    pub fn node_index(&self, id: &str) -> Option<NodeIndex> {
        self.node_indices.get(id).copied()
    }

    pub fn edge_index(&self, id: &str) -> Option<EdgeIndex> {
        self.edge_indices.get(id).copied()
    }

    pub fn node_at(&self, idx: NodeIndex) -> Option<&Node> {
        self.graph.node_weight(idx).and_then(|id| self.nodes.get(id))
    }

    pub fn relation_at(&self, idx: EdgeIndex) -> Option<&Relation> {
        self.graph.edge_weight(idx).and_then(|id| self.relations.get(id))
    }

    /// (source, target) of an edge
    pub fn endpoints(&self, idx: EdgeIndex) -> Option<(NodeIndex, NodeIndex)> {
        self.graph.edge_endpoints(idx)
    }

    /// All relations from `source` to `target`, in insertion order
    pub fn relations_between(&self, source: &str, target: &str) -> Vec<&Relation> {
        let (Some(s), Some(t)) = (self.node_index(source), self.node_index(target)) else {
            return Vec::new();
        };
        let mut edges: Vec<EdgeIndex> = self.graph.edges_connecting(s, t).map(|e| e.id()).collect();
        edges.sort();
        edges.into_iter().filter_map(|e| self.relation_at(e)).collect()
    }

    /// Outgoing edges of a node, in insertion order
    pub fn outgoing(&self, idx: NodeIndex) -> Vec<EdgeIndex> {
        self.edges_directed(idx, Direction::Outgoing)
    }

    /// Incoming edges of a node, in insertion order
    pub fn incoming(&self, idx: NodeIndex) -> Vec<EdgeIndex> {
        self.edges_directed(idx, Direction::Incoming)
    }

    fn edges_directed(&self, idx: NodeIndex, direction: Direction) -> Vec<EdgeIndex> {
        let mut edges: Vec<EdgeIndex> = self
            .graph
            .edges_directed(idx, direction)
            .map(|e| e.id())
            .collect();
        edges.sort();
        edges
    }

    pub fn node_indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    pub fn edge_indices(&self) -> impl Iterator<Item = EdgeIndex> + '_ {
        self.graph.edge_indices()
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_indices().filter_map(move |idx| self.node_at(idx))
    }

    /// Relations in insertion order
    pub fn relations(&self) -> impl Iterator<Item = &Relation> {
        self.graph.edge_indices().filter_map(move |idx| self.relation_at(idx))
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn relation_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Export the graph to GraphViz DOT format
    pub fn to_dot(&self, title: &str) -> String {
        let mut output = String::new();

        output.push_str(&format!("digraph \"{}\" {{\n", title.replace('"', "'")));
        output.push_str("  rankdir=BT;\n");
        output.push_str("  node [shape=box, style=\"filled,rounded\", fontname=\"Helvetica\", fontsize=10];\n");
        output.push_str("  edge [fontname=\"Helvetica\", fontsize=8];\n\n");

        let color_map = [
            (NodeType::Interface, "#C8E6C9"),
            (NodeType::AbstractClass, "#BBDEFB"),
            (NodeType::ConcreteClass, "#FFE0B2"),
        ];

        for node in self.nodes() {
            let color = color_map
                .iter()
                .find(|(node_type, _)| node.has_type(*node_type))
                .map(|(_, color)| *color)
                .unwrap_or("#E0E0E0");
            output.push_str(&format!(
                "  \"{}\" [label=\"{}\", fillcolor=\"{}\"];\n",
                dot_id(&node.id),
                node.label(),
                color
            ));
        }

        output.push('\n');

        for relation in self.relations() {
            output.push_str(&format!(
                "  \"{}\" -> \"{}\" [label=\"{}\"];\n",
                dot_id(&relation.source),
                dot_id(&relation.target),
                relation.type_list()
            ));
        }

        output.push_str("}\n");
        output
    }
}

fn dot_id(id: &str) -> String {
    id.replace(['/', '.', '-', ':', '"'], "_")
}

// =============================================================================
// System and Pattern Graphs
// =============================================================================

/// The graph extracted from the software system under analysis
#[derive(Debug, Clone, Default)]
pub struct SystemGraph {
    pub name: String,
    graph: ModelGraph,
}

impl SystemGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            graph: ModelGraph::new(),
        }
    }

    pub fn from_graph(name: impl Into<String>, graph: ModelGraph) -> Self {
        Self {
            name: name.into(),
            graph,
        }
    }

    pub fn graph(&self) -> &ModelGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut ModelGraph {
        &mut self.graph
    }

    pub fn add_node(&mut self, node: Node) -> Result<NodeIndex> {
        self.graph.add_node(node)
    }

    pub fn add_relation(&mut self, relation: Relation) -> Result<EdgeIndex> {
        self.graph.add_relation(relation)
    }
}

/// A design-pattern template with its node and relation comparator chains
#[derive(Debug, Clone)]
pub struct PatternGraph {
    pub name: String,
    pub family: String,
    graph: ModelGraph,
    node_comparator: CompoundComparator<NodeRule>,
    relation_comparator: CompoundComparator<RelationRule>,
    notes: Vec<String>,
}

impl PatternGraph {
    /// New template with the default comparator chains attached
    pub fn new(name: impl Into<String>, family: impl Into<String>) -> Self {
        Self::with_comparators(
            name,
            family,
            ModelGraph::new(),
            default_node_comparator(),
            default_relation_comparator(),
        )
    }

    pub fn with_comparators(
        name: impl Into<String>,
        family: impl Into<String>,
        graph: ModelGraph,
        node_comparator: CompoundComparator<NodeRule>,
        relation_comparator: CompoundComparator<RelationRule>,
    ) -> Self {
        Self {
            name: name.into(),
            family: family.into(),
            graph,
            node_comparator,
            relation_comparator,
            notes: Vec::new(),
        }
    }

    pub fn graph(&self) -> &ModelGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut ModelGraph {
        &mut self.graph
    }

    pub fn add_node(&mut self, node: Node) -> Result<NodeIndex> {
        self.graph.add_node(node)
    }

    pub fn add_relation(&mut self, relation: Relation) -> Result<EdgeIndex> {
        self.graph.add_relation(relation)
    }

    pub fn node_comparator(&self) -> &CompoundComparator<NodeRule> {
        &self.node_comparator
    }

    pub fn relation_comparator(&self) -> &CompoundComparator<RelationRule> {
        &self.relation_comparator
    }

    /// Resolve a rule triple and append it to the matching chain
    pub fn add_rule(&mut self, rule: &RuleSpec) -> Result<()> {
        match resolve(rule)? {
            ResolvedRule::Node(rule) => self.node_comparator.add_comparator(rule),
            ResolvedRule::Relation(rule) => self.relation_comparator.add_comparator(rule),
        }
        Ok(())
    }

    pub fn add_note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ModelGraph {
        let mut graph = ModelGraph::new();
        graph.add_node(Node::new("a", "A").with_type(NodeType::ConcreteClass)).unwrap();
        graph.add_node(Node::new("b", "B").with_type(NodeType::Interface)).unwrap();
        graph
            .add_relation(Relation::new("r1", "a", "b").with_type(RelationType::Realization))
            .unwrap();
        graph
            .add_relation(Relation::new("r2", "a", "b").with_type(RelationType::HasAttribute))
            .unwrap();
        graph
    }

    #[test]
    fn test_multigraph_lookup() {
        let graph = sample();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.relation_count(), 2);

        let between: Vec<&str> = graph.relations_between("a", "b").iter().map(|r| r.id.as_str()).collect();
        assert_eq!(between, vec!["r1", "r2"]);
        assert!(graph.relations_between("b", "a").is_empty());

        let a = graph.node_index("a").unwrap();
        assert_eq!(graph.outgoing(a).len(), 2);
        assert!(graph.incoming(a).is_empty());
    }

    #[test]
    fn test_duplicate_and_dangling_rejected() {
        let mut graph = sample();
        assert!(matches!(
            graph.add_node(Node::new("a", "Again")),
            Err(DetectError::DuplicateNode(_))
        ));
        assert!(matches!(
            graph.add_relation(Relation::new("r3", "a", "missing")),
            Err(DetectError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_repeated_property_type_rejected() {
        let mut graph = sample();
        let mut relation = Relation::new("r3", "a", "b").with_type(RelationType::Association);
        relation.properties.push(RelationProperty::new(RelationType::Association));
        assert!(matches!(
            graph.add_relation(relation),
            Err(DetectError::DuplicateProperty { .. })
        ));
        assert_eq!(graph.relation_count(), 2);
    }

    #[test]
    fn test_editing_keeps_identity() {
        let mut graph = sample();
        assert!(graph
            .add_relation_property("r1", RelationProperty::new(RelationType::OverridesMethod))
            .unwrap());
        assert!(!graph
            .add_relation_property("r1", RelationProperty::new(RelationType::Realization))
            .unwrap());
        assert!(matches!(
            graph.add_relation_property("missing", RelationProperty::new(RelationType::Dependency)),
            Err(DetectError::RelationNotFound(_))
        ));

        graph
            .add_operation("b", Operation { name: "update".to_string(), return_type: None })
            .unwrap();
        graph
            .add_attribute("a", Attribute { name: "target".to_string(), type_ref: Some("b".to_string()) })
            .unwrap();
        assert_eq!(graph.node("b").unwrap().operations.len(), 1);
        assert_eq!(graph.node("a").unwrap().attributes.len(), 1);
        assert!(graph.add_attribute("ghost", Attribute { name: "x".to_string(), type_ref: None }).is_err());
    }

    #[test]
    fn test_relation_property_set() {
        let mut relation = Relation::new("r", "a", "b").with_type(RelationType::Inheritance);
        assert!(!relation.add_property(RelationProperty::new(RelationType::Inheritance)));
        assert!(relation.add_property(RelationProperty::new(RelationType::OverridesMethod)));
        assert_eq!(relation.properties.len(), 2);
    }

    #[test]
    fn test_inheritance_multi_is_asymmetric() {
        assert!(RelationType::InheritanceMulti.accepts(RelationType::Inheritance));
        assert!(!RelationType::Inheritance.accepts(RelationType::InheritanceMulti));
        assert!(RelationType::Inheritance.accepts(RelationType::Inheritance));
    }

    #[test]
    fn test_node_equality_by_id() {
        let a = Node::new("x", "First").with_type(NodeType::Interface);
        let b = Node::new("x", "Second");
        assert_eq!(a, b);
    }

    #[test]
    fn test_cardinality_label() {
        let prop = RelationProperty::new(RelationType::Association)
            .with_cardinalities(Cardinality::exactly(2), Cardinality::at_least(0));
        assert_eq!(prop.cardinality_label(), "(2,0..*)");
    }
}
