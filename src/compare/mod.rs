//! Comparator Engine
//!
//! Equivalence predicates between a system-side candidate and a pattern-side
//! template entity. Rules are resolved once from `(scope, topic, operator)`
//! triples into closed enums, then chained in a [`CompoundComparator`].
//!
//! Every comparison logs feedback against the system-side entity, including
//! comparisons whose search branch is abandoned later.

pub mod node;
pub mod relation;

pub use node::NodeRule;
pub use relation::RelationRule;

use serde::{Deserialize, Serialize};

use crate::error::{DetectError, Result};
use crate::graph::Feedback;

// =============================================================================
// Verdict
// =============================================================================

/// Outcome of one comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Compatible,
    Incompatible,
}

impl Verdict {
    pub fn from_bool(compatible: bool) -> Self {
        if compatible {
            Self::Compatible
        } else {
            Self::Incompatible
        }
    }

    pub fn is_compatible(self) -> bool {
        self == Self::Compatible
    }

    /// 0 for compatible, 1 otherwise
    pub fn code(self) -> i32 {
        match self {
            Self::Compatible => 0,
            Self::Incompatible => 1,
        }
    }

    /// Incompatible once either side is
    pub fn and(self, other: Verdict) -> Self {
        Self::from_bool(self.is_compatible() && other.is_compatible())
    }
}

// =============================================================================
// Comparator
// =============================================================================

/// An equivalence predicate over `T` (a node or a relation)
pub trait Comparator<T> {
    /// Compare `system` against the template `pattern`, recording feedback
    /// attributed to `system`. Errors signal a malformed template.
    fn compare(&self, system: &T, pattern: &T, feedback: &mut Feedback) -> Result<Verdict>;

    /// Whether this rule decides if the two entities are the same kind
    fn checks_kind(&self) -> bool {
        false
    }

    /// Whether this rule only runs once every kind check in its chain passed
    fn needs_kind_match(&self) -> bool {
        false
    }
}

/// Ordered chain of rules. Every rule runs on each comparison, and the
/// verdict is incompatible as soon as one rule fails. Rules that need a kind
/// match run after the others and are skipped, without feedback, when a kind
/// check failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompoundComparator<R> {
    comparators: Vec<R>,
}

impl<R> CompoundComparator<R> {
    pub fn new() -> Self {
        Self {
            comparators: Vec::new(),
        }
    }

    pub fn with(comparators: Vec<R>) -> Self {
        Self { comparators }
    }

    /// Append a rule; applies to comparisons made after this call
    pub fn add_comparator(&mut self, comparator: R) {
        self.comparators.push(comparator);
    }

    pub fn comparators(&self) -> &[R] {
        &self.comparators
    }

    pub fn len(&self) -> usize {
        self.comparators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comparators.is_empty()
    }
}

impl<R> Default for CompoundComparator<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, R: Comparator<T>> Comparator<T> for CompoundComparator<R> {
    fn compare(&self, system: &T, pattern: &T, feedback: &mut Feedback) -> Result<Verdict> {
        let mut verdict = Verdict::Compatible;
        let mut kind_matches = true;
        let (gated, ungated): (Vec<&R>, Vec<&R>) = self.comparators.iter().partition(|c| c.needs_kind_match());

        for comparator in ungated {
            let mut local = Feedback::new();
            let outcome = comparator.compare(system, pattern, &mut local)?;
            if comparator.checks_kind() && !outcome.is_compatible() {
                kind_matches = false;
            }
            verdict = verdict.and(outcome);
            feedback.merge(local);
        }

        if !kind_matches {
            return Ok(Verdict::Incompatible);
        }
        for comparator in gated {
            let mut local = Feedback::new();
            verdict = verdict.and(comparator.compare(system, pattern, &mut local)?);
            feedback.merge(local);
        }
        Ok(verdict)
    }
}

/// Node chain attached to every loaded pattern: role-tag subset check
pub fn default_node_comparator() -> CompoundComparator<NodeRule> {
    CompoundComparator::with(vec![NodeRule::TypesSubset])
}

/// Relation chain attached to every loaded pattern: type compatibility, then
/// cardinalities of the matched types
pub fn default_relation_comparator() -> CompoundComparator<RelationRule> {
    CompoundComparator::with(vec![RelationRule::TypesCompatible, RelationRule::Cardinality])
}

// =============================================================================
// Rule Resolution
// =============================================================================

/// Declarative rule triple as written in pattern templates and config
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleSpec {
    pub scope: String,
    pub topic: String,
    pub operator: String,
}

impl RuleSpec {
    pub fn new(scope: impl Into<String>, topic: impl Into<String>, operator: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            topic: topic.into(),
            operator: operator.into(),
        }
    }
}

/// A rule triple resolved to its comparator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedRule {
    Node(NodeRule),
    Relation(RelationRule),
}

/// Resolve a rule triple; unknown combinations are configuration errors
pub fn resolve(rule: &RuleSpec) -> Result<ResolvedRule> {
    match rule.scope.as_str() {
        "node" => NodeRule::resolve(&rule.topic, &rule.operator)
            .map(ResolvedRule::Node)
            .ok_or_else(|| unknown(rule)),
        "relation" => RelationRule::resolve(&rule.topic, &rule.operator)
            .map(ResolvedRule::Relation)
            .ok_or_else(|| unknown(rule)),
        _ => Err(unknown(rule)),
    }
}

fn unknown(rule: &RuleSpec) -> DetectError {
    DetectError::unknown_rule(&rule.scope, &rule.topic, &rule.operator)
}
