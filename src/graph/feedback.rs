//! Feedback
//!
//! Collects per-entity, per-category messages during comparator runs and the
//! isomorphism search. Every system entity can be seeded with a NOT_ANALYSED
//! message, which is dropped as soon as any other message is recorded for it.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use super::{ModelGraph, NodeId, RelationId};

// =============================================================================
// Entity Reference
// =============================================================================

/// A node or relation that feedback is attributed to
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EntityRef {
    Node(NodeId),
    Relation(RelationId),
}

impl EntityRef {
    pub fn node(id: impl Into<NodeId>) -> Self {
        Self::Node(id.into())
    }

    pub fn relation(id: impl Into<RelationId>) -> Self {
        Self::Relation(id.into())
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Node(id) | Self::Relation(id) => id,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node(id) => write!(f, "node:{}", id),
            Self::Relation(id) => write!(f, "relation:{}", id),
        }
    }
}

// =============================================================================
// Category
// =============================================================================

/// Feedback category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedbackCategory {
    Match,
    Mismatch,
    Info,
    NotAnalysed,
}

impl FeedbackCategory {
    pub const ALL: [FeedbackCategory; 4] = [
        FeedbackCategory::Match,
        FeedbackCategory::Mismatch,
        FeedbackCategory::Info,
        FeedbackCategory::NotAnalysed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Match => "MATCH",
            Self::Mismatch => "MISMATCH",
            Self::Info => "INFO",
            Self::NotAnalysed => "NOT_ANALYSED",
        }
    }
}

impl fmt::Display for FeedbackCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message recorded when an entity is seeded
pub const NOT_ANALYSED_MESSAGE: &str = "Not analysed";

// =============================================================================
// Feedback Log
// =============================================================================

/// One (entity, category) entry, borrowed for reporting
#[derive(Debug, Clone, Serialize)]
pub struct FeedbackRecord<'a> {
    pub entity: &'a EntityRef,
    pub category: FeedbackCategory,
    pub messages: &'a [String],
}

/// Message store keyed by (entity, category), plus free-form pattern notes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Feedback {
    entries: BTreeMap<EntityRef, BTreeMap<FeedbackCategory, Vec<String>>>,
    notes: Vec<String>,
}

impl Feedback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an entity with NOT_ANALYSED unless it already has feedback
    pub fn seed(&mut self, entity: EntityRef) {
        self.add(entity, FeedbackCategory::NotAnalysed, NOT_ANALYSED_MESSAGE);
    }

    /// Seed every node and relation of a graph
    pub fn seed_graph(&mut self, graph: &ModelGraph) {
        for node in graph.nodes() {
            self.seed(EntityRef::node(node.id.clone()));
        }
        for relation in graph.relations() {
            self.seed(EntityRef::relation(relation.id.clone()));
        }
    }

    /// Record a message. Identical messages for the same key are kept once.
    ///
    /// NOT_ANALYSED is only recorded for entities with no other feedback, and
    /// any other category replaces it.
    pub fn add(&mut self, entity: EntityRef, category: FeedbackCategory, message: impl Into<String>) {
        let message = message.into();
        let categories = self.entries.entry(entity).or_default();

        if category == FeedbackCategory::NotAnalysed {
            if categories.keys().any(|c| *c != FeedbackCategory::NotAnalysed) {
                return;
            }
        } else {
            categories.remove(&FeedbackCategory::NotAnalysed);
        }

        let messages = categories.entry(category).or_default();
        if !messages.contains(&message) {
            messages.push(message);
        }
    }

    pub fn matched(&mut self, entity: EntityRef, message: impl Into<String>) {
        self.add(entity, FeedbackCategory::Match, message);
    }

    pub fn mismatch(&mut self, entity: EntityRef, message: impl Into<String>) {
        self.add(entity, FeedbackCategory::Mismatch, message);
    }

    pub fn info(&mut self, entity: EntityRef, message: impl Into<String>) {
        self.add(entity, FeedbackCategory::Info, message);
    }

    /// Add a free-form pattern-level note
    pub fn add_note(&mut self, note: impl Into<String>) {
        let note = note.into();
        if !self.notes.contains(&note) {
            self.notes.push(note);
        }
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    /// Messages for one (entity, category) key
    pub fn messages(&self, entity: &EntityRef, category: FeedbackCategory) -> &[String] {
        self.entries
            .get(entity)
            .and_then(|categories| categories.get(&category))
            .map(|messages| messages.as_slice())
            .unwrap_or(&[])
    }

    /// All messages of an entity, category order
    pub fn messages_for(&self, entity: &EntityRef) -> Vec<(FeedbackCategory, &str)> {
        self.entries
            .get(entity)
            .map(|categories| {
                categories
                    .iter()
                    .flat_map(|(c, messages)| messages.iter().map(move |m| (*c, m.as_str())))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has(&self, entity: &EntityRef, category: FeedbackCategory) -> bool {
        !self.messages(entity, category).is_empty()
    }

    pub fn categories(&self, entity: &EntityRef) -> Vec<FeedbackCategory> {
        self.entries
            .get(entity)
            .map(|categories| categories.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityRef> {
        self.entries.keys()
    }

    /// Entities holding at least one message of `category`
    pub fn entities_with(&self, category: FeedbackCategory) -> Vec<&EntityRef> {
        self.entries
            .iter()
            .filter(|(_, categories)| categories.contains_key(&category))
            .map(|(entity, _)| entity)
            .collect()
    }

    /// Number of entities holding `category`
    pub fn count(&self, category: FeedbackCategory) -> usize {
        self.entities_with(category).len()
    }

    pub fn records(&self) -> Vec<FeedbackRecord<'_>> {
        self.entries
            .iter()
            .flat_map(|(entity, categories)| {
                categories.iter().map(move |(category, messages)| FeedbackRecord {
                    entity,
                    category: *category,
                    messages: messages.as_slice(),
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.notes.is_empty()
    }

    /// Merge another Feedback into this one, honouring the NOT_ANALYSED rule
    pub fn merge(&mut self, other: Feedback) {
        for (entity, categories) in other.entries {
            for (category, messages) in categories {
                for message in messages {
                    self.add(entity.clone(), category, message);
                }
            }
        }
        for note in other.notes {
            self.add_note(note);
        }
    }

    /// Format all feedback for display
    pub fn format_all(&self) -> String {
        let mut output = String::new();

        for (entity, categories) in &self.entries {
            output.push_str(&format!("{}\n", entity));
            for (category, messages) in categories {
                for message in messages {
                    output.push_str(&format!("  [{}] {}\n", category, message));
                }
            }
        }

        if !self.notes.is_empty() {
            output.push_str("\nNotes:\n");
            for note in &self.notes {
                output.push_str(&format!("  - {}\n", note));
            }
        }

        output
    }
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_all())
    }
}

impl Serialize for Feedback {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Feedback", 2)?;
        state.serialize_field("entries", &self.records())?;
        state.serialize_field("notes", &self.notes)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_replaces_not_analysed() {
        let mut feedback = Feedback::new();
        let entity = EntityRef::node("a");
        feedback.seed(entity.clone());
        assert!(feedback.has(&entity, FeedbackCategory::NotAnalysed));

        feedback.info(entity.clone(), "Types analysed");
        assert!(!feedback.has(&entity, FeedbackCategory::NotAnalysed));
        assert!(feedback.has(&entity, FeedbackCategory::Info));

        // Re-seeding an analysed entity is a no-op
        feedback.seed(entity.clone());
        assert!(!feedback.has(&entity, FeedbackCategory::NotAnalysed));
    }

    #[test]
    fn test_duplicate_messages_kept_once() {
        let mut feedback = Feedback::new();
        let entity = EntityRef::relation("r");
        feedback.mismatch(entity.clone(), "Unexpected cardinality (2,1)");
        feedback.mismatch(entity.clone(), "Unexpected cardinality (2,1)");
        assert_eq!(feedback.messages(&entity, FeedbackCategory::Mismatch).len(), 1);
    }

    #[test]
    fn test_merge_respects_replacement() {
        let mut seeded = Feedback::new();
        seeded.seed(EntityRef::node("a"));
        seeded.seed(EntityRef::node("b"));

        let mut analysed = Feedback::new();
        analysed.matched(EntityRef::node("a"), "Types match role 'Subject'");
        analysed.add_note("Observer notifies on state change");

        seeded.merge(analysed);
        assert_eq!(seeded.categories(&EntityRef::node("a")), vec![FeedbackCategory::Match]);
        assert_eq!(
            seeded.categories(&EntityRef::node("b")),
            vec![FeedbackCategory::NotAnalysed]
        );
        assert_eq!(seeded.notes().len(), 1);
    }

    #[test]
    fn test_serialize_records() {
        let mut feedback = Feedback::new();
        feedback.info(EntityRef::node("a"), "analysed");
        let json = serde_json::to_value(&feedback).unwrap();
        assert_eq!(json["entries"][0]["category"], "INFO");
        assert_eq!(json["entries"][0]["entity"]["kind"], "node");
    }
}
