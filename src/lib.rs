//! Pattern Detector
//!
//! Detects design-pattern instances in the class model of a software system by
//! searching for subgraphs isomorphic to pattern templates, where every node and
//! relation pairing is gated by the template's comparator chain.
//!
//! ## Features
//!
//! - **Comparator Gating**: Node and relation pairings pass configurable rule chains
//! - **Per-Entity Feedback**: Every comparison explains itself against the system entity
//! - **Sibling Absorption**: One multi-child inheritance edge binds every compatible child
//! - **Deduplication**: Symmetric mappings collapse to one solution per system-node set
//!
//! ## Architecture
//!
//! ```text
//! SystemGraph ──┐
//!               ├──> IsomorphismSearch ──> MatchingResult { solutions, feedback }
//! PatternGraph ─┘        │
//!   ├─ node chain         ├─ EdgeLocks (one flag per system edge)
//!   └─ relation chain     └─ Feedback (entity -> category -> messages)
//! ```

pub mod compare;
pub mod config;
pub mod error;
pub mod graph;
pub mod search;

pub use compare::{Comparator, CompoundComparator, NodeRule, RelationRule, RuleSpec, Verdict};
pub use config::DetectorConfig;
pub use error::{DetectError, Result};
pub use graph::{
    derive_relations, Cardinality, EntityRef, Feedback, FeedbackCategory, ModelGraph, Node, NodeType,
    PatternGraph, Relation, RelationProperty, RelationType, SystemGraph,
};
pub use search::{detect_all, IsomorphismSearch, MatchingResult, SearchOptions, Solution};
