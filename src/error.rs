//! Error types for pattern detection

use thiserror::Error;

/// Result type for detection operations
pub type Result<T> = std::result::Result<T, DetectError>;

/// Pattern detection errors
#[derive(Error, Debug)]
pub enum DetectError {
    /// A comparator rule triple that no rule resolves to
    #[error("Unknown comparator rule: scope '{scope}', topic '{topic}', operator '{operator}'")]
    UnknownRule {
        scope: String,
        topic: String,
        operator: String,
    },

    /// The pattern template cannot satisfy a rule's precondition
    #[error("Malformed pattern template at '{entity}': {reason}")]
    MalformedPattern { entity: String, reason: String },

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Relation not found: {0}")]
    RelationNotFound(String),

    #[error("Duplicate node id: {0}")]
    DuplicateNode(String),

    #[error("Duplicate relation id: {0}")]
    DuplicateRelation(String),

    #[error("Relation '{relation}' carries type '{relation_type}' more than once")]
    DuplicateProperty { relation: String, relation_type: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

impl DetectError {
    pub fn unknown_rule(scope: &str, topic: &str, operator: &str) -> Self {
        Self::UnknownRule {
            scope: scope.to_string(),
            topic: topic.to_string(),
            operator: operator.to_string(),
        }
    }

    pub fn malformed(entity: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedPattern {
            entity: entity.into(),
            reason: reason.into(),
        }
    }
}
