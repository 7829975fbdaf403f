//! Node rules

use crate::error::{DetectError, Result};
use crate::graph::{EntityRef, Feedback, ModifierKind, Node};

use super::{Comparator, Verdict};

/// Closed set of node comparison rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRule {
    /// Pattern role tags must be a subset of the candidate's
    TypesSubset,
    /// Role tag sets must be equal
    TypesEqual,
    /// Visibility must be equal; the template must state one
    Visibility,
    /// Modifier must be equal; the template must state it
    Modifier(ModifierKind),
    /// Candidate declares at least as many attributes as the template
    AttributeCount,
    /// Candidate declares at least as many operations as the template
    OperationCount,
}

impl NodeRule {
    /// Map a `node` scope (topic, operator) pair to a rule
    pub fn resolve(topic: &str, operator: &str) -> Option<Self> {
        match (topic, operator) {
            ("types", "subset") => Some(Self::TypesSubset),
            ("types", "equal") => Some(Self::TypesEqual),
            ("visibility", "equal") => Some(Self::Visibility),
            ("attributes", "at_least") => Some(Self::AttributeCount),
            ("operations", "at_least") => Some(Self::OperationCount),
            (modifier, "equal") => ModifierKind::from_name(modifier).map(Self::Modifier),
            _ => None,
        }
    }
}

impl Comparator<Node> for NodeRule {
    fn compare(&self, system: &Node, pattern: &Node, feedback: &mut Feedback) -> Result<Verdict> {
        let entity = EntityRef::node(system.id.clone());
        let role = pattern.label();

        let verdict = match self {
            Self::TypesSubset => {
                feedback.info(entity.clone(), format!("Types analysed against role '{}'", role));
                match pattern.types.iter().find(|t| !system.types.contains(t)) {
                    Some(missing) => {
                        feedback.mismatch(
                            entity,
                            format!("Type '{}' required by role '{}' is missing", missing, role),
                        );
                        Verdict::Incompatible
                    }
                    None => {
                        feedback.matched(entity, format!("Types match role '{}'", role));
                        Verdict::Compatible
                    }
                }
            }

            Self::TypesEqual => {
                feedback.info(entity.clone(), format!("Types analysed against role '{}'", role));
                if system.types == pattern.types {
                    feedback.matched(entity, format!("Types equal those of role '{}'", role));
                    Verdict::Compatible
                } else {
                    feedback.mismatch(
                        entity,
                        format!(
                            "Types [{}] differ from [{}] required by role '{}'",
                            join(system.types.iter()),
                            join(pattern.types.iter()),
                            role
                        ),
                    );
                    Verdict::Incompatible
                }
            }

            Self::Visibility => {
                let expected = pattern.visibility.ok_or_else(|| {
                    DetectError::malformed(&pattern.id, "visibility is compared but not set")
                })?;
                feedback.info(entity.clone(), format!("Visibility analysed against role '{}'", role));
                match system.visibility {
                    Some(actual) if actual == expected => {
                        feedback.matched(entity, format!("Visibility '{}' matches role '{}'", actual, role));
                        Verdict::Compatible
                    }
                    actual => {
                        let found = actual.map(|v| v.to_string()).unwrap_or_else(|| "unset".to_string());
                        feedback.mismatch(
                            entity,
                            format!("Visibility '{}' differs from '{}' required by role '{}'", found, expected, role),
                        );
                        Verdict::Incompatible
                    }
                }
            }

            Self::Modifier(kind) => {
                let expected = pattern.modifiers.get(*kind).ok_or_else(|| {
                    DetectError::malformed(
                        &pattern.id,
                        format!("modifier '{}' is compared but not set", kind.as_str()),
                    )
                })?;
                feedback.info(
                    entity.clone(),
                    format!("Modifier '{}' analysed against role '{}'", kind.as_str(), role),
                );
                // An unstated modifier on the system side reads as false
                let actual = system.modifiers.get(*kind).unwrap_or(false);
                if actual == expected {
                    feedback.matched(
                        entity,
                        format!("Modifier '{}' = {} matches role '{}'", kind.as_str(), actual, role),
                    );
                    Verdict::Compatible
                } else {
                    feedback.mismatch(
                        entity,
                        format!(
                            "Modifier '{}' is {} but role '{}' requires {}",
                            kind.as_str(),
                            actual,
                            role,
                            expected
                        ),
                    );
                    Verdict::Incompatible
                }
            }

            Self::AttributeCount => count_rule(
                feedback,
                entity,
                "attributes",
                role,
                system.attributes.len(),
                pattern.attributes.len(),
            ),

            Self::OperationCount => count_rule(
                feedback,
                entity,
                "operations",
                role,
                system.operations.len(),
                pattern.operations.len(),
            ),
        };

        Ok(verdict)
    }
}

fn count_rule(
    feedback: &mut Feedback,
    entity: EntityRef,
    what: &str,
    role: &str,
    actual: usize,
    required: usize,
) -> Verdict {
    feedback.info(entity.clone(), format!("Number of {} analysed against role '{}'", what, role));
    if actual >= required {
        feedback.matched(
            entity,
            format!("{} {} satisfy the {} required by role '{}'", actual, what, required, role),
        );
        Verdict::Compatible
    } else {
        feedback.mismatch(
            entity,
            format!("Only {} {}, role '{}' requires at least {}", actual, what, role, required),
        );
        Verdict::Incompatible
    }
}

fn join<T: std::fmt::Display>(items: impl Iterator<Item = T>) -> String {
    items.map(|t| t.to_string()).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{FeedbackCategory, NodeType, Visibility};

    #[test]
    fn test_types_subset_names_first_missing_tag() {
        let pattern = Node::new("p", "Observer").with_type(NodeType::Interface);
        let system = Node::new("s", "Logger").with_type(NodeType::ConcreteClass);

        let mut feedback = Feedback::new();
        let verdict = NodeRule::TypesSubset.compare(&system, &pattern, &mut feedback).unwrap();
        assert_eq!(verdict, Verdict::Incompatible);

        let entity = EntityRef::node("s");
        let mismatch = feedback.messages(&entity, FeedbackCategory::Mismatch);
        assert_eq!(mismatch.len(), 1);
        assert!(mismatch[0].contains("interface"));
        assert!(feedback.has(&entity, FeedbackCategory::Info));
    }

    #[test]
    fn test_types_subset_allows_extra_system_tags() {
        let pattern = Node::new("p", "Subject").with_type(NodeType::AbstractClass);
        let system = Node::new("s", "Model")
            .with_type(NodeType::AbstractClass)
            .with_type(NodeType::Interface);
        let mut feedback = Feedback::new();
        assert!(NodeRule::TypesSubset.compare(&system, &pattern, &mut feedback).unwrap().is_compatible());
        assert!(!NodeRule::TypesEqual.compare(&system, &pattern, &mut feedback).unwrap().is_compatible());
    }

    #[test]
    fn test_unset_pattern_modifier_is_data_error() {
        let pattern = Node::new("p", "Root");
        let system = Node::new("s", "Anything").with_modifier(ModifierKind::Root, true);
        let mut feedback = Feedback::new();
        let err = NodeRule::Modifier(ModifierKind::Root)
            .compare(&system, &pattern, &mut feedback)
            .unwrap_err();
        assert!(matches!(err, DetectError::MalformedPattern { .. }));
    }

    #[test]
    fn test_visibility_rule() {
        let pattern = Node::new("p", "Facade").with_visibility(Visibility::Public);
        let public = Node::new("a", "Api").with_visibility(Visibility::Public);
        let hidden = Node::new("b", "Impl");

        let mut feedback = Feedback::new();
        assert!(NodeRule::Visibility.compare(&public, &pattern, &mut feedback).unwrap().is_compatible());
        assert!(!NodeRule::Visibility.compare(&hidden, &pattern, &mut feedback).unwrap().is_compatible());
        assert!(feedback.messages(&EntityRef::node("b"), FeedbackCategory::Mismatch)[0].contains("unset"));
    }

    #[test]
    fn test_resolve_modifier_topics() {
        assert_eq!(NodeRule::resolve("leaf", "equal"), Some(NodeRule::Modifier(ModifierKind::Leaf)));
        assert_eq!(NodeRule::resolve("leaf", "subset"), None);
        assert_eq!(NodeRule::resolve("operations", "at_least"), Some(NodeRule::OperationCount));
    }
}
