//! Relation rules
//!
//! Type compatibility pairs every property the template requires with a
//! property of the candidate. Cardinalities are only compared once that
//! pairing exists; a failed pairing leaves no cardinality feedback at all.

use crate::error::{DetectError, Result};
use crate::graph::{EntityRef, Feedback, Relation, RelationProperty, RelationType};

use super::{Comparator, Verdict};

/// Closed set of relation comparison rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationRule {
    /// Every template type is carried by the candidate; multi-child
    /// inheritance on the template accepts plain inheritance
    TypesCompatible,
    /// Every template type is carried by the candidate verbatim
    TypesStrict,
    /// Cardinalities of each paired property are equal
    Cardinality,
}

impl RelationRule {
    /// Map a `relation` scope (topic, operator) pair to a rule
    pub fn resolve(topic: &str, operator: &str) -> Option<Self> {
        match (topic, operator) {
            ("types", "compatible") => Some(Self::TypesCompatible),
            ("types", "equal") => Some(Self::TypesStrict),
            ("cardinality", "equal") => Some(Self::Cardinality),
            _ => None,
        }
    }
}

/// Pair each template property with a candidate property.
///
/// Exact type matches win over the multi-child inheritance exception. Returns
/// the first template type that found no partner on failure.
pub fn pair_properties<'a>(
    system: &'a Relation,
    pattern: &'a Relation,
    strict: bool,
) -> std::result::Result<Vec<(&'a RelationProperty, &'a RelationProperty)>, RelationType> {
    let mut pairs = Vec::with_capacity(pattern.properties.len());
    for required in &pattern.properties {
        let partner = system.property(required.relation_type).or_else(|| {
            if strict {
                None
            } else {
                system
                    .properties
                    .iter()
                    .find(|p| required.relation_type.accepts(p.relation_type))
            }
        });
        match partner {
            Some(found) => pairs.push((found, required)),
            None => return Err(required.relation_type),
        }
    }
    Ok(pairs)
}

impl Comparator<Relation> for RelationRule {
    fn compare(&self, system: &Relation, pattern: &Relation, feedback: &mut Feedback) -> Result<Verdict> {
        if pattern.properties.is_empty() {
            return Err(DetectError::malformed(
                &pattern.id,
                "pattern relation requires no relation type",
            ));
        }

        let entity = EntityRef::relation(system.id.clone());
        let label = pattern.label();

        match self {
            Self::TypesCompatible | Self::TypesStrict => {
                feedback.info(
                    entity.clone(),
                    format!("Relation types analysed against pattern relation '{}'", label),
                );
                match pair_properties(system, pattern, *self == Self::TypesStrict) {
                    Ok(_) => {
                        feedback.matched(entity, format!("Relation types match pattern relation '{}'", label));
                        Ok(Verdict::Compatible)
                    }
                    Err(missing) => {
                        feedback.mismatch(
                            entity,
                            format!(
                                "Relation type '{}' required by pattern relation '{}' is missing (found: {})",
                                missing,
                                label,
                                system.type_list()
                            ),
                        );
                        Ok(Verdict::Incompatible)
                    }
                }
            }

            Self::Cardinality => {
                let Ok(pairs) = pair_properties(system, pattern, false) else {
                    return Ok(Verdict::Incompatible);
                };

                feedback.info(
                    entity.clone(),
                    format!("Cardinalities analysed against pattern relation '{}'", label),
                );

                let mut verdict = Verdict::Compatible;
                for (found, required) in pairs {
                    if found.cardinalities() != required.cardinalities() {
                        feedback.mismatch(
                            entity.clone(),
                            format!(
                                "Unexpected cardinality {} for '{}', pattern relation '{}' expects {}",
                                found.cardinality_label(),
                                found.relation_type,
                                label,
                                required.cardinality_label()
                            ),
                        );
                        verdict = Verdict::Incompatible;
                    }
                }
                if verdict.is_compatible() {
                    feedback.matched(entity, format!("Cardinalities match pattern relation '{}'", label));
                }
                Ok(verdict)
            }
        }
    }

    fn checks_kind(&self) -> bool {
        matches!(self, Self::TypesCompatible | Self::TypesStrict)
    }

    fn needs_kind_match(&self) -> bool {
        *self == Self::Cardinality
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::{default_relation_comparator, CompoundComparator};
    use crate::graph::{Cardinality, FeedbackCategory};

    fn implements(id: &str, left: u32, right: u32) -> Relation {
        Relation::new(id, "a", "b").with_property(
            RelationProperty::new(RelationType::Realization)
                .with_cardinalities(Cardinality::exactly(left), Cardinality::exactly(right)),
        )
    }

    fn has_cardinality_info(feedback: &Feedback, id: &str) -> bool {
        feedback
            .messages(&EntityRef::relation(id), FeedbackCategory::Info)
            .iter()
            .any(|m| m.starts_with("Cardinalities analysed"))
    }

    #[test]
    fn test_cardinality_mismatch_names_unexpected_value() {
        let pattern = implements("p", 1, 1);
        let system = implements("s", 2, 1);

        let mut feedback = Feedback::new();
        let verdict = default_relation_comparator().compare(&system, &pattern, &mut feedback).unwrap();
        assert_eq!(verdict, Verdict::Incompatible);

        let mismatch = feedback.messages(&EntityRef::relation("s"), FeedbackCategory::Mismatch);
        assert!(mismatch.iter().any(|m| m.contains("(2,1)")));
        assert!(has_cardinality_info(&feedback, "s"));
    }

    #[test]
    fn test_type_mismatch_suppresses_cardinality_info() {
        let pattern = implements("p", 1, 1);
        let system = Relation::new("s", "a", "b").with_type(RelationType::Association);

        let mut feedback = Feedback::new();
        let verdict = default_relation_comparator().compare(&system, &pattern, &mut feedback).unwrap();
        assert_eq!(verdict, Verdict::Incompatible);
        assert!(!has_cardinality_info(&feedback, "s"));
        assert!(feedback.has(&EntityRef::relation("s"), FeedbackCategory::Info));
    }

    #[test]
    fn test_multi_inheritance_accepts_plain_only_one_way() {
        let multi = Relation::new("m", "a", "b").with_type(RelationType::InheritanceMulti);
        let plain = Relation::new("i", "a", "b").with_type(RelationType::Inheritance);

        let mut feedback = Feedback::new();
        let chain = default_relation_comparator();
        assert!(chain.compare(&plain, &multi, &mut feedback).unwrap().is_compatible());
        assert!(!chain.compare(&multi, &plain, &mut feedback).unwrap().is_compatible());
        assert!(!RelationRule::TypesStrict.compare(&plain, &multi, &mut feedback).unwrap().is_compatible());
    }

    #[test]
    fn test_strict_type_rule_gates_cardinality_anywhere_in_chain() {
        let pattern = Relation::new("e", "a", "b").with_type(RelationType::InheritanceMulti);
        let system = Relation::new("s", "a", "b").with_type(RelationType::Inheritance);
        let chain = CompoundComparator::with(vec![
            RelationRule::TypesCompatible,
            RelationRule::Cardinality,
            RelationRule::TypesStrict,
        ]);

        let mut feedback = Feedback::new();
        let verdict = chain.compare(&system, &pattern, &mut feedback).unwrap();
        assert_eq!(verdict, Verdict::Incompatible);
        assert!(feedback.has(&EntityRef::relation("s"), FeedbackCategory::Mismatch));
        assert!(!has_cardinality_info(&feedback, "s"));
    }

    #[test]
    fn test_system_may_carry_extra_properties() {
        let pattern = Relation::new("p", "a", "b").with_type(RelationType::Inheritance);
        let system = Relation::new("s", "a", "b")
            .with_type(RelationType::Inheritance)
            .with_type(RelationType::OverridesMethod);
        let mut feedback = Feedback::new();
        assert!(default_relation_comparator().compare(&system, &pattern, &mut feedback).unwrap().is_compatible());
    }

    #[test]
    fn test_untyped_pattern_relation_is_data_error() {
        let pattern = Relation::new("p", "a", "b");
        let system = implements("s", 1, 1);
        let mut feedback = Feedback::new();
        assert!(matches!(
            RelationRule::TypesCompatible.compare(&system, &pattern, &mut feedback),
            Err(DetectError::MalformedPattern { .. })
        ));
    }
}
