//! Derived Relations
//!
//! Fills in relations the class model implies but does not state: attribute
//! types, operation return types, and overriding along inheritance.

use std::collections::BTreeSet;
use tracing::debug;

use super::{ModelGraph, NodeId, Relation, RelationProperty, RelationType};
use crate::error::Result;

/// Add implied relation properties to `graph`.
///
/// A property lands on the first existing relation between the pair, or on a
/// new `derived:<source>-><target>` relation. Returns the number of properties
/// added; a second run adds none.
pub fn derive_relations(graph: &mut ModelGraph) -> Result<usize> {
    let mut implied: Vec<(NodeId, NodeId, RelationType)> = Vec::new();

    for node in graph.nodes() {
        for attribute in &node.attributes {
            if let Some(target) = attribute.type_ref.as_ref().filter(|t| graph.node(t).is_some()) {
                implied.push((node.id.clone(), target.clone(), RelationType::HasAttribute));
            }
        }
        for operation in &node.operations {
            if let Some(target) = operation.return_type.as_ref().filter(|t| graph.node(t).is_some()) {
                implied.push((node.id.clone(), target.clone(), RelationType::Dependency));
            }
        }
    }

    let overriding: Vec<String> = graph
        .relations()
        .filter(|r| r.has_type(RelationType::Inheritance) || r.has_type(RelationType::Realization))
        .filter(|r| !r.has_type(RelationType::OverridesMethod))
        .filter(|r| shares_operation(graph, &r.source, &r.target))
        .map(|r| r.id.clone())
        .collect();

    let mut added = 0;

    for id in overriding {
        if graph.add_relation_property(&id, RelationProperty::new(RelationType::OverridesMethod))? {
            added += 1;
        }
    }

    for (source, target, relation_type) in implied {
        let existing = graph.relations_between(&source, &target).first().map(|r| r.id.clone());
        match existing {
            Some(id) => {
                if graph.add_relation_property(&id, RelationProperty::new(relation_type))? {
                    added += 1;
                }
            }
            None => {
                let id = format!("derived:{}->{}", source, target);
                graph.add_relation(Relation::new(id, source, target).with_type(relation_type))?;
                added += 1;
            }
        }
    }

    debug!(added, "derived relation properties");
    Ok(added)
}

fn shares_operation(graph: &ModelGraph, source: &str, target: &str) -> bool {
    let (Some(child), Some(parent)) = (graph.node(source), graph.node(target)) else {
        return false;
    };
    let inherited: BTreeSet<&str> = parent.operations.iter().map(|o| o.name.as_str()).collect();
    child.operations.iter().any(|o| inherited.contains(o.name.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Node, NodeType};

    fn observer_model() -> ModelGraph {
        let mut graph = ModelGraph::new();
        graph
            .add_node(
                Node::new("subject", "Subject")
                    .with_type(NodeType::AbstractClass)
                    .with_attribute("observers", Some("observer"))
                    .with_operation("notify", None),
            )
            .unwrap();
        graph
            .add_node(
                Node::new("observer", "Observer")
                    .with_type(NodeType::Interface)
                    .with_operation("update", None),
            )
            .unwrap();
        graph
            .add_node(
                Node::new("display", "Display")
                    .with_type(NodeType::ConcreteClass)
                    .with_operation("update", None)
                    .with_operation("source", Some("subject"))
                    .with_attribute("label", Some("java.lang.String")),
            )
            .unwrap();
        graph
            .add_relation(Relation::new("impl", "display", "observer").with_type(RelationType::Realization))
            .unwrap();
        graph
    }

    #[test]
    fn test_derives_attribute_return_and_override() {
        let mut graph = observer_model();
        let added = derive_relations(&mut graph).unwrap();
        assert_eq!(added, 3);

        let has = graph.relation("derived:subject->observer").unwrap();
        assert!(has.has_type(RelationType::HasAttribute));

        let uses = graph.relation("derived:display->subject").unwrap();
        assert!(uses.has_type(RelationType::Dependency));

        let realization = graph.relation("impl").unwrap();
        assert!(realization.has_type(RelationType::OverridesMethod));
        assert!(realization.has_type(RelationType::Realization));
    }

    #[test]
    fn test_derive_is_idempotent() {
        let mut graph = observer_model();
        derive_relations(&mut graph).unwrap();
        let relations = graph.relation_count();
        assert_eq!(derive_relations(&mut graph).unwrap(), 0);
        assert_eq!(graph.relation_count(), relations);
    }

    #[test]
    fn test_property_joins_existing_relation() {
        let mut graph = ModelGraph::new();
        graph
            .add_node(Node::new("a", "A").with_attribute("peer", Some("b")))
            .unwrap();
        graph.add_node(Node::new("b", "B")).unwrap();
        graph
            .add_relation(Relation::new("assoc", "a", "b").with_type(RelationType::Association))
            .unwrap();

        assert_eq!(derive_relations(&mut graph).unwrap(), 1);
        assert_eq!(graph.relation_count(), 1);
        assert!(graph.relation("assoc").unwrap().has_type(RelationType::HasAttribute));
    }
}
