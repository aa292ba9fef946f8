//! Product graph container
//!
//! `ProductGraph` is the single-owner result of one compilation run.
//! Resolution tasks hand their nodes back through a join and only the
//! owning flow inserts them; closure runs once every task has joined.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::info;

use super::closure::ClosureReasoner;
use super::edge::{Edge, EdgeLabel};
use super::node::Node;
use super::types::Identifier;
use crate::error::{CompilerError, CompilerResult};

/// Nodes, edges and subjects for one compilation run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductGraph {
    nodes: IndexMap<Identifier, Node>,
    edges: BTreeSet<Edge>,
    subjects: BTreeSet<Identifier>,
}

impl ProductGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node; re-adding the same id under the same label is a no-op
    pub fn add_node(&mut self, node: Node) -> CompilerResult<()> {
        if let Some(existing) = self.nodes.get(&node.concept_id) {
            if existing.label != node.label {
                return Err(CompilerError::ConflictingNode {
                    id: node.concept_id.to_string(),
                    existing: existing.label.clone(),
                    incoming: node.label,
                });
            }
            return Ok(());
        }
        self.nodes.insert(node.concept_id.clone(), node);
        Ok(())
    }

    pub fn add_edge(&mut self, source: &Identifier, target: &Identifier, label: EdgeLabel) {
        self.insert_edge(Edge::new(source.clone(), target.clone(), label));
    }

    pub fn insert_edge(&mut self, edge: Edge) -> bool {
        self.edges.insert(edge)
    }

    /// Merge an inner graph's nodes and edges; its subjects are not carried over
    pub fn merge(&mut self, other: ProductGraph) -> CompilerResult<()> {
        for (_, node) in other.nodes {
            self.add_node(node)?;
        }
        self.edges.extend(other.edges);
        Ok(())
    }

    pub fn node(&self, id: &Identifier) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: &Identifier) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.values_mut()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edges(&self) -> &BTreeSet<Edge> {
        &self.edges
    }

    pub fn subjects(&self) -> impl Iterator<Item = &Node> {
        self.subjects.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn add_subject(&mut self, id: &Identifier) {
        self.subjects.insert(id.clone());
    }

    /// Make `id` the only subject
    pub fn set_single_subject(&mut self, id: &Identifier) -> CompilerResult<()> {
        if !self.subjects.is_empty() && !(self.subjects.len() == 1 && self.subjects.contains(id)) {
            return Err(CompilerError::Validation(format!(
                "subject already set to {}, cannot set to {}",
                join_ids(self.subjects.iter()),
                id
            )));
        }
        self.subjects.insert(id.clone());
        Ok(())
    }

    pub fn single_subject(&self) -> CompilerResult<&Node> {
        let subjects: Vec<&Node> = self.subjects().collect();
        match subjects.as_slice() {
            [subject] => Ok(*subject),
            _ => Err(CompilerError::Validation(format!(
                "expected 1 subject but found {}",
                join_ids(self.subjects.iter())
            ))),
        }
    }

    /// Leaf package nodes with no incoming edges
    pub fn calculate_subject(&mut self, leaf_package_label: &str, single: bool) -> CompilerResult<()> {
        let targets: BTreeSet<&Identifier> = self.edges.iter().map(|e| &e.target).collect();
        let subjects: BTreeSet<Identifier> = self
            .nodes
            .values()
            .filter(|n| n.label == leaf_package_label && !targets.contains(&n.concept_id))
            .map(|n| n.concept_id.clone())
            .collect();
        if single && subjects.len() != 1 {
            return Err(CompilerError::Validation(format!(
                "product model must have exactly one {} node with no incoming edges, found {}",
                leaf_package_label,
                join_ids(subjects.iter())
            )));
        }
        self.subjects = subjects;
        Ok(())
    }

    pub fn nodes_with_label<'a>(&'a self, label: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.nodes.values().filter(move |n| n.label == label)
    }

    pub fn single_concept_with_label(&self, label: &str) -> CompilerResult<&Node> {
        let found: Vec<&Node> = self.nodes.values().filter(|n| n.label == label).collect();
        match found.as_slice() {
            [node] => Ok(*node),
            _ => Err(CompilerError::Validation(format!(
                "expected 1 {} but found {}",
                label,
                found.iter().map(|n| n.id_and_fsn()).collect::<Vec<_>>().join(", ")
            ))),
        }
    }

    /// Apply the closure rules to a fixed point
    pub fn close(&mut self, reasoner: &ClosureReasoner) -> usize {
        reasoner.reason(self)
    }

    /// Replace node ids, relationship destinations, edges and subjects found in `mapping`
    pub fn rewrite_identifiers(&mut self, mapping: &HashMap<Identifier, Identifier>) {
        if mapping.is_empty() {
            return;
        }
        let nodes = std::mem::take(&mut self.nodes);
        self.nodes = nodes
            .into_iter()
            .map(|(_, mut node)| {
                node.rewrite_identifiers(mapping);
                (node.concept_id.clone(), node)
            })
            .collect();
        let lookup = |id: &Identifier| mapping.get(id).cloned().unwrap_or_else(|| id.clone());
        self.edges = self
            .edges
            .iter()
            .map(|e| Edge::new(lookup(&e.source), lookup(&e.target), e.label))
            .collect();
        self.subjects = self.subjects.iter().map(lookup).collect();
    }

    /// Collapse new concepts with identical axioms into the first of them
    pub fn deduplicate_new_nodes(&mut self) -> usize {
        let mut survivors: Vec<Identifier> = Vec::new();
        let mut mapping: HashMap<Identifier, Identifier> = HashMap::new();

        for node in self.nodes.values().filter(|n| n.is_new_concept()) {
            let Some(proposal) = node.new_concept_details.as_ref() else {
                continue;
            };
            let duplicate_of = survivors
                .iter()
                .find(|id| {
                    self.nodes.get(*id).map_or(false, |n| {
                        n.label == node.label
                            && n.new_concept_details
                                .as_ref()
                                .map_or(false, |p| p.axiom.same_relationships(&proposal.axiom))
                    })
                })
                .cloned();
            match duplicate_of {
                Some(survivor) => {
                    mapping.insert(node.concept_id.clone(), survivor);
                }
                None => survivors.push(node.concept_id.clone()),
            }
        }

        if mapping.is_empty() {
            return 0;
        }

        for (duplicate, survivor) in &mapping {
            if let Some(removed) = self.nodes.shift_remove(duplicate) {
                if let Some(kept) = self.nodes.get_mut(survivor) {
                    merge_properties(kept, removed);
                }
            }
        }
        let removed = mapping.len();
        self.rewrite_identifiers(&mapping);
        info!("Merged {} duplicate new concepts", removed);
        removed
    }
}

fn merge_properties(kept: &mut Node, removed: Node) {
    for property in removed.non_defining_properties {
        if !kept.non_defining_properties.contains(&property) {
            kept.non_defining_properties.push(property);
        }
    }
    if let (Some(target), Some(source)) = (kept.new_concept_details.as_mut(), removed.new_concept_details) {
        for property in source.non_defining_properties {
            if !target.non_defining_properties.contains(&property) {
                target.non_defining_properties.push(property);
            }
        }
        for member in source.refset_members {
            if !target.refset_members.contains(&member) {
                target.refset_members.push(member);
            }
        }
    }
}

fn join_ids<'a>(ids: impl Iterator<Item = &'a Identifier>) -> String {
    ids.map(|id| id.to_string()).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::axiom::{Axiom, Relationship};
    use crate::graph::node::NewConceptProposal;
    use crate::model::ModelLevelType;
    use terminology_sdk::{ConceptSummary, DefinitionStatus};

    fn existing(id: &str, label: &str) -> Node {
        Node::existing(
            ConceptSummary::new(id, format!("{} (product)", id), id, DefinitionStatus::FullyDefined),
            label,
            ModelLevelType::MedicinalProduct,
        )
    }

    fn proposed(id: i64, label: &str, dest: &str) -> Node {
        let axiom = Axiom::new(
            DefinitionStatus::FullyDefined,
            vec![Relationship::is_a(Identifier::real(dest))],
        );
        Node::proposed(
            NewConceptProposal::new(Identifier::Placeholder(id), axiom, "clinical drug"),
            label,
            ModelLevelType::ClinicalDrug,
        )
    }

    #[test]
    fn test_add_node_conflict() {
        let mut graph = ProductGraph::new();
        graph.add_node(existing("1", "MP")).unwrap();
        graph.add_node(existing("1", "MP")).unwrap();
        assert_eq!(graph.node_count(), 1);
        let err = graph.add_node(existing("1", "MPUU")).unwrap_err();
        assert!(matches!(err, CompilerError::ConflictingNode { .. }));
    }

    #[test]
    fn test_calculate_subject() {
        let mut graph = ProductGraph::new();
        graph.add_node(existing("10", "CTPP")).unwrap();
        graph.add_node(existing("11", "CTPP")).unwrap();
        graph.add_node(existing("12", "TPP")).unwrap();
        graph.add_edge(&Identifier::real("10"), &Identifier::real("11"), EdgeLabel::Contains);
        graph.add_edge(&Identifier::real("10"), &Identifier::real("12"), EdgeLabel::IsA);
        graph.calculate_subject("CTPP", true).unwrap();
        assert_eq!(graph.single_subject().unwrap().concept_id, Identifier::real("10"));
    }

    #[test]
    fn test_single_concept_with_label_outlives_label() {
        let mut graph = ProductGraph::new();
        graph.add_node(existing("10", "MP")).unwrap();
        graph.add_node(existing("11", "MPUU")).unwrap();
        let node = {
            let label = String::from("MP");
            graph.single_concept_with_label(&label).unwrap()
        };
        assert_eq!(node.concept_id, Identifier::real("10"));
        assert!(graph.single_concept_with_label("TPP").is_err());
    }

    #[test]
    fn test_deduplicate_new_nodes_rewrites_edges() {
        let mut graph = ProductGraph::new();
        graph.add_node(existing("10", "TPP")).unwrap();
        graph.add_node(proposed(-2, "MPUU", "763158003")).unwrap();
        graph.add_node(proposed(-3, "MPUU", "763158003")).unwrap();
        graph.add_edge(&Identifier::real("10"), &Identifier::Placeholder(-3), EdgeLabel::Contains);
        graph.add_subject(&Identifier::Placeholder(-3));

        assert_eq!(graph.deduplicate_new_nodes(), 1);
        assert_eq!(graph.node_count(), 2);
        assert!(graph
            .edges()
            .contains(&Edge::contains(Identifier::real("10"), Identifier::Placeholder(-2))));
        assert_eq!(graph.single_subject().unwrap().concept_id, Identifier::Placeholder(-2));
    }
}
