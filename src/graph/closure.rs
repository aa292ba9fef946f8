//! Transitive closure of is-a and contains edges
//!
//! Forward chaining to a fixed point over the composition table:
//!
//! | first    | second   | composed |
//! |----------|----------|----------|
//! | contains | contains | contains |
//! | contains | is a     | contains |
//! | is a     | contains | contains |
//! | is a     | is a     | is a     |

use std::collections::BTreeSet;
use tracing::debug;

use super::edge::{Edge, EdgeLabel};
use super::summary::ProductGraph;

/// Edge composition rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositionRule {
    /// contains ∘ contains → contains
    ContainsContains,
    /// contains ∘ is-a → contains
    ContainsIsA,
    /// is-a ∘ contains → contains
    IsAContains,
    /// is-a ∘ is-a → is-a
    IsAIsA,
}

impl CompositionRule {
    fn compose(&self, first: EdgeLabel, second: EdgeLabel) -> Option<EdgeLabel> {
        use EdgeLabel::*;
        match (self, first, second) {
            (CompositionRule::ContainsContains, Contains, Contains) => Some(Contains),
            (CompositionRule::ContainsIsA, Contains, IsA) => Some(Contains),
            (CompositionRule::IsAContains, IsA, Contains) => Some(Contains),
            (CompositionRule::IsAIsA, IsA, IsA) => Some(IsA),
            _ => None,
        }
    }
}

/// Closure reasoner with forward chaining
pub struct ClosureReasoner {
    enabled_rules: Vec<CompositionRule>,
}

impl ClosureReasoner {
    /// Create a reasoner with all rules enabled
    pub fn new() -> Self {
        Self {
            enabled_rules: vec![
                CompositionRule::ContainsContains,
                CompositionRule::ContainsIsA,
                CompositionRule::IsAContains,
                CompositionRule::IsAIsA,
            ],
        }
    }

    /// Create a reasoner with specific rules
    pub fn with_rules(rules: Vec<CompositionRule>) -> Self {
        Self {
            enabled_rules: rules,
        }
    }

    /// Edges implied by `edges` that are not already in it
    pub fn materialize(&self, edges: &BTreeSet<Edge>) -> BTreeSet<Edge> {
        let mut closed = edges.clone();
        loop {
            let mut added = Vec::new();
            for first in &closed {
                for second in &closed {
                    if first.target != second.source {
                        continue;
                    }
                    for rule in &self.enabled_rules {
                        if let Some(label) = rule.compose(first.label, second.label) {
                            let edge = Edge::new(first.source.clone(), second.target.clone(), label);
                            if !closed.contains(&edge) {
                                added.push(edge);
                            }
                        }
                    }
                }
            }
            if added.is_empty() {
                break;
            }
            closed.extend(added);
        }
        closed.difference(edges).cloned().collect()
    }

    /// Add all implied edges to the graph, returning how many were added
    pub fn reason(&self, graph: &mut ProductGraph) -> usize {
        let inferred = self.materialize(graph.edges());
        let count = inferred.len();
        for edge in inferred {
            graph.insert_edge(edge);
        }
        debug!("Closure added {} edges", count);
        count
    }
}

impl Default for ClosureReasoner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::Identifier;

    fn id(n: &str) -> Identifier {
        Identifier::real(n)
    }

    #[test]
    fn test_reasoner_creation() {
        let reasoner = ClosureReasoner::new();
        assert_eq!(reasoner.enabled_rules.len(), 4);
    }

    #[test]
    fn test_contains_then_is_a() {
        let edges: BTreeSet<Edge> = [Edge::contains(id("1"), id("2")), Edge::is_a(id("2"), id("3"))]
            .into_iter()
            .collect();
        let inferred = ClosureReasoner::new().materialize(&edges);
        assert_eq!(inferred.len(), 1);
        assert!(inferred.contains(&Edge::contains(id("1"), id("3"))));
    }

    #[test]
    fn test_custom_rules() {
        let edges: BTreeSet<Edge> = [Edge::is_a(id("1"), id("2")), Edge::is_a(id("2"), id("3"))]
            .into_iter()
            .collect();
        let reasoner = ClosureReasoner::with_rules(vec![CompositionRule::ContainsContains]);
        assert!(reasoner.materialize(&edges).is_empty());
        assert_eq!(ClosureReasoner::new().materialize(&edges).len(), 1);
    }

    #[test]
    fn test_has_product_name_not_composed() {
        let edges: BTreeSet<Edge> = [
            Edge::new(id("1"), id("2"), EdgeLabel::HasProductName),
            Edge::is_a(id("0"), id("1")),
        ]
        .into_iter()
        .collect();
        assert!(ClosureReasoner::new().materialize(&edges).is_empty());
    }
}
