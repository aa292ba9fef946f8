use std::collections::BTreeSet;

use product_graph::graph::CompositionRule;
use product_graph::{ClosureReasoner, Edge, EdgeLabel, Identifier};

fn id(n: u32) -> Identifier {
    Identifier::real(n.to_string())
}

/// Two packs sharing a subpack, products under a chain of parents
fn pack_edges() -> BTreeSet<Edge> {
    [
        Edge::is_a(id(1), id(2)),
        Edge::is_a(id(2), id(3)),
        Edge::contains(id(1), id(10)),
        Edge::contains(id(4), id(1)),
        Edge::contains(id(5), id(1)),
        Edge::is_a(id(10), id(11)),
        Edge::is_a(id(11), id(12)),
        Edge::contains(id(3), id(12)),
    ]
    .into_iter()
    .collect()
}

fn closed(edges: &BTreeSet<Edge>) -> BTreeSet<Edge> {
    let mut all = edges.clone();
    all.extend(ClosureReasoner::new().materialize(edges));
    all
}

#[test]
fn test_closure_is_idempotent() {
    let once = closed(&pack_edges());
    assert!(ClosureReasoner::new().materialize(&once).is_empty());
    assert_eq!(closed(&once), once);
}

#[test]
fn test_closure_is_closed_under_composition() {
    let all = closed(&pack_edges());
    for first in &all {
        for second in all.iter().filter(|e| e.source == first.target) {
            let composed = match (first.label, second.label) {
                (EdgeLabel::IsA, EdgeLabel::IsA) => EdgeLabel::IsA,
                (EdgeLabel::IsA, EdgeLabel::Contains)
                | (EdgeLabel::Contains, EdgeLabel::IsA)
                | (EdgeLabel::Contains, EdgeLabel::Contains) => EdgeLabel::Contains,
                _ => continue,
            };
            assert!(
                all.contains(&Edge::new(first.source.clone(), second.target.clone(), composed)),
                "missing {} then {}",
                first,
                second
            );
        }
    }
}

#[test]
fn test_closure_never_derives_is_a_through_contains() {
    let all = closed(&pack_edges());
    assert!(all.contains(&Edge::contains(id(4), id(12))));
    assert!(all.contains(&Edge::contains(id(1), id(12))));
    assert!(!all.contains(&Edge::is_a(id(4), id(10))));
    assert!(!all.contains(&Edge::is_a(id(1), id(10))));
}

#[test]
fn test_closure_keeps_original_edges() {
    let edges = pack_edges();
    assert!(edges.is_subset(&closed(&edges)));
    assert!(ClosureReasoner::new().materialize(&edges).is_disjoint(&edges));
}

#[test]
fn test_restricted_rules() {
    let reasoner = ClosureReasoner::with_rules(vec![CompositionRule::IsAIsA]);
    let inferred = reasoner.materialize(&pack_edges());
    assert!(inferred.iter().all(|e| e.label == EdgeLabel::IsA));
    assert!(inferred.contains(&Edge::is_a(id(1), id(3))));
    assert!(inferred.contains(&Edge::is_a(id(10), id(12))));
}

#[test]
fn test_empty_graph_has_empty_closure() {
    assert!(ClosureReasoner::new().materialize(&BTreeSet::new()).is_empty());
}
