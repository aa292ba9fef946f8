use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::collections::BTreeSet;

use product_graph::model::constants::*;
use product_graph::{ClosureReasoner, Edge, Identifier, ModelConfiguration, QueryOptions, QuerySynthesizer, Relationship};
use terminology_sdk::ConcreteValue;

fn id(n: usize) -> Identifier {
    Identifier::real(n.to_string())
}

/// `packs` packages, each containing a product that sits under a three level is-a chain
fn pack_edges(packs: usize) -> BTreeSet<Edge> {
    let mut edges = BTreeSet::new();
    for p in 0..packs {
        let base = p * 10;
        edges.insert(Edge::is_a(id(base), id(base + 1)));
        edges.insert(Edge::is_a(id(base + 1), id(base + 2)));
        edges.insert(Edge::contains(id(base), id(base + 5)));
        edges.insert(Edge::is_a(id(base + 5), id(base + 6)));
        edges.insert(Edge::is_a(id(base + 6), id(base + 7)));
        edges.insert(Edge::contains(id(base + 2), id(base + 7)));
    }
    edges
}

/// Benchmark closure over graphs of increasing pack count
fn bench_closure(c: &mut Criterion) {
    let mut group = c.benchmark_group("closure");
    let reasoner = ClosureReasoner::new();

    for packs in [1, 4, 16].iter() {
        let edges = pack_edges(*packs);
        group.bench_with_input(BenchmarkId::from_parameter(packs), packs, |b, _| {
            b.iter(|| {
                let inferred = reasoner.materialize(&edges);
                criterion::black_box(inferred.len());
            });
        });
    }
    group.finish();
}

/// Benchmark query synthesis for products with more ingredients
fn bench_query_synthesis(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_synthesis");
    let model = ModelConfiguration::amt();
    let synthesizer = QuerySynthesizer::new(&model);
    let refsets = vec![MPUU_REFSET_ID.to_string()];

    for ingredients in [1u32, 5, 20].iter() {
        let mut relationships = vec![
            Relationship::is_a(Identifier::real(MEDICINAL_PRODUCT)),
            Relationship::to_concept(HAS_MANUFACTURED_DOSE_FORM, Identifier::real("385055001"), 0),
        ];
        for group_id in 1..=*ingredients {
            let substance = Identifier::real(format!("{}", 372687004 + group_id));
            relationships.push(Relationship::to_concept(HAS_ACTIVE_INGREDIENT, substance.clone(), group_id));
            relationships.push(Relationship::to_concept(HAS_BOSS, substance, group_id));
            relationships.push(Relationship::to_value(
                HAS_TOTAL_QUANTITY_VALUE,
                ConcreteValue::decimal("500"),
                group_id,
            ));
            relationships.push(Relationship::to_concept(HAS_TOTAL_QUANTITY_UNIT, Identifier::real(UNIT_MG), group_id));
        }

        group.bench_with_input(BenchmarkId::from_parameter(ingredients), ingredients, |b, _| {
            b.iter(|| {
                let ecl = synthesizer.build(&relationships, &refsets, QueryOptions::default());
                criterion::black_box(ecl.map(|e| e.len()).unwrap_or_default());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_closure, bench_query_synthesis);
criterion_main!(benches);
