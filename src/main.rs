use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use product_graph::model::constants::*;
use product_graph::naming::{FsnAndPt, NameGeneratorSpec, NamingResult};
use product_graph::{
    CompilationContext, ConceptRef, CreationSequencer, GraphAssembler, Ingredient, MedicationProductDetails,
    ModelConfiguration, NameGenerationService, NameGenerator, PackageDetails, ProductQuantity, Quantity,
};
use terminology_sdk::{ConceptDraft, DefinitionStatus, InMemoryTerminology};

/// Numbers names instead of calling a real generator
struct NumberingNamer {
    next: AtomicUsize,
}

#[async_trait]
impl NameGenerator for NumberingNamer {
    async fn generate_names(&self, spec: &NameGeneratorSpec) -> NamingResult<FsnAndPt> {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        Ok(FsnAndPt {
            fsn: format!("Demo product {} ({})", n, spec.semantic_tag),
            pt: format!("Demo product {}", n),
        })
    }
}

async fn seed(terminology: &InMemoryTerminology) {
    let concepts = [
        ("21000036101", "Amoxicillin (medicinal product)", DefinitionStatus::FullyDefined),
        ("1001000036102", "Amoxil (product name)", DefinitionStatus::Primitive),
    ];
    for (id, fsn, status) in concepts {
        let pt = fsn.split(" (").next().unwrap_or(fsn);
        let draft = ConceptDraft::new(status, None).with_names(fsn, Some(pt));
        terminology.insert_concept(draft.into_detail(id.to_string())).await;
    }
    terminology.register_rule(|ecl: &str| {
        (ecl.contains(&format!("^{}", MP_REFSET_ID)) && ecl.contains("372687004"))
            .then(|| vec!["21000036101".to_string()])
    });
}

fn amoxil_pack() -> PackageDetails {
    let product = MedicationProductDetails {
        product_name: Some(ConceptRef::labelled("1001000036102", "Amoxil (product name)", "Amoxil")),
        generic_form: Some(ConceptRef::labelled("385055001", "Tablet (basic dose form)", "Tablet")),
        active_ingredients: vec![Ingredient {
            active_ingredient: Some(ConceptRef::labelled("372687004", "Amoxicillin (substance)", "Amoxicillin")),
            basis_of_strength_substance: Some(ConceptRef::new("372687004")),
            total_quantity: Some(Quantity::new("500", ConceptRef::new(UNIT_MG))),
            ..Default::default()
        }],
        ..Default::default()
    };
    PackageDetails {
        product_name: Some(ConceptRef::new("1001000036102")),
        container_type: Some(ConceptRef::labelled("2002000036100", "Blister pack (container)", "Blister pack")),
        contained_products: vec![ProductQuantity {
            value: "20".to_string(),
            unit: ConceptRef::new(UNIT_OF_PRESENTATION),
            product_details: product,
        }],
        ..Default::default()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    println!("Product Graph Compiler v{}", product_graph::version());
    println!("==========================================");
    println!();

    let terminology = Arc::new(InMemoryTerminology::default());
    seed(&terminology).await;

    let naming = NameGenerationService::new(Arc::new(NumberingNamer {
        next: AtomicUsize::new(1),
    }));
    let ctx = CompilationContext::new("MAIN/SNOMEDCT-AU", ModelConfiguration::amt(), terminology.clone())
        .with_naming(naming);

    println!("=== Create: Amoxil 500 mg tablet, 20 blister pack ===");
    let assembler = GraphAssembler::new(ctx.clone());
    let graph = assembler.create(amoxil_pack()).await?;
    for node in graph.nodes() {
        let state = if node.is_new_concept() { "new" } else { "existing" };
        println!(
            "  {:<5} {:<14} {:<8} {}",
            node.label,
            node.concept_id.to_string(),
            state,
            node.fsn().unwrap_or_default()
        );
    }
    println!("  {} edges after closure", graph.edges().len());
    println!();

    println!("=== Commit ===");
    let (committed, report) = CreationSequencer::new(ctx).commit(graph).await?;
    for (placeholder, id) in &report.placeholder_mapping {
        println!("  {:>4} -> {}", placeholder, id);
    }
    println!(
        "  {} concepts created, {} reference set members",
        report.created.len(),
        report.members_created
    );
    let subject = committed.single_subject()?;
    println!("  Subject: {}", subject.id_and_fsn());
    Ok(())
}
