use std::sync::Arc;

use product_graph::model::constants::*;
use product_graph::{
    CompilationContext, ConceptResolver, Identifier, ModelConfiguration, ModelLevel, ModelLevelType, NodeRequest,
    NonDefiningProperty, Relationship,
};
use terminology_sdk::{ConceptDraft, ConcreteValue, DefinitionStatus, InMemoryTerminology, RefsetMember};

const AMOXICILLIN: &str = "372687004";

fn level(model: &ModelConfiguration, level_type: ModelLevelType) -> ModelLevel {
    model.level_of_type(level_type).cloned().unwrap()
}

fn mp_relationships() -> Vec<Relationship> {
    vec![
        Relationship::is_a(Identifier::real(MEDICINAL_PRODUCT)),
        Relationship::to_concept(HAS_ACTIVE_INGREDIENT, Identifier::real(AMOXICILLIN), 1),
    ]
}

async fn add(service: &InMemoryTerminology, id: &str, fsn: &str, status: DefinitionStatus) {
    let draft = ConceptDraft::new(status, None).with_names(fsn, None);
    service.insert_concept(draft.into_detail(id.to_string())).await;
}

/// Fully defined concept stating `value` as its other identifying information
async fn add_with_oii(service: &InMemoryTerminology, id: &str, value: &str) {
    let mut detail = ConceptDraft::new(DefinitionStatus::FullyDefined, None)
        .with_names(&format!("Amoxicillin {} (medicinal product)", value), None)
        .into_detail(id.to_string());
    detail.class_axioms.push(terminology_sdk::Axiom {
        axiom_id: None,
        active: true,
        definition_status: DefinitionStatus::FullyDefined,
        module_id: None,
        relationships: vec![terminology_sdk::Relationship::to_value(
            HAS_OTHER_IDENTIFYING_INFORMATION,
            ConcreteValue::string(value),
            0,
        )],
    });
    service.insert_concept(detail).await;
}

fn mp_relationships_with_oii(value: &str) -> Vec<Relationship> {
    let mut relationships = mp_relationships();
    relationships.push(Relationship::to_value(
        HAS_OTHER_IDENTIFYING_INFORMATION,
        ConcreteValue::string(value),
        0,
    ));
    relationships
}

fn resolver(service: Arc<InMemoryTerminology>) -> ConceptResolver {
    ConceptResolver::new(CompilationContext::new("MAIN", ModelConfiguration::amt(), service))
}

#[tokio::test]
async fn test_reuses_fully_defined_match() {
    let service = InMemoryTerminology::default();
    add(&service, "21000036101", "Amoxicillin (medicinal product)", DefinitionStatus::FullyDefined).await;
    service
        .insert_member(RefsetMember::new(MP_REFSET_ID, "21000036101"))
        .await;
    service.register_rule(|ecl: &str| {
        (ecl.contains(AMOXICILLIN) && ecl.contains(&format!("^{}", MP_REFSET_ID)))
            .then(|| vec!["21000036101".to_string()])
    });
    let service = Arc::new(service);
    let model = ModelConfiguration::amt();

    let request = NodeRequest::new(&level(&model, ModelLevelType::MedicinalProduct), mp_relationships())
        .with_refsets(vec![MP_REFSET_ID.to_string()])
        .with_refset_members(vec![NonDefiningProperty::marker(MP_REFSET_ID)]);
    let node = resolver(service.clone()).resolve(request).await.unwrap();

    assert_eq!(node.concept_id, Identifier::real("21000036101"));
    assert!(node.new_concept_details.is_none());
    assert_eq!(node.non_defining_properties.len(), 1);
    assert_eq!(service.executed_queries().await.len(), 1);
}

#[tokio::test]
async fn test_no_match_proposes_defined_concept() {
    let service = Arc::new(InMemoryTerminology::default());
    let model = ModelConfiguration::amt();
    let request = NodeRequest::new(&level(&model, ModelLevelType::MedicinalProduct), mp_relationships())
        .with_refsets(vec![MP_REFSET_ID.to_string()]);
    let node = resolver(service.clone()).resolve(request).await.unwrap();

    assert!(node.is_new_concept());
    assert!(node.concept_id.is_placeholder());
    let proposal = node.new_concept_details.unwrap();
    assert_eq!(proposal.axiom.definition_status, DefinitionStatus::FullyDefined);
    assert_eq!(proposal.module_id.as_deref(), Some(SCT_AU_MODULE));
    // scoped query, then the broadened retry
    let queries = service.executed_queries().await;
    assert_eq!(queries.len(), 2);
    assert!(queries[0].contains(MP_REFSET_ID));
    assert!(!queries[1].contains(MP_REFSET_ID));
}

#[tokio::test]
async fn test_fallback_broadening_finds_unscoped_match() {
    let service = InMemoryTerminology::default();
    add(&service, "31000036102", "Amoxicillin (medicinal product)", DefinitionStatus::FullyDefined).await;
    service.register_rule(|ecl: &str| {
        (ecl.contains(AMOXICILLIN) && !ecl.contains('^')).then(|| vec!["31000036102".to_string()])
    });
    let service = Arc::new(service);
    let model = ModelConfiguration::amt();

    let request = NodeRequest::new(&level(&model, ModelLevelType::MedicinalProduct), mp_relationships())
        .with_refsets(vec![MP_REFSET_ID.to_string()]);
    let node = resolver(service.clone()).resolve(request.clone()).await.unwrap();
    assert_eq!(node.concept_id, Identifier::real("31000036102"));

    let enforced = resolver(service.clone())
        .resolve(request.enforce_refsets(true))
        .await
        .unwrap();
    assert!(enforced.is_new_concept());
}

#[tokio::test]
async fn test_primitive_match_still_proposes() {
    let service = InMemoryTerminology::default();
    add(&service, "41000036103", "Amoxicillin (medicinal product)", DefinitionStatus::Primitive).await;
    service.register_rule(|ecl: &str| ecl.contains(AMOXICILLIN).then(|| vec!["41000036103".to_string()]));
    let service = Arc::new(service);
    let model = ModelConfiguration::amt();

    let node = resolver(service)
        .resolve(NodeRequest::new(&level(&model, ModelLevelType::MedicinalProduct), mp_relationships()))
        .await
        .unwrap();
    assert!(node.is_new_concept());
    assert_eq!(node.concept_options.len(), 1);
    assert_eq!(
        node.new_concept_details.unwrap().axiom.definition_status,
        DefinitionStatus::Primitive
    );
}

#[tokio::test]
async fn test_look_up_node_by_level_query() {
    let service = InMemoryTerminology::default();
    add(&service, "201", "Amoxicillin 500 mg tablet (medicinal product unit of use)", DefinitionStatus::FullyDefined)
        .await;
    service
        .register_query(format!("(>>200) AND (^{})", MPUU_REFSET_ID), &["201"])
        .await;
    let model = ModelConfiguration::amt();

    let node = resolver(Arc::new(service))
        .look_up_node("200", &level(&model, ModelLevelType::ClinicalDrug))
        .await
        .unwrap();
    assert_eq!(node.concept_id, Identifier::real("201"));
    assert_eq!(node.label, "MPUU");
}

#[tokio::test]
async fn test_cancelled_context_stops_resolution() {
    let service = Arc::new(InMemoryTerminology::default());
    let ctx = CompilationContext::new("MAIN", ModelConfiguration::amt(), service.clone());
    ctx.cancel();
    let model = ModelConfiguration::amt();
    let err = ConceptResolver::new(ctx)
        .resolve(NodeRequest::new(&level(&model, ModelLevelType::MedicinalProduct), mp_relationships()))
        .await
        .unwrap_err();
    assert!(matches!(err, product_graph::CompilerError::Cancelled));
    assert!(service.executed_queries().await.is_empty());
}

#[tokio::test]
async fn test_oii_exclusion_makes_proposal_primitive() {
    let service = InMemoryTerminology::default();
    add_with_oii(&service, "41", "Y").await;
    service.register_rule(|ecl: &str| ecl.contains(AMOXICILLIN).then(|| vec!["41".to_string()]));
    let service = Arc::new(service);
    let model = ModelConfiguration::amt();

    let request = NodeRequest::new(&level(&model, ModelLevelType::MedicinalProduct), mp_relationships_with_oii("X"))
        .with_refsets(vec![MP_REFSET_ID.to_string()]);
    let node = resolver(service.clone()).resolve(request).await.unwrap();

    assert!(node.is_new_concept());
    assert!(node.concept_options.is_empty());
    assert_eq!(
        node.new_concept_details.unwrap().axiom.definition_status,
        DefinitionStatus::Primitive
    );
    assert_eq!(service.executed_queries().await.len(), 2);
}

#[tokio::test]
async fn test_oii_filter_applies_to_broadened_results() {
    let service = InMemoryTerminology::default();
    add_with_oii(&service, "41", "Y").await;
    add_with_oii(&service, "42", "X").await;
    service.register_rule(|ecl: &str| {
        if !ecl.contains(AMOXICILLIN) {
            None
        } else if ecl.contains(&format!("^{}", MP_REFSET_ID)) {
            Some(vec!["41".to_string()])
        } else {
            Some(vec!["41".to_string(), "42".to_string()])
        }
    });
    let service = Arc::new(service);
    let model = ModelConfiguration::amt();

    let request = NodeRequest::new(&level(&model, ModelLevelType::MedicinalProduct), mp_relationships_with_oii("X"))
        .with_refsets(vec![MP_REFSET_ID.to_string()]);
    let node = resolver(service.clone()).resolve(request).await.unwrap();

    assert_eq!(node.concept_id, Identifier::real("42"));
    assert!(node.new_concept_details.is_none());
    let queries = service.executed_queries().await;
    assert_eq!(queries.len(), 2);
    assert!(!queries[1].contains(MP_REFSET_ID));
}
