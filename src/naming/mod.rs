//! Name generation for new concept proposals
//!
//! Renders a proposal's axiom as OWL functional syntax, swaps ids for labels
//! and asks a [`NameGenerator`] for an FSN and preferred term. Failures never
//! abort a compilation; the proposal gets a sentinel name instead.

pub mod client;

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tracing::{debug, warn};

use terminology_sdk::{ConcreteDataType, DefinitionStatus};

pub use client::{FsnAndPt, NameGenerator, NameGeneratorSpec, NamingError, NamingResult, RemoteNameGenerator};

use crate::graph::{Axiom, Identifier, Node, Relationship, RelationshipTarget};
use crate::model::constants::{IS_A, ROLE_GROUP};
use crate::model::{ModelConfiguration, ModelType};
use crate::placeholder::PlaceholderIdentityCache;

/// FSN and PT given to a proposal when names cannot be generated
pub const NAME_UNAVAILABLE: &str = "Generated name unavailable";

fn sctid_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d{7,18}").expect("SCTID pattern is valid"))
}

/// Render an axiom as OWL functional syntax
pub fn render_owl(subject: &Identifier, axiom: &Axiom) -> String {
    let mut terms: Vec<String> = Vec::new();
    terms.extend(
        axiom
            .relationships
            .iter()
            .filter(|r| r.active && r.type_id == IS_A)
            .filter_map(|r| r.destination().map(|d| format!(":{}", d))),
    );
    terms.extend(
        axiom
            .relationships
            .iter()
            .filter(|r| r.active && r.type_id != IS_A && r.group == 0)
            .map(render_restriction),
    );

    let group_ids: BTreeSet<u32> = axiom
        .relationships
        .iter()
        .filter(|r| r.active && r.group > 0)
        .map(|r| r.group)
        .collect();
    for group in group_ids {
        let members: Vec<String> = axiom
            .relationships
            .iter()
            .filter(|r| r.active && r.group == group)
            .map(render_restriction)
            .collect();
        terms.push(format!(
            "ObjectSomeValuesFrom(:{} {})",
            ROLE_GROUP,
            intersection(members)
        ));
    }

    let keyword = match axiom.definition_status {
        DefinitionStatus::FullyDefined => "EquivalentClasses",
        DefinitionStatus::Primitive => "SubClassOf",
    };
    format!("{}(:{} {})", keyword, subject, intersection(terms))
}

fn intersection(mut terms: Vec<String>) -> String {
    if terms.len() == 1 {
        terms.remove(0)
    } else {
        format!("ObjectIntersectionOf({})", terms.join(" "))
    }
}

fn render_restriction(relationship: &Relationship) -> String {
    match &relationship.target {
        RelationshipTarget::Concept(dest) => {
            format!("ObjectSomeValuesFrom(:{} :{})", relationship.type_id, dest)
        }
        RelationshipTarget::Concrete(value) => {
            let datatype = match value.data_type {
                ConcreteDataType::Integer => "xsd:integer",
                ConcreteDataType::Decimal => "xsd:decimal",
                ConcreteDataType::String => "xsd:string",
            };
            format!(
                "DataHasValue(:{} \"{}\"^^{})",
                relationship.type_id, value.value, datatype
            )
        }
    }
}

/// Adds generated names to new concept proposals
#[derive(Clone)]
pub struct NameGenerationService {
    generator: Arc<dyn NameGenerator>,
}

impl NameGenerationService {
    pub fn new(generator: Arc<dyn NameGenerator>) -> Self {
        Self { generator }
    }

    /// Request for a node, or `None` if the node is not a new concept
    pub fn name_generator_spec(
        &self,
        cache: &PlaceholderIdentityCache,
        semantic_tag: &str,
        node: &Node,
        model: &ModelConfiguration,
    ) -> Option<NameGeneratorSpec> {
        if !node.is_new_concept() {
            return None;
        }
        let proposal = node.new_concept_details.as_ref()?;
        let owl = render_owl(&proposal.concept_id, &proposal.axiom);
        let fsn_owl = cache.substitute_ids_in_axiom(&owl, &proposal.concept_id);
        let pt_owl = match model.model_type {
            ModelType::Nmpc => String::new(),
            ModelType::Amt => cache.substitute_pt_ids_in_axiom(&owl, &proposal.concept_id),
        };
        Some(NameGeneratorSpec {
            semantic_tag: semantic_tag.to_string(),
            owl: fsn_owl,
            pt_owl,
        })
    }

    /// Generate and record names on a new concept node
    pub async fn add_generated_names(
        &self,
        cache: &PlaceholderIdentityCache,
        semantic_tag: &str,
        node: &mut Node,
        model: &ModelConfiguration,
    ) {
        let Some(spec) = self.name_generator_spec(cache, semantic_tag, node, model) else {
            return;
        };
        let start = Instant::now();
        if sctid_pattern().is_match(&spec.owl) {
            warn!(
                "Axiom to generate names for contains SCTIDs, results may be unreliable: {}",
                spec.owl
            );
        }

        let names = match self.generator.generate_names(&spec).await {
            Ok(names) => names,
            Err(e) => {
                warn!("Name generation failed for {}: {}", node.concept_id, e);
                FsnAndPt {
                    fsn: NAME_UNAVAILABLE.to_string(),
                    pt: NAME_UNAVAILABLE.to_string(),
                }
            }
        };

        cache.register_label(&node.concept_id, &names.fsn, &names.pt);
        debug!(
            "Generated names for {} in {} ms: {} | {}",
            node.concept_id,
            start.elapsed().as_millis(),
            names.fsn,
            names.pt
        );
        if let Some(proposal) = node.new_concept_details.as_mut() {
            proposal.generated_fsn = Some(names.fsn);
            proposal.generated_preferred_term = Some(names.pt);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NewConceptProposal;
    use crate::model::constants::*;
    use crate::model::ModelLevelType;
    use async_trait::async_trait;
    use terminology_sdk::ConcreteValue;

    struct EchoGenerator;

    #[async_trait]
    impl NameGenerator for EchoGenerator {
        async fn generate_names(&self, spec: &NameGeneratorSpec) -> NamingResult<FsnAndPt> {
            Ok(FsnAndPt {
                fsn: format!("{} ({})", spec.owl.len(), spec.semantic_tag),
                pt: spec.pt_owl.clone(),
            })
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl NameGenerator for FailingGenerator {
        async fn generate_names(&self, _spec: &NameGeneratorSpec) -> NamingResult<FsnAndPt> {
            Err(NamingError::NetworkError("connection refused".to_string()))
        }
    }

    fn mpuu_node() -> Node {
        let axiom = Axiom::new(
            DefinitionStatus::FullyDefined,
            vec![
                Relationship::is_a(Identifier::real(MEDICINAL_PRODUCT)),
                Relationship::to_concept(HAS_MANUFACTURED_DOSE_FORM, Identifier::real("385055001"), 0),
                Relationship::to_concept(HAS_ACTIVE_INGREDIENT, Identifier::Placeholder(-2), 1),
                Relationship::to_value(HAS_PACK_SIZE_VALUE, ConcreteValue::decimal("500"), 1),
            ],
        );
        Node::proposed(
            NewConceptProposal::new(Identifier::Placeholder(-3), axiom, CLINICAL_DRUG_SEMANTIC_TAG),
            "MPUU",
            ModelLevelType::ClinicalDrug,
        )
    }

    #[test]
    fn test_render_owl() {
        let node = mpuu_node();
        let proposal = node.new_concept_details.as_ref().unwrap();
        assert_eq!(
            render_owl(&proposal.concept_id, &proposal.axiom),
            "EquivalentClasses(:-3 ObjectIntersectionOf(:763158003 \
             ObjectSomeValuesFrom(:411116001 :385055001) \
             ObjectSomeValuesFrom(:609096000 ObjectIntersectionOf(\
             DataHasValue(:1142142004 \"500\"^^xsd:decimal) \
             ObjectSomeValuesFrom(:127489000 :-2)))))"
        );
    }

    #[test]
    fn test_render_primitive_single_parent() {
        let axiom = Axiom::new(
            DefinitionStatus::Primitive,
            vec![Relationship::is_a(Identifier::real(MEDICINAL_PRODUCT))],
        );
        assert_eq!(
            render_owl(&Identifier::Placeholder(-9), &axiom),
            "SubClassOf(:-9 :763158003)"
        );
    }

    #[tokio::test]
    async fn test_generated_names_registered_in_cache() {
        let cache = PlaceholderIdentityCache::default();
        cache.register_label(&Identifier::Placeholder(-2), "Paracetamol (substance)", "Paracetamol");
        cache.register_label(&Identifier::real("385055001"), "Tablet (dose form)", "Tablet");
        let service = NameGenerationService::new(Arc::new(EchoGenerator));
        let model = ModelConfiguration::amt();
        let mut node = mpuu_node();

        let spec = service
            .name_generator_spec(&cache, CLINICAL_DRUG_SEMANTIC_TAG, &node, &model)
            .unwrap();
        assert!(spec.owl.contains(":'Paracetamol (substance)'"));
        assert!(spec.pt_owl.contains(":'Paracetamol'"));
        assert!(spec.owl.starts_with("EquivalentClasses(: "));

        service
            .add_generated_names(&cache, CLINICAL_DRUG_SEMANTIC_TAG, &mut node, &model)
            .await;
        let fsn = node.new_concept_details.as_ref().and_then(|p| p.generated_fsn.clone()).unwrap();
        assert!(fsn.ends_with("(clinical drug)"));
        assert_eq!(cache.label_for(&Identifier::Placeholder(-3)), Some(fsn));
    }

    #[tokio::test]
    async fn test_failure_degrades_to_sentinel() {
        let cache = PlaceholderIdentityCache::default();
        let service = NameGenerationService::new(Arc::new(FailingGenerator));
        let mut node = mpuu_node();
        service
            .add_generated_names(&cache, CLINICAL_DRUG_SEMANTIC_TAG, &mut node, &ModelConfiguration::nmpc())
            .await;
        let proposal = node.new_concept_details.as_ref().unwrap();
        assert_eq!(proposal.generated_fsn.as_deref(), Some(NAME_UNAVAILABLE));
        assert_eq!(proposal.effective_preferred_term(), Some(NAME_UNAVAILABLE));
    }
}
