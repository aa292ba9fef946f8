//! Graph nodes and new concept proposals

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use terminology_sdk::{ConceptSummary, RefsetMember};

use super::axiom::Axiom;
use super::types::Identifier;
use crate::model::ModelLevelType;

/// A property carried by a concept outside its definition, stored as a
/// reference set member (level markers, external identifiers, mappings)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonDefiningProperty {
    pub refset_id: String,
    /// Short name of the scheme, e.g. "levelMarker" or "artgId"
    pub scheme: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl NonDefiningProperty {
    pub fn marker(refset_id: &str) -> Self {
        Self {
            refset_id: refset_id.to_string(),
            scheme: "levelMarker".to_string(),
            value: None,
        }
    }

    pub fn mapping(refset_id: &str, scheme: &str, value: &str) -> Self {
        Self {
            refset_id: refset_id.to_string(),
            scheme: scheme.to_string(),
            value: Some(value.to_string()),
        }
    }

    pub fn from_member(member: &RefsetMember) -> Self {
        Self {
            refset_id: member.refset_id.clone(),
            scheme: if member.additional_fields.is_empty() {
                "referenceSet".to_string()
            } else {
                "mapping".to_string()
            },
            value: member.additional_fields.get("mapTarget").cloned(),
        }
    }

    /// Member for a committed concept
    pub fn to_member(&self, concept_id: &str, module_id: Option<&str>) -> RefsetMember {
        let member = RefsetMember::new(self.refset_id.clone(), concept_id)
            .with_module(module_id.map(str::to_string));
        match &self.value {
            Some(value) => member.with_field("mapTarget", value.clone()),
            None => member,
        }
    }
}

/// A historical association written when a concept is retired
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalAssociation {
    /// Association reference set, e.g. REPLACED BY
    pub refset_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
}

/// Snapshot of an existing concept that a node edits or replaces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginalNode {
    pub concept: ConceptSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inactivation_reason: Option<String>,
    #[serde(default)]
    pub historical_associations: Vec<HistoricalAssociation>,
    #[serde(default)]
    pub referenced_by_other_products: bool,
}

/// A concept to be created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewConceptProposal {
    /// Placeholder identifier until committed
    pub concept_id: Identifier,
    /// Real id the caller wants the concept committed under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specified_concept_id: Option<String>,
    pub axiom: Axiom,
    pub semantic_tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_id: Option<String>,
    /// Caller-overridden names
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fsn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_term: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_fsn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_preferred_term: Option<String>,
    #[serde(default)]
    pub refset_members: Vec<NonDefiningProperty>,
    #[serde(default)]
    pub non_defining_properties: Vec<NonDefiningProperty>,
}

impl NewConceptProposal {
    pub fn new(concept_id: Identifier, axiom: Axiom, semantic_tag: &str) -> Self {
        Self {
            concept_id,
            specified_concept_id: None,
            axiom,
            semantic_tag: semantic_tag.to_string(),
            module_id: None,
            fsn: None,
            preferred_term: None,
            generated_fsn: None,
            generated_preferred_term: None,
            refset_members: Vec::new(),
            non_defining_properties: Vec::new(),
        }
    }

    /// FSN to commit: caller override first, then the generated name
    pub fn effective_fsn(&self) -> Option<&str> {
        self.fsn.as_deref().or(self.generated_fsn.as_deref())
    }

    pub fn effective_preferred_term(&self) -> Option<&str> {
        self.preferred_term
            .as_deref()
            .or(self.generated_preferred_term.as_deref())
    }
}

/// One hierarchy position in a product graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub concept_id: Identifier,
    /// Level display label, e.g. "MPUU"
    pub label: String,
    pub model_level: ModelLevelType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concept: Option<ConceptSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_concept_details: Option<NewConceptProposal>,
    /// Candidates offered when resolution was ambiguous
    #[serde(default)]
    pub concept_options: Vec<ConceptSummary>,
    #[serde(default)]
    pub non_defining_properties: Vec<NonDefiningProperty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_node: Option<OriginalNode>,
    #[serde(default)]
    pub property_update: bool,
}

impl Node {
    /// A node bound to an existing concept
    pub fn existing(concept: ConceptSummary, label: &str, model_level: ModelLevelType) -> Self {
        Self {
            concept_id: Identifier::real(concept.concept_id.clone()),
            label: label.to_string(),
            model_level,
            concept: Some(concept),
            new_concept_details: None,
            concept_options: Vec::new(),
            non_defining_properties: Vec::new(),
            original_node: None,
            property_update: false,
        }
    }

    /// A node holding a new concept proposal
    pub fn proposed(proposal: NewConceptProposal, label: &str, model_level: ModelLevelType) -> Self {
        Self {
            concept_id: proposal.concept_id.clone(),
            label: label.to_string(),
            model_level,
            concept: None,
            new_concept_details: Some(proposal),
            concept_options: Vec::new(),
            non_defining_properties: Vec::new(),
            original_node: None,
            property_update: false,
        }
    }

    pub fn is_new_concept(&self) -> bool {
        self.new_concept_details.is_some() && self.original_node.is_none()
    }

    /// Replaces an existing concept with a new one
    pub fn is_retire_and_replace(&self) -> bool {
        match (&self.new_concept_details, &self.original_node) {
            (Some(_), Some(_)) => !self.is_concept_edit(),
            _ => false,
        }
    }

    /// Edits an existing concept in place
    pub fn is_concept_edit(&self) -> bool {
        match (&self.new_concept_details, &self.original_node) {
            (Some(proposal), Some(original)) => {
                proposal.specified_concept_id.as_deref() == Some(original.concept.concept_id.as_str())
            }
            _ => false,
        }
    }

    pub fn is_property_update(&self) -> bool {
        self.property_update && self.new_concept_details.is_none()
    }

    /// Whether the creation phase has anything to write for this node
    pub fn requires_write(&self) -> bool {
        self.new_concept_details.is_some() || self.is_property_update()
    }

    pub fn fsn(&self) -> Option<&str> {
        match (&self.concept, &self.new_concept_details) {
            (Some(concept), _) => concept.fsn_term(),
            (None, Some(proposal)) => proposal.effective_fsn(),
            (None, None) => None,
        }
    }

    pub fn id_and_fsn(&self) -> String {
        format!("{}|{}|", self.concept_id, self.fsn().unwrap_or_default())
    }

    /// Replace this node's id and axiom destinations found in `mapping`
    pub fn rewrite_identifiers(&mut self, mapping: &HashMap<Identifier, Identifier>) {
        if let Some(replacement) = mapping.get(&self.concept_id) {
            self.concept_id = replacement.clone();
        }
        if let Some(proposal) = self.new_concept_details.as_mut() {
            if let Some(replacement) = mapping.get(&proposal.concept_id) {
                proposal.concept_id = replacement.clone();
            }
            proposal.axiom.rewrite_destinations(mapping);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use terminology_sdk::DefinitionStatus;

    fn proposal(id: i64) -> NewConceptProposal {
        NewConceptProposal::new(
            Identifier::Placeholder(id),
            Axiom::new(DefinitionStatus::FullyDefined, Vec::new()),
            "clinical drug",
        )
    }

    #[test]
    fn test_node_predicates() {
        let node = Node::proposed(proposal(-2), "MPUU", ModelLevelType::ClinicalDrug);
        assert!(node.is_new_concept());
        assert!(node.requires_write());

        let original = OriginalNode {
            concept: ConceptSummary::new("111", "Old (clinical drug)", "Old", DefinitionStatus::Primitive),
            inactivation_reason: None,
            historical_associations: Vec::new(),
            referenced_by_other_products: false,
        };
        let mut replace = node.clone();
        replace.original_node = Some(original.clone());
        assert!(replace.is_retire_and_replace());
        assert!(!replace.is_concept_edit());

        let mut edit = replace.clone();
        if let Some(p) = edit.new_concept_details.as_mut() {
            p.specified_concept_id = Some("111".to_string());
        }
        assert!(edit.is_concept_edit());
        assert!(!edit.is_new_concept());

        let existing = Node::existing(
            ConceptSummary::new("222", "Thing (product)", "Thing", DefinitionStatus::FullyDefined),
            "MP",
            ModelLevelType::MedicinalProduct,
        );
        assert!(!existing.requires_write());
        assert_eq!(existing.id_and_fsn(), "222|Thing (product)|");
    }

    #[test]
    fn test_property_member_conversion() {
        let property = NonDefiningProperty::mapping("6112701000036108", "artgId", "12345");
        let member = property.to_member("999", Some("32506021000036107"));
        assert_eq!(member.referenced_component_id, "999");
        assert_eq!(member.additional_fields.get("mapTarget").map(String::as_str), Some("12345"));
        assert_eq!(NonDefiningProperty::from_member(&member).value.as_deref(), Some("12345"));
    }
}
