//! Data models for the terminology SDK
//!
//! These types mirror the JSON structures exchanged with a Snowstorm-style
//! terminology server and are used by both `InMemoryTerminology` and
//! `RemoteClient`. Identifiers here are always real SCTIDs held as strings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

fn default_true() -> bool {
    true
}

fn stated() -> String {
    STATED_RELATIONSHIP.to_string()
}

/// Characteristic type for authored relationships
pub const STATED_RELATIONSHIP: &str = "STATED_RELATIONSHIP";

/// Definition status of a concept or axiom
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DefinitionStatus {
    FullyDefined,
    Primitive,
}

impl DefinitionStatus {
    /// Concept id of the definition status metadata concept
    pub fn id(&self) -> &'static str {
        match self {
            DefinitionStatus::FullyDefined => "900000000000073002",
            DefinitionStatus::Primitive => "900000000000074008",
        }
    }
}

impl fmt::Display for DefinitionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefinitionStatus::FullyDefined => write!(f, "FULLY_DEFINED"),
            DefinitionStatus::Primitive => write!(f, "PRIMITIVE"),
        }
    }
}

/// A description term as returned inline on a concept
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TermValue {
    pub term: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
}

impl TermValue {
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            lang: Some("en".to_string()),
        }
    }
}

/// Concept summary, as returned by query endpoints
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptSummary {
    pub concept_id: String,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition_status: Option<DefinitionStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fsn: Option<TermValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pt: Option<TermValue>,
}

impl ConceptSummary {
    pub fn new(
        concept_id: impl Into<String>,
        fsn: impl Into<String>,
        pt: impl Into<String>,
        definition_status: DefinitionStatus,
    ) -> Self {
        Self {
            concept_id: concept_id.into(),
            active: true,
            definition_status: Some(definition_status),
            module_id: None,
            fsn: Some(TermValue::new(fsn)),
            pt: Some(TermValue::new(pt)),
        }
    }

    pub fn fsn_term(&self) -> Option<&str> {
        self.fsn.as_ref().map(|t| t.term.as_str())
    }

    pub fn pt_term(&self) -> Option<&str> {
        self.pt.as_ref().map(|t| t.term.as_str())
    }

    pub fn is_fully_defined(&self) -> bool {
        self.definition_status == Some(DefinitionStatus::FullyDefined)
    }
}

/// Datatype of a concrete (literal) relationship value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConcreteDataType {
    Integer,
    Decimal,
    String,
}

/// A literal relationship value
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcreteValue {
    pub value: String,
    pub data_type: ConcreteDataType,
}

impl ConcreteValue {
    pub fn integer(value: i64) -> Self {
        Self {
            value: value.to_string(),
            data_type: ConcreteDataType::Integer,
        }
    }

    pub fn decimal(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            data_type: ConcreteDataType::Decimal,
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            data_type: ConcreteDataType::String,
        }
    }

    /// Value as written in a query: strings quoted, numbers prefixed with `#`
    pub fn with_prefix(&self) -> String {
        match self.data_type {
            ConcreteDataType::String => format!("\"{}\"", self.value),
            ConcreteDataType::Integer | ConcreteDataType::Decimal => format!("#{}", self.value),
        }
    }
}

/// A relationship inside an axiom or an inferred relationship
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship_id: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    pub type_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concrete_value: Option<ConcreteValue>,
    #[serde(default)]
    pub group_id: u32,
    #[serde(default = "stated")]
    pub characteristic_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_id: Option<String>,
}

impl Relationship {
    pub fn to_concept(type_id: impl Into<String>, destination_id: impl Into<String>, group_id: u32) -> Self {
        Self {
            relationship_id: None,
            active: true,
            type_id: type_id.into(),
            destination_id: Some(destination_id.into()),
            concrete_value: None,
            group_id,
            characteristic_type: stated(),
            module_id: None,
        }
    }

    pub fn to_value(type_id: impl Into<String>, value: ConcreteValue, group_id: u32) -> Self {
        Self {
            relationship_id: None,
            active: true,
            type_id: type_id.into(),
            destination_id: None,
            concrete_value: Some(value),
            group_id,
            characteristic_type: stated(),
            module_id: None,
        }
    }

    pub fn is_concrete(&self) -> bool {
        self.concrete_value.is_some()
    }
}

/// An OWL class axiom expressed as relationships
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Axiom {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axiom_id: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    pub definition_status: DefinitionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_id: Option<String>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

/// Full concept body including its class axioms
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptDetail {
    pub concept_id: String,
    #[serde(default = "default_true")]
    pub active: bool,
    pub definition_status: DefinitionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fsn: Option<TermValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pt: Option<TermValue>,
    #[serde(default)]
    pub class_axioms: Vec<Axiom>,
    /// Inferred relationships
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl ConceptDetail {
    pub fn summary(&self) -> ConceptSummary {
        ConceptSummary {
            concept_id: self.concept_id.clone(),
            active: self.active,
            definition_status: Some(self.definition_status),
            module_id: self.module_id.clone(),
            fsn: self.fsn.clone(),
            pt: self.pt.clone(),
        }
    }

    /// Active relationships across all active class axioms
    pub fn axiom_relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.class_axioms
            .iter()
            .filter(|a| a.active)
            .flat_map(|a| a.relationships.iter())
            .filter(|r| r.active)
    }

    /// Body to send back when updating this concept in place, keeping its
    /// names and class axioms
    pub fn into_draft(self) -> ConceptDraft {
        let mut draft = ConceptDraft::new(self.definition_status, self.module_id);
        if let Some(fsn) = &self.fsn {
            draft = draft.with_names(&fsn.term, self.pt.as_ref().map(|pt| pt.term.as_str()));
        }
        draft.concept_id = Some(self.concept_id);
        draft.active = self.active;
        draft.class_axioms = self.class_axioms;
        draft
    }
}

/// Description type of a drafted description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DescriptionType {
    Fsn,
    Synonym,
}

/// A description to be created with a concept
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptionDraft {
    pub term: String,
    #[serde(rename = "type")]
    pub description_type: DescriptionType,
    pub lang: String,
    pub case_significance: String,
    pub acceptability_map: BTreeMap<String, String>,
}

impl DescriptionDraft {
    fn preferred(term: &str, description_type: DescriptionType, language_refset: &str) -> Self {
        let mut acceptability_map = BTreeMap::new();
        acceptability_map.insert(language_refset.to_string(), "PREFERRED".to_string());
        Self {
            term: term.to_string(),
            description_type,
            lang: "en".to_string(),
            case_significance: "ENTIRE_TERM_CASE_SENSITIVE".to_string(),
            acceptability_map,
        }
    }
}

/// Concept body submitted for creation or update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concept_id: Option<String>,
    pub active: bool,
    pub definition_status: DefinitionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_id: Option<String>,
    #[serde(default)]
    pub descriptions: Vec<DescriptionDraft>,
    #[serde(default)]
    pub class_axioms: Vec<Axiom>,
}

impl ConceptDraft {
    /// Language reference set the drafted descriptions are preferred in
    pub const LANGUAGE_REFSET: &'static str = "32570271000036106";

    pub fn new(definition_status: DefinitionStatus, module_id: Option<String>) -> Self {
        Self {
            concept_id: None,
            active: true,
            definition_status,
            module_id,
            descriptions: Vec::new(),
            class_axioms: Vec::new(),
        }
    }

    pub fn with_names(mut self, fsn: &str, pt: Option<&str>) -> Self {
        self.descriptions.push(DescriptionDraft::preferred(
            fsn,
            DescriptionType::Fsn,
            Self::LANGUAGE_REFSET,
        ));
        if let Some(pt) = pt.filter(|pt| !pt.is_empty()) {
            self.descriptions.push(DescriptionDraft::preferred(
                pt,
                DescriptionType::Synonym,
                Self::LANGUAGE_REFSET,
            ));
        }
        self
    }

    pub fn fsn(&self) -> Option<&str> {
        self.descriptions
            .iter()
            .find(|d| d.description_type == DescriptionType::Fsn)
            .map(|d| d.term.as_str())
    }

    pub fn pt(&self) -> Option<&str> {
        self.descriptions
            .iter()
            .find(|d| d.description_type == DescriptionType::Synonym)
            .map(|d| d.term.as_str())
    }

    /// Every relationship destination referenced by the draft's axioms
    pub fn destination_ids(&self) -> impl Iterator<Item = &str> {
        self.class_axioms
            .iter()
            .flat_map(|a| a.relationships.iter())
            .filter_map(|r| r.destination_id.as_deref())
    }

    /// Summary of this draft once it has been given an id
    pub fn summary(&self) -> Option<ConceptSummary> {
        let concept_id = self.concept_id.clone()?;
        Some(ConceptSummary {
            concept_id,
            active: self.active,
            definition_status: Some(self.definition_status),
            module_id: self.module_id.clone(),
            fsn: self.fsn().map(TermValue::new),
            pt: self.pt().map(TermValue::new),
        })
    }

    pub fn into_detail(self, concept_id: String) -> ConceptDetail {
        let fsn = self.fsn().map(TermValue::new);
        let pt = self.pt().map(TermValue::new);
        ConceptDetail {
            concept_id,
            active: self.active,
            definition_status: self.definition_status,
            module_id: self.module_id,
            fsn,
            pt,
            class_axioms: self.class_axioms,
            relationships: Vec::new(),
        }
    }
}

/// Reference set member
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefsetMember {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_id: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_id: Option<String>,
    pub refset_id: String,
    #[serde(default)]
    pub referenced_component_id: String,
    #[serde(default)]
    pub additional_fields: BTreeMap<String, String>,
}

impl RefsetMember {
    pub fn new(refset_id: impl Into<String>, referenced_component_id: impl Into<String>) -> Self {
        Self {
            member_id: None,
            active: true,
            module_id: None,
            refset_id: refset_id.into(),
            referenced_component_id: referenced_component_id.into(),
            additional_fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.additional_fields.insert(name.into(), value.into());
        self
    }

    pub fn with_module(mut self, module_id: Option<String>) -> Self {
        self.module_id = module_id;
        self
    }
}

/// One page of results from a paged endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub total: usize,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub limit: usize,
}

/// State of an asynchronous bulk change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchState {
    Running,
    Completed,
    Failed,
}

/// Status of an asynchronous bulk change
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStatus {
    pub id: String,
    pub status: BatchState,
    #[serde(default)]
    pub concept_ids: Vec<serde_json::Value>,
    #[serde(default)]
    pub message: Option<String>,
}

impl BatchStatus {
    /// Concept ids as strings; the server may send them as numbers
    pub fn concept_id_strings(&self) -> Vec<String> {
        self.concept_ids
            .iter()
            .map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concept_summary_from_server_json() {
        let json = r#"{
            "conceptId": "763158003",
            "active": true,
            "definitionStatus": "PRIMITIVE",
            "moduleId": "900000000000207008",
            "fsn": {"term": "Medicinal product (product)", "lang": "en"},
            "pt": {"term": "Medicinal product", "lang": "en"}
        }"#;
        let concept: ConceptSummary = serde_json::from_str(json).unwrap();
        assert_eq!(concept.concept_id, "763158003");
        assert_eq!(concept.fsn_term(), Some("Medicinal product (product)"));
        assert!(!concept.is_fully_defined());
    }

    #[test]
    fn test_concrete_value_prefix() {
        assert_eq!(ConcreteValue::integer(2).with_prefix(), "#2");
        assert_eq!(ConcreteValue::decimal("0.5").with_prefix(), "#0.5");
        assert_eq!(ConcreteValue::string("blue").with_prefix(), "\"blue\"");
    }

    #[test]
    fn test_detail_into_draft_keeps_names_and_axioms() {
        let mut detail = ConceptDraft::new(DefinitionStatus::Primitive, Some("32506021000036107".to_string()))
            .with_names("Old pack (medicinal product)", Some("Old pack"))
            .into_detail("111".to_string());
        detail.class_axioms.push(Axiom {
            axiom_id: Some("a1".to_string()),
            active: true,
            definition_status: DefinitionStatus::Primitive,
            module_id: None,
            relationships: vec![Relationship::to_concept("116680003", "763158003", 0)],
        });
        let draft = detail.clone().into_draft();
        assert_eq!(draft.concept_id.as_deref(), Some("111"));
        assert_eq!(draft.fsn(), Some("Old pack (medicinal product)"));
        assert_eq!(draft.pt(), Some("Old pack"));
        assert_eq!(draft.class_axioms, detail.class_axioms);
        assert_eq!(draft.into_detail("111".to_string()), detail);
    }

    #[test]
    fn test_draft_names_and_summary() {
        let mut draft = ConceptDraft::new(DefinitionStatus::FullyDefined, None)
            .with_names("Thing (product)", Some("Thing"));
        assert!(draft.summary().is_none());
        draft.concept_id = Some("1234567101".to_string());
        let summary = draft.summary().unwrap();
        assert_eq!(summary.fsn_term(), Some("Thing (product)"));
        assert_eq!(summary.pt_term(), Some("Thing"));
    }

    #[test]
    fn test_batch_ids_numeric_or_string() {
        let json = r#"{"id": "b1", "status": "COMPLETED", "conceptIds": [123, "456"]}"#;
        let batch: BatchStatus = serde_json::from_str(json).unwrap();
        assert_eq!(batch.concept_id_strings(), vec!["123", "456"]);
    }
}
