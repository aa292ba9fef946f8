//! Axioms over compiler identifiers
//!
//! Like the wire types in `terminology_sdk`, but destinations may still be
//! placeholders.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use terminology_sdk::{ConcreteValue, DefinitionStatus};

use super::types::Identifier;
use crate::error::{CompilerError, CompilerResult};
use crate::model::constants::IS_A;

/// Destination of a relationship
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationshipTarget {
    Concept(Identifier),
    Concrete(ConcreteValue),
}

/// A stated relationship
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub type_id: String,
    pub target: RelationshipTarget,
    #[serde(default)]
    pub group: u32,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

impl Relationship {
    pub fn to_concept(type_id: impl Into<String>, destination: Identifier, group: u32) -> Self {
        Self {
            type_id: type_id.into(),
            target: RelationshipTarget::Concept(destination),
            group,
            active: true,
        }
    }

    pub fn to_value(type_id: impl Into<String>, value: ConcreteValue, group: u32) -> Self {
        Self {
            type_id: type_id.into(),
            target: RelationshipTarget::Concrete(value),
            group,
            active: true,
        }
    }

    pub fn is_a(parent: Identifier) -> Self {
        Self::to_concept(IS_A, parent, 0)
    }

    pub fn is_concrete(&self) -> bool {
        matches!(self.target, RelationshipTarget::Concrete(_))
    }

    pub fn destination(&self) -> Option<&Identifier> {
        match &self.target {
            RelationshipTarget::Concept(id) => Some(id),
            RelationshipTarget::Concrete(_) => None,
        }
    }

    pub fn concrete_value(&self) -> Option<&ConcreteValue> {
        match &self.target {
            RelationshipTarget::Concrete(value) => Some(value),
            RelationshipTarget::Concept(_) => None,
        }
    }

    pub fn has_placeholder_destination(&self) -> bool {
        self.destination().map_or(false, Identifier::is_placeholder)
    }

    /// Build from a wire relationship; `None` for relationships without a target
    pub fn from_wire(wire: &terminology_sdk::Relationship) -> Option<Self> {
        let target = match (&wire.destination_id, &wire.concrete_value) {
            (_, Some(value)) => RelationshipTarget::Concrete(value.clone()),
            (Some(dest), None) => RelationshipTarget::Concept(Identifier::try_from(dest.as_str()).ok()?),
            (None, None) => return None,
        };
        Some(Self {
            type_id: wire.type_id.clone(),
            target,
            group: wire.group_id,
            active: wire.active,
        })
    }

    /// Convert to a wire relationship; placeholders must already be replaced
    pub fn to_wire(&self, source: &Identifier) -> CompilerResult<terminology_sdk::Relationship> {
        match &self.target {
            RelationshipTarget::Concrete(value) => Ok(terminology_sdk::Relationship::to_value(
                self.type_id.clone(),
                value.clone(),
                self.group,
            )),
            RelationshipTarget::Concept(Identifier::Real(dest)) => Ok(
                terminology_sdk::Relationship::to_concept(self.type_id.clone(), dest.clone(), self.group),
            ),
            RelationshipTarget::Concept(Identifier::Placeholder(placeholder)) => {
                Err(CompilerError::DanglingPlaceholder {
                    placeholder: *placeholder,
                    referenced_by: source.to_string(),
                })
            }
        }
    }
}

/// A class axiom: definition status plus an ordered, duplicate-free relationship set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Axiom {
    pub definition_status: DefinitionStatus,
    pub relationships: BTreeSet<Relationship>,
}

impl Axiom {
    pub fn new(definition_status: DefinitionStatus, relationships: impl IntoIterator<Item = Relationship>) -> Self {
        Self {
            definition_status,
            relationships: relationships.into_iter().collect(),
        }
    }

    pub fn is_fully_defined(&self) -> bool {
        self.definition_status == DefinitionStatus::FullyDefined
    }

    /// Placeholders this axiom references
    pub fn placeholder_references(&self) -> impl Iterator<Item = i64> + '_ {
        self.relationships
            .iter()
            .filter_map(|r| r.destination().and_then(Identifier::placeholder))
    }

    /// Replace destinations found in `mapping`
    pub fn rewrite_destinations(&mut self, mapping: &HashMap<Identifier, Identifier>) {
        if !self
            .relationships
            .iter()
            .any(|r| r.destination().map_or(false, |d| mapping.contains_key(d)))
        {
            return;
        }
        self.relationships = std::mem::take(&mut self.relationships)
            .into_iter()
            .map(|mut r| {
                if let RelationshipTarget::Concept(dest) = &r.target {
                    if let Some(replacement) = mapping.get(dest) {
                        r.target = RelationshipTarget::Concept(replacement.clone());
                    }
                }
                r
            })
            .collect();
    }

    /// Same relationships, ignoring definition status
    pub fn same_relationships(&self, other: &Axiom) -> bool {
        self.relationships == other.relationships
    }

    pub fn to_wire(&self, source: &Identifier, module_id: Option<&str>) -> CompilerResult<terminology_sdk::Axiom> {
        let relationships = self
            .relationships
            .iter()
            .filter(|r| r.active)
            .map(|r| {
                let mut wire = r.to_wire(source)?;
                wire.module_id = module_id.map(str::to_string);
                Ok(wire)
            })
            .collect::<CompilerResult<Vec<_>>>()?;
        Ok(terminology_sdk::Axiom {
            axiom_id: None,
            active: true,
            definition_status: self.definition_status,
            module_id: module_id.map(str::to_string),
            relationships,
        })
    }
}
