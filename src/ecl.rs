//! QuerySynthesizer: builds ECL queries from candidate relationships
//!
//! Output shape: `(<subsumption> AND <refsets>):<ungrouped>,{<group 1>},{<group 2>}`.
//! Terms are distinct and sorted so the same relationship set always yields
//! the same query text.

use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use terminology_sdk::ConcreteDataType;

use crate::error::{CompilerError, CompilerResult};
use crate::graph::{Identifier, Relationship, RelationshipTarget};
use crate::model::constants::{
    HAS_ACTIVE_INGREDIENT, HAS_PRECISE_ACTIVE_INGREDIENT, HAS_PRODUCT_NAME, IS_A,
    MEDICINAL_PRODUCT, MEDICINAL_PRODUCT_PACKAGE,
};
use crate::model::ModelConfiguration;

/// Flags controlling which clauses a query gets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Leave out the `<parent` subsumption clause
    pub suppress_subsumption: bool,
    /// Leave out `[0..0]` cardinality constraints
    pub suppress_negative_constraints: bool,
}

/// Pure ECL builder for one model profile
pub struct QuerySynthesizer<'a> {
    model: &'a ModelConfiguration,
}

impl<'a> QuerySynthesizer<'a> {
    pub fn new(model: &'a ModelConfiguration) -> Self {
        Self { model }
    }

    pub fn build<'r, I>(&self, relationships: I, refsets: &[String], options: QueryOptions) -> CompilerResult<String>
    where
        I: IntoIterator<Item = &'r Relationship>,
    {
        let relationships: BTreeSet<&Relationship> =
            relationships.into_iter().filter(|r| r.active).collect();

        let subsumption = if options.suppress_subsumption {
            String::new()
        } else {
            subsumption_clause(&relationships)
        };
        let scope = refsets
            .iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|id| format!("^{}", id))
            .collect::<Vec<_>>()
            .join(" AND ");

        let focus = match (subsumption.is_empty(), scope.is_empty()) {
            (true, true) => "*".to_string(),
            (true, false) => scope,
            (false, true) => subsumption,
            (false, false) => format!("{} AND {}", subsumption, scope),
        };

        let ungrouped_relationships: BTreeSet<&Relationship> =
            relationships.iter().copied().filter(|r| r.group == 0).collect();
        let mut ungrouped = self.relationship_terms(&ungrouped_relationships);
        if !options.suppress_negative_constraints {
            ungrouped.extend(self.negative_terms(&relationships)?);
        }

        let mut groups: BTreeMap<u32, BTreeSet<&Relationship>> = BTreeMap::new();
        for relationship in relationships.iter().filter(|r| r.group > 0) {
            groups.entry(relationship.group).or_default().insert(relationship);
        }
        let grouped = groups
            .values()
            .map(|group| self.relationship_terms(group))
            .filter(|terms| !terms.is_empty())
            .map(|terms| format!("{{{}}}", terms.join(", ")))
            .collect::<Vec<_>>()
            .join(",");

        let mut ecl = format!("({})", focus);
        let ungrouped = ungrouped.join(", ");
        match (ungrouped.is_empty(), grouped.is_empty()) {
            (true, true) => {}
            (false, true) => ecl.push_str(&format!(":{}", ungrouped)),
            (true, false) => ecl.push_str(&format!(":{}", grouped)),
            (false, false) => ecl.push_str(&format!(":{},{}", ungrouped, grouped)),
        }

        debug!("ECL: {}", ecl);
        Ok(ecl)
    }

    /// `type = value` terms for one partition, distinct and sorted
    fn relationship_terms(&self, relationships: &BTreeSet<&Relationship>) -> Vec<String> {
        let has_precise = relationships
            .iter()
            .any(|r| r.type_id == HAS_PRECISE_ACTIVE_INGREDIENT);
        relationships
            .iter()
            .filter(|r| !(has_precise && r.type_id == HAS_ACTIVE_INGREDIENT))
            .filter(|r| self.model.oii_attribute.as_deref() != Some(r.type_id.as_str()))
            .filter(|r| r.type_id != IS_A)
            .filter_map(|r| render_value(r).map(|value| format!("{} = {}", r.type_id, value)))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn negative_terms(&self, relationships: &BTreeSet<&Relationship>) -> CompilerResult<Vec<String>> {
        let mut terms = Vec::new();
        if has_parent(relationships, MEDICINAL_PRODUCT) {
            for attribute in &self.model.forbidden_product_attributes {
                if let Some(term) = exclusion_term(relationships, attribute)? {
                    terms.push(term);
                }
            }
        }
        if let Some(container) = self.model.container_type_attribute.as_deref() {
            if has_parent(relationships, MEDICINAL_PRODUCT_PACKAGE)
                && !relationships.iter().any(|r| r.type_id == container)
            {
                terms.push(format!("[0..0] {} = *", container));
            }
        }
        if !relationships.iter().any(|r| r.type_id == HAS_PRODUCT_NAME) {
            terms.push(format!("[0..0] {} = *", HAS_PRODUCT_NAME));
        }
        Ok(terms)
    }
}

fn has_parent(relationships: &BTreeSet<&Relationship>, parent: &str) -> bool {
    relationships
        .iter()
        .any(|r| r.type_id == IS_A && r.destination().and_then(Identifier::as_real) == Some(parent))
}

fn subsumption_clause(relationships: &BTreeSet<&Relationship>) -> String {
    let parents: BTreeSet<&str> = relationships
        .iter()
        .filter(|r| r.type_id == IS_A)
        .filter_map(|r| r.destination().and_then(Identifier::as_real))
        .collect();
    if parents.is_empty() {
        "*".to_string()
    } else {
        parents
            .into_iter()
            .map(|p| format!("<{}", p))
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}

/// Query form of a relationship's target; `None` for placeholders
fn render_value(relationship: &Relationship) -> Option<String> {
    match &relationship.target {
        RelationshipTarget::Concrete(value) => Some(value.with_prefix()),
        RelationshipTarget::Concept(Identifier::Real(id)) => Some(id.clone()),
        RelationshipTarget::Concept(Identifier::Placeholder(_)) => None,
    }
}

/// `[0..0] T = *` when absent, otherwise `[0..0] T != values`
fn exclusion_term(relationships: &BTreeSet<&Relationship>, type_id: &str) -> CompilerResult<Option<String>> {
    let present: Vec<&Relationship> = relationships
        .iter()
        .copied()
        .filter(|r| r.type_id == type_id)
        .collect();
    if present.is_empty() {
        return Ok(Some(format!("[0..0] {} = *", type_id)));
    }

    if present.iter().all(|r| r.is_concrete()) {
        let types: BTreeSet<ConcreteDataType> = present
            .iter()
            .filter_map(|r| r.concrete_value().map(|v| v.data_type))
            .collect();
        if types.len() > 1 {
            return Err(CompilerError::MixedConcreteTypes(type_id.to_string()));
        }
    }

    let values: BTreeSet<String> = present.iter().filter_map(|r| render_value(r)).collect();
    let value = match values.len() {
        0 => return Ok(None),
        1 => values.into_iter().collect::<Vec<_>>().join(""),
        _ => format!("({})", values.into_iter().collect::<Vec<_>>().join(" OR ")),
    };
    Ok(Some(format!("[0..0] {} != {}", type_id, value)))
}
