//! Candidate relationship sets for each kind of hierarchy position

use std::collections::{BTreeSet, HashSet};

use terminology_sdk::ConcreteValue;

use crate::details::{ConceptRef, MedicationProductDetails, PackageDetails, PackageQuantity, ProductQuantity, Quantity};
use crate::ecl::QueryOptions;
use crate::graph::{Identifier, Relationship};
use crate::model::constants::*;
use crate::model::{ModelConfiguration, ModelLevel, ModelLevelType, ModelType};

fn concept(type_id: &str, target: &ConceptRef, group: u32) -> Relationship {
    Relationship::to_concept(type_id, Identifier::real(target.concept_id.clone()), group)
}

fn decimal(type_id: &str, value: &str, group: u32) -> Relationship {
    Relationship::to_value(type_id, ConcreteValue::decimal(crate::details::format_decimal(value)), group)
}

fn count(type_id: &str, value: usize, group: u32) -> Relationship {
    Relationship::to_value(type_id, ConcreteValue::integer(value as i64), group)
}

/// Value and unit of a quantity in one role group
fn quantity(value_type: &str, unit_type: &str, quantity: &Quantity, group: u32) -> [Relationship; 2] {
    [
        decimal(value_type, &quantity.value, group),
        concept(unit_type, &quantity.unit, group),
    ]
}

fn parents_or_root(parents: &[Identifier], root: &str) -> Vec<Relationship> {
    if parents.is_empty() {
        vec![Relationship::is_a(Identifier::real(root))]
    } else {
        parents.iter().cloned().map(Relationship::is_a).collect()
    }
}

/// Medicinal product style levels: ingredients only, plus brand when branded
pub fn medicinal_product_relationships(
    product: &MedicationProductDetails,
    level: &ModelLevel,
) -> BTreeSet<Relationship> {
    let mut relationships = BTreeSet::new();
    relationships.insert(Relationship::is_a(Identifier::real(MEDICINAL_PRODUCT)));
    let mut group = 1;
    for ingredient in &product.active_ingredients {
        if let Some(active) = &ingredient.active_ingredient {
            relationships.insert(concept(HAS_ACTIVE_INGREDIENT, active, group));
            group += 1;
        }
    }
    if level.is_branded() {
        if let Some(name) = &product.product_name {
            relationships.insert(concept(HAS_PRODUCT_NAME, name, 0));
        }
    }
    relationships
}

/// Clinical drug (unit of use) levels
pub fn clinical_drug_relationships(
    product: &MedicationProductDetails,
    level: &ModelLevel,
    parents: &[Identifier],
    model: &ModelConfiguration,
) -> BTreeSet<Relationship> {
    let amt = model.model_type == ModelType::Amt;
    let branded = level.is_branded();
    let mut relationships: BTreeSet<Relationship> =
        parents_or_root(parents, MEDICINAL_PRODUCT).into_iter().collect();

    if branded {
        if let Some(name) = &product.product_name {
            relationships.insert(concept(HAS_PRODUCT_NAME, name, 0));
        }
        if let Some(oii) = &model.oii_attribute {
            let value = product
                .other_identifying_information
                .clone()
                .unwrap_or_else(|| NO_OII_VALUE.to_string());
            relationships.insert(Relationship::to_value(oii.as_str(), ConcreteValue::string(value), 0));
        }
    }

    if let Some(container_attribute) = &model.container_type_attribute {
        if let Some(container) = &product.container_type {
            relationships.insert(concept(container_attribute, container, 0));
        }
        if let Some(device) = &product.device_type {
            relationships.insert(concept(HAS_DEVICE_TYPE, device, 0));
        }
    }

    let form = match (&product.specific_form, &product.generic_form) {
        (Some(specific), _) if branded => Some(specific),
        (_, generic) => generic.as_ref(),
    };
    if let Some(form) = form {
        relationships.insert(concept(HAS_MANUFACTURED_DOSE_FORM, form, 0));
    }

    let mut group = 1;
    if let Some(size) = &product.quantity {
        relationships.extend(quantity(HAS_PACK_SIZE_VALUE, HAS_PACK_SIZE_UNIT, size, group));
        group += 1;
    }

    for ingredient in &product.active_ingredients {
        if amt {
            if let Some(active) = &ingredient.active_ingredient {
                relationships.insert(concept(HAS_ACTIVE_INGREDIENT, active, group));
            }
        }
        if let Some(precise) = &ingredient.precise_ingredient {
            relationships.insert(concept(HAS_PRECISE_ACTIVE_INGREDIENT, precise, group));
        }
        if let Some(boss) = &ingredient.basis_of_strength_substance {
            relationships.insert(concept(HAS_BOSS, boss, group));
        }
        if let Some(total) = &ingredient.total_quantity {
            relationships.extend(quantity(HAS_TOTAL_QUANTITY_VALUE, HAS_TOTAL_QUANTITY_UNIT, total, group));
        }
        if let Some(strength) = &ingredient.concentration_strength {
            relationships.extend(quantity(
                CONCENTRATION_STRENGTH_VALUE,
                CONCENTRATION_STRENGTH_UNIT,
                strength,
                group,
            ));
        }
        group += 1;
    }

    if amt && branded {
        relationships.insert(count(COUNT_OF_ACTIVE_INGREDIENT, product.active_ingredient_count(), 0));
    }
    relationships
}

/// Package levels. `products` and `packages` pair each contained item with the
/// node it resolved to at the level this package points at.
pub fn package_relationships(
    details: &PackageDetails,
    level: &ModelLevel,
    products: &[(&ProductQuantity, Identifier)],
    packages: &[(&PackageQuantity, Identifier)],
    model: &ModelConfiguration,
) -> BTreeSet<Relationship> {
    let amt = model.model_type == ModelType::Amt;
    let mut relationships = BTreeSet::new();
    relationships.insert(Relationship::is_a(Identifier::real(MEDICINAL_PRODUCT_PACKAGE)));

    if level.is_branded() && level.is_containerized() {
        if let (Some(attribute), Some(container)) = (&model.container_type_attribute, &details.container_type) {
            relationships.insert(concept(attribute, container, 0));
        }
    }
    if level.is_branded() {
        if let Some(name) = &details.product_name {
            relationships.insert(concept(HAS_PRODUCT_NAME, name, 0));
        }
    }

    let mut group = 1;
    let mut distinct_products = HashSet::new();
    for (quantity, target) in products {
        distinct_products.insert(target.clone());
        relationships.insert(Relationship::to_concept(CONTAINS_CD, target.clone(), group));
        relationships.insert(concept(HAS_PACK_SIZE_UNIT, &quantity.unit, group));
        relationships.insert(decimal(HAS_PACK_SIZE_VALUE, &quantity.value, group));
        if amt {
            relationships.insert(count(
                COUNT_OF_CONTAINED_COMPONENT_INGREDIENT,
                quantity.product_details.active_ingredient_count(),
                group,
            ));
        }
        group += 1;
    }
    if !products.is_empty() {
        relationships.insert(count(COUNT_OF_CD_TYPE, distinct_products.len(), 0));
    }

    let mut distinct_packages = HashSet::new();
    for (quantity, target) in packages {
        distinct_packages.insert(target.clone());
        relationships.insert(Relationship::to_concept(CONTAINS_PACKAGED_CD, target.clone(), group));
        relationships.insert(concept(HAS_PACK_SIZE_UNIT, &quantity.unit, group));
        relationships.insert(decimal(HAS_PACK_SIZE_VALUE, &quantity.value, group));
        group += 1;
    }
    if !packages.is_empty() {
        relationships.insert(count(COUNT_OF_CONTAINED_PACKAGE_TYPE, distinct_packages.len(), 0));
    }
    relationships
}

/// Query flags for a product level
pub fn product_options(level: &ModelLevel) -> QueryOptions {
    match level.model_level_type {
        ModelLevelType::ClinicalDrug | ModelLevelType::RealClinicalDrug => QueryOptions {
            suppress_subsumption: !level.is_branded(),
            suppress_negative_constraints: false,
        },
        _ => QueryOptions::default(),
    }
}

/// Query flags for a package level
pub fn package_options(level: &ModelLevel) -> QueryOptions {
    QueryOptions {
        suppress_subsumption: true,
        suppress_negative_constraints: level.model_level_type == ModelLevelType::PackagedClinicalDrug,
    }
}

/// Whether a level's candidate set is built by the clinical drug rules
pub fn is_clinical_drug(level_type: ModelLevelType) -> bool {
    matches!(level_type, ModelLevelType::ClinicalDrug | ModelLevelType::RealClinicalDrug)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::details::Ingredient;
    use crate::graph::RelationshipTarget;

    fn amoxicillin() -> MedicationProductDetails {
        MedicationProductDetails {
            product_name: Some(ConceptRef::new("1001")),
            generic_form: Some(ConceptRef::new("385055001")),
            specific_form: Some(ConceptRef::new("385057009")),
            active_ingredients: vec![Ingredient {
                active_ingredient: Some(ConceptRef::new("372687004")),
                precise_ingredient: Some(ConceptRef::new("96068000")),
                basis_of_strength_substance: Some(ConceptRef::new("372687004")),
                total_quantity: Some(Quantity::new("500.000", ConceptRef::new(UNIT_MG))),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn has(relationships: &BTreeSet<Relationship>, type_id: &str, group: u32) -> bool {
        relationships.iter().any(|r| r.type_id == type_id && r.group == group)
    }

    #[test]
    fn test_unbranded_clinical_drug() {
        let model = ModelConfiguration::amt();
        let level = model.level_of_type(ModelLevelType::ClinicalDrug).unwrap();
        let rels = clinical_drug_relationships(&amoxicillin(), level, &[], &model);
        assert!(rels.contains(&Relationship::is_a(Identifier::real(MEDICINAL_PRODUCT))));
        assert!(rels.contains(&Relationship::to_concept(
            HAS_MANUFACTURED_DOSE_FORM,
            Identifier::real("385055001"),
            0
        )));
        assert!(!has(&rels, HAS_PRODUCT_NAME, 0));
        assert!(!has(&rels, COUNT_OF_ACTIVE_INGREDIENT, 0));
        assert!(rels.contains(&Relationship::to_value(
            HAS_TOTAL_QUANTITY_VALUE,
            ConcreteValue::decimal("500"),
            1
        )));
        assert!(has(&rels, HAS_BOSS, 1));
    }

    #[test]
    fn test_branded_clinical_drug_under_parent() {
        let model = ModelConfiguration::amt();
        let level = model.level_of_type(ModelLevelType::RealClinicalDrug).unwrap();
        let rels = clinical_drug_relationships(&amoxicillin(), level, &[Identifier::Placeholder(-2)], &model);
        assert!(rels.contains(&Relationship::is_a(Identifier::Placeholder(-2))));
        assert!(!rels.contains(&Relationship::is_a(Identifier::real(MEDICINAL_PRODUCT))));
        assert!(rels.contains(&Relationship::to_concept(
            HAS_MANUFACTURED_DOSE_FORM,
            Identifier::real("385057009"),
            0
        )));
        assert!(rels.contains(&Relationship::to_value(
            HAS_OTHER_IDENTIFYING_INFORMATION,
            ConcreteValue::string(NO_OII_VALUE),
            0
        )));
        assert!(rels.contains(&Relationship::to_value(COUNT_OF_ACTIVE_INGREDIENT, ConcreteValue::integer(1), 0)));
    }

    #[test]
    fn test_package_groups() {
        let model = ModelConfiguration::amt();
        let level = model
            .level_of_type(ModelLevelType::RealContainerizedPackagedClinicalDrug)
            .unwrap();
        let contained = ProductQuantity {
            value: "20".to_string(),
            unit: ConceptRef::new(UNIT_OF_PRESENTATION),
            product_details: amoxicillin(),
        };
        let details = PackageDetails {
            product_name: Some(ConceptRef::new("1001")),
            container_type: Some(ConceptRef::new("2002")),
            contained_products: vec![contained.clone()],
            ..Default::default()
        };
        let rels = package_relationships(
            &details,
            level,
            &[(&contained, Identifier::Placeholder(-3))],
            &[],
            &model,
        );
        assert!(rels.contains(&Relationship::to_concept(CONTAINS_CD, Identifier::Placeholder(-3), 1)));
        assert!(has(&rels, HAS_CONTAINER_TYPE, 0));
        assert!(has(&rels, HAS_PRODUCT_NAME, 0));
        assert!(rels.contains(&Relationship::to_value(COUNT_OF_CD_TYPE, ConcreteValue::integer(1), 0)));
        assert!(!has(&rels, COUNT_OF_CONTAINED_PACKAGE_TYPE, 0));
        let placeholders: Vec<_> = rels
            .iter()
            .filter(|r| matches!(r.target, RelationshipTarget::Concept(Identifier::Placeholder(_))))
            .collect();
        assert_eq!(placeholders.len(), 1);
    }

    #[test]
    fn test_package_options() {
        let model = ModelConfiguration::nmpc();
        let pcd = model.level_of_type(ModelLevelType::PackagedClinicalDrug).unwrap();
        let rpcd = model.level_of_type(ModelLevelType::RealPackagedClinicalDrug).unwrap();
        assert!(package_options(pcd).suppress_negative_constraints);
        assert!(!package_options(rpcd).suppress_negative_constraints);
        assert!(package_options(rpcd).suppress_subsumption);
    }
}
