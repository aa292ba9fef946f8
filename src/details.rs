//! Create-flow inputs: packages, contained products and their quantities
//!
//! These are the attribute trees a caller submits to compile a new
//! product. Decimal values are carried as text to keep the caller's
//! precision.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::graph::NonDefiningProperty;

/// A concept picked by the caller, with optional labels for name generation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptRef {
    pub concept_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fsn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pt: Option<String>,
}

impl ConceptRef {
    pub fn new(concept_id: impl Into<String>) -> Self {
        Self {
            concept_id: concept_id.into(),
            fsn: None,
            pt: None,
        }
    }

    pub fn labelled(concept_id: impl Into<String>, fsn: &str, pt: &str) -> Self {
        Self {
            concept_id: concept_id.into(),
            fsn: Some(fsn.to_string()),
            pt: Some(pt.to_string()),
        }
    }
}

/// A value with a unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quantity {
    pub value: String,
    pub unit: ConceptRef,
}

impl Quantity {
    pub fn new(value: impl Into<String>, unit: ConceptRef) -> Self {
        Self {
            value: value.into(),
            unit,
        }
    }

    pub fn numeric(&self) -> Option<f64> {
        self.value.trim().parse().ok()
    }

    /// Value with trailing fractional zeros trimmed, e.g. `"2.50"` becomes `"2.5"`
    pub fn formatted_value(&self) -> String {
        format_decimal(&self.value)
    }
}

/// Trim trailing fractional zeros and a dangling decimal point
pub fn format_decimal(value: &str) -> String {
    let value = value.trim();
    if !value.contains('.') {
        return value.to_string();
    }
    let trimmed = value.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() || trimmed == "-" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// One active ingredient of a product
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Ingredient {
    pub active_ingredient: Option<ConceptRef>,
    pub precise_ingredient: Option<ConceptRef>,
    pub basis_of_strength_substance: Option<ConceptRef>,
    pub total_quantity: Option<Quantity>,
    pub concentration_strength: Option<Quantity>,
}

/// A medicinal product or device contained in a package
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MedicationProductDetails {
    pub product_name: Option<ConceptRef>,
    pub generic_form: Option<ConceptRef>,
    pub specific_form: Option<ConceptRef>,
    pub container_type: Option<ConceptRef>,
    pub device_type: Option<ConceptRef>,
    pub other_identifying_information: Option<String>,
    /// Size of one unit, e.g. 5 mL
    pub quantity: Option<Quantity>,
    pub active_ingredients: Vec<Ingredient>,
    pub non_defining_properties: Vec<NonDefiningProperty>,
}

impl MedicationProductDetails {
    pub fn has_device_type(&self) -> bool {
        self.device_type.is_some()
    }

    /// Number of distinct active ingredients
    pub fn active_ingredient_count(&self) -> usize {
        let mut ids: Vec<&str> = self
            .active_ingredients
            .iter()
            .filter_map(|i| i.active_ingredient.as_ref().map(|c| c.concept_id.as_str()))
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }

    fn concept_refs(&self) -> impl Iterator<Item = &ConceptRef> {
        [
            &self.product_name,
            &self.generic_form,
            &self.specific_form,
            &self.container_type,
            &self.device_type,
        ]
        .into_iter()
        .flatten()
        .chain(self.quantity.iter().map(|q| &q.unit))
        .chain(self.active_ingredients.iter().flat_map(|i| {
            [
                &i.active_ingredient,
                &i.precise_ingredient,
                &i.basis_of_strength_substance,
            ]
            .into_iter()
            .flatten()
            .chain(i.total_quantity.iter().map(|q| &q.unit))
            .chain(i.concentration_strength.iter().map(|q| &q.unit))
        }))
    }
}

/// A contained product and how many of it the package holds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuantity {
    pub value: String,
    pub unit: ConceptRef,
    pub product_details: MedicationProductDetails,
}

impl ProductQuantity {
    pub fn quantity(&self) -> Quantity {
        Quantity::new(self.value.clone(), self.unit.clone())
    }
}

/// A contained sub-package and how many of it the package holds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageQuantity {
    pub value: String,
    pub unit: ConceptRef,
    pub package_details: PackageDetails,
}

impl PackageQuantity {
    pub fn quantity(&self) -> Quantity {
        Quantity::new(self.value.clone(), self.unit.clone())
    }
}

/// A package to compile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PackageDetails {
    pub product_name: Option<ConceptRef>,
    pub container_type: Option<ConceptRef>,
    pub contained_products: Vec<ProductQuantity>,
    pub contained_packages: Vec<PackageQuantity>,
    /// Candidates chosen by the caller on an earlier round
    pub selected_concept_identifiers: Vec<String>,
    pub refset_members: Vec<NonDefiningProperty>,
    pub non_defining_properties: Vec<NonDefiningProperty>,
}

impl PackageDetails {
    pub fn has_device_type(&self) -> bool {
        self.contained_products
            .iter()
            .any(|p| p.product_details.has_device_type())
            || self
                .contained_packages
                .iter()
                .any(|p| p.package_details.has_device_type())
    }

    /// Push this package's selections down into its sub-packages
    pub fn cascade_selected_identifiers(&mut self) {
        let selected = self.selected_concept_identifiers.clone();
        for contained in &mut self.contained_packages {
            let inner = &mut contained.package_details;
            for id in &selected {
                if !inner.selected_concept_identifiers.contains(id) {
                    inner.selected_concept_identifiers.push(id.clone());
                }
            }
            inner.cascade_selected_identifiers();
        }
    }

    /// Id to FSN hints for every labelled concept in the tree
    pub fn id_fsn_map(&self) -> HashMap<String, String> {
        self.label_map(fsn_of)
    }

    /// Id to preferred term hints for every labelled concept in the tree
    pub fn id_pt_map(&self) -> HashMap<String, String> {
        self.label_map(pt_of)
    }

    fn label_map(&self, label: fn(&ConceptRef) -> Option<&String>) -> HashMap<String, String> {
        let mut refs: Vec<&ConceptRef> = Vec::new();
        refs.extend(self.product_name.iter());
        refs.extend(self.container_type.iter());
        for product in &self.contained_products {
            refs.push(&product.unit);
            refs.extend(product.product_details.concept_refs());
        }
        refs.extend(self.contained_packages.iter().map(|p| &p.unit));

        let mut map: HashMap<String, String> = refs
            .into_iter()
            .filter_map(|c| label(c).map(|text| (c.concept_id.clone(), text.clone())))
            .collect();
        for package in &self.contained_packages {
            map.extend(package.package_details.label_map(label));
        }
        map
    }
}

fn fsn_of(concept: &ConceptRef) -> Option<&String> {
    concept.fsn.as_ref()
}

fn pt_of(concept: &ConceptRef) -> Option<&String> {
    concept.pt.as_ref()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tablet_pack() -> PackageDetails {
        PackageDetails {
            product_name: Some(ConceptRef::labelled("1", "Panadol (product name)", "Panadol")),
            container_type: Some(ConceptRef::new("2")),
            contained_products: vec![ProductQuantity {
                value: "20".to_string(),
                unit: ConceptRef::labelled("732935002", "Unit of presentation", "each"),
                product_details: MedicationProductDetails {
                    generic_form: Some(ConceptRef::labelled("3", "Tablet (dose form)", "tablet")),
                    active_ingredients: vec![Ingredient {
                        active_ingredient: Some(ConceptRef::labelled("4", "Paracetamol (substance)", "paracetamol")),
                        ..Default::default()
                    }],
                    ..Default::default()
                },
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_format_decimal() {
        assert_eq!(format_decimal("500.000"), "500");
        assert_eq!(format_decimal("2.50"), "2.5");
        assert_eq!(format_decimal("20"), "20");
        assert_eq!(format_decimal("0.0"), "0");
    }

    #[test]
    fn test_label_maps_cover_nested_concepts() {
        let mut outer = PackageDetails {
            selected_concept_identifiers: vec!["99".to_string()],
            ..Default::default()
        };
        outer.contained_packages.push(PackageQuantity {
            value: "2".to_string(),
            unit: ConceptRef::new("732935002"),
            package_details: tablet_pack(),
        });
        let fsn = outer.id_fsn_map();
        assert_eq!(fsn.get("4").map(String::as_str), Some("Paracetamol (substance)"));
        assert_eq!(outer.id_pt_map().get("1").map(String::as_str), Some("Panadol"));

        outer.cascade_selected_identifiers();
        assert_eq!(
            outer.contained_packages[0].package_details.selected_concept_identifiers,
            vec!["99".to_string()]
        );
    }

    #[test]
    fn test_package_details_from_json() {
        let json = r#"{
            "productName": {"conceptId": "1"},
            "containedProducts": [{
                "value": "30",
                "unit": {"conceptId": "732935002"},
                "productDetails": {"genericForm": {"conceptId": "3"}, "activeIngredients": [{"activeIngredient": {"conceptId": "4"}}]}
            }]
        }"#;
        let details: PackageDetails = serde_json::from_str(json).unwrap();
        assert_eq!(details.contained_products[0].product_details.active_ingredient_count(), 1);
        assert!(!details.has_device_type());
    }
}
