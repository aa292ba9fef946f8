//! Model levels
//!
//! A level is one position in the product hierarchy, such as the medicinal
//! product (MP) or the containerized trade product pack (CTPP).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of hierarchy position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelLevelType {
    MedicinalProduct,
    MedicinalProductOnly,
    RealMedicinalProduct,
    ClinicalDrug,
    RealClinicalDrug,
    PackagedClinicalDrug,
    RealPackagedClinicalDrug,
    RealContainerizedPackagedClinicalDrug,
    ProductName,
}

impl ModelLevelType {
    pub const ALL: [ModelLevelType; 9] = [
        ModelLevelType::MedicinalProduct,
        ModelLevelType::MedicinalProductOnly,
        ModelLevelType::RealMedicinalProduct,
        ModelLevelType::ClinicalDrug,
        ModelLevelType::RealClinicalDrug,
        ModelLevelType::PackagedClinicalDrug,
        ModelLevelType::RealPackagedClinicalDrug,
        ModelLevelType::RealContainerizedPackagedClinicalDrug,
        ModelLevelType::ProductName,
    ];

    /// All types this one specialises, nearest first
    pub fn ancestors(&self) -> &'static [ModelLevelType] {
        use ModelLevelType::*;
        match self {
            MedicinalProduct | PackagedClinicalDrug | ProductName => &[],
            MedicinalProductOnly => &[MedicinalProduct],
            RealMedicinalProduct => &[MedicinalProductOnly, MedicinalProduct],
            ClinicalDrug => &[MedicinalProductOnly, MedicinalProduct],
            RealClinicalDrug => &[
                ClinicalDrug,
                RealMedicinalProduct,
                MedicinalProductOnly,
                MedicinalProduct,
            ],
            RealPackagedClinicalDrug => &[PackagedClinicalDrug],
            RealContainerizedPackagedClinicalDrug => {
                &[RealPackagedClinicalDrug, PackagedClinicalDrug]
            }
        }
    }

    pub fn descendants(&self) -> Vec<ModelLevelType> {
        Self::ALL
            .iter()
            .copied()
            .filter(|t| t.ancestors().contains(self))
            .collect()
    }

    pub fn is_branded(&self) -> bool {
        matches!(
            self,
            ModelLevelType::RealMedicinalProduct
                | ModelLevelType::RealClinicalDrug
                | ModelLevelType::RealPackagedClinicalDrug
                | ModelLevelType::RealContainerizedPackagedClinicalDrug
        )
    }

    pub fn is_containerized(&self) -> bool {
        matches!(self, ModelLevelType::RealContainerizedPackagedClinicalDrug)
    }

    pub fn is_package_level(&self) -> bool {
        matches!(
            self,
            ModelLevelType::PackagedClinicalDrug
                | ModelLevelType::RealPackagedClinicalDrug
                | ModelLevelType::RealContainerizedPackagedClinicalDrug
        )
    }

    pub fn is_product_level(&self) -> bool {
        !self.is_package_level() && *self != ModelLevelType::ProductName
    }

    /// Product level a package level directly contains
    pub fn contained_product_level(&self) -> Option<ModelLevelType> {
        match self {
            ModelLevelType::PackagedClinicalDrug => Some(ModelLevelType::ClinicalDrug),
            ModelLevelType::RealPackagedClinicalDrug
            | ModelLevelType::RealContainerizedPackagedClinicalDrug => {
                Some(ModelLevelType::RealClinicalDrug)
            }
            _ => None,
        }
    }
}

impl fmt::Display for ModelLevelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelLevelType::MedicinalProduct => "MEDICINAL_PRODUCT",
            ModelLevelType::MedicinalProductOnly => "MEDICINAL_PRODUCT_ONLY",
            ModelLevelType::RealMedicinalProduct => "REAL_MEDICINAL_PRODUCT",
            ModelLevelType::ClinicalDrug => "CLINICAL_DRUG",
            ModelLevelType::RealClinicalDrug => "REAL_CLINICAL_DRUG",
            ModelLevelType::PackagedClinicalDrug => "PACKAGED_CLINICAL_DRUG",
            ModelLevelType::RealPackagedClinicalDrug => "REAL_PACKAGED_CLINICAL_DRUG",
            ModelLevelType::RealContainerizedPackagedClinicalDrug => {
                "REAL_CONTAINERIZED_PACKAGED_CLINICAL_DRUG"
            }
            ModelLevelType::ProductName => "PRODUCT_NAME",
        };
        write!(f, "{}", name)
    }
}

/// One configured hierarchy position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelLevel {
    pub model_level_type: ModelLevelType,
    pub name: String,
    /// Short label used on graph nodes, e.g. "MPUU"
    pub display_label: String,
    pub medicine_semantic_tag: String,
    pub device_semantic_tag: String,
    pub reference_set_id: String,
    /// Query locating this level's concept from a root concept; `<id>` is replaced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_model_ecl: Option<String>,
}

impl ModelLevel {
    pub fn new(
        model_level_type: ModelLevelType,
        name: &str,
        display_label: &str,
        medicine_semantic_tag: &str,
        device_semantic_tag: &str,
        reference_set_id: &str,
    ) -> Self {
        Self {
            model_level_type,
            name: name.to_string(),
            display_label: display_label.to_string(),
            medicine_semantic_tag: medicine_semantic_tag.to_string(),
            device_semantic_tag: device_semantic_tag.to_string(),
            reference_set_id: reference_set_id.to_string(),
            product_model_ecl: None,
        }
    }

    pub fn with_ecl(mut self, ecl: &str) -> Self {
        self.product_model_ecl = Some(ecl.to_string());
        self
    }

    pub fn is_branded(&self) -> bool {
        self.model_level_type.is_branded()
    }

    pub fn is_containerized(&self) -> bool {
        self.model_level_type.is_containerized()
    }

    /// The level's query with `<id>` bound to a concrete concept
    pub fn ecl_for(&self, concept_id: &str) -> Option<String> {
        self.product_model_ecl
            .as_ref()
            .map(|ecl| ecl.replace("<id>", concept_id))
    }
}
