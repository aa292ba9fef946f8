//! Model configuration profiles
//!
//! One profile drives every component of the compiler. The AMT and NMPC
//! profiles differ in which levels exist, which reference sets scope
//! queries and which extension attributes are available.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::constants::*;
use super::level::{ModelLevel, ModelLevelType};
use crate::error::{CompilerError, CompilerResult};

/// Which terminology model a profile describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelType {
    Amt,
    Nmpc,
}

/// Configuration profile for one terminology model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfiguration {
    pub model_type: ModelType,
    pub module_id: String,
    pub levels: Vec<ModelLevel>,
    /// Query for the sub-packs of a package; `<id>` is replaced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subpack_from_package_ecl: Option<String>,
    /// String-valued attribute that queries cannot filter on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oii_attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_type_attribute: Option<String>,
    /// Attributes a bare medicinal product must not carry, in query order
    #[serde(default = "default_forbidden_product_attributes")]
    pub forbidden_product_attributes: Vec<String>,
    #[serde(default = "default_true")]
    pub execute_ecl_as_stated: bool,
}

fn default_true() -> bool {
    true
}

fn default_forbidden_product_attributes() -> Vec<String> {
    [
        HAS_MANUFACTURED_DOSE_FORM,
        COUNT_OF_ACTIVE_INGREDIENT,
        COUNT_OF_BASE_ACTIVE_INGREDIENT,
        HAS_ACTIVE_INGREDIENT,
        HAS_PRECISE_ACTIVE_INGREDIENT,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl ModelConfiguration {
    /// Australian Medicines Terminology profile
    pub fn amt() -> Self {
        use ModelLevelType::*;
        Self {
            model_type: ModelType::Amt,
            module_id: SCT_AU_MODULE.to_string(),
            levels: vec![
                ModelLevel::new(
                    RealContainerizedPackagedClinicalDrug,
                    "Containered Trade Product Pack",
                    "CTPP",
                    CONTAINERIZED_BRANDED_CLINICAL_DRUG_PACKAGE_SEMANTIC_TAG,
                    CONTAINERIZED_BRANDED_PHYSICAL_OBJECT_PACKAGE_SEMANTIC_TAG,
                    CTPP_REFSET_ID,
                ),
                ModelLevel::new(
                    RealPackagedClinicalDrug,
                    "Trade Product Pack",
                    "TPP",
                    BRANDED_CLINICAL_DRUG_PACKAGE_SEMANTIC_TAG,
                    BRANDED_PHYSICAL_OBJECT_PACKAGE_SEMANTIC_TAG,
                    TPP_REFSET_ID,
                )
                .with_ecl(&format!("(>><id>) AND (^{})", TPP_REFSET_ID)),
                ModelLevel::new(
                    PackagedClinicalDrug,
                    "Medicinal Product Pack",
                    "MPP",
                    CLINICAL_DRUG_PACKAGE_SEMANTIC_TAG,
                    PHYSICAL_OBJECT_PACKAGE_SEMANTIC_TAG,
                    MPP_REFSET_ID,
                )
                .with_ecl(&format!("(>><id>) AND (^{})", MPP_REFSET_ID)),
                ModelLevel::new(
                    ProductName,
                    "Trade Product",
                    "TP",
                    PRODUCT_SEMANTIC_TAG,
                    PRODUCT_SEMANTIC_TAG,
                    TP_REFSET_ID,
                )
                .with_ecl(&format!("<id>.{}", HAS_PRODUCT_NAME)),
                ModelLevel::new(
                    RealClinicalDrug,
                    "Trade Product Unit of Use",
                    "TPUU",
                    BRANDED_CLINICAL_DRUG_SEMANTIC_TAG,
                    BRANDED_PHYSICAL_OBJECT_SEMANTIC_TAG,
                    TPUU_REFSET_ID,
                ),
                ModelLevel::new(
                    ClinicalDrug,
                    "Medicinal Product Unit of Use",
                    "MPUU",
                    CLINICAL_DRUG_SEMANTIC_TAG,
                    PHYSICAL_OBJECT_SEMANTIC_TAG,
                    MPUU_REFSET_ID,
                )
                .with_ecl(&format!("(>><id>) AND (^{})", MPUU_REFSET_ID)),
                ModelLevel::new(
                    MedicinalProduct,
                    "Medicinal Product",
                    "MP",
                    MEDICINAL_PRODUCT_SEMANTIC_TAG,
                    PHYSICAL_OBJECT_SEMANTIC_TAG,
                    MP_REFSET_ID,
                )
                .with_ecl(&format!("(>><id>) AND (^{})", MP_REFSET_ID)),
            ],
            subpack_from_package_ecl: Some(format!(
                "((<id>.{}) OR (<id>.{}))",
                CONTAINS_PACKAGED_CD, SUBPACK
            )),
            oii_attribute: Some(HAS_OTHER_IDENTIFYING_INFORMATION.to_string()),
            container_type_attribute: Some(HAS_CONTAINER_TYPE.to_string()),
            forbidden_product_attributes: default_forbidden_product_attributes(),
            execute_ecl_as_stated: true,
        }
    }

    /// NHS medicinal product model profile
    pub fn nmpc() -> Self {
        use ModelLevelType::*;
        let level = |t, name: &str, label: &str, tag: &str, refset: &str| {
            ModelLevel::new(t, name, label, tag, PHYSICAL_OBJECT_SEMANTIC_TAG, refset)
        };
        Self {
            model_type: ModelType::Nmpc,
            module_id: "999000011000000103".to_string(),
            levels: vec![
                level(
                    RealPackagedClinicalDrug,
                    "Real Packaged Clinical Drug",
                    "RPCD",
                    "real packaged clinical drug",
                    "999000041000000102",
                ),
                level(
                    PackagedClinicalDrug,
                    "Packaged Clinical Drug",
                    "PCD",
                    "packaged clinical drug",
                    "999000051000000104",
                )
                .with_ecl("(>><id>) AND (^999000051000000104)"),
                level(ProductName, "Product Name", "PN", "product name", "999000061000000101")
                    .with_ecl(&format!("<id>.{}", HAS_PRODUCT_NAME)),
                level(
                    RealClinicalDrug,
                    "Real Clinical Drug",
                    "RCD",
                    "real clinical drug",
                    "999000071000000107",
                ),
                level(ClinicalDrug, "Clinical Drug", "CD", "clinical drug", "999000081000000109")
                    .with_ecl("(>><id>) AND (^999000081000000109)"),
                level(
                    RealMedicinalProduct,
                    "Real Medicinal Product",
                    "RMP",
                    "real medicinal product",
                    "999000091000000106",
                )
                .with_ecl("(>><id>) AND (^999000091000000106)"),
                level(
                    MedicinalProductOnly,
                    "Medicinal Product Only",
                    "MPO",
                    "medicinal product",
                    "999000101000000100",
                )
                .with_ecl("(>><id>) AND (^999000101000000100)"),
                level(
                    MedicinalProduct,
                    "Medicinal Product",
                    "MP",
                    "medicinal product",
                    "999000111000000103",
                )
                .with_ecl("(>><id>) AND (^999000111000000103)"),
            ],
            subpack_from_package_ecl: None,
            oii_attribute: None,
            container_type_attribute: None,
            forbidden_product_attributes: default_forbidden_product_attributes(),
            execute_ecl_as_stated: true,
        }
    }

    /// Reject duplicate types, names, labels or reference sets
    pub fn validate(&self) -> CompilerResult<()> {
        let mut types = HashSet::new();
        let mut names = HashSet::new();
        let mut labels = HashSet::new();
        let mut refsets = HashSet::new();
        for level in &self.levels {
            let duplicate = if !types.insert(level.model_level_type) {
                Some(format!("level type {}", level.model_level_type))
            } else if !names.insert(level.name.as_str()) {
                Some(format!("level name {}", level.name))
            } else if !labels.insert(level.display_label.as_str()) {
                Some(format!("display label {}", level.display_label))
            } else if !refsets.insert(level.reference_set_id.as_str()) {
                Some(format!("reference set {}", level.reference_set_id))
            } else {
                None
            };
            if let Some(what) = duplicate {
                return Err(CompilerError::InvalidConfiguration(format!(
                    "duplicate {} in {:?} model",
                    what, self.model_type
                )));
            }
        }
        self.leaf_package_level()?;
        self.leaf_product_level()?;
        Ok(())
    }

    pub fn package_levels(&self) -> Vec<&ModelLevel> {
        self.levels
            .iter()
            .filter(|l| l.model_level_type.is_package_level())
            .collect()
    }

    pub fn product_levels(&self) -> Vec<&ModelLevel> {
        self.levels
            .iter()
            .filter(|l| l.model_level_type.is_product_level())
            .collect()
    }

    pub fn level_of_type(&self, level_type: ModelLevelType) -> Option<&ModelLevel> {
        self.levels.iter().find(|l| l.model_level_type == level_type)
    }

    pub fn level_with_label(&self, label: &str) -> Option<&ModelLevel> {
        self.levels.iter().find(|l| l.display_label == label)
    }

    pub fn contains_level(&self, level_type: ModelLevelType) -> bool {
        self.level_of_type(level_type).is_some()
    }

    /// Nearest configured ancestors of a level
    pub fn parent_levels(&self, level_type: ModelLevelType) -> Vec<&ModelLevel> {
        let present: Vec<ModelLevelType> = level_type
            .ancestors()
            .iter()
            .copied()
            .filter(|t| self.contains_level(*t))
            .collect();
        present
            .iter()
            .filter(|t| !present.iter().any(|other| other.ancestors().contains(*t)))
            .filter_map(|t| self.level_of_type(*t))
            .collect()
    }

    pub fn leaf_package_level(&self) -> CompilerResult<&ModelLevel> {
        single_level(leaf_levels(&self.package_levels()), "leaf package")
    }

    pub fn leaf_product_level(&self) -> CompilerResult<&ModelLevel> {
        single_level(leaf_levels(&self.product_levels()), "leaf product")
    }

    pub fn root_product_level(&self) -> CompilerResult<&ModelLevel> {
        let levels = self.product_levels();
        let types: Vec<ModelLevelType> = levels.iter().map(|l| l.model_level_type).collect();
        let roots = levels
            .into_iter()
            .filter(|l| {
                !l.model_level_type
                    .ancestors()
                    .iter()
                    .any(|a| types.contains(a))
            })
            .collect();
        single_level(roots, "root product")
    }

    /// Reference set ids of every level, used to scope queries
    pub fn level_refset(&self, level_type: ModelLevelType) -> Option<&str> {
        self.level_of_type(level_type)
            .map(|l| l.reference_set_id.as_str())
    }

    /// Whether queries must stay within level reference sets
    pub fn enforce_refsets(&self) -> bool {
        self.model_type == ModelType::Amt
    }
}

fn leaf_levels<'a>(levels: &[&'a ModelLevel]) -> Vec<&'a ModelLevel> {
    let types: Vec<ModelLevelType> = levels.iter().map(|l| l.model_level_type).collect();
    levels
        .iter()
        .copied()
        .filter(|l| {
            !l.model_level_type
                .descendants()
                .iter()
                .any(|d| types.contains(d))
        })
        .collect()
}

fn single_level<'a>(levels: Vec<&'a ModelLevel>, what: &str) -> CompilerResult<&'a ModelLevel> {
    match levels.as_slice() {
        [single] => Ok(*single),
        [] => Err(CompilerError::InvalidConfiguration(format!("no {} level", what))),
        many => Err(CompilerError::InvalidConfiguration(format!(
            "more than one {} level: {}",
            what,
            many.iter()
                .map(|l| l.display_label.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ))),
    }
}
