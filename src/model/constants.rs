//! Well-known concept identifiers
//!
//! Core SNOMED CT ids plus the Australian Medicines Terminology extension
//! attributes. Constants listed in [`LABELLED`] seed the placeholder cache so
//! generated axioms read with human labels.

// Core attributes
pub const IS_A: &str = "116680003";
pub const HAS_ACTIVE_INGREDIENT: &str = "127489000";
pub const HAS_PRECISE_ACTIVE_INGREDIENT: &str = "762949000";
pub const HAS_BOSS: &str = "732943007";
pub const CONTAINS_CD: &str = "774160008";
pub const HAS_PACK_SIZE_UNIT: &str = "774163005";
pub const HAS_PACK_SIZE_VALUE: &str = "1142142004";
pub const HAS_PRODUCT_NAME: &str = "774158006";
pub const HAS_MANUFACTURED_DOSE_FORM: &str = "411116001";
pub const COUNT_OF_ACTIVE_INGREDIENT: &str = "1142140007";
pub const COUNT_OF_BASE_ACTIVE_INGREDIENT: &str = "1142139005";
pub const ROLE_GROUP: &str = "609096000";

// Roots and metadata
pub const MEDICINAL_PRODUCT: &str = "763158003";
pub const MEDICINAL_PRODUCT_PACKAGE: &str = "781405001";
pub const DEFINED: &str = "900000000000073002";
pub const PRIMITIVE: &str = "900000000000074008";
pub const UNIT_OF_PRESENTATION: &str = "732935002";
pub const PACK: &str = "706437002";
pub const PACKAGE: &str = "999000071000168104";
pub const UNIT_MG: &str = "258684004";
pub const UNIT_ML: &str = "258773002";
pub const SCT_AU_MODULE: &str = "32506021000036107";

// AMT extension attributes
pub const HAS_CONTAINER_TYPE: &str = "30465011000036106";
pub const HAS_OTHER_IDENTIFYING_INFORMATION: &str = "999000001000168109";
pub const CONTAINS_PACKAGED_CD: &str = "999000011000168107";
pub const CONTAINS_DEVICE: &str = "999000081000168101";
pub const SUBPACK: &str = "999000111000168106";
pub const HAS_DEVICE_TYPE: &str = "999000061000168105";
pub const HAS_TOTAL_QUANTITY_VALUE: &str = "999000041000168106";
pub const HAS_TOTAL_QUANTITY_UNIT: &str = "999000051000168108";
pub const CONCENTRATION_STRENGTH_VALUE: &str = "999000021000168100";
pub const CONCENTRATION_STRENGTH_UNIT: &str = "999000031000168102";
pub const COUNT_OF_CONTAINED_COMPONENT_INGREDIENT: &str = "1142143009";
pub const COUNT_OF_CONTAINED_PACKAGE_TYPE: &str = "1142144003";
pub const COUNT_OF_CD_TYPE: &str = "1142141006";
pub const NO_OII_VALUE: &str = "None";

// AMT reference sets
pub const CTPP_REFSET_ID: &str = "929360051000036108";
pub const TPP_REFSET_ID: &str = "929360041000036105";
pub const MPP_REFSET_ID: &str = "929360081000036101";
pub const TP_REFSET_ID: &str = "929360021000036102";
pub const TPUU_REFSET_ID: &str = "929360031000036100";
pub const MPUU_REFSET_ID: &str = "929360071000036103";
pub const MP_REFSET_ID: &str = "929360061000036106";

// Semantic tags
pub const MEDICINAL_PRODUCT_SEMANTIC_TAG: &str = "medicinal product";
pub const CLINICAL_DRUG_SEMANTIC_TAG: &str = "clinical drug";
pub const BRANDED_CLINICAL_DRUG_SEMANTIC_TAG: &str = "branded clinical drug";
pub const CONTAINERIZED_BRANDED_CLINICAL_DRUG_PACKAGE_SEMANTIC_TAG: &str =
    "containerized branded clinical drug package";
pub const BRANDED_CLINICAL_DRUG_PACKAGE_SEMANTIC_TAG: &str = "branded clinical drug package";
pub const CLINICAL_DRUG_PACKAGE_SEMANTIC_TAG: &str = "clinical drug package";
pub const PRODUCT_SEMANTIC_TAG: &str = "product";
pub const PHYSICAL_OBJECT_SEMANTIC_TAG: &str = "physical object";
pub const BRANDED_PHYSICAL_OBJECT_SEMANTIC_TAG: &str = "branded physical object";
pub const BRANDED_PHYSICAL_OBJECT_PACKAGE_SEMANTIC_TAG: &str = "branded physical object package";
pub const CONTAINERIZED_BRANDED_PHYSICAL_OBJECT_PACKAGE_SEMANTIC_TAG: &str =
    "containerized branded physical object package";
pub const PHYSICAL_OBJECT_PACKAGE_SEMANTIC_TAG: &str = "physical object package";

/// Constants with a display label, as (id, label)
pub const LABELLED: &[(&str, &str)] = &[
    (HAS_PRECISE_ACTIVE_INGREDIENT, "Has precise active ingredient (attribute)"),
    (IS_A, "Is a (attribute)"),
    (HAS_ACTIVE_INGREDIENT, "Has active ingredient (attribute)"),
    (HAS_BOSS, "Has basis of strength substance (attribute)"),
    (CONTAINS_CD, "Contains clinical drug (attribute)"),
    (HAS_PACK_SIZE_UNIT, "Has pack size unit (attribute)"),
    (HAS_PACK_SIZE_VALUE, "Has pack size (attribute)"),
    (HAS_PRODUCT_NAME, "Has product name (attribute)"),
    (HAS_MANUFACTURED_DOSE_FORM, "Has manufactured dose form (attribute)"),
    (
        DEFINED,
        "Sufficiently defined by necessary conditions definition status (core metadata concept)",
    ),
    (
        PRIMITIVE,
        "Not sufficiently defined by necessary conditions definition status (core metadata concept)",
    ),
    (MEDICINAL_PRODUCT, "Medicinal product (product)"),
    (MEDICINAL_PRODUCT_PACKAGE, "Medicinal product package (product)"),
    (UNIT_OF_PRESENTATION, "Unit of presentation (unit of presentation)"),
    (COUNT_OF_ACTIVE_INGREDIENT, "Count of active ingredient (attribute)"),
    (COUNT_OF_BASE_ACTIVE_INGREDIENT, "Count of base of active ingredient (attribute)"),
    (ROLE_GROUP, "Role group (attribute)"),
    (PACK, "Pack"),
    (PACKAGE, "Package (physical object)"),
    (UNIT_MG, "mg"),
    (UNIT_ML, "mL"),
    (HAS_CONTAINER_TYPE, "Has container type (attribute)"),
    (HAS_OTHER_IDENTIFYING_INFORMATION, "Has other identifying information (attribute)"),
    (CONTAINS_PACKAGED_CD, "Contains packaged clinical drug (attribute)"),
    (CONTAINS_DEVICE, "Contains device (attribute)"),
    (HAS_DEVICE_TYPE, "Has device type (attribute)"),
    (HAS_TOTAL_QUANTITY_VALUE, "Has total quantity value (attribute)"),
    (HAS_TOTAL_QUANTITY_UNIT, "Has total quantity unit (attribute)"),
    (CONCENTRATION_STRENGTH_VALUE, "Has concentration strength value (attribute)"),
    (CONCENTRATION_STRENGTH_UNIT, "Has concentration strength unit (attribute)"),
    (
        COUNT_OF_CONTAINED_COMPONENT_INGREDIENT,
        "Count of contained component ingredient (attribute)",
    ),
    (COUNT_OF_CONTAINED_PACKAGE_TYPE, "Count of contained package type (attribute)"),
    (COUNT_OF_CD_TYPE, "Count of clinical drug type (attribute)"),
];

/// Display label of a labelled constant
pub fn label_of(id: &str) -> Option<&'static str> {
    LABELLED.iter().find(|(c, _)| *c == id).map(|(_, label)| *label)
}
