//! Validation of create-flow inputs, one validator per model type

use std::collections::HashMap;

use crate::details::{Ingredient, MedicationProductDetails, PackageDetails, ProductQuantity};
use crate::error::{CompilerError, CompilerResult};
use crate::model::constants::{PACK, UNIT_OF_PRESENTATION};
use crate::model::ModelType;

/// Checks a package tree before any query is sent
pub trait DetailsValidator: Send + Sync {
    fn validate_package(&self, details: &PackageDetails) -> CompilerResult<()>;
}

/// Problems found while walking a package tree
#[derive(Debug, Default)]
struct Problems {
    general: Vec<String>,
    units: Vec<String>,
}

impl Problems {
    fn add(&mut self, problem: impl Into<String>) {
        self.general.push(problem.into());
    }

    fn add_unit(&mut self, problem: impl Into<String>) {
        self.units.push(problem.into());
    }

    fn into_result(self) -> CompilerResult<()> {
        if !self.general.is_empty() {
            let mut all = self.general;
            all.extend(self.units);
            Err(CompilerError::Validation(all.join("; ")))
        } else if !self.units.is_empty() {
            Err(CompilerError::MismatchedUnits(self.units.join("; ")))
        } else {
            Ok(())
        }
    }
}

fn is_each(unit_id: &str) -> bool {
    unit_id == UNIT_OF_PRESENTATION
}

fn is_whole_number(value: &str) -> bool {
    value
        .trim()
        .parse::<f64>()
        .map_or(false, |v| v > 0.0 && v.fract() == 0.0)
}

fn is_positive(value: &str) -> bool {
    value.trim().parse::<f64>().map_or(false, |v| v > 0.0)
}

/// Australian Medicines Terminology medication rules
#[derive(Debug, Default)]
pub struct AmtMedicationValidator;

impl AmtMedicationValidator {
    fn check_package(&self, details: &PackageDetails, nested: bool, problems: &mut Problems) {
        if details.product_name.is_none() {
            problems.add("Product name must be populated");
        }
        if details.container_type.is_none() {
            problems.add("Container type must be populated");
        }
        if details.contained_products.is_empty() == details.contained_packages.is_empty() {
            problems.add("Either contained products or contained packages must be populated, but not both");
        }
        if nested && !details.contained_packages.is_empty() {
            problems.add("A contained package must not contain further packages");
        }
        if !details.contained_packages.is_empty() {
            if details
                .contained_packages
                .iter()
                .any(|p| !is_each(&p.unit.concept_id))
            {
                problems.add_unit("Contained packages must use a unit of 'each'");
            }
            if details.container_type.as_ref().map(|c| c.concept_id.as_str()) != Some(PACK) {
                problems.add("A package containing other packages must have a container type of 'Pack'");
            }
        }
        for package in &details.contained_packages {
            if is_each(&package.unit.concept_id) && !is_whole_number(&package.value) {
                problems.add_unit("Package quantity must be a whole number when the unit is 'each'");
            }
            self.check_package(&package.package_details, true, problems);
        }
        for product in &details.contained_products {
            self.check_product_quantity(product, problems);
        }
    }

    fn check_product_quantity(&self, quantity: &ProductQuantity, problems: &mut Problems) {
        let product = &quantity.product_details;
        if (product.container_type.is_some() || product.device_type.is_some() || product.quantity.is_some())
            && (!is_each(&quantity.unit.concept_id) || !is_whole_number(&quantity.value))
        {
            problems.add_unit(
                "Product quantity must be a positive whole number and unit each if a container type or device type are specified",
            );
        }
        self.check_product(product, problems);
    }

    fn check_product(&self, product: &MedicationProductDetails, problems: &mut Problems) {
        let form = product.generic_form.is_some();
        let container = product.container_type.is_some();
        let device = product.device_type.is_some();
        if !form && !container && !device {
            problems.add("One of form, container type or device type must be populated");
        }
        if product.specific_form.is_some() && !form {
            problems.add("Specific form can only be populated if generic form is populated");
        }
        if container && !form {
            problems.add("If container type is populated, form must be populated");
        }
        if form && device {
            problems.add("If form is populated, device type must not be populated");
        }
        if product.product_name.is_none() {
            problems.add("Product name must be populated");
        }
        for ingredient in &product.active_ingredients {
            check_ingredient(ingredient, problems);
            check_strength(product, ingredient, problems);
        }
    }
}

fn check_ingredient(ingredient: &Ingredient, problems: &mut Problems) {
    let active = ingredient.active_ingredient.is_some();
    if !active {
        problems.add("Active ingredient must be populated");
    }
    if !active && ingredient.basis_of_strength_substance.is_some() {
        problems.add("Basis of strength substance can only be populated if active ingredient is populated");
    }
    if !active && ingredient.precise_ingredient.is_some() {
        problems.add("Precise ingredient can only be populated if active ingredient is populated");
    }
    if ingredient.basis_of_strength_substance.is_some()
        && ingredient.total_quantity.is_none()
        && ingredient.concentration_strength.is_none()
    {
        problems.add(
            "Basis of strength substance is populated but neither total quantity or concentration strength are populated",
        );
    }
}

/// Concentration must equal total quantity over product size, within 1%
fn check_strength(product: &MedicationProductDetails, ingredient: &Ingredient, problems: &mut Problems) {
    let (Some(size), Some(total), Some(concentration)) = (
        product.quantity.as_ref().and_then(|q| q.numeric()),
        ingredient.total_quantity.as_ref().and_then(|q| q.numeric()),
        ingredient.concentration_strength.as_ref().and_then(|q| q.numeric()),
    ) else {
        let partial = product.quantity.is_none()
            && ingredient.total_quantity.is_some()
            && ingredient.concentration_strength.is_some();
        if partial {
            problems.add(
                "Total quantity and concentration strength specified but product quantity not specified",
            );
        }
        return;
    };
    if size <= 0.0 {
        problems.add("Product quantity must be greater than zero");
        return;
    }
    let expected = total / size;
    if expected == 0.0 || ((concentration - expected) / expected).abs() > 0.01 {
        problems.add(format!(
            "Concentration strength {} does not match calculated value {} from total quantity {} and product quantity {}",
            concentration, expected, total, size
        ));
    }
}

impl DetailsValidator for AmtMedicationValidator {
    fn validate_package(&self, details: &PackageDetails) -> CompilerResult<()> {
        let mut problems = Problems::default();
        self.check_package(details, false, &mut problems);
        problems.into_result()
    }
}

/// NHS medicinal product model rules
#[derive(Debug, Default)]
pub struct NmpcMedicationValidator;

impl DetailsValidator for NmpcMedicationValidator {
    fn validate_package(&self, details: &PackageDetails) -> CompilerResult<()> {
        let mut problems = Problems::default();
        if !details.contained_packages.is_empty() {
            problems.add("Packages cannot contain other packages");
        }
        if details.contained_products.is_empty() {
            problems.add("Packages must contain at least one product");
        }
        if details.container_type.is_some() {
            problems.add("Packages cannot have a container type defined");
        }
        if details.product_name.is_some() {
            problems.add("Packages cannot have a product name defined");
        }
        for quantity in &details.contained_products {
            if !is_positive(&quantity.value) {
                problems.add("Product quantity must have a value greater than zero");
            }
            if is_each(&quantity.unit.concept_id) && quantity.value.trim().parse::<f64>().ok() != Some(1.0) {
                problems.add_unit("Product quantity must be one if unit is 'unit of presentation'");
            }
            let product = &quantity.product_details;
            if product.container_type.is_some() {
                problems.add("Product cannot have a container type defined");
            }
            if product.device_type.is_some() {
                problems.add("Product cannot have a device type defined");
            }
            if product.generic_form.is_none() {
                problems.add("Product must have a generic form defined");
            }
            if product.product_name.is_none() {
                problems.add("Product must have a product name (brand) defined");
            }
            if let Some(size) = &product.quantity {
                if !is_positive(&size.value) {
                    problems.add("Product quantity must have a value greater than zero");
                }
            }
            for ingredient in &product.active_ingredients {
                if ingredient.active_ingredient.is_none() {
                    problems.add("Product must have an active ingredient defined");
                }
                if ingredient.precise_ingredient.is_none() {
                    problems.add("Product must have a precise ingredient defined");
                }
            }
        }
        problems.into_result()
    }
}

/// Validators keyed by model type
pub struct ValidatorRegistry {
    validators: HashMap<ModelType, Box<dyn DetailsValidator>>,
}

impl ValidatorRegistry {
    pub fn empty() -> Self {
        Self {
            validators: HashMap::new(),
        }
    }

    pub fn register(mut self, model_type: ModelType, validator: Box<dyn DetailsValidator>) -> Self {
        self.validators.insert(model_type, validator);
        self
    }

    pub fn validator_for(&self, model_type: ModelType) -> CompilerResult<&dyn DetailsValidator> {
        self.validators
            .get(&model_type)
            .map(|v| v.as_ref())
            .ok_or_else(|| CompilerError::NoValidatorForModelType(format!("{:?}", model_type)))
    }

    pub fn validate(&self, model_type: ModelType, details: &PackageDetails) -> CompilerResult<()> {
        self.validator_for(model_type)?.validate_package(details)
    }
}

impl Default for ValidatorRegistry {
    fn default() -> Self {
        Self::empty()
            .register(ModelType::Amt, Box::new(AmtMedicationValidator))
            .register(ModelType::Nmpc, Box::new(NmpcMedicationValidator))
    }
}
