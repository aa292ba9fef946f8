//! Terminology model: levels, configuration profiles and well-known ids

pub mod configuration;
pub mod constants;
pub mod level;

pub use configuration::{ModelConfiguration, ModelType};
pub use level::{ModelLevel, ModelLevelType};
