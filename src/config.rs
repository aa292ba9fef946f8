//! Compiler configuration
//!
//! Loaded from YAML or JSON. Every section has defaults so a file only
//! needs to name what differs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::error::{CompilerError, CompilerResult};
use crate::model::ModelConfiguration;

/// Terminology server connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TerminologyConfig {
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    pub max_batch_checks: u32,
    pub batch_check_delay_ms: u64,
    pub identifier_service_url: Option<String>,
}

impl Default for TerminologyConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout_secs: 60,
            max_batch_checks: 60,
            batch_check_delay_ms: 1000,
            identifier_service_url: None,
        }
    }
}

impl TerminologyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn batch_check_delay(&self) -> Duration {
        Duration::from_millis(self.batch_check_delay_ms)
    }
}

/// Name generator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NamingConfig {
    /// Name generation endpoint; names are not generated when unset
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: 30,
        }
    }
}

/// Top-level compiler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompilerConfig {
    pub branch: String,
    /// Maximum concepts returned per resolution query
    pub query_limit: usize,
    /// Default identifier namespace
    pub namespace: String,
    pub partition: String,
    /// Namespace overrides keyed by branch path prefix
    pub branch_namespaces: BTreeMap<String, String>,
    pub terminology: TerminologyConfig,
    pub naming: NamingConfig,
    pub model: ModelConfiguration,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            branch: "MAIN/SNOMEDCT-AU/AUAMT".to_string(),
            query_limit: 50,
            namespace: "1000168".to_string(),
            partition: "10".to_string(),
            branch_namespaces: BTreeMap::new(),
            terminology: TerminologyConfig::default(),
            naming: NamingConfig::default(),
            model: ModelConfiguration::amt(),
        }
    }
}

impl CompilerConfig {
    /// Load from a `.yaml`/`.yml` or `.json` file
    pub fn from_path(path: impl AsRef<Path>) -> CompilerResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            CompilerError::InvalidConfiguration(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&text)?,
            _ => Self::from_yaml(&text)?,
        };
        debug!("Loaded compiler configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> CompilerResult<Self> {
        let config: Self = serde_yaml::from_str(text)
            .map_err(|e| CompilerError::InvalidConfiguration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(text: &str) -> CompilerResult<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| CompilerError::InvalidConfiguration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CompilerResult<()> {
        if self.query_limit == 0 {
            return Err(CompilerError::InvalidConfiguration(
                "queryLimit must be positive".to_string(),
            ));
        }
        if self.namespace.is_empty() || !self.namespace.chars().all(|c| c.is_ascii_digit()) {
            return Err(CompilerError::InvalidConfiguration(format!(
                "namespace {:?} is not numeric",
                self.namespace
            )));
        }
        self.model.validate()
    }

    /// Namespace for a branch, taken from the longest configured path prefix
    pub fn namespace_for_branch(&self, branch: &str) -> &str {
        let mut path = branch;
        loop {
            if let Some(namespace) = self.branch_namespaces.get(path) {
                return namespace;
            }
            match path.rfind('/') {
                Some(idx) => path = &path[..idx],
                None => return &self.namespace,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelType;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = CompilerConfig::default();
        assert_eq!(config.query_limit, 50);
        assert_eq!(config.model.model_type, ModelType::Amt);
        config.validate().unwrap();
    }

    #[test]
    fn test_yaml_overrides() {
        let yaml = r#"
branch: MAIN/SNOMEDCT-AU/AUAMT/TASK-1
queryLimit: 10
terminology:
  baseUrl: http://snowstorm:8080
"#;
        let config = CompilerConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.query_limit, 10);
        assert_eq!(config.terminology.base_url, "http://snowstorm:8080");
        assert_eq!(config.terminology.timeout_secs, 60);
    }

    #[test]
    fn test_invalid_namespace_rejected() {
        let err = CompilerConfig::from_json(r#"{"namespace": "abc"}"#).unwrap_err();
        assert!(matches!(err, CompilerError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_namespace_walks_branch_path() {
        let mut config = CompilerConfig::default();
        config
            .branch_namespaces
            .insert("MAIN/SNOMEDCT-AU".to_string(), "1000036".to_string());
        config
            .branch_namespaces
            .insert("MAIN/SNOMEDCT-AU/AUAMT".to_string(), "1000168".to_string());
        assert_eq!(config.namespace_for_branch("MAIN/SNOMEDCT-AU/AUAMT/TASK-9"), "1000168");
        assert_eq!(config.namespace_for_branch("MAIN/SNOMEDCT-AU/OTHER"), "1000036");
        config.namespace = "9999999".to_string();
        assert_eq!(config.namespace_for_branch("MAIN"), "9999999");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "partition: \"10\"\nmodel:\n  modelType: NMPC").unwrap();
        let err = CompilerConfig::from_path(file.path());
        // A bare model type without levels is not a usable profile
        assert!(err.is_err());

        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        writeln!(file, "{{\"queryLimit\": 25}}").unwrap();
        let config = CompilerConfig::from_path(file.path()).unwrap();
        assert_eq!(config.query_limit, 25);
    }
}
