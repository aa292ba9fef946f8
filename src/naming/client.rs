//! HTTP client for the name generation service

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::NamingConfig;

/// Name generation errors
#[derive(Error, Debug)]
pub enum NamingError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type NamingResult<T> = Result<T, NamingError>;

/// Request sent to a name generator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameGeneratorSpec {
    pub semantic_tag: String,
    /// Axiom text with FSN labels substituted
    pub owl: String,
    /// Axiom text with preferred-term labels substituted; empty when not used
    #[serde(default)]
    pub pt_owl: String,
}

/// Generated names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsnAndPt {
    #[serde(rename = "FSN")]
    pub fsn: String,
    #[serde(rename = "PT")]
    pub pt: String,
}

/// Turns an axiom into a fully specified name and preferred term
#[async_trait]
pub trait NameGenerator: Send + Sync {
    async fn generate_names(&self, spec: &NameGeneratorSpec) -> NamingResult<FsnAndPt>;
}

/// Name generator reached over HTTP
pub struct RemoteNameGenerator {
    client: Client,
    api_base_url: String,
}

impl RemoteNameGenerator {
    pub fn new(config: &NamingConfig) -> NamingResult<Self> {
        let api_base_url = config
            .base_url
            .clone()
            .ok_or_else(|| NamingError::ConfigError("name generator URL not set".to_string()))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NamingError::ConfigError(e.to_string()))?;

        Ok(Self {
            client,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl NameGenerator for RemoteNameGenerator {
    async fn generate_names(&self, spec: &NameGeneratorSpec) -> NamingResult<FsnAndPt> {
        let url = format!("{}/generate", self.api_base_url);
        let resp = self
            .client
            .post(&url)
            .json(spec)
            .send()
            .await
            .map_err(|e| NamingError::NetworkError(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(NamingError::ApiError(format!("{}: {}", status, text)));
        }

        resp.json()
            .await
            .map_err(|e| NamingError::SerializationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_url_is_config_error() {
        let result = RemoteNameGenerator::new(&NamingConfig::default());
        assert!(matches!(result, Err(NamingError::ConfigError(_))));
    }

    #[test]
    fn test_names_wire_format() {
        let names: FsnAndPt =
            serde_json::from_str(r#"{"FSN": "Paracetamol 500 mg tablet (clinical drug)", "PT": "Paracetamol 500 mg tablet"}"#)
                .unwrap();
        assert_eq!(names.pt, "Paracetamol 500 mg tablet");
    }
}
