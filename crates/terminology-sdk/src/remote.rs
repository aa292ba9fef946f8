//! RemoteClient: network client for a running terminology server
//!
//! Speaks the Snowstorm REST API over HTTP. Identifier reservation is only
//! available when an identifier service URL is configured.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::client::TerminologyService;
use crate::error::{TerminologyError, TerminologyResult};
use crate::models::{
    BatchState, BatchStatus, ConceptDetail, ConceptDraft, ConceptSummary, Page, RefsetMember,
};

/// Connection settings for `RemoteClient`
#[derive(Debug, Clone)]
pub struct RemoteOptions {
    /// Request timeout
    pub timeout: Duration,
    /// Evaluate ECL against stated rather than inferred form
    pub stated_ecl: bool,
    /// How many times to poll an asynchronous bulk change
    pub max_batch_checks: u32,
    /// Delay between bulk change polls
    pub batch_check_delay: Duration,
    /// Identifier service used for bulk reservation
    pub identifier_service_url: Option<String>,
}

impl Default for RemoteOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            stated_ecl: true,
            max_batch_checks: 60,
            batch_check_delay: Duration::from_millis(1000),
            identifier_service_url: None,
        }
    }
}

/// Network client that connects to a running terminology server.
pub struct RemoteClient {
    http_base_url: String,
    http_client: Client,
    options: RemoteOptions,
}

impl RemoteClient {
    /// Create a new RemoteClient with default options.
    ///
    /// # Example
    /// ```no_run
    /// # use terminology_sdk::RemoteClient;
    /// let client = RemoteClient::new("http://localhost:8080/snowstorm/snomed-ct").unwrap();
    /// ```
    pub fn new(http_base_url: &str) -> TerminologyResult<Self> {
        Self::with_options(http_base_url, RemoteOptions::default())
    }

    pub fn with_options(http_base_url: &str, options: RemoteOptions) -> TerminologyResult<Self> {
        let http_client = Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|e| TerminologyError::ConnectionError(e.to_string()))?;

        Ok(Self {
            http_base_url: http_base_url.trim_end_matches('/').to_string(),
            http_client,
            options,
        })
    }

    fn url(&self, path: &str, params: &[(&str, String)]) -> TerminologyResult<Url> {
        let raw = format!("{}/{}", self.http_base_url, path.trim_start_matches('/'));
        Url::parse_with_params(&raw, params)
            .map_err(|e| TerminologyError::ConnectionError(format!("invalid url {}: {}", raw, e)))
    }

    /// Turn a non-success response into a typed error
    async fn check(response: Response, context: &str) -> TerminologyResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body: serde_json::Value = response
            .json()
            .await
            .unwrap_or_else(|_| serde_json::json!({"message": "Unknown error"}));
        let message = body
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown error")
            .to_string();

        Err(match status {
            StatusCode::NOT_FOUND => TerminologyError::NotFound(format!("{}: {}", context, message)),
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
                TerminologyError::Timeout(format!("{}: {}", context, message))
            }
            _ => TerminologyError::ServiceError {
                status: status.as_u16(),
                message: format!("{}: {}", context, message),
            },
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, context: &str) -> TerminologyResult<T> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(TerminologyError::from_transport)?;
        let response = Self::check(response, context).await?;
        response.json().await.map_err(TerminologyError::from_transport)
    }

    /// Poll the batch at `location` until it completes or the attempts run out
    async fn await_batch(&self, location: &str, branch: &str) -> TerminologyResult<BatchStatus> {
        let url = Url::parse(location)
            .or_else(|_| self.url(location, &[]))
            .map_err(|_| TerminologyError::BatchFailed(format!("invalid batch location {}", location)))?;

        let mut last_message = String::new();
        for attempt in 1..=self.options.max_batch_checks {
            debug!("Checking batch status {} (attempt {})", location, attempt);
            let batch: BatchStatus = self.get_json(url.clone(), "batch status").await?;
            match batch.status {
                BatchState::Completed => return Ok(batch),
                BatchState::Failed => {
                    return Err(TerminologyError::BatchFailed(format!(
                        "batch {} on '{}' failed: {}",
                        batch.id,
                        branch,
                        batch.message.unwrap_or_default()
                    )))
                }
                BatchState::Running => {
                    last_message = batch.message.unwrap_or_default();
                    tokio::time::sleep(self.options.batch_check_delay).await;
                }
            }
        }

        Err(TerminologyError::BatchFailed(format!(
            "batch on '{}' did not complete, last message was '{}'",
            branch, last_message
        )))
    }

    fn location_of(response: &Response) -> Option<String> {
        response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }
}

#[async_trait]
impl TerminologyService for RemoteClient {
    async fn query_concepts(
        &self,
        branch: &str,
        ecl: &str,
        limit: usize,
    ) -> TerminologyResult<Vec<ConceptSummary>> {
        let ecl_param = if self.options.stated_ecl { "statedEcl" } else { "ecl" };
        let url = self.url(
            &format!("{}/concepts", branch),
            &[
                (ecl_param, ecl.to_string()),
                ("activeFilter", "true".to_string()),
                ("offset", "0".to_string()),
                ("limit", limit.to_string()),
            ],
        )?;
        debug!("ECL query on {}: {}", branch, ecl);
        let page: Page<ConceptSummary> = self.get_json(url, "concept query").await?;
        Ok(page.items)
    }

    async fn fetch_concepts(
        &self,
        branch: &str,
        ids: &[String],
    ) -> TerminologyResult<Vec<ConceptDetail>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let url = self.url(&format!("browser/{}/concepts/bulk-load", branch), &[])?;
        let response = self
            .http_client
            .post(url)
            .json(&serde_json::json!({ "conceptIds": ids }))
            .send()
            .await
            .map_err(TerminologyError::from_transport)?;
        let response = Self::check(response, "concept bulk load").await?;
        response.json().await.map_err(TerminologyError::from_transport)
    }

    async fn fetch_refset_members(
        &self,
        branch: &str,
        referenced_ids: &[String],
        refset_ids: Option<&[String]>,
        offset: usize,
        limit: usize,
    ) -> TerminologyResult<Vec<RefsetMember>> {
        let mut params: Vec<(&str, String)> = referenced_ids
            .iter()
            .map(|id| ("referencedComponentId", id.clone()))
            .collect();
        if let Some(refsets) = refset_ids {
            params.extend(refsets.iter().map(|r| ("referenceSet", r.clone())));
        }
        params.push(("active", "true".to_string()));
        params.push(("offset", offset.to_string()));
        params.push(("limit", limit.to_string()));

        let url = self.url(&format!("{}/members", branch), &params)?;
        let page: Page<RefsetMember> = self.get_json(url, "refset members").await?;
        Ok(page.items)
    }

    async fn create_concept(
        &self,
        branch: &str,
        draft: &ConceptDraft,
    ) -> TerminologyResult<ConceptSummary> {
        let url = self.url(
            &format!("browser/{}/concepts", branch),
            &[("validate", "false".to_string())],
        )?;
        let response = self
            .http_client
            .post(url)
            .json(draft)
            .send()
            .await
            .map_err(TerminologyError::from_transport)?;
        let response = Self::check(response, "create concept").await?;
        response.json().await.map_err(TerminologyError::from_transport)
    }

    async fn create_concepts(
        &self,
        branch: &str,
        drafts: &[ConceptDraft],
    ) -> TerminologyResult<Vec<ConceptSummary>> {
        debug!("Bulk creating {} concepts on {}", drafts.len(), branch);
        let url = self.url(&format!("browser/{}/concepts/bulk", branch), &[])?;
        let response = self
            .http_client
            .post(url)
            .json(drafts)
            .send()
            .await
            .map_err(TerminologyError::from_transport)?;
        let response = Self::check(response, "bulk create concepts").await?;
        let location = Self::location_of(&response).ok_or_else(|| {
            TerminologyError::BatchFailed(format!(
                "bulk create on '{}' returned no batch location",
                branch
            ))
        })?;

        let batch = self.await_batch(&location, branch).await?;

        let requested: Vec<String> = drafts.iter().filter_map(|d| d.concept_id.clone()).collect();
        let mut created = batch.concept_id_strings();
        created.sort();
        let mut expected = requested.clone();
        expected.sort();
        if created != expected {
            return Err(TerminologyError::BatchFailed(format!(
                "batch {} on '{}' created ids {} which do not match requested ids {}",
                batch.id,
                branch,
                created.join(","),
                expected.join(",")
            )));
        }

        info!("Bulk created {} concepts on {}", requested.len(), branch);
        Ok(self
            .fetch_concepts(branch, &requested)
            .await?
            .iter()
            .map(ConceptDetail::summary)
            .collect())
    }

    async fn update_concept(
        &self,
        branch: &str,
        concept_id: &str,
        draft: &ConceptDraft,
    ) -> TerminologyResult<ConceptSummary> {
        let url = self.url(
            &format!("browser/{}/concepts/{}", branch, concept_id),
            &[("validate", "false".to_string())],
        )?;
        let response = self
            .http_client
            .put(url)
            .json(draft)
            .send()
            .await
            .map_err(TerminologyError::from_transport)?;
        let response = Self::check(response, "update concept").await?;
        response.json().await.map_err(TerminologyError::from_transport)
    }

    async fn create_refset_members(
        &self,
        branch: &str,
        members: &[RefsetMember],
    ) -> TerminologyResult<Vec<String>> {
        let url = self.url(&format!("{}/members", branch), &[])?;
        let requests = members.iter().map(|member| {
            let url = url.clone();
            async move {
                let response = self
                    .http_client
                    .post(url)
                    .json(member)
                    .send()
                    .await
                    .map_err(TerminologyError::from_transport)?;
                let response = Self::check(response, "create refset member").await?;
                let created: RefsetMember =
                    response.json().await.map_err(TerminologyError::from_transport)?;
                created.member_id.ok_or_else(|| {
                    TerminologyError::BatchFailed("created member has no member id".to_string())
                })
            }
        });
        futures::future::try_join_all(requests).await
    }

    async fn remove_refset_members(
        &self,
        branch: &str,
        member_ids: &[String],
    ) -> TerminologyResult<()> {
        for member_id in member_ids {
            let url = self.url(&format!("{}/members/{}", branch, member_id), &[])?;
            let response = self
                .http_client
                .delete(url)
                .send()
                .await
                .map_err(TerminologyError::from_transport)?;
            Self::check(response, "remove refset member").await?;
        }
        Ok(())
    }

    fn reservation_available(&self) -> bool {
        self.options.identifier_service_url.is_some()
    }

    async fn reserve_identifiers(
        &self,
        namespace: &str,
        partition: &str,
        count: usize,
    ) -> TerminologyResult<Vec<String>> {
        let base = self.options.identifier_service_url.as_ref().ok_or_else(|| {
            TerminologyError::Unsupported("no identifier service configured".to_string())
        })?;
        let url = Url::parse(&format!("{}/sct/bulk/reserve", base.trim_end_matches('/')))
            .map_err(|e| TerminologyError::ConnectionError(e.to_string()))?;

        #[derive(serde::Deserialize)]
        struct Reservation {
            #[serde(default)]
            sctids: Vec<serde_json::Value>,
        }

        let response = self
            .http_client
            .post(url)
            .json(&serde_json::json!({
                "namespace": namespace,
                "partitionId": partition,
                "quantity": count,
                "software": "product-graph",
            }))
            .send()
            .await
            .map_err(TerminologyError::from_transport)?;
        let response = Self::check(response, "reserve identifiers").await?;
        let reservation: Reservation =
            response.json().await.map_err(TerminologyError::from_transport)?;

        let ids: Vec<String> = reservation
            .sctids
            .into_iter()
            .map(|v| match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .collect();
        if ids.len() != count {
            warn!("Requested {} identifiers but {} were reserved", count, ids.len());
            return Err(TerminologyError::BatchFailed(format!(
                "reserved {} identifiers, expected {}",
                ids.len(),
                count
            )));
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_encodes_ecl() {
        let client = RemoteClient::new("http://localhost:8080/snowstorm/snomed-ct/").unwrap();
        let url = client
            .url(
                "MAIN/SNOMEDCT-AU/concepts",
                &[("ecl", "(<763158003):774158006 = 123".to_string())],
            )
            .unwrap();
        assert!(url
            .as_str()
            .starts_with("http://localhost:8080/snowstorm/snomed-ct/MAIN/SNOMEDCT-AU/concepts?ecl="));
        assert!(!url.as_str().contains(' '));
    }

    #[test]
    fn test_reservation_requires_identifier_service() {
        let client = RemoteClient::new("http://localhost:8080").unwrap();
        assert!(!client.reservation_available());

        let options = RemoteOptions {
            identifier_service_url: Some("http://localhost:9000/api".to_string()),
            ..RemoteOptions::default()
        };
        let client = RemoteClient::with_options("http://localhost:8080", options).unwrap();
        assert!(client.reservation_available());
    }
}
