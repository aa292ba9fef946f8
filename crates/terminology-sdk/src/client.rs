//! TerminologyService trait: the unified interface for in-memory and remote modes

use async_trait::async_trait;

use crate::error::{TerminologyError, TerminologyResult};
use crate::models::{ConceptDetail, ConceptDraft, ConceptSummary, RefsetMember};

/// Unified client interface for a SNOMED CT terminology server.
///
/// Implemented by:
/// - `InMemoryTerminology`: in-process, no network (for demos and tests)
/// - `RemoteClient`: connects to a running Snowstorm-style server via HTTP
#[async_trait]
pub trait TerminologyService: Send + Sync {
    /// Execute an ECL query, returning at most `limit` concepts
    async fn query_concepts(
        &self,
        branch: &str,
        ecl: &str,
        limit: usize,
    ) -> TerminologyResult<Vec<ConceptSummary>>;

    /// Load full concept bodies (axioms included) for the given ids
    async fn fetch_concepts(
        &self,
        branch: &str,
        ids: &[String],
    ) -> TerminologyResult<Vec<ConceptDetail>>;

    /// Reference set members referencing any of `referenced_ids`,
    /// optionally restricted to the given reference sets
    async fn fetch_refset_members(
        &self,
        branch: &str,
        referenced_ids: &[String],
        refset_ids: Option<&[String]>,
        offset: usize,
        limit: usize,
    ) -> TerminologyResult<Vec<RefsetMember>>;

    /// Create one concept, letting the server assign its identifier
    /// unless the draft already carries one
    async fn create_concept(
        &self,
        branch: &str,
        draft: &ConceptDraft,
    ) -> TerminologyResult<ConceptSummary>;

    /// Create many concepts whose identifiers are already assigned
    async fn create_concepts(
        &self,
        branch: &str,
        drafts: &[ConceptDraft],
    ) -> TerminologyResult<Vec<ConceptSummary>>;

    /// Replace an existing concept's body
    async fn update_concept(
        &self,
        branch: &str,
        concept_id: &str,
        draft: &ConceptDraft,
    ) -> TerminologyResult<ConceptSummary>;

    /// Create reference set members, returning their member ids
    async fn create_refset_members(
        &self,
        branch: &str,
        members: &[RefsetMember],
    ) -> TerminologyResult<Vec<String>>;

    /// Remove reference set members by member id
    async fn remove_refset_members(
        &self,
        branch: &str,
        member_ids: &[String],
    ) -> TerminologyResult<()>;

    /// Look up one concept summary
    async fn get_concept(&self, branch: &str, id: &str) -> TerminologyResult<ConceptSummary> {
        self.fetch_concepts(branch, &[id.to_string()])
            .await?
            .into_iter()
            .next()
            .map(|c| c.summary())
            .ok_or_else(|| TerminologyError::NotFound(format!("concept {} on {}", id, branch)))
    }

    /// The subset of `ids` that already exist on the branch
    async fn concept_ids_that_exist(
        &self,
        branch: &str,
        ids: &[String],
    ) -> TerminologyResult<Vec<String>> {
        Ok(self
            .fetch_concepts(branch, ids)
            .await?
            .into_iter()
            .map(|c| c.concept_id)
            .collect())
    }

    /// Whether identifiers can be reserved in bulk ahead of creation
    fn reservation_available(&self) -> bool {
        false
    }

    /// Reserve `count` concept identifiers in a namespace and partition
    async fn reserve_identifiers(
        &self,
        _namespace: &str,
        _partition: &str,
        _count: usize,
    ) -> TerminologyResult<Vec<String>> {
        Err(TerminologyError::Unsupported(
            "identifier reservation".to_string(),
        ))
    }
}
