//! InMemoryTerminology: in-process terminology service
//!
//! Holds concepts and reference set members in memory. ECL is not evaluated:
//! query answers are registered up front, either for an exact query string or
//! through a rule that inspects the query. Every call is recorded so tests can
//! assert on ordering.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::client::TerminologyService;
use crate::error::{TerminologyError, TerminologyResult};
use crate::models::{ConceptDetail, ConceptDraft, ConceptSummary, RefsetMember};

type QueryRule = Box<dyn Fn(&str) -> Option<Vec<String>> + Send + Sync>;

/// A recorded write against the in-memory store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteEvent {
    CreateConcept(String),
    BulkCreate(Vec<String>),
    UpdateConcept(String),
    CreateMember { refset_id: String, referenced_component_id: String },
    RemoveMember(String),
}

#[derive(Default)]
struct MemoryState {
    concepts: BTreeMap<String, ConceptDetail>,
    exact_queries: HashMap<String, Vec<String>>,
    members: BTreeMap<String, RefsetMember>,
    next_sequence: u64,
    queries: Vec<String>,
    writes: Vec<WriteEvent>,
    created: Vec<ConceptDraft>,
}

/// In-process terminology service.
pub struct InMemoryTerminology {
    state: Arc<RwLock<MemoryState>>,
    rules: Arc<std::sync::RwLock<Vec<QueryRule>>>,
    failing_queries: Arc<std::sync::RwLock<Vec<String>>>,
    namespace: String,
    reservation: bool,
    reservation_fails: bool,
}

impl InMemoryTerminology {
    /// Create an empty service minting identifiers in the given namespace
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            state: Arc::new(RwLock::new(MemoryState {
                next_sequence: 1000,
                ..MemoryState::default()
            })),
            rules: Arc::new(std::sync::RwLock::new(Vec::new())),
            failing_queries: Arc::new(std::sync::RwLock::new(Vec::new())),
            namespace: namespace.into(),
            reservation: false,
            reservation_fails: false,
        }
    }

    /// Enable bulk identifier reservation
    pub fn with_reservation(mut self, available: bool) -> Self {
        self.reservation = available;
        self
    }

    /// Advertise reservation but fail every reservation request
    pub fn with_failing_reservation(mut self) -> Self {
        self.reservation = true;
        self.reservation_fails = true;
        self
    }

    /// Add or replace a concept
    pub async fn insert_concept(&self, concept: ConceptDetail) {
        let mut state = self.state.write().await;
        state.concepts.insert(concept.concept_id.clone(), concept);
    }

    /// Add a reference set member, assigning a member id if missing
    pub async fn insert_member(&self, mut member: RefsetMember) -> String {
        let member_id = member
            .member_id
            .get_or_insert_with(|| uuid::Uuid::new_v4().to_string())
            .clone();
        let mut state = self.state.write().await;
        state.members.insert(member_id.clone(), member);
        member_id
    }

    /// Answer `ecl` with the given concept ids
    pub async fn register_query(&self, ecl: impl Into<String>, ids: &[&str]) {
        let mut state = self.state.write().await;
        state
            .exact_queries
            .insert(ecl.into(), ids.iter().map(|s| s.to_string()).collect());
    }

    /// Answer any query for which `rule` returns `Some`
    pub fn register_rule<F>(&self, rule: F)
    where
        F: Fn(&str) -> Option<Vec<String>> + Send + Sync + 'static,
    {
        if let Ok(mut rules) = self.rules.write() {
            rules.push(Box::new(rule));
        }
    }

    /// Make any query containing `fragment` fail with a timeout
    pub fn fail_queries_containing(&self, fragment: impl Into<String>) {
        if let Ok(mut failing) = self.failing_queries.write() {
            failing.push(fragment.into());
        }
    }

    /// Queries executed so far, in order
    pub async fn executed_queries(&self) -> Vec<String> {
        self.state.read().await.queries.clone()
    }

    /// Writes performed so far, in order
    pub async fn writes(&self) -> Vec<WriteEvent> {
        self.state.read().await.writes.clone()
    }

    /// Drafts accepted by create calls, in order, with their final ids
    pub async fn created_drafts(&self) -> Vec<ConceptDraft> {
        self.state.read().await.created.clone()
    }

    pub async fn concept(&self, id: &str) -> Option<ConceptDetail> {
        self.state.read().await.concepts.get(id).cloned()
    }

    pub async fn members(&self) -> Vec<RefsetMember> {
        self.state.read().await.members.values().cloned().collect()
    }

    fn rule_answer(&self, ecl: &str) -> Option<Vec<String>> {
        let rules = self.rules.read().ok()?;
        rules.iter().find_map(|rule| rule(ecl))
    }

    fn should_fail(&self, ecl: &str) -> bool {
        self.failing_queries
            .read()
            .map(|f| f.iter().any(|fragment| ecl.contains(fragment.as_str())))
            .unwrap_or(false)
    }

    fn mint_id(&self, state: &mut MemoryState) -> String {
        state.next_sequence += 1;
        sctid(state.next_sequence, &self.namespace, "10")
    }

    fn store_created(
        state: &mut MemoryState,
        draft: &ConceptDraft,
        concept_id: String,
    ) -> TerminologyResult<ConceptSummary> {
        if state.concepts.contains_key(&concept_id) {
            return Err(TerminologyError::ServiceError {
                status: 409,
                message: format!("concept {} already exists", concept_id),
            });
        }
        let mut stored = draft.clone();
        stored.concept_id = Some(concept_id.clone());
        state.created.push(stored.clone());
        let detail = stored.into_detail(concept_id);
        let summary = detail.summary();
        state.concepts.insert(detail.concept_id.clone(), detail);
        Ok(summary)
    }
}

impl Default for InMemoryTerminology {
    fn default() -> Self {
        Self::new("1000168")
    }
}

#[async_trait]
impl TerminologyService for InMemoryTerminology {
    async fn query_concepts(
        &self,
        _branch: &str,
        ecl: &str,
        limit: usize,
    ) -> TerminologyResult<Vec<ConceptSummary>> {
        if self.should_fail(ecl) {
            return Err(TerminologyError::Timeout(format!("query {}", ecl)));
        }
        let ruled = self.rule_answer(ecl);

        let mut state = self.state.write().await;
        state.queries.push(ecl.to_string());
        let ids = state
            .exact_queries
            .get(ecl)
            .cloned()
            .or(ruled)
            .unwrap_or_default();

        Ok(ids
            .iter()
            .filter_map(|id| state.concepts.get(id))
            .filter(|c| c.active)
            .take(limit)
            .map(ConceptDetail::summary)
            .collect())
    }

    async fn fetch_concepts(
        &self,
        _branch: &str,
        ids: &[String],
    ) -> TerminologyResult<Vec<ConceptDetail>> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.concepts.get(id).cloned())
            .collect())
    }

    async fn fetch_refset_members(
        &self,
        _branch: &str,
        referenced_ids: &[String],
        refset_ids: Option<&[String]>,
        offset: usize,
        limit: usize,
    ) -> TerminologyResult<Vec<RefsetMember>> {
        let state = self.state.read().await;
        Ok(state
            .members
            .values()
            .filter(|m| m.active && referenced_ids.contains(&m.referenced_component_id))
            .filter(|m| refset_ids.map_or(true, |r| r.contains(&m.refset_id)))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn create_concept(
        &self,
        _branch: &str,
        draft: &ConceptDraft,
    ) -> TerminologyResult<ConceptSummary> {
        let mut state = self.state.write().await;
        let concept_id = match &draft.concept_id {
            Some(id) => id.clone(),
            None => self.mint_id(&mut state),
        };
        let summary = Self::store_created(&mut state, draft, concept_id.clone())?;
        state.writes.push(WriteEvent::CreateConcept(concept_id));
        Ok(summary)
    }

    async fn create_concepts(
        &self,
        _branch: &str,
        drafts: &[ConceptDraft],
    ) -> TerminologyResult<Vec<ConceptSummary>> {
        let mut state = self.state.write().await;
        let mut created = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let concept_id = draft.concept_id.clone().ok_or_else(|| {
                TerminologyError::BatchFailed("bulk create requires assigned ids".to_string())
            })?;
            created.push(Self::store_created(&mut state, draft, concept_id)?);
        }
        let ids = created.iter().map(|c| c.concept_id.clone()).collect();
        state.writes.push(WriteEvent::BulkCreate(ids));
        Ok(created)
    }

    async fn update_concept(
        &self,
        _branch: &str,
        concept_id: &str,
        draft: &ConceptDraft,
    ) -> TerminologyResult<ConceptSummary> {
        let mut state = self.state.write().await;
        if !state.concepts.contains_key(concept_id) {
            return Err(TerminologyError::NotFound(format!("concept {}", concept_id)));
        }
        let detail = draft.clone().into_detail(concept_id.to_string());
        let summary = detail.summary();
        state.concepts.insert(concept_id.to_string(), detail);
        state
            .writes
            .push(WriteEvent::UpdateConcept(concept_id.to_string()));
        Ok(summary)
    }

    async fn create_refset_members(
        &self,
        _branch: &str,
        members: &[RefsetMember],
    ) -> TerminologyResult<Vec<String>> {
        let mut state = self.state.write().await;
        let mut ids = Vec::with_capacity(members.len());
        for member in members {
            let mut member = member.clone();
            let member_id = uuid::Uuid::new_v4().to_string();
            member.member_id = Some(member_id.clone());
            state.writes.push(WriteEvent::CreateMember {
                refset_id: member.refset_id.clone(),
                referenced_component_id: member.referenced_component_id.clone(),
            });
            state.members.insert(member_id.clone(), member);
            ids.push(member_id);
        }
        Ok(ids)
    }

    async fn remove_refset_members(
        &self,
        _branch: &str,
        member_ids: &[String],
    ) -> TerminologyResult<()> {
        let mut state = self.state.write().await;
        for member_id in member_ids {
            if state.members.remove(member_id).is_none() {
                return Err(TerminologyError::NotFound(format!("member {}", member_id)));
            }
            state.writes.push(WriteEvent::RemoveMember(member_id.clone()));
        }
        Ok(())
    }

    fn reservation_available(&self) -> bool {
        self.reservation
    }

    async fn reserve_identifiers(
        &self,
        namespace: &str,
        partition: &str,
        count: usize,
    ) -> TerminologyResult<Vec<String>> {
        if !self.reservation {
            return Err(TerminologyError::Unsupported("identifier reservation".to_string()));
        }
        if self.reservation_fails {
            return Err(TerminologyError::ServiceError {
                status: 503,
                message: "identifier service unavailable".to_string(),
            });
        }
        let mut state = self.state.write().await;
        Ok((0..count)
            .map(|_| {
                state.next_sequence += 1;
                sctid(state.next_sequence, namespace, partition)
            })
            .collect())
    }
}

/// Build an extension SCTID: item id, namespace, partition and Verhoeff check digit
pub fn sctid(item: u64, namespace: &str, partition: &str) -> String {
    let body = format!("{}{}{}", item, namespace, partition);
    format!("{}{}", body, verhoeff_check_digit(&body))
}

const VERHOEFF_D: [[u8; 10]; 10] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9],
    [1, 2, 3, 4, 0, 6, 7, 8, 9, 5],
    [2, 3, 4, 0, 1, 7, 8, 9, 5, 6],
    [3, 4, 0, 1, 2, 8, 9, 5, 6, 7],
    [4, 0, 1, 2, 3, 9, 5, 6, 7, 8],
    [5, 9, 8, 7, 6, 0, 4, 3, 2, 1],
    [6, 5, 9, 8, 7, 1, 0, 4, 3, 2],
    [7, 6, 5, 9, 8, 2, 1, 0, 4, 3],
    [8, 7, 6, 5, 9, 3, 2, 1, 0, 4],
    [9, 8, 7, 6, 5, 4, 3, 2, 1, 0],
];

const VERHOEFF_P: [[u8; 10]; 8] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9],
    [1, 5, 7, 6, 2, 8, 3, 0, 9, 4],
    [5, 8, 0, 3, 7, 9, 6, 1, 4, 2],
    [8, 9, 1, 6, 0, 4, 3, 5, 2, 7],
    [9, 4, 5, 3, 1, 2, 6, 8, 7, 0],
    [4, 2, 8, 6, 5, 7, 3, 9, 0, 1],
    [2, 7, 9, 3, 8, 0, 6, 4, 1, 5],
    [7, 0, 4, 6, 9, 1, 3, 2, 5, 8],
];

const VERHOEFF_INV: [u8; 10] = [0, 4, 3, 2, 1, 5, 6, 7, 8, 9];

fn verhoeff_check_digit(digits: &str) -> u8 {
    let mut c = 0u8;
    for (i, ch) in digits.bytes().rev().filter(u8::is_ascii_digit).enumerate() {
        let d = (ch - b'0') as usize;
        c = VERHOEFF_D[c as usize][VERHOEFF_P[(i + 1) % 8][d] as usize];
    }
    VERHOEFF_INV[c as usize]
}
