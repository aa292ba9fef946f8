//! ConceptResolver: binds a hierarchy position to a concept
//!
//! A position either reuses an existing fully defined concept found by an
//! ECL query, offers ambiguous candidates, or gets a new concept proposal
//! under a fresh placeholder id.

use futures::future::try_join_all;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info, warn};

use terminology_sdk::{ConceptSummary, DefinitionStatus};

use crate::context::CompilationContext;
use crate::ecl::{QueryOptions, QuerySynthesizer};
use crate::error::{CompilerError, CompilerResult};
use crate::graph::{Axiom, EdgeLabel, Identifier, NewConceptProposal, Node, NonDefiningProperty, ProductGraph, Relationship};
use crate::model::{ModelLevel, ModelLevelType};

/// Page size used when reading reference set members for a concept
const MEMBER_PAGE_SIZE: usize = 200;

/// Everything needed to resolve one hierarchy position
#[derive(Debug, Clone)]
pub struct NodeRequest {
    pub label: String,
    pub model_level: ModelLevelType,
    pub relationships: BTreeSet<Relationship>,
    /// Reference sets matches must belong to
    pub refsets: Vec<String>,
    pub refset_members: Vec<NonDefiningProperty>,
    pub non_defining_properties: Vec<NonDefiningProperty>,
    pub semantic_tag: String,
    /// Concepts the caller picked on an earlier round
    pub selected_concept_ids: Vec<String>,
    pub options: QueryOptions,
    /// Never retry without the reference set scope
    pub enforce_refsets: bool,
    /// Parents stated on a new concept but left out of the query
    pub stated_parents: Vec<Identifier>,
}

impl NodeRequest {
    pub fn new(level: &ModelLevel, relationships: impl IntoIterator<Item = Relationship>) -> Self {
        Self {
            label: level.display_label.clone(),
            model_level: level.model_level_type,
            relationships: relationships.into_iter().collect(),
            refsets: Vec::new(),
            refset_members: Vec::new(),
            non_defining_properties: Vec::new(),
            semantic_tag: level.medicine_semantic_tag.clone(),
            selected_concept_ids: Vec::new(),
            options: QueryOptions::default(),
            enforce_refsets: false,
            stated_parents: Vec::new(),
        }
    }

    pub fn with_refsets(mut self, refsets: Vec<String>) -> Self {
        self.refsets = refsets;
        self
    }

    pub fn with_refset_members(mut self, members: Vec<NonDefiningProperty>) -> Self {
        self.refset_members = members;
        self
    }

    pub fn with_non_defining_properties(mut self, properties: Vec<NonDefiningProperty>) -> Self {
        self.non_defining_properties = properties;
        self
    }

    pub fn with_semantic_tag(mut self, tag: impl Into<String>) -> Self {
        self.semantic_tag = tag.into();
        self
    }

    pub fn with_selected(mut self, ids: Vec<String>) -> Self {
        self.selected_concept_ids = ids;
        self
    }

    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }

    pub fn enforce_refsets(mut self, enforce: bool) -> Self {
        self.enforce_refsets = enforce;
        self
    }

    pub fn with_stated_parents(mut self, parents: Vec<Identifier>) -> Self {
        self.stated_parents = parents;
        self
    }

    /// Whether a relationship points at a concept that does not exist yet
    fn references_placeholder(&self) -> bool {
        self.relationships
            .iter()
            .any(|r| !r.is_concrete() && r.has_placeholder_destination())
    }

    /// Reference sets whose memberships are read back for an existing concept
    fn property_refsets(&self) -> Vec<String> {
        self.refset_members
            .iter()
            .chain(self.non_defining_properties.iter())
            .map(|p| p.refset_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Resolves nodes against the terminology service
#[derive(Clone)]
pub struct ConceptResolver {
    ctx: CompilationContext,
}

impl ConceptResolver {
    pub fn new(ctx: CompilationContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &CompilationContext {
        &self.ctx
    }

    /// Bind a position to an existing concept, candidates or a new proposal
    pub async fn resolve(&self, request: NodeRequest) -> CompilerResult<Node> {
        self.ctx.check_cancelled()?;

        let mut matches: Vec<ConceptSummary> = Vec::new();
        let mut excluded_by_oii = 0;

        if !request.relationships.is_empty() && !request.references_placeholder() {
            let synthesizer = QuerySynthesizer::new(&self.ctx.model);
            let ecl = synthesizer.build(&request.relationships, &request.refsets, request.options)?;
            debug!("ECL for {}: {}", request.label, ecl);
            let found = self.query(&ecl, &request.label).await?;
            let (filtered, excluded) = self.filter_by_oii(&request.relationships, found).await?;
            matches = filtered;
            excluded_by_oii += excluded;

            if matches.is_empty() && !request.enforce_refsets && !request.refsets.is_empty() {
                let broader = synthesizer.build(&request.relationships, &[], request.options)?;
                info!(
                    "No concept found for {} with {}, trying again without refset constraint",
                    request.label, ecl
                );
                let found = self.query(&broader, &request.label).await?;
                let (filtered, excluded) = self.filter_by_oii(&request.relationships, found).await?;
                matches = filtered;
                excluded_by_oii += excluded;
            }

            if matches.is_empty() {
                debug!("No concept found for {} with {}", request.label, ecl);
            }
        }

        if let [single] = matches.as_slice() {
            if single.is_fully_defined() {
                let concept = single.clone();
                return self.bind_existing(concept, &request).await;
            }
        }

        if !matches.is_empty() {
            let selected: Vec<ConceptSummary> = matches
                .iter()
                .filter(|c| request.selected_concept_ids.contains(&c.concept_id))
                .cloned()
                .collect();
            if selected.len() > 1 {
                return Err(CompilerError::AmbiguousSelection {
                    level: request.label.clone(),
                    selected: selected.into_iter().map(|c| c.concept_id).collect(),
                });
            }
            if let Some(choice) = selected.into_iter().next() {
                let mut node = self.bind_existing(choice, &request).await?;
                node.concept_options = matches;
                return Ok(node);
            }
        }

        let status = if matches.is_empty() && excluded_by_oii == 0 {
            DefinitionStatus::FullyDefined
        } else {
            DefinitionStatus::Primitive
        };
        let mut node = self.propose(&request, status);
        node.concept_options = matches;
        if let Some(naming) = &self.ctx.naming {
            naming
                .add_generated_names(&self.ctx.cache, &request.semantic_tag, &mut node, &self.ctx.model)
                .await;
        }
        debug!(
            "New concept for {} {} with {} candidates",
            request.label,
            node.concept_id,
            node.concept_options.len()
        );
        Ok(node)
    }

    /// Existing concept at a level, located from a root concept
    pub async fn look_up_node(&self, root_id: &str, level: &ModelLevel) -> CompilerResult<Node> {
        self.ctx.check_cancelled()?;
        let concept = match level.ecl_for(root_id) {
            Some(ecl) => {
                let found = self.query(&ecl, &level.display_label).await?;
                match found.as_slice() {
                    [single] => single.clone(),
                    _ => {
                        return Err(CompilerError::Validation(format!(
                            "expected 1 {} for {} from {} but found {}",
                            level.display_label,
                            root_id,
                            ecl,
                            found.len()
                        )))
                    }
                }
            }
            None => self.fetch_concept(root_id, level).await?,
        };
        let mut node = self.bind_concept(concept, level);
        node.non_defining_properties = self
            .properties_of(&node, &[level.reference_set_id.clone()], true)
            .await?;
        Ok(node)
    }

    /// Existing concept bound directly to a level, without reading its properties
    pub async fn fetch_node(&self, concept_id: &str, level: &ModelLevel) -> CompilerResult<Node> {
        self.ctx.check_cancelled()?;
        let concept = self.fetch_concept(concept_id, level).await?;
        Ok(self.bind_concept(concept, level))
    }

    async fn fetch_concept(&self, concept_id: &str, level: &ModelLevel) -> CompilerResult<ConceptSummary> {
        self.ctx
            .terminology
            .get_concept(&self.ctx.branch, concept_id)
            .await
            .map_err(CompilerError::terminology(format!(
                "loading {} {}",
                level.display_label, concept_id
            )))
    }

    fn bind_concept(&self, concept: ConceptSummary, level: &ModelLevel) -> Node {
        self.ctx.cache.register_label(
            &Identifier::real(concept.concept_id.clone()),
            concept.fsn_term().unwrap_or_default(),
            concept.pt_term().unwrap_or_default(),
        );
        Node::existing(concept, &level.display_label, level.model_level_type)
    }

    /// Add `is a` edges between existing nodes that subsume one another
    pub async fn add_transitive_is_a_edges(&self, graph: &mut ProductGraph) -> CompilerResult<usize> {
        let existing: Vec<String> = graph
            .nodes()
            .filter_map(|n| n.concept_id.as_real().map(str::to_string))
            .collect();
        if existing.len() < 2 {
            return Ok(0);
        }
        let members = existing.join(" OR ");
        let known: HashSet<&str> = existing.iter().map(String::as_str).collect();
        let lookups = existing.iter().map(|id| {
            let ecl = format!("(<{}) AND ({})", id, members);
            async move {
                self.ctx.check_cancelled()?;
                self.query(&ecl, id).await.map(|found| (id, found))
            }
        });
        let results = try_join_all(lookups).await?;

        let mut added = 0;
        for (id, descendants) in results {
            for descendant in descendants {
                if !known.contains(descendant.concept_id.as_str()) {
                    continue;
                }
                let before = graph.edges().len();
                graph.add_edge(
                    &Identifier::real(descendant.concept_id.clone()),
                    &Identifier::real(id.clone()),
                    EdgeLabel::IsA,
                );
                added += graph.edges().len() - before;
            }
        }
        Ok(added)
    }

    /// Concepts matching a navigation query such as `<id>.774160008`
    pub async fn related_concepts(&self, ecl: &str, label: &str) -> CompilerResult<Vec<ConceptSummary>> {
        self.ctx.check_cancelled()?;
        self.query(ecl, label).await
    }

    async fn query(&self, ecl: &str, label: &str) -> CompilerResult<Vec<ConceptSummary>> {
        self.ctx
            .terminology
            .query_concepts(&self.ctx.branch, ecl, self.ctx.query_limit)
            .await
            .map_err(CompilerError::terminology(format!("resolving {} with {}", label, ecl)))
    }

    /// Keep only matches whose other identifying information equals a required value.
    /// Returns the survivors and how many were dropped.
    async fn filter_by_oii(
        &self,
        relationships: &BTreeSet<Relationship>,
        matches: Vec<ConceptSummary>,
    ) -> CompilerResult<(Vec<ConceptSummary>, usize)> {
        let Some(oii_type) = self.ctx.model.oii_attribute.as_deref() else {
            return Ok((matches, 0));
        };
        let required: HashSet<&str> = relationships
            .iter()
            .filter(|r| r.type_id == oii_type)
            .filter_map(|r| r.concrete_value().map(|v| v.value.as_str()))
            .collect();
        if required.is_empty() || matches.is_empty() {
            return Ok((matches, 0));
        }

        let ids: Vec<String> = matches.iter().map(|c| c.concept_id.clone()).collect();
        let concepts = self
            .ctx
            .terminology
            .fetch_concepts(&self.ctx.branch, &ids)
            .await
            .map_err(CompilerError::terminology("filtering matches by other identifying information"))?;
        let keep: HashSet<String> = concepts
            .iter()
            .filter(|c| {
                c.axiom_relationships().any(|r| {
                    r.type_id == oii_type
                        && r.concrete_value
                            .as_ref()
                            .map_or(false, |v| required.contains(v.value.as_str()))
                })
            })
            .map(|c| c.concept_id.clone())
            .collect();

        let total = matches.len();
        let kept: Vec<ConceptSummary> = matches
            .into_iter()
            .filter(|c| keep.contains(&c.concept_id))
            .collect();
        let excluded = total - kept.len();
        if excluded > 0 {
            debug!("Other identifying information filter removed {} of {} matches", excluded, total);
        }
        Ok((kept, excluded))
    }

    async fn bind_existing(&self, concept: ConceptSummary, request: &NodeRequest) -> CompilerResult<Node> {
        self.ctx.cache.register_label(
            &Identifier::real(concept.concept_id.clone()),
            concept.fsn_term().unwrap_or_default(),
            concept.pt_term().unwrap_or_default(),
        );
        let mut node = Node::existing(concept, &request.label, request.model_level);
        let refsets = request.property_refsets();
        if !refsets.is_empty() {
            node.non_defining_properties = self.properties_of(&node, &refsets, false).await?;
        }
        debug!("Concept found for {} {}", request.label, node.concept_id);
        Ok(node)
    }

    /// Reference set memberships of an existing node within `refsets`,
    /// or across all reference sets when `all` is set
    async fn properties_of(
        &self,
        node: &Node,
        refsets: &[String],
        all: bool,
    ) -> CompilerResult<Vec<NonDefiningProperty>> {
        let Some(id) = node.concept_id.as_real() else {
            return Ok(Vec::new());
        };
        let scope = if all { None } else { Some(refsets) };
        let ids = [id.to_string()];
        let mut properties = Vec::new();
        let mut offset = 0;
        loop {
            let page = self
                .ctx
                .terminology
                .fetch_refset_members(&self.ctx.branch, &ids, scope, offset, MEMBER_PAGE_SIZE)
                .await
                .map_err(CompilerError::terminology(format!(
                    "reading properties of {} {}",
                    node.label, id
                )))?;
            let count = page.len();
            properties.extend(page.iter().map(NonDefiningProperty::from_member));
            if count < MEMBER_PAGE_SIZE {
                break;
            }
            offset += count;
        }
        properties.sort();
        properties.dedup();
        Ok(properties)
    }

    fn propose(&self, request: &NodeRequest, status: DefinitionStatus) -> Node {
        let id = self.ctx.cache.next_identifier();
        let stated = request
            .stated_parents
            .iter()
            .cloned()
            .map(Relationship::is_a);
        let mut proposal = NewConceptProposal::new(
            id,
            Axiom::new(status, request.relationships.iter().cloned().chain(stated)),
            &request.semantic_tag,
        );
        proposal.module_id = Some(self.ctx.model.module_id.clone());
        proposal.refset_members = request.refset_members.clone();
        proposal.non_defining_properties = request.non_defining_properties.clone();
        if request.relationships.is_empty() {
            warn!("Proposing {} with an empty axiom", request.label);
        }
        Node::proposed(proposal, &request.label, request.model_level)
    }
}
