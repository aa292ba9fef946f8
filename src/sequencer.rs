//! CreationSequencer: commits new concepts in dependency order
//!
//! Planning happens before any write: proposals are ordered so referenced
//! placeholders are created first, every referenced placeholder must belong
//! to a proposal in the graph, caller-specified ids must be unused and every
//! proposal must carry a name. Concepts are then written in order (or in one
//! bulk batch when ids were reserved up front); reference set members follow
//! once every concept exists.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use product_graph_algorithms::{dependency_order, GraphView, NodeId};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use terminology_sdk::{ConceptDraft, ConceptSummary, RefsetMember};

use crate::assembler::join_all_or_abort;
use crate::context::CompilationContext;
use crate::error::{CompilerError, CompilerResult};
use crate::graph::{Identifier, Node, NonDefiningProperty, ProductGraph};

/// Association member field naming the replacement concept
const TARGET_COMPONENT_FIELD: &str = "targetComponentId";
/// Member field carrying the inactivation reason
const INACTIVATION_REASON_FIELD: &str = "valueId";
/// Concept inactivation indicator reference set
const INACTIVATION_INDICATOR_REFSET: &str = "900000000000489007";

/// What a commit wrote
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitReport {
    pub created: Vec<String>,
    pub edited: Vec<String>,
    pub retired: Vec<String>,
    pub members_created: usize,
    pub members_removed: usize,
    /// Placeholder value → committed id
    pub placeholder_mapping: BTreeMap<i64, String>,
}

/// How a node is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteKind {
    Create,
    Edit,
    RetireAndReplace,
}

/// One planned concept write
struct PlannedWrite {
    placeholder: Identifier,
    kind: WriteKind,
    /// Known before writing: edited, caller-specified or reserved id
    concept_id: Option<String>,
}

/// Writes a compiled product graph to the terminology service
pub struct CreationSequencer {
    ctx: CompilationContext,
}

impl CreationSequencer {
    pub fn new(ctx: CompilationContext) -> Self {
        Self { ctx }
    }

    /// Commit every node that needs a write and return the graph with real ids only
    pub async fn commit(&self, mut graph: ProductGraph) -> CompilerResult<(ProductGraph, CommitReport)> {
        let run = Uuid::new_v4();
        self.ctx.check_cancelled()?;
        if !graph.nodes().any(Node::requires_write) {
            info!("Commit {}: nothing to write on {}", run, self.ctx.branch);
            return Ok((graph, CommitReport::default()));
        }

        let order = self.write_order(&graph)?;
        self.check_names(&graph, &order)?;
        self.check_specified_ids(&graph, &order).await?;

        let mut plan = self.plan(&graph, order);
        self.reserve(&mut plan, run).await;

        info!(
            "Commit {}: {} concept writes on {}",
            run,
            plan.len(),
            self.ctx.branch
        );

        let mut report = CommitReport::default();
        let mut mapping: HashMap<Identifier, Identifier> = HashMap::new();
        let mut committed: HashMap<String, ConceptSummary> = HashMap::new();
        let bulk = plan.iter().all(|p| p.concept_id.is_some());
        let mut bulk_drafts = Vec::new();
        let mut edits = Vec::new();

        for write in &plan {
            self.ctx.check_cancelled()?;
            let node = graph
                .node(&write.placeholder)
                .ok_or_else(|| CompilerError::Validation(format!("node {} vanished from the graph", write.placeholder)))?;
            let mut draft = self.draft(node, &mapping)?;

            let real_id = match (write.kind, &write.concept_id) {
                (WriteKind::Edit, Some(id)) => {
                    draft.concept_id = Some(id.clone());
                    edits.push((id.clone(), draft));
                    report.edited.push(id.clone());
                    id.clone()
                }
                (_, Some(id)) if bulk => {
                    draft.concept_id = Some(id.clone());
                    bulk_drafts.push(draft);
                    id.clone()
                }
                (_, known) => {
                    draft.concept_id = known.clone();
                    let summary = self
                        .ctx
                        .terminology
                        .create_concept(&self.ctx.branch, &draft)
                        .await
                        .map_err(CompilerError::terminology(format!("creating {}", node.id_and_fsn())))?;
                    let id = summary.concept_id.clone();
                    committed.insert(id.clone(), summary);
                    id
                }
            };
            if write.kind != WriteKind::Edit {
                report.created.push(real_id.clone());
            }
            if let Some(placeholder) = write.placeholder.placeholder() {
                report.placeholder_mapping.insert(placeholder, real_id.clone());
            }
            mapping.insert(write.placeholder.clone(), Identifier::real(real_id));
        }

        if !bulk_drafts.is_empty() {
            let created = self
                .ctx
                .terminology
                .create_concepts(&self.ctx.branch, &bulk_drafts)
                .await
                .map_err(CompilerError::terminology(format!(
                    "bulk creating {} concepts",
                    bulk_drafts.len()
                )))?;
            committed.extend(created.into_iter().map(|s| (s.concept_id.clone(), s)));
        }
        for (id, draft) in &edits {
            let summary = self
                .ctx
                .terminology
                .update_concept(&self.ctx.branch, id, draft)
                .await
                .map_err(CompilerError::terminology(format!("updating concept {}", id)))?;
            committed.insert(id.clone(), summary);
        }

        for write in plan.iter().filter(|w| w.kind == WriteKind::RetireAndReplace) {
            if let Some(original) = graph.node(&write.placeholder).and_then(|n| n.original_node.as_ref()) {
                let id = original.concept.concept_id.clone();
                let current = self
                    .ctx
                    .terminology
                    .fetch_concepts(&self.ctx.branch, &[id.clone()])
                    .await
                    .map_err(CompilerError::terminology(format!("loading {} to inactivate it", id)))?
                    .into_iter()
                    .next()
                    .ok_or_else(|| {
                        CompilerError::Validation(format!("concept {} to retire does not exist on {}", id, self.ctx.branch))
                    })?;
                let mut retired = current.into_draft();
                retired.active = false;
                self.ctx
                    .terminology
                    .update_concept(&self.ctx.branch, &id, &retired)
                    .await
                    .map_err(CompilerError::terminology(format!("inactivating {}", id)))?;
                report.retired.push(id);
            }
        }

        let (created, removed) = self.create_members(&graph, &plan, &mapping).await?;
        report.members_created = created;
        report.members_removed = removed;

        graph.rewrite_identifiers(&mapping);
        for node in graph.nodes_mut() {
            let Some(id) = node.concept_id.as_real().map(str::to_string) else {
                continue;
            };
            if let Some(summary) = committed.remove(&id) {
                node.concept = Some(summary);
                node.new_concept_details = None;
                node.original_node = None;
                node.concept_options.clear();
            }
        }

        info!(
            "Commit {} finished: {} created, {} edited, {} retired, {} members added, {} removed",
            run,
            report.created.len(),
            report.edited.len(),
            report.retired.len(),
            report.members_created,
            report.members_removed
        );
        Ok((graph, report))
    }

    /// Proposal nodes, each after every proposal it references
    fn write_order(&self, graph: &ProductGraph) -> CompilerResult<Vec<Identifier>> {
        let proposals: Vec<&Node> = graph
            .nodes()
            .filter(|n| n.new_concept_details.is_some())
            .collect();
        let mut ids: Vec<NodeId> = Vec::with_capacity(proposals.len());
        let mut real: Vec<Identifier> = Vec::new();
        for node in &proposals {
            match node.concept_id.placeholder() {
                Some(placeholder) => ids.push(placeholder),
                None => real.push(node.concept_id.clone()),
            }
        }
        let known: HashSet<NodeId> = ids.iter().copied().collect();

        let mut dependencies = Vec::new();
        for node in &proposals {
            let Some(proposal) = node.new_concept_details.as_ref() else {
                continue;
            };
            for referenced in proposal.axiom.placeholder_references() {
                if !known.contains(&referenced) {
                    return Err(CompilerError::DanglingPlaceholder {
                        placeholder: referenced,
                        referenced_by: node.concept_id.to_string(),
                    });
                }
                if let Some(source) = node.concept_id.placeholder() {
                    dependencies.push((source, referenced));
                }
            }
        }

        let view = GraphView::from_edges(&ids, &dependencies);
        let order = dependency_order(&view)?;
        debug!("Write order: {:?}", order);
        Ok(real
            .into_iter()
            .chain(order.into_iter().map(Identifier::Placeholder))
            .collect())
    }

    fn check_names(&self, graph: &ProductGraph, order: &[Identifier]) -> CompilerResult<()> {
        let unnamed: Vec<String> = order
            .iter()
            .filter_map(|id| graph.node(id))
            .filter(|n| {
                n.new_concept_details
                    .as_ref()
                    .map_or(true, |p| p.effective_fsn().map_or(true, str::is_empty))
            })
            .map(|n| format!("{} {}", n.label, n.concept_id))
            .collect();
        if unnamed.is_empty() {
            Ok(())
        } else {
            Err(CompilerError::Validation(format!(
                "new concepts without a fully specified name: {}",
                unnamed.join(", ")
            )))
        }
    }

    /// Caller-specified ids for new concepts must not exist yet
    async fn check_specified_ids(&self, graph: &ProductGraph, order: &[Identifier]) -> CompilerResult<()> {
        let specified: Vec<String> = order
            .iter()
            .filter_map(|id| graph.node(id))
            .filter(|n| !n.is_concept_edit())
            .filter_map(|n| n.new_concept_details.as_ref()?.specified_concept_id.clone())
            .collect();
        if specified.is_empty() {
            return Ok(());
        }
        let existing = self
            .ctx
            .terminology
            .concept_ids_that_exist(&self.ctx.branch, &specified)
            .await
            .map_err(CompilerError::terminology("checking specified concept ids"))?;
        if existing.is_empty() {
            Ok(())
        } else {
            Err(CompilerError::Validation(format!(
                "specified concept ids already exist: {}",
                existing.join(", ")
            )))
        }
    }

    fn plan(&self, graph: &ProductGraph, order: Vec<Identifier>) -> Vec<PlannedWrite> {
        order
            .into_iter()
            .filter_map(|id| graph.node(&id))
            .map(|node| {
                let kind = if node.is_concept_edit() {
                    WriteKind::Edit
                } else if node.is_retire_and_replace() {
                    WriteKind::RetireAndReplace
                } else {
                    WriteKind::Create
                };
                let concept_id = match kind {
                    WriteKind::Edit => node.original_node.as_ref().map(|o| o.concept.concept_id.clone()),
                    _ => node
                        .new_concept_details
                        .as_ref()
                        .and_then(|p| p.specified_concept_id.clone())
                        .or_else(|| node.concept_id.as_real().map(str::to_string)),
                };
                PlannedWrite {
                    placeholder: node.concept_id.clone(),
                    kind,
                    concept_id,
                }
            })
            .collect()
    }

    /// Fill in reserved ids; on any failure leave them empty so writes go one at a time
    async fn reserve(&self, plan: &mut [PlannedWrite], run: Uuid) {
        let needed = plan.iter().filter(|p| p.concept_id.is_none()).count();
        if needed == 0 {
            return;
        }
        if !self.ctx.terminology.reservation_available() {
            debug!("Commit {}: identifier reservation unavailable, creating sequentially", run);
            return;
        }
        match self
            .ctx
            .terminology
            .reserve_identifiers(&self.ctx.namespace, &self.ctx.partition, needed)
            .await
        {
            Ok(reserved) if reserved.len() == needed => {
                let mut reserved = reserved.into_iter();
                for write in plan.iter_mut().filter(|p| p.concept_id.is_none()) {
                    write.concept_id = reserved.next();
                }
            }
            Ok(reserved) => {
                error!(
                    "Commit {}: asked for {} identifiers in namespace {} but got {}, creating sequentially",
                    run,
                    needed,
                    self.ctx.namespace,
                    reserved.len()
                );
            }
            Err(err) => {
                error!(
                    "Commit {}: failed to reserve {} identifiers in namespace {}, creating sequentially: {}",
                    run, needed, self.ctx.namespace, err
                );
            }
        }
    }

    /// Draft for a node with every known placeholder replaced
    fn draft(&self, node: &Node, mapping: &HashMap<Identifier, Identifier>) -> CompilerResult<ConceptDraft> {
        let proposal = node
            .new_concept_details
            .as_ref()
            .ok_or_else(|| CompilerError::Validation(format!("{} has nothing to write", node.id_and_fsn())))?;
        let mut axiom = proposal.axiom.clone();
        axiom.rewrite_destinations(mapping);
        let source = mapping.get(&node.concept_id).unwrap_or(&node.concept_id);
        let module = proposal.module_id.as_deref();
        let wire = axiom.to_wire(source, module)?;
        let fsn = proposal.effective_fsn().unwrap_or_default();
        let mut draft = ConceptDraft::new(axiom.definition_status, proposal.module_id.clone())
            .with_names(fsn, proposal.effective_preferred_term());
        draft.class_axioms.push(wire);
        Ok(draft)
    }

    /// Level, proposal and association members, one request per node, run concurrently.
    /// Returns how many members were created and removed.
    async fn create_members(
        &self,
        graph: &ProductGraph,
        plan: &[PlannedWrite],
        mapping: &HashMap<Identifier, Identifier>,
    ) -> CompilerResult<(usize, usize)> {
        let mut batches: Vec<Vec<RefsetMember>> = Vec::new();
        for write in plan.iter().filter(|w| w.kind != WriteKind::Edit) {
            let (Some(node), Some(Identifier::Real(id))) = (graph.node(&write.placeholder), mapping.get(&write.placeholder))
            else {
                continue;
            };
            let Some(proposal) = node.new_concept_details.as_ref() else {
                continue;
            };
            let module = proposal.module_id.as_deref();
            let mut members = Vec::new();
            if let Some(refset) = self.ctx.model.level_refset(node.model_level) {
                members.push(RefsetMember::new(refset, id.clone()).with_module(proposal.module_id.clone()));
            }
            members.extend(
                proposal
                    .refset_members
                    .iter()
                    .chain(proposal.non_defining_properties.iter())
                    .map(|p| p.to_member(id, module)),
            );
            if let Some(original) = node.original_node.as_ref() {
                let retired = &original.concept.concept_id;
                if let Some(reason) = &original.inactivation_reason {
                    members.push(
                        RefsetMember::new(INACTIVATION_INDICATOR_REFSET, retired.clone())
                            .with_module(proposal.module_id.clone())
                            .with_field(INACTIVATION_REASON_FIELD, reason.clone()),
                    );
                }
                for association in &original.historical_associations {
                    let target = association.target_id.clone().unwrap_or_else(|| id.clone());
                    members.push(
                        RefsetMember::new(association.refset_id.clone(), retired.clone())
                            .with_module(proposal.module_id.clone())
                            .with_field(TARGET_COMPONENT_FIELD, target),
                    );
                }
            }
            members.sort_by(|a, b| (&a.refset_id, &a.additional_fields).cmp(&(&b.refset_id, &b.additional_fields)));
            members.dedup();
            if !members.is_empty() {
                batches.push(members);
            }
        }
        let mut removals = Vec::new();
        for node in graph.nodes().filter(|n| n.is_property_update()) {
            if let Some(id) = node.concept_id.as_real() {
                let (members, stale) = self.property_changes(node, id).await?;
                if !members.is_empty() {
                    batches.push(members);
                }
                removals.extend(stale);
            }
        }
        if !removals.is_empty() {
            self.ctx
                .terminology
                .remove_refset_members(&self.ctx.branch, &removals)
                .await
                .map_err(CompilerError::terminology(format!(
                    "removing {} reference set members",
                    removals.len()
                )))?;
        }
        let removed = removals.len();
        if batches.is_empty() {
            return Ok((0, removed));
        }

        let mut tasks = JoinSet::new();
        for (index, members) in batches.into_iter().enumerate() {
            let terminology = self.ctx.terminology.clone();
            let branch = self.ctx.branch.clone();
            tasks.spawn(async move {
                let count = members.len();
                terminology
                    .create_refset_members(&branch, &members)
                    .await
                    .map(|_| (index, count))
                    .map_err(CompilerError::terminology(format!(
                        "creating {} reference set members for {}",
                        count,
                        members.first().map(|m| m.referenced_component_id.as_str()).unwrap_or_default()
                    )))
            });
        }
        let created: usize = join_all_or_abort(tasks).await?.into_iter().sum();
        if created == 0 {
            warn!("No reference set members were created");
        }
        Ok((created, removed))
    }

    /// Members to add and member ids to remove so an existing concept carries
    /// exactly its node's properties within the reference sets they touch
    async fn property_changes(&self, node: &Node, id: &str) -> CompilerResult<(Vec<RefsetMember>, Vec<String>)> {
        let refsets: Vec<String> = node
            .non_defining_properties
            .iter()
            .map(|p| p.refset_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if refsets.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }
        let current = self
            .ctx
            .terminology
            .fetch_refset_members(&self.ctx.branch, &[id.to_string()], Some(&refsets), 0, self.ctx.query_limit)
            .await
            .map_err(CompilerError::terminology(format!("reading properties of {}", node.id_and_fsn())))?;

        let wanted: HashSet<(&str, Option<&str>)> = node
            .non_defining_properties
            .iter()
            .map(|p| (p.refset_id.as_str(), p.value.as_deref()))
            .collect();
        let existing: Vec<NonDefiningProperty> = current.iter().map(NonDefiningProperty::from_member).collect();
        let held: HashSet<(&str, Option<&str>)> = existing
            .iter()
            .map(|p| (p.refset_id.as_str(), p.value.as_deref()))
            .collect();
        let stale: Vec<String> = current
            .iter()
            .zip(&existing)
            .filter(|(_, p)| !wanted.contains(&(p.refset_id.as_str(), p.value.as_deref())))
            .filter_map(|(member, _)| member.member_id.clone())
            .collect();
        let module = Some(self.ctx.model.module_id.as_str());
        let missing: Vec<RefsetMember> = node
            .non_defining_properties
            .iter()
            .filter(|p| !held.contains(&(p.refset_id.as_str(), p.value.as_deref())))
            .map(|p| p.to_member(id, module))
            .collect();
        debug!(
            "Property update for {}: {} to add, {} to remove",
            node.id_and_fsn(),
            missing.len(),
            stale.len()
        );
        Ok((missing, stale))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Axiom, HistoricalAssociation, NewConceptProposal, OriginalNode, Relationship};
    use crate::model::constants::*;
    use crate::model::{ModelConfiguration, ModelLevelType};
    use std::sync::Arc;
    use terminology_sdk::{DefinitionStatus, InMemoryTerminology, WriteEvent};

    fn proposed(id: i64, label: &str, level: ModelLevelType, relationships: Vec<Relationship>) -> Node {
        let mut proposal = NewConceptProposal::new(
            Identifier::Placeholder(id),
            Axiom::new(DefinitionStatus::FullyDefined, relationships),
            "clinical drug",
        );
        proposal.fsn = Some(format!("Concept {} (clinical drug)", id));
        Node::proposed(proposal, label, level)
    }

    fn sequencer(service: Arc<InMemoryTerminology>) -> CreationSequencer {
        CreationSequencer::new(CompilationContext::new("MAIN", ModelConfiguration::amt(), service))
    }

    fn chain() -> ProductGraph {
        let mut graph = ProductGraph::new();
        graph
            .add_node(proposed(
                -2,
                "TPUU",
                ModelLevelType::RealClinicalDrug,
                vec![Relationship::is_a(Identifier::Placeholder(-3))],
            ))
            .unwrap();
        graph
            .add_node(proposed(
                -3,
                "MPUU",
                ModelLevelType::ClinicalDrug,
                vec![Relationship::is_a(Identifier::real(MEDICINAL_PRODUCT))],
            ))
            .unwrap();
        graph.add_edge(&Identifier::Placeholder(-2), &Identifier::Placeholder(-3), crate::graph::EdgeLabel::IsA);
        graph
    }

    #[tokio::test]
    async fn test_sequential_creation_order() {
        let service = Arc::new(InMemoryTerminology::default());
        let (graph, report) = sequencer(service.clone()).commit(chain()).await.unwrap();

        let writes = service.writes().await;
        let created: Vec<String> = writes
            .iter()
            .filter_map(|w| match w {
                WriteEvent::CreateConcept(id) => Some(id.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(created.len(), 2);
        assert_eq!(report.placeholder_mapping[&-3], created[0]);
        assert_eq!(report.placeholder_mapping[&-2], created[1]);

        let tpuu = service.concept(&created[1]).await.unwrap();
        assert!(tpuu
            .axiom_relationships()
            .any(|r| r.destination_id.as_deref() == Some(created[0].as_str())));
        assert!(graph.nodes().all(|n| !n.concept_id.is_placeholder()));
        assert!(graph.edges().iter().all(|e| !e.source.is_placeholder() && !e.target.is_placeholder()));
        assert_eq!(report.members_created, 2);
    }

    #[tokio::test]
    async fn test_reserved_ids_use_bulk_write() {
        let service = Arc::new(InMemoryTerminology::default().with_reservation(true));
        let (_, report) = sequencer(service.clone()).commit(chain()).await.unwrap();
        let writes = service.writes().await;
        assert!(matches!(writes.first(), Some(WriteEvent::BulkCreate(ids)) if ids.len() == 2));
        assert_eq!(report.created.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_reservation_falls_back() {
        let service = Arc::new(InMemoryTerminology::default().with_failing_reservation());
        let (_, report) = sequencer(service.clone()).commit(chain()).await.unwrap();
        assert_eq!(report.created.len(), 2);
        assert!(service
            .writes()
            .await
            .iter()
            .all(|w| !matches!(w, WriteEvent::BulkCreate(_))));
    }

    #[tokio::test]
    async fn test_cycle_rejected_before_writes() {
        let service = Arc::new(InMemoryTerminology::default());
        let mut graph = ProductGraph::new();
        graph
            .add_node(proposed(-2, "MP", ModelLevelType::MedicinalProduct, vec![Relationship::is_a(Identifier::Placeholder(-3))]))
            .unwrap();
        graph
            .add_node(proposed(-3, "MPUU", ModelLevelType::ClinicalDrug, vec![Relationship::is_a(Identifier::Placeholder(-2))]))
            .unwrap();
        let err = sequencer(service.clone()).commit(graph).await.unwrap_err();
        assert!(matches!(err, CompilerError::CircularDependency(_)));
        assert!(service.writes().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_placeholder_is_dangling() {
        let service = Arc::new(InMemoryTerminology::default());
        let mut graph = ProductGraph::new();
        graph
            .add_node(proposed(-2, "MP", ModelLevelType::MedicinalProduct, vec![Relationship::is_a(Identifier::Placeholder(-9))]))
            .unwrap();
        let err = sequencer(service.clone()).commit(graph).await.unwrap_err();
        assert!(matches!(err, CompilerError::DanglingPlaceholder { placeholder: -9, .. }));
        assert!(service.writes().await.is_empty());
    }

    #[tokio::test]
    async fn test_unnamed_proposal_rejected() {
        let service = Arc::new(InMemoryTerminology::default());
        let mut graph = chain();
        if let Some(node) = graph.node_mut(&Identifier::Placeholder(-3)) {
            if let Some(proposal) = node.new_concept_details.as_mut() {
                proposal.fsn = None;
            }
        }
        let err = sequencer(service).commit(graph).await.unwrap_err();
        assert!(err.to_string().contains("MPUU -3"));
    }

    #[tokio::test]
    async fn test_property_update_replaces_stale_members() {
        let service = Arc::new(InMemoryTerminology::default());
        let kept = service
            .insert_member(RefsetMember::new("929360071000036103", "333").with_field("mapTarget", "12345"))
            .await;
        let stale = service
            .insert_member(RefsetMember::new("929360071000036103", "333").with_field("mapTarget", "99999"))
            .await;
        service.insert_member(RefsetMember::new("700000000", "333")).await;

        let mut node = Node::existing(
            ConceptSummary::new("333", "Pack (containered trade product)", "Pack", DefinitionStatus::FullyDefined),
            "CTPP",
            ModelLevelType::RealContainerizedPackagedClinicalDrug,
        );
        node.property_update = true;
        node.non_defining_properties = vec![
            NonDefiningProperty::mapping("929360071000036103", "artgId", "12345"),
            NonDefiningProperty::mapping("929360071000036103", "artgId", "55555"),
        ];
        let mut graph = ProductGraph::new();
        graph.add_node(node).unwrap();

        let (_, report) = sequencer(service.clone()).commit(graph).await.unwrap();
        let writes = service.writes().await;
        assert!(writes.contains(&WriteEvent::RemoveMember(stale)));
        assert!(!writes.contains(&WriteEvent::RemoveMember(kept)));
        let created: Vec<&WriteEvent> = writes
            .iter()
            .filter(|w| matches!(w, WriteEvent::CreateMember { .. }))
            .collect();
        assert_eq!(created.len(), 1);
        assert_eq!(report.members_created, 1);
        assert_eq!(report.members_removed, 1);
    }

    async fn seed_original(service: &InMemoryTerminology, id: &str) -> OriginalNode {
        let mut detail = ConceptDraft::new(DefinitionStatus::Primitive, None)
            .with_names("Old pack (medicinal product)", Some("Old pack"))
            .into_detail(id.to_string());
        detail.class_axioms.push(terminology_sdk::Axiom {
            axiom_id: None,
            active: true,
            definition_status: DefinitionStatus::Primitive,
            module_id: None,
            relationships: vec![terminology_sdk::Relationship::to_concept(IS_A, MEDICINAL_PRODUCT, 0)],
        });
        let summary = detail.summary();
        service.insert_concept(detail).await;
        OriginalNode {
            concept: summary,
            inactivation_reason: None,
            historical_associations: Vec::new(),
            referenced_by_other_products: false,
        }
    }

    #[tokio::test]
    async fn test_edit_updates_concept_in_place() {
        let service = Arc::new(InMemoryTerminology::default());
        let original = seed_original(&service, "111").await;
        let mut node = proposed(
            -2,
            "MPUU",
            ModelLevelType::ClinicalDrug,
            vec![Relationship::is_a(Identifier::real(MEDICINAL_PRODUCT))],
        );
        if let Some(proposal) = node.new_concept_details.as_mut() {
            proposal.specified_concept_id = Some("111".to_string());
        }
        node.original_node = Some(original);
        let mut graph = ProductGraph::new();
        graph.add_node(node).unwrap();

        let (graph, report) = sequencer(service.clone()).commit(graph).await.unwrap();
        assert_eq!(report.edited, vec!["111".to_string()]);
        assert!(report.created.is_empty());
        assert!(report.retired.is_empty());
        assert_eq!(service.writes().await, vec![WriteEvent::UpdateConcept("111".to_string())]);

        let edited = service.concept("111").await.unwrap();
        assert!(edited.active);
        assert_eq!(edited.fsn.map(|t| t.term).as_deref(), Some("Concept -2 (clinical drug)"));
        assert!(graph.node(&Identifier::real("111")).is_some());
    }

    #[tokio::test]
    async fn test_retire_and_replace_keeps_retired_body() {
        let service = Arc::new(InMemoryTerminology::default());
        let mut original = seed_original(&service, "111").await;
        original.inactivation_reason = Some("900000000000482003".to_string());
        original.historical_associations.push(HistoricalAssociation {
            refset_id: "900000000000526001".to_string(),
            target_id: None,
        });
        let mut node = proposed(
            -2,
            "MPUU",
            ModelLevelType::ClinicalDrug,
            vec![Relationship::is_a(Identifier::real(MEDICINAL_PRODUCT))],
        );
        node.original_node = Some(original);
        let mut graph = ProductGraph::new();
        graph.add_node(node).unwrap();

        let (_, report) = sequencer(service.clone()).commit(graph).await.unwrap();
        assert_eq!(report.retired, vec!["111".to_string()]);
        assert_eq!(report.created.len(), 1);
        let replacement = report.placeholder_mapping[&-2].clone();

        let retired = service.concept("111").await.unwrap();
        assert!(!retired.active);
        assert_eq!(retired.fsn.map(|t| t.term).as_deref(), Some("Old pack (medicinal product)"));
        assert_eq!(retired.pt.map(|t| t.term).as_deref(), Some("Old pack"));
        assert_eq!(retired.class_axioms.len(), 1);

        let members = service.members().await;
        assert!(members.iter().any(|m| m.refset_id == INACTIVATION_INDICATOR_REFSET
            && m.referenced_component_id == "111"
            && m.additional_fields.get(INACTIVATION_REASON_FIELD).map(String::as_str) == Some("900000000000482003")));
        assert!(members.iter().any(|m| m.refset_id == "900000000000526001"
            && m.referenced_component_id == "111"
            && m.additional_fields.get(TARGET_COMPONENT_FIELD) == Some(&replacement)));
    }

    #[tokio::test]
    async fn test_graph_without_writes_commits_nothing() {
        let service = Arc::new(InMemoryTerminology::default());
        let mut graph = ProductGraph::new();
        graph
            .add_node(Node::existing(
                ConceptSummary::new("333", "Pack (containered trade product)", "Pack", DefinitionStatus::FullyDefined),
                "CTPP",
                ModelLevelType::RealContainerizedPackagedClinicalDrug,
            ))
            .unwrap();
        let (graph, report) = sequencer(service.clone()).commit(graph).await.unwrap();
        assert_eq!(report, CommitReport::default());
        assert_eq!(graph.node_count(), 1);
        assert!(service.writes().await.is_empty());
    }
}
