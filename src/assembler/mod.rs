//! GraphAssembler: builds complete product graphs
//!
//! Two entry points share the resolver, the closure rules and the fail-fast
//! task joining in this module:
//! - [`GraphAssembler::read`] walks an existing package concept;
//! - [`GraphAssembler::create`] compiles a package attribute tree, proposing
//!   new concepts where nothing existing matches.

pub mod relationships;

mod create;
mod read;

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::context::CompilationContext;
use crate::details::PackageDetails;
use crate::error::{CompilerError, CompilerResult};
use crate::graph::{ClosureReasoner, ProductGraph};
use crate::placeholder::PlaceholderIdentityCache;
use crate::resolver::ConceptResolver;
use crate::validation::ValidatorRegistry;
use terminology_sdk::TerminologyError;

use create::CreateFlow;
use read::ReadFlow;

/// Join every task, returning results in index order.
///
/// The first failure aborts the remaining tasks and is returned.
pub(crate) async fn join_all_or_abort<T>(mut tasks: JoinSet<CompilerResult<(usize, T)>>) -> CompilerResult<Vec<T>>
where
    T: Send + 'static,
{
    let mut results = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        let outcome = joined
            .map_err(|e| CompilerError::TaskFailed(e.to_string()))
            .and_then(|r| r);
        match outcome {
            Ok(result) => results.push(result),
            Err(err) => {
                warn!("Compilation task failed, aborting {} siblings: {}", tasks.len(), err);
                tasks.abort_all();
                return Err(err);
            }
        }
    }
    results.sort_by_key(|(index, _)| *index);
    Ok(results.into_iter().map(|(_, value)| value).collect())
}

/// Builds product graphs for one branch and model
pub struct GraphAssembler {
    ctx: CompilationContext,
    validators: Arc<ValidatorRegistry>,
    reasoner: ClosureReasoner,
}

impl GraphAssembler {
    pub fn new(ctx: CompilationContext) -> Self {
        Self {
            ctx,
            validators: Arc::new(ValidatorRegistry::default()),
            reasoner: ClosureReasoner::new(),
        }
    }

    pub fn with_validators(mut self, validators: ValidatorRegistry) -> Self {
        self.validators = Arc::new(validators);
        self
    }

    pub fn context(&self) -> &CompilationContext {
        &self.ctx
    }

    /// Graph of an existing package and everything it contains
    pub async fn read(&self, package_id: &str) -> CompilerResult<ProductGraph> {
        info!("Reading product graph for {} on {}", package_id, self.ctx.branch);
        self.ctx
            .terminology
            .get_concept(&self.ctx.branch, package_id)
            .await
            .map_err(|err| match err {
                TerminologyError::NotFound(_) => {
                    CompilerError::NothingToCompile(format!("no package {} on {}", package_id, self.ctx.branch))
                }
                other => CompilerError::Terminology {
                    context: format!("loading package {}", package_id),
                    source: other,
                },
            })?;

        let resolver = ConceptResolver::new(self.ctx.clone());
        let mut graph = ReadFlow::new(resolver.clone())
            .package_graph(package_id.to_string())
            .await?;
        let inferred = resolver.add_transitive_is_a_edges(&mut graph).await?;
        let closed = graph.close(&self.reasoner);
        info!(
            "Read {} nodes for {} ({} is a edges from the terminology, {} from closure)",
            graph.node_count(),
            package_id,
            inferred,
            closed
        );
        Ok(graph)
    }

    /// Compile a package attribute tree into a graph of existing concepts
    /// and new concept proposals.
    ///
    /// Labels supplied with the details seed a fresh placeholder cache, so
    /// every create run starts its placeholders at -2.
    pub async fn create(&self, mut details: PackageDetails) -> CompilerResult<ProductGraph> {
        self.validators.validate(self.ctx.model.model_type, &details)?;
        details.cascade_selected_identifiers();

        let ctx = self
            .ctx
            .clone()
            .with_cache(PlaceholderIdentityCache::new(details.id_fsn_map(), details.id_pt_map()));
        let mut graph = CreateFlow::new(ConceptResolver::new(ctx))
            .package_graph(Arc::new(details))
            .await?;

        let merged = graph.deduplicate_new_nodes();
        let closed = graph.close(&self.reasoner);
        let subject = graph.single_subject()?.concept_id.clone();
        info!(
            "Created product graph for {}: {} nodes, {} new, {} merged, {} edges from closure",
            subject,
            graph.node_count(),
            graph.nodes().filter(|n| n.is_new_concept()).count(),
            merged,
            closed
        );
        Ok(graph)
    }
}
