//! Run-scoped compilation context
//!
//! Built once per compilation and cloned into every resolver task. All
//! shared state sits behind `Arc`s; the placeholder cache synchronizes
//! itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use terminology_sdk::TerminologyService;

use crate::config::CompilerConfig;
use crate::error::{CompilerError, CompilerResult};
use crate::model::ModelConfiguration;
use crate::naming::NameGenerationService;
use crate::placeholder::PlaceholderIdentityCache;

/// Everything a compilation run shares between its tasks
#[derive(Clone)]
pub struct CompilationContext {
    pub branch: String,
    pub model: Arc<ModelConfiguration>,
    pub terminology: Arc<dyn TerminologyService>,
    pub cache: Arc<PlaceholderIdentityCache>,
    pub naming: Option<NameGenerationService>,
    pub query_limit: usize,
    /// Identifier namespace for the branch
    pub namespace: String,
    pub partition: String,
    cancelled: Arc<AtomicBool>,
}

impl CompilationContext {
    pub fn new(
        branch: impl Into<String>,
        model: ModelConfiguration,
        terminology: Arc<dyn TerminologyService>,
    ) -> Self {
        let defaults = CompilerConfig::default();
        Self {
            branch: branch.into(),
            model: Arc::new(model),
            terminology,
            cache: Arc::new(PlaceholderIdentityCache::default()),
            naming: None,
            query_limit: defaults.query_limit,
            namespace: defaults.namespace,
            partition: defaults.partition,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Context for the configured branch and model
    pub fn from_config(config: &CompilerConfig, terminology: Arc<dyn TerminologyService>) -> Self {
        let mut context = Self::new(config.branch.clone(), config.model.clone(), terminology);
        context.query_limit = config.query_limit;
        context.namespace = config.namespace_for_branch(&config.branch).to_string();
        context.partition = config.partition.clone();
        context
    }

    pub fn with_naming(mut self, naming: NameGenerationService) -> Self {
        self.naming = Some(naming);
        self
    }

    /// Replace the placeholder cache, e.g. one seeded with caller label hints
    pub fn with_cache(mut self, cache: PlaceholderIdentityCache) -> Self {
        self.cache = Arc::new(cache);
        self
    }

    pub fn with_query_limit(mut self, limit: usize) -> Self {
        self.query_limit = limit;
        self
    }

    /// Ask every task of this run to stop at its next checkpoint
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn check_cancelled(&self) -> CompilerResult<()> {
        if self.is_cancelled() {
            Err(CompilerError::Cancelled)
        } else {
            Ok(())
        }
    }
}
