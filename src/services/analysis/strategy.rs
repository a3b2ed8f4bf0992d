//! Stage Strategies
//!
//! One strategy per stage kind. A strategy sees the gathered context, builds
//! its prompt, consumes the raw model output and persists the stage subtree.
//! `execute_stage` drives the shared pipeline and converts every error that
//! happens inside it into a failed execution result: a bad LLM round trip
//! must never corrupt analysis state or bubble up as a structural error.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::models::analysis::Analysis;
use crate::models::stage::{Stage, StageKind};
use crate::services::documents::DocumentCatalog;
use crate::services::llm::provider::GenerationProvider;
use crate::utils::error::AppResult;

use super::context::{gather_context, StageContext};
use super::store::AnalysisStore;

/// Collaborators a strategy executes against
pub struct StageDeps {
    pub store: AnalysisStore,
    pub documents: Arc<dyn DocumentCatalog>,
    pub provider: Arc<dyn GenerationProvider>,
}

/// Outcome of one stage execution, reported to the caller
#[derive(Debug, Clone)]
pub struct StageExecution {
    pub stage_id: String,
    pub kind: StageKind,
    pub is_success: bool,
    pub error_message: Option<String>,
    /// File names of the documents supplied to the prompt
    pub documents_used: Vec<String>,
}

impl StageExecution {
    fn success(stage: &Stage, documents_used: Vec<String>) -> Self {
        Self {
            stage_id: stage.id.clone(),
            kind: stage.kind,
            is_success: true,
            error_message: None,
            documents_used,
        }
    }

    fn failure(stage: &Stage, message: String, documents_used: Vec<String>) -> Self {
        Self {
            stage_id: stage.id.clone(),
            kind: stage.kind,
            is_success: false,
            error_message: Some(message),
            documents_used,
        }
    }
}

/// Contract implemented by each stage kind
#[async_trait]
pub trait StageStrategy: Send + Sync {
    /// The stage kind this strategy handles
    fn kind(&self) -> StageKind;

    /// Prompt the model, parse its response, build the entity graph and
    /// persist it into `stage`. Called with the context already gathered.
    async fn run(
        &self,
        analysis: &Analysis,
        stage: &Stage,
        context: &StageContext,
        deps: &StageDeps,
    ) -> AppResult<()>;
}

/// Drive the shared execute pipeline: gather context, run the strategy, fold
/// model-output failures into the execution result. A bad LLM round trip is
/// an expected outcome: nothing is persisted (strategies only save after a
/// successful build) and the placeholder stage is left in place so the next
/// continue call retries the same stage. Infrastructure errors (database
/// failures, lost concurrency races) propagate to the caller instead.
pub async fn execute_stage(
    strategy: &dyn StageStrategy,
    analysis: &Analysis,
    stage: &Stage,
    deps: &StageDeps,
) -> AppResult<StageExecution> {
    let context = gather_context(deps.documents.as_ref(), &analysis.id).await?;
    let documents_used = context.file_names();

    match strategy.run(analysis, stage, &context, deps).await {
        Ok(()) => {
            tracing::info!(
                analysis_id = %analysis.id,
                stage = %stage.kind,
                "stage executed"
            );
            Ok(StageExecution::success(stage, documents_used))
        }
        Err(e) if e.is_model_output_error() => {
            tracing::warn!(
                analysis_id = %analysis.id,
                stage = %stage.kind,
                error = %e,
                "stage execution failed"
            );
            Ok(StageExecution::failure(stage, e.to_string(), documents_used))
        }
        Err(e) => Err(e),
    }
}

/// Lookup from stage kind to strategy. Dispatch is an explicit table keyed by
/// the kind enum, decoupled from any entity's runtime type.
pub struct StrategyRegistry {
    strategies: HashMap<StageKind, Arc<dyn StageStrategy>>,
}

impl StrategyRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// Registry with the three built-in strategies
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(super::strategies::PreAnalysisStrategy));
        registry.register(Arc::new(super::strategies::ExplorationStrategy));
        registry.register(Arc::new(super::strategies::InferenceStrategy));
        registry
    }

    /// Register a strategy under its own kind
    pub fn register(&mut self, strategy: Arc<dyn StageStrategy>) {
        self.strategies.insert(strategy.kind(), strategy);
    }

    /// Find the strategy for a stage kind
    pub fn find(&self, kind: StageKind) -> Option<Arc<dyn StageStrategy>> {
        self.strategies.get(&kind).cloned()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
