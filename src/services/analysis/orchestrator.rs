//! Analysis Orchestrator
//!
//! Top-level entry point of the pipeline. Starting an analysis appends the
//! first placeholder stage; continuing executes the pending placeholder and
//! either appends the next one or completes the analysis; reverting removes
//! the most recent stage. The transition table is a pure function over the
//! explicit stage-kind enum.

use std::sync::Arc;

use crate::models::analysis::{Analysis, AnalysisStatus};
use crate::models::stage::StageKind;
use crate::services::documents::DocumentCatalog;
use crate::services::llm::provider::GenerationProvider;
use crate::storage::database::Database;
use crate::utils::error::{AppError, AppResult};

use super::store::AnalysisStore;
use super::strategy::{execute_stage, StageDeps, StageExecution, StrategyRegistry};

/// Fixed stage transition table.
///
/// `None` as input is the state before any stage exists; `None` as output
/// means the pipeline is exhausted and the analysis completes.
pub fn next_stage_kind(current: Option<StageKind>) -> Option<StageKind> {
    match current {
        None => Some(StageKind::PreAnalysis),
        Some(StageKind::PreAnalysis) => Some(StageKind::Exploration),
        Some(StageKind::Exploration) => Some(StageKind::Inference),
        Some(StageKind::Inference) => None,
    }
}

/// Orchestrates start/continue/revert over the staged pipeline
pub struct AnalysisOrchestrator {
    deps: StageDeps,
    registry: StrategyRegistry,
}

impl AnalysisOrchestrator {
    pub fn new(
        db: Database,
        documents: Arc<dyn DocumentCatalog>,
        provider: Arc<dyn GenerationProvider>,
    ) -> Self {
        Self {
            deps: StageDeps {
                store: AnalysisStore::new(db),
                documents,
                provider,
            },
            registry: StrategyRegistry::with_defaults(),
        }
    }

    /// Replace the strategy registry (used to stub strategies in tests)
    pub fn with_registry(mut self, registry: StrategyRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Access to the underlying store
    pub fn store(&self) -> &AnalysisStore {
        &self.deps.store
    }

    /// Start a draft analysis owned by `user_id`: append the first
    /// placeholder stage, set status Running, and execute it.
    pub async fn start_analysis(
        &self,
        analysis_id: &str,
        user_id: &str,
    ) -> AppResult<StageExecution> {
        let analysis = self
            .deps
            .store
            .get_analysis(analysis_id)?
            .ok_or_else(|| AppError::not_found(format!("analysis {}", analysis_id)))?;

        // Ownership failures read as not-found so callers cannot probe for
        // other users' analyses.
        if analysis.owner_id != user_id {
            return Err(AppError::not_found(format!("analysis {}", analysis_id)));
        }
        if analysis.status != AnalysisStatus::Draft {
            return Err(AppError::invalid_state(format!(
                "analysis {} is {}, only a draft can be started",
                analysis_id, analysis.status
            )));
        }
        if !analysis.stages.is_empty() {
            return Err(AppError::invalid_state(format!(
                "analysis {} already has stages",
                analysis_id
            )));
        }

        let first_kind = next_stage_kind(None).ok_or_else(|| {
            AppError::internal("transition table has no initial stage".to_string())
        })?;
        self.deps
            .store
            .begin_analysis(analysis_id, analysis.version, first_kind)?;

        tracing::info!(analysis_id = %analysis_id, "analysis started");
        self.continue_analysis(analysis_id).await
    }

    /// Execute the pending placeholder stage. On success, append the next
    /// placeholder or mark the analysis Completed. On a model-output failure
    /// the analysis is left untouched: status unchanged, the placeholder
    /// still pending, so the next call retries the same stage.
    ///
    /// The placeholder is claimed (version bump) before the model round
    /// trip; a concurrent continue or revert holding the same snapshot fails
    /// with Conflict before hitting the provider, and its save transactions
    /// are guarded by the claimed version as a second line.
    pub async fn continue_analysis(&self, analysis_id: &str) -> AppResult<StageExecution> {
        let mut analysis = self
            .deps
            .store
            .get_analysis(analysis_id)?
            .ok_or_else(|| AppError::not_found(format!("analysis {}", analysis_id)))?;

        if analysis.status == AnalysisStatus::Completed {
            return Err(AppError::invalid_state(format!(
                "analysis {} is already completed",
                analysis_id
            )));
        }

        let stage = analysis.last_stage().cloned().ok_or_else(|| {
            AppError::invalid_state(format!("analysis {} has not been started", analysis_id))
        })?;

        let strategy = self.registry.find(stage.kind).ok_or_else(|| {
            AppError::internal(format!(
                "no strategy registered for stage kind {}",
                stage.kind
            ))
        })?;

        analysis.version = self
            .deps
            .store
            .claim_stage(analysis_id, analysis.version)?;

        let execution = execute_stage(strategy.as_ref(), &analysis, &stage, &self.deps).await?;

        if execution.is_success {
            let next = next_stage_kind(Some(stage.kind));
            self.deps
                .store
                .advance_analysis(analysis_id, analysis.version, next)?;
            if next.is_none() {
                tracing::info!(analysis_id = %analysis_id, "analysis completed");
            }
        }

        Ok(execution)
    }

    /// Remove the most recently created stage and its uniquely owned
    /// subtree. Returns the updated analysis, or None if it does not exist.
    pub async fn revert_last_stage(&self, analysis_id: &str) -> AppResult<Option<Analysis>> {
        let reverted = self.deps.store.revert_last_stage(analysis_id)?;
        if reverted.is_some() {
            tracing::info!(analysis_id = %analysis_id, "last stage reverted");
        }
        Ok(reverted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::models::document::DocumentPurpose;
    use crate::services::documents::{NewDocument, SqliteDocumentCatalog};
    use crate::services::llm::types::{DocumentAttachment, LlmResult};

    /// Provider that replays a scripted list of responses
    struct ScriptedProvider {
        responses: Mutex<Vec<LlmResult<String>>>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<LlmResult<String>>) -> Self {
            Self {
                responses: Mutex::new(responses),
            }
        }
    }

    #[async_trait]
    impl GenerationProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn model(&self) -> &str {
            "scripted-model"
        }

        async fn generate(
            &self,
            _prompt: &str,
            _documents: &[DocumentAttachment],
        ) -> LlmResult<String> {
            self.responses
                .lock()
                .unwrap()
                .remove(0)
        }

        async fn health_check(&self) -> LlmResult<()> {
            Ok(())
        }
    }

    const PRE_ANALYSIS_JSON: &str = r#"{"indices":[{"name":"Idx1","description":"d","indicator":"Ind1","references":[{"document":"A.pdf","page":"2"}]}]}"#;
    const EXPLORATION_JSON: &str = r#"{"categories":[{"name":"C1","definition":"def","frequency":1,"registerUnits":[{"text":"t","document":"A.pdf","page":"2","justification":"j","foundIndices":["1"]}]}]}"#;

    fn orchestrator(responses: Vec<LlmResult<String>>) -> (AnalysisOrchestrator, Database) {
        let db = Database::new_in_memory().unwrap();
        let catalog = Arc::new(SqliteDocumentCatalog::new(db.clone()));
        let provider = Arc::new(ScriptedProvider::new(responses));
        (
            AnalysisOrchestrator::new(db.clone(), catalog, provider),
            db,
        )
    }

    fn seed_analysis(db: &Database) -> Analysis {
        let store = AnalysisStore::new(db.clone());
        let analysis = store.create_analysis("user-1", "Q").unwrap();
        let catalog = SqliteDocumentCatalog::new(db.clone());
        catalog
            .insert_document(NewDocument {
                analysis_id: analysis.id.clone(),
                file_name: "A.pdf".to_string(),
                title: None,
                purpose: DocumentPurpose::Analysis,
                storage_uri: "files/a".to_string(),
                mime_type: "application/pdf".to_string(),
            })
            .unwrap();
        analysis
    }

    #[test]
    fn test_transition_table() {
        assert_eq!(next_stage_kind(None), Some(StageKind::PreAnalysis));
        assert_eq!(
            next_stage_kind(Some(StageKind::PreAnalysis)),
            Some(StageKind::Exploration)
        );
        assert_eq!(
            next_stage_kind(Some(StageKind::Exploration)),
            Some(StageKind::Inference)
        );
        assert_eq!(next_stage_kind(Some(StageKind::Inference)), None);
    }

    #[tokio::test]
    async fn test_start_runs_first_stage_and_appends_next() {
        let (orchestrator, db) = orchestrator(vec![Ok(PRE_ANALYSIS_JSON.to_string())]);
        let analysis = seed_analysis(&db);

        let execution = orchestrator
            .start_analysis(&analysis.id, "user-1")
            .await
            .unwrap();
        assert!(execution.is_success);
        assert_eq!(execution.kind, StageKind::PreAnalysis);
        assert_eq!(execution.documents_used, vec!["A.pdf".to_string()]);

        let reloaded = orchestrator.store().get_analysis(&analysis.id).unwrap().unwrap();
        assert_eq!(reloaded.status, AnalysisStatus::Running);
        // Executed pre-analysis stage plus the appended exploration placeholder.
        assert_eq!(reloaded.stages.len(), 2);
        assert_eq!(reloaded.stages[1].kind, StageKind::Exploration);
    }

    #[tokio::test]
    async fn test_start_requires_owner() {
        let (orchestrator, db) = orchestrator(vec![]);
        let analysis = seed_analysis(&db);
        let err = orchestrator
            .start_analysis(&analysis.id, "intruder")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_start_requires_draft() {
        let (orchestrator, db) = orchestrator(vec![Ok(PRE_ANALYSIS_JSON.to_string())]);
        let analysis = seed_analysis(&db);
        orchestrator
            .start_analysis(&analysis.id, "user-1")
            .await
            .unwrap();

        let err = orchestrator
            .start_analysis(&analysis.id, "user-1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_start_unknown_analysis() {
        let (orchestrator, _db) = orchestrator(vec![]);
        let err = orchestrator
            .start_analysis("missing", "user-1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_continue_until_completed() {
        let (orchestrator, db) = orchestrator(vec![
            Ok(PRE_ANALYSIS_JSON.to_string()),
            Ok(EXPLORATION_JSON.to_string()),
        ]);
        let analysis = seed_analysis(&db);

        orchestrator
            .start_analysis(&analysis.id, "user-1")
            .await
            .unwrap();
        let exploration = orchestrator.continue_analysis(&analysis.id).await.unwrap();
        assert!(exploration.is_success);
        assert_eq!(exploration.kind, StageKind::Exploration);

        let inference = orchestrator.continue_analysis(&analysis.id).await.unwrap();
        assert!(inference.is_success);
        assert_eq!(inference.kind, StageKind::Inference);

        let reloaded = orchestrator.store().get_analysis(&analysis.id).unwrap().unwrap();
        assert_eq!(reloaded.status, AnalysisStatus::Completed);
        assert_eq!(reloaded.stages.len(), 3);

        let err = orchestrator
            .continue_analysis(&analysis.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_failed_execution_leaves_state_untouched() {
        let (orchestrator, db) = orchestrator(vec![
            Ok("not json".to_string()),
            Ok(PRE_ANALYSIS_JSON.to_string()),
        ]);
        let analysis = seed_analysis(&db);

        let failed = orchestrator
            .start_analysis(&analysis.id, "user-1")
            .await
            .unwrap();
        assert!(!failed.is_success);
        assert!(failed
            .error_message
            .as_deref()
            .unwrap()
            .contains("Malformed response"));

        let reloaded = orchestrator.store().get_analysis(&analysis.id).unwrap().unwrap();
        assert_eq!(reloaded.status, AnalysisStatus::Running);
        assert_eq!(reloaded.stages.len(), 1);
        assert!(orchestrator
            .store()
            .indexes_for_stage(&reloaded.stages[0].id)
            .unwrap()
            .is_empty());

        // The placeholder is retained: the next continue retries the stage.
        let retried = orchestrator.continue_analysis(&analysis.id).await.unwrap();
        assert!(retried.is_success);
        assert_eq!(retried.kind, StageKind::PreAnalysis);
    }

    #[tokio::test]
    async fn test_continue_before_start_is_invalid() {
        let (orchestrator, db) = orchestrator(vec![]);
        let analysis = seed_analysis(&db);
        let err = orchestrator
            .continue_analysis(&analysis.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_missing_strategy_is_fatal() {
        let (orchestrator, db) = orchestrator(vec![]);
        let orchestrator = orchestrator.with_registry(StrategyRegistry::new());
        let analysis = seed_analysis(&db);
        orchestrator
            .store()
            .begin_analysis(&analysis.id, 0, StageKind::PreAnalysis)
            .unwrap();

        let err = orchestrator
            .continue_analysis(&analysis.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[tokio::test]
    async fn test_revert_two_stages_keeps_first() {
        let (orchestrator, db) = orchestrator(vec![Ok(PRE_ANALYSIS_JSON.to_string())]);
        let analysis = seed_analysis(&db);
        orchestrator
            .start_analysis(&analysis.id, "user-1")
            .await
            .unwrap();

        let reverted = orchestrator
            .revert_last_stage(&analysis.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reverted.stages.len(), 1);
        assert_eq!(reverted.status, AnalysisStatus::Running);
        assert_eq!(reverted.stages[0].kind, StageKind::PreAnalysis);
    }

    #[tokio::test]
    async fn test_revert_missing_analysis() {
        let (orchestrator, _db) = orchestrator(vec![]);
        assert!(orchestrator
            .revert_last_stage("missing")
            .await
            .unwrap()
            .is_none());
    }
}
