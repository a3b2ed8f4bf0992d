//! Exploration Strategy
//!
//! Second stage: groups register units into categories. The prompt is seeded
//! with the persisted pre-analysis indexes (including their ids) so the model
//! can cite them back through `foundIndices`.

use async_trait::async_trait;

use crate::models::analysis::Analysis;
use crate::models::stage::{Stage, StageKind};
use crate::utils::error::AppResult;

use super::super::builders::build_exploration;
use super::super::context::StageContext;
use super::super::prompts;
use super::super::response::{self, ExplorationResponse};
use super::super::strategy::{StageDeps, StageStrategy};

pub struct ExplorationStrategy;

#[async_trait]
impl StageStrategy for ExplorationStrategy {
    fn kind(&self) -> StageKind {
        StageKind::Exploration
    }

    async fn run(
        &self,
        analysis: &Analysis,
        stage: &Stage,
        context: &StageContext,
        deps: &StageDeps,
    ) -> AppResult<()> {
        let previous_indexes = deps.store.pre_analysis_indexes(&analysis.id)?;
        let prompt = prompts::exploration_prompt(analysis, context, &previous_indexes);
        let raw = deps
            .provider
            .generate(&prompt, &context.attachments())
            .await?;

        let parsed: ExplorationResponse = response::parse(&response::sanitize(&raw))?;

        let documents: Vec<_> = context.all().cloned().collect();
        // Zero categories is a valid (if unhelpful) answer: the stage is
        // persisted empty rather than failed.
        let graph = build_exploration(parsed, &documents);
        let saved =
            deps.store
                .save_exploration(&analysis.id, &stage.id, analysis.version, &graph)?;

        tracing::info!(
            analysis_id = %analysis.id,
            stage_id = %stage.id,
            categories = saved,
            "exploration stage persisted"
        );
        Ok(())
    }
}
