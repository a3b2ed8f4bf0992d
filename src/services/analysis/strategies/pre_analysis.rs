//! Pre-Analysis Strategy
//!
//! First stage of the pipeline: floating reading of the corpus and
//! extraction of analytical indices, each justified by a (globally shared)
//! indicator and backed by document citations.

use async_trait::async_trait;

use crate::models::analysis::Analysis;
use crate::models::stage::{Stage, StageKind};
use crate::utils::error::AppResult;

use super::super::builders::build_pre_analysis;
use super::super::context::StageContext;
use super::super::prompts;
use super::super::response::{self, PreAnalysisResponse};
use super::super::strategy::{StageDeps, StageStrategy};

pub struct PreAnalysisStrategy;

#[async_trait]
impl StageStrategy for PreAnalysisStrategy {
    fn kind(&self) -> StageKind {
        StageKind::PreAnalysis
    }

    async fn run(
        &self,
        analysis: &Analysis,
        stage: &Stage,
        context: &StageContext,
        deps: &StageDeps,
    ) -> AppResult<()> {
        let prompt = prompts::pre_analysis_prompt(analysis, context);
        let raw = deps
            .provider
            .generate(&prompt, &context.attachments())
            .await?;

        let parsed: PreAnalysisResponse = response::parse(&response::sanitize(&raw))?;

        let documents: Vec<_> = context.all().cloned().collect();
        let graph = build_pre_analysis(parsed, &documents)?;
        let saved =
            deps.store
                .save_pre_analysis(&analysis.id, &stage.id, analysis.version, &graph)?;

        tracing::info!(
            analysis_id = %analysis.id,
            stage_id = %stage.id,
            indexes = saved,
            "pre-analysis stage persisted"
        );
        Ok(())
    }
}
