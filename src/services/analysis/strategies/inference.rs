//! Inference Strategy
//!
//! Final stage of the Bardin workflow. Content generation for this stage is
//! not built yet: the strategy succeeds without persisting anything so the
//! state machine can run to Completed. The empty stage row still marks that
//! the inference phase ran.

use async_trait::async_trait;

use crate::models::analysis::Analysis;
use crate::models::stage::{Stage, StageKind};
use crate::utils::error::AppResult;

use super::super::context::StageContext;
use super::super::strategy::{StageDeps, StageStrategy};

pub struct InferenceStrategy;

#[async_trait]
impl StageStrategy for InferenceStrategy {
    fn kind(&self) -> StageKind {
        StageKind::Inference
    }

    async fn run(
        &self,
        analysis: &Analysis,
        stage: &Stage,
        _context: &StageContext,
        _deps: &StageDeps,
    ) -> AppResult<()> {
        tracing::info!(
            analysis_id = %analysis.id,
            stage_id = %stage.id,
            "inference stage has no content generation yet; marking it done"
        );
        Ok(())
    }
}
