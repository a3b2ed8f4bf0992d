//! Analysis Aggregate
//!
//! The analysis is the aggregate root of the pipeline: it owns its stages
//! (cascade delete) and carries the lifecycle status plus an optimistic
//! concurrency token.

use serde::{Deserialize, Serialize};

use crate::models::stage::Stage;
use crate::utils::error::{AppError, AppResult};

/// Lifecycle status of an analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Draft,
    Running,
    Completed,
    Failed,
}

impl AnalysisStatus {
    /// Convert to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Draft => "draft",
            AnalysisStatus::Running => "running",
            AnalysisStatus::Completed => "completed",
            AnalysisStatus::Failed => "failed",
        }
    }

    /// Parse from database string representation
    pub fn parse(s: &str) -> AppResult<Self> {
        match s {
            "draft" => Ok(AnalysisStatus::Draft),
            "running" => Ok(AnalysisStatus::Running),
            "completed" => Ok(AnalysisStatus::Completed),
            "failed" => Ok(AnalysisStatus::Failed),
            _ => Err(AppError::validation(format!(
                "Invalid analysis status: {}",
                s
            ))),
        }
    }
}

impl std::fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An analysis with its ordered stages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub id: String,
    pub owner_id: String,
    pub central_question: String,
    pub status: AnalysisStatus,
    /// Optimistic concurrency token, bumped on every lifecycle transition
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
    /// Stages ordered by creation time (oldest first)
    pub stages: Vec<Stage>,
}

impl Analysis {
    /// The most recently created stage, if any
    pub fn last_stage(&self) -> Option<&Stage> {
        self.stages.last()
    }
}
