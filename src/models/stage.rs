//! Pipeline Stages
//!
//! A stage is one phase of the Bardin workflow. A freshly appended stage is
//! an empty placeholder: the `kind` column records which strategy must run
//! next, and the strategy's execution populates the stage subtree in place.

use serde::{Deserialize, Serialize};

use crate::utils::error::{AppError, AppResult};

/// The kind of a pipeline stage.
///
/// This is an explicit state tag: dispatch goes through a lookup keyed by
/// this enum, never through the runtime type of a stage value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    PreAnalysis,
    Exploration,
    Inference,
}

impl StageKind {
    /// Convert to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::PreAnalysis => "pre_analysis",
            StageKind::Exploration => "exploration",
            StageKind::Inference => "inference",
        }
    }

    /// Parse from database string representation
    pub fn parse(s: &str) -> AppResult<Self> {
        match s {
            "pre_analysis" => Ok(StageKind::PreAnalysis),
            "exploration" => Ok(StageKind::Exploration),
            "inference" => Ok(StageKind::Inference),
            _ => Err(AppError::validation(format!("Invalid stage kind: {}", s))),
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stage row. Ordering within an analysis is by `created_at` (with the
/// SQLite rowid as a tie-breaker), not by an explicit position column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    pub id: String,
    pub analysis_id: String,
    pub kind: StageKind,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        for kind in [
            StageKind::PreAnalysis,
            StageKind::Exploration,
            StageKind::Inference,
        ] {
            assert_eq!(StageKind::parse(kind.as_str()).unwrap(), kind);
        }
    }

    #[test]
    fn test_kind_parse_rejects_unknown() {
        assert!(StageKind::parse("conclusion").is_err());
    }
}
