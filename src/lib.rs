//! Bardin Engine - Staged Content-Analysis Pipeline
//!
//! This library implements an LLM-assisted qualitative content-analysis
//! workflow following the Bardin methodology. It includes:
//! - The staged analysis state machine (orchestrator + transition table)
//! - Per-stage strategies that prompt the model and consume its output
//! - A tolerant parser for semi-structured model responses
//! - Graph builders and a transactional persistence layer (SQLite)

pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

pub use models::analysis::{Analysis, AnalysisStatus};
pub use models::stage::{Stage, StageKind};
pub use services::analysis::orchestrator::AnalysisOrchestrator;
pub use services::analysis::strategy::StageExecution;
pub use storage::database::Database;
pub use utils::error::{AppError, AppResult};
