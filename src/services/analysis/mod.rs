//! Staged Analysis Pipeline
//!
//! The core of the engine: the orchestrator advances an analysis through its
//! stages; each stage kind has a strategy that gathers context, prompts the
//! model, parses the untrusted response, builds the entity graph and persists
//! it transactionally.

pub mod builders;
pub mod context;
pub mod orchestrator;
pub mod prompts;
pub mod response;
pub mod store;
pub mod strategies;
pub mod strategy;

pub use orchestrator::{next_stage_kind, AnalysisOrchestrator};
pub use store::AnalysisStore;
pub use strategy::{StageExecution, StageStrategy, StrategyRegistry};
