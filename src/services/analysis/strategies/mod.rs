//! Built-in stage strategies

pub mod exploration;
pub mod inference;
pub mod pre_analysis;

pub use exploration::ExplorationStrategy;
pub use inference::InferenceStrategy;
pub use pre_analysis::PreAnalysisStrategy;
