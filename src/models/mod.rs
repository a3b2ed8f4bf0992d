//! Domain data model for the staged analysis pipeline.

pub mod analysis;
pub mod category;
pub mod document;
pub mod index;
pub mod stage;

pub use analysis::{Analysis, AnalysisStatus};
pub use category::{Category, RegisterUnit};
pub use document::{Document, DocumentPurpose};
pub use index::{Index, IndexReference, IndexSummary, Indicator};
pub use stage::{Stage, StageKind};
