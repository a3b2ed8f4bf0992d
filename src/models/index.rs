//! Pre-Analysis Entities
//!
//! Indicators are globally shared, case-insensitively deduplicated criteria.
//! Indexes are per-stage analytical markers, each justified by one indicator
//! and backed by document references.

use serde::{Deserialize, Serialize};

/// A globally unique, shared criterion. Never owned by a stage or an
/// analysis: reverting a stage must not delete indicators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Indicator {
    pub id: i64,
    pub name: String,
}

/// An analytical marker discovered during pre-analysis.
/// Unique by (stage_id, name).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Index {
    pub id: i64,
    pub stage_id: String,
    pub indicator_id: i64,
    pub name: String,
    pub description: Option<String>,
}

/// A citation backing an index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexReference {
    pub id: i64,
    pub index_id: i64,
    pub source_document_uri: String,
    pub page: Option<String>,
    pub quoted_content: Option<String>,
}

/// Flattened index view used when seeding later-stage prompts and when
/// reporting stage contents. Carries the resolved indicator name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSummary {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub indicator_name: String,
}
