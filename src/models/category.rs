//! Exploration Entities
//!
//! Categories group register units (text excerpts). A register unit may link
//! back to indexes created in an earlier stage of the same analysis through a
//! many-to-many relation.

use serde::{Deserialize, Serialize};

/// A grouping construct from the exploration stage.
/// Unique by (stage_id, name).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub stage_id: String,
    pub name: String,
    pub definition: String,
    /// Taken verbatim from the model output, not derived from the number of
    /// register units actually built.
    pub frequency: i64,
}

/// A text excerpt grouped under a category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUnit {
    pub id: i64,
    pub category_id: i64,
    pub text: String,
    pub source_document_uri: String,
    pub page: Option<String>,
    pub justification: Option<String>,
    /// Ids of earlier-stage indexes this unit was matched against
    pub found_index_ids: Vec<i64>,
}
