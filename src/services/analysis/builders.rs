//! Graph Builders
//!
//! Map a parsed model response plus the supporting documents into the entity
//! graph to persist. Builders are tolerant consumers: unusable entries are
//! logged and dropped rather than failing the whole stage, and unresolved
//! document names become a sentinel string instead of an error.

use std::collections::HashSet;

use crate::models::document::Document;
use crate::utils::error::{AppError, AppResult};

use super::response::{
    value_to_i64, value_to_string, ExplorationResponse, PreAnalysisResponse,
};

/// Sentinel stored when a model-cited document name matches nothing
pub const DOCUMENT_NOT_FOUND_PREFIX: &str = "NOT FOUND: ";

// ============================================================================
// Output shapes
// ============================================================================

/// Entity graph produced from a pre-analysis response
#[derive(Debug, Clone)]
pub struct PreAnalysisGraph {
    pub indexes: Vec<NewIndex>,
}

#[derive(Debug, Clone)]
pub struct NewIndex {
    pub name: String,
    pub description: Option<String>,
    /// Resolved to a shared Indicator row (get-or-create) at save time
    pub indicator_name: String,
    pub references: Vec<NewIndexReference>,
}

#[derive(Debug, Clone)]
pub struct NewIndexReference {
    pub source_document_uri: String,
    pub page: Option<String>,
    pub quoted_content: Option<String>,
}

/// Entity graph produced from an exploration response
#[derive(Debug, Clone)]
pub struct ExplorationGraph {
    pub categories: Vec<NewCategory>,
}

#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub definition: String,
    /// Caller-supplied by the model, stored verbatim
    pub frequency: i64,
    pub register_units: Vec<NewRegisterUnit>,
}

#[derive(Debug, Clone)]
pub struct NewRegisterUnit {
    pub text: String,
    pub source_document_uri: String,
    pub page: Option<String>,
    pub justification: Option<String>,
    /// Syntactically valid index ids; existence is verified at save time
    pub found_index_ids: Vec<i64>,
}

// ============================================================================
// Building
// ============================================================================

/// Resolve a model-cited document name against the documents supplied to the
/// prompt. Falls back to the sentinel placeholder when nothing matches.
fn resolve_document_uri(cited: Option<&str>, documents: &[Document]) -> String {
    let name = cited.unwrap_or("").trim();
    if let Some(doc) = documents.iter().find(|d| d.matches_name(name)) {
        return doc.storage_uri.clone();
    }
    tracing::warn!(document = name, "model cited an unknown document");
    format!("{}{}", DOCUMENT_NOT_FOUND_PREFIX, name)
}

/// Build the pre-analysis entity graph.
///
/// Entries without a name or indicator are dropped with a warning; if nothing
/// usable remains the build fails with `EmptyResponse` (the pre-analysis
/// stage is meaningless without indices).
pub fn build_pre_analysis(
    response: PreAnalysisResponse,
    documents: &[Document],
) -> AppResult<PreAnalysisGraph> {
    let mut seen_names: HashSet<String> = HashSet::new();
    let mut indexes = Vec::new();

    for payload in response.indices {
        let name = payload.name.trim().to_string();
        if name.is_empty() {
            tracing::warn!("dropping index entry without a name");
            continue;
        }
        let Some(indicator_name) = payload
            .indicator
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
        else {
            tracing::warn!(index = %name, "dropping index entry without an indicator");
            continue;
        };
        if !seen_names.insert(name.to_lowercase()) {
            tracing::warn!(index = %name, "dropping duplicate index name within the stage");
            continue;
        }

        let references = payload
            .references
            .into_iter()
            .map(|reference| NewIndexReference {
                source_document_uri: resolve_document_uri(
                    reference.document.as_deref(),
                    documents,
                ),
                page: reference.page.as_ref().and_then(value_to_string),
                quoted_content: reference
                    .quoted_content
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty()),
            })
            .collect();

        indexes.push(NewIndex {
            name,
            description: payload
                .description
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            indicator_name,
            references,
        });
    }

    if indexes.is_empty() {
        return Err(AppError::EmptyResponse(
            "model produced no usable indices".to_string(),
        ));
    }

    Ok(PreAnalysisGraph { indexes })
}

/// Build the exploration entity graph.
///
/// An empty category list is accepted: the stage is persisted with zero
/// categories rather than treated as a failure.
pub fn build_exploration(
    response: ExplorationResponse,
    documents: &[Document],
) -> ExplorationGraph {
    let mut seen_names: HashSet<String> = HashSet::new();
    let mut categories = Vec::new();

    for payload in response.categories {
        let name = payload.name.trim().to_string();
        if name.is_empty() {
            tracing::warn!("dropping category entry without a name");
            continue;
        }
        if !seen_names.insert(name.to_lowercase()) {
            tracing::warn!(category = %name, "dropping duplicate category name within the stage");
            continue;
        }

        let frequency = payload
            .frequency
            .as_ref()
            .and_then(value_to_i64)
            .unwrap_or(0);

        let mut register_units = Vec::new();
        for unit in payload.register_units {
            let text = unit.text.trim().to_string();
            if text.is_empty() {
                tracing::warn!(category = %name, "dropping register unit without text");
                continue;
            }

            let mut found_index_ids = Vec::new();
            for value in &unit.found_indices {
                match value_to_i64(value) {
                    Some(id) if !found_index_ids.contains(&id) => found_index_ids.push(id),
                    Some(_) => {}
                    None => {
                        tracing::warn!(
                            category = %name,
                            value = %value,
                            "dropping foundIndices entry that is not an integer id"
                        );
                    }
                }
            }

            register_units.push(NewRegisterUnit {
                text,
                source_document_uri: resolve_document_uri(unit.document.as_deref(), documents),
                page: unit.page.as_ref().and_then(value_to_string),
                justification: unit
                    .justification
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty()),
                found_index_ids,
            });
        }

        categories.push(NewCategory {
            name,
            definition: payload.definition.unwrap_or_default().trim().to_string(),
            frequency,
            register_units,
        });
    }

    ExplorationGraph { categories }
}
