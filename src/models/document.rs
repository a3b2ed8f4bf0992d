//! Uploaded Documents
//!
//! Documents are owned by the upload/storage collaborator; this core only
//! reads them to seed prompts and to resolve model-cited document names.

use serde::{Deserialize, Serialize};

use crate::utils::error::{AppError, AppResult};

/// What role a document plays in the analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentPurpose {
    /// Primary corpus: the material actually being analyzed
    Analysis,
    /// Supporting material (theory, prior work) given to the model as context
    Reference,
}

impl DocumentPurpose {
    /// Convert to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentPurpose::Analysis => "analysis",
            DocumentPurpose::Reference => "reference",
        }
    }

    /// Parse from database string representation
    pub fn parse(s: &str) -> AppResult<Self> {
        match s {
            "analysis" => Ok(DocumentPurpose::Analysis),
            "reference" => Ok(DocumentPurpose::Reference),
            _ => Err(AppError::validation(format!(
                "Invalid document purpose: {}",
                s
            ))),
        }
    }
}

impl std::fmt::Display for DocumentPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A document attached to an analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub analysis_id: String,
    pub file_name: String,
    pub title: Option<String>,
    pub purpose: DocumentPurpose,
    /// URI under which the storage collaborator serves the file
    pub storage_uri: String,
    pub mime_type: String,
}

impl Document {
    /// Human-readable name used in prompts (title when present)
    pub fn display_name(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.file_name)
    }

    /// Case-insensitive match against either file name or title.
    /// Used to resolve document names cited by the model.
    pub fn matches_name(&self, name: &str) -> bool {
        let needle = name.trim();
        if needle.is_empty() {
            return false;
        }
        if self.file_name.eq_ignore_ascii_case(needle) {
            return true;
        }
        self.title
            .as_deref()
            .map(|t| t.eq_ignore_ascii_case(needle))
            .unwrap_or(false)
    }
}
