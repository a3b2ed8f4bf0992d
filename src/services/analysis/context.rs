//! Stage Context
//!
//! Read-only context gathered before a stage runs: the analysis corpus and
//! the supporting reference material, partitioned by document purpose.

use crate::models::document::{Document, DocumentPurpose};
use crate::services::documents::DocumentCatalog;
use crate::services::llm::types::DocumentAttachment;
use crate::utils::error::AppResult;

/// Documents available to a stage execution
#[derive(Debug, Clone, Default)]
pub struct StageContext {
    /// Primary corpus being analyzed
    pub analysis_documents: Vec<Document>,
    /// Supporting material given to the model as context
    pub reference_documents: Vec<Document>,
}

impl StageContext {
    /// Partition a document list by purpose, preserving order
    pub fn partition(documents: Vec<Document>) -> Self {
        let mut context = StageContext::default();
        for doc in documents {
            match doc.purpose {
                DocumentPurpose::Analysis => context.analysis_documents.push(doc),
                DocumentPurpose::Reference => context.reference_documents.push(doc),
            }
        }
        context
    }

    /// All documents, analysis corpus first
    pub fn all(&self) -> impl Iterator<Item = &Document> {
        self.analysis_documents
            .iter()
            .chain(self.reference_documents.iter())
    }

    /// Attachments handed to the generation provider
    pub fn attachments(&self) -> Vec<DocumentAttachment> {
        self.all()
            .map(|doc| DocumentAttachment {
                uri: doc.storage_uri.clone(),
                mime_type: doc.mime_type.clone(),
            })
            .collect()
    }

    /// File names of every document in scope, for execution reporting
    pub fn file_names(&self) -> Vec<String> {
        self.all().map(|doc| doc.file_name.clone()).collect()
    }
}

/// Fetch and partition the documents for an analysis. Pure read.
pub async fn gather_context(
    catalog: &dyn DocumentCatalog,
    analysis_id: &str,
) -> AppResult<StageContext> {
    let documents = catalog.documents_for_analysis(analysis_id).await?;
    Ok(StageContext::partition(documents))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(name: &str, purpose: DocumentPurpose) -> Document {
        Document {
            id: format!("id-{}", name),
            analysis_id: "an-1".to_string(),
            file_name: name.to_string(),
            title: None,
            purpose,
            storage_uri: format!("files/{}", name),
            mime_type: "application/pdf".to_string(),
        }
    }

    #[test]
    fn test_partition_by_purpose() {
        let context = StageContext::partition(vec![
            doc("A.pdf", DocumentPurpose::Analysis),
            doc("B.pdf", DocumentPurpose::Reference),
            doc("C.pdf", DocumentPurpose::Analysis),
        ]);
        assert_eq!(context.analysis_documents.len(), 2);
        assert_eq!(context.reference_documents.len(), 1);
        assert_eq!(
            context.file_names(),
            vec!["A.pdf".to_string(), "C.pdf".to_string(), "B.pdf".to_string()]
        );
    }

    #[test]
    fn test_attachments_carry_uri_and_mime() {
        let context = StageContext::partition(vec![doc("A.pdf", DocumentPurpose::Analysis)]);
        let attachments = context.attachments();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].uri, "files/A.pdf");
        assert_eq!(attachments[0].mime_type, "application/pdf");
    }
}
