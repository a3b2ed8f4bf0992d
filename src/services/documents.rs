//! Document Catalog
//!
//! Read-only view over the documents attached to an analysis. Upload,
//! chunking and storage belong to an external collaborator; this service
//! only lists what exists so strategies can seed prompts and resolve the
//! document names the model cites.

use async_trait::async_trait;

use crate::models::document::{Document, DocumentPurpose};
use crate::storage::database::Database;
use crate::utils::error::AppResult;

/// Input for registering a document with an analysis
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub analysis_id: String,
    pub file_name: String,
    pub title: Option<String>,
    pub purpose: DocumentPurpose,
    pub storage_uri: String,
    pub mime_type: String,
}

/// Collaborator seam for document listing
#[async_trait]
pub trait DocumentCatalog: Send + Sync {
    /// All documents attached to the given analysis
    async fn documents_for_analysis(&self, analysis_id: &str) -> AppResult<Vec<Document>>;
}

/// SQLite-backed catalog over the engine database
#[derive(Clone)]
pub struct SqliteDocumentCatalog {
    db: Database,
}

impl SqliteDocumentCatalog {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Register a document. Called by the upload collaborator (and tests);
    /// the pipeline itself never writes documents.
    pub fn insert_document(&self, doc: NewDocument) -> AppResult<Document> {
        let conn = self.db.conn()?;
        let id = uuid::Uuid::new_v4().to_string();
        let created_at = chrono::Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO documents (id, analysis_id, file_name, title, purpose, storage_uri, mime_type, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                id,
                doc.analysis_id,
                doc.file_name,
                doc.title,
                doc.purpose.as_str(),
                doc.storage_uri,
                doc.mime_type,
                created_at,
            ],
        )?;

        Ok(Document {
            id,
            analysis_id: doc.analysis_id,
            file_name: doc.file_name,
            title: doc.title,
            purpose: doc.purpose,
            storage_uri: doc.storage_uri,
            mime_type: doc.mime_type,
        })
    }
}

#[async_trait]
impl DocumentCatalog for SqliteDocumentCatalog {
    async fn documents_for_analysis(&self, analysis_id: &str) -> AppResult<Vec<Document>> {
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, analysis_id, file_name, title, purpose, storage_uri, mime_type
             FROM documents WHERE analysis_id = ?1 ORDER BY created_at, rowid",
        )?;

        let rows = stmt.query_map([analysis_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut documents = Vec::new();
        for row in rows {
            let (id, analysis_id, file_name, title, purpose, storage_uri, mime_type) = row?;
            documents.push(Document {
                id,
                analysis_id,
                file_name,
                title,
                purpose: DocumentPurpose::parse(&purpose)?,
                storage_uri,
                mime_type,
            });
        }

        Ok(documents)
    }
}
