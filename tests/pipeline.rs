//! End-to-end pipeline tests against an in-memory database and a scripted
//! generation provider. These exercise the public crate surface the way an
//! embedding application would: create an analysis, attach documents, start
//! it, continue it to completion, and inspect the persisted entity graph.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;

use bardin_engine::models::document::DocumentPurpose;
use bardin_engine::services::analysis::AnalysisStore;
use bardin_engine::services::documents::{NewDocument, SqliteDocumentCatalog};
use bardin_engine::services::llm::{DocumentAttachment, GenerationProvider, LlmResult};
use bardin_engine::{Analysis, AnalysisOrchestrator, AnalysisStatus, Database, StageKind};

/// Provider that replays a scripted queue of responses
struct ScriptedProvider {
    responses: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn new(responses: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.iter().map(|r| r.to_string()).collect()),
        })
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn generate(
        &self,
        _prompt: &str,
        _documents: &[DocumentAttachment],
    ) -> LlmResult<String> {
        Ok(self.responses.lock().unwrap().remove(0))
    }

    async fn health_check(&self) -> LlmResult<()> {
        Ok(())
    }
}

struct Harness {
    orchestrator: AnalysisOrchestrator,
    analysis: Analysis,
}

/// One analysis with A.pdf as corpus and B.pdf as reference material
fn harness(responses: &[&str]) -> Result<Harness> {
    let db = Database::new_in_memory()?;
    let store = AnalysisStore::new(db.clone());
    let analysis = store.create_analysis("user-1", "Q")?;

    let catalog = SqliteDocumentCatalog::new(db.clone());
    catalog.insert_document(NewDocument {
        analysis_id: analysis.id.clone(),
        file_name: "A.pdf".to_string(),
        title: None,
        purpose: DocumentPurpose::Analysis,
        storage_uri: "files/a".to_string(),
        mime_type: "application/pdf".to_string(),
    })?;
    catalog.insert_document(NewDocument {
        analysis_id: analysis.id.clone(),
        file_name: "B.pdf".to_string(),
        title: Some("Theory".to_string()),
        purpose: DocumentPurpose::Reference,
        storage_uri: "files/b".to_string(),
        mime_type: "application/pdf".to_string(),
    })?;

    let orchestrator =
        AnalysisOrchestrator::new(db, Arc::new(catalog), ScriptedProvider::new(responses));
    Ok(Harness {
        orchestrator,
        analysis,
    })
}

const PRE_ANALYSIS_JSON: &str = r#"```json
{
  "indices": [
    {
      "name": "Idx1",
      "description": "mentions of trust",
      "indicator": "Ind1",
      "references": [
        {"document": "A.pdf", "page": "2", "quotedContent": "we trust the process"}
      ]
    }
  ]
}
```"#;

// Cites the real index id (1 in a fresh database) plus an id that does not
// exist; the unknown id must be dropped, not saved and not fatal.
const EXPLORATION_JSON: &str = r#"{
  "categories": [
    {
      "name": "Trust",
      "definition": "expressions of trust",
      "frequency": 2,
      "registerUnits": [
        {
          "text": "we trust the process",
          "document": "A.pdf",
          "page": "2",
          "justification": "direct mention",
          "foundIndices": ["1", "9999999"]
        },
        {
          "text": "unmapped excerpt",
          "document": "C.pdf",
          "page": null,
          "justification": null,
          "foundIndices": []
        }
      ]
    }
  ]
}"#;

#[tokio::test]
async fn pre_analysis_builds_and_persists_the_index_graph() -> Result<()> {
    let h = harness(&[PRE_ANALYSIS_JSON])?;

    let execution = h
        .orchestrator
        .start_analysis(&h.analysis.id, "user-1")
        .await?;
    assert!(execution.is_success);
    assert_eq!(execution.kind, StageKind::PreAnalysis);
    assert_eq!(
        execution.documents_used,
        vec!["A.pdf".to_string(), "B.pdf".to_string()]
    );

    let reloaded = h
        .orchestrator
        .store()
        .get_analysis(&h.analysis.id)?
        .expect("analysis exists");
    assert_eq!(reloaded.status, AnalysisStatus::Running);
    assert_eq!(reloaded.stages.len(), 2);
    assert_eq!(reloaded.stages[0].kind, StageKind::PreAnalysis);
    assert_eq!(reloaded.stages[1].kind, StageKind::Exploration);

    let indexes = h
        .orchestrator
        .store()
        .indexes_for_stage(&reloaded.stages[0].id)?;
    assert_eq!(indexes.len(), 1);
    assert_eq!(indexes[0].name, "Idx1");
    assert_eq!(indexes[0].description.as_deref(), Some("mentions of trust"));

    let summaries = h.orchestrator.store().pre_analysis_indexes(&h.analysis.id)?;
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].indicator_name, "Ind1");

    // The cited document name resolves to the stored document's URI.
    let references = h.orchestrator.store().references_for_index(indexes[0].id)?;
    assert_eq!(references.len(), 1);
    assert_eq!(references[0].source_document_uri, "files/a");
    assert_eq!(references[0].page.as_deref(), Some("2"));
    assert_eq!(
        references[0].quoted_content.as_deref(),
        Some("we trust the process")
    );

    Ok(())
}

#[tokio::test]
async fn malformed_response_fails_the_execution_without_touching_state() -> Result<()> {
    let h = harness(&["this is not json at all"])?;

    let execution = h
        .orchestrator
        .start_analysis(&h.analysis.id, "user-1")
        .await?;
    assert!(!execution.is_success);
    let message = execution.error_message.expect("failure carries a message");
    assert!(message.contains("Malformed response"), "got: {}", message);

    let reloaded = h
        .orchestrator
        .store()
        .get_analysis(&h.analysis.id)?
        .expect("analysis exists");
    assert_eq!(reloaded.status, AnalysisStatus::Running);
    assert_eq!(reloaded.stages.len(), 1);
    assert!(h
        .orchestrator
        .store()
        .indexes_for_stage(&reloaded.stages[0].id)?
        .is_empty());
    assert!(h.orchestrator.store().indicators()?.is_empty());

    Ok(())
}

#[tokio::test]
async fn full_run_reaches_completed_and_links_found_indices() -> Result<()> {
    let h = harness(&[PRE_ANALYSIS_JSON, EXPLORATION_JSON])?;

    h.orchestrator
        .start_analysis(&h.analysis.id, "user-1")
        .await?;
    let exploration = h.orchestrator.continue_analysis(&h.analysis.id).await?;
    assert!(exploration.is_success);
    assert_eq!(exploration.kind, StageKind::Exploration);

    let inference = h.orchestrator.continue_analysis(&h.analysis.id).await?;
    assert!(inference.is_success);
    assert_eq!(inference.kind, StageKind::Inference);

    let reloaded = h
        .orchestrator
        .store()
        .get_analysis(&h.analysis.id)?
        .expect("analysis exists");
    assert_eq!(reloaded.status, AnalysisStatus::Completed);
    assert_eq!(reloaded.stages.len(), 3);

    let exploration_stage = &reloaded.stages[1];
    let categories = h
        .orchestrator
        .store()
        .categories_for_stage(&exploration_stage.id)?;
    assert_eq!(categories.len(), 1);
    assert_eq!(categories[0].name, "Trust");
    assert_eq!(categories[0].frequency, 2);

    let units = h
        .orchestrator
        .store()
        .register_units_for_category(categories[0].id)?;
    assert_eq!(units.len(), 2);
    // Only the verified index id survives; 9999999 is dropped.
    assert_eq!(units[0].found_index_ids, vec![1]);
    assert!(units[1].found_index_ids.is_empty());
    // "C.pdf" is not attached to the analysis: the unit keeps the cited name
    // behind the not-found sentinel instead of failing the stage.
    assert!(units[1].source_document_uri.contains("C.pdf"));

    // A completed analysis rejects further continues.
    assert!(h.orchestrator.continue_analysis(&h.analysis.id).await.is_err());

    Ok(())
}

#[tokio::test]
async fn revert_unwinds_stages_back_to_draft() -> Result<()> {
    let h = harness(&[PRE_ANALYSIS_JSON])?;

    h.orchestrator
        .start_analysis(&h.analysis.id, "user-1")
        .await?;

    // Drop the pending exploration placeholder, then the executed stage.
    let after_first = h
        .orchestrator
        .revert_last_stage(&h.analysis.id)
        .await?
        .expect("analysis exists");
    assert_eq!(after_first.stages.len(), 1);
    assert_eq!(after_first.status, AnalysisStatus::Running);

    let after_second = h
        .orchestrator
        .revert_last_stage(&h.analysis.id)
        .await?
        .expect("analysis exists");
    assert!(after_second.stages.is_empty());
    assert_eq!(after_second.status, AnalysisStatus::Draft);

    // Indicators are shared, never owned by a stage, so they survive.
    let indicators = h.orchestrator.store().indicators()?;
    assert_eq!(indicators.len(), 1);
    assert_eq!(indicators[0].name, "Ind1");
    assert!(h
        .orchestrator
        .store()
        .pre_analysis_indexes(&h.analysis.id)?
        .is_empty());

    Ok(())
}
