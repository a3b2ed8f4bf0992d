//! Stage Prompts
//!
//! Deterministic prompt assembly: a fixed methodology preamble plus a
//! stage-specific template, seeded with the central question, the document
//! lists, and (for stages after the first) the previous stage's persisted
//! entities.

use crate::models::analysis::Analysis;
use crate::models::document::Document;
use crate::models::index::IndexSummary;

use super::context::StageContext;

/// Fixed methodology preamble shared by every stage prompt
pub const METHODOLOGY_PREAMBLE: &str = "\
You are an expert in qualitative content analysis following Laurence Bardin's \
methodology. You work systematically: a floating reading of the corpus, then \
coding anchored in explicit indicators, then categorization governed by the \
rules of exhaustiveness, exclusivity, homogeneity and pertinence. \
Every claim you make must be traceable to a passage of the analyzed documents. \
Answer with a single JSON object inside a ```json code fence and nothing else.";

fn document_list(documents: &[Document]) -> String {
    if documents.is_empty() {
        return "(none)".to_string();
    }
    documents
        .iter()
        .map(|doc| format!("- {}", doc.display_name()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Serialize a previous pre-analysis stage's indexes for seeding the
/// exploration prompt. Ids are included so the model can cite them back.
pub fn serialize_indexes(indexes: &[IndexSummary]) -> String {
    if indexes.is_empty() {
        return "(no indices were produced in the pre-analysis stage)".to_string();
    }
    indexes
        .iter()
        .map(|index| {
            let description = index.description.as_deref().unwrap_or("no description");
            format!(
                "- id {}: \"{}\" - {} (indicator: {})",
                index.id, index.name, description, index.indicator_name
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the pre-analysis stage prompt
pub fn pre_analysis_prompt(analysis: &Analysis, context: &StageContext) -> String {
    format!(
        "{preamble}\n\n\
         ## Central Question\n\
         {question}\n\n\
         ## Documents Under Analysis\n\
         {analysis_docs}\n\n\
         ## Reference Documents\n\
         {reference_docs}\n\n\
         ## Task\n\
         Perform the pre-analysis phase: read the documents under analysis and \
         extract the analytical indices that help answer the central question. \
         Each index must name the indicator that justifies it and cite the \
         passages it was derived from. Cite documents by their exact name from \
         the lists above.\n\n\
         Respond with a JSON object:\n\
         ```json\n\
         {{\n\
           \"indices\": [\n\
             {{\n\
               \"name\": \"short index name\",\n\
               \"description\": \"what this index captures\",\n\
               \"indicator\": \"criterion justifying the index\",\n\
               \"references\": [\n\
                 {{ \"document\": \"file name\", \"page\": \"page number\", \"quotedContent\": \"verbatim excerpt\" }}\n\
               ]\n\
             }}\n\
           ]\n\
         }}\n\
         ```",
        preamble = METHODOLOGY_PREAMBLE,
        question = analysis.central_question,
        analysis_docs = document_list(&context.analysis_documents),
        reference_docs = document_list(&context.reference_documents),
    )
}

/// Build the exploration stage prompt, seeded with the pre-analysis indexes
pub fn exploration_prompt(
    analysis: &Analysis,
    context: &StageContext,
    previous_indexes: &[IndexSummary],
) -> String {
    format!(
        "{preamble}\n\n\
         ## Central Question\n\
         {question}\n\n\
         ## Documents Under Analysis\n\
         {analysis_docs}\n\n\
         ## Reference Documents\n\
         {reference_docs}\n\n\
         ## Indices From the Pre-Analysis Stage\n\
         {indexes}\n\n\
         ## Task\n\
         Perform the exploration of material phase: group the relevant text \
         excerpts (register units) into categories. Every register unit must \
         quote the source text, name its document, and list in \"foundIndices\" \
         the numeric ids of the pre-analysis indices it relates to, exactly as \
         given above.\n\n\
         Respond with a JSON object:\n\
         ```json\n\
         {{\n\
           \"categories\": [\n\
             {{\n\
               \"name\": \"category name\",\n\
               \"definition\": \"what belongs in this category\",\n\
               \"frequency\": 0,\n\
               \"registerUnits\": [\n\
                 {{\n\
                   \"text\": \"verbatim excerpt\",\n\
                   \"document\": \"file name\",\n\
                   \"page\": \"page number\",\n\
                   \"justification\": \"why this excerpt belongs here\",\n\
                   \"foundIndices\": [\"1\"]\n\
                 }}\n\
               ]\n\
             }}\n\
           ]\n\
         }}\n\
         ```",
        preamble = METHODOLOGY_PREAMBLE,
        question = analysis.central_question,
        analysis_docs = document_list(&context.analysis_documents),
        reference_docs = document_list(&context.reference_documents),
        indexes = serialize_indexes(previous_indexes),
    )
}
