//! Analysis Store
//!
//! Persistence coordinator for the analysis aggregate. Every stage subtree is
//! saved in one transaction, parent rows before the children that reference
//! them, so readers never observe a partially persisted stage. Lifecycle
//! transitions go through an optimistic version check on the analysis row.

use rusqlite::{params, Connection, OptionalExtension};

use crate::models::analysis::{Analysis, AnalysisStatus};
use crate::models::category::{Category, RegisterUnit};
use crate::models::index::{Index, IndexReference, IndexSummary, Indicator};
use crate::models::stage::{Stage, StageKind};
use crate::storage::database::Database;
use crate::utils::error::{AppError, AppResult};

use super::builders::{ExplorationGraph, PreAnalysisGraph};

fn now() -> String {
    chrono::Utc::now()
        .to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Store for the analysis aggregate and its stage subtrees
#[derive(Clone)]
pub struct AnalysisStore {
    db: Database,
}

impl AnalysisStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    // ------------------------------------------------------------------
    // Analysis aggregate
    // ------------------------------------------------------------------

    /// Create a new draft analysis
    pub fn create_analysis(&self, owner_id: &str, central_question: &str) -> AppResult<Analysis> {
        let conn = self.db.conn()?;
        let id = uuid::Uuid::new_v4().to_string();
        let timestamp = now();

        conn.execute(
            "INSERT INTO analyses (id, owner_id, central_question, status, version, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)",
            params![
                id,
                owner_id,
                central_question,
                AnalysisStatus::Draft.as_str(),
                timestamp
            ],
        )?;

        Ok(Analysis {
            id,
            owner_id: owner_id.to_string(),
            central_question: central_question.to_string(),
            status: AnalysisStatus::Draft,
            version: 0,
            created_at: timestamp.clone(),
            updated_at: timestamp,
            stages: Vec::new(),
        })
    }

    /// Load an analysis with its stages, ordered oldest first
    pub fn get_analysis(&self, analysis_id: &str) -> AppResult<Option<Analysis>> {
        let conn = self.db.conn()?;

        let header = conn
            .query_row(
                "SELECT id, owner_id, central_question, status, version, created_at, updated_at
                 FROM analyses WHERE id = ?1",
                [analysis_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, owner_id, central_question, status, version, created_at, updated_at)) =
            header
        else {
            return Ok(None);
        };

        let stages = load_stages(&conn, analysis_id)?;

        Ok(Some(Analysis {
            id,
            owner_id,
            central_question,
            status: AnalysisStatus::parse(&status)?,
            version,
            created_at,
            updated_at,
            stages,
        }))
    }

    /// Transition a draft analysis to Running and append its first
    /// placeholder stage, in one transaction with a version check.
    pub fn begin_analysis(
        &self,
        analysis_id: &str,
        expected_version: i64,
        first_kind: StageKind,
    ) -> AppResult<Stage> {
        let conn = self.db.conn()?;
        let tx = conn.unchecked_transaction()?;

        let affected = tx.execute(
            "UPDATE analyses SET status = ?1, version = version + 1, updated_at = ?2
             WHERE id = ?3 AND version = ?4",
            params![
                AnalysisStatus::Running.as_str(),
                now(),
                analysis_id,
                expected_version
            ],
        )?;
        if affected == 0 {
            return Err(AppError::conflict(format!(
                "analysis {} was modified concurrently",
                analysis_id
            )));
        }

        let stage = insert_stage(&tx, analysis_id, first_kind)?;
        tx.commit()?;
        Ok(stage)
    }

    /// Take exclusive ownership of the pending placeholder before the model
    /// round trip. The version bump makes concurrent callers holding the
    /// same snapshot fail fast with Conflict instead of racing the save.
    /// Returns the claimed version.
    pub fn claim_stage(&self, analysis_id: &str, expected_version: i64) -> AppResult<i64> {
        let conn = self.db.conn()?;
        let affected = conn.execute(
            "UPDATE analyses SET version = version + 1, updated_at = ?1
             WHERE id = ?2 AND version = ?3",
            params![now(), analysis_id, expected_version],
        )?;
        if affected == 0 {
            return Err(AppError::conflict(format!(
                "analysis {} was modified concurrently",
                analysis_id
            )));
        }
        Ok(expected_version + 1)
    }

    /// After a successful stage execution: append the next placeholder (and
    /// stay Running), or mark the analysis Completed when the transition
    /// table is exhausted. Version-checked.
    pub fn advance_analysis(
        &self,
        analysis_id: &str,
        expected_version: i64,
        next_kind: Option<StageKind>,
    ) -> AppResult<Option<Stage>> {
        let status = match next_kind {
            Some(_) => AnalysisStatus::Running,
            None => AnalysisStatus::Completed,
        };

        let conn = self.db.conn()?;
        let tx = conn.unchecked_transaction()?;

        let affected = tx.execute(
            "UPDATE analyses SET status = ?1, version = version + 1, updated_at = ?2
             WHERE id = ?3 AND version = ?4",
            params![status.as_str(), now(), analysis_id, expected_version],
        )?;
        if affected == 0 {
            return Err(AppError::conflict(format!(
                "analysis {} was modified concurrently",
                analysis_id
            )));
        }

        let stage = match next_kind {
            Some(kind) => Some(insert_stage(&tx, analysis_id, kind)?),
            None => None,
        };
        tx.commit()?;
        Ok(stage)
    }

    /// Delete the most recently created stage. Cascade delete removes only
    /// the subtree that stage uniquely owns; indicators and earlier stages'
    /// indexes survive. Resets status to Draft when no stages remain.
    pub fn revert_last_stage(&self, analysis_id: &str) -> AppResult<Option<Analysis>> {
        {
            let conn = self.db.conn()?;
            let tx = conn.unchecked_transaction()?;

            let status: Option<String> = tx
                .query_row(
                    "SELECT status FROM analyses WHERE id = ?1",
                    [analysis_id],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(status) = status else {
                return Ok(None);
            };

            let last_stage: Option<String> = tx
                .query_row(
                    "SELECT id FROM stages WHERE analysis_id = ?1
                     ORDER BY created_at DESC, rowid DESC LIMIT 1",
                    [analysis_id],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(stage_id) = last_stage else {
                return Err(AppError::invalid_state(format!(
                    "analysis {} has no stages to revert",
                    analysis_id
                )));
            };

            tx.execute("DELETE FROM stages WHERE id = ?1", [&stage_id])?;

            let remaining: i64 = tx.query_row(
                "SELECT COUNT(*) FROM stages WHERE analysis_id = ?1",
                [analysis_id],
                |row| row.get(0),
            )?;
            let new_status = if remaining == 0 {
                AnalysisStatus::Draft.as_str().to_string()
            } else {
                status
            };

            tx.execute(
                "UPDATE analyses SET status = ?1, version = version + 1, updated_at = ?2
                 WHERE id = ?3",
                params![new_status, now(), analysis_id],
            )?;
            tx.commit()?;
        }

        self.get_analysis(analysis_id)
    }

    // ------------------------------------------------------------------
    // Stage subtrees
    // ------------------------------------------------------------------

    /// Persist a pre-analysis subtree: indicators are resolved (get-or-create,
    /// case-insensitive, global) before the indexes that reference them, and
    /// references after their index. One transaction, guarded by the claimed
    /// version so a caller that lost the claim race rolls back instead of
    /// committing a divergent graph into the stage. Returns the number of
    /// indexes written.
    pub fn save_pre_analysis(
        &self,
        analysis_id: &str,
        stage_id: &str,
        expected_version: i64,
        graph: &PreAnalysisGraph,
    ) -> AppResult<usize> {
        let conn = self.db.conn()?;
        let tx = conn.unchecked_transaction()?;
        check_version(&tx, analysis_id, expected_version)?;

        for index in &graph.indexes {
            let indicator_id = get_or_create_indicator(&tx, &index.indicator_name)?;

            tx.execute(
                "INSERT INTO indexes (stage_id, indicator_id, name, description)
                 VALUES (?1, ?2, ?3, ?4)",
                params![stage_id, indicator_id, index.name, index.description],
            )?;
            let index_id = tx.last_insert_rowid();

            for reference in &index.references {
                tx.execute(
                    "INSERT INTO index_references (index_id, source_document_uri, page, quoted_content)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        index_id,
                        reference.source_document_uri,
                        reference.page,
                        reference.quoted_content
                    ],
                )?;
            }
        }

        tx.commit()?;
        Ok(graph.indexes.len())
    }

    /// Persist an exploration subtree: categories, their register units, and
    /// the many-to-many links to earlier-stage indexes. Cited index ids that
    /// do not exist in an earlier stage of this analysis are logged and
    /// dropped. One transaction, version-guarded like `save_pre_analysis`.
    /// Returns the number of categories written.
    pub fn save_exploration(
        &self,
        analysis_id: &str,
        stage_id: &str,
        expected_version: i64,
        graph: &ExplorationGraph,
    ) -> AppResult<usize> {
        let conn = self.db.conn()?;
        let tx = conn.unchecked_transaction()?;
        check_version(&tx, analysis_id, expected_version)?;

        for category in &graph.categories {
            tx.execute(
                "INSERT INTO categories (stage_id, name, definition, frequency)
                 VALUES (?1, ?2, ?3, ?4)",
                params![stage_id, category.name, category.definition, category.frequency],
            )?;
            let category_id = tx.last_insert_rowid();

            let unit_count = category.register_units.len() as i64;
            if category.frequency != unit_count {
                tracing::warn!(
                    category = %category.name,
                    frequency = category.frequency,
                    register_units = unit_count,
                    "model-reported frequency disagrees with register unit count"
                );
            }

            for unit in &category.register_units {
                let resolved_ids =
                    verify_found_indexes(&tx, analysis_id, stage_id, &unit.found_index_ids)?;

                tx.execute(
                    "INSERT INTO register_units (category_id, text, source_document_uri, page, justification)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        category_id,
                        unit.text,
                        unit.source_document_uri,
                        unit.page,
                        unit.justification
                    ],
                )?;
                let unit_id = tx.last_insert_rowid();

                for index_id in resolved_ids {
                    tx.execute(
                        "INSERT INTO register_unit_indices (register_unit_id, index_id)
                         VALUES (?1, ?2)",
                        params![unit_id, index_id],
                    )?;
                }
            }
        }

        tx.commit()?;
        Ok(graph.categories.len())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// All indexes of the analysis's pre-analysis stages, with indicator
    /// names, ordered by stage creation. Used to seed later-stage prompts.
    pub fn pre_analysis_indexes(&self, analysis_id: &str) -> AppResult<Vec<IndexSummary>> {
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare(
            "SELECT i.id, i.name, i.description, ind.name
             FROM indexes i
             JOIN indicators ind ON ind.id = i.indicator_id
             JOIN stages s ON s.id = i.stage_id
             WHERE s.analysis_id = ?1
             ORDER BY s.created_at, i.id",
        )?;

        let rows = stmt.query_map([analysis_id], |row| {
            Ok(IndexSummary {
                id: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
                indicator_name: row.get(3)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(AppError::from)
    }

    /// Indexes belonging to one stage
    pub fn indexes_for_stage(&self, stage_id: &str) -> AppResult<Vec<Index>> {
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, stage_id, indicator_id, name, description
             FROM indexes WHERE stage_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map([stage_id], |row| {
            Ok(Index {
                id: row.get(0)?,
                stage_id: row.get(1)?,
                indicator_id: row.get(2)?,
                name: row.get(3)?,
                description: row.get(4)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(AppError::from)
    }

    /// References backing one index
    pub fn references_for_index(&self, index_id: i64) -> AppResult<Vec<IndexReference>> {
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, index_id, source_document_uri, page, quoted_content
             FROM index_references WHERE index_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map([index_id], |row| {
            Ok(IndexReference {
                id: row.get(0)?,
                index_id: row.get(1)?,
                source_document_uri: row.get(2)?,
                page: row.get(3)?,
                quoted_content: row.get(4)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(AppError::from)
    }

    /// Categories belonging to one stage
    pub fn categories_for_stage(&self, stage_id: &str) -> AppResult<Vec<Category>> {
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, stage_id, name, definition, frequency
             FROM categories WHERE stage_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map([stage_id], |row| {
            Ok(Category {
                id: row.get(0)?,
                stage_id: row.get(1)?,
                name: row.get(2)?,
                definition: row.get(3)?,
                frequency: row.get(4)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(AppError::from)
    }

    /// Register units of one category, with their linked index ids
    pub fn register_units_for_category(&self, category_id: i64) -> AppResult<Vec<RegisterUnit>> {
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, category_id, text, source_document_uri, page, justification
             FROM register_units WHERE category_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map([category_id], |row| {
            Ok(RegisterUnit {
                id: row.get(0)?,
                category_id: row.get(1)?,
                text: row.get(2)?,
                source_document_uri: row.get(3)?,
                page: row.get(4)?,
                justification: row.get(5)?,
                found_index_ids: Vec::new(),
            })
        })?;
        let mut units = rows
            .collect::<Result<Vec<_>, _>>()
            .map_err(AppError::from)?;

        let mut link_stmt = conn.prepare(
            "SELECT index_id FROM register_unit_indices
             WHERE register_unit_id = ?1 ORDER BY index_id",
        )?;
        for unit in &mut units {
            let ids = link_stmt.query_map([unit.id], |row| row.get::<_, i64>(0))?;
            unit.found_index_ids = ids.collect::<Result<Vec<_>, _>>()?;
        }

        Ok(units)
    }

    /// All indicators in the system. Shared across analyses, so this is a
    /// global read, not scoped to one analysis.
    pub fn indicators(&self) -> AppResult<Vec<Indicator>> {
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare("SELECT id, name FROM indicators ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(Indicator {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(AppError::from)
    }
}

fn load_stages(conn: &Connection, analysis_id: &str) -> AppResult<Vec<Stage>> {
    let mut stmt = conn.prepare(
        "SELECT id, analysis_id, kind, created_at FROM stages
         WHERE analysis_id = ?1 ORDER BY created_at, rowid",
    )?;
    let rows = stmt.query_map([analysis_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut stages = Vec::new();
    for row in rows {
        let (id, analysis_id, kind, created_at) = row?;
        stages.push(Stage {
            id,
            analysis_id,
            kind: StageKind::parse(&kind)?,
            created_at,
        });
    }
    Ok(stages)
}

fn insert_stage(conn: &Connection, analysis_id: &str, kind: StageKind) -> AppResult<Stage> {
    let stage = Stage {
        id: uuid::Uuid::new_v4().to_string(),
        analysis_id: analysis_id.to_string(),
        kind,
        created_at: now(),
    };
    conn.execute(
        "INSERT INTO stages (id, analysis_id, kind, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![stage.id, stage.analysis_id, stage.kind.as_str(), stage.created_at],
    )?;
    Ok(stage)
}

/// Assert, inside a write transaction, that the analysis still carries the
/// claimed version. The guarded UPDATE takes the write lock, so a writer
/// that lost the claim race rolls back before any subtree row commits.
fn check_version(conn: &Connection, analysis_id: &str, expected_version: i64) -> AppResult<()> {
    let affected = conn.execute(
        "UPDATE analyses SET updated_at = ?1 WHERE id = ?2 AND version = ?3",
        params![now(), analysis_id, expected_version],
    )?;
    if affected == 0 {
        return Err(AppError::conflict(format!(
            "analysis {} was modified concurrently",
            analysis_id
        )));
    }
    Ok(())
}

/// Atomic get-or-create for the globally shared indicator, matched
/// case-insensitively. The NOCASE unique index makes the insert race-free.
fn get_or_create_indicator(conn: &Connection, name: &str) -> AppResult<i64> {
    conn.execute(
        "INSERT OR IGNORE INTO indicators (name, created_at) VALUES (?1, ?2)",
        params![name, now()],
    )?;
    let id = conn.query_row(
        "SELECT id FROM indicators WHERE name = ?1 COLLATE NOCASE",
        [name],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// Keep only the cited index ids that exist in an earlier stage of this
/// analysis; unknown ids are logged and dropped.
fn verify_found_indexes(
    conn: &Connection,
    analysis_id: &str,
    current_stage_id: &str,
    ids: &[i64],
) -> AppResult<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT COUNT(*) FROM indexes i
         JOIN stages s ON s.id = i.stage_id
         WHERE i.id = ?1 AND s.analysis_id = ?2 AND s.id != ?3",
    )?;

    let mut resolved = Vec::with_capacity(ids.len());
    for &id in ids {
        let count: i64 = stmt.query_row(params![id, analysis_id, current_stage_id], |row| {
            row.get(0)
        })?;
        if count > 0 {
            resolved.push(id);
        } else {
            tracing::warn!(
                index_id = id,
                "register unit cites an index that does not exist in an earlier stage"
            );
        }
    }
    Ok(resolved)
}
