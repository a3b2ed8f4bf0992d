//! SQLite Database
//!
//! Embedded database for persistent storage using rusqlite with r2d2
//! connection pooling. The schema enforces the relational invariants the
//! pipeline relies on: stage-scoped unique names for indexes and categories,
//! a global case-insensitive unique name for indicators, cascading ownership
//! edges, and a join table for the register-unit/index many-to-many relation.

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;

use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::{database_path, ensure_engine_dir};

/// Type alias for the connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Database service for managing SQLite operations
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Create an in-memory database for testing.
    ///
    /// Uses a single-connection pool so every caller sees the same in-memory
    /// database, with the same schema as the production database.
    pub fn new_in_memory() -> AppResult<Self> {
        let manager = SqliteConnectionManager::memory()
            .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| AppError::database(format!("Failed to create connection pool: {}", e)))?;

        let db = Self { pool };
        db.init_schema()?;
        Ok(db)
    }

    /// Create a new database instance with connection pooling, at the
    /// default location under the engine data directory
    pub fn new() -> AppResult<Self> {
        ensure_engine_dir()?;
        Self::open(&database_path()?)
    }

    /// Open (or create) a database at the given path
    pub fn open(db_path: &std::path::Path) -> AppResult<Self> {
        let manager = SqliteConnectionManager::file(db_path)
            .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = Pool::builder()
            .max_size(10)
            .build(manager)
            .map_err(|e| AppError::database(format!("Failed to create connection pool: {}", e)))?;

        let db = Self { pool };
        db.init_schema()?;

        Ok(db)
    }

    /// Get a pooled connection
    pub fn conn(&self) -> AppResult<PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| AppError::database(format!("Failed to get connection: {}", e)))
    }

    /// Initialize the database schema
    fn init_schema(&self) -> AppResult<()> {
        let conn = self.conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS analyses (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                central_question TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'draft',
                version INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                analysis_id TEXT NOT NULL REFERENCES analyses(id) ON DELETE CASCADE,
                file_name TEXT NOT NULL,
                title TEXT,
                purpose TEXT NOT NULL,
                storage_uri TEXT NOT NULL,
                mime_type TEXT NOT NULL DEFAULT 'application/pdf',
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS stages (
                id TEXT PRIMARY KEY,
                analysis_id TEXT NOT NULL REFERENCES analyses(id) ON DELETE CASCADE,
                kind TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        // Indicators are shared across all analyses; the NOCASE unique index
        // is what makes get-or-create atomic.
        conn.execute(
            "CREATE TABLE IF NOT EXISTS indicators (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE COLLATE NOCASE,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS indexes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                stage_id TEXT NOT NULL REFERENCES stages(id) ON DELETE CASCADE,
                indicator_id INTEGER NOT NULL REFERENCES indicators(id),
                name TEXT NOT NULL,
                description TEXT,
                UNIQUE(stage_id, name)
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS index_references (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                index_id INTEGER NOT NULL REFERENCES indexes(id) ON DELETE CASCADE,
                source_document_uri TEXT NOT NULL,
                page TEXT,
                quoted_content TEXT
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                stage_id TEXT NOT NULL REFERENCES stages(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                definition TEXT NOT NULL,
                frequency INTEGER NOT NULL DEFAULT 0,
                UNIQUE(stage_id, name)
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS register_units (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
                text TEXT NOT NULL,
                source_document_uri TEXT NOT NULL,
                page TEXT,
                justification TEXT
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS register_unit_indices (
                register_unit_id INTEGER NOT NULL REFERENCES register_units(id) ON DELETE CASCADE,
                index_id INTEGER NOT NULL REFERENCES indexes(id) ON DELETE CASCADE,
                PRIMARY KEY (register_unit_id, index_id)
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_stages_analysis ON stages(analysis_id, created_at)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_documents_analysis ON documents(analysis_id)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_indexes_stage ON indexes(stage_id)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_categories_stage ON categories(stage_id)",
            [],
        )?;

        Ok(())
    }
}
