//! In-process SQLite store backing the local memory backend.
//!
//! This module provides:
//! - `Database`: connection to a private `:memory:` database and its schema
//! - `Memory`: data structure for stored memories
//! - `embedding`: BLOB conversion and cosine similarity
//! - `search`: semantic search over a caller's scope
//!
//! Nothing here survives the process; the store lives as long as its
//! `Database` value.

pub mod embedding;
pub mod search;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use uuid::Uuid;

pub use self::embedding::{cosine_similarity, vec_to_blob};
pub use self::search::validate_limit;

/// A single memory record with metadata and optional similarity score.
#[derive(Debug, Clone)]
pub struct Memory {
    pub id: String,
    pub user_id: String,
    pub session_id: Option<String>,
    pub content: String,
    /// Caller metadata as a JSON document.
    pub metadata: Option<String>,

    /// Cosine similarity to the query, set by semantic search only.
    pub similarity: Option<f64>,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields needed to store a new memory.
#[derive(Debug, Clone, Copy)]
pub struct NewMemory<'a> {
    pub user_id: &'a str,
    pub session_id: Option<&'a str>,
    pub content: &'a str,
    pub metadata: Option<&'a str>,
}

/// The set of memories a read operation may see.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub user_id: &'a str,
    /// When set, only memories written in this session are visible.
    pub session_id: Option<&'a str>,
}

/// One row of the audit history.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub memory_id: String,
    pub previous_value: Option<String>,
    pub new_value: Option<String>,
    pub action: String,
    pub is_deleted: bool,
    pub created_at: String,
}

/// Error types for SQLite operations.
#[derive(Debug)]
pub enum Error {
    Sqlite(String),
    InvalidBlobSize { expected: usize, actual: usize },
    MismatchedDimensions { expected: usize, actual: usize },
    EmptyVector,
    InvalidEmbedding(String),
    InvalidLimit(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Sqlite(msg) => write!(f, "Database error: {}", msg),
            Error::InvalidBlobSize { expected, actual } => {
                write!(
                    f,
                    "Invalid BLOB size: expected {} bytes, got {} bytes",
                    expected, actual
                )
            }
            Error::MismatchedDimensions { expected, actual } => {
                write!(
                    f,
                    "Mismatched dimensions: expected {} dimensions, got {} dimensions",
                    expected, actual
                )
            }
            Error::EmptyVector => write!(f, "Cannot compute similarity with empty vector"),
            Error::InvalidEmbedding(msg) => write!(f, "Invalid embedding: {}", msg),
            Error::InvalidLimit(msg) => write!(f, "Invalid limit: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Sqlite(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// In-memory SQLite database for memories and their history.
pub struct Database {
    conn: Connection,
    dims: usize,
}

/// Initialize database schema.
fn create_schema(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS memories (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            session_id TEXT,
            content TEXT NOT NULL,
            embedding BLOB NOT NULL,
            metadata TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_memories_user ON memories(user_id);

        CREATE TABLE IF NOT EXISTS memory_history (
            id TEXT PRIMARY KEY,
            memory_id TEXT NOT NULL,
            previous_value TEXT,
            new_value TEXT,
            action TEXT NOT NULL,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );
        "#,
    )?;
    Ok(())
}

const SELECT_COLUMNS: &str =
    "id, user_id, session_id, content, metadata, created_at, updated_at";

fn row_to_memory(row: &rusqlite::Row<'_>) -> SqliteResult<Memory> {
    Ok(Memory {
        id: row.get(0)?,
        user_id: row.get(1)?,
        session_id: row.get(2)?,
        content: row.get(3)?,
        metadata: row.get(4)?,
        similarity: None,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

impl Database {
    /// Create a fresh private in-memory database for `dims`-wide embeddings.
    ///
    /// # Errors
    ///
    /// Returns error if the connection cannot be opened or schema initialization fails.
    pub fn open_in_memory(dims: usize) -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        create_schema(&mut conn)?;
        Ok(Self { conn, dims })
    }

    /// Embedding width this store accepts.
    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Insert a new memory with embedding.
    ///
    /// # Errors
    ///
    /// Returns error if the embedding has invalid dimensions or database write fails.
    pub fn insert(&self, memory: &NewMemory<'_>, embedding: &[f32]) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let blob = vec_to_blob(embedding, self.dims)?;

        self.conn.execute(
            r#"
            INSERT INTO memories (id, user_id, session_id, content, embedding, metadata, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                &id,
                memory.user_id,
                memory.session_id,
                memory.content,
                &blob,
                memory.metadata,
                &now,
                &now
            ],
        )?;

        Ok(id)
    }

    /// Retrieve a single memory by ID.
    ///
    /// Returns None if the memory does not exist.
    pub fn get(&self, id: &str) -> Result<Option<Memory>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM memories WHERE id = ?1");
        let mut stmt = self.conn.prepare(&sql)?;

        let result = stmt.query_row([id], row_to_memory).optional()?;

        Ok(result)
    }

    /// List memories in a scope, ordered by creation time (newest first).
    ///
    /// # Errors
    ///
    /// Returns error if the limit is invalid or the query fails.
    pub fn list(&self, scope: &Scope<'_>, limit: usize) -> Result<Vec<Memory>> {
        validate_limit(limit)?;

        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM memories \
             WHERE user_id = ?1 AND (?2 IS NULL OR session_id = ?2) \
             ORDER BY created_at DESC, rowid DESC LIMIT ?3"
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let memories: SqliteResult<Vec<Memory>> = stmt
            .query_map(
                params![scope.user_id, scope.session_id, limit as i64],
                row_to_memory,
            )?
            .collect();

        Ok(memories?)
    }

    /// Delete a memory by ID.
    ///
    /// Returns true if a memory was deleted, false if it didn't exist.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM memories WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    /// Delete every listed memory, skipping unknown IDs.
    ///
    /// Returns the number of rows removed.
    pub fn delete_ids(&self, ids: &[String]) -> Result<usize> {
        let mut removed = 0;
        for id in ids {
            removed += self
                .conn
                .execute("DELETE FROM memories WHERE id = ?1", params![id])?;
        }
        Ok(removed)
    }

    /// Append an audit row for a memory change.
    pub fn record_history(
        &self,
        memory_id: &str,
        previous_value: Option<&str>,
        new_value: Option<&str>,
        action: &str,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            r#"
            INSERT INTO memory_history (id, memory_id, previous_value, new_value, action, is_deleted, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                Uuid::new_v4().to_string(),
                memory_id,
                previous_value,
                new_value,
                action,
                (action == "DELETE") as i64,
                &now
            ],
        )?;
        Ok(())
    }

    /// Audit rows for one memory, oldest first.
    pub fn history(&self, memory_id: &str) -> Result<Vec<HistoryEntry>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT memory_id, previous_value, new_value, action, is_deleted, created_at
            FROM memory_history
            WHERE memory_id = ?1
            ORDER BY created_at ASC, rowid ASC
            "#,
        )?;

        let entries: SqliteResult<Vec<HistoryEntry>> = stmt
            .query_map([memory_id], |row| {
                Ok(HistoryEntry {
                    memory_id: row.get(0)?,
                    previous_value: row.get(1)?,
                    new_value: row.get(2)?,
                    action: row.get(3)?,
                    is_deleted: row.get::<_, i64>(4)? != 0,
                    created_at: row.get(5)?,
                })
            })?
            .collect();

        Ok(entries?)
    }
}
