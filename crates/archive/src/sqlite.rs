//! SQLite chat archive.
//!
//! One table, `chat_history`, holding `(role, content, created_at)` rows in
//! insertion order. There is no update or delete path.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use staybot_core::archive::{ArchiveRecord, ChatArchive};
use staybot_core::error::PersistenceError;
use staybot_core::message::Role;
use std::str::FromStr;
use tracing::{debug, info};

/// A SQLite-backed archive.
pub struct SqliteArchive {
    pool: SqlitePool,
}

impl SqliteArchive {
    /// Open (or create) the archive database.
    ///
    /// Accepts a plain file path, a `sqlite:` URL, or `"sqlite::memory:"` for an
    /// ephemeral database (useful for tests).
    pub async fn new(path: &str) -> Result<Self, PersistenceError> {
        let in_memory = path.contains(":memory:");
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite://{path}")
        };

        let mut options = SqliteConnectOptions::from_str(&url)
            .map_err(|e| PersistenceError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .synchronous(SqliteSynchronous::Normal);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // Every connection to ":memory:" is a separate database, so keep one.
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 4 })
            .connect_with(options)
            .await
            .map_err(|e| PersistenceError::Storage(format!("Failed to open SQLite: {e}")))?;

        let archive = Self { pool };
        archive.run_migrations().await?;
        info!("SQLite chat archive initialized at {path}");
        Ok(archive)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, PersistenceError> {
        let archive = Self { pool };
        archive.run_migrations().await?;
        Ok(archive)
    }

    async fn run_migrations(&self) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chat_history (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                role       TEXT NOT NULL,
                content    TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| PersistenceError::MigrationFailed(format!("chat_history table: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<ArchiveRecord, PersistenceError> {
        let role: String = row
            .try_get("role")
            .map_err(|e| PersistenceError::QueryFailed(format!("role column: {e}")))?;
        let content: String = row
            .try_get("content")
            .map_err(|e| PersistenceError::QueryFailed(format!("content column: {e}")))?;
        let created_at_str: String = row
            .try_get("created_at")
            .map_err(|e| PersistenceError::QueryFailed(format!("created_at column: {e}")))?;

        let role = Role::parse(&role)
            .ok_or_else(|| PersistenceError::QueryFailed(format!("unknown role '{role}'")))?;

        let created_at = chrono::DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(ArchiveRecord {
            role,
            content,
            created_at,
        })
    }
}

#[async_trait]
impl ChatArchive for SqliteArchive {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn append(&self, record: ArchiveRecord) -> Result<(), PersistenceError> {
        sqlx::query("INSERT INTO chat_history (role, content, created_at) VALUES (?1, ?2, ?3)")
            .bind(record.role.as_str())
            .bind(&record.content)
            .bind(record.created_at.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| PersistenceError::Storage(format!("INSERT failed: {e}")))?;

        debug!(role = %record.role, "Archived chat row");
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<ArchiveRecord>, PersistenceError> {
        let rows = sqlx::query(
            r#"
            SELECT role, content, created_at FROM (
                SELECT id, role, content, created_at
                FROM chat_history
                ORDER BY id DESC
                LIMIT ?1
            )
            ORDER BY id ASC
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PersistenceError::QueryFailed(format!("recent rows: {e}")))?;

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn count(&self) -> Result<usize, PersistenceError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM chat_history")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PersistenceError::QueryFailed(format!("count: {e}")))?;
        let n: i64 = row
            .try_get("n")
            .map_err(|e| PersistenceError::QueryFailed(format!("count column: {e}")))?;
        Ok(usize::try_from(n).unwrap_or_default())
    }
}
