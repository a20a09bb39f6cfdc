//! ChatArchive trait: the append-only conversation log.
//!
//! The archive is a best-effort audit trail of user inputs and final assistant
//! replies. It is never read back into a live transcript, and a failing archive
//! never fails a chat round.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;
use crate::message::{Role, Turn};

/// One archived row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveRecord {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ArchiveRecord {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    /// Archive form of a turn, if the turn is one that gets archived.
    ///
    /// Only user inputs and assistant replies carrying text qualify; tool
    /// plumbing and the system prompt are kept out of the log.
    pub fn from_turn(turn: &Turn) -> Option<Self> {
        match turn.role {
            Role::User => Some(Self {
                role: turn.role,
                content: turn.text().to_string(),
                created_at: turn.timestamp,
            }),
            Role::Assistant if !turn.requests_tools() => Some(Self {
                role: turn.role,
                content: turn.text().to_string(),
                created_at: turn.timestamp,
            }),
            _ => None,
        }
    }
}

/// The core ChatArchive trait.
///
/// Implementations: SQLite, in-memory (for testing), none (no-op).
#[async_trait]
pub trait ChatArchive: Send + Sync {
    /// The backend name (e.g., "sqlite", "memory", "none").
    fn name(&self) -> &str;

    /// Append one record.
    async fn append(&self, record: ArchiveRecord) -> Result<(), PersistenceError>;

    /// The most recent `limit` records, oldest first.
    async fn recent(&self, limit: usize) -> Result<Vec<ArchiveRecord>, PersistenceError>;

    /// Total number of archived records.
    async fn count(&self) -> Result<usize, PersistenceError>;
}
