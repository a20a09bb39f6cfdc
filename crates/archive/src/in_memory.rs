//! In-memory archive: useful for testing and throwaway sessions.

use async_trait::async_trait;
use staybot_core::archive::{ArchiveRecord, ChatArchive};
use staybot_core::error::PersistenceError;
use std::sync::Arc;
use tokio::sync::RwLock;

/// An archive that keeps rows in a Vec.
#[derive(Clone, Default)]
pub struct InMemoryArchive {
    records: Arc<RwLock<Vec<ArchiveRecord>>>,
}

impl InMemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// All rows, oldest first.
    pub async fn all(&self) -> Vec<ArchiveRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl ChatArchive for InMemoryArchive {
    fn name(&self) -> &str {
        "memory"
    }

    async fn append(&self, record: ArchiveRecord) -> Result<(), PersistenceError> {
        self.records.write().await.push(record);
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<ArchiveRecord>, PersistenceError> {
        let records = self.records.read().await;
        let start = records.len().saturating_sub(limit);
        Ok(records[start..].to_vec())
    }

    async fn count(&self) -> Result<usize, PersistenceError> {
        Ok(self.records.read().await.len())
    }
}
