//! No-op archive: disables the chat log entirely.

use async_trait::async_trait;
use staybot_core::archive::{ArchiveRecord, ChatArchive};
use staybot_core::error::PersistenceError;

/// An archive that stores nothing.
pub struct NoopArchive;

#[async_trait]
impl ChatArchive for NoopArchive {
    fn name(&self) -> &str {
        "none"
    }

    async fn append(&self, _record: ArchiveRecord) -> Result<(), PersistenceError> {
        Ok(())
    }

    async fn recent(&self, _limit: usize) -> Result<Vec<ArchiveRecord>, PersistenceError> {
        Ok(Vec::new())
    }

    async fn count(&self) -> Result<usize, PersistenceError> {
        Ok(0)
    }
}
