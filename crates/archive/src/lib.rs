//! Chat archive implementations for staybot.

pub mod in_memory;
pub mod noop;
pub mod writer;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryArchive;
pub use noop::NoopArchive;
pub use writer::ArchiveWriter;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteArchive;

use staybot_config::{ArchiveBackend, ArchiveConfig};
use staybot_core::archive::ChatArchive;
use staybot_core::error::PersistenceError;
use std::sync::Arc;

/// Open the archive selected by configuration.
pub async fn open(config: &ArchiveConfig) -> Result<Arc<dyn ChatArchive>, PersistenceError> {
    match config.backend {
        #[cfg(feature = "sqlite")]
        ArchiveBackend::Sqlite => Ok(Arc::new(SqliteArchive::new(&config.path).await?)),
        #[cfg(not(feature = "sqlite"))]
        ArchiveBackend::Sqlite => Err(PersistenceError::Storage(
            "built without the `sqlite` feature".into(),
        )),
        ArchiveBackend::Memory => Ok(Arc::new(InMemoryArchive::new())),
        ArchiveBackend::None => Ok(Arc::new(NoopArchive)),
    }
}
