//! Fire-and-forget archive writer.
//!
//! The chat path never awaits storage. Records are queued on an unbounded
//! channel and a single background task appends them in submission order.
//! Write failures are logged and dropped.

use staybot_core::archive::{ArchiveRecord, ChatArchive};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

enum Command {
    Append(ArchiveRecord),
    Flush(oneshot::Sender<()>),
}

/// Cloneable handle to the background writer task.
#[derive(Clone)]
pub struct ArchiveWriter {
    tx: mpsc::UnboundedSender<Command>,
    backend: String,
}

impl ArchiveWriter {
    /// Spawn the writer task. Must be called inside a Tokio runtime.
    pub fn spawn(archive: Arc<dyn ChatArchive>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Command>();
        let backend = archive.name().to_string();

        tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    Command::Append(record) => {
                        let role = record.role;
                        if let Err(e) = archive.append(record).await {
                            warn!(backend = archive.name(), %role, "Failed to archive chat row: {e}");
                        }
                    }
                    Command::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            debug!("Archive writer stopped");
        });

        Self { tx, backend }
    }

    /// Queue a record. Never blocks.
    pub fn persist(&self, record: ArchiveRecord) {
        if self.tx.send(Command::Append(record)).is_err() {
            warn!(backend = %self.backend, "Archive writer is gone; dropping chat row");
        }
    }

    /// Wait until everything queued so far has been written (or has failed).
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    /// Name of the archive behind this writer.
    pub fn backend(&self) -> &str {
        &self.backend
    }
}
