//! Transcript Store: the ordered, append-only turn log of one session.
//!
//! The store is seeded with exactly one system turn and only ever grows.
//! Tool-result turns are checked against the calls made by earlier assistant
//! turns, so a snapshot is always a valid provider context.
//!
//! Archiving is a side channel: [`TranscriptStore::commit`] appends and then
//! hands the turn to the [`ArchiveWriter`] without waiting for storage.

use staybot_archive::ArchiveWriter;
use staybot_core::archive::ArchiveRecord;
use staybot_core::error::TranscriptError;
use staybot_core::message::{Role, Turn};
use std::collections::HashSet;

pub struct TranscriptStore {
    turns: Vec<Turn>,
    /// Ids of every tool call requested so far
    call_ids: HashSet<String>,
    archive: Option<ArchiveWriter>,
}

impl TranscriptStore {
    /// Create a store holding only the system turn.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::system(system_prompt)],
            call_ids: HashSet::new(),
            archive: None,
        }
    }

    /// Mirror committed turns to durable storage.
    pub fn with_archive(mut self, writer: ArchiveWriter) -> Self {
        self.archive = Some(writer);
        self
    }

    /// Append a turn. Turns are never reordered or modified afterwards.
    pub fn append(&mut self, turn: Turn) -> Result<(), TranscriptError> {
        match turn.role {
            Role::System => return Err(TranscriptError::SystemTurnNotFirst),
            Role::Tool => {
                let id = turn.tool_call_id.as_deref().unwrap_or_default();
                if !self.call_ids.contains(id) {
                    return Err(TranscriptError::UnknownToolCall(id.to_string()));
                }
            }
            Role::Assistant => {
                self.call_ids
                    .extend(turn.tool_calls.iter().map(|c| c.id.clone()));
            }
            Role::User => {}
        }
        self.turns.push(turn);
        Ok(())
    }

    /// Best-effort asynchronous mirror of a turn. Turns that are not part of
    /// the audit log (system prompt, tool plumbing) are skipped.
    pub fn persist(&self, turn: &Turn) {
        if let (Some(writer), Some(record)) = (&self.archive, ArchiveRecord::from_turn(turn)) {
            writer.persist(record);
        }
    }

    /// Append, then persist.
    pub fn commit(&mut self, turn: Turn) -> Result<(), TranscriptError> {
        self.append(turn)?;
        if let Some(last) = self.turns.last() {
            self.persist(last);
        }
        Ok(())
    }

    /// An owned copy of the whole transcript; later appends are not visible in it.
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.clone()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Always false: the system turn is there from the start.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use staybot_archive::InMemoryArchive;
    use staybot_core::message::TurnToolCall;
    use std::sync::Arc;

    #[test]
    fn starts_with_the_system_turn() {
        let store = TranscriptStore::new("You are a hotel assistant.");
        assert_eq!(store.len(), 1);
        assert_eq!(store.turns()[0].role, Role::System);
        assert_eq!(store.snapshot()[0].text(), "You are a hotel assistant.");
    }

    #[test]
    fn second_system_turn_is_rejected() {
        let mut store = TranscriptStore::new("sys");
        assert_eq!(
            store.append(Turn::system("again")),
            Err(TranscriptError::SystemTurnNotFirst)
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn tool_result_must_answer_an_earlier_call() {
        let mut store = TranscriptStore::new("sys");
        let err = store
            .append(Turn::tool_result("call_1", "calculatePrice", "Total price: 450"))
            .unwrap_err();
        assert_eq!(err, TranscriptError::UnknownToolCall("call_1".into()));

        store
            .append(Turn::assistant_tool_calls(
                "",
                vec![TurnToolCall::new("call_1", "calculatePrice", "{}")],
            ))
            .unwrap();
        store
            .append(Turn::tool_result("call_1", "calculatePrice", "Total price: 450"))
            .unwrap();
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn snapshot_is_a_copy() {
        let mut store = TranscriptStore::new("sys");
        let snap = store.snapshot();
        store.append(Turn::user("hi")).unwrap();
        assert_eq!(snap.len(), 1);
        assert_eq!(store.len(), 2);
        assert_eq!(store.last().unwrap().text(), "hi");
    }

    #[tokio::test]
    async fn commit_mirrors_user_and_final_assistant_turns_only() {
        let archive = InMemoryArchive::new();
        let writer = ArchiveWriter::spawn(Arc::new(archive.clone()));
        let mut store = TranscriptStore::new("sys").with_archive(writer.clone());

        store.commit(Turn::user("Deluxe for 3 nights")).unwrap();
        store
            .commit(Turn::assistant_tool_calls(
                "",
                vec![TurnToolCall::new("c1", "calculatePrice", "{}")],
            ))
            .unwrap();
        store
            .commit(Turn::tool_result("c1", "calculatePrice", "Total price: 450"))
            .unwrap();
        store.commit(Turn::assistant("That will be 450.")).unwrap();
        writer.flush().await;

        let rows = archive.all().await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].role, Role::User);
        assert_eq!(rows[1].content, "That will be 450.");
    }
}
