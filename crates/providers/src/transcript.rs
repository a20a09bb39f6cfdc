//! Transcript rendering helpers shared by the vendor adapters.

use staybot_core::message::{Role, Turn, TurnToolCall};
use std::collections::HashSet;

/// Ids of every tool call that has a tool-result turn.
pub(crate) fn answered_call_ids(turns: &[Turn]) -> HashSet<&str> {
    turns
        .iter()
        .filter(|t| t.role == Role::Tool)
        .filter_map(|t| t.tool_call_id.as_deref())
        .collect()
}

/// The tool calls of `turn` that were answered.
///
/// A failed dispatch leaves calls without results in the transcript; vendors
/// reject such requests, so unanswered calls are not sent.
pub(crate) fn answered_calls<'a>(
    turn: &'a Turn,
    answered: &HashSet<&str>,
) -> Vec<&'a TurnToolCall> {
    turn.tool_calls
        .iter()
        .filter(|tc| answered.contains(tc.id.as_str()))
        .collect()
}
